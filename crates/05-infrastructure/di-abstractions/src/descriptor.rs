//! 组件描述符
//!
//! 描述符是容器唯一认识的组件元数据：如何构造、如何命名、放入哪个作用域、
//! 注入哪些依赖、是否被拦截。容器从不直接检查类型本身，只读取描述符。

use crate::component::Component;
use crate::event::{EventHandler, Events};
use crate::interceptor::{AdviceSlot, Invocable};
use crate::scope::ScopeTag;
use di_common::{DependencyError, DependencyResult, TypeKey};
use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// 容器中的组件实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 构造器调用
pub type ConstructFn = Arc<dyn Fn(&Arguments) -> anyhow::Result<Instance> + Send + Sync>;
/// 工厂方法调用，非静态工厂会收到工厂组件实例
pub type FactoryFn =
    Arc<dyn Fn(Option<&Instance>, &Arguments) -> anyhow::Result<Instance> + Send + Sync>;
/// 字段或 setter 注入
pub type InjectFn = Arc<dyn Fn(&Instance, &Arguments) -> anyhow::Result<()> + Send + Sync>;
/// 初始化或销毁钩子
pub type HookFn = Arc<dyn Fn(&Instance) -> anyhow::Result<()> + Send + Sync>;
/// 把事件总线交给事件发送方组件
pub type EmitterFn = Arc<dyn Fn(&Instance, Arc<Events>) -> anyhow::Result<()> + Send + Sync>;
/// 把处理函数绑定到具体实例
pub type SubscribeFn = Arc<dyn Fn(&Instance) -> EventHandler + Send + Sync>;
/// 把实例视为可调用目标
pub type InvocableCast = Arc<dyn Fn(&Instance) -> Option<Arc<dyn Invocable>> + Send + Sync>;
/// 把实例转换为父类型引用，结果是装箱的 `Arc<dyn S>`
pub type SupertypeCast =
    Arc<dyn Fn(&Instance) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;
/// 把多实现集合收集为一个可注入的实例
pub type CollectFn =
    Arc<dyn Fn(Vec<Box<dyn Any + Send + Sync>>) -> DependencyResult<Instance> + Send + Sync>;
/// 描述符生成函数，用于按需解析
pub type DescribeFn = fn() -> ComponentDescriptor;

/// 把容器实例转换为具体类型
pub fn downcast_instance<T: Send + Sync + 'static>(instance: Instance) -> DependencyResult<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| DependencyError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            actual: "其他类型".to_string(),
        })
}

fn typed<T: 'static>(instance: &Instance) -> anyhow::Result<&T> {
    (**instance)
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow::anyhow!("实例类型不是 {}", std::any::type_name::<T>()))
}

/// 已解析的参数列表，顺序与声明的依赖顺序一致
#[derive(Clone, Default)]
pub struct Arguments {
    values: Vec<Instance>,
}

impl Arguments {
    /// 创建参数列表
    pub fn new(values: Vec<Instance>) -> Self {
        Self { values }
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 获取原始实例
    pub fn raw(&self, index: usize) -> anyhow::Result<&Instance> {
        self.values
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("参数下标越界: {index}, 共 {} 个参数", self.values.len()))
    }

    /// 获取指定类型的参数
    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> anyhow::Result<Arc<T>> {
        self.raw(index)?
            .clone()
            .downcast::<T>()
            .map_err(|_| {
                anyhow::anyhow!(
                    "第 {index} 个参数类型不是 {}",
                    std::any::type_name::<T>()
                )
            })
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .finish()
    }
}

/// 依赖边的目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyTarget {
    /// 按具体类型
    Type(TypeKey),
    /// 按声明名称
    Name(String),
    /// 按父类型获取全部多实现
    Supertype(TypeKey),
}

/// 依赖引用
///
/// 携带描述符生成函数的引用可以在注册表缺失时按需解析目标类型。
#[derive(Clone)]
pub struct DependencyRef {
    target: DependencyTarget,
    describe: Option<DescribeFn>,
    collect: Option<CollectFn>,
}

impl DependencyRef {
    /// 按组件类型引用
    pub fn of<T: Component>() -> Self {
        Self {
            target: DependencyTarget::Type(TypeKey::of::<T>()),
            describe: Some(T::descriptor),
            collect: None,
        }
    }

    /// 按类型标识引用，不携带描述符，依赖注册表、解析器或分层导入提供
    pub fn key(key: TypeKey) -> Self {
        Self {
            target: DependencyTarget::Type(key),
            describe: None,
            collect: None,
        }
    }

    /// 按名称引用
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            target: DependencyTarget::Name(name.into()),
            describe: None,
            collect: None,
        }
    }

    /// 引用父类型 `S` 的全部多实现，注入值为 `Arc<Vec<Arc<S>>>`
    pub fn all_of<S: ?Sized + Send + Sync + 'static>() -> Self {
        let collect: CollectFn = Arc::new(|items: Vec<Box<dyn Any + Send + Sync>>| {
            let mut collected: Vec<Arc<S>> = Vec::with_capacity(items.len());
            for item in items {
                let item = item
                    .downcast::<Arc<S>>()
                    .map_err(|_| DependencyError::TypeMismatch {
                        expected: std::any::type_name::<Arc<S>>().to_string(),
                        actual: "其他类型".to_string(),
                    })?;
                collected.push(*item);
            }
            Ok(Arc::new(collected) as Instance)
        });
        Self {
            target: DependencyTarget::Supertype(TypeKey::of_abstract::<S>()),
            describe: None,
            collect: Some(collect),
        }
    }

    /// 依赖目标
    pub fn target(&self) -> &DependencyTarget {
        &self.target
    }

    /// 生成目标类型的描述符
    pub fn describe(&self) -> Option<ComponentDescriptor> {
        self.describe.map(|describe| describe())
    }

    /// 是否可以按需解析
    pub fn is_describable(&self) -> bool {
        self.describe.is_some()
    }

    /// 收集多实现集合
    pub fn collect(&self, items: Vec<Box<dyn Any + Send + Sync>>) -> DependencyResult<Instance> {
        match &self.collect {
            Some(collect) => collect(items),
            None => Err(DependencyError::configuration(format!(
                "依赖 {} 不是集合注入",
                self.display_name()
            ))),
        }
    }

    /// 诊断用名称
    pub fn display_name(&self) -> String {
        match &self.target {
            DependencyTarget::Type(key) => key.name.to_string(),
            DependencyTarget::Name(name) => format!("@{name}"),
            DependencyTarget::Supertype(key) => format!("[{}]", key.name),
        }
    }
}

impl fmt::Debug for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRef")
            .field("target", &self.target)
            .field("describable", &self.describe.is_some())
            .finish()
    }
}

/// 已创建的组件及其描述符
#[derive(Clone)]
pub struct ComponentRef {
    /// 组件描述符
    pub descriptor: Arc<ComponentDescriptor>,
    /// 组件实例（被拦截的组件为代理）
    pub instance: Instance,
}

impl ComponentRef {
    /// 创建组件引用
    pub fn new(descriptor: Arc<ComponentDescriptor>, instance: Instance) -> Self {
        Self {
            descriptor,
            instance,
        }
    }

    /// 转换为声明的父类型引用
    pub fn cast_to_supertype(&self) -> DependencyResult<Box<dyn Any + Send + Sync>> {
        self.descriptor
            .supertype()
            .and_then(|binding| binding.cast(&self.instance))
            .ok_or_else(|| DependencyError::TypeMismatch {
                expected: self
                    .descriptor
                    .supertype()
                    .map_or("父类型", |binding| binding.key.name)
                    .to_string(),
                actual: self.descriptor.type_key().name.to_string(),
            })
    }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("component", &self.descriptor.type_key().name)
            .finish()
    }
}

/// 构造器信息
#[derive(Clone)]
pub struct ConstructorInfo {
    /// 参数依赖，按参数顺序
    pub parameters: Vec<DependencyRef>,
    invoke: ConstructFn,
}

impl ConstructorInfo {
    /// 创建构造器信息
    pub fn new(parameters: Vec<DependencyRef>, invoke: ConstructFn) -> Self {
        Self { parameters, invoke }
    }

    /// 调用构造器
    pub fn invoke(&self, args: &Arguments) -> anyhow::Result<Instance> {
        (self.invoke)(args)
    }
}

/// 工厂方法信息
#[derive(Clone)]
pub struct FactoryInfo {
    /// 参数依赖，按参数顺序
    pub parameters: Vec<DependencyRef>,
    /// 声明工厂方法的组件，静态工厂为空
    pub declaring: Option<DependencyRef>,
    invoke: FactoryFn,
}

impl FactoryInfo {
    /// 创建工厂方法信息
    pub fn new(parameters: Vec<DependencyRef>, declaring: Option<DependencyRef>, invoke: FactoryFn) -> Self {
        Self {
            parameters,
            declaring,
            invoke,
        }
    }

    /// 是否为静态工厂
    pub fn is_static(&self) -> bool {
        self.declaring.is_none()
    }

    /// 调用工厂方法
    pub fn invoke(&self, factory: Option<&Instance>, args: &Arguments) -> anyhow::Result<Instance> {
        (self.invoke)(factory, args)
    }
}

/// 构造方式，构造器与工厂方法二选一
#[derive(Clone)]
pub enum CreationStrategy {
    /// 构造器
    Constructor(ConstructorInfo),
    /// 工厂方法
    Factory(FactoryInfo),
}

impl CreationStrategy {
    /// 构造参数
    pub fn parameters(&self) -> &[DependencyRef] {
        match self {
            Self::Constructor(info) => &info.parameters,
            Self::Factory(info) => &info.parameters,
        }
    }
}

/// 注入点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionKind {
    /// 字段注入，单个依赖
    Field,
    /// setter 注入，依赖顺序与参数顺序一致
    Setter,
}

/// 注入点
#[derive(Clone)]
pub struct InjectionPoint {
    /// 注入点种类
    pub kind: InjectionKind,
    /// 字段名或 setter 名
    pub name: String,
    /// 依赖列表
    pub dependencies: Vec<DependencyRef>,
    apply: InjectFn,
}

impl InjectionPoint {
    /// 创建注入点
    pub fn new(
        kind: InjectionKind,
        name: impl Into<String>,
        dependencies: Vec<DependencyRef>,
        apply: InjectFn,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            dependencies,
            apply,
        }
    }

    /// 执行注入
    pub fn apply(&self, target: &Instance, args: &Arguments) -> anyhow::Result<()> {
        (self.apply)(target, args)
    }
}

impl fmt::Debug for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// 组件角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentRole {
    /// 普通组件
    Ordinary,
    /// 声明工厂方法的组件，只通过 `get_factory` 获取
    Factory,
    /// 提供通知的拦截器组件，只通过 `get_interceptor` 获取
    Interceptor,
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinary => f.write_str("普通"),
            Self::Factory => f.write_str("工厂"),
            Self::Interceptor => f.write_str("拦截器"),
        }
    }
}

/// 多实现声明的父类型
#[derive(Clone)]
pub struct SupertypeBinding {
    /// 父类型
    pub key: TypeKey,
    cast: SupertypeCast,
}

impl SupertypeBinding {
    /// 创建父类型声明
    pub fn new(key: TypeKey, cast: SupertypeCast) -> Self {
        Self { key, cast }
    }

    /// 转换为父类型引用
    pub fn cast(&self, instance: &Instance) -> Option<Box<dyn Any + Send + Sync>> {
        (self.cast)(instance)
    }
}

/// 事件订阅声明
#[derive(Clone)]
pub struct EventSubscription {
    event: TypeId,
    event_name: &'static str,
    subscribe: SubscribeFn,
}

impl EventSubscription {
    /// 事件类型名称
    pub fn event_name(&self) -> &'static str {
        self.event_name
    }

    /// 把处理函数绑定到实例并登记到总线
    ///
    /// 处理函数只持有实例的弱引用，实例释放后不再收到事件。
    pub fn attach(&self, instance: &Instance, events: &Events) {
        events.register_erased(self.event, (self.subscribe)(instance));
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.event_name)
    }
}

/// 组件描述符
pub struct ComponentDescriptor {
    type_key: TypeKey,
    name: String,
    scope: ScopeTag,
    supertype: Option<SupertypeBinding>,
    strategy: Option<CreationStrategy>,
    injection_points: Vec<InjectionPoint>,
    init: Option<HookFn>,
    destroy: Option<HookFn>,
    subscriptions: Vec<EventSubscription>,
    emitter: Option<EmitterFn>,
    role: ComponentRole,
    advised_by: Vec<DependencyRef>,
    advice_slots: Vec<AdviceSlot>,
    invocable: Option<InvocableCast>,
    registered: AtomicBool,
    resolved: AtomicBool,
}

impl ComponentDescriptor {
    /// 为类型 `T` 创建描述符构建器
    pub fn builder<T: Send + Sync + 'static>() -> DescriptorBuilder<T> {
        DescriptorBuilder::new()
    }

    /// 为预先构建好的实例合成描述符，没有构造方式，永远不会被重新创建
    pub fn for_instance<T: Send + Sync + 'static>(name: impl Into<String>) -> Self {
        let mut descriptor = Self::bare(TypeKey::of::<T>());
        descriptor.name = name.into();
        descriptor
    }

    fn bare(type_key: TypeKey) -> Self {
        Self {
            type_key,
            name: type_key.canonical_name().to_string(),
            scope: ScopeTag::singleton(),
            supertype: None,
            strategy: None,
            injection_points: Vec::new(),
            init: None,
            destroy: None,
            subscriptions: Vec::new(),
            emitter: None,
            role: ComponentRole::Ordinary,
            advised_by: Vec::new(),
            advice_slots: Vec::new(),
            invocable: None,
            registered: AtomicBool::new(false),
            resolved: AtomicBool::new(false),
        }
    }

    /// 组件类型
    pub fn type_key(&self) -> &TypeKey {
        &self.type_key
    }

    /// 组件名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 名称是否不同于类型的规范名称
    pub fn has_custom_name(&self) -> bool {
        self.name != self.type_key.canonical_name()
    }

    /// 作用域
    pub fn scope(&self) -> &ScopeTag {
        &self.scope
    }

    /// 是否为多实现组件
    pub fn is_multi_implementation(&self) -> bool {
        self.supertype.is_some()
    }

    /// 声明的父类型
    pub fn supertype(&self) -> Option<&SupertypeBinding> {
        self.supertype.as_ref()
    }

    /// 构造方式
    pub fn strategy(&self) -> Option<&CreationStrategy> {
        self.strategy.as_ref()
    }

    /// 注入点
    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    /// 组件角色
    pub fn role(&self) -> ComponentRole {
        self.role
    }

    /// 应用到本组件的拦截器
    pub fn advised_by(&self) -> &[DependencyRef] {
        &self.advised_by
    }

    /// 是否需要织入拦截
    pub fn is_advised(&self) -> bool {
        !self.advised_by.is_empty()
    }

    /// 拦截器组件提供的通知
    pub fn advice_slots(&self) -> &[AdviceSlot] {
        &self.advice_slots
    }

    /// 把实例视为可调用目标
    pub fn as_invocable(&self, instance: &Instance) -> Option<Arc<dyn Invocable>> {
        self.invocable.as_ref().and_then(|cast| cast(instance))
    }

    /// 调用初始化钩子
    pub fn invoke_init(&self, instance: &Instance) -> anyhow::Result<()> {
        match &self.init {
            Some(hook) => hook(instance),
            None => Ok(()),
        }
    }

    /// 是否声明了销毁钩子
    pub fn has_destroy_hook(&self) -> bool {
        self.destroy.is_some()
    }

    /// 调用销毁钩子
    pub fn invoke_destroy(&self, instance: &Instance) -> anyhow::Result<()> {
        match &self.destroy {
            Some(hook) => hook(instance),
            None => Ok(()),
        }
    }

    /// 声明的事件订阅
    pub fn subscriptions(&self) -> &[EventSubscription] {
        &self.subscriptions
    }

    /// 是否需要接入事件总线
    pub fn uses_events(&self) -> bool {
        !self.subscriptions.is_empty() || self.emitter.is_some()
    }

    /// 登记事件处理函数，并把总线交给事件发送方
    pub fn attach_events(&self, instance: &Instance, events: &Arc<Events>) -> anyhow::Result<()> {
        for subscription in &self.subscriptions {
            subscription.attach(instance, events);
        }
        match &self.emitter {
            Some(attach) => attach(instance, events.clone()),
            None => Ok(()),
        }
    }

    /// 所有依赖边：构造参数、工厂组件、注入点依赖以及拦截器
    pub fn dependencies(&self) -> Vec<&DependencyRef> {
        let mut edges: Vec<&DependencyRef> = Vec::new();
        if let Some(strategy) = &self.strategy {
            edges.extend(strategy.parameters());
            if let CreationStrategy::Factory(FactoryInfo {
                declaring: Some(declaring),
                ..
            }) = strategy
            {
                edges.push(declaring);
            }
        }
        edges.extend(self.injection_points.iter().flat_map(|point| point.dependencies.iter()));
        edges.extend(self.advised_by.iter());
        edges
    }

    /// 修改名称，只在注册前（例如注册监听器中）使用
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 修改作用域，只在注册前使用
    pub fn with_scope(mut self, scope: ScopeTag) -> Self {
        self.scope = scope;
        self
    }

    /// 是否已注册
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// 标记为已注册
    pub fn mark_registered(&self) {
        self.registered.store(true, Ordering::Release);
    }

    /// 依赖子图是否已全部注册
    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// 标记依赖子图已全部注册
    pub fn mark_resolved(&self) {
        self.resolved.store(true, Ordering::Release);
    }
}

impl fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("type", &self.type_key.name)
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("supertype", &self.supertype.as_ref().map(|s| s.key.name))
            .field("role", &self.role)
            .field("injection_points", &self.injection_points)
            .field("advised_by", &self.advised_by)
            .field("subscriptions", &self.subscriptions)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// 描述符构建器
pub struct DescriptorBuilder<T> {
    descriptor: ComponentDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> DescriptorBuilder<T> {
    /// 创建构建器，默认为单例作用域，名称为类型的规范名称
    pub fn new() -> Self {
        Self {
            descriptor: ComponentDescriptor::bare(TypeKey::of::<T>()),
            _marker: PhantomData,
        }
    }

    /// 设置组件名称
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.descriptor.name = name.into();
        self
    }

    /// 设置作用域
    pub fn scope(mut self, scope: ScopeTag) -> Self {
        self.descriptor.scope = scope;
        self
    }

    /// 使用原型作用域
    pub fn prototype(self) -> Self {
        self.scope(ScopeTag::prototype())
    }

    /// 声明为父类型 `S` 的一个实现
    pub fn implements<S: ?Sized + Send + Sync + 'static>(mut self, cast: fn(Arc<T>) -> Arc<S>) -> Self {
        let caster: SupertypeCast = Arc::new(move |instance: &Instance| {
            instance
                .clone()
                .downcast::<T>()
                .ok()
                .map(|concrete| Box::new(cast(concrete)) as Box<dyn Any + Send + Sync>)
        });
        self.descriptor.supertype = Some(SupertypeBinding::new(TypeKey::of_abstract::<S>(), caster));
        self
    }

    /// 使用构造器创建
    pub fn constructor<F>(mut self, parameters: Vec<DependencyRef>, construct: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let invoke: ConstructFn =
            Arc::new(move |args: &Arguments| construct(args).map(|value| Arc::new(value) as Instance));
        self.descriptor.strategy = Some(CreationStrategy::Constructor(ConstructorInfo::new(
            parameters, invoke,
        )));
        self
    }

    /// 使用 `Default` 作为无参构造器
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Vec::new(), |_| Ok(T::default()))
    }

    /// 使用静态工厂方法创建
    pub fn static_factory<F>(mut self, parameters: Vec<DependencyRef>, factory: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let invoke: FactoryFn = Arc::new(move |_: Option<&Instance>, args: &Arguments| {
            factory(args).map(|value| Arc::new(value) as Instance)
        });
        self.descriptor.strategy = Some(CreationStrategy::Factory(FactoryInfo::new(
            parameters, None, invoke,
        )));
        self
    }

    /// 使用工厂组件 `P` 上的实例方法创建
    pub fn factory_method<P, F>(mut self, parameters: Vec<DependencyRef>, factory: F) -> Self
    where
        P: Component,
        F: Fn(&P, &Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let invoke: FactoryFn = Arc::new(move |provider: Option<&Instance>, args: &Arguments| {
            let provider = provider
                .ok_or_else(|| anyhow::anyhow!("缺少工厂组件 {}", std::any::type_name::<P>()))?;
            factory(typed::<P>(provider)?, args).map(|value| Arc::new(value) as Instance)
        });
        self.descriptor.strategy = Some(CreationStrategy::Factory(FactoryInfo::new(
            parameters,
            Some(DependencyRef::of::<P>()),
            invoke,
        )));
        self
    }

    /// 字段注入，依赖值位于参数 0
    pub fn field<F>(mut self, name: impl Into<String>, dependency: DependencyRef, inject: F) -> Self
    where
        F: Fn(&T, &Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let apply: InjectFn =
            Arc::new(move |target: &Instance, args: &Arguments| inject(typed::<T>(target)?, args));
        self.descriptor.injection_points.push(InjectionPoint::new(
            InjectionKind::Field,
            name,
            vec![dependency],
            apply,
        ));
        self
    }

    /// setter 注入
    pub fn setter<F>(mut self, name: impl Into<String>, dependencies: Vec<DependencyRef>, inject: F) -> Self
    where
        F: Fn(&T, &Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let apply: InjectFn =
            Arc::new(move |target: &Instance, args: &Arguments| inject(typed::<T>(target)?, args));
        self.descriptor.injection_points.push(InjectionPoint::new(
            InjectionKind::Setter,
            name,
            dependencies,
            apply,
        ));
        self
    }

    /// 初始化钩子，实例存入作用域后调用
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.descriptor.init = Some(Arc::new(move |instance: &Instance| hook(typed::<T>(instance)?)));
        self
    }

    /// 销毁钩子，容器关闭时调用
    pub fn on_destroy<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.descriptor.destroy = Some(Arc::new(move |instance: &Instance| hook(typed::<T>(instance)?)));
        self
    }

    /// 订阅事件 `E`，实例存入作用域时登记到容器的事件总线
    pub fn on_event<E, F>(mut self, handler: F) -> Self
    where
        E: Send + Sync + 'static,
        F: Fn(&T, &E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let subscribe: SubscribeFn = Arc::new(move |instance: &Instance| {
            let target = Arc::downgrade(instance);
            let handler = handler.clone();
            let bound: EventHandler = Arc::new(move |event: &(dyn Any + Send + Sync)| {
                match (target.upgrade(), event.downcast_ref::<E>()) {
                    (Some(target), Some(event)) => handler(typed::<T>(&target)?, event),
                    _ => Ok(()),
                }
            });
            bound
        });
        self.descriptor.subscriptions.push(EventSubscription {
            event: TypeId::of::<E>(),
            event_name: std::any::type_name::<E>(),
            subscribe,
        });
        self
    }

    /// 声明为事件发送方，创建时收到容器的事件总线
    pub fn event_emitter<F>(mut self, attach: F) -> Self
    where
        F: Fn(&T, Arc<Events>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.descriptor.emitter = Some(Arc::new(move |instance: &Instance, events: Arc<Events>| {
            attach(typed::<T>(instance)?, events)
        }));
        self
    }

    /// 标记为声明工厂方法的组件
    pub fn factory_provider(mut self) -> Self {
        self.descriptor.role = ComponentRole::Factory;
        self
    }

    /// 标记为拦截器组件并声明其通知
    pub fn interceptor(mut self, slots: Vec<AdviceSlot>) -> Self {
        self.descriptor.role = ComponentRole::Interceptor;
        self.descriptor.advice_slots = slots;
        self
    }

    /// 完成构建
    pub fn build(self) -> ComponentDescriptor {
        self.descriptor
    }
}

impl<T: Invocable> DescriptorBuilder<T> {
    /// 由拦截器组件 `I` 的通知拦截本组件
    pub fn advised_by<I: Component>(mut self) -> Self {
        self.descriptor.advised_by.push(DependencyRef::of::<I>());
        if self.descriptor.invocable.is_none() {
            let cast: InvocableCast = Arc::new(|instance: &Instance| {
                instance
                    .clone()
                    .downcast::<T>()
                    .ok()
                    .map(|target| target as Arc<dyn Invocable>)
            });
            self.descriptor.invocable = Some(cast);
        }
        self
    }
}

impl<T: Send + Sync + 'static> Default for DescriptorBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}
