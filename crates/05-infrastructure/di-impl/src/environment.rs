//! 依赖环境
//!
//! [`DependencyEnvironment`] 是解析与生命周期引擎：按需解析描述符、两阶段创建实例、
//! 检测循环依赖、织入拦截代理、写入作用域，并在关闭时调用销毁钩子。
//! 每个环境持有一条事件总线，组件声明的事件处理函数在实例存入作用域时登记。

use crate::builder::EnvironmentBuilder;
use crate::holder::{CreationCache, InFlight, InFlightKey, StoredEntry};
use crate::registry::DefaultDescriptorRegistry;
use crate::scopes::{builtin_scopes, SingletonScope};
use crate::weaver::AspectProxy;
use dashmap::DashMap;
use di_abstractions::{
    downcast_instance, Arguments, Component, ComponentDescriptor, ComponentRef, ComponentRole,
    ContainerConfig, ContainerStats, CreationListener, CreationStrategy, DependencyContext,
    DependencyRef, DependencyScope, DependencyTarget, DescriptorParser, DescriptorRegistry,
    Events, FactoryContext, Instance, LayerImport, Layerable, RegisterListener, ScopeEntry, ScopeTag,
};
use di_common::{ContainerId, DependencyError, DependencyResult, LifecycleGuard, TypeKey};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Weak};
use tracing::{debug, debug_span, info, warn};

/// 导出声明
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportDecl {
    /// 按类型导出
    Type(TypeKey),
    /// 按名称导出
    Name(String),
    /// 导出父类型下的全部多实现
    Supertype(TypeKey),
}

/// 依赖环境
pub struct DependencyEnvironment {
    id: ContainerId,
    config: ContainerConfig,
    lifecycle: LifecycleGuard,
    registry: DefaultDescriptorRegistry,
    parsers: Vec<Box<dyn DescriptorParser>>,
    register_listeners: Vec<Arc<dyn RegisterListener>>,
    creation_listeners: Vec<Arc<dyn CreationListener>>,
    scopes: DashMap<ScopeTag, Arc<dyn DependencyScope>>,
    holder: CreationCache,
    factories: Arc<dyn DependencyScope>,
    events: Arc<Events>,
    exports: Vec<ExportDecl>,
    import: OnceCell<Weak<dyn LayerImport>>,
}

impl DependencyEnvironment {
    /// 创建环境构建器
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    pub(crate) fn from_parts(
        config: ContainerConfig,
        parsers: Vec<Box<dyn DescriptorParser>>,
        register_listeners: Vec<Arc<dyn RegisterListener>>,
        creation_listeners: Vec<Arc<dyn CreationListener>>,
        custom_scopes: Vec<(ScopeTag, Arc<dyn DependencyScope>)>,
        exports: Vec<ExportDecl>,
    ) -> Self {
        let (singleton, prototype) = builtin_scopes();
        let scopes: DashMap<ScopeTag, Arc<dyn DependencyScope>> = DashMap::new();
        scopes.insert(ScopeTag::singleton(), singleton);
        scopes.insert(ScopeTag::prototype(), prototype);
        for (tag, scope) in custom_scopes {
            scopes.insert(tag, scope);
        }

        Self {
            id: ContainerId::new(),
            lifecycle: LifecycleGuard::new(config.name.clone()),
            config,
            registry: DefaultDescriptorRegistry::new(),
            parsers,
            register_listeners,
            creation_listeners,
            scopes,
            holder: CreationCache::new(),
            factories: Arc::new(SingletonScope::new()),
            events: Arc::new(Events::new()),
            exports,
            import: OnceCell::new(),
        }
    }

    /// 容器标识
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// 容器名称
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.lifecycle.check().is_err()
    }

    /// 容器的事件总线
    pub fn events(&self) -> &Arc<Events> {
        &self.events
    }

    /// 向本容器的事件总线分发事件，返回调用的处理函数个数
    pub fn dispatch<E: Send + Sync + 'static>(&self, event: &E) -> DependencyResult<usize> {
        self.lifecycle.check()?;
        self.events.dispatch(event)
    }

    // ========== 注册 ==========

    /// 注册组件 `T`
    pub fn register<T: Component>(&self) -> DependencyResult<Arc<ComponentDescriptor>> {
        self.lifecycle.check()?;
        Ok(self.register_internal(T::descriptor()))
    }

    /// 注册描述符，同一类型重复注册返回已有描述符
    pub fn register_descriptor(
        &self,
        descriptor: ComponentDescriptor,
    ) -> DependencyResult<Arc<ComponentDescriptor>> {
        self.lifecycle.check()?;
        Ok(self.register_internal(descriptor))
    }

    /// 以指定名称注册预先构建好的单例实例
    pub fn register_instance<T: Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
        instance: Arc<T>,
    ) -> DependencyResult<Arc<ComponentDescriptor>> {
        self.lifecycle.check()?;
        let name = name.into();
        let descriptor = self.register_internal(ComponentDescriptor::for_instance::<T>(name.clone()));
        let scope = self.scope_for(&ScopeTag::singleton())?;
        scope.put(
            ScopeEntry {
                name,
                type_key: *descriptor.type_key(),
                supertype: None,
            },
            instance as Instance,
        );
        info!(container = %self.config.name, component = descriptor.type_key().name, "注册组件实例");
        Ok(descriptor)
    }

    /// 查找已注册的描述符
    pub fn find_descriptor(&self, key: &TypeKey) -> Option<Arc<ComponentDescriptor>> {
        self.registry.find_by_type(key)
    }

    pub(crate) fn register_internal(&self, descriptor: ComponentDescriptor) -> Arc<ComponentDescriptor> {
        if let Some(existing) = self.registry.find_by_type(descriptor.type_key()) {
            return existing;
        }
        let descriptor = self
            .register_listeners
            .iter()
            .fold(descriptor, |descriptor, listener| listener.after_registered(descriptor));
        let registered = self.registry.register(descriptor);
        if !registered.is_resolved() {
            for dependency in registered.dependencies() {
                if let DependencyTarget::Type(key) = dependency.target() {
                    if self.registry.find_by_type(key).is_none() {
                        if let Some(described) = dependency.describe() {
                            self.register_internal(described);
                        }
                    }
                }
            }
            registered.mark_resolved();
        }
        registered
    }

    fn parse_type(&self, key: &TypeKey) -> Option<Arc<ComponentDescriptor>> {
        self.parsers
            .iter()
            .find_map(|parser| parser.parse(key))
            .map(|descriptor| self.register_internal(descriptor))
    }

    /// 注册表 → 依赖引用携带的描述符 → 解析器
    fn find_or_parse(
        &self,
        key: &TypeKey,
        reference: Option<&DependencyRef>,
    ) -> Option<Arc<ComponentDescriptor>> {
        if let Some(found) = self.registry.find_by_type(key) {
            return Some(found);
        }
        if key.is_abstract() {
            return None;
        }
        match reference.and_then(DependencyRef::describe) {
            Some(described) => Some(self.register_internal(described)),
            None => self.parse_type(key),
        }
    }

    fn find_by_name(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.registry.find_by_name(name).or_else(|| {
            self.registry
                .all()
                .into_iter()
                .find(|descriptor| descriptor.type_key().name == name)
        })
    }

    fn find_or_parse_name(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.find_by_name(name).or_else(|| {
            self.parsers
                .iter()
                .find_map(|parser| parser.parse_name(name))
                .map(|descriptor| self.register_internal(descriptor))
        })
    }

    // ========== 作用域 ==========

    fn scope_for(&self, tag: &ScopeTag) -> DependencyResult<Arc<dyn DependencyScope>> {
        if let Some(scope) = self.scopes.get(tag) {
            return Ok(scope.value().clone());
        }
        let construct = tag.implementation().ok_or_else(|| DependencyError::ScopeNotFound {
            scope: tag.name().to_string(),
        })?;
        let scope = self
            .scopes
            .entry(tag.clone())
            .or_insert_with(|| {
                info!(container = %self.config.name, scope = %tag, "创建自定义作用域");
                construct()
            })
            .value()
            .clone();
        Ok(scope)
    }

    fn lookup_scope(
        scope: &dyn DependencyScope,
        descriptor: &ComponentDescriptor,
    ) -> Option<Instance> {
        if descriptor.has_custom_name() {
            if let Some(found) = scope.get_by_name(descriptor.name()) {
                return Some(found);
            }
        }
        scope.get_by_type(descriptor.type_key())
    }

    // ========== 创建 ==========

    fn get_or_create(
        &self,
        descriptor: &Arc<ComponentDescriptor>,
        depth: usize,
    ) -> DependencyResult<Instance> {
        let scope = self.scope_for(descriptor.scope())?;
        if let Some(existing) = Self::lookup_scope(scope.as_ref(), descriptor) {
            return Ok(existing);
        }
        let entry = ScopeEntry {
            name: descriptor.name().to_string(),
            type_key: *descriptor.type_key(),
            supertype: descriptor.supertype().map(|binding| binding.key),
        };
        self.create_and_store(descriptor, depth, &scope, entry)
    }

    fn get_or_create_factory(
        &self,
        descriptor: &Arc<ComponentDescriptor>,
        depth: usize,
    ) -> DependencyResult<Instance> {
        if let Some(existing) = self.factories.get_by_type(descriptor.type_key()) {
            return Ok(existing);
        }
        let entry = ScopeEntry {
            name: descriptor.name().to_string(),
            type_key: *descriptor.type_key(),
            supertype: None,
        };
        self.create_and_store(descriptor, depth, &self.factories, entry)
    }

    fn create_and_store(
        &self,
        descriptor: &Arc<ComponentDescriptor>,
        depth: usize,
        scope: &Arc<dyn DependencyScope>,
        entry: ScopeEntry,
    ) -> DependencyResult<Instance> {
        let type_name = descriptor.type_key().name;
        if depth > self.config.max_resolution_depth {
            return Err(DependencyError::resolution_failed(
                type_name,
                format!("解析深度超过上限 {}", self.config.max_resolution_depth),
            ));
        }

        let key = InFlightKey::Component(*descriptor.type_key());
        match self.holder.lookup(&key) {
            InFlight::Absent => {}
            InFlight::EarlyReference(early) if self.config.allow_early_references => {
                debug!(component = type_name, "发放早期引用");
                self.holder.mark_lent(&key);
                return Ok(early);
            }
            InFlight::EarlyReference(_) | InFlight::Constructing => {
                let error = self.holder.circular(&key);
                warn!(component = type_name, %error, "拒绝循环依赖");
                return Err(error);
            }
        }

        let guard = self.holder.begin(key)?;
        let span = debug_span!("create_component", component = type_name, depth);
        let _entered = span.enter();
        debug!("开始创建组件");

        let instance = self.instantiate(descriptor, depth)?;
        guard.instantiated(instance.clone());

        self.inject(descriptor, &instance, depth)?;
        guard.injected();

        let mut component = instance;
        for listener in &self.creation_listeners {
            component = listener.after_created(descriptor, component)?;
        }
        if descriptor.is_advised() {
            let proxy = self.weave(descriptor, component, depth)?;
            component = Arc::new(proxy) as Instance;
        }

        let stored = scope.put(entry.clone(), component.clone());
        let created = Arc::ptr_eq(&stored, &component);
        if created {
            guard.stored(StoredEntry {
                scope: scope.clone(),
                entry,
                instance: stored.clone(),
            });
        }
        guard.complete();

        if created {
            let target = Self::hook_target(&stored);
            descriptor
                .attach_events(target, &self.events)
                .and_then(|()| descriptor.invoke_init(target))
                .map_err(|source| DependencyError::creation_failed(type_name, source))?;
            debug!("组件创建完成");
        } else {
            debug!("作用域中已有实例，丢弃本次创建的实例");
        }
        Ok(stored)
    }

    fn instantiate(
        &self,
        descriptor: &ComponentDescriptor,
        depth: usize,
    ) -> DependencyResult<Instance> {
        let type_name = descriptor.type_key().name;
        match descriptor.strategy() {
            None => Err(DependencyError::configuration(format!(
                "组件 {type_name} 没有构造方式"
            ))),
            Some(CreationStrategy::Constructor(info)) => {
                let args = self.resolve_arguments(&info.parameters, depth)?;
                info.invoke(&args)
                    .map_err(|source| DependencyError::creation_failed(type_name, source))
            }
            Some(CreationStrategy::Factory(info)) => {
                let provider = match &info.declaring {
                    Some(declaring) => Some(self.resolve_factory_ref(declaring, depth + 1)?),
                    None => None,
                };
                let args = self.resolve_arguments(&info.parameters, depth)?;
                info.invoke(provider.as_ref(), &args)
                    .map_err(|source| DependencyError::creation_failed(type_name, source))
            }
        }
    }

    fn inject(
        &self,
        descriptor: &ComponentDescriptor,
        instance: &Instance,
        depth: usize,
    ) -> DependencyResult<()> {
        for point in descriptor.injection_points() {
            let args = self.resolve_arguments(&point.dependencies, depth)?;
            point.apply(instance, &args).map_err(|source| {
                DependencyError::creation_failed(
                    descriptor.type_key().name,
                    source.context(format!("注入 {} 失败", point.name)),
                )
            })?;
        }
        Ok(())
    }

    fn weave(
        &self,
        descriptor: &ComponentDescriptor,
        target: Instance,
        depth: usize,
    ) -> DependencyResult<AspectProxy> {
        let mut interceptors = Vec::with_capacity(descriptor.advised_by().len());
        for advisor in descriptor.advised_by() {
            let DependencyTarget::Type(key) = advisor.target() else {
                return Err(DependencyError::configuration(format!(
                    "拦截器引用 {} 必须按类型声明",
                    advisor.display_name()
                )));
            };
            let interceptor = self
                .find_or_parse(key, Some(advisor))
                .ok_or_else(|| DependencyError::not_registered(key.name))?;
            let instance = self.resolve_interceptor(&interceptor, depth + 1)?;
            interceptors.push((interceptor, instance));
        }
        AspectProxy::weave(descriptor, target, &interceptors)
    }

    /// 钩子作用于原始实例，被代理的组件取其目标
    fn hook_target(instance: &Instance) -> &Instance {
        match (**instance).downcast_ref::<AspectProxy>() {
            Some(proxy) => proxy.target(),
            None => instance,
        }
    }

    // ========== 依赖解析 ==========

    fn resolve_arguments(
        &self,
        parameters: &[DependencyRef],
        depth: usize,
    ) -> DependencyResult<Arguments> {
        parameters
            .iter()
            .map(|parameter| self.resolve_dependency(parameter, depth + 1))
            .collect::<DependencyResult<Vec<_>>>()
            .map(Arguments::new)
    }

    fn resolve_dependency(
        &self,
        dependency: &DependencyRef,
        depth: usize,
    ) -> DependencyResult<Instance> {
        match dependency.target() {
            DependencyTarget::Type(key) => self.resolve_type(key, Some(dependency), depth),
            DependencyTarget::Name(name) => self.resolve_name(name, depth)?.ok_or_else(|| {
                DependencyError::resolution_failed(
                    dependency.display_name(),
                    "没有使用该名称的组件",
                )
            }),
            DependencyTarget::Supertype(key) => {
                let items = self
                    .collect_members(key, depth)?
                    .iter()
                    .map(ComponentRef::cast_to_supertype)
                    .collect::<DependencyResult<Vec<_>>>()?;
                dependency.collect(items)
            }
        }
    }

    fn ensure_visible(descriptor: &ComponentDescriptor) -> DependencyResult<()> {
        match descriptor.role() {
            ComponentRole::Ordinary => Ok(()),
            role => Err(DependencyError::ComponentNotVisible {
                type_name: descriptor.type_key().name.to_string(),
                role: role.to_string(),
            }),
        }
    }

    fn resolve_type(
        &self,
        key: &TypeKey,
        reference: Option<&DependencyRef>,
        depth: usize,
    ) -> DependencyResult<Instance> {
        let local = self.find_or_parse(key, reference);
        if let Some(descriptor) = &local {
            Self::ensure_visible(descriptor)?;
        }
        if !self.exports_type(key) {
            if let Some(importer) = self.importer() {
                if let Some(imported) = importer.import_by_type(key, self.id)? {
                    debug!(component = key.name, "从其他层导入组件");
                    return Ok(imported);
                }
            }
        }
        match local {
            Some(descriptor) => self.get_or_create(&descriptor, depth),
            None => Err(DependencyError::not_registered(key.name)),
        }
    }

    fn resolve_name(&self, name: &str, depth: usize) -> DependencyResult<Option<Instance>> {
        if let Some(descriptor) = self.find_or_parse_name(name) {
            Self::ensure_visible(&descriptor)?;
            return self.get_or_create(&descriptor, depth).map(Some);
        }
        if !self.exports_name(name) {
            if let Some(importer) = self.importer() {
                return importer.import_by_name(name, self.id);
            }
        }
        Ok(None)
    }

    fn resolve_factory_ref(
        &self,
        declaring: &DependencyRef,
        depth: usize,
    ) -> DependencyResult<Instance> {
        let DependencyTarget::Type(key) = declaring.target() else {
            return Err(DependencyError::configuration(format!(
                "工厂组件引用 {} 必须按类型声明",
                declaring.display_name()
            )));
        };
        self.resolve_factory(key, Some(declaring), depth)
    }

    fn resolve_factory(
        &self,
        key: &TypeKey,
        reference: Option<&DependencyRef>,
        depth: usize,
    ) -> DependencyResult<Instance> {
        let local = self.find_or_parse(key, reference);
        if let Some(descriptor) = &local {
            if descriptor.role() != ComponentRole::Factory {
                return Err(DependencyError::configuration(format!(
                    "{} 不是工厂组件",
                    key.name
                )));
            }
        }
        if !self.exports_type(key) {
            if let Some(importer) = self.importer() {
                if let Some(imported) = importer.import_factory(key, self.id)? {
                    return Ok(imported);
                }
            }
        }
        match local {
            Some(descriptor) => self.get_or_create_factory(&descriptor, depth),
            None => Err(DependencyError::not_registered(key.name)),
        }
    }

    fn resolve_interceptor(
        &self,
        descriptor: &Arc<ComponentDescriptor>,
        depth: usize,
    ) -> DependencyResult<Instance> {
        let key = descriptor.type_key();
        if descriptor.role() != ComponentRole::Interceptor {
            return Err(DependencyError::configuration(format!(
                "{} 不是拦截器组件",
                key.name
            )));
        }
        if !self.exports_type(key) {
            if let Some(importer) = self.importer() {
                if let Some(imported) = importer.import_interceptor(key, self.id)? {
                    return Ok(imported);
                }
            }
        }
        self.get_or_create(descriptor, depth)
    }

    /// 本容器内父类型下的全部普通多实现，作为一个整体创建
    fn members_by_supertype(&self, key: &TypeKey, depth: usize) -> DependencyResult<Vec<ComponentRef>> {
        let descriptors: Vec<_> = self
            .registry
            .find_by_supertype(key)
            .into_iter()
            .filter(|descriptor| descriptor.role() == ComponentRole::Ordinary)
            .collect();
        if descriptors.is_empty() {
            return Ok(Vec::new());
        }

        let batch = self.holder.begin(InFlightKey::Batch(*key))?;
        let mut members = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let instance = self.get_or_create(&descriptor, depth + 1)?;
            members.push(ComponentRef::new(descriptor, instance));
        }
        batch.complete();
        Ok(members)
    }

    /// 本容器的多实现加上其他层导出的多实现
    fn collect_members(&self, key: &TypeKey, depth: usize) -> DependencyResult<Vec<ComponentRef>> {
        let mut members = self.members_by_supertype(key, depth)?;
        if !self.exports_supertype(key) {
            if let Some(importer) = self.importer() {
                members.extend(importer.import_by_supertype(key, self.id)?);
            }
        }
        Ok(members)
    }

    // ========== 分层 ==========

    fn importer(&self) -> Option<Arc<dyn LayerImport>> {
        self.import.get().and_then(Weak::upgrade)
    }

    fn exports_type(&self, key: &TypeKey) -> bool {
        self.exports.iter().any(|export| match export {
            ExportDecl::Type(exported) => exported == key,
            ExportDecl::Name(name) => self
                .find_by_name(name)
                .is_some_and(|descriptor| descriptor.type_key() == key),
            ExportDecl::Supertype(supertype) => self
                .registry
                .find_by_supertype(supertype)
                .iter()
                .any(|descriptor| descriptor.type_key() == key),
        })
    }

    fn exports_name(&self, name: &str) -> bool {
        self.exports.iter().any(|export| match export {
            ExportDecl::Name(exported) => exported == name,
            ExportDecl::Type(key) => self
                .registry
                .find_by_type(key)
                .is_some_and(|descriptor| descriptor.name() == name),
            ExportDecl::Supertype(_) => false,
        })
    }

    fn exports_supertype(&self, key: &TypeKey) -> bool {
        self.exports
            .iter()
            .any(|export| matches!(export, ExportDecl::Supertype(exported) if exported == key))
    }

    // ========== 类型化接口 ==========

    /// 获取组件 `T`，首次获取时自动注册其描述符
    pub fn get<T: Component>(&self) -> DependencyResult<Arc<T>> {
        self.lifecycle.check()?;
        let instance = self.resolve_type(
            &TypeKey::of::<T>(),
            Some(&DependencyRef::of::<T>()),
            0,
        )?;
        Self::typed(instance)
    }

    /// 获取被拦截组件 `T` 的代理
    pub fn get_proxy<T: Component>(&self) -> DependencyResult<Arc<AspectProxy>> {
        self.lifecycle.check()?;
        let instance = self.resolve_type(
            &TypeKey::of::<T>(),
            Some(&DependencyRef::of::<T>()),
            0,
        )?;
        instance
            .downcast::<AspectProxy>()
            .map_err(|_| DependencyError::TypeMismatch {
                expected: format!("AspectProxy<{}>", std::any::type_name::<T>()),
                actual: std::any::type_name::<T>().to_string(),
            })
    }

    /// 按名称获取组件
    pub fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> DependencyResult<Option<Arc<T>>> {
        self.get_by_name(name)?.map(Self::typed).transpose()
    }

    /// 获取父类型 `S` 的全部多实现
    pub fn get_all<S: ?Sized + Send + Sync + 'static>(&self) -> DependencyResult<Vec<Arc<S>>> {
        self.lifecycle.check()?;
        let key = TypeKey::of_abstract::<S>();
        self.collect_members(&key, 0)?
            .iter()
            .map(|member| {
                member.cast_to_supertype()?.downcast::<Arc<S>>().map(|cast| *cast).map_err(|_| {
                    DependencyError::TypeMismatch {
                        expected: std::any::type_name::<Arc<S>>().to_string(),
                        actual: member.descriptor.type_key().name.to_string(),
                    }
                })
            })
            .collect()
    }

    fn typed<T: Send + Sync + 'static>(instance: Instance) -> DependencyResult<Arc<T>> {
        if (*instance).is::<AspectProxy>() {
            return Err(DependencyError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                actual: "AspectProxy, 被拦截的组件请使用 get_proxy 获取".to_string(),
            });
        }
        downcast_instance(instance)
    }

    /// 统计信息
    pub fn stats(&self) -> ContainerStats {
        let live_instances = self
            .scopes
            .iter()
            .map(|scope| scope.value().get_all_components().len())
            .sum::<usize>()
            + self.factories.get_all_components().len();
        ContainerStats {
            registered_components: self.registry.len(),
            live_instances,
            custom_scopes: self
                .scopes
                .iter()
                .filter(|scope| !scope.key().is_singleton() && !scope.key().is_prototype())
                .count(),
        }
    }

    // ========== 关闭 ==========

    /// 关闭容器：对所有存活实例调用销毁钩子，然后拒绝后续调用
    pub fn close(&self) -> DependencyResult<()> {
        if !self.lifecycle.begin_close() {
            return self.lifecycle.check();
        }
        info!(container = %self.config.name, "关闭容器");

        let scopes: Vec<Arc<dyn DependencyScope>> =
            self.scopes.iter().map(|scope| scope.value().clone()).collect();
        if self.config.invoke_destroy_hooks {
            let live: Vec<(TypeKey, Instance)> = scopes
                .iter()
                .chain(std::iter::once(&self.factories))
                .flat_map(|scope| scope.get_all_components())
                .map(|(entry, instance)| (entry.type_key, instance))
                .collect();
            for (key, instance) in live {
                self.destroy(&key, &instance);
            }
        }

        for scope in &scopes {
            scope.clear();
        }
        self.factories.clear();
        self.events.clear();
        self.lifecycle.finish_close();
        Ok(())
    }

    fn destroy(&self, key: &TypeKey, instance: &Instance) {
        let Some(descriptor) = self.registry.find_by_type(key) else {
            return;
        };
        if !descriptor.has_destroy_hook() {
            return;
        }
        if let Err(error) = descriptor.invoke_destroy(Self::hook_target(instance)) {
            warn!(component = key.name, %error, "销毁钩子执行失败");
        }
    }
}

impl DependencyContext for DependencyEnvironment {
    fn get_by_type(&self, key: &TypeKey) -> DependencyResult<Instance> {
        self.lifecycle.check()?;
        self.resolve_type(key, None, 0)
    }

    fn get_by_name(&self, name: &str) -> DependencyResult<Option<Instance>> {
        self.lifecycle.check()?;
        self.resolve_name(name, 0)
    }

    fn get_by_supertype(&self, key: &TypeKey) -> DependencyResult<Vec<Instance>> {
        self.lifecycle.check()?;
        Ok(self
            .collect_members(key, 0)?
            .into_iter()
            .map(|member| member.instance)
            .collect())
    }

    fn get_all_components(&self) -> DependencyResult<Vec<Instance>> {
        Ok(self
            .live_components()?
            .into_iter()
            .map(|(_, instance)| instance)
            .collect())
    }
}

impl FactoryContext for DependencyEnvironment {
    fn get_factory(&self, key: &TypeKey) -> DependencyResult<Instance> {
        self.lifecycle.check()?;
        self.resolve_factory(key, None, 0)
    }

    fn get_interceptor(&self, key: &TypeKey) -> DependencyResult<Instance> {
        self.lifecycle.check()?;
        if let Some(descriptor) = self.find_or_parse(key, None) {
            return self.resolve_interceptor(&descriptor, 0);
        }
        if let Some(importer) = self.importer() {
            if let Some(imported) = importer.import_interceptor(key, self.id)? {
                return Ok(imported);
            }
        }
        Err(DependencyError::not_registered(key.name))
    }
}

impl Layerable for DependencyEnvironment {
    fn container_id(&self) -> ContainerId {
        self.id
    }

    fn exports(&self) -> Vec<Arc<ComponentDescriptor>> {
        let mut exported: Vec<Arc<ComponentDescriptor>> = Vec::new();
        for export in &self.exports {
            match export {
                ExportDecl::Type(key) => exported.extend(self.registry.find_by_type(key)),
                ExportDecl::Name(name) => exported.extend(self.find_by_name(name)),
                ExportDecl::Supertype(key) => exported.extend(self.registry.find_by_supertype(key)),
            }
        }
        exported.dedup_by(|a, b| Arc::ptr_eq(a, b));
        exported
    }

    fn get_members_by_supertype(&self, key: &TypeKey) -> DependencyResult<Vec<ComponentRef>> {
        self.lifecycle.check()?;
        self.members_by_supertype(key, 0)
    }

    fn live_components(&self) -> DependencyResult<Vec<(ScopeEntry, Instance)>> {
        self.lifecycle.check()?;
        Ok(self
            .scopes
            .iter()
            .flat_map(|scope| scope.value().get_all_components())
            .filter(|(entry, _)| {
                self.registry
                    .find_by_type(&entry.type_key)
                    .map_or(true, |descriptor| descriptor.role() == ComponentRole::Ordinary)
            })
            .collect())
    }

    fn contains_type(&self, key: &TypeKey) -> bool {
        self.registry.find_by_type(key).is_some()
            || self.parsers.iter().any(|parser| parser.parse(key).is_some())
    }

    fn contains_name(&self, name: &str) -> bool {
        self.find_by_name(name).is_some()
            || self.parsers.iter().any(|parser| parser.parse_name(name).is_some())
    }

    fn contains_supertype(&self, key: &TypeKey) -> bool {
        !self.registry.find_by_supertype(key).is_empty()
    }

    fn set_import(&self, import: Weak<dyn LayerImport>) -> DependencyResult<()> {
        self.import.set(import).map_err(|_| {
            DependencyError::configuration(format!("容器 {} 已加入分层上下文", self.config.name))
        })
    }

    fn close(&self) -> DependencyResult<()> {
        DependencyEnvironment::close(self)
    }
}

impl std::fmt::Debug for DependencyEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyEnvironment")
            .field("id", &self.id)
            .field("name", &self.config.name)
            .field("status", &self.lifecycle.status())
            .field("registered", &self.registry.len())
            .finish()
    }
}

