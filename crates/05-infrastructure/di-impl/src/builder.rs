//! 依赖环境构建器

use crate::environment::{DependencyEnvironment, ExportDecl};
use di_abstractions::{
    Component, ComponentDescriptor, ContainerConfig, CreationListener, DependencyScope,
    DescriptorParser, RegisterListener, ScopeTag,
};
use di_common::{DependencyResult, TypeKey};
use std::any::Any;
use std::sync::Arc;
use tracing::info;

type InstanceRegistration = Box<dyn FnOnce(&DependencyEnvironment) -> DependencyResult<()> + Send>;

/// 依赖环境构建器
///
/// 使用建造者模式声明组件、作用域、解析器、监听器和导出项。
/// 组件在 [`build`](Self::build) 时注册，实例仍然在首次获取时创建。
pub struct EnvironmentBuilder {
    /// 容器配置
    config: ContainerConfig,
    /// 预先声明的组件描述符
    descriptors: Vec<ComponentDescriptor>,
    /// 预先构建的实例
    instances: Vec<InstanceRegistration>,
    /// 自定义作用域实例
    scopes: Vec<(ScopeTag, Arc<dyn DependencyScope>)>,
    /// 描述符解析器
    parsers: Vec<Box<dyn DescriptorParser>>,
    /// 注册监听器
    register_listeners: Vec<Arc<dyn RegisterListener>>,
    /// 创建监听器
    creation_listeners: Vec<Arc<dyn CreationListener>>,
    /// 导出声明
    exports: Vec<ExportDecl>,
}

impl EnvironmentBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            descriptors: Vec::new(),
            instances: Vec::new(),
            scopes: Vec::new(),
            parsers: Vec::new(),
            register_listeners: Vec::new(),
            creation_listeners: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// 使用完整配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置容器名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// 设置最大解析深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.config.max_resolution_depth = depth;
        self
    }

    /// 声明组件 `T`
    pub fn with_component<T: Component>(mut self) -> Self {
        self.descriptors.push(T::descriptor());
        self
    }

    /// 声明组件描述符
    pub fn with_descriptor(mut self, descriptor: ComponentDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// 以指定名称注册预先构建的单例实例
    pub fn with_instance<T: Send + Sync + 'static>(mut self, name: impl Into<String>, instance: Arc<T>) -> Self {
        let name = name.into();
        self.instances.push(Box::new(move |environment: &DependencyEnvironment| {
            environment.register_instance(name, instance).map(|_| ())
        }));
        self
    }

    /// 注册自定义作用域实例
    pub fn with_scope(mut self, tag: ScopeTag, scope: Arc<dyn DependencyScope>) -> Self {
        self.scopes.push((tag, scope));
        self
    }

    /// 添加描述符解析器，注册表未命中时按添加顺序尝试
    pub fn with_parser(mut self, parser: Box<dyn DescriptorParser>) -> Self {
        self.parsers.push(parser);
        self
    }

    /// 添加注册监听器
    pub fn after_register(mut self, listener: Arc<dyn RegisterListener>) -> Self {
        self.register_listeners.push(listener);
        self
    }

    /// 添加创建监听器
    pub fn after_created(mut self, listener: Arc<dyn CreationListener>) -> Self {
        self.creation_listeners.push(listener);
        self
    }

    /// 导出组件 `T`，同时声明该组件
    pub fn export_by_type<T: Component>(mut self) -> Self {
        self.exports.push(ExportDecl::Type(TypeKey::of::<T>()));
        self.with_component::<T>()
    }

    /// 按名称导出
    pub fn export_by_name(mut self, name: impl Into<String>) -> Self {
        self.exports.push(ExportDecl::Name(name.into()));
        self
    }

    /// 导出父类型 `S` 下的全部多实现
    pub fn export_by_supertype<S: ?Sized + Any>(mut self) -> Self {
        self.exports
            .push(ExportDecl::Supertype(TypeKey::of_abstract::<S>()));
        self
    }

    /// 构建依赖环境
    pub fn build(self) -> DependencyResult<Arc<DependencyEnvironment>> {
        let environment = DependencyEnvironment::from_parts(
            self.config,
            self.parsers,
            self.register_listeners,
            self.creation_listeners,
            self.scopes,
            self.exports,
        );
        let declared = self.descriptors.len();
        for descriptor in self.descriptors {
            environment.register_descriptor(descriptor)?;
        }
        for register in self.instances {
            register(&environment)?;
        }

        info!(
            container = environment.name(),
            id = %environment.id(),
            declared,
            registered = environment.stats().registered_components,
            "依赖环境构建完成"
        );
        Ok(Arc::new(environment))
    }
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
