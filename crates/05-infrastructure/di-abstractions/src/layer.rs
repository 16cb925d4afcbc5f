//! 分层组合抽象
//!
//! 一个容器可以作为层加入组合上下文。层通过 [`Layerable`] 暴露导出的描述符，
//! 组合上下文通过 [`LayerImport`] 为层内容器提供跨层查找。

use crate::descriptor::{ComponentDescriptor, ComponentRef, Instance};
use crate::resolver::{DependencyContext, FactoryContext};
use crate::scope::ScopeEntry;
use di_common::{ContainerId, DependencyResult, TypeKey};
use std::sync::{Arc, Weak};

/// 可作为层加入组合的容器
pub trait Layerable: DependencyContext + FactoryContext {
    /// 容器标识
    fn container_id(&self) -> ContainerId;

    /// 导出的描述符
    fn exports(&self) -> Vec<Arc<ComponentDescriptor>>;

    /// 按父类型获取全部多实现及其描述符
    fn get_members_by_supertype(&self, key: &TypeKey) -> DependencyResult<Vec<ComponentRef>>;

    /// 普通组件的存活实例及其作用域条目，被拦截的组件以代理出现但条目仍是原类型
    fn live_components(&self) -> DependencyResult<Vec<(ScopeEntry, Instance)>>;

    /// 是否拥有该类型的描述符
    fn contains_type(&self, key: &TypeKey) -> bool;

    /// 是否拥有该名称的描述符
    fn contains_name(&self, name: &str) -> bool;

    /// 是否拥有该父类型的多实现
    fn contains_supertype(&self, key: &TypeKey) -> bool;

    /// 设置跨层查找入口
    fn set_import(&self, import: Weak<dyn LayerImport>) -> DependencyResult<()>;

    /// 关闭容器
    fn close(&self) -> DependencyResult<()>;
}

/// 跨层查找入口
///
/// `from` 为发起请求的容器，组合上下文不会把请求再委托回它。
pub trait LayerImport: Send + Sync {
    /// 按类型查找
    fn import_by_type(&self, key: &TypeKey, from: ContainerId) -> DependencyResult<Option<Instance>>;

    /// 按名称查找
    fn import_by_name(&self, name: &str, from: ContainerId) -> DependencyResult<Option<Instance>>;

    /// 按父类型查找
    fn import_by_supertype(
        &self,
        key: &TypeKey,
        from: ContainerId,
    ) -> DependencyResult<Vec<ComponentRef>>;

    /// 查找工厂组件
    fn import_factory(&self, key: &TypeKey, from: ContainerId) -> DependencyResult<Option<Instance>>;

    /// 查找拦截器组件
    fn import_interceptor(&self, key: &TypeKey, from: ContainerId) -> DependencyResult<Option<Instance>>;
}
