//! 组件获取接口
//!
//! [`DependencyContext`] 是面向普通使用者的接口；工厂组件和拦截器组件
//! 只能通过 [`FactoryContext`] 获取。

use crate::descriptor::{downcast_instance, Instance};
use di_common::{DependencyResult, TypeKey};
use std::sync::Arc;

/// 依赖上下文 trait
pub trait DependencyContext: Send + Sync {
    /// 按类型获取，找不到描述符时返回解析错误
    fn get_by_type(&self, key: &TypeKey) -> DependencyResult<Instance>;

    /// 按名称获取，名称未注册时返回 `None`
    fn get_by_name(&self, name: &str) -> DependencyResult<Option<Instance>>;

    /// 按父类型获取全部多实现，没有注册时返回空列表
    fn get_by_supertype(&self, key: &TypeKey) -> DependencyResult<Vec<Instance>>;

    /// 所有已缓存的普通组件
    fn get_all_components(&self) -> DependencyResult<Vec<Instance>>;
}

/// 工厂与拦截器上下文 trait
pub trait FactoryContext: Send + Sync {
    /// 获取声明工厂方法的组件
    fn get_factory(&self, key: &TypeKey) -> DependencyResult<Instance>;

    /// 获取拦截器组件
    fn get_interceptor(&self, key: &TypeKey) -> DependencyResult<Instance>;
}

/// 带类型转换的便捷方法
pub trait DependencyContextExt: DependencyContext {
    /// 按类型获取并转换
    fn resolve<T: Send + Sync + 'static>(&self) -> DependencyResult<Arc<T>> {
        downcast_instance(self.get_by_type(&TypeKey::of::<T>())?)
    }

    /// 按名称获取并转换
    fn resolve_named<T: Send + Sync + 'static>(&self, name: &str) -> DependencyResult<Option<Arc<T>>> {
        self.get_by_name(name)?.map(downcast_instance).transpose()
    }
}

impl<C: DependencyContext + ?Sized> DependencyContextExt for C {}
