//! 描述符注册表抽象接口

use crate::descriptor::ComponentDescriptor;
use crate::scope::ScopeTag;
use di_common::TypeKey;
use std::sync::Arc;

/// 描述符注册表 trait
///
/// 注册是幂等的：同一类型重复注册时返回第一次注册的描述符。
pub trait DescriptorRegistry: Send + Sync {
    /// 注册描述符，返回注册表中实际保存的描述符
    fn register(&self, descriptor: ComponentDescriptor) -> Arc<ComponentDescriptor>;

    /// 按类型查找，抽象类型永远返回 `None`
    fn find_by_type(&self, key: &TypeKey) -> Option<Arc<ComponentDescriptor>>;

    /// 按名称查找
    fn find_by_name(&self, name: &str) -> Option<Arc<ComponentDescriptor>>;

    /// 按父类型查找全部多实现，按注册顺序
    fn find_by_supertype(&self, key: &TypeKey) -> Vec<Arc<ComponentDescriptor>>;

    /// 按作用域查找
    fn find_by_scope(&self, scope: &ScopeTag) -> Vec<Arc<ComponentDescriptor>>;

    /// 所有已注册描述符
    fn all(&self) -> Vec<Arc<ComponentDescriptor>>;

    /// 已注册数量
    fn len(&self) -> usize;

    /// 是否为空
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 组件注册监听器
///
/// 在描述符存入注册表之前调用，可以替换描述符。
pub trait RegisterListener: Send + Sync {
    /// 描述符注册回调
    fn after_registered(&self, descriptor: ComponentDescriptor) -> ComponentDescriptor;
}

impl<F> RegisterListener for F
where
    F: Fn(ComponentDescriptor) -> ComponentDescriptor + Send + Sync,
{
    fn after_registered(&self, descriptor: ComponentDescriptor) -> ComponentDescriptor {
        self(descriptor)
    }
}
