//! 层导出集合

use di_abstractions::{ComponentDescriptor, ComponentRole};
use di_common::TypeKey;
use std::collections::HashSet;
use std::sync::Arc;

/// 层加入组合上下文时计算的导出快照
///
/// 普通组件按类型、名称、父类型分别登记；工厂组件和拦截器组件单独登记，
/// 只用于对应的专用查找。
#[derive(Debug, Clone, Default)]
pub struct ExportSet {
    types: HashSet<TypeKey>,
    names: HashSet<String>,
    supertypes: HashSet<TypeKey>,
    factories: HashSet<TypeKey>,
    interceptors: HashSet<TypeKey>,
}

impl ExportSet {
    /// 空导出集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 从导出的描述符计算
    pub fn from_descriptors(descriptors: &[Arc<ComponentDescriptor>]) -> Self {
        let mut set = Self::new();
        for descriptor in descriptors {
            let key = *descriptor.type_key();
            match descriptor.role() {
                ComponentRole::Ordinary => {
                    set.types.insert(key);
                    set.names.insert(descriptor.name().to_string());
                    if let Some(binding) = descriptor.supertype() {
                        set.supertypes.insert(binding.key);
                    }
                }
                ComponentRole::Factory => {
                    set.factories.insert(key);
                }
                ComponentRole::Interceptor => {
                    set.interceptors.insert(key);
                }
            }
        }
        set
    }

    /// 是否导出该类型的普通组件
    pub fn exports_type(&self, key: &TypeKey) -> bool {
        self.types.contains(key)
    }

    /// 是否导出该名称
    pub fn exports_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// 是否导出该父类型下的多实现
    pub fn exports_supertype(&self, key: &TypeKey) -> bool {
        self.supertypes.contains(key)
    }

    /// 是否导出该工厂组件
    pub fn exports_factory(&self, key: &TypeKey) -> bool {
        self.factories.contains(key)
    }

    /// 是否导出该拦截器组件
    pub fn exports_interceptor(&self, key: &TypeKey) -> bool {
        self.interceptors.contains(key)
    }

    /// 导出项总数
    pub fn len(&self) -> usize {
        self.types.len() + self.factories.len() + self.interceptors.len()
    }

    /// 是否没有任何导出
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
