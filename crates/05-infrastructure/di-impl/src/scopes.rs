//! 内置作用域实现

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use di_abstractions::{DependencyScope, Instance, ScopeEntry};
use di_common::TypeKey;
use std::sync::Arc;
use tracing::trace;

/// 单例作用域：每个类型在容器内只保存一个实例
#[derive(Default)]
pub struct SingletonScope {
    by_type: DashMap<TypeKey, (ScopeEntry, Instance)>,
    by_name: DashMap<String, Instance>,
    by_supertype: DashMap<TypeKey, Vec<Instance>>,
}

impl SingletonScope {
    /// 创建空的单例作用域
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存实例数
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

impl DependencyScope for SingletonScope {
    fn put(&self, entry: ScopeEntry, instance: Instance) -> Instance {
        match self.by_type.entry(entry.type_key) {
            Entry::Occupied(existing) => {
                trace!(component = %entry.type_key, "单例已存在，沿用已有实例");
                existing.get().1.clone()
            }
            Entry::Vacant(slot) => {
                self.by_name
                    .entry(entry.name.clone())
                    .or_insert_with(|| instance.clone());
                if let Some(supertype) = entry.supertype {
                    self.by_supertype
                        .entry(supertype)
                        .or_default()
                        .push(instance.clone());
                }
                slot.insert((entry, instance.clone()));
                instance
            }
        }
    }

    fn get_by_type(&self, key: &TypeKey) -> Option<Instance> {
        self.by_type.get(key).map(|stored| stored.1.clone())
    }

    fn get_by_name(&self, name: &str) -> Option<Instance> {
        self.by_name.get(name).map(|stored| stored.clone())
    }

    fn get_by_abstract(&self, key: &TypeKey) -> Vec<Instance> {
        self.by_supertype
            .get(key)
            .map(|stored| stored.clone())
            .unwrap_or_default()
    }

    fn get_all_components(&self) -> Vec<(ScopeEntry, Instance)> {
        self.by_type
            .iter()
            .map(|stored| stored.value().clone())
            .collect()
    }

    fn evict(&self, entry: &ScopeEntry, instance: &Instance) -> bool {
        let removed = self
            .by_type
            .remove_if(&entry.type_key, |_, stored| Arc::ptr_eq(&stored.1, instance))
            .is_some();
        if removed {
            self.by_name
                .remove_if(entry.name.as_str(), |_, stored| Arc::ptr_eq(stored, instance));
            if let Some(supertype) = entry.supertype {
                if let Some(mut members) = self.by_supertype.get_mut(&supertype) {
                    members.retain(|member| !Arc::ptr_eq(member, instance));
                }
            }
            trace!(component = %entry.type_key, "移除单例");
        }
        removed
    }

    fn clear(&self) {
        self.by_type.clear();
        self.by_name.clear();
        self.by_supertype.clear();
    }
}

/// 原型作用域：不保存任何实例，每次获取都重新创建
#[derive(Debug, Default, Clone, Copy)]
pub struct PrototypeScope;

impl DependencyScope for PrototypeScope {
    fn put(&self, _entry: ScopeEntry, instance: Instance) -> Instance {
        instance
    }

    fn get_by_type(&self, _key: &TypeKey) -> Option<Instance> {
        None
    }

    fn get_by_name(&self, _name: &str) -> Option<Instance> {
        None
    }

    fn get_by_abstract(&self, _key: &TypeKey) -> Vec<Instance> {
        Vec::new()
    }

    fn get_all_components(&self) -> Vec<(ScopeEntry, Instance)> {
        Vec::new()
    }
}

/// 内置作用域实例
pub(crate) fn builtin_scopes() -> (Arc<dyn DependencyScope>, Arc<dyn DependencyScope>) {
    (Arc::new(SingletonScope::new()), Arc::new(PrototypeScope))
}
