//! 描述符注册表实现

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use di_abstractions::{ComponentDescriptor, DescriptorRegistry, ScopeTag};
use di_common::TypeKey;
use std::sync::Arc;
use tracing::{debug, warn};

/// 默认描述符注册表
///
/// 四个索引：按类型、按名称（仅自定义名称）、按父类型（仅多实现）、按作用域。
/// 只有赢得按类型插入的线程才会写入其余索引，并发注册同一类型时收敛到同一个描述符。
#[derive(Default)]
pub struct DefaultDescriptorRegistry {
    by_type: DashMap<TypeKey, Arc<ComponentDescriptor>>,
    by_name: DashMap<String, Arc<ComponentDescriptor>>,
    by_supertype: DashMap<TypeKey, Vec<Arc<ComponentDescriptor>>>,
    by_scope: DashMap<ScopeTag, Vec<Arc<ComponentDescriptor>>>,
}

impl DefaultDescriptorRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    fn index(&self, descriptor: &Arc<ComponentDescriptor>) {
        if descriptor.has_custom_name() {
            match self.by_name.entry(descriptor.name().to_string()) {
                Entry::Occupied(existing) => warn!(
                    name = descriptor.name(),
                    existing = existing.get().type_key().name,
                    ignored = descriptor.type_key().name,
                    "组件名称已被占用，忽略重复名称"
                ),
                Entry::Vacant(slot) => {
                    slot.insert(descriptor.clone());
                }
            }
        }
        if let Some(binding) = descriptor.supertype() {
            self.by_supertype
                .entry(binding.key)
                .or_default()
                .push(descriptor.clone());
        }
        self.by_scope
            .entry(descriptor.scope().clone())
            .or_default()
            .push(descriptor.clone());
    }
}

impl DescriptorRegistry for DefaultDescriptorRegistry {
    fn register(&self, descriptor: ComponentDescriptor) -> Arc<ComponentDescriptor> {
        let stored = match self.by_type.entry(*descriptor.type_key()) {
            Entry::Occupied(existing) => return existing.get().clone(),
            Entry::Vacant(slot) => slot.insert(Arc::new(descriptor)).value().clone(),
        };
        self.index(&stored);
        stored.mark_registered();
        debug!(
            component = stored.type_key().name,
            name = stored.name(),
            scope = %stored.scope(),
            "注册组件描述符"
        );
        stored
    }

    fn find_by_type(&self, key: &TypeKey) -> Option<Arc<ComponentDescriptor>> {
        if key.is_abstract() {
            return None;
        }
        self.by_type.get(key).map(|entry| entry.value().clone())
    }

    fn find_by_name(&self, name: &str) -> Option<Arc<ComponentDescriptor>> {
        self.by_name.get(name).map(|entry| entry.value().clone())
    }

    fn find_by_supertype(&self, key: &TypeKey) -> Vec<Arc<ComponentDescriptor>> {
        self.by_supertype
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn find_by_scope(&self, scope: &ScopeTag) -> Vec<Arc<ComponentDescriptor>> {
        self.by_scope
            .get(scope)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn all(&self) -> Vec<Arc<ComponentDescriptor>> {
        self.by_type.iter().map(|entry| entry.value().clone()).collect()
    }

    fn len(&self) -> usize {
        self.by_type.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{Component, DependencyRef};

    trait Plugin: Send + Sync {}

    #[derive(Default)]
    struct Alpha;
    impl Plugin for Alpha {}

    #[derive(Default)]
    struct Beta;
    impl Plugin for Beta {}

    #[derive(Default)]
    struct Host;

    impl Component for Alpha {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Self>()
                .named("alpha")
                .implements::<dyn Plugin>(|a| a)
                .default_constructor()
                .build()
        }
    }

    impl Component for Beta {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Self>()
                .implements::<dyn Plugin>(|b| b)
                .prototype()
                .default_constructor()
                .build()
        }
    }

    impl Component for Host {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Self>()
                .default_constructor()
                .field("plugins", DependencyRef::all_of::<dyn Plugin>(), |_, _| Ok(()))
                .build()
        }
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = DefaultDescriptorRegistry::new();
        let first = registry.register(Host::descriptor());
        let second = registry.register(Host::descriptor());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_registered());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find_by_scope(&ScopeTag::singleton()).len(), 1);
    }

    #[test]
    fn test_indexes() {
        let registry = DefaultDescriptorRegistry::new();
        registry.register(Alpha::descriptor());
        registry.register(Beta::descriptor());
        registry.register(Host::descriptor());

        // 只有自定义名称进入名称索引
        assert!(registry.find_by_name("alpha").is_some());
        assert!(registry.find_by_name(std::any::type_name::<Host>()).is_none());

        let plugins = registry.find_by_supertype(&TypeKey::of_abstract::<dyn Plugin>());
        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].type_key(), &TypeKey::of::<Alpha>());
        assert_eq!(registry.find_by_scope(&ScopeTag::prototype()).len(), 1);
        assert_eq!(registry.find_by_scope(&ScopeTag::singleton()).len(), 2);
    }

    #[test]
    fn test_abstract_lookup_by_type_is_none() {
        let registry = DefaultDescriptorRegistry::new();
        registry.register(Alpha::descriptor());
        assert!(registry
            .find_by_type(&TypeKey::of_abstract::<dyn Plugin>())
            .is_none());
        assert!(registry.find_by_type(&TypeKey::of::<Alpha>()).is_some());
    }

    #[test]
    fn test_concurrent_registration_converges() {
        let registry = Arc::new(DefaultDescriptorRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.register(Alpha::descriptor()))
            })
            .collect();
        let stored: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(stored.iter().all(|d| Arc::ptr_eq(d, &stored[0])));
        assert_eq!(registry.find_by_supertype(&TypeKey::of_abstract::<dyn Plugin>()).len(), 1);
    }
}
