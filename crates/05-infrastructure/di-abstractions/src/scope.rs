//! 作用域抽象
//!
//! 作用域决定组件实例的缓存方式和生命周期。单例和原型是内置作用域，
//! 自定义作用域通过 [`ScopeTag::with_implementation`] 关联实现类型，
//! 在第一次使用时由容器以无参方式创建。

use crate::descriptor::Instance;
use di_common::TypeKey;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 单例作用域名称
pub const SINGLETON_SCOPE: &str = "singleton";
/// 原型作用域名称
pub const PROTOTYPE_SCOPE: &str = "prototype";

/// 自定义作用域的无参构造函数
pub type ScopeConstructor = fn() -> Arc<dyn DependencyScope>;

fn construct_scope<S: DependencyScope + Default + 'static>() -> Arc<dyn DependencyScope> {
    Arc::new(S::default())
}

/// 作用域标签
///
/// 相等性只取决于名称。
#[derive(Clone)]
pub struct ScopeTag {
    name: Cow<'static, str>,
    implementation: Option<ScopeConstructor>,
}

impl ScopeTag {
    /// 单例作用域
    pub fn singleton() -> Self {
        Self {
            name: Cow::Borrowed(SINGLETON_SCOPE),
            implementation: None,
        }
    }

    /// 原型作用域
    pub fn prototype() -> Self {
        Self {
            name: Cow::Borrowed(PROTOTYPE_SCOPE),
            implementation: None,
        }
    }

    /// 未关联实现的自定义作用域，必须事先通过构建器注册作用域实例
    pub fn custom(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            implementation: None,
        }
    }

    /// 关联实现类型的自定义作用域
    pub fn with_implementation<S: DependencyScope + Default + 'static>(
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            implementation: Some(construct_scope::<S>),
        }
    }

    /// 作用域名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否为单例作用域
    pub fn is_singleton(&self) -> bool {
        self.name == SINGLETON_SCOPE
    }

    /// 是否为原型作用域
    pub fn is_prototype(&self) -> bool {
        self.name == PROTOTYPE_SCOPE
    }

    /// 关联的实现
    pub fn implementation(&self) -> Option<ScopeConstructor> {
        self.implementation
    }
}

impl Default for ScopeTag {
    fn default() -> Self {
        Self::singleton()
    }
}

impl PartialEq for ScopeTag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ScopeTag {}

impl Hash for ScopeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeTag")
            .field("name", &self.name)
            .field("has_implementation", &self.implementation.is_some())
            .finish()
    }
}

impl fmt::Display for ScopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// 作用域条目的键
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    /// 组件名称
    pub name: String,
    /// 组件类型
    pub type_key: TypeKey,
    /// 多实现组件声明的父类型
    pub supertype: Option<TypeKey>,
}

/// 作用域存储
///
/// 作用域存储是"组件是否已存在"的唯一依据。`put` 必须返回最终保存的实例：
/// 当同类型已有实例时返回已有实例，调用方以返回值为准。
pub trait DependencyScope: Send + Sync {
    /// 保存实例，返回作用域内实际保存的实例
    fn put(&self, entry: ScopeEntry, instance: Instance) -> Instance;

    /// 按类型获取
    fn get_by_type(&self, key: &TypeKey) -> Option<Instance>;

    /// 按名称获取
    fn get_by_name(&self, name: &str) -> Option<Instance>;

    /// 按父类型获取全部多实现
    fn get_by_abstract(&self, key: &TypeKey) -> Vec<Instance>;

    /// 作用域内所有存活实例
    fn get_all_components(&self) -> Vec<(ScopeEntry, Instance)>;

    /// 移除指定实例，只有当前保存的正是 `instance` 时才移除，返回是否移除
    ///
    /// 创建失败时容器用它撤回引用了半成品的实例。不缓存实例的作用域无需实现。
    fn evict(&self, _entry: &ScopeEntry, _instance: &Instance) -> bool {
        false
    }

    /// 清空作用域，容器关闭时调用
    fn clear(&self) {}
}
