//! 元数据定义
//!
//! 提供组件类型和容器实例的标识信息

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// 可直接实例化的具体类型
    Concrete,
    /// 抽象类型（trait 对象），只能通过多实现集合访问
    Abstract,
}

/// 类型标识
///
/// 相等性与哈希只取决于 [`TypeId`]，名称仅用于诊断和作为组件的默认名称。
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    /// 类型ID
    pub id: TypeId,
    /// 完整类型名称
    pub name: &'static str,
    /// 类型种类
    pub kind: TypeKind,
}

impl TypeKey {
    /// 从具体类型获取类型标识
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: TypeKind::Concrete,
        }
    }

    /// 从抽象类型获取类型标识，通常是 `dyn Trait`
    pub fn of_abstract<T: ?Sized + 'static>() -> Self {
        Self {
            kind: TypeKind::Abstract,
            ..Self::of::<T>()
        }
    }

    /// 是否为抽象类型
    pub fn is_abstract(&self) -> bool {
        self.kind == TypeKind::Abstract
    }

    /// 类型的规范名称，同时也是组件的默认名称
    pub fn canonical_name(&self) -> &'static str {
        self.name
    }

    /// 获取简短的类型名称（不包含模块路径）
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 容器实例标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(uuid::Uuid);

impl ContainerId {
    /// 生成新的容器标识
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// 底层 UUID
    pub fn as_uuid(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
