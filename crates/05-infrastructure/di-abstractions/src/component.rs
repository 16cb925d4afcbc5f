//! 组件描述符来源
//!
//! 容器不做任何运行时反射。类型通过 [`Component`] 发布自己的描述符，
//! 或者由 [`DescriptorParser`] 按类型标识/名称提供描述符。

use crate::descriptor::{ComponentDescriptor, DescribeFn};
use di_common::TypeKey;
use std::collections::HashMap;

/// 组件 trait
///
/// 实现者描述自己如何被构造、注入和拦截。
pub trait Component: Send + Sync + 'static {
    /// 组件描述符
    fn descriptor() -> ComponentDescriptor;
}

/// 描述符解析器
///
/// 注册表中找不到描述符时，容器按顺序询问已配置的解析器。
pub trait DescriptorParser: Send + Sync {
    /// 按类型解析
    fn parse(&self, key: &TypeKey) -> Option<ComponentDescriptor>;

    /// 按名称解析
    fn parse_name(&self, _name: &str) -> Option<ComponentDescriptor> {
        None
    }
}

/// 组件目录，内置的描述符解析器
#[derive(Debug, Default, Clone)]
pub struct ComponentCatalog {
    entries: HashMap<TypeKey, DescribeFn>,
}

impl ComponentCatalog {
    /// 创建空目录
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加组件
    pub fn with<T: Component>(mut self) -> Self {
        self.insert::<T>();
        self
    }

    /// 添加组件
    pub fn insert<T: Component>(&mut self) {
        self.entries.insert(TypeKey::of::<T>(), T::descriptor);
    }

    /// 目录中的组件数量
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 目录是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DescriptorParser for ComponentCatalog {
    fn parse(&self, key: &TypeKey) -> Option<ComponentDescriptor> {
        self.entries.get(key).map(|describe| describe())
    }

    fn parse_name(&self, name: &str) -> Option<ComponentDescriptor> {
        self.entries
            .values()
            .map(|describe| describe())
            .find(|descriptor| descriptor.name() == name)
    }
}
