//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义组件描述符、注册表、作用域和拦截模型的核心接口。
//!
//! ## 核心接口
//!
//! - [`ComponentDescriptor`] - 组件描述符，容器唯一认识的组件元数据
//! - [`Component`] / [`DescriptorParser`] - 描述符来源（自省接口）
//! - [`DescriptorRegistry`] - 描述符注册表接口
//! - [`DependencyScope`] - 可插拔的作用域存储
//! - [`DependencyContext`] / [`FactoryContext`] - 组件获取接口
//! - [`Invocable`] / [`AdviceSlot`] / [`ProcessPoint`] - 方法拦截模型
//! - [`Layerable`] / [`LayerImport`] - 分层组合接口
//! - [`Events`] - 容器持有的事件总线

pub mod component;
pub mod container;
pub mod descriptor;
pub mod event;
pub mod interceptor;
pub mod layer;
pub mod registry;
pub mod resolver;
pub mod scope;

pub use component::*;
pub use container::*;
pub use descriptor::*;
pub use event::*;
pub use interceptor::*;
pub use layer::*;
pub use registry::*;
pub use resolver::*;
pub use scope::*;
