//! # DI Common
//!
//! Lorn ADSP 依赖注入容器的公共基础：错误分类、类型标识与容器生命周期状态。
//!
//! ## 核心内容
//!
//! - [`DependencyError`] - 容器所有操作共用的错误类型
//! - [`TypeKey`] - 组件类型的运行时标识
//! - [`ContainerId`] - 容器实例标识，用于分层组合时判断请求来源
//! - [`LifecycleGuard`] - 容器关闭后拒绝一切调用的状态守卫

pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
