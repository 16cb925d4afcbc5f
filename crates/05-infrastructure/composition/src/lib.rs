//! # 分层组合
//!
//! 把多个独立构建的依赖环境组合为一个上下文，并按导出声明控制层间可见性。
//!
//! ```ignore
//! use di_composition::LayerContext;
//! use di_impl::DependencyEnvironment;
//!
//! let storage = DependencyEnvironment::builder()
//!     .with_name("storage")
//!     .export_by_type::<Repository>()
//!     .build()?;
//! let app = DependencyEnvironment::builder().with_name("app").build()?;
//!
//! let context = LayerContext::builder(app.clone())
//!     .with_layer(storage.clone())
//!     .build()?;
//! let repository = context.resolve::<Repository>()?;
//! ```

pub mod exports;
pub mod layer;
pub mod logging;

pub use exports::ExportSet;
pub use layer::{LayerContext, LayerContextBuilder};
pub use logging::{init_logging, LoggingConfig};
