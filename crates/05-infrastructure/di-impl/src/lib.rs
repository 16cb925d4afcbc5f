//! # 依赖注入具体实现
//!
//! 提供描述符注册表、内置作用域、在途组件缓存、拦截织入以及依赖环境。
//!
//! ```ignore
//! let environment = DependencyEnvironment::builder()
//!     .with_name("app")
//!     .with_component::<OrderService>()
//!     .build()?;
//! let service = environment.get::<OrderService>()?;
//! ```

pub mod builder;
pub mod environment;
pub mod holder;
pub mod registry;
pub mod scopes;
pub mod weaver;

pub use builder::EnvironmentBuilder;
pub use environment::{DependencyEnvironment, ExportDecl};
pub use holder::{CreationCache, CreationGuard, CreationPhase, InFlight, InFlightKey};
pub use registry::DefaultDescriptorRegistry;
pub use scopes::{PrototypeScope, SingletonScope};
pub use weaver::AspectProxy;
