//! 错误类型定义

use thiserror::Error;

/// 依赖注入错误类型
///
/// 分为五类：解析失败、循环依赖、实例化失败、配置错误、容器已关闭；
/// 另有事件处理失败，只由事件分发返回。
/// 每次 `get*` 调用的失败都会直接返回给调用方，容器内部不做重试。
#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("组件未注册: {type_name}")]
    ComponentNotRegistered { type_name: String },

    #[error("依赖解析失败: {type_name}, 原因: {message}")]
    DependencyResolutionFailed { type_name: String, message: String },

    #[error("组件不可见: {type_name} 是{role}组件, 只能通过专用接口获取")]
    ComponentNotVisible { type_name: String, role: String },

    #[error("组件类型不匹配: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("循环依赖检测到: {dependency_chain}")]
    CircularDependency { dependency_chain: String },

    #[error("组件创建失败: {type_name}, 原因: {source}")]
    ComponentCreationFailed {
        type_name: String,
        source: anyhow::Error,
    },

    #[error("容器配置错误: {message}")]
    Configuration { message: String },

    #[error("作用域未找到实现: {scope}")]
    ScopeNotFound { scope: String },

    #[error("容器已关闭: {container}")]
    ContainerClosed { container: String },

    #[error("事件处理失败: {event}, 原因: {source}")]
    EventHandlerFailed {
        event: String,
        source: anyhow::Error,
    },
}

impl DependencyError {
    /// 创建组件未注册错误
    pub fn not_registered(type_name: impl Into<String>) -> Self {
        Self::ComponentNotRegistered {
            type_name: type_name.into(),
        }
    }

    /// 创建依赖解析失败错误
    pub fn resolution_failed(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DependencyResolutionFailed {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// 创建组件创建失败错误
    pub fn creation_failed(type_name: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ComponentCreationFailed {
            type_name: type_name.into(),
            source,
        }
    }

    /// 创建事件处理失败错误
    pub fn event_failed(event: impl Into<String>, source: anyhow::Error) -> Self {
        Self::EventHandlerFailed {
            event: event.into(),
            source,
        }
    }

    /// 创建配置错误
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// 找不到描述符或无法得到依赖值
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Self::ComponentNotRegistered { .. }
                | Self::DependencyResolutionFailed { .. }
                | Self::ComponentNotVisible { .. }
                | Self::TypeMismatch { .. }
        )
    }

    /// 纯构造器循环
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// 构造器、工厂方法或生命周期钩子本身报错
    pub fn is_instantiation_error(&self) -> bool {
        matches!(self, Self::ComponentCreationFailed { .. })
    }

    /// 作用域或拦截器/工厂声明不完整
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::ScopeNotFound { .. })
    }

    /// 事件处理函数报错
    pub fn is_event_error(&self) -> bool {
        matches!(self, Self::EventHandlerFailed { .. })
    }

    /// 容器已关闭
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ContainerClosed { .. })
    }
}

/// 结果类型别名
pub type DependencyResult<T> = Result<T, DependencyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(DependencyError::not_registered("A").is_resolution_error());
        assert!(DependencyError::resolution_failed("A", "缺少依赖").is_resolution_error());
        assert!(DependencyError::CircularDependency {
            dependency_chain: "A -> B -> A".to_string()
        }
        .is_circular());
        assert!(DependencyError::creation_failed("A", anyhow::anyhow!("boom")).is_instantiation_error());
        assert!(DependencyError::ScopeNotFound {
            scope: "request".to_string()
        }
        .is_configuration_error());
        assert!(DependencyError::ContainerClosed {
            container: "app".to_string()
        }
        .is_closed());
        assert!(DependencyError::event_failed("Saved", anyhow::anyhow!("boom")).is_event_error());
    }

    #[test]
    fn test_creation_failed_keeps_source_message() {
        let err = DependencyError::creation_failed("demo::Service", anyhow::anyhow!("连接池耗尽"));
        let message = err.to_string();
        assert!(message.contains("demo::Service"));
        assert!(message.contains("连接池耗尽"));
    }
}
