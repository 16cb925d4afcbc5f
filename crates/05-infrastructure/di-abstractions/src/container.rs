//! 依赖注入容器配置与扩展点

use crate::descriptor::{ComponentDescriptor, Instance};
use di_common::{DependencyError, DependencyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 容器名称，用于日志和错误信息
    pub name: String,
    /// 最大解析深度
    pub max_resolution_depth: usize,
    /// 是否允许通过字段/setter 注入拿到尚未注入完成的早期引用
    pub allow_early_references: bool,
    /// 关闭时是否调用销毁钩子
    pub invoke_destroy_hooks: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            max_resolution_depth: 100,
            allow_early_references: true,
            invoke_destroy_hooks: true,
        }
    }
}

impl ContainerConfig {
    /// 从 TOML 文本加载
    pub fn from_toml_str(content: &str) -> DependencyResult<Self> {
        toml::from_str(content)
            .map_err(|e| DependencyError::configuration(format!("容器配置解析失败: {e}")))
    }

    /// 从 JSON 文本加载
    pub fn from_json_str(content: &str) -> DependencyResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| DependencyError::configuration(format!("容器配置解析失败: {e}")))
    }

    /// 从文件加载，按扩展名选择格式
    pub fn from_file(path: impl AsRef<Path>) -> DependencyResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "读取容器配置失败");
            DependencyError::configuration(format!("读取容器配置失败: {}, 原因: {e}", path.display()))
        })?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(DependencyError::configuration(format!(
                "不支持的容器配置格式: {}",
                path.display()
            ))),
        };
        match &config {
            Ok(loaded) => info!(path = %path.display(), container = %loaded.name, "加载容器配置"),
            Err(error) => warn!(path = %path.display(), %error, "容器配置无效"),
        }
        config
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerStats {
    /// 已注册组件数量
    pub registered_components: usize,
    /// 各作用域中的存活实例数量
    pub live_instances: usize,
    /// 已创建的自定义作用域数量
    pub custom_scopes: usize,
}

/// 组件创建监听器
///
/// 在实例完成注入、存入作用域之前调用，可以替换实例。
/// 多实现批量创建时可能被多次调用，实现必须是幂等的。
pub trait CreationListener: Send + Sync {
    /// 实例创建回调
    fn after_created(
        &self,
        descriptor: &ComponentDescriptor,
        instance: Instance,
    ) -> DependencyResult<Instance>;
}

impl<F> CreationListener for F
where
    F: Fn(&ComponentDescriptor, Instance) -> DependencyResult<Instance> + Send + Sync,
{
    fn after_created(
        &self,
        descriptor: &ComponentDescriptor,
        instance: Instance,
    ) -> DependencyResult<Instance> {
        self(descriptor, instance)
    }
}
