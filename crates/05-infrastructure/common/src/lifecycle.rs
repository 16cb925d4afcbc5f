//! 容器生命周期管理

use crate::errors::{DependencyError, DependencyResult};
use std::sync::atomic::{AtomicU8, Ordering};

/// 容器生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// 运行中
    Running,
    /// 关闭中，正在执行销毁钩子
    Closing,
    /// 已关闭，拒绝所有调用
    Closed,
}

impl ContainerStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Closing => 1,
            Self::Closed => 2,
        }
    }
}

/// 生命周期守卫
///
/// 状态只能单向推进：Running → Closing → Closed。
#[derive(Debug)]
pub struct LifecycleGuard {
    status: AtomicU8,
    container: String,
}

impl LifecycleGuard {
    /// 创建处于运行状态的守卫
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            status: AtomicU8::new(ContainerStatus::Running.as_u8()),
            container: container.into(),
        }
    }

    /// 当前状态
    pub fn status(&self) -> ContainerStatus {
        ContainerStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// 关闭完成后所有调用都返回 [`DependencyError::ContainerClosed`]
    pub fn check(&self) -> DependencyResult<()> {
        if self.status() == ContainerStatus::Closed {
            return Err(DependencyError::ContainerClosed {
                container: self.container.clone(),
            });
        }
        Ok(())
    }

    /// 进入关闭流程，只有第一个调用者返回 true
    pub fn begin_close(&self) -> bool {
        self.status
            .compare_exchange(
                ContainerStatus::Running.as_u8(),
                ContainerStatus::Closing.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// 标记关闭完成
    pub fn finish_close(&self) {
        self.status
            .store(ContainerStatus::Closed.as_u8(), Ordering::Release);
        tracing::debug!(container = %self.container, "容器状态已切换为关闭");
    }
}
