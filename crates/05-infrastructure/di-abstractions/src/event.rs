//! 事件总线
//!
//! 每个容器持有一条 [`Events`] 总线。组件在描述符中用
//! [`DescriptorBuilder::on_event`](crate::DescriptorBuilder::on_event) 声明事件处理函数，
//! 实例存入作用域时由容器登记到总线；用
//! [`DescriptorBuilder::event_emitter`](crate::DescriptorBuilder::event_emitter)
//! 声明的组件在创建时拿到总线，之后可以自行分发事件。

use di_common::{DependencyError, DependencyResult};
use parking_lot::RwLock;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// 类型擦除的事件处理函数
pub type EventHandler =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> anyhow::Result<()> + Send + Sync>;

/// 按事件类型分发的同步事件总线
#[derive(Default)]
pub struct Events {
    handlers: RwLock<HashMap<TypeId, Vec<EventHandler>>>,
}

impl Events {
    /// 创建空总线
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记事件 `E` 的处理函数
    pub fn register<E, F>(&self, handler: F)
    where
        E: Send + Sync + 'static,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let erased: EventHandler = Arc::new(move |event: &(dyn Any + Send + Sync)| {
            match event.downcast_ref::<E>() {
                Some(event) => handler(event),
                None => Ok(()),
            }
        });
        self.register_erased(TypeId::of::<E>(), erased);
        trace!(event = type_name::<E>(), "登记事件处理函数");
    }

    /// 按事件类型标识登记已擦除类型的处理函数
    pub fn register_erased(&self, event: TypeId, handler: EventHandler) {
        self.handlers.write().entry(event).or_default().push(handler);
    }

    /// 分发事件，按登记顺序调用处理函数，返回调用的处理函数个数
    ///
    /// 某个处理函数出错时停止分发。处理函数内可以再次分发或登记。
    pub fn dispatch<E: Send + Sync + 'static>(&self, event: &E) -> DependencyResult<usize> {
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .get(&TypeId::of::<E>())
            .cloned()
            .unwrap_or_default();
        for handler in &handlers {
            handler(event).map_err(|source| DependencyError::event_failed(type_name::<E>(), source))?;
        }
        debug!(event = type_name::<E>(), handlers = handlers.len(), "事件已分发");
        Ok(handlers.len())
    }

    /// 事件 `E` 已登记的处理函数个数
    pub fn handler_count<E: 'static>(&self) -> usize {
        self.handlers
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    /// 清空所有处理函数，容器关闭时调用
    pub fn clear(&self) {
        self.handlers.write().clear();
    }
}

impl fmt::Debug for Events {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        f.debug_struct("Events")
            .field("event_types", &handlers.len())
            .field("handlers", &handlers.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}
