//! 在途组件缓存
//!
//! 记录正在构造的组件，用于检测循环依赖和发放早期引用。
//! 记录按线程隔离：一个线程构造中的裸实例不会被其他线程看到。
//!
//! 早期引用借出后，同一线程上存入作用域的实例可能持有这个半成品。
//! 借出方创建失败时，这些实例会从作用域撤回。

use di_abstractions::{DependencyScope, Instance, ScopeEntry};
use di_common::{DependencyError, DependencyResult, TypeKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// 创建阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CreationPhase {
    /// 正在解析构造参数或执行构造器
    Instantiating,
    /// 已得到裸实例，尚未注入
    Instantiated,
    /// 字段和 setter 已注入
    Injected,
    /// 已存入作用域
    Complete,
}

/// 在途记录的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InFlightKey {
    /// 单个组件
    Component(TypeKey),
    /// 某个父类型下的多实现批量创建
    Batch(TypeKey),
}

impl InFlightKey {
    fn label(&self) -> String {
        match self {
            Self::Component(key) => key.short_name().to_string(),
            Self::Batch(key) => format!("[{}]", key.short_name()),
        }
    }
}

/// 在途查询结果
#[derive(Clone)]
pub enum InFlight {
    /// 不在构造中
    Absent,
    /// 构造器尚未返回，没有可用的引用
    Constructing,
    /// 构造器已返回，可以发放早期引用
    EarlyReference(Instance),
}

/// 已存入作用域的实例
#[derive(Clone)]
pub struct StoredEntry {
    /// 所在作用域
    pub scope: Arc<dyn DependencyScope>,
    /// 作用域条目
    pub entry: ScopeEntry,
    /// 保存的实例
    pub instance: Instance,
}

impl StoredEntry {
    fn evict(&self) {
        if self.scope.evict(&self.entry, &self.instance) {
            debug!(component = self.entry.type_key.name, "撤回引用了未完成实例的组件");
        }
    }
}

struct CreationRecord {
    phase: CreationPhase,
    instance: Option<Instance>,
    lent: bool,
    dependents: Vec<StoredEntry>,
}

#[derive(Default)]
struct ThreadFrames {
    order: Vec<InFlightKey>,
    records: HashMap<InFlightKey, CreationRecord>,
}

/// 在途组件缓存
#[derive(Default)]
pub struct CreationCache {
    threads: Mutex<HashMap<ThreadId, ThreadFrames>>,
}

impl CreationCache {
    /// 创建空缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询当前线程上的在途状态
    pub fn lookup(&self, key: &InFlightKey) -> InFlight {
        let threads = self.threads.lock();
        let record = threads
            .get(&thread::current().id())
            .and_then(|frames| frames.records.get(key));
        match record {
            None => InFlight::Absent,
            Some(CreationRecord {
                phase: CreationPhase::Instantiating,
                ..
            }) => InFlight::Constructing,
            Some(CreationRecord {
                instance: Some(instance),
                ..
            }) => InFlight::EarlyReference(instance.clone()),
            Some(_) => InFlight::Constructing,
        }
    }

    /// 标记开始构造，同一线程上重复开始视为循环依赖
    pub fn begin(&self, key: InFlightKey) -> DependencyResult<CreationGuard<'_>> {
        let thread = thread::current().id();
        let mut threads = self.threads.lock();
        let frames = threads.entry(thread).or_default();
        if frames.records.contains_key(&key) {
            return Err(DependencyError::CircularDependency {
                dependency_chain: Self::render_chain(frames, &key),
            });
        }
        frames.order.push(key);
        frames.records.insert(
            key,
            CreationRecord {
                phase: CreationPhase::Instantiating,
                instance: None,
                lent: false,
                dependents: Vec::new(),
            },
        );
        Ok(CreationGuard {
            cache: self,
            key,
            thread,
            finished: false,
        })
    }

    /// 标记 `key` 的早期引用已借出
    pub fn mark_lent(&self, key: &InFlightKey) {
        let mut threads = self.threads.lock();
        if let Some(record) = threads
            .get_mut(&thread::current().id())
            .and_then(|frames| frames.records.get_mut(key))
        {
            record.lent = true;
        }
    }

    /// 构造循环依赖错误，链路从 `key` 第一次进入构造开始
    pub fn circular(&self, key: &InFlightKey) -> DependencyError {
        let threads = self.threads.lock();
        let chain = threads
            .get(&thread::current().id())
            .map_or_else(|| key.label(), |frames| Self::render_chain(frames, key));
        DependencyError::CircularDependency {
            dependency_chain: chain,
        }
    }

    /// 所有线程上的在途记录数
    pub fn in_flight(&self) -> usize {
        self.threads
            .lock()
            .values()
            .map(|frames| frames.records.len())
            .sum()
    }

    fn render_chain(frames: &ThreadFrames, key: &InFlightKey) -> String {
        let start = frames
            .order
            .iter()
            .position(|k| k == key)
            .unwrap_or(0);
        frames.order[start..]
            .iter()
            .chain(std::iter::once(key))
            .map(InFlightKey::label)
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    fn update(&self, thread: ThreadId, key: &InFlightKey, phase: CreationPhase, instance: Option<Instance>) {
        let mut threads = self.threads.lock();
        if let Some(record) = threads
            .get_mut(&thread)
            .and_then(|frames| frames.records.get_mut(key))
        {
            record.phase = phase;
            if instance.is_some() {
                record.instance = instance;
            }
        }
    }

    /// 登记到所有已借出早期引用的其他在途记录上
    fn record_stored(&self, thread: ThreadId, key: &InFlightKey, stored: &StoredEntry) {
        let mut threads = self.threads.lock();
        if let Some(frames) = threads.get_mut(&thread) {
            frames
                .records
                .iter_mut()
                .filter(|(k, record)| *k != key && record.lent)
                .for_each(|(_, record)| record.dependents.push(stored.clone()));
        }
    }

    /// 移除记录，返回借出期间存入作用域的实例
    fn remove(&self, thread: ThreadId, key: &InFlightKey) -> Vec<StoredEntry> {
        let mut threads = self.threads.lock();
        let Some(frames) = threads.get_mut(&thread) else {
            return Vec::new();
        };
        let dependents = frames
            .records
            .remove(key)
            .map(|record| record.dependents)
            .unwrap_or_default();
        if let Some(position) = frames.order.iter().rposition(|k| k == key) {
            frames.order.remove(position);
        }
        if frames.records.is_empty() {
            threads.remove(&thread);
        }
        dependents
    }
}

/// 在途记录守卫
///
/// 正常完成时调用 [`complete`](Self::complete)；提前释放（创建失败）时自动撤销记录。
pub struct CreationGuard<'a> {
    cache: &'a CreationCache,
    key: InFlightKey,
    thread: ThreadId,
    finished: bool,
}

impl CreationGuard<'_> {
    /// 记录裸实例，此后同一线程上的字段/setter 依赖可以拿到早期引用
    pub fn instantiated(&self, instance: Instance) {
        self.cache
            .update(self.thread, &self.key, CreationPhase::Instantiated, Some(instance));
    }

    /// 注入完成
    pub fn injected(&self) {
        self.cache
            .update(self.thread, &self.key, CreationPhase::Injected, None);
    }

    /// 实例已存入作用域；若同一线程上有借出早期引用的在途组件，登记为其依赖方
    pub fn stored(&self, stored: StoredEntry) {
        self.cache.record_stored(self.thread, &self.key, &stored);
    }

    /// 创建完成，清除在途记录
    pub fn complete(mut self) {
        self.cache
            .update(self.thread, &self.key, CreationPhase::Complete, None);
        self.cache.remove(self.thread, &self.key);
        self.finished = true;
    }
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(component = %self.key.label(), "创建失败，撤销在途记录");
            for dependent in self.cache.remove(self.thread, &self.key) {
                dependent.evict();
            }
        }
    }
}
