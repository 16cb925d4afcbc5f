//! 方法拦截模型
//!
//! 被拦截的组件实现 [`Invocable`]，通过方法名分发调用。拦截器组件用
//! [`AdviceSlot`] 声明通知：匹配条件、时机和顺序。环绕通知通过
//! [`ProcessPoint`] 链串联，每个节点持有下一个节点。

use crate::descriptor::Instance;
use di_common::{DependencyError, DependencyResult, TypeKey};
use regex::Regex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 方法返回值
pub type Value = Arc<dyn Any + Send + Sync>;

/// 包装返回值
pub fn value<V: Any + Send + Sync>(value: V) -> Value {
    Arc::new(value)
}

/// 无返回值
pub fn unit() -> Value {
    Arc::new(())
}

/// 方法调用错误
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("方法不存在: {component}::{method}")]
    MethodNotFound { component: String, method: String },

    #[error("方法参数不匹配: 第 {index} 个参数, 期望 {expected}")]
    ArgumentMismatch { index: usize, expected: String },

    #[error("方法调用失败: {0}")]
    Failed(#[from] anyhow::Error),
}

/// 方法调用参数
#[derive(Clone, Default)]
pub struct CallArgs {
    values: Vec<Value>,
}

impl CallArgs {
    /// 空参数
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加参数
    pub fn with<V: Any + Send + Sync>(mut self, value: V) -> Self {
        self.values.push(Arc::new(value));
        self
    }

    /// 参数个数
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否没有参数
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 获取指定类型的参数
    pub fn get<V: Any>(&self, index: usize) -> Result<&V, InvocationError> {
        self.values
            .get(index)
            .and_then(|value| (**value).downcast_ref::<V>())
            .ok_or_else(|| InvocationError::ArgumentMismatch {
                index,
                expected: std::any::type_name::<V>().to_string(),
            })
    }
}

impl fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallArgs")
            .field("len", &self.values.len())
            .finish()
    }
}

/// 方法签名
#[derive(Debug, Clone)]
pub struct MethodSignature {
    /// 方法名
    pub name: &'static str,
    /// 返回类型
    pub return_type: TypeKey,
    /// 方法上的标记
    pub markers: Vec<&'static str>,
}

impl MethodSignature {
    /// 创建无返回值的方法签名
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            return_type: TypeKey::of::<()>(),
            markers: Vec::new(),
        }
    }

    /// 设置返回类型
    pub fn returns<R: ?Sized + 'static>(mut self) -> Self {
        self.return_type = TypeKey::of::<R>();
        self
    }

    /// 添加标记
    pub fn marked(mut self, marker: &'static str) -> Self {
        self.markers.push(marker);
        self
    }

    /// 是否带有标记
    pub fn has_marker(&self, marker: &str) -> bool {
        self.markers.iter().any(|m| *m == marker)
    }
}

/// 可被拦截的调用目标
pub trait Invocable: Send + Sync + 'static {
    /// 可调用的方法
    fn signatures(&self) -> Vec<MethodSignature>;

    /// 按方法名调用
    fn invoke(&self, method: &str, args: &CallArgs) -> Result<Value, InvocationError>;
}

/// 通知时机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectTiming {
    /// 方法调用前
    Before,
    /// 方法调用后，无论是否出错
    After,
    /// 环绕方法调用
    Around,
    /// 方法正常返回后
    AfterReturning,
    /// 方法出错后
    AfterThrowing,
}

impl fmt::Display for AspectTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::Around => "AROUND",
            Self::AfterReturning => "AFTER_RETURNING",
            Self::AfterThrowing => "AFTER_THROWING",
        };
        f.write_str(name)
    }
}

/// 方法匹配条件
#[derive(Debug, Clone)]
pub enum MethodMatcher {
    /// 方法名中任意位置匹配正则
    NamePattern(Regex),
    /// 返回类型为其中之一
    ReturnType(Vec<TypeKey>),
    /// 方法带有标记
    Marker(String),
}

impl MethodMatcher {
    /// 按方法名正则匹配
    pub fn name_pattern(pattern: &str) -> DependencyResult<Self> {
        Regex::new(pattern).map(Self::NamePattern).map_err(|e| {
            DependencyError::configuration(format!("无效的方法名匹配表达式 `{pattern}`: {e}"))
        })
    }

    /// 按返回类型匹配
    pub fn returns<R: ?Sized + 'static>() -> Self {
        Self::ReturnType(vec![TypeKey::of::<R>()])
    }

    /// 按标记匹配
    pub fn marker(marker: impl Into<String>) -> Self {
        Self::Marker(marker.into())
    }

    /// 是否匹配方法
    pub fn matches(&self, signature: &MethodSignature) -> bool {
        match self {
            Self::NamePattern(pattern) => pattern.is_match(signature.name),
            Self::ReturnType(types) => types.contains(&signature.return_type),
            Self::Marker(marker) => signature.has_marker(marker),
        }
    }
}

/// 调用结果
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// 正常返回
    Returned(&'a Value),
    /// 调用出错
    Threw(&'a InvocationError),
}

/// 调用点，观察型通知收到的上下文
#[derive(Debug, Clone, Copy)]
pub struct InvocationPoint<'a> {
    component: &'a TypeKey,
    method: &'a MethodSignature,
    args: &'a CallArgs,
    outcome: Option<Outcome<'a>>,
}

impl<'a> InvocationPoint<'a> {
    /// 创建调用点
    pub fn new(component: &'a TypeKey, method: &'a MethodSignature, args: &'a CallArgs) -> Self {
        Self {
            component,
            method,
            args,
            outcome: None,
        }
    }

    /// 附加调用结果
    pub fn with_outcome(mut self, outcome: Outcome<'a>) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// 被拦截的组件类型
    pub fn component(&self) -> &TypeKey {
        self.component
    }

    /// 被调用的方法
    pub fn method(&self) -> &MethodSignature {
        self.method
    }

    /// 调用参数
    pub fn args(&self) -> &CallArgs {
        self.args
    }

    /// 调用结果，BEFORE 通知中为空
    pub fn outcome(&self) -> Option<Outcome<'a>> {
        self.outcome
    }
}

/// 观察型通知
pub type ObserveFn =
    Arc<dyn Fn(&Instance, &InvocationPoint<'_>) -> Result<(), InvocationError> + Send + Sync>;
/// 环绕通知
pub type AroundFn =
    Arc<dyn Fn(&Instance, &ProcessPoint<'_>) -> Result<Value, InvocationError> + Send + Sync>;

fn observe_fn<F>(handler: F) -> ObserveFn
where
    F: Fn(&Instance, &InvocationPoint<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
{
    Arc::new(handler)
}

fn around_fn<F>(handler: F) -> AroundFn
where
    F: Fn(&Instance, &ProcessPoint<'_>) -> Result<Value, InvocationError> + Send + Sync + 'static,
{
    Arc::new(handler)
}

fn interceptor_of<I: 'static>(interceptor: &Instance) -> Result<&I, InvocationError> {
    (**interceptor).downcast_ref::<I>().ok_or_else(|| {
        InvocationError::Failed(anyhow::anyhow!(
            "拦截器类型不是 {}",
            std::any::type_name::<I>()
        ))
    })
}

#[derive(Clone)]
enum AdviceHandler {
    Observe(ObserveFn),
    Around(AroundFn),
}

/// 通知声明
#[derive(Clone)]
pub struct AdviceSlot {
    timing: AspectTiming,
    matcher: MethodMatcher,
    order: i32,
    handler: AdviceHandler,
}

impl AdviceSlot {
    fn observe<I, F>(timing: AspectTiming, matcher: MethodMatcher, order: i32, handler: F) -> Self
    where
        I: Send + Sync + 'static,
        F: Fn(&I, &InvocationPoint<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        Self {
            timing,
            matcher,
            order,
            handler: AdviceHandler::Observe(observe_fn(move |interceptor, point| {
                handler(interceptor_of::<I>(interceptor)?, point)
            })),
        }
    }

    /// 方法调用前执行
    pub fn before<I, F>(matcher: MethodMatcher, order: i32, handler: F) -> Self
    where
        I: Send + Sync + 'static,
        F: Fn(&I, &InvocationPoint<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        Self::observe(AspectTiming::Before, matcher, order, handler)
    }

    /// 方法调用后执行，无论是否出错
    pub fn after<I, F>(matcher: MethodMatcher, order: i32, handler: F) -> Self
    where
        I: Send + Sync + 'static,
        F: Fn(&I, &InvocationPoint<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        Self::observe(AspectTiming::After, matcher, order, handler)
    }

    /// 方法正常返回后执行
    pub fn after_returning<I, F>(matcher: MethodMatcher, order: i32, handler: F) -> Self
    where
        I: Send + Sync + 'static,
        F: Fn(&I, &InvocationPoint<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        Self::observe(AspectTiming::AfterReturning, matcher, order, handler)
    }

    /// 方法出错后执行
    pub fn after_throwing<I, F>(matcher: MethodMatcher, order: i32, handler: F) -> Self
    where
        I: Send + Sync + 'static,
        F: Fn(&I, &InvocationPoint<'_>) -> Result<(), InvocationError> + Send + Sync + 'static,
    {
        Self::observe(AspectTiming::AfterThrowing, matcher, order, handler)
    }

    /// 环绕方法调用，通过 [`ProcessPoint::proceed`] 调用下一层
    pub fn around<I, F>(matcher: MethodMatcher, order: i32, handler: F) -> Self
    where
        I: Send + Sync + 'static,
        F: Fn(&I, &ProcessPoint<'_>) -> Result<Value, InvocationError> + Send + Sync + 'static,
    {
        Self {
            timing: AspectTiming::Around,
            matcher,
            order,
            handler: AdviceHandler::Around(around_fn(move |interceptor, next| {
                handler(interceptor_of::<I>(interceptor)?, next)
            })),
        }
    }

    /// 通知时机
    pub fn timing(&self) -> AspectTiming {
        self.timing
    }

    /// 顺序，小的先执行
    pub fn order(&self) -> i32 {
        self.order
    }

    /// 匹配条件
    pub fn matcher(&self) -> &MethodMatcher {
        &self.matcher
    }

    /// 是否匹配方法
    pub fn matches(&self, signature: &MethodSignature) -> bool {
        self.matcher.matches(signature)
    }
}

impl fmt::Debug for AdviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdviceSlot")
            .field("timing", &self.timing)
            .field("matcher", &self.matcher)
            .field("order", &self.order)
            .finish()
    }
}

/// 绑定到拦截器实例的通知
#[derive(Clone)]
pub struct BoundAdvice {
    /// 拦截器实例
    pub interceptor: Instance,
    /// 通知声明
    pub slot: AdviceSlot,
}

impl BoundAdvice {
    /// 绑定通知
    pub fn new(interceptor: Instance, slot: AdviceSlot) -> Self {
        Self { interceptor, slot }
    }

    /// 执行观察型通知
    pub fn observe(&self, point: &InvocationPoint<'_>) -> Result<(), InvocationError> {
        match &self.slot.handler {
            AdviceHandler::Observe(handler) => handler(&self.interceptor, point),
            AdviceHandler::Around(_) => Err(InvocationError::Failed(anyhow::anyhow!(
                "环绕通知不能作为 {} 通知执行",
                self.slot.timing
            ))),
        }
    }

    /// 执行环绕通知，`next` 为下一层调用点
    pub fn around(&self, next: &ProcessPoint<'_>) -> Result<Value, InvocationError> {
        match &self.slot.handler {
            AdviceHandler::Around(handler) => handler(&self.interceptor, next),
            AdviceHandler::Observe(_) => Err(InvocationError::Failed(anyhow::anyhow!(
                "{} 通知不能作为环绕通知执行",
                self.slot.timing
            ))),
        }
    }
}

impl fmt::Debug for BoundAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAdvice").field("slot", &self.slot).finish()
    }
}

enum ProcessStep<'a> {
    Advice {
        advice: &'a BoundAdvice,
        next: Box<ProcessPoint<'a>>,
    },
    Target(&'a dyn Invocable),
}

/// 环绕调用链上的一个节点
///
/// 最外层节点对应顺序最小的环绕通知，最内层节点直接调用目标方法。
/// 每次 [`proceed`](Self::proceed) 都会重新执行本节点及其内层。
pub struct ProcessPoint<'a> {
    component: &'a TypeKey,
    method: &'a MethodSignature,
    args: &'a CallArgs,
    step: ProcessStep<'a>,
}

impl<'a> ProcessPoint<'a> {
    /// 构建调用链，`around` 须已按顺序排好
    pub fn chain(
        component: &'a TypeKey,
        around: &'a [BoundAdvice],
        target: &'a dyn Invocable,
        method: &'a MethodSignature,
        args: &'a CallArgs,
    ) -> Self {
        let mut point = Self {
            component,
            method,
            args,
            step: ProcessStep::Target(target),
        };
        for advice in around.iter().rev() {
            point = Self {
                component,
                method,
                args,
                step: ProcessStep::Advice {
                    advice,
                    next: Box::new(point),
                },
            };
        }
        point
    }

    /// 执行本节点
    pub fn proceed(&self) -> Result<Value, InvocationError> {
        match &self.step {
            ProcessStep::Target(target) => target.invoke(self.method.name, self.args),
            ProcessStep::Advice { advice, next } => advice.around(next),
        }
    }

    /// 被拦截的组件类型
    pub fn component(&self) -> &TypeKey {
        self.component
    }

    /// 被调用的方法
    pub fn method(&self) -> &MethodSignature {
        self.method
    }

    /// 调用参数
    pub fn args(&self) -> &CallArgs {
        self.args
    }

    /// 本节点之后剩余的环绕通知数
    pub fn depth(&self) -> usize {
        match &self.step {
            ProcessStep::Target(_) => 0,
            ProcessStep::Advice { next, .. } => next.depth() + 1,
        }
    }
}
