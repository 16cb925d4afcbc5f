//! 拦截织入
//!
//! [`AspectProxy`] 包装被拦截的组件。织入时为每个方法计算一次匹配的通知，
//! 调用时按 BEFORE → AROUND 链 → AFTER_RETURNING / AFTER_THROWING → AFTER 的顺序执行。

use di_abstractions::{
    AspectTiming, BoundAdvice, CallArgs, ComponentDescriptor, ComponentRole, Instance, Invocable,
    InvocationError, InvocationPoint, MethodSignature, Outcome, ProcessPoint, Value,
};
use di_common::{DependencyError, DependencyResult, TypeKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 单个方法上匹配到的通知，各时机内已按顺序稳定排序
#[derive(Default)]
struct AdviceChain {
    before: Vec<BoundAdvice>,
    around: Vec<BoundAdvice>,
    after_returning: Vec<BoundAdvice>,
    after_throwing: Vec<BoundAdvice>,
    after: Vec<BoundAdvice>,
}

impl AdviceChain {
    fn push(&mut self, advice: BoundAdvice) {
        let bucket = match advice.slot.timing() {
            AspectTiming::Before => &mut self.before,
            AspectTiming::Around => &mut self.around,
            AspectTiming::AfterReturning => &mut self.after_returning,
            AspectTiming::AfterThrowing => &mut self.after_throwing,
            AspectTiming::After => &mut self.after,
        };
        bucket.push(advice);
    }

    fn sort(&mut self) {
        for bucket in [
            &mut self.before,
            &mut self.around,
            &mut self.after_returning,
            &mut self.after_throwing,
            &mut self.after,
        ] {
            bucket.sort_by_key(|advice| advice.slot.order());
        }
    }

    fn len(&self) -> usize {
        self.before.len()
            + self.around.len()
            + self.after_returning.len()
            + self.after_throwing.len()
            + self.after.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 拦截代理
///
/// 代理取代原始实例成为容器中的组件。没有匹配通知的方法直接调用目标。
pub struct AspectProxy {
    component: TypeKey,
    target: Instance,
    invocable: Arc<dyn Invocable>,
    signatures: Vec<MethodSignature>,
    chains: HashMap<&'static str, (MethodSignature, AdviceChain)>,
}

impl AspectProxy {
    /// 为 `target` 织入拦截器，`interceptors` 为拦截器描述符及其实例，按声明顺序排列
    pub fn weave(
        descriptor: &ComponentDescriptor,
        target: Instance,
        interceptors: &[(Arc<ComponentDescriptor>, Instance)],
    ) -> DependencyResult<Self> {
        let component = *descriptor.type_key();
        let invocable = descriptor.as_invocable(&target).ok_or_else(|| {
            DependencyError::configuration(format!("组件 {} 被拦截但不可调用", component.name))
        })?;

        let signatures = invocable.signatures();
        let mut chains = HashMap::new();
        for signature in &signatures {
            let mut chain = AdviceChain::default();
            for (interceptor, instance) in interceptors {
                if interceptor.role() != ComponentRole::Interceptor {
                    return Err(DependencyError::configuration(format!(
                        "{} 不是拦截器组件，不能拦截 {}",
                        interceptor.type_key().name,
                        component.name
                    )));
                }
                for slot in interceptor.advice_slots() {
                    if slot.matches(signature) {
                        chain.push(BoundAdvice::new(instance.clone(), slot.clone()));
                    }
                }
            }
            if !chain.is_empty() {
                chain.sort();
                chains.insert(signature.name, (signature.clone(), chain));
            }
        }

        debug!(
            component = %component,
            methods = signatures.len(),
            advised_methods = chains.len(),
            "织入拦截代理"
        );

        Ok(Self {
            component,
            target,
            invocable,
            signatures,
            chains,
        })
    }

    /// 被代理的组件类型
    pub fn component(&self) -> &TypeKey {
        &self.component
    }

    /// 被代理的原始实例
    pub fn target(&self) -> &Instance {
        &self.target
    }

    /// 方法上匹配到的通知数，未被拦截的方法为 0
    pub fn advice_count(&self, method: &str) -> usize {
        self.chains.get(method).map_or(0, |(_, chain)| chain.len())
    }

    fn observe_all(
        advices: &[BoundAdvice],
        point: &InvocationPoint<'_>,
    ) -> Result<(), InvocationError> {
        advices.iter().try_for_each(|advice| advice.observe(point))
    }
}

impl Invocable for AspectProxy {
    fn signatures(&self) -> Vec<MethodSignature> {
        self.signatures.clone()
    }

    fn invoke(&self, method: &str, args: &CallArgs) -> Result<Value, InvocationError> {
        let Some((signature, chain)) = self.chains.get(method) else {
            return self.invocable.invoke(method, args);
        };

        let point = InvocationPoint::new(&self.component, signature, args);
        Self::observe_all(&chain.before, &point)?;

        let result = ProcessPoint::chain(
            &self.component,
            &chain.around,
            self.invocable.as_ref(),
            signature,
            args,
        )
        .proceed();

        let result = match result {
            Ok(value) => {
                let returned = point.with_outcome(Outcome::Returned(&value));
                Self::observe_all(&chain.after_returning, &returned).map(|_| value.clone())
            }
            Err(error) => {
                let threw = point.with_outcome(Outcome::Threw(&error));
                match Self::observe_all(&chain.after_throwing, &threw) {
                    Ok(()) => Err(error),
                    Err(advice_error) => Err(advice_error),
                }
            }
        };

        let outcome = match &result {
            Ok(value) => Outcome::Returned(value),
            Err(error) => Outcome::Threw(error),
        };
        Self::observe_all(&chain.after, &point.with_outcome(outcome))?;
        result
    }
}

impl fmt::Debug for AspectProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectProxy")
            .field("component", &self.component.name)
            .field("advised_methods", &self.chains.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use di_abstractions::{value, AdviceSlot, Component, MethodMatcher};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Journal {
        entries: Mutex<Vec<String>>,
    }

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.entries.lock().unwrap().push(entry.into());
        }
    }

    struct Account {
        journal: Arc<Journal>,
    }

    impl Invocable for Account {
        fn signatures(&self) -> Vec<MethodSignature> {
            vec![
                MethodSignature::new("deposit").returns::<u32>(),
                MethodSignature::new("withdraw").returns::<u32>(),
                MethodSignature::new("balance").returns::<u32>(),
            ]
        }

        fn invoke(&self, method: &str, args: &CallArgs) -> Result<Value, InvocationError> {
            self.journal.push(format!("call {method}"));
            match method {
                "deposit" => Ok(value(*args.get::<u32>(0)? + 100)),
                "withdraw" => Err(InvocationError::Failed(anyhow::anyhow!("余额不足"))),
                "balance" => Ok(value(100u32)),
                _ => Err(InvocationError::MethodNotFound {
                    component: "Account".into(),
                    method: method.into(),
                }),
            }
        }
    }

    impl Component for Account {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Self>()
                .advised_by::<Audit>()
                .build()
        }
    }

    struct Audit {
        journal: Arc<Journal>,
    }

    fn matcher() -> MethodMatcher {
        MethodMatcher::name_pattern("^(deposit|withdraw)$").unwrap()
    }

    impl Component for Audit {
        fn descriptor() -> ComponentDescriptor {
            ComponentDescriptor::builder::<Self>()
                .interceptor(vec![
                    AdviceSlot::after::<Self, _>(matcher(), 0, |audit, point| {
                        audit.journal.push(format!("after {}", point.method().name));
                        Ok(())
                    }),
                    AdviceSlot::before::<Self, _>(matcher(), 2, |audit, _| {
                        audit.journal.push("before 2");
                        Ok(())
                    }),
                    AdviceSlot::before::<Self, _>(matcher(), 1, |audit, _| {
                        audit.journal.push("before 1");
                        Ok(())
                    }),
                    AdviceSlot::around::<Self, _>(matcher(), 0, |audit, next| {
                        audit.journal.push("around in");
                        let result = next.proceed();
                        audit.journal.push("around out");
                        result
                    }),
                    AdviceSlot::after_returning::<Self, _>(matcher(), 0, |audit, _| {
                        audit.journal.push("returned");
                        Ok(())
                    }),
                    AdviceSlot::after_throwing::<Self, _>(matcher(), 0, |audit, _| {
                        audit.journal.push("threw");
                        Ok(())
                    }),
                ])
                .build()
        }
    }

    fn proxy(journal: &Arc<Journal>) -> AspectProxy {
        let target: Instance = Arc::new(Account {
            journal: journal.clone(),
        });
        let interceptor: Instance = Arc::new(Audit {
            journal: journal.clone(),
        });
        AspectProxy::weave(
            &Account::descriptor(),
            target,
            &[(Arc::new(Audit::descriptor()), interceptor)],
        )
        .unwrap()
    }

    #[test]
    fn test_advice_order_on_return() {
        let journal = Arc::new(Journal::default());
        let proxy = proxy(&journal);

        let result = proxy.invoke("deposit", &CallArgs::new().with(5u32)).unwrap();
        assert_eq!(result.downcast_ref::<u32>(), Some(&105));
        assert_eq!(
            *journal.entries.lock().unwrap(),
            vec![
                "before 1",
                "before 2",
                "around in",
                "call deposit",
                "around out",
                "returned",
                "after deposit"
            ]
        );
    }

    #[test]
    fn test_advice_order_on_error() {
        let journal = Arc::new(Journal::default());
        let proxy = proxy(&journal);

        assert!(proxy.invoke("withdraw", &CallArgs::new()).is_err());
        let entries = journal.entries.lock().unwrap();
        assert!(!entries.contains(&"returned".to_string()));
        assert_eq!(entries[entries.len() - 2], "threw");
        assert_eq!(entries[entries.len() - 1], "after withdraw");
    }

    #[test]
    fn test_unmatched_method_calls_through() {
        let journal = Arc::new(Journal::default());
        let proxy = proxy(&journal);

        assert_eq!(proxy.advice_count("balance"), 0);
        assert_eq!(proxy.advice_count("deposit"), 6);
        proxy.invoke("balance", &CallArgs::new()).unwrap();
        assert_eq!(*journal.entries.lock().unwrap(), vec!["call balance"]);
    }

    #[test]
    fn test_non_interceptor_is_rejected() {
        let journal = Arc::new(Journal::default());
        let target: Instance = Arc::new(Account {
            journal: journal.clone(),
        });
        let plain = ComponentDescriptor::for_instance::<Journal>("journal");
        let err = AspectProxy::weave(
            &Account::descriptor(),
            target,
            &[(Arc::new(plain), journal.clone() as Instance)],
        )
        .unwrap_err();
        assert!(err.is_configuration_error());
    }
}
