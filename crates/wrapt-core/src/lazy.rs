//! Lazily constructed proxy.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::{
    errors::Result,
    object::Object,
    proxy::{proxy_object_methods, sealed, Proxy, ProxyCore},
    value::{Kwargs, Value},
};

/// Zero-argument constructor for the wrapped value
pub type Factory = Box<dyn Fn() -> Result<Value> + Send + Sync>;

/// Proxy whose wrapped value is built by `factory` on first access.
///
/// Construction happens at most once per instance; concurrent first
/// accesses wait on a per-instance guard. A failing factory leaves the slot
/// unset and the next access tries again.
pub struct LazyProxy {
    core: ProxyCore,
    factory: Factory,
    guard: Mutex<()>,
}

impl LazyProxy {
    pub fn new<F>(factory: F) -> Arc<Self>
    where
        F: Fn() -> Result<Value> + Send + Sync + 'static,
    {
        Arc::new(Self {
            core: ProxyCore::empty(),
            factory: Box::new(factory),
            guard: Mutex::new(()),
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.core.is_set()
    }

    /// The wrapped value, constructing it first if needed
    pub fn bind_get(&self) -> Result<Value> {
        if let Some(value) = self.core.peek() {
            return Ok(value);
        }
        let _guard = self.guard.lock();
        if let Some(value) = self.core.peek() {
            return Ok(value);
        }
        let value = (self.factory)()?;
        debug!("lazy proxy constructed {}", value.type_name());
        self.core.set(value.clone());
        Ok(value)
    }
}

impl std::fmt::Debug for LazyProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyProxy")
            .field("wrapped", &self.core.peek())
            .finish_non_exhaustive()
    }
}

impl sealed::Sealed for LazyProxy {}

impl Proxy for LazyProxy {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn wrapped(&self) -> Result<Value> {
        self.bind_get()
    }

    fn rewrap(&self, value: Value) -> Result<Value> {
        let stored = value.clone();
        let proxy = LazyProxy::new(move || Ok(stored.clone()));
        proxy.core.set(value);
        Ok(proxy.into())
    }
}

impl Object for LazyProxy {
    fn type_name(&self) -> &str {
        "LazyProxy"
    }

    proxy_object_methods!();

    fn is_callable(&self) -> bool {
        self.bind_get().is_ok_and(|wrapped| wrapped.is_callable())
    }

    fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        self.bind_get()?.call(args, kwargs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{errors::WraptError, host::Function, value::BinaryOp};

    fn counted(calls: &Arc<AtomicUsize>) -> Arc<LazyProxy> {
        let calls = Arc::clone(calls);
        LazyProxy::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Value::list([Value::Int(1), Value::Int(2)]))
        })
    }

    #[test]
    fn test_constructs_on_first_access_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lazy = counted(&calls);
        assert!(!lazy.is_initialized());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let handle: Value = lazy.clone().into();
        assert_eq!(handle.len().unwrap(), 2);
        assert_eq!(handle.get_item(&Value::Int(0)).unwrap(), Value::Int(1));
        assert!(lazy.is_initialized());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(lazy.bind_get().unwrap().is(&lazy.bind_get().unwrap()));
    }

    #[test]
    fn test_own_attributes_do_not_construct() {
        let calls = Arc::new(AtomicUsize::new(0));
        let handle: Value = counted(&calls).into();
        handle.set_attr("_self_tag", Value::from("t")).unwrap();
        assert_eq!(handle.get_attr("_self_tag").unwrap(), Value::from("t"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_factory_failure_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let lazy = {
            let attempts = Arc::clone(&attempts);
            LazyProxy::new(move || {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WraptError::type_error("not yet"))
                } else {
                    Ok(Value::Int(7))
                }
            })
        };
        assert!(lazy.bind_get().is_err());
        assert!(!lazy.is_initialized());
        assert_eq!(lazy.bind_get().unwrap(), Value::Int(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_callable_when_constructed_value_is() {
        let lazy: Value = LazyProxy::new(|| Ok(Function::new("ten", |_, _| Ok(Value::Int(10))).into())).into();
        assert!(lazy.is_callable());
        assert_eq!(lazy.call(Vec::new(), Kwargs::new()).unwrap(), Value::Int(10));
    }

    #[test]
    fn test_inplace_rewraps_initialized_lazy_proxy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let lazy: Value = {
            let calls = Arc::clone(&calls);
            LazyProxy::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Int(1))
            })
        }
        .into();
        let after = lazy.inplace_op(BinaryOp::Mul, &Value::Int(5)).unwrap();
        assert_eq!(after.type_name(), "LazyProxy");
        assert!(after.downcast_ref::<LazyProxy>().unwrap().is_initialized());
        assert_eq!(after, Value::Int(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
