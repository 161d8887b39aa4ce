use std::sync::{Arc, Weak};

use crate::{
    errors::{Result, WraptError},
    host::FinalizerToken,
    object::Object,
    value::Value,
};

/// Weak reference to a host object that never extends its lifetime
#[derive(Clone)]
pub struct WeakRef {
    target: Weak<dyn Object>,
}

impl WeakRef {
    pub fn new(value: &Value) -> Result<Self> {
        let obj = weak_referenceable(value)?;
        Ok(Self {
            target: Arc::downgrade(obj),
        })
    }

    /// Create a weak reference whose callback runs when the referent dies
    pub fn with_callback(value: &Value, callback: impl FnOnce() + Send + 'static) -> Result<Self> {
        let obj = weak_referenceable(value)?;
        if let Some(finalizers) = obj.finalizers() {
            finalizers.register(callback);
        }
        Ok(Self {
            target: Arc::downgrade(obj),
        })
    }

    pub fn upgrade(&self) -> Option<Value> {
        self.target.upgrade().map(Value::Object)
    }

    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Register `callback` on the referent; `None` when it is already gone
    pub fn on_finalize(&self, callback: impl FnOnce() + Send + 'static) -> Option<FinalizerToken> {
        let obj = self.target.upgrade()?;
        obj.finalizers().map(|finalizers| finalizers.register(callback))
    }

    /// Withdraw a callback registered through [`WeakRef::on_finalize`]
    pub fn cancel(&self, token: FinalizerToken) -> bool {
        self.target
            .upgrade()
            .and_then(|obj| obj.finalizers().map(|finalizers| finalizers.unregister(token)))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for WeakRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

fn weak_referenceable(value: &Value) -> Result<&Arc<dyn Object>> {
    match value {
        Value::Object(obj) if obj.finalizers().is_some() => Ok(obj),
        _ => Err(WraptError::not_weak_referenceable(value.type_name())),
    }
}
