//! Weak function proxy.
//!
//! Holds a callable without keeping it alive. A bound method is tracked as
//! its receiver plus its unbound function, since the bound method itself is
//! usually a temporary that would die right after construction; each call
//! re-binds the function to the live receiver.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Weak,
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use crate::{
    errors::{Result, WraptError},
    host::{FinalizerToken, WeakRef},
    object::Object,
    proxy::{proxy_object_methods, sealed, ObjectProxy, Proxy, ProxyCore},
    value::{Kwargs, Value},
};

/// Called once with the proxy after its referent dies
pub type ExpiryCallback = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;

#[derive(Clone)]
enum WeakState {
    Live {
        receiver: Option<WeakRef>,
        function: WeakRef,
    },
    Expired,
}

pub struct WeakFunctionProxy {
    core: ProxyCore,
    state: RwLock<WeakState>,
    expired: AtomicBool,
    generation: AtomicU64,
    callback: Option<ExpiryCallback>,
    /// Finalizer registrations on the tracked referents, withdrawn when the
    /// proxy stops tracking them
    watches: Mutex<Vec<(WeakRef, FinalizerToken)>>,
    this: Weak<WeakFunctionProxy>,
}

impl WeakFunctionProxy {
    pub fn new(wrapped: &Value) -> Result<Arc<Self>> {
        Self::build(wrapped, None)
    }

    pub fn with_callback<F>(wrapped: &Value, callback: F) -> Result<Arc<Self>>
    where
        F: Fn(&Value) -> Result<()> + Send + Sync + 'static,
    {
        Self::build(wrapped, Some(Arc::new(callback)))
    }

    fn build(wrapped: &Value, callback: Option<ExpiryCallback>) -> Result<Arc<Self>> {
        let state = track(wrapped)?;
        let proxy = Arc::new_cyclic(|this| Self {
            core: ProxyCore::empty(),
            state: RwLock::new(state.clone()),
            expired: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            callback,
            watches: Mutex::new(Vec::new()),
            this: this.clone(),
        });
        proxy.watch(&state, 0);
        Ok(proxy)
    }

    pub fn is_expired(&self) -> bool {
        matches!(*self.state.read(), WeakState::Expired)
    }

    /// Arrange for the death of any tracked referent to expire this proxy
    fn watch(&self, state: &WeakState, generation: u64) {
        let WeakState::Live { receiver, function } = state else {
            return;
        };
        let mut registered = Vec::new();
        let mut dead = false;
        for target in receiver.iter().chain(std::iter::once(function)) {
            let proxy = self.this.clone();
            let token = target.on_finalize(move || {
                if let Some(proxy) = proxy.upgrade() {
                    proxy.expire(generation);
                }
            });
            match token {
                Some(token) => registered.push((target.clone(), token)),
                None => dead = true,
            }
        }
        self.watches.lock().extend(registered);
        if dead {
            self.expire(generation);
        }
    }

    fn unwatch(&self) {
        let watches = std::mem::take(&mut *self.watches.lock());
        for (target, token) in watches {
            target.cancel(token);
        }
    }

    fn expire(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if self.expired.swap(true, Ordering::SeqCst) {
            return;
        }
        *self.state.write() = WeakState::Expired;
        self.unwatch();
        debug!("weak function proxy expired");

        let Some(callback) = &self.callback else {
            return;
        };
        let Some(this) = self.this.upgrade() else {
            return;
        };
        if let Err(err) = callback(&Value::from(this)) {
            error!("weak function proxy expiry callback failed: {err}");
        }
    }

    fn live(&self) -> Result<(Option<WeakRef>, WeakRef)> {
        match &*self.state.read() {
            WeakState::Live { receiver, function } => Ok((receiver.clone(), function.clone())),
            WeakState::Expired => Err(WraptError::ReferenceExpired),
        }
    }
}

/// Weak references for `wrapped`, splitting bound methods into receiver and
/// unbound function
fn track(wrapped: &Value) -> Result<WeakState> {
    match (wrapped.bound_receiver(), wrapped.unbound_function()) {
        (Some(receiver), Some(function)) => Ok(WeakState::Live {
            receiver: Some(WeakRef::new(&receiver)?),
            function: WeakRef::new(&function)?,
        }),
        _ => Ok(WeakState::Live {
            receiver: None,
            function: WeakRef::new(wrapped)?,
        }),
    }
}

impl Drop for WeakFunctionProxy {
    fn drop(&mut self) {
        self.unwatch();
    }
}

impl std::fmt::Debug for WeakFunctionProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakFunctionProxy")
            .field("expired", &self.is_expired())
            .finish_non_exhaustive()
    }
}

impl sealed::Sealed for WeakFunctionProxy {}

impl Proxy for WeakFunctionProxy {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn wrapped(&self) -> Result<Value> {
        let (_, function) = self.live()?;
        function.upgrade().ok_or(WraptError::ReferenceExpired)
    }

    /// Re-target the proxy; callbacks registered for earlier targets no
    /// longer expire it
    fn set_wrapped(&self, value: Value) {
        let state = match track(&value) {
            Ok(state) => state,
            Err(err) => {
                error!("cannot track {} weakly: {err}", value.type_name());
                return;
            }
        };
        self.unwatch();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.state.write() = state.clone();
        self.expired.store(false, Ordering::SeqCst);
        self.watch(&state, generation);
    }

    fn take_wrapped(&self) -> Option<Value> {
        let function = self.wrapped().ok();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.state.write() = WeakState::Expired;
        self.unwatch();
        function
    }

    /// A weak proxy around a fresh temporary would expire at once
    fn rewrap(&self, value: Value) -> Result<Value> {
        Ok(ObjectProxy::new(value).into())
    }
}

impl Object for WeakFunctionProxy {
    fn type_name(&self) -> &str {
        "WeakFunctionProxy"
    }

    proxy_object_methods!();

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let (receiver, function) = self.live()?;
        let function = function.upgrade().ok_or(WraptError::ReferenceExpired)?;
        match receiver {
            Some(receiver) => {
                let receiver = receiver.upgrade().ok_or(WraptError::ReferenceExpired)?;
                let owner = receiver.class_of();
                function
                    .descr_get(Some(&receiver), owner.as_ref())?
                    .call(args, kwargs)
            }
            None => function.call(args, kwargs),
        }
    }
}
