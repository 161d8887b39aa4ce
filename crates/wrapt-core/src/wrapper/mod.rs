//! Binding-aware function wrappers.
//!
//! A [`FunctionWrapper`] sits in a class namespace like the function it
//! wraps. Looking it up binds it: the wrapped descriptor is resolved against
//! `(receiver, owner)` and the result is carried by a
//! [`BoundFunctionWrapper`] that hands the right receiver to the
//! interceptor on every call.

use std::sync::{Arc, Weak};

use anyhow::anyhow;
use tracing::trace;

use crate::{
    descriptor::{Binding, HostResolver, Resolver},
    errors::{Result, WraptError},
    object::{Object, ObjectRef},
    proxy::{proxy_object_methods, sealed, Proxy, ProxyCore},
    value::{Kwargs, Value},
};

pub mod bound;

pub use bound::BoundFunctionWrapper;

/// Interception callback: `(wrapped, receiver, args, kwargs) -> result`
pub type Interceptor = Arc<dyn Fn(&Value, Option<&Value>, Vec<Value>, Kwargs) -> Result<Value> + Send + Sync>;

/// Zero-argument gate predicate
pub type Predicate = Arc<dyn Fn() -> Result<bool> + Send + Sync>;

/// Build an [`Interceptor`] from a closure
pub fn interceptor<F>(f: F) -> Interceptor
where
    F: Fn(&Value, Option<&Value>, Vec<Value>, Kwargs) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Gate consulted once per call; when it is off the interceptor is bypassed
#[derive(Clone)]
pub enum Enabled {
    Flag(bool),
    Predicate(Predicate),
    /// Callable values are invoked with no arguments; anything else is
    /// tested for truthiness directly
    Value(Value),
}

impl Enabled {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn() -> Result<bool> + Send + Sync + 'static,
    {
        Enabled::Predicate(Arc::new(f))
    }

    pub fn is_enabled(&self) -> Result<bool> {
        match self {
            Enabled::Flag(flag) => Ok(*flag),
            Enabled::Predicate(predicate) => predicate(),
            Enabled::Value(value) if value.is_callable() => value.call(Vec::new(), Kwargs::new())?.truthy(),
            Enabled::Value(value) => value.truthy(),
        }
    }
}

impl From<bool> for Enabled {
    fn from(flag: bool) -> Self {
        Enabled::Flag(flag)
    }
}

impl std::fmt::Debug for Enabled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Enabled::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            Enabled::Predicate(_) => f.write_str("Predicate(..)"),
            Enabled::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Optional construction inputs for a [`FunctionWrapper`]
#[derive(Clone)]
pub struct WrapperOptions {
    pub enabled: Option<Enabled>,
    pub resolver: Arc<dyn Resolver>,
}

impl Default for WrapperOptions {
    fn default() -> Self {
        Self {
            enabled: None,
            resolver: Arc::new(HostResolver),
        }
    }
}

impl WrapperOptions {
    pub fn enabled(mut self, enabled: impl Into<Enabled>) -> Self {
        self.enabled = Some(enabled.into());
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

/// Unbound wrapper around a function, method or method descriptor
pub struct FunctionWrapper {
    core: ProxyCore,
    interceptor: Interceptor,
    enabled: Option<Enabled>,
    binding: Binding,
    resolver: Arc<dyn Resolver>,
    this: Weak<FunctionWrapper>,
}

impl FunctionWrapper {
    pub fn new(wrapped: Value, interceptor: Interceptor) -> Arc<Self> {
        Self::with_options(wrapped, interceptor, WrapperOptions::default())
    }

    pub fn with_options(wrapped: Value, interceptor: Interceptor, options: WrapperOptions) -> Arc<Self> {
        let binding = Binding::classify(&wrapped);
        trace!("wrapping {} as {:?}", wrapped.type_name(), binding);
        Arc::new_cyclic(|this| Self {
            core: ProxyCore::new(wrapped),
            interceptor,
            enabled: options.enabled,
            binding,
            resolver: options.resolver,
            this: this.clone(),
        })
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn interceptor(&self) -> &Interceptor {
        &self.interceptor
    }

    pub fn enabled(&self) -> Option<&Enabled> {
        self.enabled.as_ref()
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    fn handle(&self) -> Result<Arc<FunctionWrapper>> {
        self.this
            .upgrade()
            .ok_or_else(|| WraptError::from(anyhow!("function wrapper is no longer alive")))
    }

    /// Resolve the wrapped descriptor against `(receiver, owner)` and carry
    /// the result in a new bound wrapper
    pub fn bind(&self, receiver: Option<&Value>, owner: Option<&Value>) -> Result<Arc<BoundFunctionWrapper>> {
        let receiver = receiver.filter(|receiver| !receiver.is_none());
        let descriptor = self.wrapped()?;
        let resolved = self.resolver.resolve(&descriptor, receiver, owner)?;
        let receiver_type = receiver.map_or("no receiver", |receiver| receiver.type_name());
        trace!("bound {:?} wrapper to {}", self.binding, receiver_type);
        Ok(BoundFunctionWrapper::new(resolved, receiver.cloned(), self.handle()?))
    }

    /// Evaluate the gate; `false` means call straight through
    pub(crate) fn gate_open(&self) -> Result<bool> {
        match &self.enabled {
            Some(enabled) => enabled.is_enabled(),
            None => Ok(true),
        }
    }
}

impl std::fmt::Debug for FunctionWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionWrapper")
            .field("wrapped", &self.core.peek())
            .field("binding", &self.binding)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl sealed::Sealed for FunctionWrapper {}

impl Proxy for FunctionWrapper {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn rewrap(&self, value: Value) -> Result<Value> {
        let options = WrapperOptions {
            enabled: self.enabled.clone(),
            resolver: Arc::clone(&self.resolver),
        };
        Ok(FunctionWrapper::with_options(value, Arc::clone(&self.interceptor), options).into())
    }
}

impl Object for FunctionWrapper {
    fn type_name(&self) -> &str {
        "FunctionWrapper"
    }

    proxy_object_methods!();

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let wrapped = self.wrapped()?;
        if !self.gate_open()? {
            trace!("wrapper disabled, calling {} directly", wrapped.type_name());
            return wrapped.call(args, kwargs);
        }
        (self.interceptor)(&wrapped, None, args, kwargs)
    }

    fn is_descriptor(&self) -> bool {
        true
    }

    fn descr_get(&self, _this: &ObjectRef, receiver: Option<&Value>, owner: Option<&Value>) -> Result<Value> {
        Ok(self.bind(receiver, owner)?.into())
    }

    fn binding_kind(&self) -> Option<Binding> {
        Some(self.binding)
    }
}

#[cfg(test)]
mod tests;
