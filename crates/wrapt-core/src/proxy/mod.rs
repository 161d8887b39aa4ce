//! Delegating proxies.
//!
//! A proxy owns one wrapped value and forwards every [`Object`] operation to
//! it through [`Object::delegate`]. What a proxy adds on top is small: a side
//! table of own attributes, in-place operators that keep value semantics for
//! immutable payloads, and a refusal to guess copy or serialization
//! strategies.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    errors::{Result, WraptError},
    host::Finalizers,
    object::Object,
    value::{BinaryOp, Value},
};

pub mod attrs;
pub mod callable;

pub use attrs::{OwnAttrs, OWN_PREFIX};
pub use callable::{partial, CallableProxy, PartialCallableProxy};

/// Reserved attribute naming the wrapped value itself
pub const WRAPPED_ATTR: &str = "__wrapped__";

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// State shared by every proxy: the wrapped slot, own attributes and
/// finalizers (proxies can be weakly referenced)
#[derive(Debug, Default)]
pub struct ProxyCore {
    wrapped: RwLock<Option<Value>>,
    attrs: OwnAttrs,
    finalizers: Finalizers,
}

impl ProxyCore {
    pub fn new(wrapped: Value) -> Self {
        Self {
            wrapped: RwLock::new(Some(wrapped)),
            ..Self::default()
        }
    }

    /// A core whose wrapped slot starts unset
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, proxy: &str) -> Result<Value> {
        self.wrapped
            .read()
            .clone()
            .ok_or_else(|| WraptError::uninitialized(proxy))
    }

    pub fn peek(&self) -> Option<Value> {
        self.wrapped.read().clone()
    }

    pub fn set(&self, value: Value) {
        *self.wrapped.write() = Some(value);
    }

    pub fn take(&self) -> Option<Value> {
        self.wrapped.write().take()
    }

    pub fn is_set(&self) -> bool {
        self.wrapped.read().is_some()
    }

    pub fn attrs(&self) -> &OwnAttrs {
        &self.attrs
    }

    pub fn finalizers(&self) -> &Finalizers {
        &self.finalizers
    }
}

/// Capabilities shared by this crate's proxies.
///
/// Sealed: the forwarding behavior lives in [`Object`] defaults plus the
/// overrides installed by `proxy_object_methods!`, and outside types cannot
/// shadow it by implementing this trait.
pub trait Proxy: Object + sealed::Sealed {
    fn core(&self) -> &ProxyCore;

    fn wrapped(&self) -> Result<Value> {
        self.core().get(self.type_name())
    }

    fn set_wrapped(&self, value: Value) {
        self.core().set(value);
    }

    /// Remove the wrapped value, leaving the proxy uninitialized
    fn take_wrapped(&self) -> Option<Value> {
        self.core().take()
    }

    fn own_attrs(&self) -> &OwnAttrs {
        self.core().attrs()
    }

    /// New proxy of the same kind around `value`
    fn rewrap(&self, value: Value) -> Result<Value>;
}

/// Install the proxy overrides of [`Object`] inside an `impl Object` block.
///
/// Everything not listed here forwards through the `delegate` default.
macro_rules! proxy_object_methods {
    () => {
        fn delegate(&self) -> Option<$crate::errors::Result<$crate::value::Value>> {
            Some($crate::proxy::Proxy::wrapped(self))
        }

        fn repr(&self) -> $crate::errors::Result<String> {
            $crate::proxy::proxy_repr(self)
        }

        fn get_attr(&self, name: &str) -> $crate::errors::Result<$crate::value::Value> {
            $crate::proxy::proxy_get_attr(self, name)
        }

        fn set_attr(&self, name: &str, value: $crate::value::Value) -> $crate::errors::Result<()> {
            $crate::proxy::proxy_set_attr(self, name, value)
        }

        fn del_attr(&self, name: &str) -> $crate::errors::Result<()> {
            $crate::proxy::proxy_del_attr(self, name)
        }

        fn inplace_op(
            &self,
            op: $crate::value::BinaryOp,
            other: &$crate::value::Value,
        ) -> $crate::errors::Result<Option<$crate::value::Value>> {
            $crate::proxy::proxy_inplace_op(self, op, other)
        }

        fn finalizers(&self) -> Option<&$crate::host::Finalizers> {
            Some($crate::proxy::Proxy::core(self).finalizers())
        }

        fn copy(&self) -> $crate::errors::Result<$crate::value::Value> {
            Err($crate::errors::WraptError::unsupported(self.type_name(), "__copy__"))
        }

        fn deep_copy(&self) -> $crate::errors::Result<$crate::value::Value> {
            Err($crate::errors::WraptError::unsupported(self.type_name(), "__deepcopy__"))
        }

        fn serialize_value(&self) -> $crate::errors::Result<serde_json::Value> {
            Err($crate::errors::WraptError::unsupported(self.type_name(), "__reduce_ex__"))
        }
    };
}

pub(crate) use proxy_object_methods;

pub(crate) fn proxy_repr<P: Proxy + ?Sized>(proxy: &P) -> Result<String> {
    let wrapped = proxy.wrapped()?;
    Ok(format!("<{} for {}>", proxy.type_name(), wrapped.type_name()))
}

pub(crate) fn proxy_get_attr<P: Proxy + ?Sized>(proxy: &P, name: &str) -> Result<Value> {
    if name == WRAPPED_ATTR {
        return proxy.wrapped();
    }
    if proxy.own_attrs().is_own(name) {
        return proxy
            .own_attrs()
            .get(name)
            .ok_or_else(|| WraptError::attribute_not_found(proxy.type_name(), name));
    }
    proxy.wrapped()?.get_attr(name)
}

pub(crate) fn proxy_set_attr<P: Proxy + ?Sized>(proxy: &P, name: &str, value: Value) -> Result<()> {
    if name == WRAPPED_ATTR {
        proxy.set_wrapped(value);
        return Ok(());
    }
    if proxy.own_attrs().is_own(name) {
        proxy.own_attrs().declare(name, value);
        return Ok(());
    }
    proxy.wrapped()?.set_attr(name, value)
}

pub(crate) fn proxy_del_attr<P: Proxy + ?Sized>(proxy: &P, name: &str) -> Result<()> {
    if name == WRAPPED_ATTR {
        return Err(WraptError::type_error(format!("{WRAPPED_ATTR} must be an object")));
    }
    if proxy.own_attrs().is_own(name) {
        return proxy
            .own_attrs()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| WraptError::attribute_not_found(proxy.type_name(), name));
    }
    proxy.wrapped()?.del_attr(name)
}

/// Mutable payloads are changed in place and keep the proxy; anything else
/// is replaced by a new proxy of the same kind around the result
pub(crate) fn proxy_inplace_op<P: Proxy + ?Sized>(
    proxy: &P,
    op: BinaryOp,
    other: &Value,
) -> Result<Option<Value>> {
    let target = proxy.wrapped()?;
    let result = target.inplace_op(op, other)?;
    if result.is(&target) {
        return Ok(None);
    }
    proxy.rewrap(result).map(Some)
}

/// Transparent delegating proxy. Not callable; see [`CallableProxy`].
#[derive(Debug, Default)]
pub struct ObjectProxy {
    core: ProxyCore,
}

impl ObjectProxy {
    pub fn new(wrapped: Value) -> Arc<Self> {
        Arc::new(Self {
            core: ProxyCore::new(wrapped),
        })
    }

    /// A proxy with nothing wrapped yet
    pub fn uninitialized() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl sealed::Sealed for ObjectProxy {}

impl Proxy for ObjectProxy {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn rewrap(&self, value: Value) -> Result<Value> {
        Ok(ObjectProxy::new(value).into())
    }
}

impl Object for ObjectProxy {
    fn type_name(&self) -> &str {
        "ObjectProxy"
    }

    proxy_object_methods!();
}

#[cfg(test)]
mod tests;
