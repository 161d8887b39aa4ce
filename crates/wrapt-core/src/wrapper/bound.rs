use std::sync::{Arc, Weak};

use anyhow::anyhow;
use tracing::trace;

use crate::{
    descriptor::Binding,
    errors::{Result, WraptError},
    object::{Object, ObjectRef},
    proxy::{partial, proxy_object_methods, sealed, Proxy, ProxyCore},
    value::{Kwargs, Value},
    wrapper::FunctionWrapper,
};

/// A [`FunctionWrapper`] resolved against a receiver.
///
/// Interceptor, gate and binding kind all come from `parent`.
pub struct BoundFunctionWrapper {
    core: ProxyCore,
    receiver: Option<Value>,
    parent: Arc<FunctionWrapper>,
    this: Weak<BoundFunctionWrapper>,
}

impl BoundFunctionWrapper {
    pub(crate) fn new(resolved: Value, receiver: Option<Value>, parent: Arc<FunctionWrapper>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            core: ProxyCore::new(resolved),
            receiver,
            parent,
            this: this.clone(),
        })
    }

    pub fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }

    pub fn parent(&self) -> &Arc<FunctionWrapper> {
        &self.parent
    }

    pub fn binding(&self) -> Binding {
        self.parent.binding()
    }

    fn handle(&self) -> Result<Arc<BoundFunctionWrapper>> {
        self.this
            .upgrade()
            .ok_or_else(|| WraptError::from(anyhow!("bound function wrapper is no longer alive")))
    }

    /// Already-bound wrappers return themselves, except a function accessed
    /// without a receiver, which is re-resolved from the parent
    pub fn bind(&self, receiver: Option<&Value>, owner: Option<&Value>) -> Result<Arc<BoundFunctionWrapper>> {
        if self.receiver.is_none() && self.binding() == Binding::Function {
            return self.parent.bind(receiver, owner);
        }
        self.handle()
    }

    fn wrapped_name(&self) -> String {
        self.wrapped()
            .and_then(|wrapped| wrapped.get_attr("name"))
            .ok()
            .and_then(|name| name.as_str().map(str::to_string))
            .unwrap_or_else(|| self.type_name().to_string())
    }
}

impl std::fmt::Debug for BoundFunctionWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundFunctionWrapper")
            .field("wrapped", &self.core.peek())
            .field("receiver", &self.receiver)
            .field("binding", &self.binding())
            .finish_non_exhaustive()
    }
}

impl sealed::Sealed for BoundFunctionWrapper {}

impl Proxy for BoundFunctionWrapper {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn rewrap(&self, value: Value) -> Result<Value> {
        Ok(BoundFunctionWrapper::new(value, self.receiver.clone(), Arc::clone(&self.parent)).into())
    }
}

impl Object for BoundFunctionWrapper {
    fn type_name(&self) -> &str {
        "BoundFunctionWrapper"
    }

    proxy_object_methods!();

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, mut args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let wrapped = self.wrapped()?;
        if !self.parent.gate_open()? {
            trace!("wrapper disabled, calling {} directly", wrapped.type_name());
            return wrapped.call(args, kwargs);
        }

        let interceptor = self.parent.interceptor();
        match self.binding() {
            Binding::Function => match &self.receiver {
                Some(receiver) => interceptor(&wrapped, Some(receiver), args, kwargs),
                None => {
                    if args.is_empty() {
                        return Err(WraptError::missing_receiver(&self.wrapped_name()));
                    }
                    let receiver = args.remove(0);
                    trace!("receiver passed positionally as {}", receiver.type_name());
                    let bound = partial(wrapped, vec![receiver.clone()], Kwargs::new());
                    interceptor(&bound, Some(&receiver), args, kwargs)
                }
            },
            // The bind-time receiver does not say whether the lookup went
            // through the class or an instance; the resolved callable does.
            Binding::ClassMethod | Binding::StaticMethod => {
                let receiver = wrapped.bound_receiver();
                interceptor(&wrapped, receiver.as_ref(), args, kwargs)
            }
        }
    }

    fn is_descriptor(&self) -> bool {
        true
    }

    fn descr_get(&self, _this: &ObjectRef, receiver: Option<&Value>, owner: Option<&Value>) -> Result<Value> {
        Ok(self.bind(receiver, owner)?.into())
    }

    fn binding_kind(&self) -> Option<Binding> {
        Some(self.binding())
    }
}
