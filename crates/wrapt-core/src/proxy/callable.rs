use std::sync::Arc;

use crate::{
    errors::Result,
    object::Object,
    proxy::{proxy_object_methods, sealed, Proxy, ProxyCore},
    value::{Kwargs, Value},
};

/// Delegating proxy that is also callable
#[derive(Debug, Default)]
pub struct CallableProxy {
    core: ProxyCore,
}

impl CallableProxy {
    pub fn new(wrapped: Value) -> Arc<Self> {
        Arc::new(Self {
            core: ProxyCore::new(wrapped),
        })
    }
}

impl sealed::Sealed for CallableProxy {}

impl Proxy for CallableProxy {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn rewrap(&self, value: Value) -> Result<Value> {
        Ok(CallableProxy::new(value).into())
    }
}

impl Object for CallableProxy {
    fn type_name(&self) -> &str {
        "CallableProxy"
    }

    proxy_object_methods!();

    fn is_callable(&self) -> bool {
        self.core.peek().is_some_and(|wrapped| wrapped.is_callable())
    }

    fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        self.wrapped()?.call(args, kwargs)
    }
}

/// Callable proxy with leading positional and keyword arguments applied
#[derive(Debug)]
pub struct PartialCallableProxy {
    core: ProxyCore,
    args: Vec<Value>,
    kwargs: Kwargs,
}

impl PartialCallableProxy {
    pub fn new(wrapped: Value, args: Vec<Value>, kwargs: Kwargs) -> Arc<Self> {
        Arc::new(Self {
            core: ProxyCore::new(wrapped),
            args,
            kwargs,
        })
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }
}

/// Apply `args` and `kwargs` to `callable` ahead of any call-time arguments
pub fn partial(callable: Value, args: Vec<Value>, kwargs: Kwargs) -> Value {
    PartialCallableProxy::new(callable, args, kwargs).into()
}

impl sealed::Sealed for PartialCallableProxy {}

impl Proxy for PartialCallableProxy {
    fn core(&self) -> &ProxyCore {
        &self.core
    }

    fn rewrap(&self, value: Value) -> Result<Value> {
        Ok(partial(value, self.args.clone(), self.kwargs.clone()))
    }
}

impl Object for PartialCallableProxy {
    fn type_name(&self) -> &str {
        "PartialCallableProxy"
    }

    proxy_object_methods!();

    fn is_callable(&self) -> bool {
        self.core.peek().is_some_and(|wrapped| wrapped.is_callable())
    }

    fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let target = self.wrapped()?;
        let mut merged_args = self.args.clone();
        merged_args.extend(args);
        let mut merged_kwargs = self.kwargs.clone();
        merged_kwargs.extend(kwargs);
        target.call(merged_args, merged_kwargs)
    }
}
