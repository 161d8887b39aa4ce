//! Binding classification and descriptor resolution.
//!
//! Deciding whether a wrapped artifact behaves like a plain function, a
//! classmethod or a staticmethod happens once, when it is wrapped. Turning a
//! descriptor into a concrete callable for a `(receiver, owner)` pair is the
//! host's job and is injected through [`Resolver`].

use crate::{
    errors::{Result, WraptError},
    value::Value,
};

/// How a wrapped artifact binds when looked up through a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding {
    /// Plain functions and instance methods; the two only differ at bind time
    Function,
    /// Binds to the owning class
    ClassMethod,
    /// Never binds
    StaticMethod,
}

impl Binding {
    /// Classify an artifact from its declared kind, before any binding
    pub fn classify(wrapped: &Value) -> Self {
        wrapped.binding_kind().unwrap_or(Binding::Function)
    }
}

/// Host capability: resolve a descriptor against a receiver and owner type
pub trait Resolver: Send + Sync {
    fn resolve(&self, descriptor: &Value, receiver: Option<&Value>, owner: Option<&Value>) -> Result<Value>;
}

/// Resolver backed by the host object protocol's `descr_get`
#[derive(Debug, Default, Clone, Copy)]
pub struct HostResolver;

impl Resolver for HostResolver {
    fn resolve(&self, descriptor: &Value, receiver: Option<&Value>, owner: Option<&Value>) -> Result<Value> {
        if !descriptor.is_descriptor() {
            return Err(WraptError::attribute_not_found(descriptor.type_name(), "__get__"));
        }
        descriptor.descr_get(receiver, owner)
    }
}
