use std::sync::Arc;

use dashmap::DashMap;

use crate::{
    errors::{Result, WraptError},
    host::{BoundMethod, Finalizers},
    object::{Object, ObjectRef},
    value::{Kwargs, Value},
};

/// Native body of a host function
pub type NativeFn = Arc<dyn Fn(Vec<Value>, Kwargs) -> Result<Value> + Send + Sync>;

/// Named native callable.
///
/// Looked up through a class with a receiver it binds into a [`BoundMethod`];
/// looked up without one it resolves to itself. Metadata lives in a generic
/// attribute table seeded with `name`.
pub struct Function {
    name: String,
    body: NativeFn,
    attrs: DashMap<String, Value>,
    finalizers: Finalizers,
}

impl Function {
    pub fn new<F>(name: impl Into<String>, body: F) -> Arc<Self>
    where
        F: Fn(Vec<Value>, Kwargs) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let attrs = DashMap::new();
        attrs.insert("name".to_string(), Value::Str(name.clone()));
        Arc::new(Self {
            name,
            body: Arc::new(body),
            attrs,
            finalizers: Finalizers::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Object for Function {
    fn type_name(&self) -> &str {
        "function"
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("<function {}>", self.name))
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        self.attrs
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| WraptError::attribute_not_found(self.type_name(), name))
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        self.attrs.insert(name.to_string(), value);
        Ok(())
    }

    fn del_attr(&self, name: &str) -> Result<()> {
        self.attrs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| WraptError::attribute_not_found(self.type_name(), name))
    }

    fn dir(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.attrs.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        (self.body)(args, kwargs)
    }

    fn is_descriptor(&self) -> bool {
        true
    }

    fn descr_get(&self, this: &ObjectRef, receiver: Option<&Value>, _owner: Option<&Value>) -> Result<Value> {
        match receiver {
            Some(receiver) if !receiver.is_none() => Ok(BoundMethod::new(
                receiver.clone(),
                Value::Object(Arc::clone(this)),
            )
            .into()),
            _ => Ok(Value::Object(Arc::clone(this))),
        }
    }

    fn finalizers(&self) -> Option<&Finalizers> {
        Some(&self.finalizers)
    }
}
