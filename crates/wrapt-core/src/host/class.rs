use std::sync::{Arc, Weak};

use anyhow::anyhow;
use dashmap::DashMap;

use crate::{
    errors::{Result, WraptError},
    host::Finalizers,
    object::Object,
    value::{Kwargs, Value},
};

/// Named attribute namespace with descriptor-aware lookup.
///
/// Calling a class creates an [`Instance`] and runs its `init` attribute,
/// bound to the new instance, when the class defines one.
pub struct Class {
    name: String,
    attrs: DashMap<String, Value>,
    this: Weak<Class>,
    finalizers: Finalizers,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Arc::new_cyclic(|this| Self {
            name,
            attrs: DashMap::new(),
            this: this.clone(),
            finalizers: Finalizers::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Define a raw class attribute; descriptors are stored unresolved
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.attrs.insert(name.into(), value);
    }

    /// Raw attribute lookup without descriptor resolution
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.attrs.get(name).map(|entry| entry.value().clone())
    }

    fn handle(&self) -> Result<Arc<Class>> {
        self.this
            .upgrade()
            .ok_or_else(|| WraptError::from(anyhow!("class '{}' is no longer alive", self.name)))
    }
}

impl Object for Class {
    fn type_name(&self) -> &str {
        "type"
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("<class '{}'>", self.name))
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        let attr = self
            .lookup(name)
            .ok_or_else(|| WraptError::attribute_not_found(&self.name, name))?;
        if attr.is_descriptor() {
            let owner: Value = self.handle()?.into();
            return attr.descr_get(None, Some(&owner));
        }
        Ok(attr)
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        self.define(name, value);
        Ok(())
    }

    fn del_attr(&self, name: &str) -> Result<()> {
        self.attrs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| WraptError::attribute_not_found(&self.name, name))
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
        let instance: Value = Instance::new(self.handle()?).into();
        if self.lookup("init").is_some() {
            instance.get_attr("init")?.call(args, kwargs)?;
        } else if !args.is_empty() || !kwargs.is_empty() {
            return Err(WraptError::type_error(format!("{}() takes no arguments", self.name)));
        }
        Ok(instance)
    }

    fn finalizers(&self) -> Option<&Finalizers> {
        Some(&self.finalizers)
    }
}

/// Instance of a [`Class`] with its own attribute table
pub struct Instance {
    class: Arc<Class>,
    attrs: DashMap<String, Value>,
    this: Weak<Instance>,
    finalizers: Finalizers,
}

impl Instance {
    pub fn new(class: Arc<Class>) -> Arc<Self> {
        Self::with_attrs(class, DashMap::new())
    }

    fn with_attrs(class: Arc<Class>, attrs: DashMap<String, Value>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            class,
            attrs,
            this: this.clone(),
            finalizers: Finalizers::new(),
        })
    }

    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    fn handle(&self) -> Result<Value> {
        self.this
            .upgrade()
            .map(Value::from)
            .ok_or_else(|| WraptError::from(anyhow!("'{}' instance is no longer alive", self.class.name)))
    }

    /// Call a method the class defines, if it does
    fn call_method(&self, name: &str, args: Vec<Value>) -> Option<Result<Value>> {
        self.class.lookup(name)?;
        Some(self.get_attr(name).and_then(|method| method.call(args, Kwargs::new())))
    }
}

impl Object for Instance {
    fn type_name(&self) -> &str {
        &self.class.name
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.attrs.get(name) {
            return Ok(value.value().clone());
        }
        let attr = self
            .class
            .lookup(name)
            .ok_or_else(|| WraptError::attribute_not_found(&self.class.name, name))?;
        if attr.is_descriptor() {
            let receiver = self.handle()?;
            let owner: Value = Arc::clone(&self.class).into();
            return attr.descr_get(Some(&receiver), Some(&owner));
        }
        Ok(attr)
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        self.attrs.insert(name.to_string(), value);
        Ok(())
    }

    fn del_attr(&self, name: &str) -> Result<()> {
        self.attrs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| WraptError::attribute_not_found(&self.class.name, name))
    }

    fn dir(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.attrs.iter().map(|entry| entry.key().clone()).collect();
        names.extend(self.class.dir()?);
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn enter(&self) -> Result<Value> {
        match self.call_method("enter", Vec::new()) {
            Some(result) => result,
            None => self.handle(),
        }
    }

    fn exit(&self, error: Option<&WraptError>) -> Result<bool> {
        let error = error.map_or(Value::None, |err| Value::Str(err.to_string()));
        match self.call_method("exit", vec![error]) {
            Some(result) => result?.truthy(),
            None => Ok(false),
        }
    }

    fn class_of(&self) -> Option<Value> {
        Some(Arc::clone(&self.class).into())
    }

    fn finalizers(&self) -> Option<&Finalizers> {
        Some(&self.finalizers)
    }

    fn copy(&self) -> Result<Value> {
        let attrs = self
            .attrs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        Ok(Instance::with_attrs(Arc::clone(&self.class), attrs).into())
    }

    fn deep_copy(&self) -> Result<Value> {
        let attrs = DashMap::new();
        for entry in self.attrs.iter() {
            attrs.insert(entry.key().clone(), entry.value().deep_copy()?);
        }
        Ok(Instance::with_attrs(Arc::clone(&self.class), attrs).into())
    }

    fn serialize_value(&self) -> Result<serde_json::Value> {
        let mut fields = serde_json::Map::new();
        let mut entries: Vec<(String, Value)> = self
            .attrs
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, value) in entries {
            let json = serde_json::to_value(&value).map_err(anyhow::Error::from)?;
            fields.insert(name, json);
        }
        Ok(serde_json::Value::Object(fields))
    }
}
