use std::{
    hash::{DefaultHasher, Hash, Hasher},
    sync::Arc,
};

use crate::{
    descriptor::Binding,
    errors::{Result, WraptError},
    host::Finalizers,
    object::{Object, ObjectRef},
    value::{Kwargs, Value},
};

/// A function bound to a receiver (an instance, or a class for classmethods)
pub struct BoundMethod {
    receiver: Value,
    function: Value,
    finalizers: Finalizers,
}

impl BoundMethod {
    pub fn new(receiver: Value, function: Value) -> Arc<Self> {
        Arc::new(Self {
            receiver,
            function,
            finalizers: Finalizers::new(),
        })
    }

    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    pub fn function(&self) -> &Value {
        &self.function
    }
}

impl Object for BoundMethod {
    fn type_name(&self) -> &str {
        "method"
    }

    fn repr(&self) -> Result<String> {
        let name = self
            .function
            .get_attr("name")
            .ok()
            .and_then(|name| name.as_str().map(str::to_string))
            .unwrap_or_else(|| "?".to_string());
        Ok(format!("<bound method {name} of {}>", self.receiver.repr()?))
    }

    fn equals(&self, other: &Value) -> Result<bool> {
        Ok(other
            .downcast_ref::<BoundMethod>()
            .is_some_and(|other| other.receiver.is(&self.receiver) && other.function.is(&self.function)))
    }

    fn hash_value(&self) -> Result<u64> {
        let mut hasher = DefaultHasher::new();
        self.receiver.hash_value()?.hash(&mut hasher);
        self.function.hash_value()?.hash(&mut hasher);
        Ok(hasher.finish())
    }

    /// Metadata reads go to the underlying function
    fn get_attr(&self, name: &str) -> Result<Value> {
        self.function.get_attr(name)
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(self.receiver.clone());
        full.extend(args);
        self.function.call(full, kwargs)
    }

    fn bound_receiver(&self) -> Option<Value> {
        Some(self.receiver.clone())
    }

    fn unbound_function(&self) -> Option<Value> {
        Some(self.function.clone())
    }

    fn finalizers(&self) -> Option<&Finalizers> {
        Some(&self.finalizers)
    }
}

/// Descriptor that binds its function to the owning class
pub struct ClassMethod {
    function: Value,
}

impl ClassMethod {
    pub fn new(function: Value) -> Arc<Self> {
        Arc::new(Self { function })
    }
}

impl Object for ClassMethod {
    fn type_name(&self) -> &str {
        "classmethod"
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("<classmethod({})>", self.function.repr()?))
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        self.function.get_attr(name)
    }

    fn is_descriptor(&self) -> bool {
        true
    }

    fn descr_get(&self, _this: &ObjectRef, receiver: Option<&Value>, owner: Option<&Value>) -> Result<Value> {
        let owner = owner
            .filter(|owner| !owner.is_none())
            .cloned()
            .or_else(|| receiver.and_then(Value::class_of))
            .ok_or_else(|| WraptError::type_error("classmethod lookup requires an owner or a receiver"))?;
        Ok(BoundMethod::new(owner, self.function.clone()).into())
    }

    fn binding_kind(&self) -> Option<Binding> {
        Some(Binding::ClassMethod)
    }

    fn unbound_function(&self) -> Option<Value> {
        Some(self.function.clone())
    }
}

/// Descriptor that never binds
pub struct StaticMethod {
    function: Value,
}

impl StaticMethod {
    pub fn new(function: Value) -> Arc<Self> {
        Arc::new(Self { function })
    }
}

impl Object for StaticMethod {
    fn type_name(&self) -> &str {
        "staticmethod"
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("<staticmethod({})>", self.function.repr()?))
    }

    fn get_attr(&self, name: &str) -> Result<Value> {
        self.function.get_attr(name)
    }

    fn is_callable(&self) -> bool {
        self.function.is_callable()
    }

    fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        self.function.call(args, kwargs)
    }

    fn is_descriptor(&self) -> bool {
        true
    }

    fn descr_get(&self, _this: &ObjectRef, _receiver: Option<&Value>, _owner: Option<&Value>) -> Result<Value> {
        Ok(self.function.clone())
    }

    fn binding_kind(&self) -> Option<Binding> {
        Some(Binding::StaticMethod)
    }

    fn unbound_function(&self) -> Option<Value> {
        Some(self.function.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::host::{Class, Function};

    fn echo_args() -> Value {
        Function::new("echo", |args, _| Ok(Value::list(args))).into()
    }

    #[test]
    fn test_bound_method_prepends_receiver() {
        let bound: Value = BoundMethod::new(Value::from("self"), echo_args()).into();
        let result = bound.call(vec![Value::Int(1)], Kwargs::new()).unwrap();
        assert_eq!(result, Value::list([Value::from("self"), Value::Int(1)]));
        assert_eq!(bound.get_attr("name").unwrap(), Value::from("echo"));
    }

    #[test]
    fn test_bound_methods_compare_by_receiver_and_function() {
        let func = echo_args();
        let receiver = Value::list([]);
        let a: Value = BoundMethod::new(receiver.clone(), func.clone()).into();
        let b: Value = BoundMethod::new(receiver, func.clone()).into();
        let c: Value = BoundMethod::new(Value::list([]), func).into();
        assert!(a.equals(&b).unwrap());
        assert!(!a.equals(&c).unwrap());
        assert_eq!(a.hash_value().unwrap(), b.hash_value().unwrap());
    }

    #[test]
    fn test_classmethod_binds_to_class_through_instance() {
        let class = Class::new("Widget");
        class.define("make", ClassMethod::new(echo_args()).into());
        let class_value: Value = class.clone().into();
        let instance = class_value.call(Vec::new(), Kwargs::new()).unwrap();

        let via_class = class_value.get_attr("make").unwrap();
        let via_instance = instance.get_attr("make").unwrap();
        assert!(via_class.bound_receiver().unwrap().is(&class_value));
        assert!(via_instance.bound_receiver().unwrap().is(&class_value));
    }

    #[test]
    fn test_staticmethod_never_binds() {
        let func = echo_args();
        let method: Value = StaticMethod::new(func.clone()).into();
        let resolved = method.descr_get(Some(&Value::Int(1)), None).unwrap();
        assert!(resolved.is(&func));
        assert_eq!(method.binding_kind(), Some(Binding::StaticMethod));
    }
}
