//! The host object protocol.
//!
//! Every operation a proxy can forward is a method on [`Object`]. Default
//! implementations forward to [`Object::delegate`] when the object is a proxy
//! and report the matching "unsupported" error otherwise, so host types only
//! implement what they support and proxies only override what they change.
//! Calling and descriptor binding are never forwarded by default: a proxy
//! has to opt into both.

use std::{any::Any, cmp::Ordering, sync::Arc};

use crate::{
    descriptor::Binding,
    errors::{Result, WraptError},
    host::Finalizers,
    value::{BinaryOp, Kwargs, UnaryOp, Value, ValueIter},
};

/// Shared handle to a host object
pub type ObjectRef = Arc<dyn Object>;

pub trait Object: Any + Send + Sync {
    fn type_name(&self) -> &str;

    /// The value operations are forwarded to. `None` for non-proxies.
    fn delegate(&self) -> Option<Result<Value>> {
        None
    }

    fn repr(&self) -> Result<String> {
        Ok(format!("<{} object>", self.type_name()))
    }

    fn display(&self) -> Result<String> {
        match self.delegate() {
            Some(target) => target?.display(),
            None => self.repr(),
        }
    }

    fn hash_value(&self) -> Result<u64> {
        match self.delegate() {
            Some(target) => target?.hash_value(),
            None => Ok(self as *const Self as *const () as usize as u64),
        }
    }

    fn equals(&self, other: &Value) -> Result<bool> {
        match self.delegate() {
            Some(target) => target?.equals(other),
            None => Ok(matches!(other, Value::Object(obj)
                if std::ptr::addr_eq(self as *const Self, Arc::as_ptr(obj)))),
        }
    }

    fn compare(&self, other: &Value) -> Result<Option<Ordering>> {
        match self.delegate() {
            Some(target) => target?.compare(other),
            None => Ok(None),
        }
    }

    fn truthy(&self) -> Result<bool> {
        match self.delegate() {
            Some(target) => target?.truthy(),
            None => Ok(true),
        }
    }

    // ----- attributes -----

    fn get_attr(&self, name: &str) -> Result<Value> {
        match self.delegate() {
            Some(target) => target?.get_attr(name),
            None => Err(WraptError::attribute_not_found(self.type_name(), name)),
        }
    }

    fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        match self.delegate() {
            Some(target) => target?.set_attr(name, value),
            None => Err(WraptError::attribute_not_found(self.type_name(), name)),
        }
    }

    fn del_attr(&self, name: &str) -> Result<()> {
        match self.delegate() {
            Some(target) => target?.del_attr(name),
            None => Err(WraptError::attribute_not_found(self.type_name(), name)),
        }
    }

    fn dir(&self) -> Result<Vec<String>> {
        match self.delegate() {
            Some(target) => target?.dir(),
            None => Ok(Vec::new()),
        }
    }

    // ----- operators -----

    /// `reflected` is set when this object is the right-hand operand
    fn binary_op(&self, op: BinaryOp, other: &Value, reflected: bool) -> Result<Value> {
        match self.delegate() {
            Some(target) if reflected => other.binary_op(op, &target?),
            Some(target) => target?.binary_op(op, other),
            None if reflected => Err(WraptError::binary_type_error(
                op.symbol(),
                other.type_name(),
                self.type_name(),
            )),
            None => Err(WraptError::binary_type_error(
                op.symbol(),
                self.type_name(),
                other.type_name(),
            )),
        }
    }

    /// In-place operator. `Ok(None)` means this object was mutated and the
    /// caller keeps its handle; `Ok(Some(v))` replaces the handle with `v`.
    fn inplace_op(&self, op: BinaryOp, other: &Value) -> Result<Option<Value>> {
        self.binary_op(op, other, false).map(Some)
    }

    fn unary_op(&self, op: UnaryOp) -> Result<Value> {
        match self.delegate() {
            Some(target) => target?.unary_op(op),
            None => Err(WraptError::type_error(format!(
                "bad operand type for {}: '{}'",
                op.symbol(),
                self.type_name()
            ))),
        }
    }

    fn to_int(&self) -> Result<i64> {
        match self.delegate() {
            Some(target) => target?.to_int(),
            None => Err(WraptError::type_error(format!(
                "int() argument must be a string or a number, not '{}'",
                self.type_name()
            ))),
        }
    }

    fn to_float(&self) -> Result<f64> {
        match self.delegate() {
            Some(target) => target?.to_float(),
            None => Err(WraptError::type_error(format!(
                "float() argument must be a string or a number, not '{}'",
                self.type_name()
            ))),
        }
    }

    // ----- container protocol -----

    fn len(&self) -> Result<usize> {
        match self.delegate() {
            Some(target) => target?.len(),
            None => Err(WraptError::type_error(format!(
                "object of type '{}' has no len()",
                self.type_name()
            ))),
        }
    }

    fn contains(&self, item: &Value) -> Result<bool> {
        match self.delegate() {
            Some(target) => target?.contains(item),
            None => Err(WraptError::type_error(format!(
                "argument of type '{}' is not iterable",
                self.type_name()
            ))),
        }
    }

    fn get_item(&self, key: &Value) -> Result<Value> {
        match self.delegate() {
            Some(target) => target?.get_item(key),
            None => Err(not_subscriptable(self.type_name())),
        }
    }

    fn set_item(&self, key: &Value, value: Value) -> Result<()> {
        match self.delegate() {
            Some(target) => target?.set_item(key, value),
            None => Err(not_subscriptable(self.type_name())),
        }
    }

    fn del_item(&self, key: &Value) -> Result<()> {
        match self.delegate() {
            Some(target) => target?.del_item(key),
            None => Err(not_subscriptable(self.type_name())),
        }
    }

    fn get_slice(&self, start: Option<i64>, stop: Option<i64>) -> Result<Value> {
        match self.delegate() {
            Some(target) => target?.get_slice(start, stop),
            None => Err(not_subscriptable(self.type_name())),
        }
    }

    fn set_slice(&self, start: Option<i64>, stop: Option<i64>, value: &Value) -> Result<()> {
        match self.delegate() {
            Some(target) => target?.set_slice(start, stop, value),
            None => Err(not_subscriptable(self.type_name())),
        }
    }

    fn del_slice(&self, start: Option<i64>, stop: Option<i64>) -> Result<()> {
        match self.delegate() {
            Some(target) => target?.del_slice(start, stop),
            None => Err(not_subscriptable(self.type_name())),
        }
    }

    fn iter(&self) -> Result<ValueIter> {
        match self.delegate() {
            Some(target) => target?.iter(),
            None => Err(WraptError::type_error(format!(
                "'{}' object is not iterable",
                self.type_name()
            ))),
        }
    }

    // ----- scoped resources -----

    fn enter(&self) -> Result<Value> {
        match self.delegate() {
            Some(target) => target?.enter(),
            None => Err(no_context_manager(self.type_name())),
        }
    }

    /// Leave the scope; returns true when `error` should be suppressed
    fn exit(&self, error: Option<&WraptError>) -> Result<bool> {
        match self.delegate() {
            Some(target) => target?.exit(error),
            None => Err(no_context_manager(self.type_name())),
        }
    }

    // ----- calling and binding -----

    fn is_callable(&self) -> bool {
        false
    }

    fn call(&self, _args: Vec<Value>, _kwargs: Kwargs) -> Result<Value> {
        Err(WraptError::not_callable(self.type_name()))
    }

    fn is_descriptor(&self) -> bool {
        false
    }

    /// Resolve against `(receiver, owner)`. `this` is the handle `self` was
    /// reached through; non-descriptors return it unchanged.
    fn descr_get(&self, this: &ObjectRef, _receiver: Option<&Value>, _owner: Option<&Value>) -> Result<Value> {
        Ok(Value::Object(Arc::clone(this)))
    }

    /// Declared binding kind, if the object is a classmethod- or
    /// staticmethod-like artifact
    fn binding_kind(&self) -> Option<Binding> {
        self.delegate()?.ok()?.binding_kind()
    }

    /// Receiver a bound callable carries (instance or class)
    fn bound_receiver(&self) -> Option<Value> {
        self.delegate()?.ok()?.bound_receiver()
    }

    /// Underlying function of a bound callable
    fn unbound_function(&self) -> Option<Value> {
        self.delegate()?.ok()?.unbound_function()
    }

    fn class_of(&self) -> Option<Value> {
        self.delegate()?.ok()?.class_of()
    }

    /// Objects exposing finalizers can be weakly referenced
    fn finalizers(&self) -> Option<&Finalizers> {
        None
    }

    // ----- copying and serialization -----

    fn copy(&self) -> Result<Value> {
        Err(WraptError::type_error(format!(
            "cannot copy '{}' object",
            self.type_name()
        )))
    }

    fn deep_copy(&self) -> Result<Value> {
        Err(WraptError::type_error(format!(
            "cannot deep-copy '{}' object",
            self.type_name()
        )))
    }

    fn serialize_value(&self) -> Result<serde_json::Value> {
        Err(WraptError::type_error(format!(
            "Object of type '{}' is not serializable",
            self.type_name()
        )))
    }
}

fn not_subscriptable(type_name: &str) -> WraptError {
    WraptError::type_error(format!("'{type_name}' object is not subscriptable"))
}

fn no_context_manager(type_name: &str) -> WraptError {
    WraptError::type_error(format!(
        "'{type_name}' object does not support the context manager protocol"
    ))
}
