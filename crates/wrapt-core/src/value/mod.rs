//! Dynamic values carried by proxies.
//!
//! `Value` is the erased payload every proxy wraps. Immutable payloads
//! (`None`, `Bool`, `Int`, `Float`, `Str`) are copied by value; `List`, `Map`
//! and `Object` are shared handles, so cloning a `Value` never clones the
//! referent and a mutation through one handle is visible through all others.

use std::{
    any::Any,
    cmp::Ordering,
    hash::{DefaultHasher, Hash, Hasher},
    sync::Arc,
};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::ser::{Error as _, SerializeMap, SerializeSeq};

use crate::{
    descriptor::Binding,
    errors::{Result, WraptError},
    object::{Object, ObjectRef},
};

pub mod ops;

pub use ops::{BinaryOp, UnaryOp};

/// Shared, growable sequence
pub type ListRef = Arc<RwLock<Vec<Value>>>;

/// Shared, insertion-ordered mapping from string keys
pub type MapRef = Arc<RwLock<IndexMap<String, Value>>>;

/// Keyword arguments for calls
pub type Kwargs = IndexMap<String, Value>;

/// Lazy iteration over a value's elements
pub type ValueIter = Box<dyn Iterator<Item = Result<Value>> + Send>;

#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(ListRef),
    Map(MapRef),
    Object(ObjectRef),
}

impl Value {
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Arc::new(RwLock::new(items.into_iter().collect())))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Arc::new(RwLock::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Wrap a host object in a fresh shared handle
    pub fn object(object: impl Object) -> Self {
        Value::Object(Arc::new(object))
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "dict",
            Value::Object(obj) => obj.type_name(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListRef> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow the concrete host object behind this value
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        let obj = self.as_object()?;
        let any: &dyn Any = &**obj;
        any.downcast_ref::<T>()
    }

    /// Identity comparison: true when both values are the same referent
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
            _ => false,
        }
    }

    /// Shared referents can be mutated in place; everything else is a copy
    pub fn is_mutable(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_) | Value::Object(_))
    }

    // ----- identity and representation -----

    pub fn display(&self) -> Result<String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            Value::Object(obj) => obj.display(),
            _ => self.repr(),
        }
    }

    pub fn repr(&self) -> Result<String> {
        match self {
            Value::None => Ok("None".to_string()),
            Value::Bool(true) => Ok("True".to_string()),
            Value::Bool(false) => Ok("False".to_string()),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(format_float(*f)),
            Value::Str(s) => Ok(format!("{s:?}")),
            Value::List(list) => {
                let items = list.read().clone();
                let parts = items.iter().map(Value::repr).collect::<Result<Vec<_>>>()?;
                Ok(format!("[{}]", parts.join(", ")))
            }
            Value::Map(map) => {
                let entries = map.read().clone();
                let parts = entries
                    .iter()
                    .map(|(k, v)| Ok(format!("{k:?}: {}", v.repr()?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{{{}}}", parts.join(", ")))
            }
            Value::Object(obj) => obj.repr(),
        }
    }

    pub fn hash_value(&self) -> Result<u64> {
        let mut hasher = DefaultHasher::new();
        match self {
            Value::None => 0u8.hash(&mut hasher),
            Value::Bool(b) => i64::from(*b).hash(&mut hasher),
            Value::Int(i) => i.hash(&mut hasher),
            // Integral floats hash like the equal integer
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => (*f as i64).hash(&mut hasher),
            Value::Float(f) => f.to_bits().hash(&mut hasher),
            Value::Str(s) => s.hash(&mut hasher),
            Value::List(_) | Value::Map(_) => {
                return Err(WraptError::type_error(format!(
                    "unhashable type: '{}'",
                    self.type_name()
                )))
            }
            Value::Object(obj) => return obj.hash_value(),
        }
        Ok(hasher.finish())
    }

    pub fn truthy(&self) -> Result<bool> {
        match self {
            Value::None => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::List(list) => Ok(!list.read().is_empty()),
            Value::Map(map) => Ok(!map.read().is_empty()),
            Value::Object(obj) => obj.truthy(),
        }
    }

    // ----- comparison -----

    pub fn equals(&self, other: &Value) -> Result<bool> {
        if self.is(other) {
            return Ok(true);
        }
        match (self, other) {
            (Value::Object(obj), _) => obj.equals(other),
            (_, Value::Object(obj)) => obj.equals(self),
            (Value::Str(a), Value::Str(b)) => Ok(a == b),
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.read().clone(), b.read().clone());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !x.equals(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (a.read().clone(), b.read().clone());
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (key, x) in &a {
                    match b.get(key) {
                        Some(y) if x.equals(y)? => {}
                        _ => return Ok(false),
                    }
                }
                Ok(true)
            }
            _ => match (ops::Num::from_value(self), ops::Num::from_value(other)) {
                (Some(a), Some(b)) => Ok(a.partial_cmp(&b) == Some(Ordering::Equal)),
                _ => Ok(false),
            },
        }
    }

    /// Ordering between two values, `None` when they are not orderable
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>> {
        match (self, other) {
            (Value::Object(obj), _) => obj.compare(other),
            (_, Value::Object(obj)) => Ok(obj.compare(self)?.map(Ordering::reverse)),
            (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.read().clone(), b.read().clone());
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Some(Ordering::Equal) => continue,
                        other => return Ok(other),
                    }
                }
                Ok(Some(a.len().cmp(&b.len())))
            }
            _ => match (ops::Num::from_value(self), ops::Num::from_value(other)) {
                (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
                _ => Ok(None),
            },
        }
    }

    fn ordered(&self, other: &Value, symbol: &str) -> Result<Ordering> {
        self.compare(other)?.ok_or_else(|| {
            WraptError::type_error(format!(
                "'{symbol}' not supported between instances of '{}' and '{}'",
                self.type_name(),
                other.type_name()
            ))
        })
    }

    pub fn lt(&self, other: &Value) -> Result<bool> {
        Ok(self.ordered(other, "<")? == Ordering::Less)
    }

    pub fn le(&self, other: &Value) -> Result<bool> {
        Ok(self.ordered(other, "<=")? != Ordering::Greater)
    }

    pub fn gt(&self, other: &Value) -> Result<bool> {
        Ok(self.ordered(other, ">")? == Ordering::Greater)
    }

    pub fn ge(&self, other: &Value) -> Result<bool> {
        Ok(self.ordered(other, ">=")? != Ordering::Less)
    }

    // ----- attributes -----

    pub fn get_attr(&self, name: &str) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.get_attr(name),
            _ => Err(WraptError::attribute_not_found(self.type_name(), name)),
        }
    }

    pub fn set_attr(&self, name: &str, value: Value) -> Result<()> {
        match self {
            Value::Object(obj) => obj.set_attr(name, value),
            _ => Err(WraptError::attribute_not_found(self.type_name(), name)),
        }
    }

    pub fn del_attr(&self, name: &str) -> Result<()> {
        match self {
            Value::Object(obj) => obj.del_attr(name),
            _ => Err(WraptError::attribute_not_found(self.type_name(), name)),
        }
    }

    pub fn dir(&self) -> Result<Vec<String>> {
        match self {
            Value::Object(obj) => obj.dir(),
            Value::Map(map) => Ok(map.read().keys().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    // ----- container protocol -----

    pub fn len(&self) -> Result<usize> {
        match self {
            Value::Str(s) => Ok(s.chars().count()),
            Value::List(list) => Ok(list.read().len()),
            Value::Map(map) => Ok(map.read().len()),
            Value::Object(obj) => obj.len(),
            _ => Err(WraptError::type_error(format!(
                "object of type '{}' has no len()",
                self.type_name()
            ))),
        }
    }

    pub fn contains(&self, item: &Value) -> Result<bool> {
        match self {
            Value::Str(s) => match item {
                Value::Str(needle) => Ok(s.contains(needle.as_str())),
                _ => Err(WraptError::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    item.type_name()
                ))),
            },
            Value::List(list) => {
                let items = list.read().clone();
                for candidate in &items {
                    if candidate.equals(item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Value::Map(map) => Ok(item.as_str().is_some_and(|key| map.read().contains_key(key))),
            Value::Object(obj) => obj.contains(item),
            _ => Err(WraptError::type_error(format!(
                "argument of type '{}' is not iterable",
                self.type_name()
            ))),
        }
    }

    pub fn get_item(&self, key: &Value) -> Result<Value> {
        match self {
            Value::List(list) => {
                let list = list.read();
                let index = resolve_index(self.type_name(), key, list.len())?;
                Ok(list[index].clone())
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let index = resolve_index(self.type_name(), key, chars.len())?;
                Ok(Value::Str(chars[index].to_string()))
            }
            Value::Map(map) => {
                let key = map_key(key)?;
                map.read()
                    .get(key)
                    .cloned()
                    .ok_or_else(|| WraptError::key_not_found(key))
            }
            Value::Object(obj) => obj.get_item(key),
            _ => Err(not_subscriptable(self)),
        }
    }

    pub fn set_item(&self, key: &Value, value: Value) -> Result<()> {
        match self {
            Value::List(list) => {
                let mut list = list.write();
                let index = resolve_index("list", key, list.len())?;
                list[index] = value;
                Ok(())
            }
            Value::Map(map) => {
                map.write().insert(map_key(key)?.to_string(), value);
                Ok(())
            }
            Value::Object(obj) => obj.set_item(key, value),
            _ => Err(WraptError::type_error(format!(
                "'{}' object does not support item assignment",
                self.type_name()
            ))),
        }
    }

    pub fn del_item(&self, key: &Value) -> Result<()> {
        match self {
            Value::List(list) => {
                let mut list = list.write();
                let index = resolve_index("list", key, list.len())?;
                list.remove(index);
                Ok(())
            }
            Value::Map(map) => {
                let key = map_key(key)?;
                map.write()
                    .shift_remove(key)
                    .map(|_| ())
                    .ok_or_else(|| WraptError::key_not_found(key))
            }
            Value::Object(obj) => obj.del_item(key),
            _ => Err(WraptError::type_error(format!(
                "'{}' object does not support item deletion",
                self.type_name()
            ))),
        }
    }

    pub fn get_slice(&self, start: Option<i64>, stop: Option<i64>) -> Result<Value> {
        match self {
            Value::List(list) => {
                let list = list.read();
                let (lo, hi) = slice_bounds(start, stop, list.len());
                Ok(Value::list(list[lo..hi].iter().cloned()))
            }
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let (lo, hi) = slice_bounds(start, stop, chars.len());
                Ok(Value::Str(chars[lo..hi].iter().collect()))
            }
            Value::Object(obj) => obj.get_slice(start, stop),
            _ => Err(not_subscriptable(self)),
        }
    }

    pub fn set_slice(&self, start: Option<i64>, stop: Option<i64>, value: &Value) -> Result<()> {
        match self {
            Value::List(list) => {
                let items = value.iter()?.collect::<Result<Vec<_>>>()?;
                let mut list = list.write();
                let (lo, hi) = slice_bounds(start, stop, list.len());
                list.splice(lo..hi, items);
                Ok(())
            }
            Value::Object(obj) => obj.set_slice(start, stop, value),
            _ => Err(WraptError::type_error(format!(
                "'{}' object does not support slice assignment",
                self.type_name()
            ))),
        }
    }

    pub fn del_slice(&self, start: Option<i64>, stop: Option<i64>) -> Result<()> {
        match self {
            Value::List(list) => {
                let mut list = list.write();
                let (lo, hi) = slice_bounds(start, stop, list.len());
                list.drain(lo..hi);
                Ok(())
            }
            Value::Object(obj) => obj.del_slice(start, stop),
            _ => Err(WraptError::type_error(format!(
                "'{}' object does not support slice deletion",
                self.type_name()
            ))),
        }
    }

    /// A fresh, lazy iterator over the value's elements
    pub fn iter(&self) -> Result<ValueIter> {
        match self {
            Value::Str(s) => {
                let chars: Vec<Value> = s.chars().map(|c| Value::Str(c.to_string())).collect();
                Ok(Box::new(chars.into_iter().map(Ok)))
            }
            Value::List(list) => Ok(Box::new(ListIter {
                list: Arc::clone(list),
                index: 0,
            })),
            Value::Map(map) => Ok(Box::new(MapKeys {
                map: Arc::clone(map),
                index: 0,
            })),
            Value::Object(obj) => obj.iter(),
            _ => Err(WraptError::type_error(format!(
                "'{}' object is not iterable",
                self.type_name()
            ))),
        }
    }

    // ----- scoped resources -----

    pub fn enter(&self) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.enter(),
            _ => Err(no_context_manager(self)),
        }
    }

    pub fn exit(&self, error: Option<&WraptError>) -> Result<bool> {
        match self {
            Value::Object(obj) => obj.exit(error),
            _ => Err(no_context_manager(self)),
        }
    }

    // ----- calling and binding -----

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Object(obj) if obj.is_callable())
    }

    pub fn call(&self, args: Vec<Value>, kwargs: Kwargs) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.call(args, kwargs),
            _ => Err(WraptError::not_callable(self.type_name())),
        }
    }

    pub fn is_descriptor(&self) -> bool {
        matches!(self, Value::Object(obj) if obj.is_descriptor())
    }

    /// Resolve this value as a descriptor against `(receiver, owner)`
    pub fn descr_get(&self, receiver: Option<&Value>, owner: Option<&Value>) -> Result<Value> {
        match self {
            Value::Object(obj) => obj.descr_get(obj, receiver, owner),
            _ => Ok(self.clone()),
        }
    }

    pub fn binding_kind(&self) -> Option<Binding> {
        self.as_object().and_then(|obj| obj.binding_kind())
    }

    pub fn bound_receiver(&self) -> Option<Value> {
        self.as_object().and_then(|obj| obj.bound_receiver())
    }

    pub fn unbound_function(&self) -> Option<Value> {
        self.as_object().and_then(|obj| obj.unbound_function())
    }

    pub fn class_of(&self) -> Option<Value> {
        self.as_object().and_then(|obj| obj.class_of())
    }

    // ----- copying -----

    /// Shallow copy: new container, shared elements
    pub fn copy(&self) -> Result<Value> {
        match self {
            Value::List(list) => Ok(Value::list(list.read().iter().cloned())),
            Value::Map(map) => Ok(Value::Map(Arc::new(RwLock::new(map.read().clone())))),
            Value::Object(obj) => obj.copy(),
            _ => Ok(self.clone()),
        }
    }

    pub fn deep_copy(&self) -> Result<Value> {
        match self {
            Value::List(list) => {
                let items = list.read().clone();
                Ok(Value::list(
                    items.iter().map(Value::deep_copy).collect::<Result<Vec<_>>>()?,
                ))
            }
            Value::Map(map) => {
                let entries = map.read().clone();
                Ok(Value::map(
                    entries
                        .into_iter()
                        .map(|(k, v)| Ok((k, v.deep_copy()?)))
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
            Value::Object(obj) => obj.deep_copy(),
            _ => Ok(self.clone()),
        }
    }
}

struct ListIter {
    list: ListRef,
    index: usize,
}

impl Iterator for ListIter {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.list.read().get(self.index).cloned();
        self.index += 1;
        item.map(Ok)
    }
}

struct MapKeys {
    map: MapRef,
    index: usize,
}

impl Iterator for MapKeys {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self
            .map
            .read()
            .get_index(self.index)
            .map(|(k, _)| Value::Str(k.clone()));
        self.index += 1;
        key.map(Ok)
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

fn not_subscriptable(value: &Value) -> WraptError {
    WraptError::type_error(format!("'{}' object is not subscriptable", value.type_name()))
}

fn no_context_manager(value: &Value) -> WraptError {
    WraptError::type_error(format!(
        "'{}' object does not support the context manager protocol",
        value.type_name()
    ))
}

fn map_key(key: &Value) -> Result<&str> {
    key.as_str()
        .ok_or_else(|| WraptError::type_error(format!("dict keys must be str, not {}", key.type_name())))
}

/// Normalize a possibly negative index against `len`
fn resolve_index(type_name: &str, key: &Value, len: usize) -> Result<usize> {
    let index = key.as_int().ok_or_else(|| {
        WraptError::type_error(format!(
            "{type_name} indices must be integers, not {}",
            key.type_name()
        ))
    })?;
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    if (0..len).contains(&resolved) {
        Ok(resolved as usize)
    } else {
        Err(WraptError::index_out_of_range(type_name, index))
    }
}

/// Clamp slice bounds the way sequence slicing does
fn slice_bounds(start: Option<i64>, stop: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let clamp = |bound: i64| -> usize {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(0, len) as usize
    };
    let lo = start.map_or(0, clamp);
    let hi = stop.map_or(len as usize, clamp);
    (lo, hi.max(lo))
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.display() {
            Ok(text) => write!(f, "{text}"),
            Err(err) => write!(f, "<unprintable {}: {err}>", self.type_name()),
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.repr() {
            Ok(text) => write!(f, "{text}"),
            Err(err) => write!(f, "<unrepresentable {}: {err}>", self.type_name()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other).unwrap_or(false)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other).ok().flatten()
    }
}

impl serde::Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::None => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) => serializer.serialize_str(s),
            Value::List(list) => {
                let items = list.read().clone();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in &items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let entries = map.read().clone();
                let mut out = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in &entries {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Value::Object(obj) => obj
                .serialize_value()
                .map_err(S::Error::custom)?
                .serialize(serializer),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl<T: Object> From<Arc<T>> for Value {
    fn from(obj: Arc<T>) -> Self {
        Value::Object(obj)
    }
}
