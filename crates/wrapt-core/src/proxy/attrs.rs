use dashmap::DashMap;

use crate::value::Value;

/// Prefix that marks an attribute name as proxy-private
pub const OWN_PREFIX: &str = "_self_";

/// Side-table of attributes stored on a proxy rather than its wrapped value.
///
/// A name is own when it carries [`OWN_PREFIX`] or has been declared
/// explicitly; own names never reach the wrapped value.
#[derive(Debug, Default)]
pub struct OwnAttrs {
    values: DashMap<String, Value>,
}

impl OwnAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_own(&self, name: &str) -> bool {
        name.starts_with(OWN_PREFIX) || self.values.contains_key(name)
    }

    /// Declare `name` as own, whatever its spelling
    pub fn declare(&self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Value> {
        self.values.remove(name).map(|(_, value)| value)
    }

    pub fn names(&self) -> Vec<String> {
        self.values.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
