use thiserror::Error;

/// Errors raised by proxies, wrappers and the host object model.
///
/// Only `Uninitialized`, `Unsupported`, `ReferenceExpired` and
/// `MissingReceiver` originate in the proxy layer itself. Everything else is
/// produced by the wrapped value (or the host model standing in for it) and is
/// propagated through proxies unchanged.
#[derive(Error, Debug)]
pub enum WraptError {
    #[error("{proxy} wrapped value has not been initialized")]
    Uninitialized { proxy: String },

    #[error("{proxy} must define {capability}(); it must be explicitly supported by a subtype")]
    Unsupported { proxy: String, capability: String },

    #[error("weakly-referenced object no longer exists")]
    ReferenceExpired,

    #[error("{callable}() missing 1 required positional argument: the receiver")]
    MissingReceiver { callable: String },

    #[error("'{type_name}' object has no attribute '{attribute}'")]
    AttributeNotFound { type_name: String, attribute: String },

    #[error("Type error: {message}")]
    TypeError { message: String },

    #[error("Type error: unsupported operand type(s) for {operation}: '{left_type}' and '{right_type}'")]
    BinaryTypeError {
        operation: String,
        left_type: String,
        right_type: String,
    },

    #[error("{type_name} index out of range: {index}")]
    IndexOutOfRange { type_name: String, index: i64 },

    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow in {operation}")]
    Overflow { operation: String },

    #[error("cannot create weak reference to '{type_name}' object")]
    NotWeakReferenceable { type_name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WraptError {
    /// Create an uninitialized proxy error
    pub fn uninitialized(proxy: &str) -> Self {
        Self::Uninitialized {
            proxy: proxy.to_string(),
        }
    }

    /// Create an unsupported operation error for a proxy capability
    pub fn unsupported(proxy: &str, capability: &str) -> Self {
        Self::Unsupported {
            proxy: proxy.to_string(),
            capability: capability.to_string(),
        }
    }

    /// Create a missing receiver (arity) error
    pub fn missing_receiver(callable: &str) -> Self {
        Self::MissingReceiver {
            callable: callable.to_string(),
        }
    }

    /// Create an attribute lookup error
    pub fn attribute_not_found(type_name: &str, attribute: &str) -> Self {
        Self::AttributeNotFound {
            type_name: type_name.to_string(),
            attribute: attribute.to_string(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError {
            message: message.into(),
        }
    }

    /// Create a type error for binary operations
    pub fn binary_type_error(operation: &str, left_type: &str, right_type: &str) -> Self {
        Self::BinaryTypeError {
            operation: operation.to_string(),
            left_type: left_type.to_string(),
            right_type: right_type.to_string(),
        }
    }

    pub fn not_callable(type_name: &str) -> Self {
        Self::type_error(format!("'{type_name}' object is not callable"))
    }

    pub fn index_out_of_range(type_name: &str, index: i64) -> Self {
        Self::IndexOutOfRange {
            type_name: type_name.to_string(),
            index,
        }
    }

    pub fn key_not_found(key: &str) -> Self {
        Self::KeyNotFound {
            key: key.to_string(),
        }
    }

    pub fn overflow(operation: &str) -> Self {
        Self::Overflow {
            operation: operation.to_string(),
        }
    }

    pub fn not_weak_referenceable(type_name: &str) -> Self {
        Self::NotWeakReferenceable {
            type_name: type_name.to_string(),
        }
    }

    /// True for the error raised when a weakly-referenced target is gone
    pub fn is_reference_expired(&self) -> bool {
        matches!(self, Self::ReferenceExpired)
    }
}

/// Result type for proxy and wrapper operations
pub type Result<T> = std::result::Result<T, WraptError>;
