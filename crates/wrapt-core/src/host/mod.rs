//! Minimal host object model: functions, methods, classes and instances.
//!
//! Proxies and wrappers only ever talk to the [`Object`](crate::object::Object)
//! protocol; these types are the host they are exercised against.

pub mod class;
pub mod finalize;
pub mod function;
pub mod method;
pub mod weakref;

pub use class::{Class, Instance};
pub use finalize::{FinalizeCallback, FinalizerToken, Finalizers};
pub use function::{Function, NativeFn};
pub use method::{BoundMethod, ClassMethod, StaticMethod};
pub use weakref::WeakRef;
