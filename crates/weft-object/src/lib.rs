//! Weft Object Model
//!
//! The live object model that weft selects join points from and weaves
//! advice into:
//! - Classes and modules arranged in a namespace tree
//! - Objects with fields and per-object (singleton) methods
//! - Instance, class and singleton methods with visibility
//! - Method dispatch along the ancestor chain
//! - An interception table consulted on every dispatch step
//! - The `Reflect` capability interface used by the finders

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod bootstrap;
pub mod class;
pub mod intercept;
pub mod raised;
pub mod reflect;
pub mod registry;
pub mod runtime;
pub mod subject;
pub mod value;

pub use class::{native, Class, ClassKind, Instance, MethodDef, NamedSlot, NamedValue, NativeMethod, Visibility};
pub use intercept::{Interception, InterceptionTable, Invocation, WeaveGuard};
pub use raised::{CallResult, Raised};
pub use reflect::{MethodView, Reflect, ViewScope};
pub use registry::ClassRegistry;
pub use runtime::{CallContext, Runtime};
pub use subject::{ClassId, MethodKey, MethodScope, ObjectId, Subject};
pub use value::Value;

/// Errors raised while defining or looking up parts of the object model
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ObjectError {
    /// No class or module is registered under this name or handle
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// An enclosing namespace of a qualified path does not exist
    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    /// The name is not a valid constant name
    #[error("Invalid constant name: {0:?}")]
    InvalidName(String),

    /// A class was reopened with a different superclass
    #[error("Superclass mismatch for class {0}")]
    SuperclassMismatch(String),

    /// A path names a class where a module was expected, or vice versa
    #[error("{path} is not a {expected}")]
    KindMismatch {
        /// Qualified path of the existing definition
        path: String,
        /// Kind that was requested
        expected: &'static str,
    },

    /// No object is registered under this handle
    #[error("Unknown object: {0}")]
    UnknownObject(ObjectId),

    /// A write-once named slot was written twice
    #[error("Already defined: {0}")]
    AlreadyDefined(String),
}

/// Object model result
pub type ObjectResult<T> = Result<T, ObjectError>;
