//! Exceptions raised by method bodies and advice

use crate::value::Value;
use crate::ObjectError;

/// Result of invoking a method
pub type CallResult = Result<Value, Raised>;

/// An exception propagating out of a method call
///
/// `kind` names the exception type; `lineage` lists the more general kinds it
/// is also an instance of, nearest first.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Raised {
    /// Exception kind, e.g. `ArgumentError`
    pub kind: String,
    /// Human readable message
    pub message: String,
    /// More general kinds this exception also belongs to
    pub lineage: Vec<String>,
}

impl Raised {
    /// Create an exception of the given kind
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            lineage: vec!["StandardError".to_string()],
        }
    }

    /// Declare a more general kind this exception belongs to
    pub fn extends(mut self, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        if !self.lineage.contains(&kind) {
            self.lineage.insert(0, kind);
        }
        self
    }

    /// Whether this exception is of `kind` or of a kind in its lineage
    pub fn is_a(&self, kind: &str) -> bool {
        self.kind == kind || self.lineage.iter().any(|k| k == kind)
    }

    /// No method with this name is callable on the receiver
    pub fn no_method(name: &str, receiver: &str) -> Self {
        Raised::new(
            "NoMethodError",
            format!("undefined method `{}' for {}", name, receiver),
        )
    }

    /// A method exists but its visibility forbids this call
    pub fn not_visible(name: &str, visibility: &str, receiver: &str) -> Self {
        Raised::new(
            "NoMethodError",
            format!("{} method `{}' called for {}", visibility, name, receiver),
        )
    }

    /// Wrong number or shape of arguments
    pub fn argument_error(message: impl Into<String>) -> Self {
        Raised::new("ArgumentError", message)
    }
}

impl From<ObjectError> for Raised {
    fn from(err: ObjectError) -> Self {
        Raised::new("RuntimeError", err.to_string())
    }
}
