//! Error types for pointcut resolution and weaving

use crate::config::ConfigError;
use thiserror::Error;
use weft_object::ObjectError;

/// Weaving errors
#[derive(Debug, Error)]
pub enum WeftError {
    /// Unrecognized option key or value, or mutually exclusive options
    #[error("Invalid specification: {0}")]
    InvalidSpecification(String),

    /// An aspect's pointcuts matched no join point
    #[error("No join points were matched by {specification}")]
    NoMatchingJoinPoints {
        /// Rendering of the options that matched nothing
        specification: String,
    },

    /// Host object model error
    #[error("Object model error: {0}")]
    Object(#[from] ObjectError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WeftError {
    /// Shorthand for `InvalidSpecification`
    pub fn invalid(message: impl Into<String>) -> Self {
        WeftError::InvalidSpecification(message.into())
    }

    /// Whether this error reports an invalid specification
    pub fn is_invalid_specification(&self) -> bool {
        matches!(self, WeftError::InvalidSpecification(_))
    }
}

/// Weaving result
pub type Result<T> = std::result::Result<T, WeftError>;
