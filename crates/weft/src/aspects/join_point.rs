//! Join points: a method on a type or object

use serde::{Deserialize, Serialize};
use std::fmt;
use weft_object::{ClassId, MethodKey, MethodScope, Reflect, Subject};

/// A method slot that advice can be attached to
///
/// Ordered by target, then name, then scope, so sets of join points iterate
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JoinPoint {
    target: Subject,
    method_name: String,
    instance_method: bool,
}

impl JoinPoint {
    /// Instance method `name` of a type, or method `name` of an object
    pub fn new(target: impl Into<Subject>, method_name: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            method_name: method_name.into(),
            instance_method: true,
        }
    }

    /// Class method `name` of a type
    pub fn class_method(target: ClassId, method_name: impl Into<String>) -> Self {
        Self {
            target: Subject::Class(target),
            method_name: method_name.into(),
            instance_method: false,
        }
    }

    /// Type or object owning the method
    pub fn target(&self) -> Subject {
        self.target
    }

    /// Method name
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Whether this is an instance-side method
    pub fn is_instance_method(&self) -> bool {
        self.instance_method
    }

    /// Whether this is a class method
    pub fn is_class_method(&self) -> bool {
        !self.instance_method
    }

    /// Method table scope
    pub fn scope(&self) -> MethodScope {
        if self.instance_method {
            MethodScope::Instance
        } else {
            MethodScope::Class
        }
    }

    /// Interception table key for this join point
    pub fn key(&self) -> MethodKey {
        MethodKey::new(self.target, self.method_name.clone(), self.scope())
    }

    /// Whether the method currently exists
    pub fn exists(&self, reflect: &dyn Reflect) -> bool {
        !self.method_name.is_empty() && reflect.has_method(self.target, &self.method_name, self.scope())
    }

    /// Render with type paths resolved, e.g. `Shop::Cart#total`
    pub fn describe(&self, reflect: &dyn Reflect) -> String {
        format!("{}{}{}", reflect.describe(self.target), self.separator(), self.method_name)
    }

    fn separator(&self) -> &'static str {
        if self.instance_method {
            "#"
        } else {
            "."
        }
    }
}

impl fmt::Display for JoinPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.target, self.separator(), self.method_name)
    }
}
