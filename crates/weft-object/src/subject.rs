//! Handles for classes, objects, and the subjects that own join points

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a class or module (index into the class registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Registry index of this class
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class#{}", self.0)
    }
}

/// Handle of an object instance (index into the object arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u32);

impl ObjectId {
    /// Arena index of this object
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// A type or an object that can own join points
///
/// Objects compare by identity; types compare by handle, and a handle is
/// unique per qualified name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    /// A class or module
    Class(ClassId),
    /// A single object
    Object(ObjectId),
}

impl Subject {
    /// Whether this subject is a type
    pub fn is_class(&self) -> bool {
        matches!(self, Subject::Class(_))
    }

    /// The class handle, if this subject is a type
    pub fn as_class(&self) -> Option<ClassId> {
        match self {
            Subject::Class(id) => Some(*id),
            Subject::Object(_) => None,
        }
    }

    /// The object handle, if this subject is an object
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Subject::Object(id) => Some(*id),
            Subject::Class(_) => None,
        }
    }
}

impl From<ClassId> for Subject {
    fn from(id: ClassId) -> Self {
        Subject::Class(id)
    }
}

impl From<ObjectId> for Subject {
    fn from(id: ObjectId) -> Self {
        Subject::Object(id)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Class(id) => id.fmt(f),
            Subject::Object(id) => id.fmt(f),
        }
    }
}

/// Which method table of a class a call goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MethodScope {
    /// Methods called on instances (and per-object singleton methods)
    Instance,
    /// Methods called on the class itself
    Class,
}

/// Key of one interceptable method slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodKey {
    /// Type or object owning the slot
    pub subject: Subject,
    /// Method name
    pub name: String,
    /// Instance or class side
    pub scope: MethodScope,
}

impl MethodKey {
    /// Create a key
    pub fn new(subject: Subject, name: impl Into<String>, scope: MethodScope) -> Self {
        Self {
            subject,
            name: name.into(),
            scope,
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = match self.scope {
            MethodScope::Instance => "#",
            MethodScope::Class => ".",
        };
        write!(f, "{}{}{}", self.subject, sep, self.name)
    }
}
