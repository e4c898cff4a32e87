//! Classes, modules, objects and their method tables

use crate::raised::CallResult;
use crate::runtime::CallContext;
use crate::subject::{ClassId, MethodScope, ObjectId};
use crate::value::Value;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Host-provided method body
pub type NativeMethod = Arc<dyn Fn(&CallContext<'_>, &[Value]) -> CallResult + Send + Sync>;

/// Box a closure as a method body
pub fn native<F>(body: F) -> NativeMethod
where
    F: Fn(&CallContext<'_>, &[Value]) -> CallResult + Send + Sync + 'static,
{
    Arc::new(body)
}

/// Value stored in a constant or class variable slot
pub type NamedValue = Arc<dyn Any + Send + Sync>;

/// Method visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Visibility {
    /// Callable from anywhere
    Public,
    /// Callable from the receiver's own methods and its relatives
    Protected,
    /// Callable only with an implicit receiver
    Private,
}

impl Visibility {
    /// Lowercase name, as used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method entry in a class, module or singleton table
#[derive(Clone)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Visibility
    pub visibility: Visibility,
    /// Body
    pub body: NativeMethod,
}

impl MethodDef {
    /// Create a method entry
    pub fn new(name: impl Into<String>, visibility: Visibility, body: NativeMethod) -> Self {
        Self {
            name: name.into(),
            visibility,
            body,
        }
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .finish_non_exhaustive()
    }
}

/// Whether a definition is a class or a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassKind {
    /// Instantiable, single inheritance
    Class,
    /// Mixin, not instantiable
    Module,
}

impl ClassKind {
    /// Lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Module => "module",
        }
    }
}

/// Kind of write-once named slot on a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NamedSlot {
    /// Class-level constant (not inherited)
    Constant,
    /// Class variable (visible from subclasses)
    ClassVariable,
}

/// Class or module definition
#[derive(Debug, Clone)]
pub struct Class {
    /// Handle (index into the class registry)
    pub id: ClassId,
    /// Unqualified name
    pub name: String,
    /// Fully qualified path, e.g. `Outer::Inner`
    pub path: String,
    /// Class or module
    pub kind: ClassKind,
    /// Superclass (None for modules and the root class)
    pub superclass: Option<ClassId>,
    /// Included modules, in inclusion order
    pub mixins: Vec<ClassId>,
    /// Enclosing namespace (None at top level)
    pub namespace: Option<ClassId>,
    /// Nested classes and modules by unqualified name
    pub nested: BTreeMap<String, ClassId>,
    /// Methods called on instances
    pub instance_methods: FxHashMap<String, MethodDef>,
    /// Methods called on the class itself
    pub class_methods: FxHashMap<String, MethodDef>,
    /// Constants holding arbitrary host values
    pub constants: BTreeMap<String, NamedValue>,
    /// Class variables holding arbitrary host values
    pub class_variables: BTreeMap<String, NamedValue>,
}

impl Class {
    /// Create an empty class or module
    pub fn new(id: ClassId, name: impl Into<String>, path: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            id,
            name: name.into(),
            path: path.into(),
            kind,
            superclass: None,
            mixins: Vec::new(),
            namespace: None,
            nested: BTreeMap::new(),
            instance_methods: FxHashMap::default(),
            class_methods: FxHashMap::default(),
            constants: BTreeMap::new(),
            class_variables: BTreeMap::new(),
        }
    }

    /// Whether this definition is a module
    pub fn is_module(&self) -> bool {
        self.kind == ClassKind::Module
    }

    /// Method table for a scope
    pub fn methods(&self, scope: MethodScope) -> &FxHashMap<String, MethodDef> {
        match scope {
            MethodScope::Instance => &self.instance_methods,
            MethodScope::Class => &self.class_methods,
        }
    }

    /// Mutable method table for a scope
    pub fn methods_mut(&mut self, scope: MethodScope) -> &mut FxHashMap<String, MethodDef> {
        match scope {
            MethodScope::Instance => &mut self.instance_methods,
            MethodScope::Class => &mut self.class_methods,
        }
    }

    /// Own method lookup, no ancestors
    pub fn method(&self, scope: MethodScope, name: &str) -> Option<&MethodDef> {
        self.methods(scope).get(name)
    }

    /// Named slot table
    pub fn named(&self, slot: NamedSlot) -> &BTreeMap<String, NamedValue> {
        match slot {
            NamedSlot::Constant => &self.constants,
            NamedSlot::ClassVariable => &self.class_variables,
        }
    }

    /// Mutable named slot table
    pub fn named_mut(&mut self, slot: NamedSlot) -> &mut BTreeMap<String, NamedValue> {
        match slot {
            NamedSlot::Constant => &mut self.constants,
            NamedSlot::ClassVariable => &mut self.class_variables,
        }
    }
}

/// Object instance
#[derive(Debug, Clone)]
pub struct Instance {
    /// Handle
    pub id: ObjectId,
    /// Class of the object
    pub class: ClassId,
    /// Field values by name
    pub fields: FxHashMap<String, Value>,
    /// Methods defined on this object alone
    pub singleton_methods: FxHashMap<String, MethodDef>,
}

impl Instance {
    /// Create an object with no fields
    pub fn new(id: ObjectId, class: ClassId) -> Self {
        Self {
            id,
            class,
            fields: FxHashMap::default(),
            singleton_methods: FxHashMap::default(),
        }
    }

    /// Read a field (null when unset)
    pub fn field(&self, name: &str) -> Value {
        self.fields.get(name).cloned().unwrap_or_default()
    }
}
