//! Reflection capability interface
//!
//! Everything the pointcut finders need to know about the live object model,
//! behind one trait so finders can be tested against any host.

use crate::class::{NamedSlot, NamedValue, Visibility};
use crate::runtime::Runtime;
use crate::subject::{ClassId, MethodScope, ObjectId, Subject};
use rustc_hash::FxHashMap;

/// Which method table a method listing reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewScope {
    /// Methods callable on instances (types) or on the object itself (objects)
    Instance,
    /// Methods callable on the type, inherited along the superclass chain
    Class,
    /// Methods defined directly on the type's class side, or on the object
    Singleton,
}

/// One reflection view: a visibility and a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodView {
    /// Visibility to list
    pub visibility: Visibility,
    /// Table to list
    pub scope: ViewScope,
}

impl MethodView {
    /// Create a view
    pub fn new(visibility: Visibility, scope: ViewScope) -> Self {
        Self { visibility, scope }
    }
}

/// Read-only reflection over a live object model
pub trait Reflect: Send + Sync {
    /// Fully qualified path of a type
    fn class_path(&self, class: ClassId) -> Option<String>;

    /// Types nested in a namespace (None for top level), ordered by name
    fn namespace_members(&self, namespace: Option<ClassId>) -> Vec<(String, ClassId)>;

    /// Resolve a path given as segments, walking from the top level
    fn resolve_path(&self, segments: &[&str]) -> Option<ClassId>;

    /// Class of an object
    fn class_of(&self, object: ObjectId) -> Option<ClassId>;

    /// Type followed by its mixins and superclasses
    fn ancestors(&self, class: ClassId) -> Vec<ClassId>;

    /// Every type that has `class` among its ancestors
    fn descendants(&self, class: ClassId) -> Vec<ClassId>;

    /// Method names visible through one view, sorted
    fn method_names(&self, subject: Subject, view: MethodView) -> Vec<String>;

    /// Whether a method with this name is callable in this scope
    fn has_method(&self, subject: Subject, name: &str, scope: MethodScope) -> bool;

    /// Named slot values of a type; class variables include inherited ones
    fn named_values(&self, class: ClassId, slot: NamedSlot) -> Vec<(String, NamedValue)>;

    /// Human readable form of a subject
    fn describe(&self, subject: Subject) -> String;
}

impl Reflect for Runtime {
    fn class_path(&self, class: ClassId) -> Option<String> {
        Runtime::class_path(self, class)
    }

    fn namespace_members(&self, namespace: Option<ClassId>) -> Vec<(String, ClassId)> {
        self.registry().members(namespace)
    }

    fn resolve_path(&self, segments: &[&str]) -> Option<ClassId> {
        let registry = self.registry();
        let mut current = None;
        for segment in segments {
            current = Some(registry.member(current, segment)?);
        }
        current
    }

    fn class_of(&self, object: ObjectId) -> Option<ClassId> {
        Runtime::class_of(self, object)
    }

    fn ancestors(&self, class: ClassId) -> Vec<ClassId> {
        Runtime::ancestors(self, class)
    }

    fn descendants(&self, class: ClassId) -> Vec<ClassId> {
        self.registry().descendants(class)
    }

    fn method_names(&self, subject: Subject, view: MethodView) -> Vec<String> {
        // First definition along the chain decides visibility
        let mut seen: FxHashMap<String, Visibility> = FxHashMap::default();
        let mut record = |name: &String, visibility: Visibility| {
            seen.entry(name.clone()).or_insert(visibility);
        };

        match (subject, view.scope) {
            (Subject::Class(class), ViewScope::Instance) => {
                let chain = Runtime::ancestors(self, class);
                let registry = self.registry();
                for id in chain {
                    if let Some(c) = registry.get(id) {
                        c.instance_methods.iter().for_each(|(n, d)| record(n, d.visibility));
                    }
                }
            }
            (Subject::Class(class), ViewScope::Class) => {
                let chain = self.class_side_chain(class);
                let registry = self.registry();
                for id in chain {
                    if let Some(c) = registry.get(id) {
                        c.class_methods.iter().for_each(|(n, d)| record(n, d.visibility));
                    }
                }
            }
            (Subject::Class(class), ViewScope::Singleton) => {
                if let Some(c) = self.registry().get(class) {
                    c.class_methods.iter().for_each(|(n, d)| record(n, d.visibility));
                }
            }
            (Subject::Object(object), ViewScope::Instance) => {
                let Some(class) = Runtime::class_of(self, object) else {
                    return Vec::new();
                };
                if let Some(singletons) = self.singleton_methods(object) {
                    singletons.into_iter().for_each(|(n, v)| record(&n, v));
                }
                let chain = Runtime::ancestors(self, class);
                let registry = self.registry();
                for id in chain {
                    if let Some(c) = registry.get(id) {
                        c.instance_methods.iter().for_each(|(n, d)| record(n, d.visibility));
                    }
                }
            }
            (Subject::Object(object), ViewScope::Singleton) => {
                if let Some(singletons) = self.singleton_methods(object) {
                    singletons.into_iter().for_each(|(n, v)| record(&n, v));
                }
            }
            (Subject::Object(_), ViewScope::Class) => {}
        }

        let mut names: Vec<String> = seen
            .into_iter()
            .filter(|(_, visibility)| *visibility == view.visibility)
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }

    fn has_method(&self, subject: Subject, name: &str, scope: MethodScope) -> bool {
        match (subject, scope) {
            (Subject::Class(class), MethodScope::Instance) => {
                let chain = Runtime::ancestors(self, class);
                let registry = self.registry();
                chain
                    .iter()
                    .filter_map(|id| registry.get(*id))
                    .any(|c| c.instance_methods.contains_key(name))
            }
            (Subject::Class(class), MethodScope::Class) => {
                let chain = self.class_side_chain(class);
                let registry = self.registry();
                chain
                    .iter()
                    .filter_map(|id| registry.get(*id))
                    .any(|c| c.class_methods.contains_key(name))
            }
            (Subject::Object(object), MethodScope::Instance) => {
                self.responds_to(&crate::Value::Object(object), name)
            }
            (Subject::Object(_), MethodScope::Class) => false,
        }
    }

    fn named_values(&self, class: ClassId, slot: NamedSlot) -> Vec<(String, NamedValue)> {
        let registry = self.registry();
        match slot {
            NamedSlot::Constant => registry
                .get(class)
                .map(|c| {
                    c.constants
                        .iter()
                        .map(|(n, v)| (n.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            NamedSlot::ClassVariable => {
                let mut values: Vec<(String, NamedValue)> = Vec::new();
                for id in registry.ancestors(class) {
                    if let Some(c) = registry.get(id) {
                        for (name, value) in &c.class_variables {
                            if !values.iter().any(|(n, _)| n == name) {
                                values.push((name.clone(), value.clone()));
                            }
                        }
                    }
                }
                values
            }
        }
    }

    fn describe(&self, subject: Subject) -> String {
        Runtime::describe(self, subject)
    }
}
