//! Class registry: arena of class and module definitions plus the namespace tree

use crate::class::{Class, ClassKind};
use crate::subject::ClassId;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

/// Class registry for the runtime
#[derive(Debug)]
pub struct ClassRegistry {
    /// Classes indexed by ID
    classes: Vec<Class>,
    /// Qualified path to ID mapping
    path_to_id: FxHashMap<String, ClassId>,
    /// Top-level namespace members
    toplevel: BTreeMap<String, ClassId>,
}

impl ClassRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            classes: Vec::new(),
            path_to_id: FxHashMap::default(),
            toplevel: BTreeMap::new(),
        }
    }

    /// Register a new class or module under `namespace` (None for top level)
    ///
    /// The caller checks that the name is free; registering a taken path
    /// shadows the previous entry in the namespace.
    pub fn register(&mut self, name: &str, namespace: Option<ClassId>, kind: ClassKind) -> ClassId {
        let id = self.next_class_id();
        let path = match namespace.and_then(|ns| self.get(ns)) {
            Some(parent) => format!("{}::{}", parent.path, name),
            None => name.to_string(),
        };

        let mut class = Class::new(id, name, path.clone(), kind);
        class.namespace = namespace;
        self.classes.push(class);
        self.path_to_id.insert(path, id);

        match namespace.and_then(|ns| self.get_mut(ns)) {
            Some(parent) => {
                parent.nested.insert(name.to_string(), id);
            }
            None => {
                self.toplevel.insert(name.to_string(), id);
            }
        }

        id
    }

    /// Get class by ID
    pub fn get(&self, id: ClassId) -> Option<&Class> {
        self.classes.get(id.index())
    }

    /// Get mutable class by ID
    pub fn get_mut(&mut self, id: ClassId) -> Option<&mut Class> {
        self.classes.get_mut(id.index())
    }

    /// Get class by fully qualified path
    pub fn get_by_path(&self, path: &str) -> Option<&Class> {
        self.path_to_id.get(path).and_then(|id| self.get(*id))
    }

    /// Get next available class ID
    pub fn next_class_id(&self) -> ClassId {
        ClassId(self.classes.len() as u32)
    }

    /// Number of registered classes and modules
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Iterate over all classes
    pub fn iter(&self) -> impl Iterator<Item = &Class> {
        self.classes.iter()
    }

    /// Members of a namespace (None for top level), ordered by name
    pub fn members(&self, namespace: Option<ClassId>) -> Vec<(String, ClassId)> {
        let table = match namespace {
            Some(ns) => match self.get(ns) {
                Some(class) => &class.nested,
                None => return Vec::new(),
            },
            None => &self.toplevel,
        };
        table.iter().map(|(name, id)| (name.clone(), *id)).collect()
    }

    /// Resolve a member of a namespace by unqualified name
    pub fn member(&self, namespace: Option<ClassId>, name: &str) -> Option<ClassId> {
        match namespace {
            Some(ns) => self.get(ns).and_then(|c| c.nested.get(name).copied()),
            None => self.toplevel.get(name).copied(),
        }
    }

    /// Method resolution order of a class or module, starting with itself
    ///
    /// Included modules come after the including class, the most recently
    /// included first, then the superclass chain. Each entry appears once.
    pub fn ancestors(&self, id: ClassId) -> Vec<ClassId> {
        let mut order = Vec::new();
        let mut seen = FxHashSet::default();
        self.collect_ancestors(id, &mut order, &mut seen);
        order
    }

    fn collect_ancestors(&self, id: ClassId, order: &mut Vec<ClassId>, seen: &mut FxHashSet<ClassId>) {
        let Some(class) = self.get(id) else {
            return;
        };
        if seen.insert(id) {
            order.push(id);
        }
        for mixin in class.mixins.iter().rev() {
            self.collect_ancestors(*mixin, order, seen);
        }
        if let Some(superclass) = class.superclass {
            self.collect_ancestors(superclass, order, seen);
        }
    }

    /// The class followed by its superclasses, modules excluded
    pub fn superclass_chain(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            if chain.contains(&cid) {
                break;
            }
            chain.push(cid);
            current = self.get(cid).and_then(|c| c.superclass);
        }
        chain
    }

    /// Every class or module that has `id` among its ancestors, excluding `id`
    pub fn descendants(&self, id: ClassId) -> Vec<ClassId> {
        self.classes
            .iter()
            .filter(|c| c.id != id && self.ancestors(c.id).contains(&id))
            .map(|c| c.id)
            .collect()
    }
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}
