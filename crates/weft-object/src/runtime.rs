//! Runtime: class and object arenas, definition API and method dispatch

use crate::bootstrap;
use crate::class::{ClassKind, Instance, MethodDef, NamedSlot, Visibility};
use crate::intercept::{InterceptionTable, Invocation};
use crate::raised::{CallResult, Raised};
use crate::registry::ClassRegistry;
use crate::subject::{ClassId, MethodKey, MethodScope, ObjectId, Subject};
use crate::value::Value;
use crate::{ObjectError, ObjectResult};
use parking_lot::{RwLock, RwLockReadGuard};
use std::any::Any;
use std::sync::Arc;

/// One step of a dispatch chain
#[derive(Debug, Clone, Copy)]
enum Link {
    /// Per-object method table
    Singleton(ObjectId),
    /// Instance method table of a class or module
    Instance(ClassId),
    /// Class method table of a class or module
    ClassSide(ClassId),
}

impl Link {
    fn key(self, name: &str) -> MethodKey {
        match self {
            Link::Singleton(o) => MethodKey::new(Subject::Object(o), name, MethodScope::Instance),
            Link::Instance(c) => MethodKey::new(Subject::Class(c), name, MethodScope::Instance),
            Link::ClassSide(c) => MethodKey::new(Subject::Class(c), name, MethodScope::Class),
        }
    }
}

/// Live object model
///
/// Definitions and objects are kept in arenas addressed by `ClassId` and
/// `ObjectId`. Locks are never held while a method body or interception
/// runs, so bodies may freely call back into the runtime.
pub struct Runtime {
    classes: RwLock<ClassRegistry>,
    objects: RwLock<Vec<Instance>>,
    interceptions: InterceptionTable,
    object_class: ClassId,
}

impl Runtime {
    /// Create a runtime holding only the root `Object` class
    pub fn new() -> Self {
        let mut registry = ClassRegistry::new();
        let object_class = bootstrap::install_object_class(&mut registry);
        Self {
            classes: RwLock::new(registry),
            objects: RwLock::new(Vec::new()),
            interceptions: InterceptionTable::new(),
            object_class,
        }
    }

    /// Root class every class inherits from
    pub fn object_class(&self) -> ClassId {
        self.object_class
    }

    /// Interception table consulted by dispatch
    pub fn interceptions(&self) -> &InterceptionTable {
        &self.interceptions
    }

    pub(crate) fn registry(&self) -> RwLockReadGuard<'_, ClassRegistry> {
        self.classes.read()
    }

    // ===== Definitions =====

    /// Define (or reopen) a class at a `::`-qualified path
    ///
    /// Enclosing namespaces must exist. `superclass` defaults to `Object`.
    /// Reopening with a different superclass is an error.
    pub fn define_class(&self, path: &str, superclass: Option<ClassId>) -> ObjectResult<ClassId> {
        self.define(path, ClassKind::Class, superclass)
    }

    /// Define (or reopen) a module at a `::`-qualified path
    pub fn define_module(&self, path: &str) -> ObjectResult<ClassId> {
        self.define(path, ClassKind::Module, None)
    }

    fn define(&self, path: &str, kind: ClassKind, superclass: Option<ClassId>) -> ObjectResult<ClassId> {
        let segments: Vec<&str> = path.split("::").collect();
        if !segments.iter().all(|s| is_constant_name(s)) {
            return Err(ObjectError::InvalidName(path.to_string()));
        }
        let Some((name, parents)) = segments.split_last() else {
            return Err(ObjectError::InvalidName(path.to_string()));
        };

        let mut registry = self.classes.write();

        let mut namespace = None;
        for (i, segment) in parents.iter().enumerate() {
            let found = registry
                .member(namespace, segment)
                .ok_or_else(|| ObjectError::UnknownNamespace(segments[..=i].join("::")))?;
            namespace = Some(found);
        }

        if let Some(existing) = registry.member(namespace, name) {
            let class = registry
                .get(existing)
                .ok_or_else(|| ObjectError::UnknownClass(existing.to_string()))?;
            if class.kind != kind {
                return Err(ObjectError::KindMismatch {
                    path: class.path.clone(),
                    expected: kind.as_str(),
                });
            }
            if superclass.is_some() && class.superclass != superclass {
                return Err(ObjectError::SuperclassMismatch(class.path.clone()));
            }
            return Ok(existing);
        }

        let superclass = match kind {
            ClassKind::Module => None,
            ClassKind::Class => {
                let sc = superclass.unwrap_or(self.object_class);
                let parent = registry
                    .get(sc)
                    .ok_or_else(|| ObjectError::UnknownClass(sc.to_string()))?;
                if parent.is_module() {
                    return Err(ObjectError::KindMismatch {
                        path: parent.path.clone(),
                        expected: ClassKind::Class.as_str(),
                    });
                }
                Some(sc)
            }
        };

        let id = registry.register(name, namespace, kind);
        if let Some(class) = registry.get_mut(id) {
            class.superclass = superclass;
        }
        Ok(id)
    }

    /// Mix a module into a class or module
    pub fn include_module(&self, target: ClassId, module: ClassId) -> ObjectResult<()> {
        let mut registry = self.classes.write();
        let mixin = registry
            .get(module)
            .ok_or_else(|| ObjectError::UnknownClass(module.to_string()))?;
        if !mixin.is_module() {
            return Err(ObjectError::KindMismatch {
                path: mixin.path.clone(),
                expected: ClassKind::Module.as_str(),
            });
        }
        let class = registry
            .get_mut(target)
            .ok_or_else(|| ObjectError::UnknownClass(target.to_string()))?;
        if !class.mixins.contains(&module) {
            class.mixins.push(module);
        }
        Ok(())
    }

    /// Define an instance method
    pub fn define_method<F>(&self, class: ClassId, name: &str, visibility: Visibility, body: F) -> ObjectResult<()>
    where
        F: Fn(&CallContext<'_>, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.insert_method(class, MethodScope::Instance, MethodDef::new(name, visibility, Arc::new(body)))
    }

    /// Define a class method
    pub fn define_class_method<F>(&self, class: ClassId, name: &str, visibility: Visibility, body: F) -> ObjectResult<()>
    where
        F: Fn(&CallContext<'_>, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        self.insert_method(class, MethodScope::Class, MethodDef::new(name, visibility, Arc::new(body)))
    }

    fn insert_method(&self, class: ClassId, scope: MethodScope, def: MethodDef) -> ObjectResult<()> {
        let mut registry = self.classes.write();
        let target = registry
            .get_mut(class)
            .ok_or_else(|| ObjectError::UnknownClass(class.to_string()))?;
        target.methods_mut(scope).insert(def.name.clone(), def);
        Ok(())
    }

    /// Define a method on a single object
    pub fn define_singleton_method<F>(
        &self,
        object: ObjectId,
        name: &str,
        visibility: Visibility,
        body: F,
    ) -> ObjectResult<()>
    where
        F: Fn(&CallContext<'_>, &[Value]) -> CallResult + Send + Sync + 'static,
    {
        let mut objects = self.objects.write();
        let target = objects
            .get_mut(object.index())
            .ok_or(ObjectError::UnknownObject(object))?;
        target
            .singleton_methods
            .insert(name.to_string(), MethodDef::new(name, visibility, Arc::new(body)));
        Ok(())
    }

    /// Define a field-backed reader `name` and/or writer `name=`
    pub fn define_attribute(&self, class: ClassId, name: &str, reader: bool, writer: bool) -> ObjectResult<()> {
        if reader {
            let field = name.to_string();
            self.define_method(class, name, Visibility::Public, move |ctx, _| ctx.field(&field))?;
        }
        if writer {
            let field = name.to_string();
            self.define_method(class, &format!("{}=", name), Visibility::Public, move |ctx, args| {
                let value = args.first().cloned().unwrap_or_default();
                ctx.set_field(&field, value.clone())?;
                Ok(value)
            })?;
        }
        Ok(())
    }

    /// Store a write-once constant on a class
    pub fn define_constant<V: Any + Send + Sync>(&self, class: ClassId, name: &str, value: V) -> ObjectResult<()> {
        if !is_constant_name(name) {
            return Err(ObjectError::InvalidName(name.to_string()));
        }
        self.define_named(class, NamedSlot::Constant, name, Arc::new(value))
    }

    /// Store a write-once class variable on a class
    ///
    /// A leading `@@` on the name is dropped.
    pub fn define_class_variable<V: Any + Send + Sync>(&self, class: ClassId, name: &str, value: V) -> ObjectResult<()> {
        let name = name.trim_start_matches("@@");
        if name.is_empty() {
            return Err(ObjectError::InvalidName(name.to_string()));
        }
        self.define_named(class, NamedSlot::ClassVariable, name, Arc::new(value))
    }

    fn define_named(&self, class: ClassId, slot: NamedSlot, name: &str, value: Arc<dyn Any + Send + Sync>) -> ObjectResult<()> {
        let mut registry = self.classes.write();
        let target = registry
            .get_mut(class)
            .ok_or_else(|| ObjectError::UnknownClass(class.to_string()))?;
        if target.named(slot).contains_key(name) {
            return Err(ObjectError::AlreadyDefined(format!("{}::{}", target.path, name)));
        }
        target.named_mut(slot).insert(name.to_string(), value);
        Ok(())
    }

    /// Allocate an object of a class without running `initialize`
    pub fn instantiate(&self, class: ClassId) -> ObjectResult<ObjectId> {
        {
            let registry = self.classes.read();
            let def = registry
                .get(class)
                .ok_or_else(|| ObjectError::UnknownClass(class.to_string()))?;
            if def.is_module() {
                return Err(ObjectError::KindMismatch {
                    path: def.path.clone(),
                    expected: ClassKind::Class.as_str(),
                });
            }
        }
        let mut objects = self.objects.write();
        let id = ObjectId(objects.len() as u32);
        objects.push(Instance::new(id, class));
        Ok(id)
    }

    /// Allocate an object and run its `initialize` method, if any
    pub fn new_object(&self, class: ClassId, args: &[Value]) -> CallResult {
        let object = self.instantiate(class)?;
        let receiver = Value::Object(object);
        if self.responds_to(&receiver, "initialize") {
            self.send(&receiver, "initialize", args)?;
        }
        Ok(receiver)
    }

    // ===== Lookup =====

    /// Class of an object
    pub fn class_of(&self, object: ObjectId) -> Option<ClassId> {
        self.objects.read().get(object.index()).map(|o| o.class)
    }

    /// Resolve a class or module by its fully qualified path
    pub fn lookup_class(&self, path: &str) -> Option<ClassId> {
        self.classes.read().get_by_path(path).map(|c| c.id)
    }

    /// Fully qualified path of a class or module
    pub fn class_path(&self, class: ClassId) -> Option<String> {
        self.classes.read().get(class).map(|c| c.path.clone())
    }

    /// Ancestors of a class or module, starting with itself
    pub fn ancestors(&self, class: ClassId) -> Vec<ClassId> {
        self.classes.read().ancestors(class)
    }

    /// Read an object field (null when unset)
    pub fn field(&self, object: ObjectId, name: &str) -> ObjectResult<Value> {
        self.objects
            .read()
            .get(object.index())
            .map(|o| o.field(name))
            .ok_or(ObjectError::UnknownObject(object))
    }

    /// Write an object field
    pub fn set_field(&self, object: ObjectId, name: &str, value: Value) -> ObjectResult<()> {
        let mut objects = self.objects.write();
        let target = objects
            .get_mut(object.index())
            .ok_or(ObjectError::UnknownObject(object))?;
        target.fields.insert(name.to_string(), value);
        Ok(())
    }

    pub(crate) fn singleton_methods(&self, object: ObjectId) -> Option<Vec<(String, Visibility)>> {
        self.objects.read().get(object.index()).map(|o| {
            o.singleton_methods
                .values()
                .map(|d| (d.name.clone(), d.visibility))
                .collect()
        })
    }

    /// Number of allocated objects
    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    /// Human readable form of a subject, e.g. `Outer::Inner` or `#<Point:object#3>`
    pub fn describe(&self, subject: Subject) -> String {
        match subject {
            Subject::Class(id) => self.class_path(id).unwrap_or_else(|| id.to_string()),
            Subject::Object(id) => {
                let class = self
                    .class_of(id)
                    .and_then(|c| self.class_path(c))
                    .unwrap_or_else(|| "?".to_string());
                format!("#<{}:{}>", class, id)
            }
        }
    }

    fn describe_value(&self, value: &Value) -> String {
        match value.subject() {
            Some(subject) => self.describe(subject),
            None => format!("{} ({})", value, value.type_name()),
        }
    }

    // ===== Dispatch =====

    /// Call a public method
    pub fn call(&self, receiver: &Value, name: &str, args: &[Value]) -> CallResult {
        let links = self.links(receiver, name)?;
        if let Some(def) = links.iter().find_map(|link| self.own_method(*link, name)) {
            if def.visibility != Visibility::Public {
                return Err(Raised::not_visible(
                    name,
                    def.visibility.as_str(),
                    &self.describe_value(receiver),
                ));
            }
        }
        self.dispatch(receiver, name, args, &links, 0, &[])
    }

    /// Call a method regardless of visibility
    pub fn send(&self, receiver: &Value, name: &str, args: &[Value]) -> CallResult {
        let links = self.links(receiver, name)?;
        self.dispatch(receiver, name, args, &links, 0, &[])
    }

    /// Whether any link of the receiver's dispatch chain defines `name`
    pub fn responds_to(&self, receiver: &Value, name: &str) -> bool {
        match self.links(receiver, name) {
            Ok(links) => links.iter().any(|link| self.own_method(*link, name).is_some()),
            Err(_) => false,
        }
    }

    /// Continue dispatch past the interception at `position`
    pub(crate) fn resume(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        position: usize,
        applied: &[u64],
    ) -> CallResult {
        let links = self.links(receiver, name)?;
        self.run_link(receiver, name, args, &links, position, applied)
    }

    fn dispatch(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        links: &[Link],
        start: usize,
        applied: &[u64],
    ) -> CallResult {
        let intercepting = !self.interceptions.is_empty();
        for (position, link) in links.iter().enumerate().skip(start) {
            if intercepting {
                let key = link.key(name);
                if let Some(handler) = self.interceptions.get(&key) {
                    let invocation = Invocation::new(self, receiver, &key, args, position, applied);
                    return handler.intercept(&invocation);
                }
            }
            if let Some(def) = self.own_method(*link, name) {
                return self.invoke(&def, receiver, name, args);
            }
        }
        Err(Raised::no_method(name, &self.describe_value(receiver)))
    }

    /// Run the method of the link at `position` or, when it defines none,
    /// dispatch from the next link up
    fn run_link(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
        links: &[Link],
        position: usize,
        applied: &[u64],
    ) -> CallResult {
        match links.get(position).and_then(|link| self.own_method(*link, name)) {
            Some(def) => self.invoke(&def, receiver, name, args),
            None => self.dispatch(receiver, name, args, links, position + 1, applied),
        }
    }

    fn invoke(&self, def: &MethodDef, receiver: &Value, name: &str, args: &[Value]) -> CallResult {
        let ctx = CallContext {
            runtime: self,
            receiver,
            method: name,
        };
        (def.body)(&ctx, args)
    }

    fn links(&self, receiver: &Value, name: &str) -> Result<Vec<Link>, Raised> {
        match receiver {
            Value::Object(object) => {
                let class = self
                    .class_of(*object)
                    .ok_or_else(|| Raised::from(ObjectError::UnknownObject(*object)))?;
                let mut links = vec![Link::Singleton(*object)];
                links.extend(self.ancestors(class).into_iter().map(Link::Instance));
                Ok(links)
            }
            Value::Class(class) => Ok(self
                .class_side_chain(*class)
                .into_iter()
                .map(Link::ClassSide)
                .collect()),
            other => Err(Raised::no_method(name, &self.describe_value(other))),
        }
    }

    /// Classes whose class-side tables a call on `class` walks
    ///
    /// Modules have no superclass; they fall back to `Object` so the
    /// bootstrap class methods stay reachable.
    pub(crate) fn class_side_chain(&self, class: ClassId) -> Vec<ClassId> {
        let registry = self.classes.read();
        let mut chain = registry.superclass_chain(class);
        if !chain.contains(&self.object_class) && registry.get(class).is_some() {
            chain.push(self.object_class);
        }
        chain
    }

    fn own_method(&self, link: Link, name: &str) -> Option<MethodDef> {
        match link {
            Link::Singleton(object) => self
                .objects
                .read()
                .get(object.index())
                .and_then(|o| o.singleton_methods.get(name).cloned()),
            Link::Instance(class) => self
                .classes
                .read()
                .get(class)
                .and_then(|c| c.method(MethodScope::Instance, name).cloned()),
            Link::ClassSide(class) => self
                .classes
                .read()
                .get(class)
                .and_then(|c| c.method(MethodScope::Class, name).cloned()),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("classes", &self.classes.read().len())
            .field("objects", &self.object_count())
            .field("interceptions", &self.interceptions.len())
            .finish()
    }
}

/// Context handed to a method body
pub struct CallContext<'a> {
    runtime: &'a Runtime,
    receiver: &'a Value,
    method: &'a str,
}

impl<'a> CallContext<'a> {
    /// Runtime the method runs in
    pub fn runtime(&self) -> &'a Runtime {
        self.runtime
    }

    /// Receiver (`self`)
    pub fn receiver(&self) -> &'a Value {
        self.receiver
    }

    /// Name the method was called under
    pub fn method_name(&self) -> &'a str {
        self.method
    }

    /// Call another method on the receiver, any visibility
    pub fn send(&self, name: &str, args: &[Value]) -> CallResult {
        self.runtime.send(self.receiver, name, args)
    }

    /// Read a field of the receiver
    pub fn field(&self, name: &str) -> CallResult {
        let object = self.receiver_object()?;
        Ok(self.runtime.field(object, name)?)
    }

    /// Write a field of the receiver
    pub fn set_field(&self, name: &str, value: Value) -> Result<(), Raised> {
        let object = self.receiver_object()?;
        Ok(self.runtime.set_field(object, name, value)?)
    }

    fn receiver_object(&self) -> Result<ObjectId, Raised> {
        self.receiver.as_object().ok_or_else(|| {
            Raised::new(
                "TypeError",
                format!("`{}' needs an object receiver, got {}", self.method, self.receiver.type_name()),
            )
        })
    }
}

/// Whether `name` is a valid class, module or constant name
pub fn is_constant_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}
