//! Root `Object` class
//!
//! | Scope    | Method     | Description                          |
//! |----------|------------|--------------------------------------|
//! | instance | `to_s`     | `#<Path>`                            |
//! | instance | `inspect`  | `#<Path:object#N>`                   |
//! | instance | `__id__`   | Object handle as an integer          |
//! | instance | `__send__` | Dynamic call, any visibility         |
//! | class    | `new`      | Allocate and run `initialize`        |
//! | class    | `name`     | Qualified path of the class          |

use crate::class::{native, ClassKind, MethodDef, NativeMethod, Visibility};
use crate::raised::Raised;
use crate::registry::ClassRegistry;
use crate::subject::{ClassId, MethodScope, Subject};
use crate::value::Value;

/// Well-known class IDs
pub mod core_class_ids {
    use crate::subject::ClassId;

    /// Object class ID (root class)
    pub const OBJECT: ClassId = ClassId(0);
}

/// Register `Object` and its methods; must run on an empty registry
pub(crate) fn install_object_class(registry: &mut ClassRegistry) -> ClassId {
    let id = registry.register("Object", None, ClassKind::Class);
    debug_assert_eq!(id, core_class_ids::OBJECT);

    let instance_methods: [(&str, NativeMethod); 4] = [
        (
            "to_s",
            native(|ctx, _| {
                let rt = ctx.runtime();
                let path = match ctx.receiver() {
                    Value::Object(o) => rt.class_of(*o).and_then(|c| rt.class_path(c)),
                    _ => None,
                };
                Ok(Value::from(format!("#<{}>", path.unwrap_or_default())))
            }),
        ),
        (
            "inspect",
            native(|ctx, _| match ctx.receiver().subject() {
                Some(subject) => Ok(Value::from(ctx.runtime().describe(subject))),
                None => Ok(Value::from(ctx.receiver().to_string())),
            }),
        ),
        (
            "__id__",
            native(|ctx, _| match ctx.receiver() {
                Value::Object(o) => Ok(Value::Int(o.0 as i64)),
                other => Err(Raised::new("TypeError", format!("no id for {}", other.type_name()))),
            }),
        ),
        (
            "__send__",
            native(|ctx, args| {
                let (name, rest) = args
                    .split_first()
                    .ok_or_else(|| Raised::argument_error("no method name given"))?;
                let name = name
                    .as_str()
                    .ok_or_else(|| Raised::new("TypeError", format!("{} is not a symbol nor a string", name)))?;
                ctx.send(name, rest)
            }),
        ),
    ];

    let class_methods: [(&str, NativeMethod); 2] = [
        (
            "new",
            native(|ctx, args| match ctx.receiver() {
                Value::Class(class) => ctx.runtime().new_object(*class, args),
                other => Err(Raised::new("TypeError", format!("cannot instantiate {}", other.type_name()))),
            }),
        ),
        (
            "name",
            native(|ctx, _| match ctx.receiver() {
                Value::Class(class) => Ok(Value::from(ctx.runtime().describe(Subject::Class(*class)))),
                _ => Ok(Value::Null),
            }),
        ),
    ];

    if let Some(object) = registry.get_mut(id) {
        for (name, body) in instance_methods {
            object
                .methods_mut(MethodScope::Instance)
                .insert(name.to_string(), MethodDef::new(name, Visibility::Public, body));
        }
        for (name, body) in class_methods {
            object
                .methods_mut(MethodScope::Class)
                .insert(name.to_string(), MethodDef::new(name, Visibility::Public, body));
        }
    }

    id
}
