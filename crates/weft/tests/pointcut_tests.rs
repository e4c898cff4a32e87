//! Integration tests for pointcut resolution
//!
//! Covers:
//! - Union, intersection and difference of pointcuts
//! - Exclusion of types, objects, methods, join points and pointcuts
//! - Visibility and class-side method options
//! - Pointcuts found through constants and class variables

use regex::Regex;
use weft::{make_pointcut, JoinPoint, OptionValue, Pointcut, Spec};
use weft_object::{ClassId, ObjectId, Runtime, Value, Visibility};

struct Model {
    runtime: Runtime,
    cart: ClassId,
    basket: ClassId,
    order: ClassId,
}

fn model() -> Model {
    let runtime = Runtime::new();
    let cart = runtime.define_class("Cart", None).unwrap();
    let basket = runtime.define_class("Basket", Some(cart)).unwrap();
    let order = runtime.define_class("Order", None).unwrap();

    for name in ["total", "add", "checkout"] {
        runtime
            .define_method(cart, name, Visibility::Public, |_, _| Ok(Value::Null))
            .unwrap();
    }
    runtime
        .define_method(cart, "audit", Visibility::Private, |_, _| Ok(Value::Null))
        .unwrap();
    runtime
        .define_class_method(cart, "create", Visibility::Public, |_, _| Ok(Value::Null))
        .unwrap();
    runtime
        .define_method(order, "total", Visibility::Public, |_, _| Ok(Value::Null))
        .unwrap();

    Model {
        runtime,
        cart,
        basket,
        order,
    }
}

fn resolve(m: &Model, spec: Spec) -> Pointcut {
    make_pointcut(&m.runtime, &spec).unwrap()
}

fn matched(pc: &Pointcut) -> Vec<JoinPoint> {
    pc.join_points_matched().iter().cloned().collect()
}

fn object(m: &Model) -> ObjectId {
    m.runtime.instantiate(m.cart).unwrap()
}

#[test]
fn test_pointcut_set_algebra() {
    let m = model();
    let a = resolve(&m, Spec::new().with("types", m.cart).with_all("methods", ["total", "add"]));
    let b = resolve(&m, Spec::new().with_all("types", [m.cart, m.order]).with("methods", "total"));

    let mut union = matched(&a.or(&b));
    union.sort();
    let mut expected = vec![
        JoinPoint::new(m.cart, "add"),
        JoinPoint::new(m.cart, "total"),
        JoinPoint::new(m.order, "total"),
    ];
    expected.sort();
    assert_eq!(union, expected);

    assert_eq!(matched(&a.and(&b)), vec![JoinPoint::new(m.cart, "total")]);
    assert_eq!(matched(&a.minus(&b)), vec![JoinPoint::new(m.cart, "add")]);
    assert_eq!(a.or(&b), b.or(&a));
    assert_eq!(&a | &b, a.or(&b));
    assert_eq!(&a & &b, a.and(&b));
    assert_eq!(&a - &b, a.minus(&b));
    assert!(a.minus(&a).is_empty());
}

#[test]
fn test_inherited_methods_and_type_exclusion() {
    let m = model();
    let all = resolve(
        &m,
        Spec::new().with("types_and_descendants", m.cart).with("methods", "total"),
    );
    assert!(all.join_points_matched().contains(&JoinPoint::new(m.basket, "total")));
    assert!(all.join_points_matched().contains(&JoinPoint::new(m.cart, "total")));

    let pc = resolve(
        &m,
        Spec::new()
            .with("types_and_descendants", m.cart)
            .with("exclude_types", m.basket)
            .with("methods", "total"),
    );
    assert_eq!(matched(&pc), vec![JoinPoint::new(m.cart, "total")]);
    assert!(pc.candidate_types_excluded().matched().keys().any(|k| k.subject() == Some(m.basket.into())));
}

#[test]
fn test_exclude_methods_by_pattern() {
    let m = model();
    let pc = resolve(
        &m,
        Spec::new()
            .with("types", m.cart)
            .with("methods", OptionValue::All)
            .with("exclude_methods", Regex::new("^(to_s|inspect)$").unwrap()),
    );
    let names: Vec<&str> = pc.join_points_matched().iter().map(|jp| jp.method_name()).collect();
    assert_eq!(names, vec!["add", "checkout", "total"]);
}

#[test]
fn test_exclude_join_points_and_pointcuts() {
    let m = model();
    let checkout = resolve(&m, Spec::new().with("types", m.cart).with("methods", "checkout"));
    let pc = resolve(
        &m,
        Spec::new()
            .with("types", m.cart)
            .with_all("methods", ["total", "add", "checkout"])
            .with("exclude_join_points", JoinPoint::new(m.cart, "add"))
            .with("exclude_pointcuts", checkout),
    );
    assert_eq!(matched(&pc), vec![JoinPoint::new(m.cart, "total")]);
}

#[test]
fn test_objects_and_object_exclusion() {
    let m = model();
    let kept = object(&m);
    let dropped = object(&m);
    let pc = resolve(
        &m,
        Spec::new()
            .with_all("objects", [kept, dropped])
            .with("exclude_objects", dropped)
            .with("methods", "total"),
    );
    assert_eq!(matched(&pc), vec![JoinPoint::new(kept, "total")]);
    assert_eq!(pc.candidate_objects().matched().len(), 1);
}

#[test]
fn test_private_methods_need_the_visibility_option() {
    let m = model();
    let public_only = resolve(&m, Spec::new().with("types", m.cart).with("methods", "audit"));
    assert!(public_only.join_points_matched().is_empty());
    assert!(public_only
        .join_points_not_matched()
        .contains(&JoinPoint::new(m.cart, "audit")));

    let private = resolve(
        &m,
        Spec::new()
            .with("types", m.cart)
            .with("methods", "audit")
            .with("method_options", "private"),
    );
    assert_eq!(matched(&private), vec![JoinPoint::new(m.cart, "audit")]);
}

#[test]
fn test_class_side_join_points() {
    let m = model();
    let pc = resolve(
        &m,
        Spec::new()
            .with("types", m.cart)
            .with("methods", "create")
            .with("method_options", "class"),
    );
    let found = matched(&pc);
    assert_eq!(found, vec![JoinPoint::class_method(m.cart, "create")]);
    assert!(found[0].is_class_method());
    assert_eq!(found[0].describe(&m.runtime), "Cart.create");
}

#[test]
fn test_named_pointcuts_are_included_and_excluded() {
    let m = model();
    let totals = resolve(&m, Spec::new().with_all("types", [m.cart, m.order]).with("methods", "total"));
    m.runtime.define_constant(m.order, "TOTALS", totals.clone()).unwrap();
    let adds = resolve(&m, Spec::new().with("types", m.cart).with("methods", "add"));
    m.runtime.define_class_variable(m.cart, "@@adds", adds).unwrap();

    let pc = resolve(
        &m,
        Spec::new().with(
            "named_pointcuts",
            Spec::new().with_all("types", [m.cart, m.order]),
        ),
    );
    let mut expected = vec![
        JoinPoint::new(m.cart, "add"),
        JoinPoint::new(m.cart, "total"),
        JoinPoint::new(m.order, "total"),
    ];
    expected.sort();
    assert_eq!(matched(&pc), expected);

    let pc = resolve(
        &m,
        Spec::new()
            .with("named_pointcuts", Spec::new().with_all("types", [m.cart, m.order]))
            .with("exclude_named_pointcuts", Spec::new().with("types", m.cart).with("named", "adds")),
    );
    assert_eq!(pc, totals);
}

#[test]
fn test_methods_defined_later_are_not_picked_up() {
    let m = model();
    let pc = resolve(&m, Spec::new().with("types", m.order).with("methods", Regex::new("^sub").unwrap()));
    assert!(pc.join_points_matched().is_empty());

    m.runtime
        .define_method(m.order, "submit", Visibility::Public, |_, _| Ok(Value::Null))
        .unwrap();
    assert!(pc.join_points_matched().is_empty());

    let again = resolve(&m, Spec::new().with("types", m.order).with("methods", Regex::new("^sub").unwrap()));
    assert_eq!(matched(&again), vec![JoinPoint::new(m.order, "submit")]);
}
