//! Integration tests for aspects
//!
//! Covers:
//! - Each advice kind around a live method
//! - Around advice proceeding with changed arguments or skipping the method
//! - Stacking order and unadvise restoring the original
//! - No-match policies, noop and option validation
//! - Class methods, inherited methods and single objects as join points

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use weft::{
    create_aspect, Advice, AdviceKind, Aspect, DiagnosticSink, JoinPoint, Level, NoMatchPolicy, Spec, Weaver,
    WeavingConfig, WeftConfig, WeftError,
};
use weft_object::{ClassId, Raised, Runtime, Value, Visibility};

struct Shop {
    runtime: Arc<Runtime>,
    cart: ClassId,
    basket: ClassId,
    totals_computed: Arc<AtomicUsize>,
}

impl Shop {
    fn new() -> Self {
        let runtime = Arc::new(Runtime::new());
        runtime.define_module("Shop").unwrap();
        let cart = runtime.define_class("Shop::Cart", None).unwrap();
        let basket = runtime.define_class("Shop::Basket", Some(cart)).unwrap();

        let totals_computed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&totals_computed);
        runtime
            .define_method(cart, "total", Visibility::Public, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Int(10))
            })
            .unwrap();
        runtime
            .define_method(cart, "double", Visibility::Public, |_, args| {
                let n = args.first().and_then(Value::as_int).unwrap_or(0);
                Ok(Value::Int(n * 2))
            })
            .unwrap();
        runtime
            .define_method(cart, "checkout", Visibility::Public, |_, _| {
                Err(Raised::new("InventoryError", "out of stock"))
            })
            .unwrap();
        runtime
            .define_class_method(cart, "build", Visibility::Public, |_, _| Ok(Value::from("built")))
            .unwrap();

        Self {
            runtime,
            cart,
            basket,
            totals_computed,
        }
    }

    fn instance(&self, class: ClassId) -> Value {
        self.runtime.new_object(class, &[]).unwrap()
    }

    fn call(&self, receiver: &Value, name: &str, args: &[Value]) -> Result<Value, Raised> {
        self.runtime.call(receiver, name, args)
    }

    fn spec(&self, method: &str) -> Spec {
        Spec::new().with("types", self.cart).with("methods", method)
    }
}

/// Advice appending `label` to a shared log
fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Advice {
    let log = Arc::clone(log);
    Advice::new(move |ctx| {
        log.lock().push(format!("{}:{}", label, ctx.join_point().method_name()));
        Ok(Value::Null)
    })
}

#[test]
fn test_before_advice_runs_first_and_sees_arguments() {
    let shop = Shop::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &shop.spec("double"),
        Advice::new(move |ctx| {
            sink.lock().extend(ctx.args().iter().cloned());
            Ok(Value::Null)
        }),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "double", &[Value::Int(4)]), Ok(Value::Int(8)));
    assert_eq!(*seen.lock(), vec![Value::Int(4)]);
    assert!(aspect.is_advising());
    assert_eq!(
        aspect.join_points_matched().iter().cloned().collect::<Vec<_>>(),
        vec![JoinPoint::new(shop.cart, "double")]
    );
}

#[test]
fn test_before_advice_can_replace_arguments() {
    let shop = Shop::new();
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &shop.spec("double"),
        Advice::new(|ctx| {
            ctx.set_args(vec![Value::Int(100)]);
            Ok(Value::Null)
        }),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "double", &[Value::Int(1)]), Ok(Value::Int(200)));
}

#[test]
fn test_raising_before_advice_prevents_the_call() {
    let shop = Shop::new();
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &shop.spec("total"),
        Advice::new(|_| Err(Raised::new("SecurityError", "not allowed"))),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    let raised = shop.call(&cart, "total", &[]).unwrap_err();
    assert_eq!(raised.kind, "SecurityError");
    assert_eq!(shop.totals_computed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_after_returning_sees_and_replaces_the_value() {
    let shop = Shop::new();
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::AfterReturning,
        &shop.spec("total"),
        Advice::new(|ctx| {
            let total = ctx.returned_value().and_then(Value::as_int).unwrap_or(0);
            ctx.set_returned_value(Value::Int(total + 5));
            Ok(Value::Null)
        }),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(15)));
}

#[test]
fn test_after_returning_is_skipped_when_the_method_raises() {
    let shop = Shop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::AfterReturning,
        &shop.spec("checkout"),
        recorder(&log, "returned"),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert!(shop.call(&cart, "checkout", &[]).is_err());
    assert!(log.lock().is_empty());
}

#[test]
fn test_after_raising_reraises_after_the_advice() {
    let shop = Shop::new();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::AfterRaising,
        &shop.spec("checkout"),
        Advice::new(move |ctx| {
            *sink.lock() = ctx.raised().map(|r| r.kind.clone());
            Ok(Value::Null)
        }),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    let raised = shop.call(&cart, "checkout", &[]).unwrap_err();
    assert_eq!(raised.kind, "InventoryError");
    assert_eq!(seen.lock().as_deref(), Some("InventoryError"));
}

#[test]
fn test_after_raising_can_replace_the_exception() {
    let shop = Shop::new();
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::AfterRaising,
        &shop.spec("checkout"),
        Advice::new(|ctx| {
            ctx.set_raised(Raised::new("CheckoutFailed", "try again later"));
            Ok(Value::Null)
        }),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "checkout", &[]).unwrap_err().kind, "CheckoutFailed");
}

#[test]
fn test_after_raising_filters_by_exception_kind() {
    let shop = Shop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let _unrelated = create_aspect(
        &shop.runtime,
        AdviceKind::AfterRaising,
        &shop.spec("checkout").with("exceptions", "TimeoutError"),
        recorder(&log, "timeout"),
    )
    .unwrap();
    let _general = create_aspect(
        &shop.runtime,
        AdviceKind::AfterRaising,
        &shop.spec("checkout").with("exceptions", "StandardError"),
        recorder(&log, "standard"),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert!(shop.call(&cart, "checkout", &[]).is_err());
    assert_eq!(*log.lock(), vec!["standard:checkout".to_string()]);
}

#[test]
fn test_after_runs_on_both_outcomes() {
    let shop = Shop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::After,
        &Spec::new()
            .with("types", shop.cart)
            .with_all("methods", ["total", "checkout"]),
        Advice::new(move |ctx| {
            let outcome = match (ctx.returned_value(), ctx.raised()) {
                (Some(value), None) => format!("returned {}", value),
                (None, Some(raised)) => format!("raised {}", raised.kind),
                _ => "unknown".to_string(),
            };
            sink.lock().push(outcome);
            Ok(Value::Null)
        }),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
    assert_eq!(shop.call(&cart, "checkout", &[]).unwrap_err().kind, "InventoryError");
    assert_eq!(*log.lock(), vec!["returned 10".to_string(), "raised InventoryError".to_string()]);
}

#[test]
fn test_around_advice_proceeds_with_new_arguments() {
    let shop = Shop::new();
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Around,
        &shop.spec("double"),
        Advice::new(|ctx| {
            let n = ctx.args().first().and_then(Value::as_int).unwrap_or(0);
            let doubled = ctx.proceed_with(&[Value::Int(n + 1)])?;
            Ok(Value::List(vec![Value::from("around"), doubled]))
        }),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(
        shop.call(&cart, "double", &[Value::Int(2)]),
        Ok(Value::List(vec![Value::from("around"), Value::Int(6)]))
    );
}

#[test]
fn test_around_advice_can_skip_the_method() {
    let shop = Shop::new();
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Around,
        &shop.spec("total"),
        Advice::new(|_| Ok(Value::Int(0))),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(0)));
    assert_eq!(shop.totals_computed.load(Ordering::SeqCst), 0);
}

#[test]
fn test_proceed_is_reserved_for_around_advice() {
    let shop = Shop::new();
    let outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &shop.spec("total"),
        Advice::new(move |ctx| {
            *sink.lock() = ctx.proceed().err().map(|r| r.kind);
            Ok(Value::Null)
        }),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
    assert_eq!(outcome.lock().as_deref(), Some("RuntimeError"));
    assert_eq!(shop.totals_computed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_later_aspects_wrap_earlier_ones() {
    let shop = Shop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = create_aspect(&shop.runtime, AdviceKind::Before, &shop.spec("total"), recorder(&log, "first")).unwrap();
    let second =
        create_aspect(&shop.runtime, AdviceKind::Before, &shop.spec("total"), recorder(&log, "second")).unwrap();

    let cart = shop.instance(shop.cart);
    shop.call(&cart, "total", &[]).unwrap();
    assert_eq!(*log.lock(), vec!["second:total".to_string(), "first:total".to_string()]);

    log.lock().clear();
    first.unadvise();
    shop.call(&cart, "total", &[]).unwrap();
    assert_eq!(*log.lock(), vec!["second:total".to_string()]);
    assert!(!first.is_advising());
    assert!(second.is_advising());

    second.unadvise();
    assert!(shop.runtime.interceptions().is_empty());
}

#[test]
fn test_removing_the_outer_around_keeps_the_inner() {
    let shop = Shop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let around = |label: &'static str| {
        let log = Arc::clone(&log);
        Advice::new(move |ctx| {
            log.lock().push(label.to_string());
            ctx.proceed()
        })
    };
    let inner = create_aspect(&shop.runtime, AdviceKind::Around, &shop.spec("total"), around("inner")).unwrap();
    let outer = create_aspect(&shop.runtime, AdviceKind::Around, &shop.spec("total"), around("outer")).unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
    assert_eq!(*log.lock(), vec!["outer".to_string(), "inner".to_string()]);

    log.lock().clear();
    outer.unadvise();
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
    assert_eq!(*log.lock(), vec!["inner".to_string()]);
    assert_eq!(shop.totals_computed.load(Ordering::SeqCst), 2);

    inner.unadvise();
    assert!(shop.runtime.interceptions().is_empty());
}

#[test]
fn test_unadvise_restores_the_original_and_is_idempotent() {
    let shop = Shop::new();
    let aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Around,
        &shop.spec("total"),
        Advice::new(|_| Ok(Value::Int(-1))),
    )
    .unwrap();

    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(-1)));

    aspect.unadvise();
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
    assert!(shop.runtime.interceptions().is_empty());

    aspect.unadvise();
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
}

#[test]
fn test_multiple_kinds_share_one_body() {
    let shop = Shop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let aspect = Aspect::with_kinds(
        Arc::clone(&shop.runtime),
        &[AdviceKind::AfterReturning, AdviceKind::Before],
        &shop.spec("total"),
        Advice::new(move |ctx| {
            sink.lock().push(ctx.kind().to_string());
            Ok(Value::Null)
        }),
    )
    .unwrap();

    assert_eq!(aspect.kinds(), &[AdviceKind::Before, AdviceKind::AfterReturning]);
    let cart = shop.instance(shop.cart);
    shop.call(&cart, "total", &[]).unwrap();
    assert_eq!(*log.lock(), vec!["before".to_string(), "after_returning".to_string()]);
}

#[test]
fn test_incompatible_kinds_are_rejected() {
    let shop = Shop::new();
    let advice = Advice::new(|_| Ok(Value::Null));
    for kinds in [
        vec![AdviceKind::Around, AdviceKind::Before],
        vec![AdviceKind::After, AdviceKind::AfterReturning],
        vec![AdviceKind::AfterReturning, AdviceKind::AfterRaising],
        vec![],
    ] {
        let err = Aspect::with_kinds(Arc::clone(&shop.runtime), &kinds, &shop.spec("total"), advice.clone())
            .unwrap_err();
        assert!(err.is_invalid_specification(), "{:?} should be rejected", kinds);
    }
    assert!(shop.runtime.interceptions().is_empty());
}

#[test]
fn test_invalid_selections_are_rejected() {
    let shop = Shop::new();
    let advice = Advice::new(|_| Ok(Value::Null));
    let pointcut = weft::make_pointcut(shop.runtime.as_ref(), &shop.spec("total")).unwrap();

    let cases = [
        (AdviceKind::Before, shop.spec("total").with("exceptions", "InventoryError")),
        (AdviceKind::Before, shop.spec("total").with("pointcuts", pointcut)),
        (AdviceKind::Before, Spec::new().with("methods", "total")),
        (AdviceKind::Before, shop.spec("total").with("during", "checkout")),
    ];
    for (kind, spec) in cases {
        let err = create_aspect(&shop.runtime, kind, &spec, advice.clone()).unwrap_err();
        assert!(err.is_invalid_specification(), "{} should be rejected", spec);
    }
}

#[test]
fn test_matching_nothing_is_an_error_by_default() {
    let shop = Shop::new();
    let err = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &shop.spec("refund"),
        Advice::new(|_| Ok(Value::Null)),
    )
    .unwrap_err();
    assert!(matches!(err, WeftError::NoMatchingJoinPoints { .. }));
}

#[test]
fn test_matching_nothing_can_be_ignored() {
    let shop = Shop::new();
    let (sink, diagnostics) = DiagnosticSink::collecting();
    let aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &shop.spec("refund").flag("ignore_no_jps").with("log", sink),
        Advice::new(|_| Ok(Value::Null)),
    )
    .unwrap();

    assert!(!aspect.is_advising());
    assert_eq!(aspect.join_points_not_matched().len(), 1);
    assert!(diagnostics.lock().iter().all(|d| d.level != Level::Warn));
}

#[test]
fn test_matching_nothing_warns_under_warn_policy() {
    let shop = Shop::new();
    let config = WeftConfig {
        weaving: WeavingConfig {
            on_no_matching_join_points: NoMatchPolicy::Warn,
            ..WeavingConfig::default()
        },
    };
    let weaver = Weaver::with_config(Arc::clone(&shop.runtime), config).unwrap();
    let (sink, diagnostics) = DiagnosticSink::collecting();

    let aspect = weaver
        .advise(
            AdviceKind::Before,
            &shop.spec("refund").with("log", sink),
            Advice::new(|_| Ok(Value::Null)),
        )
        .unwrap();

    assert!(!aspect.is_advising());
    let warnings: Vec<_> = diagnostics.lock().iter().filter(|d| d.level == Level::Warn).cloned().collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].message.contains("no join points"));
}

#[test]
fn test_noop_resolves_without_installing() {
    let shop = Shop::new();
    let aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Around,
        &shop.spec("total").flag("noop"),
        Advice::new(|_| Ok(Value::Int(-1))),
    )
    .unwrap();

    assert!(aspect.is_noop());
    assert!(!aspect.is_advising());
    assert_eq!(aspect.join_points_matched().len(), 1);
    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
    aspect.unadvise();
}

#[test]
fn test_class_methods_are_join_points() {
    let shop = Shop::new();
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::AfterReturning,
        &shop.spec("build").with("method_options", "class"),
        Advice::new(|ctx| {
            ctx.set_returned_value(Value::from("rebuilt"));
            Ok(Value::Null)
        }),
    )
    .unwrap();

    assert_eq!(
        shop.call(&Value::Class(shop.cart), "build", &[]),
        Ok(Value::from("rebuilt"))
    );
    assert_eq!(
        shop.call(&Value::Class(shop.basket), "build", &[]),
        Ok(Value::from("rebuilt"))
    );
}

#[test]
fn test_inherited_method_advised_on_subclass_only() {
    let shop = Shop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &Spec::new().with("types", shop.basket).with("methods", "total"),
        recorder(&log, "basket"),
    )
    .unwrap();
    assert!(aspect.join_points_matched().contains(&JoinPoint::new(shop.basket, "total")));

    let cart = shop.instance(shop.cart);
    let basket = shop.instance(shop.basket);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
    assert!(log.lock().is_empty());
    assert_eq!(shop.call(&basket, "total", &[]), Ok(Value::Int(10)));
    assert_eq!(*log.lock(), vec!["basket:total".to_string()]);
}

#[test]
fn test_type_and_descendants_advise_each_call_once() {
    let shop = Shop::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &Spec::new().with("types_and_descendants", shop.cart).with("methods", "total"),
        recorder(&log, "family"),
    )
    .unwrap();
    assert!(aspect.join_points_matched().contains(&JoinPoint::new(shop.cart, "total")));
    assert!(aspect.join_points_matched().contains(&JoinPoint::new(shop.basket, "total")));

    let basket = shop.instance(shop.basket);
    assert_eq!(shop.call(&basket, "total", &[]), Ok(Value::Int(10)));
    assert_eq!(*log.lock(), vec!["family:total".to_string()]);

    log.lock().clear();
    let cart = shop.instance(shop.cart);
    assert_eq!(shop.call(&cart, "total", &[]), Ok(Value::Int(10)));
    assert_eq!(*log.lock(), vec!["family:total".to_string()]);

    // Advice only on the parent still runs for the subclass call
    log.lock().clear();
    let parent_only = create_aspect(&shop.runtime, AdviceKind::Before, &shop.spec("total"), recorder(&log, "cart")).unwrap();
    shop.call(&basket, "total", &[]).unwrap();
    assert_eq!(*log.lock(), vec!["family:total".to_string(), "cart:total".to_string()]);
    assert_eq!(shop.totals_computed.load(Ordering::SeqCst), 3);

    parent_only.unadvise();
    aspect.unadvise();
    assert!(shop.runtime.interceptions().is_empty());
}

#[test]
fn test_single_object_is_advised_alone() {
    let shop = Shop::new();
    let advised = shop.instance(shop.cart);
    let other = shop.instance(shop.cart);
    let _aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Around,
        &Spec::new()
            .with("objects", advised.as_object().unwrap())
            .with("methods", "total"),
        Advice::new(|ctx| {
            let total = ctx.proceed()?.as_int().unwrap_or(0);
            Ok(Value::Int(total * 100))
        }),
    )
    .unwrap();

    assert_eq!(shop.call(&advised, "total", &[]), Ok(Value::Int(1000)));
    assert_eq!(shop.call(&other, "total", &[]), Ok(Value::Int(10)));
}

#[test]
fn test_aspect_from_pointcut() {
    let shop = Shop::new();
    let pointcut = weft::make_pointcut(shop.runtime.as_ref(), &shop.spec("total")).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let aspect = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &Spec::new().with("pointcuts", pointcut.clone()),
        recorder(&log, "pc"),
    )
    .unwrap();

    assert_eq!(aspect.pointcut(), &pointcut);
    let cart = shop.instance(shop.cart);
    shop.call(&cart, "total", &[]).unwrap();
    assert_eq!(*log.lock(), vec!["pc:total".to_string()]);
}

#[test]
fn test_aspect_equality() {
    let shop = Shop::new();
    let advice = Advice::new(|_| Ok(Value::Null));
    let a = create_aspect(&shop.runtime, AdviceKind::Before, &shop.spec("total"), advice.clone()).unwrap();
    let b = create_aspect(&shop.runtime, AdviceKind::Before, &shop.spec("total"), advice).unwrap();
    let c = create_aspect(
        &shop.runtime,
        AdviceKind::Before,
        &shop.spec("total"),
        Advice::new(|_| Ok(Value::Null)),
    )
    .unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a.id(), b.id());
}
