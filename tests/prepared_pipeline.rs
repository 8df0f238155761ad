use std::sync::Arc;

use exprbind::{Binder, CompileError, Context, Ty, Value};

#[test]
fn prepared_expr_renders_normalized_tree() {
    let binder = Binder::new();
    let ctx = Context::new().with_parameter("x", Ty::F64);
    let cases = [
        ("2*3 + 4*5", "(2 * 3) + (4 * 5)"),
        ("(int)x + 1", "((int) x) + 1"),
        ("|3 - 10|", "System.Math.Abs(3 - 10)"),
        ("1 + 2*3*4 - 5", "1 + (2 * 3 * 4) - 5"),
    ];
    for (src, expected) in cases {
        let prepared = binder.prepare(src, &ctx).unwrap();
        assert_eq!(prepared.to_string(), expected, "for {src:?}");
    }
}

#[test]
fn bound_nodes_are_reused_across_contexts() {
    let binder = Binder::new();
    let as_double = Context::new().with_parameter("x", Ty::F64);
    let as_int = Context::new().with_parameter("x", Ty::I32);

    let prepared = binder.prepare("x * 2", &as_double).unwrap();
    assert_eq!(prepared.cached_nodes(), 0);

    let first = binder.bind(&prepared, &as_double).unwrap();
    let second = binder.bind(&prepared, &as_int).unwrap();
    assert!(Arc::ptr_eq(first.root(), second.root()));
    // the first successful binding wins
    assert_eq!(second.ty(), &Ty::F64);
    assert_eq!(
        second.eval_args(&[Value::F64(1.5)]).unwrap(),
        Value::F64(3.0)
    );
}

#[test]
fn failed_binding_is_not_cached() {
    let binder = Binder::new();
    let prepared = binder.prepare("y + 1", &Context::new()).unwrap();

    match binder.bind(&prepared, &Context::new()) {
        Err(CompileError::UnknownIdentifier(name)) => assert_eq!(name, "y"),
        other => panic!("unexpected result: {:?}", other.map(|b| b.ty().clone())),
    }
    assert_eq!(prepared.cached_nodes(), 0);

    let ctx = Context::new().with_parameter("y", Ty::I64);
    let bound = binder.bind(&prepared, &ctx).unwrap();
    assert_eq!(bound.ty(), &Ty::I64);
    assert_eq!(bound.eval_args(&[Value::I64(41)]).unwrap(), Value::I64(42));
    assert!(prepared.cached_nodes() > 0);
}

#[test]
fn preparation_context_decides_casts() {
    let binder = Binder::new();
    // `int` names a parameter here, so `(int)` stays a parenthesized operand
    let ctx = Context::new().with_parameter("int", Ty::I32);
    let prepared = binder.prepare("(int) - 1", &ctx).unwrap();
    assert_eq!(prepared.to_string(), "(int) - 1");
    let bound = binder.bind(&prepared, &ctx).unwrap();
    assert_eq!(bound.eval_args(&[Value::I32(5)]).unwrap(), Value::I32(4));

    let prepared = binder.prepare("(int) - 1.5", &Context::new()).unwrap();
    assert_eq!(prepared.to_string(), "((int) - 1.5)");
    let bound = binder.bind(&prepared, &Context::new()).unwrap();
    assert_eq!(bound.eval_args(&[]).unwrap(), Value::I32(-1));
}

#[test]
fn bound_expression_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<exprbind::BoundExpression>();
    fn assert_send<T: Send>() {}
    assert_send::<exprbind::PreparedExpr>();
}
