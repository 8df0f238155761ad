use exprbind::{Binder, CompileError, Context, FUNCTIONS_TYPE, Ty, Value, function};

#[function]
pub fn min2(a: f64, b: f64) -> f64 {
    if a < b { a } else { b }
}

#[function]
pub fn one() -> f64 {
    1.0
}

#[function]
pub fn pow2(x: f64) -> f64 {
    x * x
}

#[function("Geometry")]
pub fn hypot(a: f64, b: f64) -> f64 {
    (a * a + b * b).sqrt()
}

#[function("Geometry")]
pub fn clamp(x: f64, lo: f64, hi: f64) -> f64 {
    x.max(lo).min(hi)
}

#[test]
fn linked_functions_live_on_the_functions_class() {
    assert_eq!(FUNCTIONS_TYPE, "Functions");
    let binder = Binder::new();
    let ctx = Context::new()
        .with_parameter("A", Ty::F64)
        .with_parameter("B", Ty::F64);
    let c = binder.compile("Functions.min2(A, B)", ctx.clone()).unwrap();
    assert_eq!(c.ty(), &Ty::F64);
    assert_eq!(c.eval_args(&[3.0.into(), 5.0.into()]).unwrap(), Value::F64(3.0));

    let c = binder.compile("Functions.one() + Functions.pow2(A)", ctx).unwrap();
    assert_eq!(c.eval_args(&[4.0.into(), 0.0.into()]).unwrap(), Value::F64(17.0));
}

#[test]
fn functions_registered_under_a_named_class() {
    let binder = Binder::new();
    let c = binder.compile("Geometry.hypot(3, 4)", Context::new()).unwrap();
    assert_eq!(c.eval_args(&[]).unwrap(), Value::F64(5.0));

    let c = binder.compile("Geometry.clamp(12, 0, 10) * 2", Context::new()).unwrap();
    assert_eq!(c.eval_args(&[]).unwrap(), Value::F64(20.0));

    match binder.compile("Functions.hypot(3, 4)", Context::new()) {
        Err(CompileError::OverloadNotFound { signature }) => {
            assert_eq!(signature, "Functions.hypot(int, int)")
        }
        other => panic!("unexpected result: {:?}", other.map(|c| c.ty().clone())),
    }
}

#[test]
fn runtime_registration() {
    let mut binder = Binder::new();
    binder.types_mut().register_nullary("Seven", || 7.0);
    binder.types_mut().register_unary("Twice", |x| x * 2.0);
    binder.types_mut().register_binary("Avg", |a, b| (a + b) / 2.0);
    binder
        .types_mut()
        .register_ternary("Lerp", |a, b, t| a + (b - a) * t);

    let ctx = Context::new().with_parameter("t", Ty::F32);
    let c = binder
        .compile(
            "Functions.Twice(Functions.Seven()) + Functions.Avg(1, 2) + Functions.Lerp(0, 10, t)",
            ctx,
        )
        .unwrap();
    assert_eq!(c.eval_args(&[Value::F32(0.5)]).unwrap(), Value::F64(20.5));
}

#[test]
fn wrong_arity_is_an_overload_error() {
    let binder = Binder::new();
    match binder.compile("Functions.pow2(1, 2)", Context::new()) {
        Err(CompileError::OverloadNotFound { signature }) => {
            assert_eq!(signature, "Functions.pow2(int, int)")
        }
        other => panic!("unexpected result: {:?}", other.map(|c| c.ty().clone())),
    }
}
