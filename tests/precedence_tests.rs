use exprbind::{Binder, Context, Ty, Value};

fn eval(expr: &str) -> Value {
    let binder = Binder::new();
    let compiled = binder.compile(expr, Context::new()).unwrap();
    compiled.eval_args(&[]).unwrap()
}

#[test]
fn arithmetic_precedence_mul_before_add() {
    // 2 + (3 * 4)
    assert_eq!(eval("2 + 3 * 4"), Value::I32(14));
}

#[test]
fn parentheses_override() {
    assert_eq!(eval("(2 + 3) * 4"), Value::I32(20));
}

#[test]
fn every_multiplicative_run_is_grouped() {
    // (2*3) + (4*5)
    assert_eq!(eval("2*3 + 4*5"), Value::I32(26));
    assert_eq!(eval("1 + 2*3 - 8/4 + 7%4"), Value::I32(8));
}

#[test]
fn left_associativity_sub_and_div() {
    assert_eq!(eval("10 - 2 - 3"), Value::I32(5));
    assert_eq!(eval("64 / 4 / 2"), Value::I32(8));
}

#[test]
fn unary_minus_applies_to_first_operand() {
    assert_eq!(eval("-5 + 2"), Value::I32(-3));
    assert_eq!(eval("- (2 * 3)"), Value::I32(-6));
    assert_eq!(eval("+4 - 1"), Value::I32(3));
}

#[test]
fn unary_minus_precedence_with_params() {
    let binder = Binder::new();
    let ctx = Context::new()
        .with_parameter("a", Ty::F64)
        .with_parameter("b", Ty::F64);
    let c = binder.compile("-a * b", ctx).unwrap();
    let out = c.eval_args(&[2.0.into(), 3.0.into()]).unwrap();
    assert_eq!(out, Value::F64(-6.0));
}

#[test]
fn pow_folds_at_additive_level() {
    // ^ is not grouped with * and folds left to right: (2 ^ 3) + 1
    assert_eq!(eval("2 ^ 3 + 1"), Value::F64(9.0));
    // (2 * 3) ^ 2
    assert_eq!(eval("2 * 3 ^ 2"), Value::F64(36.0));
}

#[test]
fn abs_value_bars() {
    assert_eq!(eval("|3 - 10|"), Value::I32(7));
    assert_eq!(eval("|1 + |2 - 5||"), Value::I32(4));
    assert_eq!(eval("2 * |0 - 4| + 1"), Value::I32(9));
}

#[test]
fn call_primary_against_mul() {
    assert_eq!(eval("System.Math.Max(1, 2) + 3 * 4"), Value::I32(14));
    assert_eq!(eval("(System.Math.Max(1, 2) + 3) * 4"), Value::I32(20));
}
