use std::str::FromStr;

use bigdecimal::BigDecimal;
use exprbind::{Binder, BinderOptions, CompileError, Context, EvalError, Ty, Value};

fn compile_err(src: &str, ctx: Context) -> CompileError {
    Binder::new().compile(src, ctx).unwrap_err()
}

#[test]
fn unknown_identifier_names_the_first_segment() {
    for src in ["Foo + 1", "Foo.Bar.Baz", "Foo()"] {
        match compile_err(src, Context::new()) {
            CompileError::UnknownIdentifier(name) => assert_eq!(name, "Foo"),
            other => panic!("unexpected error for {src}: {:?}", other),
        }
    }
}

#[test]
fn unknown_static_member() {
    match compile_err("int.Foo", Context::new()) {
        CompileError::UnknownIdentifier(name) => assert_eq!(name, "int.Foo"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn parse_errors_carry_offsets() {
    match compile_err("1 +", Context::new()) {
        CompileError::Parse { offset, message } => {
            assert_eq!(offset, 2);
            assert_eq!(message, "operator '+' has no right operand");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    match compile_err("(1 + 2", Context::new()) {
        CompileError::Parse { offset, .. } => assert_eq!(offset, 0),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn malformed_operator_sequences() {
    let cases = [
        ("", "empty expression"),
        ("1 2", "missing operator between operands"),
        ("* 3", "unexpected operator '*'"),
        ("1 + * 2", "two operators in a row"),
        ("()", "empty parentheses"),
        ("|1 + 2", "missing closing '|'"),
        ("1 |", "'|' closes no absolute value"),
        ("\"abc", "unterminated string literal"),
        ("(int)", "cast to 'int' has no operand"),
    ];
    for (src, expected) in cases {
        match compile_err(src, Context::new()) {
            CompileError::Parse { message, .. } => assert_eq!(message, expected, "for {src:?}"),
            other => panic!("unexpected error for {src:?}: {:?}", other),
        }
    }
}

#[test]
fn unsupported_constructs() {
    let ctx = Context::new()
        .with_parameter("a", Ty::I32)
        .with_parameter("b", Ty::I32);
    match compile_err("a < b", ctx) {
        CompileError::Unsupported(msg) => assert_eq!(msg, "unrecognized input '<'"),
        other => panic!("unexpected error: {:?}", other),
    }
    match compile_err("int + 1", Context::new()) {
        CompileError::Unsupported(msg) => assert!(msg.contains("used as a value"), "{msg}"),
        other => panic!("unexpected error: {:?}", other),
    }
    match compile_err("this", Context::new()) {
        CompileError::Unsupported(_) => {}
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn invalid_cast() {
    let ctx = Context::new().with_parameter("s", Ty::String);
    match compile_err("(int)s", ctx) {
        CompileError::InvalidCast { from, to } => {
            assert_eq!(from, Ty::String);
            assert_eq!(to, Ty::I32);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn type_mismatch_on_non_numeric_operands() {
    let ctx = Context::new().with_parameter("s", Ty::String);
    match compile_err("s + 1", ctx.clone()) {
        CompileError::TypeMismatch { op, left, right } => {
            assert_eq!(op, '+');
            assert_eq!(left, Ty::String);
            assert_eq!(right, Ty::I32);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    match compile_err("2 ^ s", ctx) {
        CompileError::TypeMismatch { op, .. } => assert_eq!(op, '^'),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn ulong_cannot_be_negated() {
    let ctx = Context::new().with_parameter("u", Ty::U64);
    match compile_err("-u", ctx) {
        CompileError::TypeMismatch { op, left, right } => {
            assert_eq!(op, '-');
            assert_eq!(left, Ty::U64);
            assert_eq!(right, Ty::U64);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn overload_not_found_renders_the_call() {
    let ctx = Context::new().with_parameter("s", Ty::String);
    let err = compile_err("System.Math.Sqrt(s)", ctx);
    match &err {
        CompileError::OverloadNotFound { signature } => {
            assert_eq!(signature, "System.Math.Sqrt(string)")
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.to_string(), "no overload matches System.Math.Sqrt(string)");

    // instance method called through the type name
    match compile_err("string.ToUpper()", Context::new()) {
        CompileError::OverloadNotFound { signature } => assert_eq!(signature, "string.ToUpper()"),
        other => panic!("unexpected error: {:?}", other),
    }

    let ctx = Context::new().with_parameter("arr", Ty::array(Ty::F64, 2));
    match compile_err("arr[1]", ctx) {
        CompileError::OverloadNotFound { signature } => assert_eq!(signature, "double[,][int]"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn source_length_limit() {
    let binder = Binder::new().with_options(BinderOptions {
        max_source_len: 8,
        ..BinderOptions::default()
    });
    match binder.compile("1 + 2 + 3 + 4", Context::new()) {
        Err(CompileError::LimitExceeded { what, limit }) => {
            assert_eq!(what, "source length");
            assert_eq!(limit, 8);
        }
        other => panic!("unexpected result: {:?}", other.map(|c| c.ty().clone())),
    }
}

#[test]
fn nesting_depth_limit() {
    let binder = Binder::new().with_options(BinderOptions {
        max_depth: 4,
        ..BinderOptions::default()
    });
    assert!(binder.compile("((((1))))", Context::new()).is_ok());
    match binder.compile("(((((1)))))", Context::new()) {
        Err(CompileError::LimitExceeded { what, limit }) => {
            assert_eq!(what, "nesting depth");
            assert_eq!(limit, 4);
        }
        other => panic!("unexpected result: {:?}", other.map(|c| c.ty().clone())),
    }
}

fn assert_too_deep(src: &str, ctx: Context) {
    match compile_err(src, ctx) {
        CompileError::LimitExceeded { what, limit } => {
            assert_eq!(what, "nesting depth");
            assert_eq!(limit, 128);
        }
        other => panic!("unexpected error for {:.16}...: {:?}", src, other),
    }
}

#[test]
fn nested_absolute_values_count_toward_depth() {
    let c = Binder::new().compile("||||-3||||", Context::new()).unwrap();
    assert_eq!(c.eval_args(&[]).unwrap(), Value::I32(3));

    let src = format!("{}1{}", "|".repeat(200), "|".repeat(200));
    assert_too_deep(&src, Context::new());
}

#[test]
fn chained_casts_count_toward_depth() {
    let ctx = Context::new().with_parameter("x", Ty::F64);
    let c = Binder::new().compile("(long)(int)x", ctx.clone()).unwrap();
    assert_eq!(c.eval_args(&[2.7.into()]).unwrap(), Value::I64(2));

    let src = format!("{}x", "(int)".repeat(200));
    assert_too_deep(&src, ctx);
}

#[test]
fn nested_generic_arguments_count_toward_depth() {
    let src = format!("a{}", "<a".repeat(200));
    assert_too_deep(&src, Context::new());
}

#[test]
fn long_operator_chains_hit_the_tree_depth_limit() {
    let ctx = Context::new().with_parameter("x", Ty::F64);
    let src = format!("x{}", " + x".repeat(2000));
    match compile_err(&src, ctx.clone()) {
        CompileError::LimitExceeded { what, limit } => {
            assert_eq!(what, "expression depth");
            assert_eq!(limit, 1024);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let binder = Binder::new().with_options(BinderOptions {
        max_tree_depth: 4,
        ..BinderOptions::default()
    });
    let c = binder.compile("x + x + x", ctx.clone()).unwrap();
    assert_eq!(c.eval_args(&[1.0.into()]).unwrap(), Value::F64(3.0));
    assert!(binder.compile("x + x + x + x + x", ctx).is_err());
}

#[test]
fn decimal_overflow_at_evaluation() {
    let binder = Binder::new();
    for src in [
        "decimal.MaxValue + 1m",
        "79228162514264337593543950335m * 2",
        "decimal.MinValue - 0.5m * 2",
        "(decimal)1e30",
    ] {
        let c = binder.compile(src, Context::new()).unwrap();
        assert_eq!(c.eval_args(&[]), Err(EvalError::Overflow("decimal")), "for {src}");
    }

    let c = binder.compile("1m / 3", Context::new()).unwrap();
    let third = BigDecimal::from_str("0.3333333333333333333333333333").unwrap();
    assert_eq!(c.eval_args(&[]).unwrap(), Value::Decimal(third));
}

#[test]
fn divide_by_zero_at_evaluation() {
    let binder = Binder::new();
    let ctx = Context::new().with_parameter("x", Ty::I32);
    let c = binder.compile("x / 0", ctx).unwrap();
    assert_eq!(c.eval_args(&[Value::I32(1)]), Err(EvalError::DivideByZero));

    let c = binder.compile("1m % 0", Context::new()).unwrap();
    assert_eq!(c.eval_args(&[]), Err(EvalError::DivideByZero));
}

#[test]
fn values_len_error() {
    let binder = Binder::new();
    let ctx = Context::new()
        .with_parameter("a", Ty::F64)
        .with_parameter("b", Ty::F64);
    let c = binder.compile("a + b", ctx).unwrap();
    match c.eval_args(&[1.0.into()]) {
        Err(EvalError::ValuesLen { expected, got }) => {
            assert_eq!(expected, 2);
            assert_eq!(got, 1);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn missing_receiver() {
    let binder = Binder::new();
    let ctx = Context::new().with_base(Ty::String);
    let c = binder.compile("Length * 2", ctx).unwrap();
    assert_eq!(c.eval_args(&[]), Err(EvalError::MissingReceiver));
    assert_eq!(c.eval(Some(&Value::str("ab")), &[]).unwrap(), Value::I32(4));
}

#[test]
fn failed_compile_does_not_affect_later_ones() {
    let binder = Binder::new();
    assert!(binder.compile("Foo + 1", Context::new()).is_err());
    let ctx = Context::new().with_parameter("Foo", Ty::I32);
    let c = binder.compile("Foo + 1", ctx).unwrap();
    assert_eq!(c.eval_args(&[Value::I32(1)]).unwrap(), Value::I32(2));
}
