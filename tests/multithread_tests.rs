use std::sync::Arc;
use std::thread;

use exprbind::{Binder, CompileError, Context, Ty, Value};

#[test]
fn bound_expression_is_send_and_sync() -> Result<(), CompileError> {
    let binder = Binder::new();
    let ctx = Context::new()
        .with_parameter("a", Ty::F64)
        .with_parameter("b", Ty::F64);
    let compiled = binder.compile("a + b * 2", ctx)?;

    // Only compiles if BoundExpression is Send + Sync.
    let shared_expr = Arc::new(compiled);

    let mut handles = vec![];
    for i in 0..10 {
        let expr_clone = Arc::clone(&shared_expr);
        let handle = thread::spawn(move || {
            let a = i as f64;
            let b = (i * 2) as f64;
            for _ in 0..100 {
                let result = expr_clone.eval_args(&[a.into(), b.into()]).unwrap();
                assert_eq!(result, Value::F64(a + b * 2.0));
            }
        });
        handles.push(handle);
    }
    for handle in handles {
        handle.join().unwrap();
    }
    Ok(())
}

#[test]
fn one_binder_compiles_from_many_threads() {
    let binder = Binder::new();
    thread::scope(|s| {
        for i in 0..8i32 {
            let binder = &binder;
            s.spawn(move || {
                let ctx = Context::new().with_parameter("x", Ty::I32);
                let src = format!("x * {} + System.Math.Abs(x - {})", i, i);
                let compiled = binder.compile(&src, ctx).unwrap();
                let out = compiled.eval_args(&[Value::I32(3)]).unwrap();
                assert_eq!(out, Value::I32(3 * i + (3 - i).abs()));
            });
        }
    });
}

#[test]
fn prepared_expr_moves_between_threads() {
    let binder = Binder::new();
    let ctx = Context::new().with_parameter("n", Ty::I64);
    let prepared = binder.prepare("n % 7 + 1", &ctx).unwrap();
    let bound = thread::scope(|s| {
        let binder = &binder;
        s.spawn(move || binder.bind(&prepared, &ctx).unwrap())
            .join()
            .unwrap()
    });
    assert_eq!(bound.eval_args(&[Value::I64(20)]).unwrap(), Value::I64(7));
}
