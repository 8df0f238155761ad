use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use exprbind::{Binder, Context, Ty, Value, function};
use fasteval::{Compiler, Evaler, Parser as FeParser, Slab, eval_compiled_ref};
use foldhash::{HashMap, HashMapExt};
use rand::Rng;
use std::hint::black_box;

const VARS: [(&str, f64); 12] = [
    ("a", 2.0),
    ("b", 3.0),
    ("power", 100.0),
    ("defense", 50.0),
    ("critical_bonus", 0.5),
    ("skill_modifier", 1.2),
    ("threat", 1000.0),
    ("distance", 20.0),
    ("agility", 15.0),
    ("intelligence", 25.0),
    ("mana_pool", 500.0),
    ("haste_rating", 1.1),
];

#[function]
fn dice(min: f64, max: f64) -> f64 {
    let mut rng = rand::thread_rng();
    rng.gen_range(min..=max)
}

// String-keyed map for fasteval path
fn create_string_map() -> HashMap<String, f64> {
    let mut vars: HashMap<String, f64> = HashMap::new();
    for (name, value) in VARS {
        vars.insert(name.to_string(), value);
    }
    vars
}

fn create_context() -> (Context, Vec<Value>) {
    let mut ctx = Context::new();
    let mut values = Vec::with_capacity(VARS.len());
    for (name, value) in VARS {
        ctx = ctx.with_parameter(name, Ty::F64);
        values.push(Value::F64(value));
    }
    (ctx, values)
}

fn benchmark_eval(c: &mut Criterion) {
    let mut slab = Slab::new();
    let parser = FeParser::new();

    // (name, exprbind syntax, fasteval syntax)
    let expressions = vec![
        ("constant", "123.45", "123.45"),
        ("variable", "a", "a"),
        ("simple_add", "a + b", "a + b"),
        ("simple_mul", "a * b", "a * b"),
        (
            "multiple_same_var",
            "a + a + a + a + a + a + a + a + a + a * a * a * a",
            "a + a + a + a + a + a + a + a + a + a * a * a * a",
        ),
        ("complex_arithmetic", "(a * 10 + b * 20) / 2.0", "(a * 10 + b * 20) / 2.0"),
        ("builtin_func_max", "System.Math.Max(a, b)", "max(a, b)"),
        ("abs_bars", "|a - b| * power", "abs(a - b) * power"),
        ("simple_dice", "Functions.dice(1, 6)", "dice(1, 6)"),
        ("dice_with_op", "Functions.dice(1, 20) + defense", "dice(1, 20) + defense"),
        (
            "damage_calculation",
            "(power - defense) * (1.0 + critical_bonus) * skill_modifier",
            "(power - defense) * (1.0 + critical_bonus) * skill_modifier",
        ),
        (
            "targeting_priority",
            "(threat * 0.8) - (distance * 0.2) + agility * 100.0",
            "(threat * 0.8) - (distance * 0.2) + agility * 100.0",
        ),
        (
            "full_combat_formula",
            "((power * skill_modifier) - (defense / 2.0)) * (1.0 + critical_bonus) + (threat / System.Math.Max(1, distance))",
            "((power * skill_modifier) - (defense / 2.0)) * (1.0 + critical_bonus) + (threat / max(1, distance))",
        ),
        (
            "mmo_calc",
            "System.Math.Max(0, ((power / defense) * (skill_modifier + intelligence / 100.0) + a - b) * haste_rating - mana_pool / 500)",
            "max(0, ((power / defense) * (skill_modifier + intelligence / 100.0) + a - b) * haste_rating - mana_pool / 500)",
        ),
    ];

    let binder = Binder::new();
    let (ctx, values) = create_context();

    for (name, ours, theirs) in expressions {
        let compiled = parser
            .parse(theirs, &mut slab.ps)
            .unwrap()
            .from(&slab.ps)
            .compile(&slab.ps, &mut slab.cs);
        let vars = create_string_map();

        let mut ns = move |name: &str, args: Vec<f64>| -> Option<f64> {
            match name {
                "dice" => {
                    if args.len() != 2 || args[0] > args[1] {
                        return Some(f64::NAN);
                    }
                    let mut rng = rand::thread_rng();
                    Some(rng.gen_range(args[0]..=args[1]))
                }
                _ => vars.get(name).copied(),
            }
        };

        let mut eval = || -> Result<f64, fasteval::Error> {
            Ok(eval_compiled_ref!(&compiled, &slab, &mut ns))
        };

        println!("fasteval result: {}", eval().unwrap_or_else(|e| panic!("Error evaluating expression: {}", e)));
        c.bench_function(&format!("eval_{}", name), |b| {
            b.iter(|| {
                let _ = black_box(eval().unwrap_or_else(|e| panic!("Error evaluating expression: {}", e)));
            });
        });

        let bound = binder.compile(ours, ctx.clone()).unwrap();
        println!("exprbind result: {:?}", bound.eval_args(&values).unwrap());
        c.bench_function(&format!("exprbind_eval_{}", name), |b| {
            b.iter(|| {
                let _ = black_box(bound.eval_args(&values).unwrap());
            });
        });

        c.bench_function(&format!("exprbind_compile_{}", name), |b| {
            b.iter_batched(
                || ctx.clone(),
                |ctx| black_box(binder.compile(ours, ctx).unwrap()),
                BatchSize::SmallInput,
            );
        });
    }
}

fn benchmark_rebind(c: &mut Criterion) {
    let binder = Binder::new();
    let (ctx, _) = create_context();
    let prepared = binder
        .prepare("(power - defense) * (1.0 + critical_bonus) * skill_modifier", &ctx)
        .unwrap();
    binder.bind(&prepared, &ctx).unwrap();
    c.bench_function("exprbind_rebind_cached", |b| {
        b.iter(|| black_box(binder.bind(&prepared, &ctx).unwrap()));
    });
}

criterion_group!(benches, benchmark_eval, benchmark_rebind);
criterion_main!(benches);
