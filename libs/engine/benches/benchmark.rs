//! Criterion benchmarks for the math engine.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mathtex_engine::{Engine, Value};
use std::collections::HashMap;
use std::time::Duration;

fn custom_criterion() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .warm_up_time(Duration::from_millis(100))
        .measurement_time(Duration::from_secs(1))
        .nresamples(1000)
        .noise_threshold(0.05)
}

fn bench_simple_arithmetic(c: &mut Criterion) {
    let mut engine = Engine::new();
    c.bench_function("simple_arithmetic", |b| {
        b.iter(|| engine.evaluate(black_box("1 + 2 * 3")).unwrap())
    });
}

fn bench_parse_cached(c: &mut Criterion) {
    let engine = Engine::new();
    let source = "\\sum_{i=1}^{10} \\frac{\\sin(i)}{i^2 + 1}";
    engine.parse(source).unwrap();
    c.bench_function("parse_cached", |b| {
        b.iter(|| engine.parse(black_box(source)).unwrap())
    });
}

fn bench_parse_uncached(c: &mut Criterion) {
    let engine = Engine::new();
    // Uniquify the source each round so the cache never hits
    let mut round = 0u64;
    c.bench_function("parse_uncached", |b| {
        b.iter(|| {
            round += 1;
            let source = format!("\\sqrt{{x^2 + {}}}", round);
            engine.parse(black_box(&source)).unwrap()
        })
    });
}

fn bench_evaluate_with_locals(c: &mut Criterion) {
    let mut engine = Engine::new();
    let mut locals = HashMap::new();
    locals.insert("x".to_string(), Value::Numeric(3.0));
    locals.insert("y".to_string(), Value::Numeric(4.0));
    c.bench_function("evaluate_with_locals", |b| {
        b.iter(|| {
            engine
                .evaluate_with(black_box("\\sqrt{x^2 + y^2}"), &locals)
                .unwrap()
        })
    });
}

fn bench_symbolic_differentiate(c: &mut Criterion) {
    let engine = Engine::new();
    c.bench_function("differentiate", |b| {
        b.iter(|| {
            engine
                .differentiate(black_box("x^3 \\cdot \\sin x"), "x", 1)
                .unwrap()
        })
    });
}

fn bench_simplify(c: &mut Criterion) {
    let engine = Engine::new();
    c.bench_function("simplify", |b| {
        b.iter(|| {
            engine
                .simplify(black_box("x + x + 0 \\cdot y + (\\sin(x))^2 + (\\cos(x))^2"))
                .unwrap()
        })
    });
}

criterion_group! {
    name = benches;
    config = custom_criterion();
    targets =
        bench_simple_arithmetic,
        bench_parse_cached,
        bench_parse_uncached,
        bench_evaluate_with_locals,
        bench_symbolic_differentiate,
        bench_simplify,
}
criterion_main!(benches);
