//! Property-based tests, QuickCheck plus manual case tables.

use mathtex_engine::export::{json, latex, mathml, sympy};
use mathtex_engine::parser::parse_source;
use mathtex_engine::{Engine, EngineOptions, Value};
use quickcheck::{QuickCheck, TestResult};

fn eval_source(source: &str) -> Value {
    Engine::new().evaluate(source).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}

#[test]
fn prop_addition_commutative() {
    fn prop(a: i32, b: i32) -> TestResult {
        let left = eval_source(&format!("{} + {}", a, b)).as_numeric().unwrap();
        let right = eval_source(&format!("{} + {}", b, a)).as_numeric().unwrap();
        TestResult::from_bool(close(left, right))
    }
    QuickCheck::new()
        .tests(50)
        .quickcheck(prop as fn(i32, i32) -> TestResult);
}

#[test]
fn prop_multiplication_commutative() {
    fn prop(a: i32, b: i32) -> TestResult {
        let left = eval_source(&format!("{} * {}", a, b)).as_numeric().unwrap();
        let right = eval_source(&format!("{} * {}", b, a)).as_numeric().unwrap();
        TestResult::from_bool(close(left, right))
    }
    QuickCheck::new()
        .tests(50)
        .quickcheck(prop as fn(i32, i32) -> TestResult);
}

#[test]
fn prop_addition_associative() {
    // Manual cases keep the tolerance story simple
    let cases = [
        (0.5, 1.25, -3.0),
        (1e6, -1e6, 0.125),
        (2.0, 3.0, 4.0),
        (-7.5, 0.25, 100.0),
    ];
    for (a, b, c) in cases {
        let left = eval_source(&format!("({} + {}) + {}", a, b, c))
            .as_numeric()
            .unwrap();
        let right = eval_source(&format!("{} + ({} + {})", a, b, c))
            .as_numeric()
            .unwrap();
        assert!(close(left, right), "({} + {}) + {}", a, b, c);
    }
}

#[test]
fn prop_round_trip_of_generated_sums() {
    fn prop(terms: Vec<u8>) -> TestResult {
        if terms.is_empty() || terms.len() > 20 {
            return TestResult::discard();
        }
        let source = terms
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(" + ");
        let parsed = parse_source(&source).unwrap();
        let printed = latex::to_latex(&parsed).unwrap();
        let reparsed = parse_source(&printed).unwrap();
        TestResult::from_bool(parsed == reparsed)
    }
    QuickCheck::new()
        .tests(50)
        .quickcheck(prop as fn(Vec<u8>) -> TestResult);
}

#[test]
fn depth_safety_across_the_pipeline() {
    let source = format!("{}x{}", "(".repeat(1000), ")".repeat(1000));
    let engine = Engine::new();
    // Parse fails with a structured error, not a stack overflow
    let report = engine.validate(&source);
    assert!(!report.valid);

    // A programmatically deep tree makes every visitor fail cleanly too
    let mut expr = mathtex_engine::Expr::variable("x");
    for _ in 0..2000 {
        expr = mathtex_engine::Expr::AbsoluteValue(Box::new(expr));
    }
    assert!(latex::to_latex(&expr).is_err());
    assert!(mathml::to_mathml(&expr).is_err());
    assert!(json::to_json(&expr).is_err());
    assert!(sympy::to_sympy(&expr).is_err());
    assert!(Engine::new().evaluate_parsed(&expr).is_err());
}

#[test]
fn real_only_mode_never_yields_complex() {
    let sources = [
        "\\sqrt{-1}",
        "\\sqrt{-4} + 1",
        "(-8)^{0.5}",
        "\\ln{(-1)}",
        "\\sqrt[4]{-16}",
        "\\arcsin(2)",
    ];
    for source in sources {
        let mut engine = Engine::with_options(EngineOptions {
            real_only: true,
            ..Default::default()
        });
        let value = engine.evaluate(source).unwrap();
        assert!(
            !value.is_complex(),
            "real-only evaluation of {} produced {:?}",
            source,
            value
        );
    }
}

#[test]
fn default_mode_matches_real_only_on_real_results() {
    let sources = ["2 + 2", "\\sin(1)", "\\sqrt{9}", "2^{10}"];
    for source in sources {
        let default = Engine::new().evaluate(source).unwrap();
        let real_only = Engine::with_options(EngineOptions {
            real_only: true,
            ..Default::default()
        })
        .evaluate(source)
        .unwrap();
        assert_eq!(default, real_only, "modes disagree on {}", source);
    }
}

#[test]
fn mathml_tags_always_balance() {
    let sources = [
        "x + 1",
        "\\frac{a}{b}",
        "\\sum_{i=1}^{n} i",
        "\\begin{matrix} 1 & 2 \\\\ 3 & 4 \\end{matrix}",
        "\\sqrt[3]{x}",
    ];
    for source in sources {
        let expr = parse_source(source).unwrap();
        let xml = mathml::to_mathml_document(&expr).unwrap();
        let opens = xml.matches('<').count();
        let closes = xml.matches("</").count();
        let self_contained = xml.matches("/>").count();
        // Every open tag has a matching close (or is self-closing)
        assert_eq!(opens - closes - self_contained, closes, "unbalanced: {}", xml);
    }
}
