//! Parser behavior through the public API: error positions, suggestions,
//! and the recovery mode used by `validate`.

use mathtex_engine::error::Error;
use mathtex_engine::parser::parse_source;
use mathtex_engine::{Engine, EngineOptions};

#[test]
fn errors_carry_positions() {
    let error = parse_source("1 + ").unwrap_err();
    assert!(matches!(error, Error::Parse { .. }));
    assert!(error.position().is_some());
}

#[test]
fn unknown_command_suggestion_is_within_edit_distance_two() {
    let error = parse_source("\\sqt{4}").unwrap_err();
    assert_eq!(error.suggestion(), Some("\\sqrt"));

    let error = parse_source("\\arctam(1)").unwrap_err();
    assert_eq!(error.suggestion(), Some("\\arctan"));

    // Far from everything: no suggestion
    let error = parse_source("\\zzzzzzzzz").unwrap_err();
    assert!(error.suggestion().is_none());
}

#[test]
fn missing_closer_is_reported() {
    let error = parse_source("(1 + 2").unwrap_err();
    assert!(error.message().contains(")"));
}

#[test]
fn unclosed_environment_suggests_the_end_marker() {
    let error = parse_source("\\begin{matrix} 1 & 2").unwrap_err();
    assert_eq!(error.suggestion(), Some("\\end{matrix}"));
}

#[test]
fn braceless_fraction_ambiguity() {
    let error = parse_source("\\frac123").unwrap_err();
    assert_eq!(error.suggestion(), Some("use braces"));
    // Two digits are fine
    assert!(parse_source("\\frac12").is_ok());
}

#[test]
fn empty_expression_fails() {
    assert!(parse_source("").is_err());
    assert!(parse_source("   ").is_err());
}

#[test]
fn validate_collects_sub_errors() {
    let engine = Engine::new();
    let report = engine.validate("\\foo x, \\bar y, \\baz z");
    assert!(!report.valid);
    assert!(report.message.is_some());
    assert_eq!(report.sub_errors.len(), 2);
}

#[test]
fn validate_accepts_good_input() {
    let engine = Engine::new();
    let report = engine.validate("\\sum_{i=1}^{10} i^2");
    assert!(report.valid);
    assert!(report.message.is_none());
    assert!(report.sub_errors.is_empty());
}

#[test]
fn validation_report_serializes() {
    let engine = Engine::new();
    let report = engine.validate("\\sqt{4}");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["valid"], false);
    assert!(json["suggestion"].as_str().unwrap().contains("sqrt"));
}

#[test]
fn depth_ceiling_is_configurable() {
    let engine = Engine::with_options(EngineOptions {
        max_recursion_depth: 10,
        ..Default::default()
    });
    assert!(engine.is_valid("((((x))))"));
    assert!(!engine.is_valid(&format!("{}x{}", "(".repeat(40), ")".repeat(40))));
}

#[test]
fn deep_nesting_fails_with_an_error_not_a_crash() {
    let source = format!("{}x{}", "(".repeat(2000), ")".repeat(2000));
    let error = parse_source(&source).unwrap_err();
    assert!(error.message().contains("depth"));
}
