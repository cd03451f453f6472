//! Main engine facade
//!
//! Bundles the pipeline behind convenience methods: parse with a bounded LRU
//! cache, evaluate against the persistent global environment, validate with
//! error recovery, and the symbolic entry points. The cache sits behind a
//! mutex, so concurrent read-only evaluation against a stable environment is
//! safe; concurrent mutation of the global environment is not supported.

use crate::ast::Expr;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::eval::{EvalOptions, Evaluator};
use crate::extension::ExtensionRegistry;
use crate::lexer::{Lexer, LexerOptions};
use crate::parser::{Parser, ParserOptions, DEFAULT_MAX_DEPTH};
use crate::symbolic::{self, Assumption, Assumptions};
use crate::value::Value;
use lru::LruCache;
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Inputs longer than this bypass the parsed-expression cache.
pub const CACHE_MAX_SOURCE_LENGTH: usize = 5000;

/// Constructor flags for the engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Depth ceiling shared by the parser, evaluator, and visitors.
    pub max_recursion_depth: usize,
    /// Parsed-expression cache capacity in entries.
    pub parsed_expression_cache_size: usize,
    /// Replace would-be complex results with NaN.
    pub real_only: bool,
    /// Fold adjacent primaries into multiplication.
    pub allow_implicit_multiplication: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_DEPTH,
            parsed_expression_cache_size: 128,
            real_only: false,
            allow_implicit_multiplication: true,
        }
    }
}

/// Outcome of `validate`: the first failure plus any further errors found by
/// the parser's recovery mode.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub message: Option<String>,
    pub position: Option<usize>,
    pub suggestion: Option<String>,
    pub sub_errors: Vec<SubError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubError {
    pub message: String,
    pub position: Option<usize>,
    pub suggestion: Option<String>,
}

impl SubError {
    fn from_error(error: &Error) -> Self {
        Self {
            message: error.message().to_string(),
            position: error.position(),
            suggestion: error.suggestion().map(str::to_string),
        }
    }
}

/// The engine facade.
pub struct Engine {
    options: EngineOptions,
    global: Environment,
    assumptions: Assumptions,
    extensions: Option<ExtensionRegistry>,
    cache: Mutex<LruCache<String, Arc<Expr>>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    pub fn with_options(options: EngineOptions) -> Self {
        let capacity = NonZeroUsize::new(options.parsed_expression_cache_size.max(1))
            .expect("max(1) is non-zero");
        Self {
            options,
            global: Environment::new(),
            assumptions: Assumptions::new(),
            extensions: None,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn with_extensions(options: EngineOptions, extensions: ExtensionRegistry) -> Self {
        let mut engine = Self::with_options(options);
        engine.extensions = Some(extensions);
        engine
    }

    // ------------------------------------------------------------------
    // Configuration accessors
    // ------------------------------------------------------------------

    pub fn max_recursion_depth(&self) -> usize {
        self.options.max_recursion_depth
    }

    pub fn parsed_expression_cache_size(&self) -> usize {
        self.options.parsed_expression_cache_size
    }

    pub fn real_only(&self) -> bool {
        self.options.real_only
    }

    pub fn allow_implicit_multiplication(&self) -> bool {
        self.options.allow_implicit_multiplication
    }

    fn lexer_options(&self) -> LexerOptions {
        LexerOptions {
            single_letter_identifiers: self.options.allow_implicit_multiplication,
            ..Default::default()
        }
    }

    fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            max_depth: self.options.max_recursion_depth,
            implicit_multiplication: self.options.allow_implicit_multiplication,
        }
    }

    fn eval_options(&self) -> EvalOptions {
        EvalOptions {
            real_only: self.options.real_only,
            max_depth: self.options.max_recursion_depth,
            ..Default::default()
        }
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    /// Parse a source string, consulting the bounded LRU cache. Entries are
    /// keyed by the raw source; inputs over `CACHE_MAX_SOURCE_LENGTH` bytes
    /// bypass the cache.
    pub fn parse(&self, source: &str) -> Result<Arc<Expr>> {
        if source.len() > CACHE_MAX_SOURCE_LENGTH {
            return self.parse_uncached(source).map(Arc::new);
        }
        if let Some(expr) = self
            .cache
            .lock()
            .expect("cache lock poisoned")
            .get(source)
        {
            return Ok(Arc::clone(expr));
        }
        let expr = Arc::new(self.parse_uncached(source)?);
        self.cache
            .lock()
            .expect("cache lock poisoned")
            .put(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    fn parse_uncached(&self, source: &str) -> Result<Expr> {
        let tokens =
            Lexer::tokenize_with(source, self.lexer_options(), self.extensions.as_ref())?;
        Parser::new(tokens, self.parser_options()).parse()
    }

    /// Entries currently held in the parse cache.
    pub fn cached_expression_count(&self) -> usize {
        self.cache.lock().expect("cache lock poisoned").len()
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    pub fn evaluate(&mut self, source: &str) -> Result<Value> {
        self.evaluate_with(source, &HashMap::new())
    }

    pub fn evaluate_with(
        &mut self,
        source: &str,
        locals: &HashMap<String, Value>,
    ) -> Result<Value> {
        let expr = self.parse(source)?;
        self.evaluate_parsed_with(&expr, locals)
    }

    pub fn evaluate_parsed(&mut self, expr: &Expr) -> Result<Value> {
        self.evaluate_parsed_with(expr, &HashMap::new())
    }

    pub fn evaluate_parsed_with(
        &mut self,
        expr: &Expr,
        locals: &HashMap<String, Value>,
    ) -> Result<Value> {
        let options = self.eval_options();
        let mut evaluator =
            Evaluator::with_extensions(&mut self.global, options, self.extensions.as_ref());
        evaluator.evaluate(expr, locals)
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    pub fn validate(&self, source: &str) -> ValidationReport {
        let tokens =
            match Lexer::tokenize_with(source, self.lexer_options(), self.extensions.as_ref()) {
                Ok(tokens) => tokens,
                Err(error) => {
                    return ValidationReport {
                        valid: false,
                        message: Some(error.message().to_string()),
                        position: error.position(),
                        suggestion: None,
                        sub_errors: Vec::new(),
                    }
                }
            };
        let mut parser = Parser::new(tokens, self.parser_options());
        let (expr, errors) = parser.parse_with_recovery();
        if errors.is_empty() && expr.is_some() {
            return ValidationReport {
                valid: true,
                message: None,
                position: None,
                suggestion: None,
                sub_errors: Vec::new(),
            };
        }
        let first = errors.first();
        ValidationReport {
            valid: false,
            message: first.map(|e| e.message().to_string()).or_else(|| {
                Some("empty expression".to_string())
            }),
            position: first.and_then(|e| e.position()),
            suggestion: first.and_then(|e| e.suggestion().map(str::to_string)),
            sub_errors: errors.iter().skip(1).map(SubError::from_error).collect(),
        }
    }

    pub fn is_valid(&self, source: &str) -> bool {
        self.validate(source).valid
    }

    // ------------------------------------------------------------------
    // Symbolic entry points
    // ------------------------------------------------------------------

    pub fn differentiate(&self, source: &str, variable: &str, order: u32) -> Result<Expr> {
        let expr = self.parse(source)?;
        self.differentiate_parsed(&expr, variable, order)
    }

    pub fn differentiate_parsed(
        &self,
        expr: &Expr,
        variable: &str,
        order: u32,
    ) -> Result<Expr> {
        let inlined = self.inline_user_functions(expr)?;
        symbolic::differentiate_n(&inlined, variable, order)
    }

    pub fn integrate(&self, source: &str, variable: &str) -> Result<Expr> {
        let expr = self.parse(source)?;
        self.integrate_parsed(&expr, variable)
    }

    pub fn integrate_parsed(&self, expr: &Expr, variable: &str) -> Result<Expr> {
        let inlined = self.inline_user_functions(expr)?;
        symbolic::integrate(&inlined, variable)
    }

    pub fn simplify(&self, source: &str) -> Result<Expr> {
        let expr = self.parse(source)?;
        symbolic::simplify_with(&expr, &self.assumptions)
    }

    pub fn expand(&self, source: &str) -> Result<Expr> {
        let expr = self.parse(source)?;
        symbolic::expand(&expr)
    }

    pub fn expand_trig(&self, source: &str) -> Result<Expr> {
        let expr = self.parse(source)?;
        symbolic::expand_trig(&expr)
    }

    pub fn factor(&self, source: &str) -> Result<Expr> {
        let expr = self.parse(source)?;
        symbolic::factor(&expr)
    }

    pub fn solve(&self, source: &str, variable: &str) -> Result<Vec<Expr>> {
        let expr = self.parse(source)?;
        symbolic::solve(&expr, variable, self.options.real_only)
    }

    fn inline_user_functions(&self, expr: &Expr) -> Result<Expr> {
        symbolic::inline_user_functions(expr, &|name| match self.global.get(name) {
            Some(Value::Function(f)) => Some(f.clone()),
            _ => None,
        })
    }

    // ------------------------------------------------------------------
    // Environment and assumptions
    // ------------------------------------------------------------------

    /// Drop every user binding. Built-in constants stay resolvable.
    pub fn clear_environment(&mut self) {
        self.global.clear();
    }

    pub fn environment(&self) -> &Environment {
        &self.global
    }

    /// Attach an assumption tag to a variable name. Consumed by the
    /// symbolic engine only; evaluation ignores assumptions.
    pub fn assume(&mut self, variable: impl Into<String>, tag: Assumption) {
        self.assumptions.assume(variable, tag);
    }

    pub fn clear_assumptions(&mut self) {
        self.assumptions.clear();
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluate_uses_the_cache() {
        let mut engine = Engine::new();
        assert_eq!(engine.cached_expression_count(), 0);
        engine.evaluate("1 + 2").unwrap();
        assert_eq!(engine.cached_expression_count(), 1);
        engine.evaluate("1 + 2").unwrap();
        assert_eq!(engine.cached_expression_count(), 1);
    }

    #[test]
    fn cache_capacity_evicts_least_recent() {
        let mut engine = Engine::with_options(EngineOptions {
            parsed_expression_cache_size: 2,
            ..Default::default()
        });
        engine.evaluate("1").unwrap();
        engine.evaluate("2").unwrap();
        engine.evaluate("3").unwrap();
        assert_eq!(engine.cached_expression_count(), 2);
    }

    #[test]
    fn long_inputs_bypass_the_cache() {
        let engine = Engine::new();
        let long = format!("1 + {}", "0 + ".repeat(1500)) + "2";
        assert!(long.len() > CACHE_MAX_SOURCE_LENGTH);
        engine.parse(&long).unwrap();
        assert_eq!(engine.cached_expression_count(), 0);
    }

    #[test]
    fn assignment_persists_and_clears() {
        let mut engine = Engine::new();
        engine.evaluate("let x = 5").unwrap();
        assert_eq!(engine.evaluate("x + 1").unwrap(), Value::Numeric(6.0));
        engine.clear_environment();
        assert!(engine.evaluate("x").is_err());
        // Constants survive the clear
        assert!(engine.evaluate("\\pi").is_ok());
    }

    #[test]
    fn user_function_definition_and_call() {
        let mut engine = Engine::new();
        engine.evaluate("f(x) = x^2 + 1").unwrap();
        assert_eq!(engine.evaluate("f(3)").unwrap(), Value::Numeric(10.0));
    }

    #[test]
    fn validation_report_shape() {
        let engine = Engine::new();
        assert!(engine.is_valid("1 + 2"));
        let report = engine.validate("\\frob x");
        assert!(!report.valid);
        assert!(report.message.is_some());
        assert!(report.position.is_some());
    }

    #[test]
    fn differentiate_textual() {
        let mut engine = Engine::new();
        let derivative = engine.differentiate("x^3", "x", 1).unwrap();
        let mut locals = HashMap::new();
        locals.insert("x".to_string(), Value::Numeric(2.0));
        let value = engine.evaluate_parsed_with(&derivative, &locals).unwrap();
        assert_eq!(value, Value::Numeric(12.0));
    }

    #[test]
    fn differentiate_inlines_user_functions() {
        let mut engine = Engine::new();
        engine.evaluate("g(x) = x^2").unwrap();
        let derivative = engine.differentiate("g(x)", "x", 1).unwrap();
        let mut locals = HashMap::new();
        locals.insert("x".to_string(), Value::Numeric(4.0));
        let value = engine.evaluate_parsed_with(&derivative, &locals).unwrap();
        assert_eq!(value, Value::Numeric(8.0));
    }

    #[test]
    fn real_only_mode_never_returns_complex() {
        let mut engine = Engine::with_options(EngineOptions {
            real_only: true,
            ..Default::default()
        });
        match engine.evaluate("\\sqrt{-1}").unwrap() {
            Value::Numeric(n) => assert!(n.is_nan()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn implicit_multiplication_can_be_disabled() {
        let mut engine = Engine::with_options(EngineOptions {
            allow_implicit_multiplication: false,
            ..Default::default()
        });
        // `xy` is now one variable name
        let mut locals = HashMap::new();
        locals.insert("xy".to_string(), Value::Numeric(7.0));
        assert_eq!(
            engine.evaluate_with("xy", &locals).unwrap(),
            Value::Numeric(7.0)
        );
    }
}
