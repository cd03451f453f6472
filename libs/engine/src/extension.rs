//! Extension registry
//!
//! Two optional hooks per extension: a tokenizer rule that turns an unknown
//! backslash command into a token, and an evaluator that may claim an
//! expression node before the built-ins see it. Evaluators compose in
//! registration order; returning `None` means "not handled, fall through".

use crate::ast::Expr;
use crate::error::Result;
use crate::token::Token;
use crate::value::Value;
use std::collections::HashMap;

/// Produces a token for a command name at a byte position.
pub type TokenizerRule = Box<dyn Fn(&str, usize) -> Option<Token> + Send + Sync>;

/// Recursive-evaluation callback handed to evaluator hooks.
pub type EvalCallback<'a> = &'a mut dyn FnMut(&Expr) -> Result<Value>;

/// Inspects an expression node; returns `Some(result)` to claim it.
pub type EvaluatorHook =
    Box<dyn Fn(&Expr, &HashMap<String, Value>, EvalCallback) -> Option<Result<Value>> + Send + Sync>;

#[derive(Default)]
pub struct ExtensionRegistry {
    tokenizer_rules: HashMap<String, TokenizerRule>,
    evaluators: Vec<EvaluatorHook>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tokenizer rule for `name`. Activated during tokenization
    /// when the normal catalogue does not know the command.
    pub fn register_command(&mut self, name: impl Into<String>, rule: TokenizerRule) {
        self.tokenizer_rules.insert(name.into(), rule);
    }

    /// Register an evaluator hook. Hooks run in registration order; the
    /// built-ins act as the final fallback.
    pub fn register_evaluator(&mut self, hook: EvaluatorHook) {
        self.evaluators.push(hook);
    }

    pub(crate) fn tokenize_command(&self, name: &str, position: usize) -> Option<Token> {
        self.tokenizer_rules
            .get(name)
            .and_then(|rule| rule(name, position))
    }

    pub(crate) fn evaluate(
        &self,
        expr: &Expr,
        locals: &HashMap<String, Value>,
        recurse: EvalCallback,
    ) -> Option<Result<Value>> {
        for hook in &self.evaluators {
            if let Some(result) = hook(expr, locals, &mut *recurse) {
                return Some(result);
            }
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.tokenizer_rules.is_empty() && self.evaluators.is_empty()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("tokenizer_rules", &self.tokenizer_rules.len())
            .field("evaluators", &self.evaluators.len())
            .finish()
    }
}
