//! Symbolic rewrite engine
//!
//! Tree-to-tree transformers sharing one discipline: every pass is pure,
//! idempotent up to structural normalisation, carries an explicit
//! recursion-depth counter, and caps rewrite iterations so no rule chain can
//! loop forever. A pass that reaches the iteration cap terminates with the
//! best form reached.

mod derivative;
mod expand;
mod factor;
mod integrate;
mod normalize;
mod simplify;
mod solve;

pub use derivative::differentiate_with_depth;
pub use expand::{expand, expand_trig};
pub use factor::factor;
pub use integrate::integrate;
pub use normalize::normalize;
pub use simplify::{simplify, simplify_logarithms, simplify_with};
pub use solve::solve;

use crate::ast::Expr;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Rewrite-iteration cap shared by the fixpoint loops.
pub const MAX_REWRITE_ITERATIONS: usize = 100;

/// Recursion-depth ceiling for the symbolic passes.
pub const MAX_SYMBOLIC_DEPTH: usize = crate::parser::DEFAULT_MAX_DEPTH;

pub(crate) fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_SYMBOLIC_DEPTH {
        return Err(Error::evaluation(format!(
            "symbolic rewriting exceeds the depth ceiling of {}",
            MAX_SYMBOLIC_DEPTH
        )));
    }
    Ok(())
}

/// Assumption tags attached to variable names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assumption {
    Positive,
    Negative,
    Real,
    Integer,
    Nonzero,
}

impl Assumption {
    pub fn parse(tag: &str) -> Option<Assumption> {
        match tag {
            "positive" => Some(Assumption::Positive),
            "negative" => Some(Assumption::Negative),
            "real" => Some(Assumption::Real),
            "integer" => Some(Assumption::Integer),
            "nonzero" => Some(Assumption::Nonzero),
            _ => None,
        }
    }
}

/// Per-variable assumption sets, consumed only by the symbolic engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assumptions {
    tags: HashMap<String, BTreeSet<Assumption>>,
}

impl Assumptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assume(&mut self, variable: impl Into<String>, tag: Assumption) {
        self.tags.entry(variable.into()).or_default().insert(tag);
    }

    pub fn has(&self, variable: &str, tag: Assumption) -> bool {
        self.tags
            .get(variable)
            .map(|tags| tags.contains(&tag))
            .unwrap_or(false)
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }

    /// Whether an expression is known positive: a positive literal, a
    /// positively-tagged variable, or `e`/`pi`.
    pub fn is_positive(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Number(n) => *n > 0.0,
            Expr::Variable(name) => {
                matches!(name.as_str(), "e" | "pi") || self.has(name, Assumption::Positive)
            }
            _ => false,
        }
    }
}

/// First-order symbolic derivative.
pub fn differentiate(expr: &Expr, variable: &str) -> Result<Expr> {
    differentiate_n(expr, variable, 1)
}

/// `order`-th symbolic derivative: the first-order pass applied repeatedly.
/// Orders outside 1..=10 are rejected before any work happens.
pub fn differentiate_n(expr: &Expr, variable: &str, order: u32) -> Result<Expr> {
    if order == 0 || order > crate::eval::MAX_DERIVATIVE_ORDER {
        return Err(Error::evaluation(format!(
            "derivative order {} is outside the supported range 1..={}",
            order,
            crate::eval::MAX_DERIVATIVE_ORDER
        )));
    }
    let mut current = expr.clone();
    for _ in 0..order {
        current = differentiate_with_depth(&current, variable, 0)?;
        current = normalize(&current)?;
    }
    Ok(current)
}

/// Expand calls to user-defined functions in place, so the differentiator
/// and integrator see the bodies. `resolve` looks a name up in whatever
/// environment the caller owns. Runs to a fixpoint with the usual iteration
/// cap; a self-recursive definition simply stops expanding.
pub fn inline_user_functions(
    expr: &Expr,
    resolve: &dyn Fn(&str) -> Option<crate::value::FunctionValue>,
) -> Result<Expr> {
    let mut current = expr.clone();
    for _ in 0..MAX_REWRITE_ITERATIONS {
        let next = bottom_up(
            &current,
            &|e| {
                match e {
                    // `f(a, b)` call form
                    Expr::FunctionCall {
                        name,
                        args,
                        base: None,
                        index: None,
                    } => {
                        if let Some(function) = resolve(name) {
                            if function.params.len() == args.len() {
                                let mut body = function.body.clone();
                                for (param, arg) in function.params.iter().zip(args) {
                                    body = substitute(&body, param, arg)?;
                                }
                                return Ok(body);
                            }
                        }
                        Ok(e.clone())
                    }
                    // `f(x)` parses as implicit multiplication
                    Expr::BinaryOp {
                        op: crate::ast::BinaryOperator::Multiply,
                        left,
                        right,
                    } => {
                        if let Expr::Variable(name) = &**left {
                            if let Some(function) = resolve(name) {
                                if function.params.len() == 1 {
                                    return substitute(
                                        &function.body,
                                        &function.params[0],
                                        right,
                                    );
                                }
                            }
                        }
                        Ok(e.clone())
                    }
                    _ => Ok(e.clone()),
                }
            },
            0,
        )?;
        if next == current {
            break;
        }
        current = next;
    }
    Ok(current)
}

/// Capture-naive substitution of a variable by a replacement tree.
pub fn substitute(expr: &Expr, variable: &str, replacement: &Expr) -> Result<Expr> {
    bottom_up(
        expr,
        &|e| match e {
            Expr::Variable(name) if name == variable => Ok(replacement.clone()),
            _ => Ok(e.clone()),
        },
        0,
    )
}

/// Rebuild children first, then let `f` rewrite the node. Depth-counted.
pub(crate) fn bottom_up(
    expr: &Expr,
    f: &dyn Fn(&Expr) -> Result<Expr>,
    depth: usize,
) -> Result<Expr> {
    check_depth(depth)?;
    let rebuilt = map_children(expr, &mut |child| bottom_up(child, f, depth + 1))?;
    f(&rebuilt)
}

/// Rebuild a node with every direct child passed through `g`.
pub(crate) fn map_children(
    expr: &Expr,
    g: &mut dyn FnMut(&Expr) -> Result<Expr>,
) -> Result<Expr> {
    let mapped = match expr {
        Expr::Number(_) | Expr::Variable(_) => expr.clone(),
        Expr::UnaryOp { op, operand } => Expr::UnaryOp {
            op: *op,
            operand: Box::new(g(operand)?),
        },
        Expr::BinaryOp { op, left, right } => Expr::BinaryOp {
            op: *op,
            left: Box::new(g(left)?),
            right: Box::new(g(right)?),
        },
        Expr::FunctionCall {
            name,
            args,
            base,
            index,
        } => Expr::FunctionCall {
            name: name.clone(),
            args: args.iter().map(&mut *g).collect::<Result<_>>()?,
            base: base.as_deref().map(&mut *g).transpose()?.map(Box::new),
            index: index.as_deref().map(&mut *g).transpose()?.map(Box::new),
        },
        Expr::AbsoluteValue(inner) => Expr::AbsoluteValue(Box::new(g(inner)?)),
        Expr::Comparison { op, left, right } => Expr::Comparison {
            op: *op,
            left: Box::new(g(left)?),
            right: Box::new(g(right)?),
        },
        Expr::ChainedComparison {
            operands,
            operators,
        } => Expr::ChainedComparison {
            operands: operands.iter().map(&mut *g).collect::<Result<_>>()?,
            operators: operators.clone(),
        },
        Expr::LogicOp { op, operands } => Expr::LogicOp {
            op: *op,
            operands: operands.iter().map(&mut *g).collect::<Result<_>>()?,
        },
        Expr::Conditional { value, condition } => Expr::Conditional {
            value: Box::new(g(value)?),
            condition: Box::new(g(condition)?),
        },
        Expr::Piecewise { cases } => Expr::Piecewise {
            cases: cases
                .iter()
                .map(|case| {
                    Ok(crate::ast::PiecewiseCase {
                        value: g(&case.value)?,
                        condition: case.condition.as_ref().map(&mut *g).transpose()?,
                    })
                })
                .collect::<Result<_>>()?,
        },
        Expr::Sum {
            index,
            lower,
            upper,
            body,
        } => Expr::Sum {
            index: index.clone(),
            lower: Box::new(g(lower)?),
            upper: Box::new(g(upper)?),
            body: Box::new(g(body)?),
        },
        Expr::Product {
            index,
            lower,
            upper,
            body,
        } => Expr::Product {
            index: index.clone(),
            lower: Box::new(g(lower)?),
            upper: Box::new(g(upper)?),
            body: Box::new(g(body)?),
        },
        Expr::Limit {
            variable,
            target,
            body,
            side,
        } => Expr::Limit {
            variable: variable.clone(),
            target: Box::new(g(target)?),
            body: Box::new(g(body)?),
            side: *side,
        },
        Expr::Integral {
            variable,
            lower,
            upper,
            body,
            closed,
        } => Expr::Integral {
            variable: variable.clone(),
            lower: lower.as_deref().map(&mut *g).transpose()?.map(Box::new),
            upper: upper.as_deref().map(&mut *g).transpose()?.map(Box::new),
            body: Box::new(g(body)?),
            closed: *closed,
        },
        Expr::MultiIntegral {
            order,
            variables,
            lower,
            upper,
            body,
        } => Expr::MultiIntegral {
            order: *order,
            variables: variables.clone(),
            lower: lower.as_deref().map(&mut *g).transpose()?.map(Box::new),
            upper: upper.as_deref().map(&mut *g).transpose()?.map(Box::new),
            body: Box::new(g(body)?),
        },
        Expr::Derivative {
            variable,
            order,
            body,
        } => Expr::Derivative {
            variable: variable.clone(),
            order: *order,
            body: Box::new(g(body)?),
        },
        Expr::PartialDerivative {
            variable,
            order,
            body,
        } => Expr::PartialDerivative {
            variable: variable.clone(),
            order: *order,
            body: Box::new(g(body)?),
        },
        Expr::Gradient(body) => Expr::Gradient(Box::new(g(body)?)),
        Expr::Binom { n, k } => Expr::Binom {
            n: Box::new(g(n)?),
            k: Box::new(g(k)?),
        },
        Expr::Matrix { rows, bracket } => Expr::Matrix {
            rows: rows
                .iter()
                .map(|row| row.iter().map(&mut *g).collect::<Result<_>>())
                .collect::<Result<_>>()?,
            bracket: *bracket,
        },
        Expr::Vector { components, unit } => Expr::Vector {
            components: components.iter().map(&mut *g).collect::<Result<_>>()?,
            unit: *unit,
        },
        Expr::Assignment { name, value } => Expr::Assignment {
            name: name.clone(),
            value: Box::new(g(value)?),
        },
        Expr::FunctionDefinition { name, params, body } => Expr::FunctionDefinition {
            name: name.clone(),
            params: params.clone(),
            body: Box::new(g(body)?),
        },
    };
    Ok(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_replaces_free_occurrences() {
        let expr = Expr::add(Expr::variable("x"), Expr::variable("y"));
        let result = substitute(&expr, "x", &Expr::Number(2.0)).unwrap();
        assert_eq!(result, Expr::add(Expr::Number(2.0), Expr::variable("y")));
    }

    #[test]
    fn assumptions_gate_positivity() {
        let mut assumptions = Assumptions::new();
        assert!(!assumptions.is_positive(&Expr::variable("a")));
        assumptions.assume("a", Assumption::Positive);
        assert!(assumptions.is_positive(&Expr::variable("a")));
        assert!(assumptions.is_positive(&Expr::Number(3.0)));
        assert!(assumptions.is_positive(&Expr::variable("pi")));
    }
}
