//! Identity-based simplification
//!
//! Normalisation plus the arithmetic, trigonometric, logarithmic, and power
//! identity families, applied bottom-up to a fixpoint. The loop restarts
//! after every change and stops at `MAX_REWRITE_ITERATIONS`, returning the
//! best form reached.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::Result;
use crate::symbolic::{bottom_up, normalize, Assumptions, MAX_REWRITE_ITERATIONS};

pub fn simplify(expr: &Expr) -> Result<Expr> {
    simplify_with(expr, &Assumptions::default())
}

pub fn simplify_with(expr: &Expr, assumptions: &Assumptions) -> Result<Expr> {
    let mut current = normalize(expr)?;
    for _ in 0..MAX_REWRITE_ITERATIONS {
        let rewritten = bottom_up(&current, &|e| apply_identities(e, assumptions), 0)?;
        let next = normalize(&rewritten)?;
        if next == current {
            break;
        }
        current = next;
    }
    Ok(current)
}

/// Only the logarithm family, for callers that want log rewriting without
/// the rest of the identity set.
pub fn simplify_logarithms(expr: &Expr, assumptions: &Assumptions) -> Result<Expr> {
    let mut current = normalize(expr)?;
    for _ in 0..MAX_REWRITE_ITERATIONS {
        let rewritten = bottom_up(&current, &|e| log_identities(e, assumptions), 0)?;
        let next = normalize(&rewritten)?;
        if next == current {
            break;
        }
        current = next;
    }
    Ok(current)
}

fn apply_identities(expr: &Expr, assumptions: &Assumptions) -> Result<Expr> {
    let expr = trig_identities(expr)?;
    let expr = log_identities(&expr, assumptions)?;
    let expr = power_identities(&expr)?;
    Ok(expr)
}

/// Strip one layer of negation: `-e`, a negative literal, or a product with
/// a negative numeric coefficient.
fn split_negation(expr: &Expr) -> Option<Expr> {
    match expr {
        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => Some((**operand).clone()),
        Expr::Number(n) if *n < 0.0 => Some(Expr::Number(-n)),
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => match **left {
            Expr::Number(n) if n < 0.0 => Some(if n == -1.0 {
                (**right).clone()
            } else {
                Expr::multiply(Expr::Number(-n), (**right).clone())
            }),
            _ => None,
        },
        _ => None,
    }
}

fn is_function(expr: &Expr, name: &str) -> Option<Expr> {
    match expr {
        Expr::FunctionCall {
            name: n,
            args,
            base: None,
            index: None,
        } if n == name && args.len() == 1 => Some(args[0].clone()),
        _ => None,
    }
}

/// `sin²(u)` / `cos²(u)` squares, used by the Pythagorean matcher.
fn squared_trig(expr: &Expr) -> Option<(&'static str, Expr)> {
    if let Expr::BinaryOp {
        op: BinaryOperator::Power,
        left,
        right,
    } = expr
    {
        if matches!(**right, Expr::Number(n) if n == 2.0) {
            if let Some(arg) = is_function(left, "sin") {
                return Some(("sin", arg));
            }
            if let Some(arg) = is_function(left, "cos") {
                return Some(("cos", arg));
            }
        }
    }
    None
}

fn trig_identities(expr: &Expr) -> Result<Expr> {
    // Exact values at zero
    for (name, value) in [("sin", 0.0), ("tan", 0.0)] {
        if let Some(arg) = is_function(expr, name) {
            if arg == Expr::Number(0.0) {
                return Ok(Expr::Number(value));
            }
        }
    }
    if let Some(arg) = is_function(expr, "cos") {
        if arg == Expr::Number(0.0) {
            return Ok(Expr::Number(1.0));
        }
    }

    // Parity: sin and tan are odd, cos is even
    for name in ["sin", "tan"] {
        if let Some(arg) = is_function(expr, name) {
            if let Some(inner) = split_negation(&arg) {
                return Ok(Expr::negate(Expr::call(name, inner)));
            }
        }
    }
    if let Some(arg) = is_function(expr, "cos") {
        if let Some(inner) = split_negation(&arg) {
            return Ok(Expr::call("cos", inner));
        }
    }

    // Pythagorean identity over a generic argument subtree:
    // k·sin²(u) + k·cos²(u) collapses to k
    if matches!(
        expr,
        Expr::BinaryOp {
            op: BinaryOperator::Add,
            ..
        }
    ) {
        let mut terms = Vec::new();
        flatten_add(expr, &mut terms);
        for i in 0..terms.len() {
            let (coefficient_i, core_i) = coefficient_of(&terms[i]);
            let Some(("sin", u)) = squared_trig(&core_i) else {
                continue;
            };
            for j in 0..terms.len() {
                if i == j {
                    continue;
                }
                let (coefficient_j, core_j) = coefficient_of(&terms[j]);
                if coefficient_i != coefficient_j {
                    continue;
                }
                if let Some(("cos", v)) = squared_trig(&core_j) {
                    if u == v {
                        let mut remaining: Vec<Expr> = Vec::new();
                        for (k, term) in terms.iter().enumerate() {
                            if k != i && k != j {
                                remaining.push(term.clone());
                            }
                        }
                        remaining.push(Expr::Number(coefficient_i));
                        return Ok(rebuild_add(remaining));
                    }
                }
            }
        }
    }

    Ok(expr.clone())
}

fn flatten_add(expr: &Expr, terms: &mut Vec<Expr>) {
    if let Expr::BinaryOp {
        op: BinaryOperator::Add,
        left,
        right,
    } = expr
    {
        flatten_add(left, terms);
        flatten_add(right, terms);
    } else {
        terms.push(expr.clone());
    }
}

fn coefficient_of(expr: &Expr) -> (f64, Expr) {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => match **left {
            Expr::Number(n) => (n, (**right).clone()),
            _ => (1.0, expr.clone()),
        },
        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => (-1.0, (**operand).clone()),
        _ => (1.0, expr.clone()),
    }
}

fn rebuild_add(mut terms: Vec<Expr>) -> Expr {
    match terms.len() {
        0 => Expr::Number(0.0),
        1 => terms.pop().expect("one term"),
        _ => terms
            .into_iter()
            .rev()
            .reduce(|acc, term| Expr::add(term, acc))
            .expect("non-empty"),
    }
}

fn log_identities(expr: &Expr, assumptions: &Assumptions) -> Result<Expr> {
    for name in ["ln", "log"] {
        let Some(arg) = log_argument(expr, name) else {
            continue;
        };

        if arg == Expr::Number(1.0) {
            return Ok(Expr::Number(0.0));
        }
        if name == "ln" && arg == Expr::variable("e") {
            return Ok(Expr::Number(1.0));
        }

        // log(a^b) = b·log(a) for positive a
        if let Expr::BinaryOp {
            op: BinaryOperator::Power,
            left,
            right,
        } = &arg
        {
            if assumptions.is_positive(left) {
                return Ok(Expr::multiply(
                    (**right).clone(),
                    rewrap_log(expr, name, (**left).clone()),
                ));
            }
        }

        // log(a·b) = log(a) + log(b) when both factors are positive
        if let Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } = &arg
        {
            if assumptions.is_positive(left) && assumptions.is_positive(right) {
                return Ok(Expr::add(
                    rewrap_log(expr, name, (**left).clone()),
                    rewrap_log(expr, name, (**right).clone()),
                ));
            }
        }

        // log(a/b) = log(a) - log(b) when both sides are positive
        if let Expr::BinaryOp {
            op: BinaryOperator::Divide,
            left,
            right,
        } = &arg
        {
            if assumptions.is_positive(left) && assumptions.is_positive(right) {
                return Ok(Expr::subtract(
                    rewrap_log(expr, name, (**left).clone()),
                    rewrap_log(expr, name, (**right).clone()),
                ));
            }
        }
    }
    Ok(expr.clone())
}

fn log_argument(expr: &Expr, name: &str) -> Option<Expr> {
    match expr {
        Expr::FunctionCall {
            name: n,
            args,
            index: None,
            ..
        } if n == name && args.len() == 1 => Some(args[0].clone()),
        _ => None,
    }
}

/// Rebuild a log call preserving the original base, with a new argument.
fn rewrap_log(original: &Expr, name: &str, arg: Expr) -> Expr {
    let base = match original {
        Expr::FunctionCall { base, .. } => base.clone(),
        _ => None,
    };
    Expr::FunctionCall {
        name: name.to_string(),
        args: vec![arg],
        base,
        index: None,
    }
}

fn power_identities(expr: &Expr) -> Result<Expr> {
    // √n folds when the root is exact
    if let Some(Expr::Number(n)) = is_function(expr, "sqrt") {
        if n >= 0.0 {
            let root = n.sqrt();
            if root.fract() == 0.0 {
                return Ok(Expr::Number(root));
            }
        }
    }

    // (x^a)^b = x^(a·b)
    if let Expr::BinaryOp {
        op: BinaryOperator::Power,
        left,
        right,
    } = expr
    {
        if let Expr::BinaryOp {
            op: BinaryOperator::Power,
            left: base,
            right: inner,
        } = &**left
        {
            return Ok(Expr::power(
                (**base).clone(),
                Expr::multiply((**inner).clone(), (**right).clone()),
            ));
        }
    }

    // 1/(1/x) = x
    if let Expr::BinaryOp {
        op: BinaryOperator::Divide,
        left,
        right,
    } = expr
    {
        if matches!(**left, Expr::Number(n) if n == 1.0) {
            if let Expr::BinaryOp {
                op: BinaryOperator::Divide,
                left: inner_num,
                right: inner_den,
            } = &**right
            {
                if matches!(**inner_num, Expr::Number(n) if n == 1.0) {
                    return Ok((**inner_den).clone());
                }
            }
        }
    }

    Ok(expr.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::Assumption;

    fn var(name: &str) -> Expr {
        Expr::variable(name)
    }

    #[test]
    fn trig_exact_values() {
        assert_eq!(
            simplify(&Expr::call("sin", Expr::Number(0.0))).unwrap(),
            Expr::Number(0.0)
        );
        assert_eq!(
            simplify(&Expr::call("cos", Expr::Number(0.0))).unwrap(),
            Expr::Number(1.0)
        );
    }

    #[test]
    fn trig_parity() {
        let e = Expr::call("sin", Expr::negate(var("x")));
        assert_eq!(
            simplify(&e).unwrap(),
            Expr::negate(Expr::call("sin", var("x")))
        );
        let e = Expr::call("cos", Expr::negate(var("x")));
        assert_eq!(simplify(&e).unwrap(), Expr::call("cos", var("x")));
    }

    #[test]
    fn pythagorean_identity_with_generic_argument() {
        let arg = Expr::multiply(Expr::Number(2.0), var("x"));
        let e = Expr::add(
            Expr::power(Expr::call("sin", arg.clone()), Expr::Number(2.0)),
            Expr::power(Expr::call("cos", arg), Expr::Number(2.0)),
        );
        assert_eq!(simplify(&e).unwrap(), Expr::Number(1.0));
    }

    #[test]
    fn log_of_one_and_ln_of_e() {
        assert_eq!(
            simplify(&Expr::call("log", Expr::Number(1.0))).unwrap(),
            Expr::Number(0.0)
        );
        assert_eq!(
            simplify(&Expr::call("ln", var("e"))).unwrap(),
            Expr::Number(1.0)
        );
    }

    #[test]
    fn log_power_rule_needs_positivity() {
        let e = Expr::call("ln", Expr::power(var("a"), var("b")));
        // Without the assumption nothing happens
        assert_eq!(simplify(&e).unwrap(), normalize(&e).unwrap());

        let mut assumptions = Assumptions::new();
        assumptions.assume("a", Assumption::Positive);
        let simplified = simplify_with(&e, &assumptions).unwrap();
        assert_eq!(
            simplified,
            normalize(&Expr::multiply(var("b"), Expr::call("ln", var("a")))).unwrap()
        );
    }

    #[test]
    fn log_product_rule() {
        let mut assumptions = Assumptions::new();
        assumptions.assume("a", Assumption::Positive);
        assumptions.assume("b", Assumption::Positive);
        let e = Expr::call("ln", Expr::multiply(var("a"), var("b")));
        let expected = normalize(&Expr::add(
            Expr::call("ln", var("a")),
            Expr::call("ln", var("b")),
        ))
        .unwrap();
        assert_eq!(simplify_with(&e, &assumptions).unwrap(), expected);
    }

    #[test]
    fn power_of_power_collapses() {
        let e = Expr::power(Expr::power(var("x"), var("a")), var("b"));
        let expected = normalize(&Expr::power(var("x"), Expr::multiply(var("a"), var("b"))))
            .unwrap();
        assert_eq!(simplify(&e).unwrap(), expected);
    }

    #[test]
    fn double_negation() {
        let e = Expr::negate(Expr::negate(var("x")));
        assert_eq!(simplify(&e).unwrap(), var("x"));
    }

    #[test]
    fn simplification_is_idempotent() {
        let exprs = vec![
            Expr::add(
                Expr::power(Expr::call("sin", var("x")), Expr::Number(2.0)),
                Expr::power(Expr::call("cos", var("x")), Expr::Number(2.0)),
            ),
            Expr::subtract(var("x"), Expr::negate(var("y"))),
            Expr::power(Expr::power(var("x"), Expr::Number(2.0)), Expr::Number(3.0)),
        ];
        for e in exprs {
            let once = simplify(&e).unwrap();
            let twice = simplify(&once).unwrap();
            assert_eq!(once, twice, "simplify must be idempotent for {:?}", e);
        }
    }
}
