//! Canonicalisation pass
//!
//! Flattens nested additions and multiplications, folds numeric constants,
//! absorbs negation into literals, collects like terms and powers, and
//! orders commutative operands by a stable key (numbers first, then
//! variables alphabetically, then complex subtrees by their debug
//! rendering). Chains rebuild right-leaning.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::Result;
use crate::symbolic::check_depth;
use smallvec::SmallVec;

type Terms = SmallVec<[(f64, Expr); 4]>;
type Factors = SmallVec<[(Expr, Expr); 4]>;

pub fn normalize(expr: &Expr) -> Result<Expr> {
    normalize_depth(expr, 0)
}

pub(crate) fn normalize_depth(expr: &Expr, depth: usize) -> Result<Expr> {
    check_depth(depth)?;
    match expr {
        Expr::Number(_) | Expr::Variable(_) => Ok(expr.clone()),

        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => {
            let operand = normalize_depth(operand, depth + 1)?;
            Ok(match operand {
                Expr::Number(n) => Expr::Number(-n),
                Expr::UnaryOp {
                    op: UnaryOperator::Negate,
                    operand: inner,
                } => *inner,
                // Fold the sign into the product's numeric coefficient, so
                // −(2·x) and (−2)·x canonicalize identically
                product @ Expr::BinaryOp {
                    op: BinaryOperator::Multiply,
                    ..
                } => {
                    let mut coefficient = -1.0;
                    let mut factors = Factors::new();
                    collect_factors(&product, &mut coefficient, &mut factors);
                    rebuild_product(coefficient, factors)
                }
                other => Expr::negate(other),
            })
        }

        Expr::BinaryOp { op, left, right } => {
            let left = normalize_depth(left, depth + 1)?;
            let right = normalize_depth(right, depth + 1)?;
            match op {
                BinaryOperator::Add | BinaryOperator::Subtract => {
                    let mut terms = Terms::new();
                    collect_terms(&left, 1.0, &mut terms);
                    collect_terms(
                        &right,
                        if *op == BinaryOperator::Subtract {
                            -1.0
                        } else {
                            1.0
                        },
                        &mut terms,
                    );
                    Ok(rebuild_sum(terms))
                }
                BinaryOperator::Multiply => {
                    let mut coefficient = 1.0;
                    let mut factors = Factors::new();
                    collect_factors(&left, &mut coefficient, &mut factors);
                    collect_factors(&right, &mut coefficient, &mut factors);
                    Ok(rebuild_product(coefficient, factors))
                }
                BinaryOperator::Divide => Ok(normalize_divide(left, right)),
                BinaryOperator::Power => Ok(normalize_power(left, right)),
                BinaryOperator::Cross => Ok(Expr::binary(BinaryOperator::Cross, left, right)),
            }
        }

        // Everything else normalizes its children in place.
        other => crate::symbolic::map_children(other, &mut |child| {
            normalize_depth(child, depth + 1)
        }),
    }
}

// ---------------------------------------------------------------------------
// Sums
// ---------------------------------------------------------------------------

/// Flatten a (sub)tree of additions into signed terms of the shape
/// `coefficient * core`. The constant contribution uses `Number(1)` as core.
fn collect_terms(expr: &Expr, sign: f64, terms: &mut Terms) {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Add,
            left,
            right,
        } => {
            collect_terms(left, sign, terms);
            collect_terms(right, sign, terms);
        }
        Expr::BinaryOp {
            op: BinaryOperator::Subtract,
            left,
            right,
        } => {
            collect_terms(left, sign, terms);
            collect_terms(right, -sign, terms);
        }
        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => collect_terms(operand, -sign, terms),
        Expr::Number(n) => terms.push((sign * n, Expr::Number(1.0))),
        other => {
            let (coefficient, core) = split_coefficient(other);
            terms.push((sign * coefficient, core));
        }
    }
}

/// Split a leading numeric coefficient off a product.
fn split_coefficient(expr: &Expr) -> (f64, Expr) {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => {
            if let Expr::Number(n) = **left {
                (n, (**right).clone())
            } else {
                (1.0, expr.clone())
            }
        }
        _ => (1.0, expr.clone()),
    }
}

fn rebuild_sum(terms: Terms) -> Expr {
    // Combine terms with structurally equal cores
    let mut combined: Vec<(f64, Expr)> = Vec::with_capacity(terms.len());
    for (coefficient, core) in terms {
        match combined.iter_mut().find(|(_, c)| *c == core) {
            Some((existing, _)) => *existing += coefficient,
            None => combined.push((coefficient, core)),
        }
    }
    combined.retain(|(coefficient, _)| *coefficient != 0.0);
    combined.sort_by(|(_, a), (_, b)| sort_key(a).cmp(&sort_key(b)));

    let mut exprs: Vec<Expr> = combined
        .into_iter()
        .map(|(coefficient, core)| term_to_expr(coefficient, core))
        .collect();
    match exprs.len() {
        0 => Expr::Number(0.0),
        1 => exprs.pop().expect("one term"),
        _ => exprs
            .into_iter()
            .rev()
            .reduce(|acc, term| Expr::add(term, acc))
            .expect("non-empty"),
    }
}

fn term_to_expr(coefficient: f64, core: Expr) -> Expr {
    if core == Expr::Number(1.0) {
        return Expr::Number(coefficient);
    }
    if coefficient == 1.0 {
        core
    } else if coefficient == -1.0 {
        Expr::negate(core)
    } else {
        Expr::multiply(Expr::Number(coefficient), core)
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Flatten a (sub)tree of multiplications into a numeric coefficient and
/// `(base, exponent)` factors.
fn collect_factors(expr: &Expr, coefficient: &mut f64, factors: &mut Factors) {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => {
            collect_factors(left, coefficient, factors);
            collect_factors(right, coefficient, factors);
        }
        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => {
            *coefficient = -*coefficient;
            collect_factors(operand, coefficient, factors);
        }
        Expr::Number(n) => *coefficient *= n,
        Expr::BinaryOp {
            op: BinaryOperator::Power,
            left,
            right,
        } => push_factor(factors, (**left).clone(), (**right).clone()),
        other => push_factor(factors, other.clone(), Expr::Number(1.0)),
    }
}

fn push_factor(factors: &mut Factors, base: Expr, exponent: Expr) {
    match factors.iter_mut().find(|(b, _)| *b == base) {
        Some((_, existing)) => {
            let combined = match (&*existing, &exponent) {
                (Expr::Number(a), Expr::Number(b)) => Expr::Number(a + b),
                _ => Expr::add(existing.clone(), exponent),
            };
            *existing = combined;
        }
        None => factors.push((base, exponent)),
    }
}

fn rebuild_product(coefficient: f64, mut factors: Factors) -> Expr {
    if coefficient == 0.0 {
        return Expr::Number(0.0);
    }
    factors.retain(|(_, exponent)| !matches!(exponent, Expr::Number(n) if *n == 0.0));
    factors.sort_by(|(a, _), (b, _)| sort_key(a).cmp(&sort_key(b)));

    let mut exprs: Vec<Expr> = factors
        .into_iter()
        .map(|(base, exponent)| match exponent {
            Expr::Number(n) if n == 1.0 => base,
            exponent => Expr::power(base, exponent),
        })
        .collect();

    let chain = match exprs.len() {
        0 => return Expr::Number(coefficient),
        1 => exprs.pop().expect("one factor"),
        _ => exprs
            .into_iter()
            .rev()
            .reduce(|acc, factor| Expr::multiply(factor, acc))
            .expect("non-empty"),
    };

    if coefficient == 1.0 {
        chain
    } else if coefficient == -1.0 {
        Expr::negate(chain)
    } else {
        Expr::multiply(Expr::Number(coefficient), chain)
    }
}

// ---------------------------------------------------------------------------
// Quotients and powers
// ---------------------------------------------------------------------------

fn normalize_divide(numerator: Expr, denominator: Expr) -> Expr {
    if let (Expr::Number(a), Expr::Number(b)) = (&numerator, &denominator) {
        if *b != 0.0 {
            return Expr::Number(a / b);
        }
    }
    if denominator == Expr::Number(1.0) {
        return numerator;
    }
    if numerator == denominator {
        return Expr::Number(1.0);
    }
    if numerator == Expr::Number(0.0) && !matches!(denominator, Expr::Number(n) if n == 0.0) {
        return Expr::Number(0.0);
    }
    Expr::divide(numerator, denominator)
}

fn normalize_power(base: Expr, exponent: Expr) -> Expr {
    match &exponent {
        Expr::Number(n) if *n == 0.0 => return Expr::Number(1.0),
        Expr::Number(n) if *n == 1.0 => return base,
        _ => {}
    }
    if let (Expr::Number(b), Expr::Number(e)) = (&base, &exponent) {
        // Fold only where the real kernel is exact about the branch
        if *b >= 0.0 || e.fract() == 0.0 {
            let folded = if e.fract() == 0.0 && e.abs() <= i32::MAX as f64 {
                b.powi(*e as i32)
            } else {
                b.powf(*e)
            };
            if folded.is_finite() {
                return Expr::Number(folded);
            }
        }
    }
    Expr::power(base, exponent)
}

/// Stable ordering key: numbers first, then variables alphabetically, then
/// complex subtrees by their debug rendering.
fn sort_key(expr: &Expr) -> (u8, String) {
    match expr {
        Expr::Number(n) => (0, format!("{:024.12}", n)),
        Expr::Variable(name) => (1, name.clone()),
        other => (2, format!("{:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::variable(name)
    }

    #[test]
    fn constant_folding() {
        let e = Expr::add(Expr::Number(3.0), Expr::Number(5.0));
        assert_eq!(normalize(&e).unwrap(), Expr::Number(8.0));
    }

    #[test]
    fn like_terms_combine() {
        let e = Expr::add(var("x"), var("x"));
        assert_eq!(
            normalize(&e).unwrap(),
            Expr::multiply(Expr::Number(2.0), var("x"))
        );
    }

    #[test]
    fn subtraction_of_self_cancels() {
        let e = Expr::subtract(var("x"), var("x"));
        assert_eq!(normalize(&e).unwrap(), Expr::Number(0.0));
    }

    #[test]
    fn repeated_factor_collects_to_power() {
        let e = Expr::multiply(var("x"), var("x"));
        assert_eq!(
            normalize(&e).unwrap(),
            Expr::power(var("x"), Expr::Number(2.0))
        );
    }

    #[test]
    fn identities() {
        assert_eq!(
            normalize(&Expr::add(Expr::Number(0.0), var("y"))).unwrap(),
            var("y")
        );
        assert_eq!(
            normalize(&Expr::multiply(Expr::Number(1.0), var("y"))).unwrap(),
            var("y")
        );
        assert_eq!(
            normalize(&Expr::multiply(Expr::Number(0.0), var("y"))).unwrap(),
            Expr::Number(0.0)
        );
        assert_eq!(
            normalize(&Expr::power(var("y"), Expr::Number(0.0))).unwrap(),
            Expr::Number(1.0)
        );
        assert_eq!(
            normalize(&Expr::power(var("y"), Expr::Number(1.0))).unwrap(),
            var("y")
        );
        assert_eq!(
            normalize(&Expr::divide(var("y"), var("y"))).unwrap(),
            Expr::Number(1.0)
        );
    }

    #[test]
    fn negation_absorbed_into_literals() {
        let e = Expr::negate(Expr::Number(5.0));
        assert_eq!(normalize(&e).unwrap(), Expr::Number(-5.0));
    }

    #[test]
    fn commutative_operands_are_ordered() {
        let a = normalize(&Expr::add(var("y"), Expr::add(var("x"), Expr::Number(2.0)))).unwrap();
        let b = normalize(&Expr::add(Expr::Number(2.0), Expr::add(var("y"), var("x")))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn normalization_is_idempotent() {
        let exprs = vec![
            Expr::add(var("y"), Expr::add(var("x"), var("x"))),
            Expr::multiply(var("z"), Expr::multiply(var("z"), Expr::Number(3.0))),
            Expr::subtract(Expr::negate(var("x")), var("x")),
            Expr::divide(var("x"), Expr::Number(1.0)),
        ];
        for e in exprs {
            let once = normalize(&e).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "normalize must be idempotent for {:?}", e);
        }
    }
}
