//! Linear and quadratic root finding
//!
//! Recognizes `A·x² + B·x + C` (or the linear tail) by normalising and
//! collecting coefficients. Symbolic coefficients are allowed; roots then
//! carry `√` subtrees. With a negative numeric discriminant the default mode
//! returns roots that evaluate to complex numbers, real-only mode returns an
//! empty list.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{Error, Result};
use crate::symbolic::{normalize, simplify};

pub fn solve(expr: &Expr, variable: &str, real_only: bool) -> Result<Vec<Expr>> {
    // An equation solves its difference; anything else is treated as = 0
    let polynomial = match expr {
        Expr::Comparison {
            op: crate::ast::ComparisonOperator::Equal,
            left,
            right,
        } => Expr::subtract((**left).clone(), (**right).clone()),
        _ => expr.clone(),
    };
    let normalized = normalize(&polynomial)?;

    let coefficients = collect_coefficients(&normalized, variable).ok_or_else(|| {
        Error::evaluation(format!(
            "expression is not a polynomial of degree at most 2 in '{}'",
            variable
        ))
    })?;
    let [c, b, a] = coefficients;

    let a_zero = matches!(a, Expr::Number(n) if n == 0.0);
    let b_zero = matches!(b, Expr::Number(n) if n == 0.0);

    if a_zero {
        if b_zero {
            // No variable left: either every x or no x solves it
            return Ok(Vec::new());
        }
        // B·x + C = 0  →  x = −C/B
        let root = simplify(&Expr::divide(Expr::negate(c), b))?;
        return Ok(vec![root]);
    }

    // Quadratic formula
    let discriminant = simplify(&Expr::subtract(
        Expr::power(b.clone(), Expr::Number(2.0)),
        Expr::multiply(
            Expr::Number(4.0),
            Expr::multiply(a.clone(), c.clone()),
        ),
    ))?;

    if real_only {
        if let Expr::Number(d) = discriminant {
            if d < 0.0 {
                return Ok(Vec::new());
            }
        }
    }

    let sqrt_d = Expr::call("sqrt", discriminant);
    let two_a = Expr::multiply(Expr::Number(2.0), a);
    let plus = simplify(&Expr::divide(
        Expr::add(Expr::negate(b.clone()), sqrt_d.clone()),
        two_a.clone(),
    ))?;
    let minus = simplify(&Expr::divide(
        Expr::subtract(Expr::negate(b), sqrt_d),
        two_a,
    ))?;
    if plus == minus {
        return Ok(vec![plus]);
    }
    Ok(vec![plus, minus])
}

/// Collect `[C, B, A]` with `A·x² + B·x + C`. `None` when any term is not
/// polynomial in the variable or exceeds degree 2.
fn collect_coefficients(expr: &Expr, variable: &str) -> Option<[Expr; 3]> {
    let mut terms = Vec::new();
    flatten_add(expr, &mut terms);

    let mut by_degree: [Vec<Expr>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for term in terms {
        let (degree, coefficient) = term_degree(&term, variable)?;
        by_degree[degree].push(coefficient);
    }

    let mut out = [Expr::Number(0.0), Expr::Number(0.0), Expr::Number(0.0)];
    for (degree, parts) in by_degree.into_iter().enumerate() {
        if parts.is_empty() {
            continue;
        }
        let sum = parts
            .into_iter()
            .reduce(|acc, part| Expr::add(acc, part))
            .expect("non-empty");
        out[degree] = normalize(&sum).ok()?;
    }
    Some(out)
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

/// Degree in the variable and the coefficient expression of a single term.
fn term_degree(term: &Expr, variable: &str) -> Option<(usize, Expr)> {
    if !term.free_variables().contains(variable) {
        return Some((0, term.clone()));
    }
    match term {
        Expr::Variable(name) if name == variable => Some((1, Expr::Number(1.0))),
        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => {
            let (degree, coefficient) = term_degree(operand, variable)?;
            Some((degree, Expr::negate(coefficient)))
        }
        Expr::BinaryOp {
            op: BinaryOperator::Power,
            left,
            right,
        } => {
            if !matches!(&**left, Expr::Variable(name) if name == variable) {
                return None;
            }
            match **right {
                Expr::Number(n) if n == 2.0 => Some((2, Expr::Number(1.0))),
                Expr::Number(n) if n == 1.0 => Some((1, Expr::Number(1.0))),
                _ => None,
            }
        }
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => {
            let left_has = left.free_variables().contains(variable);
            let right_has = right.free_variables().contains(variable);
            match (left_has, right_has) {
                (true, true) => {
                    // x·x-style products must resolve through both factors
                    let (dl, cl) = term_degree(left, variable)?;
                    let (dr, cr) = term_degree(right, variable)?;
                    if dl + dr > 2 {
                        return None;
                    }
                    Some((dl + dr, Expr::multiply(cl, cr)))
                }
                (false, true) => {
                    let (degree, coefficient) = term_degree(right, variable)?;
                    Some((degree, Expr::multiply((**left).clone(), coefficient)))
                }
                (true, false) => {
                    let (degree, coefficient) = term_degree(left, variable)?;
                    Some((degree, Expr::multiply(coefficient, (**right).clone())))
                }
                (false, false) => Some((0, term.clone())),
            }
        }
        _ => None,
    }
}
