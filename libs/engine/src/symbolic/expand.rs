//! Distribution of products over sums
//!
//! `(a+b)·(c+d)` multiplies out; `(a+b)^n` uses the binomial theorem for
//! two-term bases and repeated distribution otherwise. `expand_trig`
//! additionally rewrites multiple- and half-angle forms.

use crate::ast::{BinaryOperator, Expr};
use crate::error::Result;
use crate::functions;
use crate::symbolic::{bottom_up, normalize, simplify, MAX_REWRITE_ITERATIONS};

/// Largest integer exponent expanded by the binomial theorem.
const MAX_EXPANSION_EXPONENT: f64 = 16.0;

pub fn expand(expr: &Expr) -> Result<Expr> {
    let mut current = normalize(expr)?;
    for _ in 0..MAX_REWRITE_ITERATIONS {
        let rewritten = bottom_up(&current, &expand_node, 0)?;
        let next = normalize(&rewritten)?;
        if next == current {
            break;
        }
        current = next;
    }
    simplify(&current)
}

fn expand_node(expr: &Expr) -> Result<Expr> {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => Ok(distribute(left, right)),
        Expr::BinaryOp {
            op: BinaryOperator::Power,
            left,
            right,
        } => {
            let Expr::Number(n) = **right else {
                return Ok(expr.clone());
            };
            if n.fract() != 0.0 || !(2.0..=MAX_EXPANSION_EXPONENT).contains(&n) {
                return Ok(expr.clone());
            }
            let mut terms = Vec::new();
            flatten_add(left, &mut terms);
            match terms.len() {
                0 | 1 => Ok(expr.clone()),
                2 => Ok(binomial_expansion(&terms[0], &terms[1], n as u32)),
                _ => {
                    // Repeated distribution for multi-term bases
                    let mut acc = (**left).clone();
                    for _ in 1..n as u32 {
                        acc = distribute(&acc, left);
                    }
                    Ok(acc)
                }
            }
        }
        _ => Ok(expr.clone()),
    }
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

/// `(Σaᵢ)(Σbⱼ) → ΣΣ aᵢ·bⱼ`
fn distribute(left: &Expr, right: &Expr) -> Expr {
    let mut left_terms = Vec::new();
    let mut right_terms = Vec::new();
    flatten_add(left, &mut left_terms);
    flatten_add(right, &mut right_terms);
    if left_terms.len() == 1 && right_terms.len() == 1 {
        return Expr::multiply(left.clone(), right.clone());
    }
    let mut products = Vec::with_capacity(left_terms.len() * right_terms.len());
    for a in &left_terms {
        for b in &right_terms {
            products.push(Expr::multiply(a.clone(), b.clone()));
        }
    }
    rebuild_add(products)
}

/// `(a+b)^n → Σ C(n,k)·a^(n−k)·b^k`
fn binomial_expansion(a: &Expr, b: &Expr, n: u32) -> Expr {
    let mut terms = Vec::with_capacity(n as usize + 1);
    for k in 0..=n {
        let coefficient =
            functions::binomial(n as f64, k as f64).expect("small integer binomial");
        let a_power = Expr::power(a.clone(), Expr::Number((n - k) as f64));
        let b_power = Expr::power(b.clone(), Expr::Number(k as f64));
        terms.push(Expr::multiply(
            Expr::Number(coefficient),
            Expr::multiply(a_power, b_power),
        ));
    }
    rebuild_add(terms)
}

// ---------------------------------------------------------------------------
// Trigonometric expansion
// ---------------------------------------------------------------------------

pub fn expand_trig(expr: &Expr) -> Result<Expr> {
    let mut current = normalize(expr)?;
    for _ in 0..MAX_REWRITE_ITERATIONS {
        let rewritten = bottom_up(&current, &expand_trig_node, 0)?;
        let next = normalize(&rewritten)?;
        if next == current {
            break;
        }
        current = next;
    }
    Ok(current)
}

fn expand_trig_node(expr: &Expr) -> Result<Expr> {
    let Expr::FunctionCall {
        name,
        args,
        base: None,
        index: None,
    } = expr
    else {
        return Ok(expr.clone());
    };
    if args.len() != 1 || !matches!(name.as_str(), "sin" | "cos" | "tan") {
        return Ok(expr.clone());
    }
    let arg = &args[0];

    if let Some(u) = angle_multiple(arg, 2.0) {
        return Ok(match name.as_str() {
            // sin(2u) = 2 sin u cos u
            "sin" => Expr::multiply(
                Expr::Number(2.0),
                Expr::multiply(Expr::call("sin", u.clone()), Expr::call("cos", u)),
            ),
            // cos(2u) = cos²u − sin²u
            "cos" => Expr::subtract(
                Expr::power(Expr::call("cos", u.clone()), Expr::Number(2.0)),
                Expr::power(Expr::call("sin", u), Expr::Number(2.0)),
            ),
            // tan(2u) = 2 tan u / (1 − tan²u)
            _ => Expr::divide(
                Expr::multiply(Expr::Number(2.0), Expr::call("tan", u.clone())),
                Expr::subtract(
                    Expr::Number(1.0),
                    Expr::power(Expr::call("tan", u), Expr::Number(2.0)),
                ),
            ),
        });
    }

    if let Some(u) = angle_multiple(arg, 3.0) {
        return Ok(match name.as_str() {
            // sin(3u) = 3 sin u − 4 sin³u
            "sin" => Expr::subtract(
                Expr::multiply(Expr::Number(3.0), Expr::call("sin", u.clone())),
                Expr::multiply(
                    Expr::Number(4.0),
                    Expr::power(Expr::call("sin", u), Expr::Number(3.0)),
                ),
            ),
            // cos(3u) = 4 cos³u − 3 cos u
            "cos" => Expr::subtract(
                Expr::multiply(
                    Expr::Number(4.0),
                    Expr::power(Expr::call("cos", u.clone()), Expr::Number(3.0)),
                ),
                Expr::multiply(Expr::Number(3.0), Expr::call("cos", u)),
            ),
            // tan(3u) = (3 tan u − tan³u) / (1 − 3 tan²u)
            _ => Expr::divide(
                Expr::subtract(
                    Expr::multiply(Expr::Number(3.0), Expr::call("tan", u.clone())),
                    Expr::power(Expr::call("tan", u.clone()), Expr::Number(3.0)),
                ),
                Expr::subtract(
                    Expr::Number(1.0),
                    Expr::multiply(
                        Expr::Number(3.0),
                        Expr::power(Expr::call("tan", u), Expr::Number(2.0)),
                    ),
                ),
            ),
        });
    }

    if let Some(u) = half_angle(arg) {
        return Ok(match name.as_str() {
            // Principal branch of the half-angle identities
            "sin" => Expr::call(
                "sqrt",
                Expr::divide(
                    Expr::subtract(Expr::Number(1.0), Expr::call("cos", u)),
                    Expr::Number(2.0),
                ),
            ),
            "cos" => Expr::call(
                "sqrt",
                Expr::divide(
                    Expr::add(Expr::Number(1.0), Expr::call("cos", u)),
                    Expr::Number(2.0),
                ),
            ),
            // tan(u/2) = (1 − cos u) / sin u
            _ => Expr::divide(
                Expr::subtract(Expr::Number(1.0), Expr::call("cos", u.clone())),
                Expr::call("sin", u),
            ),
        });
    }

    Ok(expr.clone())
}

/// Match `n·u` for a concrete multiplier.
fn angle_multiple(arg: &Expr, n: f64) -> Option<Expr> {
    match arg {
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => match **left {
            Expr::Number(k) if k == n => Some((**right).clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Match `u/2` (also normalized as `0.5·u`).
fn half_angle(arg: &Expr) -> Option<Expr> {
    match arg {
        Expr::BinaryOp {
            op: BinaryOperator::Divide,
            left,
            right,
        } => match **right {
            Expr::Number(n) if n == 2.0 => Some((**left).clone()),
            _ => None,
        },
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => match **left {
            Expr::Number(n) if n == 0.5 => Some((**right).clone()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::variable(name)
    }

    #[test]
    fn product_of_sums_distributes() {
        let e = Expr::multiply(
            Expr::add(var("a"), var("b")),
            Expr::add(var("c"), var("d")),
        );
        let expanded = expand(&e).unwrap();
        let expected = simplify(&Expr::add(
            Expr::add(
                Expr::multiply(var("a"), var("c")),
                Expr::multiply(var("a"), var("d")),
            ),
            Expr::add(
                Expr::multiply(var("b"), var("c")),
                Expr::multiply(var("b"), var("d")),
            ),
        ))
        .unwrap();
        assert_eq!(expanded, expected);
    }

    #[test]
    fn binomial_square() {
        let e = Expr::power(Expr::add(var("a"), var("b")), Expr::Number(2.0));
        let expanded = expand(&e).unwrap();
        let expected = simplify(&Expr::add(
            Expr::add(
                Expr::power(var("a"), Expr::Number(2.0)),
                Expr::multiply(
                    Expr::Number(2.0),
                    Expr::multiply(var("a"), var("b")),
                ),
            ),
            Expr::power(var("b"), Expr::Number(2.0)),
        ))
        .unwrap();
        assert_eq!(expanded, expected);
    }

    #[test]
    fn expansion_is_idempotent() {
        let e = Expr::power(Expr::add(var("x"), Expr::Number(1.0)), Expr::Number(3.0));
        let once = expand(&e).unwrap();
        let twice = expand(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn double_angle_sine() {
        let e = Expr::call("sin", Expr::multiply(Expr::Number(2.0), var("x")));
        let expanded = expand_trig(&e).unwrap();
        let expected = normalize(&Expr::multiply(
            Expr::Number(2.0),
            Expr::multiply(Expr::call("sin", var("x")), Expr::call("cos", var("x"))),
        ))
        .unwrap();
        assert_eq!(expanded, expected);
    }

    #[test]
    fn half_angle_cosine() {
        let e = Expr::call("cos", Expr::divide(var("x"), Expr::Number(2.0)));
        let expanded = expand_trig(&e).unwrap();
        assert!(matches!(
            expanded,
            Expr::FunctionCall { ref name, .. } if name == "sqrt"
        ));
    }
}
