//! Structural factoring of numeric-polynomial sums
//!
//! Recognizes differences of squares, perfect-square trinomials, and shared
//! numeric factors. Anything else comes back normalized unchanged.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::Result;
use crate::symbolic::{bottom_up, normalize};

pub fn factor(expr: &Expr) -> Result<Expr> {
    let normalized = normalize(expr)?;
    let factored = bottom_up(&normalized, &factor_node, 0)?;
    normalize(&factored)
}

fn factor_node(expr: &Expr) -> Result<Expr> {
    if !matches!(
        expr,
        Expr::BinaryOp {
            op: BinaryOperator::Add,
            ..
        }
    ) {
        return Ok(expr.clone());
    }

    let mut terms = Vec::new();
    flatten_add(expr, &mut terms);
    let signed: Vec<(f64, Expr)> = terms.iter().map(coefficient_of).collect();

    if let Some(result) = difference_of_squares(&signed) {
        return Ok(result);
    }
    if let Some(result) = perfect_square(&signed) {
        return Ok(result);
    }
    if let Some(result) = common_numeric_factor(&signed) {
        return Ok(result);
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
        Expr::Number(n) => (*n, Expr::Number(1.0)),
        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => {
            let (coefficient, core) = coefficient_of(operand);
            (-coefficient, core)
        }
        Expr::BinaryOp {
            op: BinaryOperator::Multiply,
            left,
            right,
        } => match **left {
            Expr::Number(n) => (n, (**right).clone()),
            _ => (1.0, expr.clone()),
        },
        _ => (1.0, expr.clone()),
    }
}

/// The structural square root of `coefficient * core`, if both parts are
/// recognizable squares.
fn square_root_of(coefficient: f64, core: &Expr) -> Option<Expr> {
    if coefficient <= 0.0 {
        return None;
    }
    let root = coefficient.sqrt();
    if root.fract() != 0.0 && coefficient != 1.0 {
        return None;
    }
    let core_root = match core {
        Expr::Number(n) if *n == 1.0 => Expr::Number(1.0),
        Expr::BinaryOp {
            op: BinaryOperator::Power,
            left,
            right,
        } if matches!(**right, Expr::Number(n) if n == 2.0) => (**left).clone(),
        _ => return None,
    };
    Some(match (root == 1.0, &core_root) {
        (true, _) => core_root,
        (false, Expr::Number(n)) if *n == 1.0 => Expr::Number(root),
        (false, _) => Expr::multiply(Expr::Number(root), core_root),
    })
}

/// `A² − B² → (A−B)(A+B)`
fn difference_of_squares(terms: &[(f64, Expr)]) -> Option<Expr> {
    if terms.len() != 2 {
        return None;
    }
    let (positive, negative) = match (terms[0].0 > 0.0, terms[1].0 > 0.0) {
        (true, false) => (&terms[0], &terms[1]),
        (false, true) => (&terms[1], &terms[0]),
        _ => return None,
    };
    let a = square_root_of(positive.0, &positive.1)?;
    let b = square_root_of(-negative.0, &negative.1)?;
    Some(Expr::multiply(
        Expr::subtract(a.clone(), b.clone()),
        Expr::add(a, b),
    ))
}

/// `A² ± 2AB + B² → (A±B)²`
fn perfect_square(terms: &[(f64, Expr)]) -> Option<Expr> {
    if terms.len() != 3 {
        return None;
    }
    for i in 0..3 {
        for j in 0..3 {
            if i == j {
                continue;
            }
            let k = 3 - i - j;
            let a = match square_root_of(terms[i].0, &terms[i].1) {
                Some(a) => a,
                None => continue,
            };
            let b = match square_root_of(terms[j].0, &terms[j].1) {
                Some(b) => b,
                None => continue,
            };
            let cross = normalize(&Expr::multiply(
                Expr::Number(2.0),
                Expr::multiply(a.clone(), b.clone()),
            ))
            .ok()?;
            let candidate = normalize(&term_expr(terms[k].0, &terms[k].1)).ok()?;
            if candidate == cross {
                return Some(Expr::power(Expr::add(a, b), Expr::Number(2.0)));
            }
            let negated = normalize(&Expr::negate(cross)).ok()?;
            if candidate == negated {
                return Some(Expr::power(Expr::subtract(a, b), Expr::Number(2.0)));
            }
        }
    }
    None
}

fn term_expr(coefficient: f64, core: &Expr) -> Expr {
    if *core == Expr::Number(1.0) {
        Expr::Number(coefficient)
    } else if coefficient == 1.0 {
        core.clone()
    } else {
        Expr::multiply(Expr::Number(coefficient), core.clone())
    }
}

/// `k·A ± k·B → k·(A±B)` for an integral gcd k > 1.
fn common_numeric_factor(terms: &[(f64, Expr)]) -> Option<Expr> {
    if terms.len() < 2 {
        return None;
    }
    let mut gcd: u64 = 0;
    for (coefficient, _) in terms {
        if coefficient.fract() != 0.0 {
            return None;
        }
        gcd = gcd_u64(gcd, coefficient.abs() as u64);
    }
    if gcd <= 1 {
        return None;
    }
    let divided: Vec<Expr> = terms
        .iter()
        .map(|(coefficient, core)| term_expr(coefficient / gcd as f64, core))
        .collect();
    let inner = divided
        .into_iter()
        .rev()
        .reduce(|acc, term| Expr::add(term, acc))
        .expect("two or more terms");
    Some(Expr::multiply(Expr::Number(gcd as f64), inner))
}

fn gcd_u64(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::expand;

    fn var(name: &str) -> Expr {
        Expr::variable(name)
    }

    fn x_squared() -> Expr {
        Expr::power(var("x"), Expr::Number(2.0))
    }

    #[test]
    fn difference_of_squares_factors() {
        let e = Expr::subtract(x_squared(), Expr::power(var("y"), Expr::Number(2.0)));
        let factored = factor(&e).unwrap();
        // Evaluates back to the original under expansion
        assert_eq!(expand(&factored).unwrap(), expand(&e).unwrap());
        assert!(matches!(
            factored,
            Expr::BinaryOp {
                op: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn numeric_difference_of_squares() {
        let e = Expr::subtract(x_squared(), Expr::Number(9.0));
        let factored = factor(&e).unwrap();
        assert_eq!(expand(&factored).unwrap(), expand(&e).unwrap());
    }

    #[test]
    fn perfect_square_trinomial() {
        // x² + 2x + 1 → (x+1)²
        let e = Expr::add(
            Expr::add(x_squared(), Expr::multiply(Expr::Number(2.0), var("x"))),
            Expr::Number(1.0),
        );
        let factored = factor(&e).unwrap();
        assert!(matches!(
            factored,
            Expr::BinaryOp {
                op: BinaryOperator::Power,
                ..
            }
        ));
        assert_eq!(expand(&factored).unwrap(), expand(&e).unwrap());
    }

    #[test]
    fn common_numeric_factor_extracts_gcd() {
        // 6x + 9y → 3(2x + 3y)
        let e = Expr::add(
            Expr::multiply(Expr::Number(6.0), var("x")),
            Expr::multiply(Expr::Number(9.0), var("y")),
        );
        let factored = factor(&e).unwrap();
        assert_eq!(expand(&factored).unwrap(), expand(&e).unwrap());
        assert!(matches!(
            factored,
            Expr::BinaryOp {
                op: BinaryOperator::Multiply,
                ..
            }
        ));
    }

    #[test]
    fn unfactorable_input_comes_back_normalized() {
        let e = Expr::add(var("x"), Expr::Number(1.0));
        assert_eq!(factor(&e).unwrap(), normalize(&e).unwrap());
    }

    #[test]
    fn factoring_is_idempotent() {
        let e = Expr::subtract(x_squared(), Expr::Number(4.0));
        let once = factor(&e).unwrap();
        let twice = factor(&once).unwrap();
        assert_eq!(once, twice);
    }
}
