//! Syntactic indefinite integration
//!
//! A small rule table: powers of the variable, `1/x`, `eˣ`, `sin`, `cos`,
//! `sqrt`, linearity over sums, and constant-multiple extraction. No
//! substitution and no partial fractions; anything outside the table is an
//! error the caller can catch to fall back to numeric quadrature.

use crate::ast::{BinaryOperator, Expr, PiecewiseCase, UnaryOperator};
use crate::error::{Error, Result};
use crate::symbolic::{check_depth, normalize};

pub fn integrate(expr: &Expr, variable: &str) -> Result<Expr> {
    let normalized = normalize(expr)?;
    let antiderivative = integrate_depth(&normalized, variable, 0)?;
    normalize(&antiderivative)
}

fn integrate_depth(expr: &Expr, variable: &str, depth: usize) -> Result<Expr> {
    check_depth(depth)?;
    let recurse = |e: &Expr| integrate_depth(e, variable, depth + 1);
    let x = || Expr::variable(variable);

    // Anything free of the variable integrates to itself times x
    if !expr.free_variables().contains(variable) && is_integrand_constant(expr) {
        return Ok(Expr::multiply(expr.clone(), x()));
    }

    match expr {
        Expr::Variable(name) if name == variable => {
            // ∫ x dx = x²/2
            Ok(Expr::divide(
                Expr::power(x(), Expr::Number(2.0)),
                Expr::Number(2.0),
            ))
        }

        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => Ok(Expr::negate(recurse(operand)?)),

        Expr::BinaryOp { op, left, right } => match op {
            BinaryOperator::Add => Ok(Expr::add(recurse(left)?, recurse(right)?)),
            BinaryOperator::Subtract => Ok(Expr::subtract(recurse(left)?, recurse(right)?)),
            BinaryOperator::Multiply => {
                // Constant-multiple extraction; no product rule exists
                if !left.free_variables().contains(variable) {
                    return Ok(Expr::multiply((**left).clone(), recurse(right)?));
                }
                if !right.free_variables().contains(variable) {
                    return Ok(Expr::multiply((**right).clone(), recurse(left)?));
                }
                Err(no_rule(expr))
            }
            BinaryOperator::Divide => {
                // c/x and u/c
                if !right.free_variables().contains(variable) {
                    return Ok(Expr::divide(recurse(left)?, (**right).clone()));
                }
                let numerator_constant = !left.free_variables().contains(variable);
                if numerator_constant && **right == x() {
                    // ∫ c/x dx = c·ln|x|
                    return Ok(Expr::multiply(
                        (**left).clone(),
                        Expr::call("ln", Expr::AbsoluteValue(Box::new(x()))),
                    ));
                }
                Err(no_rule(expr))
            }
            BinaryOperator::Power => {
                // xⁿ and eˣ shapes
                if **left == x() {
                    if let Expr::Number(n) = **right {
                        if n == -1.0 {
                            return Ok(Expr::call("ln", Expr::AbsoluteValue(Box::new(x()))));
                        }
                        return Ok(Expr::divide(
                            Expr::power(x(), Expr::Number(n + 1.0)),
                            Expr::Number(n + 1.0),
                        ));
                    }
                }
                if **left == Expr::variable("e") && **right == x() {
                    return Ok(expr.clone());
                }
                Err(no_rule(expr))
            }
            BinaryOperator::Cross => Err(no_rule(expr)),
        },

        Expr::FunctionCall {
            name,
            args,
            base: None,
            index: None,
        } if args.len() == 1 && args[0] == x() => match name.as_str() {
            "sin" => Ok(Expr::negate(Expr::call("cos", x()))),
            "cos" => Ok(Expr::call("sin", x())),
            "exp" => Ok(Expr::call("exp", x())),
            // ∫ √x dx = (2/3)·x^(3/2)
            "sqrt" => Ok(Expr::multiply(
                Expr::divide(Expr::Number(2.0), Expr::Number(3.0)),
                Expr::power(x(), Expr::Number(1.5)),
            )),
            _ => Err(no_rule(expr)),
        },

        Expr::Piecewise { cases } => Ok(Expr::Piecewise {
            cases: cases
                .iter()
                .map(|case| {
                    Ok(PiecewiseCase {
                        value: recurse(&case.value)?,
                        condition: case.condition.clone(),
                    })
                })
                .collect::<Result<_>>()?,
        }),

        _ => Err(no_rule(expr)),
    }
}

/// Whether a variable-free tree is a plain value worth multiplying by x.
/// Rules out constructs like comparisons that have no numeric reading.
fn is_integrand_constant(expr: &Expr) -> bool {
    !matches!(
        expr,
        Expr::Comparison { .. }
            | Expr::ChainedComparison { .. }
            | Expr::LogicOp { .. }
            | Expr::Assignment { .. }
            | Expr::FunctionDefinition { .. }
    )
}

fn no_rule(expr: &Expr) -> Error {
    Error::evaluation(format!(
        "no antiderivative rule applies to {:?}",
        expr
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::variable(name)
    }

    #[test]
    fn constant_rule() {
        // ∫ 5 dx = 5x
        let result = integrate(&Expr::Number(5.0), "x").unwrap();
        assert_eq!(
            result,
            normalize(&Expr::multiply(Expr::Number(5.0), var("x"))).unwrap()
        );
    }

    #[test]
    fn power_rule() {
        // ∫ x² dx = x³/3
        let e = Expr::power(var("x"), Expr::Number(2.0));
        let result = integrate(&e, "x").unwrap();
        let expected = normalize(&Expr::divide(
            Expr::power(var("x"), Expr::Number(3.0)),
            Expr::Number(3.0),
        ))
        .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn reciprocal_rule() {
        // ∫ x⁻¹ dx = ln|x|, both tree shapes
        let via_power = integrate(&Expr::power(var("x"), Expr::Number(-1.0)), "x").unwrap();
        let via_divide = integrate(&Expr::divide(Expr::Number(1.0), var("x")), "x").unwrap();
        let expected =
            normalize(&Expr::call("ln", Expr::AbsoluteValue(Box::new(var("x"))))).unwrap();
        assert_eq!(via_power, expected);
        assert_eq!(via_divide, expected);
    }

    #[test]
    fn exponential_and_trig_rules() {
        assert_eq!(
            integrate(&Expr::power(var("e"), var("x")), "x").unwrap(),
            normalize(&Expr::power(var("e"), var("x"))).unwrap()
        );
        assert_eq!(
            integrate(&Expr::call("sin", var("x")), "x").unwrap(),
            normalize(&Expr::negate(Expr::call("cos", var("x")))).unwrap()
        );
        assert_eq!(
            integrate(&Expr::call("cos", var("x")), "x").unwrap(),
            normalize(&Expr::call("sin", var("x"))).unwrap()
        );
    }

    #[test]
    fn linearity() {
        // ∫ (3x + 2) dx = (3/2)x² + 2x
        let e = Expr::add(
            Expr::multiply(Expr::Number(3.0), var("x")),
            Expr::Number(2.0),
        );
        let result = integrate(&e, "x").unwrap();
        let expected = normalize(&Expr::add(
            Expr::multiply(
                Expr::Number(1.5),
                Expr::power(var("x"), Expr::Number(2.0)),
            ),
            Expr::multiply(Expr::Number(2.0), var("x")),
        ))
        .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn no_rule_for_products_of_the_variable() {
        let e = Expr::multiply(var("x"), Expr::call("sin", var("x")));
        assert!(integrate(&e, "x").is_err());
    }

    #[test]
    fn piecewise_integrates_per_case() {
        let e = Expr::Piecewise {
            cases: vec![
                PiecewiseCase {
                    value: var("x"),
                    condition: Some(Expr::Comparison {
                        op: crate::ast::ComparisonOperator::GreaterThan,
                        left: Box::new(var("x")),
                        right: Box::new(Expr::Number(0.0)),
                    }),
                },
                PiecewiseCase {
                    value: Expr::Number(0.0),
                    condition: None,
                },
            ],
        };
        match integrate(&e, "x").unwrap() {
            Expr::Piecewise { cases } => assert_eq!(cases.len(), 2),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
