//! Syntactic differentiation
//!
//! Linearity, product/quotient rules, the numeric and general power rules,
//! and chain rules for the library-known functions. Piecewise trees
//! differentiate per case with conditions preserved.

use crate::ast::{BinaryOperator, Expr, PiecewiseCase, UnaryOperator};
use crate::error::{Error, Result};
use crate::symbolic::check_depth;

pub fn differentiate_with_depth(expr: &Expr, variable: &str, depth: usize) -> Result<Expr> {
    check_depth(depth)?;
    let d = |e: &Expr| differentiate_with_depth(e, variable, depth + 1);

    match expr {
        Expr::Number(_) => Ok(Expr::Number(0.0)),

        Expr::Variable(name) => Ok(if name == variable {
            Expr::Number(1.0)
        } else {
            // Any other variable, and every constant, is held fixed
            Expr::Number(0.0)
        }),

        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => Ok(Expr::negate(d(operand)?)),

        Expr::BinaryOp { op, left, right } => match op {
            BinaryOperator::Add => Ok(Expr::add(d(left)?, d(right)?)),
            BinaryOperator::Subtract => Ok(Expr::subtract(d(left)?, d(right)?)),
            BinaryOperator::Multiply | BinaryOperator::Cross => {
                // Product rule; scalar factors fall out through normalisation
                Ok(Expr::add(
                    Expr::binary(*op, d(left)?, (**right).clone()),
                    Expr::binary(*op, (**left).clone(), d(right)?),
                ))
            }
            BinaryOperator::Divide => {
                // (u/v)' = (u'v − uv') / v²
                Ok(Expr::divide(
                    Expr::subtract(
                        Expr::multiply(d(left)?, (**right).clone()),
                        Expr::multiply((**left).clone(), d(right)?),
                    ),
                    Expr::power((**right).clone(), Expr::Number(2.0)),
                ))
            }
            BinaryOperator::Power => differentiate_power(left, right, variable, depth),
        },

        Expr::FunctionCall {
            name,
            args,
            base,
            index,
        } => differentiate_function(name, args, base.as_deref(), index.as_deref(), variable, depth),

        Expr::AbsoluteValue(inner) => {
            // d|u| = sign(u)·u'
            Ok(Expr::multiply(
                Expr::call("sign", (**inner).clone()),
                d(inner)?,
            ))
        }

        Expr::Piecewise { cases } => Ok(Expr::Piecewise {
            cases: cases
                .iter()
                .map(|case| {
                    Ok(PiecewiseCase {
                        value: d(&case.value)?,
                        condition: case.condition.clone(),
                    })
                })
                .collect::<Result<_>>()?,
        }),

        Expr::Conditional { value, condition } => Ok(Expr::Conditional {
            value: Box::new(d(value)?),
            condition: condition.clone(),
        }),

        Expr::Sum {
            index,
            lower,
            upper,
            body,
        } => {
            if index == variable {
                return Err(Error::evaluation(
                    "cannot differentiate with respect to a bound index variable",
                ));
            }
            Ok(Expr::Sum {
                index: index.clone(),
                lower: lower.clone(),
                upper: upper.clone(),
                body: Box::new(d(body)?),
            })
        }

        Expr::Derivative {
            variable: inner_variable,
            order,
            body,
        }
        | Expr::PartialDerivative {
            variable: inner_variable,
            order,
            body,
        } => {
            // Resolve the inner derivative first, then differentiate again
            let inner = crate::symbolic::differentiate_n(body, inner_variable, *order)?;
            d(&inner)
        }

        Expr::Binom { .. } => {
            if expr.free_variables().contains(variable) {
                return Err(Error::evaluation(
                    "cannot differentiate a binomial coefficient in its arguments",
                ));
            }
            Ok(Expr::Number(0.0))
        }

        Expr::Matrix { rows, bracket } => Ok(Expr::Matrix {
            rows: rows
                .iter()
                .map(|row| row.iter().map(&d).collect::<Result<_>>())
                .collect::<Result<_>>()?,
            bracket: *bracket,
        }),

        Expr::Vector { components, unit } => {
            if *unit {
                return Err(Error::evaluation("cannot differentiate a unit vector"));
            }
            Ok(Expr::Vector {
                components: components.iter().map(&d).collect::<Result<_>>()?,
                unit: false,
            })
        }

        other => Err(Error::evaluation(format!(
            "expression kind is not differentiable: {}",
            kind_name(other)
        ))),
    }
}

fn kind_name(expr: &Expr) -> &'static str {
    match expr {
        Expr::Comparison { .. } | Expr::ChainedComparison { .. } => "comparison",
        Expr::LogicOp { .. } => "logic operator",
        Expr::Integral { .. } | Expr::MultiIntegral { .. } => "integral",
        Expr::Limit { .. } => "limit",
        Expr::Product { .. } => "product",
        Expr::Gradient(_) => "gradient",
        Expr::Assignment { .. } => "assignment",
        Expr::FunctionDefinition { .. } => "function definition",
        _ => "expression",
    }
}

fn differentiate_power(
    base: &Expr,
    exponent: &Expr,
    variable: &str,
    depth: usize,
) -> Result<Expr> {
    let d = |e: &Expr| differentiate_with_depth(e, variable, depth + 1);
    let exponent_is_constant = !exponent.free_variables().contains(variable);

    if exponent_is_constant {
        // d(uⁿ) = n·uⁿ⁻¹·u'
        return Ok(Expr::multiply(
            exponent.clone(),
            Expr::multiply(
                Expr::power(
                    base.clone(),
                    Expr::subtract(exponent.clone(), Expr::Number(1.0)),
                ),
                d(base)?,
            ),
        ));
    }

    // General rule: d(u^v) = u^v · (v'·ln u + v·u'/u)
    Ok(Expr::multiply(
        Expr::power(base.clone(), exponent.clone()),
        Expr::add(
            Expr::multiply(d(exponent)?, Expr::call("ln", base.clone())),
            Expr::multiply(
                exponent.clone(),
                Expr::divide(d(base)?, base.clone()),
            ),
        ),
    ))
}

fn differentiate_function(
    name: &str,
    args: &[Expr],
    base: Option<&Expr>,
    index: Option<&Expr>,
    variable: &str,
    depth: usize,
) -> Result<Expr> {
    let d = |e: &Expr| differentiate_with_depth(e, variable, depth + 1);
    if args.len() != 1 {
        return Err(Error::evaluation(format!(
            "cannot differentiate '{}' with {} arguments",
            name,
            args.len()
        )));
    }
    let u = &args[0];
    let du = d(u)?;

    let outer = match name {
        "sin" => Expr::call("cos", u.clone()),
        "cos" => Expr::negate(Expr::call("sin", u.clone())),
        // sec²u
        "tan" => Expr::power(Expr::call("sec", u.clone()), Expr::Number(2.0)),
        // −csc²u
        "cot" => Expr::negate(Expr::power(Expr::call("csc", u.clone()), Expr::Number(2.0))),
        "sec" => Expr::multiply(Expr::call("sec", u.clone()), Expr::call("tan", u.clone())),
        "csc" => Expr::negate(Expr::multiply(
            Expr::call("csc", u.clone()),
            Expr::call("cot", u.clone()),
        )),
        // 1/√(1−u²)
        "arcsin" => Expr::divide(
            Expr::Number(1.0),
            Expr::call(
                "sqrt",
                Expr::subtract(
                    Expr::Number(1.0),
                    Expr::power(u.clone(), Expr::Number(2.0)),
                ),
            ),
        ),
        "arccos" => Expr::negate(Expr::divide(
            Expr::Number(1.0),
            Expr::call(
                "sqrt",
                Expr::subtract(
                    Expr::Number(1.0),
                    Expr::power(u.clone(), Expr::Number(2.0)),
                ),
            ),
        )),
        // 1/(1+u²)
        "arctan" => Expr::divide(
            Expr::Number(1.0),
            Expr::add(Expr::Number(1.0), Expr::power(u.clone(), Expr::Number(2.0))),
        ),
        "sinh" => Expr::call("cosh", u.clone()),
        "cosh" => Expr::call("sinh", u.clone()),
        // 1/cosh²u
        "tanh" => Expr::divide(
            Expr::Number(1.0),
            Expr::power(Expr::call("cosh", u.clone()), Expr::Number(2.0)),
        ),
        "exp" => Expr::call("exp", u.clone()),
        "ln" => Expr::divide(Expr::Number(1.0), u.clone()),
        "log" => {
            let log_base = match base {
                Some(b) => b.clone(),
                None => Expr::Number(10.0),
            };
            Expr::divide(
                Expr::Number(1.0),
                Expr::multiply(u.clone(), Expr::call("ln", log_base)),
            )
        }
        "sqrt" => match index {
            // d(u^(1/n)) = (1/n)·u^(1/n − 1)
            Some(index) => {
                let reciprocal = Expr::divide(Expr::Number(1.0), index.clone());
                Expr::multiply(
                    reciprocal.clone(),
                    Expr::power(
                        u.clone(),
                        Expr::subtract(reciprocal, Expr::Number(1.0)),
                    ),
                )
            }
            None => Expr::divide(
                Expr::Number(1.0),
                Expr::multiply(Expr::Number(2.0), Expr::call("sqrt", u.clone())),
            ),
        },
        // sign has zero derivative everywhere it exists
        "sign" => return Ok(Expr::Number(0.0)),
        "abs" => Expr::call("sign", u.clone()),
        "floor" | "ceil" | "round" => return Ok(Expr::Number(0.0)),
        other => {
            return Err(Error::evaluation(format!(
                "no derivative rule for function '{}'",
                other
            )))
        }
    };

    Ok(Expr::multiply(outer, du))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolic::{differentiate, differentiate_n, normalize};

    fn var(name: &str) -> Expr {
        Expr::variable(name)
    }

    #[test]
    fn power_rule() {
        // d/dx x³ = 3x²
        let e = Expr::power(var("x"), Expr::Number(3.0));
        let expected =
            normalize(&Expr::multiply(Expr::Number(3.0), Expr::power(var("x"), Expr::Number(2.0))))
                .unwrap();
        assert_eq!(differentiate(&e, "x").unwrap(), expected);
    }

    #[test]
    fn constants_and_other_variables_vanish() {
        assert_eq!(
            differentiate(&Expr::Number(7.0), "x").unwrap(),
            Expr::Number(0.0)
        );
        assert_eq!(differentiate(&var("y"), "x").unwrap(), Expr::Number(0.0));
        assert_eq!(differentiate(&var("pi"), "x").unwrap(), Expr::Number(0.0));
    }

    #[test]
    fn product_rule() {
        // d/dx (x·sin x) = sin x + x·cos x
        let e = Expr::multiply(var("x"), Expr::call("sin", var("x")));
        let result = differentiate(&e, "x").unwrap();
        let expected = normalize(&Expr::add(
            Expr::call("sin", var("x")),
            Expr::multiply(var("x"), Expr::call("cos", var("x"))),
        ))
        .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn chain_rule_through_sin() {
        // d/dx sin(x²) = cos(x²)·2x
        let e = Expr::call("sin", Expr::power(var("x"), Expr::Number(2.0)));
        let result = differentiate(&e, "x").unwrap();
        let expected = normalize(&Expr::multiply(
            Expr::call("cos", Expr::power(var("x"), Expr::Number(2.0))),
            Expr::multiply(Expr::Number(2.0), var("x")),
        ))
        .unwrap();
        assert_eq!(result, expected);
    }

    #[test]
    fn ln_derivative() {
        let e = Expr::call("ln", var("x"));
        let expected = Expr::divide(Expr::Number(1.0), var("x"));
        assert_eq!(
            differentiate(&e, "x").unwrap(),
            normalize(&expected).unwrap()
        );
    }

    #[test]
    fn higher_order() {
        // d²/dx² x³ = 6x
        let e = Expr::power(var("x"), Expr::Number(3.0));
        let expected = normalize(&Expr::multiply(Expr::Number(6.0), var("x"))).unwrap();
        assert_eq!(differentiate_n(&e, "x", 2).unwrap(), expected);
    }

    #[test]
    fn order_out_of_range_is_rejected() {
        let e = Expr::power(var("x"), Expr::Number(3.0));
        assert!(differentiate_n(&e, "x", 0).is_err());
        assert!(differentiate_n(&e, "x", 11).is_err());
    }

    #[test]
    fn piecewise_differentiates_per_case() {
        let e = Expr::Piecewise {
            cases: vec![
                PiecewiseCase {
                    value: Expr::power(var("x"), Expr::Number(2.0)),
                    condition: Some(Expr::Comparison {
                        op: crate::ast::ComparisonOperator::GreaterThan,
                        left: Box::new(var("x")),
                        right: Box::new(Expr::Number(0.0)),
                    }),
                },
                PiecewiseCase {
                    value: var("x"),
                    condition: None,
                },
            ],
        };
        match differentiate(&e, "x").unwrap() {
            Expr::Piecewise { cases } => {
                assert_eq!(cases.len(), 2);
                assert!(cases[0].condition.is_some());
                assert_eq!(cases[1].value, Expr::Number(1.0));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn general_power_rule() {
        // d/dx x^x = x^x (ln x + 1)
        let e = Expr::power(var("x"), var("x"));
        let result = differentiate(&e, "x").unwrap();
        // Check numerically at x = 2: 4·(ln 2 + 1)
        let mut env = crate::environment::Environment::new();
        let mut evaluator =
            crate::eval::Evaluator::new(&mut env, crate::eval::EvalOptions::default());
        let mut locals = std::collections::HashMap::new();
        locals.insert("x".to_string(), crate::value::Value::Numeric(2.0));
        let value = evaluator.evaluate(&result, &locals).unwrap();
        let expected = 4.0 * (2.0f64.ln() + 1.0);
        assert!((value.as_numeric().unwrap() - expected).abs() < 1e-9);
    }
}
