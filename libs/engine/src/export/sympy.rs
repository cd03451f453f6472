//! SymPy surface-syntax writer
//!
//! Emits expressions SymPy's parser accepts: `Sum(body, (var, lo, hi))`,
//! `integrate(body, var)`, `diff(body, var, n)`, `Matrix([[...]])`,
//! `Piecewise((expr, cond), ...)`, and so on. `e` maps to `E`, `pi` to
//! `pi`, `infinity` to `oo`. The script helper declares the free variables
//! with `symbols(...)`.

use crate::ast::{
    BinaryOperator, ComparisonOperator, Expr, LimitSide, LogicOperator, UnaryOperator,
};
use crate::error::{Error, Result};
use crate::export::check_depth;
use std::fmt::Write;

pub fn to_sympy(expr: &Expr) -> Result<String> {
    let mut out = String::new();
    write_expr(&mut out, expr, 0)?;
    Ok(out)
}

/// A runnable script skeleton: imports, symbol declarations, the
/// expression, and a print.
pub fn to_sympy_script(expr: &Expr) -> Result<String> {
    let body = to_sympy(expr)?;
    let mut script = String::from("from sympy import *\n\n");
    let variables = expr.free_variables();
    if !variables.is_empty() {
        let names: Vec<String> = variables.iter().map(|v| sympy_name(v)).collect();
        if names.len() == 1 {
            writeln!(script, "{} = symbols('{}')", names[0], names[0]).expect("string write");
        } else {
            writeln!(
                script,
                "{} = symbols('{}')",
                names.join(", "),
                names.join(" ")
            )
            .expect("string write");
        }
        script.push('\n');
    }
    writeln!(script, "expr = {}", body).expect("string write");
    script.push_str("print(expr)\n");
    Ok(script)
}

fn sympy_name(name: &str) -> String {
    match name {
        "e" => "E".to_string(),
        "infinity" => "oo".to_string(),
        _ => name.replace(':', "_"),
    }
}

fn write_expr(out: &mut String, expr: &Expr, depth: usize) -> Result<()> {
    check_depth(depth)?;
    match expr {
        Expr::Number(n) => {
            if n.is_nan() {
                out.push_str("nan");
            } else if *n == f64::INFINITY {
                out.push_str("oo");
            } else if *n == f64::NEG_INFINITY {
                out.push_str("-oo");
            } else {
                write!(out, "{}", n).expect("string write");
            }
        }

        Expr::Variable(name) => out.push_str(&sympy_name(name)),

        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => {
            out.push_str("-(");
            write_expr(out, operand, depth + 1)?;
            out.push(')');
        }

        Expr::BinaryOp { op, left, right } => {
            let symbol = match op {
                BinaryOperator::Add => " + ",
                BinaryOperator::Subtract => " - ",
                BinaryOperator::Multiply | BinaryOperator::Cross => "*",
                BinaryOperator::Divide => "/",
                BinaryOperator::Power => "**",
            };
            out.push('(');
            write_expr(out, left, depth + 1)?;
            out.push_str(symbol);
            write_expr(out, right, depth + 1)?;
            out.push(')');
        }

        Expr::FunctionCall {
            name,
            args,
            base,
            index,
        } => write_function(out, name, args, base.as_deref(), index.as_deref(), depth)?,

        Expr::AbsoluteValue(inner) => {
            out.push_str("Abs(");
            write_expr(out, inner, depth + 1)?;
            out.push(')');
        }

        Expr::Comparison { op, left, right } => {
            let symbol = match op {
                ComparisonOperator::LessThan => " < ",
                ComparisonOperator::LessThanOrEqual => " <= ",
                ComparisonOperator::GreaterThan => " > ",
                ComparisonOperator::GreaterThanOrEqual => " >= ",
                ComparisonOperator::Equal => "",
                ComparisonOperator::NotEqual => "",
            };
            match op {
                ComparisonOperator::Equal => {
                    out.push_str("Eq(");
                    write_expr(out, left, depth + 1)?;
                    out.push_str(", ");
                    write_expr(out, right, depth + 1)?;
                    out.push(')');
                }
                ComparisonOperator::NotEqual => {
                    out.push_str("Ne(");
                    write_expr(out, left, depth + 1)?;
                    out.push_str(", ");
                    write_expr(out, right, depth + 1)?;
                    out.push(')');
                }
                _ => {
                    out.push('(');
                    write_expr(out, left, depth + 1)?;
                    out.push_str(symbol);
                    write_expr(out, right, depth + 1)?;
                    out.push(')');
                }
            }
        }

        Expr::ChainedComparison {
            operands,
            operators,
        } => {
            // SymPy has no chains; emit the conjunction of adjacent pairs
            out.push_str("And(");
            for (k, op) in operators.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                let pair = Expr::Comparison {
                    op: *op,
                    left: Box::new(operands[k].clone()),
                    right: Box::new(operands[k + 1].clone()),
                };
                write_expr(out, &pair, depth + 1)?;
            }
            out.push(')');
        }

        Expr::LogicOp { op, operands } => {
            let name = match op {
                LogicOperator::And => "And",
                LogicOperator::Or => "Or",
                LogicOperator::Not => "Not",
                LogicOperator::Xor => "Xor",
                LogicOperator::Implies => "Implies",
                LogicOperator::Iff => "Equivalent",
            };
            out.push_str(name);
            out.push('(');
            for (k, operand) in operands.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                write_expr(out, operand, depth + 1)?;
            }
            out.push(')');
        }

        Expr::Conditional { value, condition } => {
            out.push_str("Piecewise((");
            write_expr(out, value, depth + 1)?;
            out.push_str(", ");
            write_expr(out, condition, depth + 1)?;
            out.push_str("), (nan, True))");
        }

        Expr::Piecewise { cases } => {
            out.push_str("Piecewise(");
            for (k, case) in cases.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                out.push('(');
                write_expr(out, &case.value, depth + 1)?;
                out.push_str(", ");
                match &case.condition {
                    Some(condition) => write_expr(out, condition, depth + 1)?,
                    None => out.push_str("True"),
                }
                out.push(')');
            }
            out.push(')');
        }

        Expr::Sum {
            index,
            lower,
            upper,
            body,
        }
        | Expr::Product {
            index,
            lower,
            upper,
            body,
        } => {
            out.push_str(if matches!(expr, Expr::Sum { .. }) {
                "Sum("
            } else {
                "Product("
            });
            write_expr(out, body, depth + 1)?;
            out.push_str(", (");
            out.push_str(&sympy_name(index));
            out.push_str(", ");
            write_expr(out, lower, depth + 1)?;
            out.push_str(", ");
            write_expr(out, upper, depth + 1)?;
            out.push_str("))");
        }

        Expr::Limit {
            variable,
            target,
            body,
            side,
        } => {
            out.push_str("limit(");
            write_expr(out, body, depth + 1)?;
            out.push_str(", ");
            out.push_str(&sympy_name(variable));
            out.push_str(", ");
            write_expr(out, target, depth + 1)?;
            match side {
                LimitSide::Right => out.push_str(", '+'"),
                LimitSide::Left => out.push_str(", '-'"),
                LimitSide::Both => {}
            }
            out.push(')');
        }

        Expr::Integral {
            variable,
            lower,
            upper,
            body,
            ..
        } => {
            out.push_str("integrate(");
            write_expr(out, body, depth + 1)?;
            out.push_str(", ");
            match (lower, upper) {
                (Some(lower), Some(upper)) => {
                    out.push('(');
                    out.push_str(&sympy_name(variable));
                    out.push_str(", ");
                    write_expr(out, lower, depth + 1)?;
                    out.push_str(", ");
                    write_expr(out, upper, depth + 1)?;
                    out.push(')');
                }
                _ => out.push_str(&sympy_name(variable)),
            }
            out.push(')');
        }

        Expr::MultiIntegral {
            variables,
            lower,
            upper,
            body,
            ..
        } => {
            out.push_str("integrate(");
            write_expr(out, body, depth + 1)?;
            for variable in variables {
                out.push_str(", ");
                match (lower, upper) {
                    (Some(lower), Some(upper)) => {
                        out.push('(');
                        out.push_str(&sympy_name(variable));
                        out.push_str(", ");
                        write_expr(out, lower, depth + 1)?;
                        out.push_str(", ");
                        write_expr(out, upper, depth + 1)?;
                        out.push(')');
                    }
                    _ => out.push_str(&sympy_name(variable)),
                }
            }
            out.push(')');
        }

        Expr::Derivative {
            variable,
            order,
            body,
        }
        | Expr::PartialDerivative {
            variable,
            order,
            body,
        } => {
            out.push_str("diff(");
            write_expr(out, body, depth + 1)?;
            out.push_str(", ");
            out.push_str(&sympy_name(variable));
            if *order > 1 {
                write!(out, ", {}", order).expect("string write");
            }
            out.push(')');
        }

        Expr::Gradient(body) => {
            // Component-wise derivative tuple over the free variables
            let variables = body.free_variables();
            out.push('(');
            for (k, variable) in variables.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                out.push_str("diff(");
                write_expr(out, body, depth + 1)?;
                out.push_str(", ");
                out.push_str(&sympy_name(variable));
                out.push(')');
            }
            out.push(')');
        }

        Expr::Binom { n, k } => {
            out.push_str("binomial(");
            write_expr(out, n, depth + 1)?;
            out.push_str(", ");
            write_expr(out, k, depth + 1)?;
            out.push(')');
        }

        Expr::Matrix { rows, .. } => {
            out.push_str("Matrix([");
            for (r, row) in rows.iter().enumerate() {
                if r > 0 {
                    out.push_str(", ");
                }
                out.push('[');
                for (c, cell) in row.iter().enumerate() {
                    if c > 0 {
                        out.push_str(", ");
                    }
                    write_expr(out, cell, depth + 1)?;
                }
                out.push(']');
            }
            out.push_str("])");
        }

        Expr::Vector { components, .. } => {
            out.push_str("Matrix([");
            for (k, component) in components.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                write_expr(out, component, depth + 1)?;
            }
            out.push_str("])");
        }

        Expr::Assignment { name, value } => {
            out.push_str(&sympy_name(name));
            out.push_str(" = ");
            write_expr(out, value, depth + 1)?;
        }

        Expr::FunctionDefinition { .. } => {
            return Err(Error::evaluation(
                "function definitions have no SymPy expression form",
            ))
        }
    }
    Ok(())
}

fn write_function(
    out: &mut String,
    name: &str,
    args: &[Expr],
    base: Option<&Expr>,
    index: Option<&Expr>,
    depth: usize,
) -> Result<()> {
    match name {
        "sqrt" => match index {
            // n-th root as a rational power
            Some(index) => {
                out.push_str("Pow(");
                write_expr(out, &args[0], depth + 1)?;
                out.push_str(", Rational(1, ");
                write_expr(out, index, depth + 1)?;
                out.push_str("))");
            }
            None => {
                out.push_str("sqrt(");
                write_expr(out, &args[0], depth + 1)?;
                out.push(')');
            }
        },
        "log" => {
            out.push_str("log(");
            write_expr(out, &args[0], depth + 1)?;
            out.push_str(", ");
            match base {
                Some(base) => write_expr(out, base, depth + 1)?,
                None => out.push_str("10"),
            }
            out.push(')');
        }
        "ln" => {
            out.push_str("log(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "arcsin" | "arccos" | "arctan" => {
            // SymPy spells these asin/acos/atan
            out.push('a');
            out.push_str(&name[3..]);
            out.push('(');
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "abs" => {
            out.push_str("Abs(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "ceil" => {
            out.push_str("ceiling(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "factorial" => {
            out.push_str("factorial(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "transpose" => {
            write_expr(out, &args[0], depth + 1)?;
            out.push_str(".T");
        }
        "inverse" => {
            write_expr(out, &args[0], depth + 1)?;
            out.push_str("**-1");
        }
        "trace" => {
            out.push_str("trace(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "norm" => {
            write_expr(out, &args[0], depth + 1)?;
            out.push_str(".norm()");
        }
        "sign" => {
            out.push_str("sign(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "Re" => {
            out.push_str("re(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "Im" => {
            out.push_str("im(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        "conj" => {
            out.push_str("conjugate(");
            write_expr(out, &args[0], depth + 1)?;
            out.push(')');
        }
        _ => {
            out.push_str(name);
            out.push('(');
            for (k, arg) in args.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg, depth + 1)?;
            }
            out.push(')');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn sympy_of(source: &str) -> String {
        to_sympy(&parse_source(source).unwrap()).unwrap()
    }

    #[test]
    fn arithmetic_operators() {
        assert_eq!(sympy_of("2 + 3 * 4"), "(2 + (3*4))");
        assert_eq!(sympy_of("x^2"), "(x**2)");
    }

    #[test]
    fn constants_map_to_sympy_names() {
        assert_eq!(sympy_of("e^x"), "(E**x)");
        assert_eq!(sympy_of("\\pi"), "pi");
        assert_eq!(sympy_of("\\infty"), "oo");
    }

    #[test]
    fn sum_form() {
        assert_eq!(sympy_of("\\sum_{i=1}^{5} i"), "Sum(i, (i, 1, 5))");
    }

    #[test]
    fn integral_forms() {
        assert_eq!(sympy_of("\\int x dx"), "integrate(x, x)");
        assert_eq!(sympy_of("\\int_0^1 x dx"), "integrate(x, (x, 0, 1))");
    }

    #[test]
    fn derivative_form() {
        assert_eq!(sympy_of("\\frac{d^2}{dx^2}{x^3}"), "diff((x**3), x, 2)");
    }

    #[test]
    fn matrix_and_piecewise() {
        assert_eq!(
            sympy_of("\\begin{matrix} 1 & 2 \\\\ 3 & 4 \\end{matrix}"),
            "Matrix([[1, 2], [3, 4]])"
        );
        assert_eq!(
            sympy_of("\\begin{cases} x & x > 0 \\\\ 0 & \\text{otherwise} \\end{cases}"),
            "Piecewise((x, (x > 0)), (0, True))"
        );
    }

    #[test]
    fn binom_and_factorial_and_log() {
        assert_eq!(sympy_of("\\binom{5}{2}"), "binomial(5, 2)");
        assert_eq!(sympy_of("5!"), "factorial(5)");
        assert_eq!(sympy_of("\\log_{2} x"), "log(x, 2)");
        assert_eq!(sympy_of("\\ln x"), "log(x)");
    }

    #[test]
    fn script_declares_free_variables() {
        let expr = parse_source("x^2 + y").unwrap();
        let script = to_sympy_script(&expr).unwrap();
        assert!(script.starts_with("from sympy import *"));
        assert!(script.contains("x, y = symbols('x y')"));
        assert!(script.contains("expr = "));
    }
}
