//! Canonical TeX writer
//!
//! Emits a source form that parses back to a structurally equal tree. Parens
//! are inserted whenever operator precedence or associativity would
//! otherwise change the shape: the left child of a left-associative operator
//! may share its precedence, the right child must bind strictly tighter
//! (mirrored for the right-associative power).

use crate::ast::{
    BinaryOperator, ComparisonOperator, Expr, LimitSide, LogicOperator, UnaryOperator,
};
use crate::error::Result;
use crate::export::check_depth;
use crate::lexer;
use std::fmt::Write;

/// Binding strengths, loosest to tightest.
mod prec {
    pub const IFF: u8 = 1;
    pub const IMPLIES: u8 = 2;
    pub const OR: u8 = 3;
    pub const XOR: u8 = 4;
    pub const AND: u8 = 5;
    pub const NOT: u8 = 6;
    pub const COMPARISON: u8 = 7;
    pub const ADDITIVE: u8 = 8;
    pub const MULTIPLICATIVE: u8 = 9;
    pub const UNARY: u8 = 10;
    pub const POWER: u8 = 11;
    pub const POSTFIX: u8 = 12;
    pub const ATOM: u8 = 13;
}

pub fn to_latex(expr: &Expr) -> Result<String> {
    let mut out = String::new();
    write_expr(&mut out, expr, 0, 0)?;
    Ok(out)
}

fn write_expr(out: &mut String, expr: &Expr, min_prec: u8, depth: usize) -> Result<()> {
    check_depth(depth)?;
    let own = precedence(expr);
    if own < min_prec {
        out.push('(');
        write_expr(out, expr, 0, depth + 1)?;
        out.push(')');
        return Ok(());
    }

    match expr {
        Expr::Number(n) => write_number(out, *n),

        Expr::Variable(name) => write_variable(out, name),

        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => {
            out.push('-');
            write_expr(out, operand, prec::UNARY, depth + 1)?;
        }

        Expr::BinaryOp { op, left, right } => match op {
            BinaryOperator::Divide => {
                out.push_str("\\frac{");
                write_expr(out, left, 0, depth + 1)?;
                out.push_str("}{");
                write_expr(out, right, 0, depth + 1)?;
                out.push('}');
            }
            BinaryOperator::Power => {
                write_expr(out, left, prec::POSTFIX, depth + 1)?;
                // `^{T}` would reparse as the transpose postfix; a genuine
                // power with exponent T needs extra parens
                if matches!(&**right, Expr::Variable(name) if name == "T") {
                    out.push_str("^{(T)}");
                } else {
                    out.push_str("^{");
                    write_expr(out, right, 0, depth + 1)?;
                    out.push('}');
                }
            }
            BinaryOperator::Add | BinaryOperator::Subtract => {
                write_expr(out, left, prec::ADDITIVE, depth + 1)?;
                out.push_str(if *op == BinaryOperator::Add {
                    " + "
                } else {
                    " - "
                });
                write_expr(out, right, prec::ADDITIVE + 1, depth + 1)?;
            }
            BinaryOperator::Multiply | BinaryOperator::Cross => {
                write_expr(out, left, prec::MULTIPLICATIVE, depth + 1)?;
                out.push_str(if *op == BinaryOperator::Multiply {
                    " \\cdot "
                } else {
                    " \\times "
                });
                write_expr(out, right, prec::MULTIPLICATIVE + 1, depth + 1)?;
            }
        },

        Expr::FunctionCall {
            name,
            args,
            base,
            index,
        } => write_function_call(out, name, args, base.as_deref(), index.as_deref(), depth)?,

        Expr::AbsoluteValue(inner) => {
            out.push('|');
            write_expr(out, inner, 0, depth + 1)?;
            out.push('|');
        }

        Expr::Comparison { op, left, right } => {
            write_expr(out, left, prec::COMPARISON + 1, depth + 1)?;
            write!(out, " {} ", comparison_symbol(*op)).expect("string write");
            write_expr(out, right, prec::COMPARISON + 1, depth + 1)?;
        }

        Expr::ChainedComparison {
            operands,
            operators,
        } => {
            write_expr(out, &operands[0], prec::COMPARISON + 1, depth + 1)?;
            for (op, operand) in operators.iter().zip(&operands[1..]) {
                write!(out, " {} ", comparison_symbol(*op)).expect("string write");
                write_expr(out, operand, prec::COMPARISON + 1, depth + 1)?;
            }
        }

        Expr::LogicOp { op, operands } => match op {
            LogicOperator::Not => {
                out.push_str("\\lnot ");
                write_expr(out, &operands[0], prec::NOT, depth + 1)?;
            }
            _ => {
                let (symbol, own) = match op {
                    LogicOperator::And => ("\\land", prec::AND),
                    LogicOperator::Or => ("\\lor", prec::OR),
                    LogicOperator::Xor => ("\\oplus", prec::XOR),
                    LogicOperator::Implies => ("\\Rightarrow", prec::IMPLIES),
                    LogicOperator::Iff => ("\\Leftrightarrow", prec::IFF),
                    LogicOperator::Not => unreachable!(),
                };
                // Implication chains are right-associative
                let (left_min, right_min) = if *op == LogicOperator::Implies {
                    (own + 1, own)
                } else {
                    (own, own + 1)
                };
                write_expr(out, &operands[0], left_min, depth + 1)?;
                write!(out, " {} ", symbol).expect("string write");
                write_expr(out, &operands[1], right_min, depth + 1)?;
            }
        },

        Expr::Conditional { value, condition } => {
            write_expr(out, value, prec::ADDITIVE, depth + 1)?;
            out.push_str(", ");
            write_expr(out, condition, 0, depth + 1)?;
        }

        Expr::Piecewise { cases } => {
            out.push_str("\\begin{cases} ");
            for (k, case) in cases.iter().enumerate() {
                if k > 0 {
                    out.push_str(" \\\\ ");
                }
                write_expr(out, &case.value, 0, depth + 1)?;
                out.push_str(" & ");
                match &case.condition {
                    Some(condition) => write_expr(out, condition, 0, depth + 1)?,
                    None => out.push_str("\\text{otherwise}"),
                }
            }
            out.push_str(" \\end{cases}");
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
                "\\sum_{"
            } else {
                "\\prod_{"
            });
            write_variable(out, index);
            out.push_str(" = ");
            write_expr(out, lower, 0, depth + 1)?;
            out.push_str("}^{");
            write_expr(out, upper, 0, depth + 1)?;
            out.push_str("} {");
            write_expr(out, body, 0, depth + 1)?;
            out.push('}');
        }

        Expr::Limit {
            variable,
            target,
            body,
            side,
        } => {
            out.push_str("\\lim_{");
            write_variable(out, variable);
            out.push_str(" \\to ");
            write_expr(out, target, 0, depth + 1)?;
            match side {
                LimitSide::Right => out.push_str("^+"),
                LimitSide::Left => out.push_str("^-"),
                LimitSide::Both => {}
            }
            out.push_str("} {");
            write_expr(out, body, 0, depth + 1)?;
            out.push('}');
        }

        Expr::Integral {
            variable,
            lower,
            upper,
            body,
            closed,
        } => {
            out.push_str(if *closed { "\\oint" } else { "\\int" });
            if let Some(lower) = lower {
                out.push_str("_{");
                write_expr(out, lower, 0, depth + 1)?;
                out.push('}');
            }
            if let Some(upper) = upper {
                out.push_str("^{");
                write_expr(out, upper, 0, depth + 1)?;
                out.push('}');
            }
            out.push_str(" {");
            write_expr(out, body, 0, depth + 1)?;
            out.push_str("} \\, d");
            write_variable(out, variable);
        }

        Expr::MultiIntegral {
            order,
            variables,
            lower,
            upper,
            body,
        } => {
            out.push_str(if *order == 2 { "\\iint" } else { "\\iiint" });
            if let Some(lower) = lower {
                out.push_str("_{");
                write_expr(out, lower, 0, depth + 1)?;
                out.push('}');
            }
            if let Some(upper) = upper {
                out.push_str("^{");
                write_expr(out, upper, 0, depth + 1)?;
                out.push('}');
            }
            out.push_str(" {");
            write_expr(out, body, 0, depth + 1)?;
            out.push('}');
            for variable in variables {
                out.push_str(" \\, d");
                write_variable(out, variable);
            }
        }

        Expr::Derivative {
            variable,
            order,
            body,
        } => {
            if *order == 1 {
                out.push_str("\\frac{d}{d");
                write_variable(out, variable);
                out.push('}');
            } else {
                write!(out, "\\frac{{d^{{{}}}}}{{d", order).expect("string write");
                write_variable(out, variable);
                write!(out, "^{{{}}}}}", order).expect("string write");
            }
            out.push('{');
            write_expr(out, body, 0, depth + 1)?;
            out.push('}');
        }

        Expr::PartialDerivative {
            variable,
            order,
            body,
        } => {
            if *order == 1 {
                out.push_str("\\frac{\\partial}{\\partial ");
                write_variable(out, variable);
                out.push('}');
            } else {
                write!(out, "\\frac{{\\partial^{{{}}}}}{{\\partial ", order)
                    .expect("string write");
                write_variable(out, variable);
                write!(out, "^{{{}}}}}", order).expect("string write");
            }
            out.push('{');
            write_expr(out, body, 0, depth + 1)?;
            out.push('}');
        }

        Expr::Gradient(body) => {
            out.push_str("\\nabla {");
            write_expr(out, body, 0, depth + 1)?;
            out.push('}');
        }

        Expr::Binom { n, k } => {
            out.push_str("\\binom{");
            write_expr(out, n, 0, depth + 1)?;
            out.push_str("}{");
            write_expr(out, k, 0, depth + 1)?;
            out.push('}');
        }

        Expr::Matrix { rows, bracket } => {
            let env = bracket.environment_name();
            write!(out, "\\begin{{{}}} ", env).expect("string write");
            for (r, row) in rows.iter().enumerate() {
                if r > 0 {
                    out.push_str(" \\\\ ");
                }
                for (c, cell) in row.iter().enumerate() {
                    if c > 0 {
                        out.push_str(" & ");
                    }
                    write_expr(out, cell, 0, depth + 1)?;
                }
            }
            write!(out, " \\end{{{}}}", env).expect("string write");
        }

        Expr::Vector { components, unit } => {
            out.push_str(if *unit { "\\hat{" } else { "\\vec{" });
            for (k, component) in components.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                write_expr(out, component, 0, depth + 1)?;
            }
            out.push('}');
        }

        Expr::Assignment { name, value } => {
            out.push_str("let ");
            write_variable(out, name);
            out.push_str(" = ");
            write_expr(out, value, 0, depth + 1)?;
        }

        Expr::FunctionDefinition { name, params, body } => {
            write_variable(out, name);
            out.push('(');
            for (k, param) in params.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                write_variable(out, param);
            }
            out.push_str(") = ");
            write_expr(out, body, 0, depth + 1)?;
        }
    }
    Ok(())
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Number(n) if *n < 0.0 => prec::UNARY,
        Expr::BinaryOp { op, .. } => match op {
            BinaryOperator::Add | BinaryOperator::Subtract => prec::ADDITIVE,
            BinaryOperator::Multiply | BinaryOperator::Cross => prec::MULTIPLICATIVE,
            BinaryOperator::Power => prec::POWER,
            // \frac{}{} carries its own grouping
            BinaryOperator::Divide => prec::ATOM,
        },
        Expr::UnaryOp { .. } => prec::UNARY,
        Expr::Comparison { .. } | Expr::ChainedComparison { .. } => prec::COMPARISON,
        Expr::LogicOp { op, .. } => match op {
            LogicOperator::Iff => prec::IFF,
            LogicOperator::Implies => prec::IMPLIES,
            LogicOperator::Or => prec::OR,
            LogicOperator::Xor => prec::XOR,
            LogicOperator::And => prec::AND,
            LogicOperator::Not => prec::NOT,
        },
        Expr::Conditional { .. } | Expr::Assignment { .. } | Expr::FunctionDefinition { .. } => 0,
        // The prefix forms take an operand without self-delimiting braces
        Expr::Sum { .. }
        | Expr::Product { .. }
        | Expr::Limit { .. }
        | Expr::Integral { .. }
        | Expr::MultiIntegral { .. }
        | Expr::Gradient(_) => prec::MULTIPLICATIVE,
        _ => prec::ATOM,
    }
}

fn write_number(out: &mut String, n: f64) {
    if n.is_nan() {
        out.push_str("\\mathrm{NaN}");
    } else if n == f64::INFINITY {
        out.push_str("\\infty");
    } else if n == f64::NEG_INFINITY {
        out.push_str("-\\infty");
    } else {
        write!(out, "{}", n).expect("string write");
    }
}

/// Greek names and `infinity` re-emit as commands; font-qualified names as
/// their font form; subscripted names with braces.
fn write_variable(out: &mut String, name: &str) {
    if name == "infinity" {
        out.push_str("\\infty");
        return;
    }
    if let Some((font, inner)) = name.split_once(':') {
        write!(out, "\\{}{{{}}}", font, inner).expect("string write");
        return;
    }
    if let Some((stem, subscript)) = name.split_once('_') {
        write_variable(out, stem);
        write!(out, "_{{{}}}", subscript).expect("string write");
        return;
    }
    if name.len() > 1 && lexer::is_letter_command(name) {
        out.push('\\');
        out.push_str(name);
        return;
    }
    out.push_str(name);
}

fn write_function_call(
    out: &mut String,
    name: &str,
    args: &[Expr],
    base: Option<&Expr>,
    index: Option<&Expr>,
    depth: usize,
) -> Result<()> {
    match name {
        "sqrt" => {
            out.push_str("\\sqrt");
            if let Some(index) = index {
                out.push('[');
                write_expr(out, index, 0, depth + 1)?;
                out.push(']');
            }
            out.push('{');
            write_expr(out, &args[0], 0, depth + 1)?;
            out.push('}');
        }
        "log" => {
            out.push_str("\\log");
            if let Some(base) = base {
                out.push_str("_{");
                write_expr(out, base, 0, depth + 1)?;
                out.push('}');
            }
            out.push_str("{(");
            write_expr(out, &args[0], 0, depth + 1)?;
            out.push_str(")}");
        }
        "factorial" => {
            write_expr(out, &args[0], prec::ATOM, depth + 1)?;
            out.push('!');
        }
        "transpose" => {
            write_expr(out, &args[0], prec::ATOM, depth + 1)?;
            out.push_str("^T");
        }
        "norm" => {
            out.push_str("\\|");
            write_expr(out, &args[0], 0, depth + 1)?;
            out.push_str("\\|");
        }
        _ => {
            if crate::functions::lookup(name).is_some() {
                out.push('\\');
            }
            out.push_str(name);
            out.push('(');
            for (k, arg) in args.iter().enumerate() {
                if k > 0 {
                    out.push_str(", ");
                }
                write_expr(out, arg, 0, depth + 1)?;
            }
            out.push(')');
        }
    }
    Ok(())
}

fn comparison_symbol(op: ComparisonOperator) -> &'static str {
    match op {
        ComparisonOperator::LessThan => "<",
        ComparisonOperator::LessThanOrEqual => "\\leq",
        ComparisonOperator::GreaterThan => ">",
        ComparisonOperator::GreaterThanOrEqual => "\\geq",
        ComparisonOperator::Equal => "=",
        ComparisonOperator::NotEqual => "\\neq",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn round_trip(source: &str) {
        let parsed = parse_source(source).unwrap();
        let printed = to_latex(&parsed).unwrap();
        let reparsed = parse_source(&printed)
            .unwrap_or_else(|e| panic!("reparse of '{}' failed: {}", printed, e));
        assert_eq!(parsed, reparsed, "round trip failed via '{}'", printed);
    }

    #[test]
    fn round_trip_arithmetic() {
        round_trip("2 + 3 * 4");
        round_trip("2 - (3 - 4)");
        round_trip("-x^2");
        round_trip("\\frac{1}{2}");
        round_trip("2^3^2");
        round_trip("x y z");
    }

    #[test]
    fn round_trip_functions() {
        round_trip("\\sin x");
        round_trip("\\sqrt[3]{x + 1}");
        round_trip("\\log_{2} 8");
        round_trip("\\max(1, 2, 3)");
        round_trip("5!");
        round_trip("|x - 1|");
    }

    #[test]
    fn round_trip_calculus() {
        round_trip("\\sum_{i=1}^{5} i");
        round_trip("\\prod_{k=1}^{4} k");
        round_trip("\\int_0^1 x^2 dx");
        round_trip("\\oint x dx");
        round_trip("\\lim_{x \\to 0^+} \\frac{1}{x}");
        round_trip("\\frac{d^2}{dx^2}{x^3}");
        round_trip("\\frac{\\partial}{\\partial x}(x y)");
        round_trip("\\nabla{x^2 y}");
    }

    #[test]
    fn round_trip_structures() {
        round_trip("\\begin{pmatrix} 1 & 2 \\\\ 3 & 4 \\end{pmatrix}");
        round_trip("\\begin{cases} x & x > 0 \\\\ -x & \\text{otherwise} \\end{cases}");
        round_trip("\\vec{1, 2, 3}");
        round_trip("\\binom{5}{2}");
        round_trip("let y = x + 1");
        round_trip("f(a, b) = a b");
    }

    #[test]
    fn round_trip_logic() {
        round_trip("a \\land b \\lor c");
        round_trip("\\lnot p \\Rightarrow q \\Rightarrow r");
        round_trip("1 < x < 3");
        round_trip("x \\leq 2 \\land x \\neq 0");
    }

    #[test]
    fn round_trip_greek_and_fonts() {
        round_trip("\\alpha + \\beta");
        round_trip("\\mathbf{X} + 1");
        round_trip("x_1 + x_{10}");
        round_trip("2 \\pi");
    }

    #[test]
    fn braceless_frac_normalizes() {
        let short = parse_source("\\frac12").unwrap();
        let braced = parse_source("\\frac{1}{2}").unwrap();
        assert_eq!(short, braced);
        assert_eq!(parse_source(&to_latex(&short).unwrap()).unwrap(), braced);
    }

    #[test]
    fn precedence_forces_parens() {
        let e = Expr::multiply(
            Expr::add(Expr::variable("a"), Expr::variable("b")),
            Expr::variable("c"),
        );
        assert_eq!(to_latex(&e).unwrap(), "(a + b) \\cdot c");
    }
}
