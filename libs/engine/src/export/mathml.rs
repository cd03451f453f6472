//! Presentation MathML writer
//!
//! Emits the W3C presentation dialect with Unicode operator glyphs. The
//! fragment form has no wrapper; `to_mathml_document` adds the `<math>` root
//! with the standard namespace. Output is well-formed XML: every element
//! this writer opens, it closes.

use crate::ast::{
    BinaryOperator, ComparisonOperator, Expr, LimitSide, LogicOperator, UnaryOperator,
};
use crate::error::Result;
use crate::export::check_depth;
use crate::lexer;
use std::fmt::Write;

/// MathML namespace for the document wrapper.
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";

pub fn to_mathml(expr: &Expr) -> Result<String> {
    let mut out = String::new();
    write_node(&mut out, expr, 0)?;
    Ok(out)
}

pub fn to_mathml_document(expr: &Expr) -> Result<String> {
    Ok(format!(
        "<math xmlns=\"{}\">{}</math>",
        MATHML_NAMESPACE,
        to_mathml(expr)?
    ))
}

fn mo(out: &mut String, glyph: &str) {
    write!(out, "<mo>{}</mo>", glyph).expect("string write");
}

fn mi(out: &mut String, name: &str) {
    write!(out, "<mi>{}</mi>", escape(name)).expect("string write");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn write_node(out: &mut String, expr: &Expr, depth: usize) -> Result<()> {
    check_depth(depth)?;
    match expr {
        Expr::Number(n) => {
            if n.is_infinite() {
                if *n < 0.0 {
                    out.push_str("<mrow><mo>−</mo><mi>∞</mi></mrow>");
                } else {
                    out.push_str("<mi>∞</mi>");
                }
            } else {
                write!(out, "<mn>{}</mn>", n).expect("string write");
            }
        }

        Expr::Variable(name) => write_variable(out, name),

        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => {
            out.push_str("<mrow><mo>−</mo>");
            write_grouped(out, operand, depth + 1)?;
            out.push_str("</mrow>");
        }

        Expr::BinaryOp { op, left, right } => match op {
            BinaryOperator::Divide => {
                out.push_str("<mfrac><mrow>");
                write_node(out, left, depth + 1)?;
                out.push_str("</mrow><mrow>");
                write_node(out, right, depth + 1)?;
                out.push_str("</mrow></mfrac>");
            }
            BinaryOperator::Power => {
                out.push_str("<msup><mrow>");
                write_grouped(out, left, depth + 1)?;
                out.push_str("</mrow><mrow>");
                write_node(out, right, depth + 1)?;
                out.push_str("</mrow></msup>");
            }
            _ => {
                let glyph = match op {
                    BinaryOperator::Add => "+",
                    BinaryOperator::Subtract => "−",
                    BinaryOperator::Multiply => "⋅",
                    BinaryOperator::Cross => "×",
                    _ => unreachable!(),
                };
                out.push_str("<mrow>");
                write_grouped(out, left, depth + 1)?;
                mo(out, glyph);
                write_grouped(out, right, depth + 1)?;
                out.push_str("</mrow>");
            }
        },

        Expr::FunctionCall {
            name,
            args,
            base,
            index,
        } => write_function(out, name, args, base.as_deref(), index.as_deref(), depth)?,

        Expr::AbsoluteValue(inner) => {
            out.push_str("<mrow><mo>|</mo>");
            write_node(out, inner, depth + 1)?;
            out.push_str("<mo>|</mo></mrow>");
        }

        Expr::Comparison { op, left, right } => {
            out.push_str("<mrow>");
            write_node(out, left, depth + 1)?;
            mo(out, comparison_glyph(*op));
            write_node(out, right, depth + 1)?;
            out.push_str("</mrow>");
        }

        Expr::ChainedComparison {
            operands,
            operators,
        } => {
            out.push_str("<mrow>");
            write_node(out, &operands[0], depth + 1)?;
            for (op, operand) in operators.iter().zip(&operands[1..]) {
                mo(out, comparison_glyph(*op));
                write_node(out, operand, depth + 1)?;
            }
            out.push_str("</mrow>");
        }

        Expr::LogicOp { op, operands } => {
            out.push_str("<mrow>");
            match op {
                LogicOperator::Not => {
                    mo(out, "¬");
                    write_grouped(out, &operands[0], depth + 1)?;
                }
                _ => {
                    let glyph = match op {
                        LogicOperator::And => "∧",
                        LogicOperator::Or => "∨",
                        LogicOperator::Xor => "⊕",
                        LogicOperator::Implies => "⇒",
                        LogicOperator::Iff => "⇔",
                        LogicOperator::Not => unreachable!(),
                    };
                    write_grouped(out, &operands[0], depth + 1)?;
                    mo(out, glyph);
                    write_grouped(out, &operands[1], depth + 1)?;
                }
            }
            out.push_str("</mrow>");
        }

        Expr::Conditional { value, condition } => {
            out.push_str("<mrow>");
            write_node(out, value, depth + 1)?;
            mo(out, ",");
            write_node(out, condition, depth + 1)?;
            out.push_str("</mrow>");
        }

        Expr::Piecewise { cases } => {
            out.push_str("<mrow><mo>{</mo><mtable>");
            for case in cases {
                out.push_str("<mtr><mtd>");
                write_node(out, &case.value, depth + 1)?;
                out.push_str("</mtd><mtd>");
                match &case.condition {
                    Some(condition) => write_node(out, condition, depth + 1)?,
                    None => out.push_str("<mtext>otherwise</mtext>"),
                }
                out.push_str("</mtd></mtr>");
            }
            out.push_str("</mtable></mrow>");
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
            let glyph = if matches!(expr, Expr::Sum { .. }) {
                "∑"
            } else {
                "∏"
            };
            out.push_str("<mrow><munderover>");
            mo(out, glyph);
            out.push_str("<mrow>");
            write_variable(out, index);
            mo(out, "=");
            write_node(out, lower, depth + 1)?;
            out.push_str("</mrow><mrow>");
            write_node(out, upper, depth + 1)?;
            out.push_str("</mrow></munderover>");
            write_grouped(out, body, depth + 1)?;
            out.push_str("</mrow>");
        }

        Expr::Limit {
            variable,
            target,
            body,
            side,
        } => {
            out.push_str("<mrow><munder><mo>lim</mo><mrow>");
            write_variable(out, variable);
            mo(out, "→");
            write_node(out, target, depth + 1)?;
            match side {
                LimitSide::Right => out.push_str("<msup><mrow></mrow><mo>+</mo></msup>"),
                LimitSide::Left => out.push_str("<msup><mrow></mrow><mo>−</mo></msup>"),
                LimitSide::Both => {}
            }
            out.push_str("</mrow></munder>");
            write_grouped(out, body, depth + 1)?;
            out.push_str("</mrow>");
        }

        Expr::Integral {
            variable,
            lower,
            upper,
            body,
            closed,
        } => {
            out.push_str("<mrow>");
            let glyph = if *closed { "∮" } else { "∫" };
            match (lower, upper) {
                (Some(lower), Some(upper)) => {
                    out.push_str("<munderover>");
                    mo(out, glyph);
                    out.push_str("<mrow>");
                    write_node(out, lower, depth + 1)?;
                    out.push_str("</mrow><mrow>");
                    write_node(out, upper, depth + 1)?;
                    out.push_str("</mrow></munderover>");
                }
                _ => mo(out, glyph),
            }
            write_grouped(out, body, depth + 1)?;
            mi(out, "d");
            write_variable(out, variable);
            out.push_str("</mrow>");
        }

        Expr::MultiIntegral {
            order,
            variables,
            lower,
            upper,
            body,
        } => {
            out.push_str("<mrow>");
            let glyph = if *order == 2 { "∬" } else { "∭" };
            match (lower, upper) {
                (Some(lower), Some(upper)) => {
                    out.push_str("<munderover>");
                    mo(out, glyph);
                    out.push_str("<mrow>");
                    write_node(out, lower, depth + 1)?;
                    out.push_str("</mrow><mrow>");
                    write_node(out, upper, depth + 1)?;
                    out.push_str("</mrow></munderover>");
                }
                _ => mo(out, glyph),
            }
            write_grouped(out, body, depth + 1)?;
            for variable in variables {
                mi(out, "d");
                write_variable(out, variable);
            }
            out.push_str("</mrow>");
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
            let marker = if matches!(expr, Expr::Derivative { .. }) {
                "d"
            } else {
                "∂"
            };
            out.push_str("<mrow><mfrac><mrow>");
            if *order == 1 {
                mi(out, marker);
            } else {
                write!(
                    out,
                    "<msup><mi>{}</mi><mn>{}</mn></msup>",
                    marker, order
                )
                .expect("string write");
            }
            out.push_str("</mrow><mrow>");
            mi(out, marker);
            if *order == 1 {
                write_variable(out, variable);
            } else {
                out.push_str("<msup>");
                write_variable(out, variable);
                write!(out, "<mn>{}</mn>", order).expect("string write");
                out.push_str("</msup>");
            }
            out.push_str("</mrow></mfrac>");
            write_grouped(out, body, depth + 1)?;
            out.push_str("</mrow>");
        }

        Expr::Gradient(body) => {
            out.push_str("<mrow><mo>∇</mo>");
            write_grouped(out, body, depth + 1)?;
            out.push_str("</mrow>");
        }

        Expr::Binom { n, k } => {
            out.push_str("<mrow><mo>(</mo><mfrac linethickness=\"0\"><mrow>");
            write_node(out, n, depth + 1)?;
            out.push_str("</mrow><mrow>");
            write_node(out, k, depth + 1)?;
            out.push_str("</mrow></mfrac><mo>)</mo></mrow>");
        }

        Expr::Matrix { rows, .. } => {
            out.push_str("<mrow><mo>(</mo><mtable>");
            for row in rows {
                out.push_str("<mtr>");
                for cell in row {
                    out.push_str("<mtd>");
                    write_node(out, cell, depth + 1)?;
                    out.push_str("</mtd>");
                }
                out.push_str("</mtr>");
            }
            out.push_str("</mtable><mo>)</mo></mrow>");
        }

        Expr::Vector { components, unit } => {
            out.push_str("<mrow>");
            if *unit {
                out.push_str("<mover><mrow>");
            }
            out.push_str("<mo>(</mo>");
            for (k, component) in components.iter().enumerate() {
                if k > 0 {
                    mo(out, ",");
                }
                write_node(out, component, depth + 1)?;
            }
            out.push_str("<mo>)</mo>");
            if *unit {
                out.push_str("</mrow><mo>^</mo></mover>");
            }
            out.push_str("</mrow>");
        }

        Expr::Assignment { name, value } => {
            out.push_str("<mrow>");
            write_variable(out, name);
            mo(out, "=");
            write_node(out, value, depth + 1)?;
            out.push_str("</mrow>");
        }

        Expr::FunctionDefinition { name, params, body } => {
            out.push_str("<mrow>");
            write_variable(out, name);
            out.push_str("<mo>(</mo>");
            for (k, param) in params.iter().enumerate() {
                if k > 0 {
                    mo(out, ",");
                }
                write_variable(out, param);
            }
            out.push_str("<mo>)</mo>");
            mo(out, "=");
            write_node(out, body, depth + 1)?;
            out.push_str("</mrow>");
        }
    }
    Ok(())
}

/// Wrap compound children in an `<mrow>` so sibling operators stay grouped.
fn write_grouped(out: &mut String, expr: &Expr, depth: usize) -> Result<()> {
    let atomic = matches!(expr, Expr::Number(_) | Expr::Variable(_));
    if atomic {
        write_node(out, expr, depth)
    } else {
        out.push_str("<mrow>");
        write_node(out, expr, depth)?;
        out.push_str("</mrow>");
        Ok(())
    }
}

fn write_variable(out: &mut String, name: &str) {
    if name == "infinity" {
        mi(out, "∞");
        return;
    }
    if let Some((_, inner)) = name.split_once(':') {
        write!(out, "<mi mathvariant=\"bold\">{}</mi>", escape(inner)).expect("string write");
        return;
    }
    if let Some((stem, subscript)) = name.split_once('_') {
        out.push_str("<msub>");
        write_variable(out, stem);
        write!(out, "<mi>{}</mi>", escape(subscript)).expect("string write");
        out.push_str("</msub>");
        return;
    }
    if name.len() > 1 && lexer::is_letter_command(name) {
        mi(out, greek_glyph(name));
        return;
    }
    mi(out, name);
}

fn greek_glyph(name: &str) -> &str {
    match name {
        "alpha" => "α",
        "beta" => "β",
        "gamma" => "γ",
        "delta" => "δ",
        "epsilon" | "varepsilon" => "ε",
        "zeta" => "ζ",
        "eta" => "η",
        "theta" => "θ",
        "iota" => "ι",
        "kappa" => "κ",
        "lambda" => "λ",
        "mu" => "μ",
        "nu" => "ν",
        "xi" => "ξ",
        "pi" => "π",
        "rho" => "ρ",
        "sigma" => "σ",
        "tau" => "τ",
        "upsilon" => "υ",
        "phi" | "varphi" => "φ",
        "chi" => "χ",
        "psi" => "ψ",
        "omega" => "ω",
        "Gamma" => "Γ",
        "Delta" => "Δ",
        "Theta" => "Θ",
        "Lambda" => "Λ",
        "Xi" => "Ξ",
        "Pi" => "Π",
        "Sigma" => "Σ",
        "Upsilon" => "Υ",
        "Phi" => "Φ",
        "Psi" => "Ψ",
        "Omega" => "Ω",
        "hbar" => "ℏ",
        "ell" => "ℓ",
        other => other,
    }
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
            Some(index) => {
                out.push_str("<mroot><mrow>");
                write_node(out, &args[0], depth + 1)?;
                out.push_str("</mrow><mrow>");
                write_node(out, index, depth + 1)?;
                out.push_str("</mrow></mroot>");
            }
            None => {
                out.push_str("<msqrt>");
                write_node(out, &args[0], depth + 1)?;
                out.push_str("</msqrt>");
            }
        },
        "log" if base.is_some() => {
            out.push_str("<mrow><msub><mi>log</mi><mrow>");
            write_node(out, base.expect("checked"), depth + 1)?;
            out.push_str("</mrow></msub><mo>(</mo>");
            write_node(out, &args[0], depth + 1)?;
            out.push_str("<mo>)</mo></mrow>");
        }
        "factorial" => {
            out.push_str("<mrow>");
            write_grouped(out, &args[0], depth + 1)?;
            mo(out, "!");
            out.push_str("</mrow>");
        }
        "transpose" => {
            out.push_str("<msup><mrow>");
            write_grouped(out, &args[0], depth + 1)?;
            out.push_str("</mrow><mi>T</mi></msup>");
        }
        "norm" => {
            out.push_str("<mrow><mo>‖</mo>");
            write_node(out, &args[0], depth + 1)?;
            out.push_str("<mo>‖</mo></mrow>");
        }
        _ => {
            out.push_str("<mrow>");
            mi(out, name);
            out.push_str("<mo>(</mo>");
            for (k, arg) in args.iter().enumerate() {
                if k > 0 {
                    mo(out, ",");
                }
                write_node(out, arg, depth + 1)?;
            }
            out.push_str("<mo>)</mo></mrow>");
        }
    }
    Ok(())
}

fn comparison_glyph(op: ComparisonOperator) -> &'static str {
    match op {
        ComparisonOperator::LessThan => "&lt;",
        ComparisonOperator::LessThanOrEqual => "≤",
        ComparisonOperator::GreaterThan => "&gt;",
        ComparisonOperator::GreaterThanOrEqual => "≥",
        ComparisonOperator::Equal => "=",
        ComparisonOperator::NotEqual => "≠",
    }
}
