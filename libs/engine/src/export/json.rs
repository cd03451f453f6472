//! JSON tree writer
//!
//! Dumps the expression tree as a structured map: `type` holds the variant
//! name, one field per payload slot, sub-expressions recurse. Numbers
//! serialise as JSON numbers (non-finite scalars become strings, since JSON
//! has no literal for them).

use crate::ast::{BinaryOperator, ComparisonOperator, Expr, LimitSide, LogicOperator};
use crate::error::Result;
use crate::export::check_depth;
use serde_json::{json, Value};

pub fn to_json(expr: &Expr) -> Result<Value> {
    write_value(expr, 0)
}

/// The tree as a JSON string.
pub fn to_json_string(expr: &Expr) -> Result<String> {
    Ok(to_json(expr)?.to_string())
}

fn number(n: f64) -> Value {
    if n.is_finite() {
        json!(n)
    } else {
        json!(n.to_string())
    }
}

fn binary_op_name(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "add",
        BinaryOperator::Subtract => "subtract",
        BinaryOperator::Multiply => "multiply",
        BinaryOperator::Divide => "divide",
        BinaryOperator::Power => "power",
        BinaryOperator::Cross => "cross",
    }
}

fn comparison_op_name(op: ComparisonOperator) -> &'static str {
    match op {
        ComparisonOperator::LessThan => "lt",
        ComparisonOperator::LessThanOrEqual => "le",
        ComparisonOperator::GreaterThan => "gt",
        ComparisonOperator::GreaterThanOrEqual => "ge",
        ComparisonOperator::Equal => "eq",
        ComparisonOperator::NotEqual => "ne",
    }
}

fn logic_op_name(op: LogicOperator) -> &'static str {
    match op {
        LogicOperator::And => "and",
        LogicOperator::Or => "or",
        LogicOperator::Not => "not",
        LogicOperator::Xor => "xor",
        LogicOperator::Implies => "implies",
        LogicOperator::Iff => "iff",
    }
}

fn write_value(expr: &Expr, depth: usize) -> Result<Value> {
    check_depth(depth)?;
    let list = |exprs: &[Expr]| -> Result<Vec<Value>> {
        exprs.iter().map(|e| write_value(e, depth + 1)).collect()
    };
    let child = |e: &Expr| write_value(e, depth + 1);
    let optional = |e: &Option<Box<Expr>>| -> Result<Value> {
        Ok(match e {
            Some(e) => write_value(e, depth + 1)?,
            None => Value::Null,
        })
    };

    Ok(match expr {
        Expr::Number(n) => json!({ "type": "NumberLiteral", "value": number(*n) }),
        Expr::Variable(name) => json!({ "type": "Variable", "name": name }),
        Expr::UnaryOp { op: _, operand } => json!({
            "type": "UnaryOp",
            "op": "negate",
            "operand": child(operand)?,
        }),
        Expr::BinaryOp { op, left, right } => json!({
            "type": "BinaryOp",
            "op": binary_op_name(*op),
            "left": child(left)?,
            "right": child(right)?,
        }),
        Expr::FunctionCall {
            name,
            args,
            base,
            index,
        } => json!({
            "type": "FunctionCall",
            "name": name,
            "args": list(args)?,
            "base": optional(base)?,
            "index": optional(index)?,
        }),
        Expr::AbsoluteValue(inner) => json!({
            "type": "AbsoluteValue",
            "argument": child(inner)?,
        }),
        Expr::Comparison { op, left, right } => json!({
            "type": "Comparison",
            "op": comparison_op_name(*op),
            "left": child(left)?,
            "right": child(right)?,
        }),
        Expr::ChainedComparison {
            operands,
            operators,
        } => json!({
            "type": "ChainedComparison",
            "operands": list(operands)?,
            "operators": operators.iter().map(|op| comparison_op_name(*op)).collect::<Vec<_>>(),
        }),
        Expr::LogicOp { op, operands } => json!({
            "type": "LogicOp",
            "op": logic_op_name(*op),
            "operands": list(operands)?,
        }),
        Expr::Conditional { value, condition } => json!({
            "type": "ConditionalExpr",
            "expression": child(value)?,
            "condition": child(condition)?,
        }),
        Expr::Piecewise { cases } => json!({
            "type": "PiecewiseExpr",
            "cases": cases
                .iter()
                .map(|case| {
                    Ok(json!({
                        "expression": write_value(&case.value, depth + 1)?,
                        "condition": match &case.condition {
                            Some(condition) => write_value(condition, depth + 1)?,
                            None => json!("otherwise"),
                        },
                    }))
                })
                .collect::<Result<Vec<_>>>()?,
        }),
        Expr::Sum {
            index,
            lower,
            upper,
            body,
        } => json!({
            "type": "SumExpr",
            "index": index,
            "lower": child(lower)?,
            "upper": child(upper)?,
            "body": child(body)?,
        }),
        Expr::Product {
            index,
            lower,
            upper,
            body,
        } => json!({
            "type": "ProductExpr",
            "index": index,
            "lower": child(lower)?,
            "upper": child(upper)?,
            "body": child(body)?,
        }),
        Expr::Limit {
            variable,
            target,
            body,
            side,
        } => json!({
            "type": "LimitExpr",
            "variable": variable,
            "target": child(target)?,
            "body": child(body)?,
            "side": match side {
                LimitSide::Both => "both",
                LimitSide::Left => "left",
                LimitSide::Right => "right",
            },
        }),
        Expr::Integral {
            variable,
            lower,
            upper,
            body,
            closed,
        } => json!({
            "type": "IntegralExpr",
            "variable": variable,
            "lower": optional(lower)?,
            "upper": optional(upper)?,
            "body": child(body)?,
            "closed": closed,
        }),
        Expr::MultiIntegral {
            order,
            variables,
            lower,
            upper,
            body,
        } => json!({
            "type": "MultiIntegralExpr",
            "order": order,
            "variables": variables,
            "lower": optional(lower)?,
            "upper": optional(upper)?,
            "body": child(body)?,
        }),
        Expr::Derivative {
            variable,
            order,
            body,
        } => json!({
            "type": "DerivativeExpr",
            "variable": variable,
            "order": order,
            "body": child(body)?,
        }),
        Expr::PartialDerivative {
            variable,
            order,
            body,
        } => json!({
            "type": "PartialDerivativeExpr",
            "variable": variable,
            "order": order,
            "body": child(body)?,
        }),
        Expr::Gradient(body) => json!({
            "type": "GradientExpr",
            "body": child(body)?,
        }),
        Expr::Binom { n, k } => json!({
            "type": "BinomExpr",
            "n": child(n)?,
            "k": child(k)?,
        }),
        Expr::Matrix { rows, bracket } => json!({
            "type": "MatrixExpr",
            "rows": rows
                .iter()
                .map(|row| row.iter().map(|cell| write_value(cell, depth + 1)).collect::<Result<Vec<_>>>())
                .collect::<Result<Vec<_>>>()?,
            "bracket": bracket.environment_name(),
        }),
        Expr::Vector { components, unit } => json!({
            "type": "VectorExpr",
            "components": list(components)?,
            "unit": unit,
        }),
        Expr::Assignment { name, value } => json!({
            "type": "AssignmentExpr",
            "variable": name,
            "value": child(value)?,
        }),
        Expr::FunctionDefinition { name, params, body } => json!({
            "type": "FunctionDefinitionExpr",
            "name": name,
            "params": params,
            "body": child(body)?,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    #[test]
    fn binary_op_shape() {
        let expr = parse_source("2 + 3").unwrap();
        let value = to_json(&expr).unwrap();
        assert_eq!(value["type"], "BinaryOp");
        assert_eq!(value["op"], "add");
        assert_eq!(value["left"]["type"], "NumberLiteral");
        assert_eq!(value["left"]["value"], 2.0);
    }

    #[test]
    fn numbers_serialize_as_json_numbers() {
        let expr = parse_source("2.5").unwrap();
        let value = to_json(&expr).unwrap();
        assert!(value["value"].is_number());
    }

    #[test]
    fn piecewise_marks_otherwise() {
        let expr =
            parse_source("\\begin{cases} 1 & x > 0 \\\\ 0 & \\text{otherwise} \\end{cases}")
                .unwrap();
        let value = to_json(&expr).unwrap();
        assert_eq!(value["type"], "PiecewiseExpr");
        assert_eq!(value["cases"][1]["condition"], "otherwise");
    }

    #[test]
    fn sum_carries_all_slots() {
        let expr = parse_source("\\sum_{i=1}^{5} i").unwrap();
        let value = to_json(&expr).unwrap();
        assert_eq!(value["type"], "SumExpr");
        assert_eq!(value["index"], "i");
        assert_eq!(value["lower"]["value"], 1.0);
        assert_eq!(value["upper"]["value"], 5.0);
    }

    #[test]
    fn indefinite_integral_has_null_bounds() {
        let expr = parse_source("\\int x dx").unwrap();
        let value = to_json(&expr).unwrap();
        assert!(value["lower"].is_null());
        assert!(value["upper"].is_null());
        assert_eq!(value["closed"], false);
    }
}
