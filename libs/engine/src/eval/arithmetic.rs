//! Binary and unary operations across numeric domains
//!
//! The coercion rules: scalars and complex numbers mix freely; intervals
//! absorb scalars; matrices and vectors only combine with matching shapes,
//! plus scalar broadcasting for multiplication and division. Booleans never
//! take part in arithmetic.

use crate::ast::{BinaryOperator, ComparisonOperator};
use crate::error::{Error, Result};
use crate::eval::EvalOptions;
use crate::interval::Interval;
use crate::matrix;
use crate::value::Value;
use num_complex::Complex64;

/// Tolerance for scalar and elementwise equality comparisons.
const COMPARE_TOLERANCE: f64 = 1e-9;

fn numeric_context_error(value: &Value) -> Error {
    Error::evaluation(format!(
        "{} is not valid in numeric context",
        value.type_name()
    ))
}

fn type_mismatch(op: &str, left: &Value, right: &Value) -> Error {
    Error::evaluation(format!(
        "cannot {} {} and {}",
        op,
        left.type_name(),
        right.type_name()
    ))
}

/// Apply a binary arithmetic operator to two values.
pub fn apply_binary(
    op: BinaryOperator,
    left: Value,
    right: Value,
    options: &EvalOptions,
) -> Result<Value> {
    if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_)) {
        let offender = if matches!(left, Value::Boolean(_)) {
            &left
        } else {
            &right
        };
        return Err(numeric_context_error(offender));
    }
    match op {
        BinaryOperator::Add => add_sub(left, right, options, false),
        BinaryOperator::Subtract => add_sub(left, right, options, true),
        BinaryOperator::Multiply => multiply(left, right, options),
        BinaryOperator::Cross => cross(left, right, options),
        BinaryOperator::Divide => divide(left, right, options),
        BinaryOperator::Power => power(left, right, options),
    }
}

fn add_sub(left: Value, right: Value, options: &EvalOptions, subtract: bool) -> Result<Value> {
    let verb = if subtract { "subtract" } else { "add" };
    match (&left, &right) {
        (Value::Numeric(a), Value::Numeric(b)) => {
            Ok(Value::Numeric(if subtract { a - b } else { a + b }))
        }
        (Value::Complex(_), Value::Numeric(_) | Value::Complex(_))
        | (Value::Numeric(_), Value::Complex(_)) => {
            let a = left.as_complex()?;
            let b = right.as_complex()?;
            Ok(Value::from_complex(
                if subtract { a - b } else { a + b },
                options.real_only,
            ))
        }
        (Value::Matrix(a), Value::Matrix(b)) => {
            let result = if subtract { a.sub(b)? } else { a.add(b)? };
            Ok(Value::Matrix(result))
        }
        (Value::Vector(a), Value::Vector(b)) => {
            if a.len() != b.len() {
                return Err(Error::evaluation(format!(
                    "cannot {} vectors of dimension {} and {}",
                    verb,
                    a.len(),
                    b.len()
                )));
            }
            Ok(Value::Vector(
                a.iter()
                    .zip(b)
                    .map(|(x, y)| if subtract { x - y } else { x + y })
                    .collect(),
            ))
        }
        (Value::Interval(_), Value::Interval(_) | Value::Numeric(_))
        | (Value::Numeric(_), Value::Interval(_)) => {
            let a = left.as_interval()?;
            let b = right.as_interval()?;
            Ok(Value::Interval(if subtract {
                a.sub(&b)
            } else {
                a.add(&b)
            }))
        }
        _ => Err(type_mismatch(verb, &left, &right)),
    }
}

fn multiply(left: Value, right: Value, options: &EvalOptions) -> Result<Value> {
    match (&left, &right) {
        (Value::Numeric(a), Value::Numeric(b)) => Ok(Value::Numeric(a * b)),
        (Value::Complex(_), Value::Numeric(_) | Value::Complex(_))
        | (Value::Numeric(_), Value::Complex(_)) => {
            let a = left.as_complex()?;
            let b = right.as_complex()?;
            Ok(Value::from_complex(a * b, options.real_only))
        }
        // Scalar broadcasting
        (Value::Numeric(k), Value::Matrix(m)) | (Value::Matrix(m), Value::Numeric(k)) => {
            Ok(Value::Matrix(m.scale(*k)))
        }
        (Value::Numeric(k), Value::Vector(v)) | (Value::Vector(v), Value::Numeric(k)) => {
            Ok(Value::Vector(v.iter().map(|x| x * k).collect()))
        }
        (Value::Matrix(a), Value::Matrix(b)) => Ok(Value::Matrix(a.mul(b)?)),
        // `\cdot` and `*` on two vectors is the dot product
        (Value::Vector(a), Value::Vector(b)) => dot_product(a, b).map(Value::Numeric),
        (Value::Matrix(m), Value::Vector(v)) => {
            let column = matrix::Matrix::new(v.len(), 1, v.clone())?;
            let product = m.mul(&column)?;
            Ok(Value::Vector(product.data().to_vec()))
        }
        (Value::Interval(_), Value::Interval(_) | Value::Numeric(_))
        | (Value::Numeric(_), Value::Interval(_)) => {
            let a = left.as_interval()?;
            let b = right.as_interval()?;
            Ok(Value::Interval(a.mul(&b)))
        }
        _ => Err(type_mismatch("multiply", &left, &right)),
    }
}

/// `\times`: cross product on 3-vectors, plain multiplication on scalars.
fn cross(left: Value, right: Value, options: &EvalOptions) -> Result<Value> {
    match (&left, &right) {
        (Value::Vector(a), Value::Vector(b)) => cross_product(a, b).map(Value::Vector),
        _ => multiply(left, right, options),
    }
}

pub(crate) fn dot_product(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(Error::evaluation(format!(
            "dot product requires equal dimensions, got {} and {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

pub(crate) fn cross_product(a: &[f64], b: &[f64]) -> Result<Vec<f64>> {
    if a.len() != 3 || b.len() != 3 {
        return Err(Error::evaluation(format!(
            "cross product requires 3-vectors, got dimensions {} and {}",
            a.len(),
            b.len()
        )));
    }
    Ok(vec![
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ])
}

fn divide(left: Value, right: Value, options: &EvalOptions) -> Result<Value> {
    match (&left, &right) {
        (Value::Numeric(a), Value::Numeric(b)) => {
            if *b == 0.0 {
                return Err(Error::evaluation("division by zero"));
            }
            Ok(Value::Numeric(a / b))
        }
        (Value::Complex(_), Value::Numeric(_) | Value::Complex(_))
        | (Value::Numeric(_), Value::Complex(_)) => {
            let a = left.as_complex()?;
            let b = right.as_complex()?;
            if b.norm_sqr() == 0.0 {
                return Err(Error::evaluation("division by zero"));
            }
            Ok(Value::from_complex(a / b, options.real_only))
        }
        (Value::Matrix(m), Value::Numeric(k)) => {
            if *k == 0.0 {
                return Err(Error::evaluation("division by zero"));
            }
            Ok(Value::Matrix(m.scale(1.0 / k)))
        }
        (Value::Vector(v), Value::Numeric(k)) => {
            if *k == 0.0 {
                return Err(Error::evaluation("division by zero"));
            }
            Ok(Value::Vector(v.iter().map(|x| x / k).collect()))
        }
        (Value::Interval(_), Value::Interval(_) | Value::Numeric(_))
        | (Value::Numeric(_), Value::Interval(_)) => {
            let a = left.as_interval()?;
            let b = right.as_interval()?;
            a.div(&b).map(Value::Interval)
        }
        _ => Err(type_mismatch("divide", &left, &right)),
    }
}

fn power(left: Value, right: Value, options: &EvalOptions) -> Result<Value> {
    match (&left, &right) {
        (Value::Numeric(base), Value::Numeric(exponent)) => {
            scalar_power(*base, *exponent, options)
        }
        (Value::Complex(_), Value::Numeric(_) | Value::Complex(_))
        | (Value::Numeric(_), Value::Complex(_)) => {
            let base = left.as_complex()?;
            let exponent = right.as_complex()?;
            Ok(Value::from_complex(
                complex_power(base, exponent),
                options.real_only,
            ))
        }
        (Value::Matrix(m), Value::Numeric(exponent)) => {
            if exponent.fract() != 0.0 {
                return Err(Error::evaluation(
                    "matrix exponent must be an integer",
                ));
            }
            Ok(Value::Matrix(m.powi(*exponent as i64)?))
        }
        (Value::Interval(iv), Value::Numeric(exponent)) => {
            if exponent.fract() != 0.0 {
                return Err(Error::evaluation(
                    "interval exponent must be an integer",
                ));
            }
            iv.powi(*exponent as i32).map(Value::Interval)
        }
        _ => Err(type_mismatch("exponentiate", &left, &right)),
    }
}

/// Scalar power. `0^0 = 1` by combinatorial convention; an integer exponent
/// goes through exponentiation by squaring; a negative base with a
/// fractional exponent escalates to the complex branch.
fn scalar_power(base: f64, exponent: f64, options: &EvalOptions) -> Result<Value> {
    if base == 0.0 && exponent == 0.0 {
        return Ok(Value::Numeric(1.0));
    }
    if base == 0.0 && exponent < 0.0 {
        return Err(Error::evaluation("division by zero in negative power of zero"));
    }
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        return Ok(Value::Numeric(base.powi(exponent as i32)));
    }
    if base < 0.0 {
        let value = complex_power(Complex64::new(base, 0.0), Complex64::new(exponent, 0.0));
        return Ok(Value::from_complex(value, options.real_only));
    }
    Ok(Value::Numeric(base.powf(exponent)))
}

/// Complex power with exponentiation by squaring for integer exponents.
fn complex_power(base: Complex64, exponent: Complex64) -> Complex64 {
    if exponent.im == 0.0 && exponent.re.fract() == 0.0 && exponent.re.abs() <= i32::MAX as f64 {
        return base.powi(exponent.re as i32);
    }
    base.powc(exponent)
}

pub fn negate(value: Value) -> Result<Value> {
    match value {
        Value::Numeric(n) => Ok(Value::Numeric(-n)),
        Value::Complex(c) => Ok(Value::Complex(-c)),
        Value::Matrix(m) => Ok(Value::Matrix(m.scale(-1.0))),
        Value::Vector(v) => Ok(Value::Vector(v.iter().map(|x| -x).collect())),
        Value::Interval(iv) => Ok(Value::Interval(iv.neg())),
        other => Err(numeric_context_error(&other)),
    }
}

/// `|x|`: magnitude for scalars, complex numbers, and vectors; determinant
/// for matrices (the `vmatrix` reading); endpoint folding for intervals.
pub fn absolute_value(value: Value) -> Result<Value> {
    match value {
        Value::Numeric(n) => Ok(Value::Numeric(n.abs())),
        Value::Complex(c) => Ok(Value::Numeric(c.norm())),
        Value::Vector(v) => Ok(Value::Numeric(
            v.iter().map(|x| x * x).sum::<f64>().sqrt(),
        )),
        Value::Matrix(m) => m.determinant().map(Value::Numeric),
        Value::Interval(iv) => {
            if iv.contains_zero() {
                Ok(Value::Interval(Interval::new(
                    0.0,
                    iv.lo.abs().max(iv.hi.abs()),
                )))
            } else {
                Ok(Value::Interval(Interval::new(iv.lo.abs(), iv.hi.abs())))
            }
        }
        other => Err(numeric_context_error(&other)),
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= COMPARE_TOLERANCE * scale
}

/// Evaluate a comparison between two values.
pub fn compare(op: ComparisonOperator, left: &Value, right: &Value) -> Result<bool> {
    // Structured equality for matrices, vectors, and complex numbers
    match (op, left, right) {
        (ComparisonOperator::Equal, Value::Matrix(a), Value::Matrix(b)) => {
            return Ok(a.approx_eq(b, matrix::EQUALITY_TOLERANCE))
        }
        (ComparisonOperator::NotEqual, Value::Matrix(a), Value::Matrix(b)) => {
            return Ok(!a.approx_eq(b, matrix::EQUALITY_TOLERANCE))
        }
        (ComparisonOperator::Equal, Value::Vector(a), Value::Vector(b)) => {
            return Ok(a.len() == b.len() && a.iter().zip(b).all(|(x, y)| approx_eq(*x, *y)))
        }
        (ComparisonOperator::NotEqual, Value::Vector(a), Value::Vector(b)) => {
            return Ok(a.len() != b.len() || a.iter().zip(b).any(|(x, y)| !approx_eq(*x, *y)))
        }
        (ComparisonOperator::Equal | ComparisonOperator::NotEqual, Value::Complex(_), _)
        | (ComparisonOperator::Equal | ComparisonOperator::NotEqual, _, Value::Complex(_)) => {
            let a = left.as_complex()?;
            let b = right.as_complex()?;
            let equal = approx_eq(a.re, b.re) && approx_eq(a.im, b.im);
            return Ok(if op == ComparisonOperator::Equal {
                equal
            } else {
                !equal
            });
        }
        _ => {}
    }

    let a = left.as_numeric()?;
    let b = right.as_numeric()?;
    Ok(match op {
        ComparisonOperator::LessThan => a < b,
        ComparisonOperator::LessThanOrEqual => a < b || approx_eq(a, b),
        ComparisonOperator::GreaterThan => a > b,
        ComparisonOperator::GreaterThanOrEqual => a > b || approx_eq(a, b),
        ComparisonOperator::Equal => approx_eq(a, b),
        ComparisonOperator::NotEqual => !approx_eq(a, b),
    })
}
