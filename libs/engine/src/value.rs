//! Evaluation results
//!
//! The closed set of value variants an evaluation can produce, with typed
//! coercions between them. The real-only substitution point lives here:
//! `Value::from_complex` replaces a would-be complex result with NaN when the
//! engine runs in real-only mode.

use crate::error::{Error, Result};
use crate::interval::Interval;
use crate::matrix::Matrix;
use crate::ast::Expr;
use num_complex::Complex64;
use std::fmt;

/// Imaginary parts below this threshold collapse to real results.
const IMAGINARY_EPSILON: f64 = 1e-12;

/// A user-defined function: parameter list plus captured body expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionValue {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

/// Result of evaluating an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Numeric(f64),
    Complex(Complex64),
    Matrix(Matrix),
    Vector(Vec<f64>),
    Interval(Interval),
    Boolean(bool),
    Function(FunctionValue),
}

impl Value {
    /// Construct from a complex number. An exactly-zero imaginary part
    /// collapses to a real result; in real-only mode any remaining complex
    /// value becomes `Numeric(NaN)` instead. This is the single site where
    /// the real-only branch choice is made.
    pub fn from_complex(c: Complex64, real_only: bool) -> Value {
        if c.im == 0.0 {
            Value::Numeric(c.re)
        } else if real_only {
            Value::Numeric(f64::NAN)
        } else {
            Value::Complex(c)
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Numeric(_) => "number",
            Value::Complex(_) => "complex",
            Value::Matrix(_) => "matrix",
            Value::Vector(_) => "vector",
            Value::Interval(_) => "interval",
            Value::Boolean(_) => "boolean",
            Value::Function(_) => "function",
        }
    }

    /// Real scalar view. Intervals collapse to their midpoint; complex
    /// values with negligible imaginary part are allowed through.
    pub fn as_numeric(&self) -> Result<f64> {
        match self {
            Value::Numeric(n) => Ok(*n),
            Value::Interval(iv) => Ok(iv.midpoint()),
            Value::Complex(c) if c.im.abs() <= IMAGINARY_EPSILON => Ok(c.re),
            other => Err(Error::evaluation(format!(
                "expected a number, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_complex(&self) -> Result<Complex64> {
        match self {
            Value::Numeric(n) => Ok(Complex64::new(*n, 0.0)),
            Value::Complex(c) => Ok(*c),
            Value::Interval(iv) => Ok(Complex64::new(iv.midpoint(), 0.0)),
            other => Err(Error::evaluation(format!(
                "expected a complex number, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_matrix(&self) -> Result<&Matrix> {
        match self {
            Value::Matrix(m) => Ok(m),
            other => Err(Error::evaluation(format!(
                "expected a matrix, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_vector(&self) -> Result<&[f64]> {
        match self {
            Value::Vector(v) => Ok(v),
            other => Err(Error::evaluation(format!(
                "expected a vector, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_interval(&self) -> Result<Interval> {
        match self {
            Value::Interval(iv) => Ok(*iv),
            Value::Numeric(n) => Ok(Interval::point(*n)),
            other => Err(Error::evaluation(format!(
                "expected an interval, got {}",
                other.type_name()
            ))),
        }
    }

    /// Boolean view. In boolean context numbers are truthy iff non-zero;
    /// everything else is a type error.
    pub fn as_boolean(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Numeric(n) => Ok(*n != 0.0),
            other => Err(Error::evaluation(format!(
                "expected a boolean, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn as_function(&self) -> Result<&FunctionValue> {
        match self {
            Value::Function(f) => Ok(f),
            other => Err(Error::evaluation(format!(
                "expected a function, got {}",
                other.type_name()
            ))),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Numeric(_))
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Value::Complex(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Numeric(n) => write!(f, "{}", n),
            Value::Complex(c) => {
                if c.im >= 0.0 {
                    write!(f, "{} + {}i", c.re, c.im)
                } else {
                    write!(f, "{} - {}i", c.re, -c.im)
                }
            }
            Value::Matrix(m) => {
                write!(f, "[")?;
                for r in 0..m.rows() {
                    if r > 0 {
                        write!(f, "; ")?;
                    }
                    for c in 0..m.cols() {
                        if c > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", m.get(r, c))?;
                    }
                }
                write!(f, "]")
            }
            Value::Vector(v) => {
                write!(f, "(")?;
                for (k, component) in v.iter().enumerate() {
                    if k > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", component)?;
                }
                write!(f, ")")
            }
            Value::Interval(iv) => write!(f, "[{}, {}]", iv.lo, iv.hi),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Function(func) => {
                write!(f, "{}({})", func.name, func.params.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_only_substitutes_nan() {
        let c = Complex64::new(0.0, 1.0);
        match Value::from_complex(c, true) {
            Value::Numeric(n) => assert!(n.is_nan()),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(Value::from_complex(c, false), Value::Complex(_)));
    }

    #[test]
    fn exactly_real_complex_collapses() {
        let c = Complex64::new(2.0, 0.0);
        match Value::from_complex(c, false) {
            Value::Numeric(n) => assert_eq!(n, 2.0),
            other => panic!("unexpected: {:?}", other),
        }
        // A tiny residual imaginary part stays complex in default mode
        assert!(matches!(
            Value::from_complex(Complex64::new(2.0, 1e-15), false),
            Value::Complex(_)
        ));
    }

    #[test]
    fn interval_midpoint_coercion() {
        let v = Value::Interval(Interval::new(1.0, 3.0));
        assert_eq!(v.as_numeric().unwrap(), 2.0);
    }

    #[test]
    fn boolean_never_coerces_to_numeric() {
        assert!(Value::Boolean(true).as_numeric().is_err());
        assert!(Value::Numeric(2.0).as_boolean().unwrap());
        assert!(!Value::Numeric(0.0).as_boolean().unwrap());
    }
}
