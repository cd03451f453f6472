//! Built-in function application
//!
//! Real scalars go straight to the IEEE-754 kernels; arguments outside the
//! real domain of `sqrt`, `ln`, `log`, and even roots take the principal
//! complex branch (or NaN in real-only mode). Complex arguments use the
//! standard extensions. Monotone functions extend to intervals endpointwise.

use crate::error::{Error, Result};
use crate::eval::arithmetic;
use crate::eval::EvalOptions;
use crate::functions;
use crate::value::Value;
use num_complex::Complex64;

pub fn apply(
    name: &str,
    args: &[Value],
    base: Option<Value>,
    index: Option<Value>,
    options: &EvalOptions,
) -> Result<Value> {
    let metadata = functions::lookup(name)
        .ok_or_else(|| Error::evaluation(format!("unknown function '{}'", name)))?;
    if args.len() < metadata.min_args || args.len() > metadata.max_args {
        return Err(Error::evaluation(format!(
            "{} expects {} argument{}, got {}",
            metadata.name,
            if metadata.min_args == metadata.max_args {
                metadata.min_args.to_string()
            } else {
                format!("at least {}", metadata.min_args)
            },
            if metadata.max_args == 1 { "" } else { "s" },
            args.len()
        )));
    }

    match metadata.name {
        "sin" | "cos" | "tan" | "cot" | "sec" | "csc" => trig(metadata.name, &args[0], options),
        "arcsin" | "arccos" | "arctan" => inverse_trig(metadata.name, &args[0], options),
        "sinh" | "cosh" | "tanh" => hyperbolic(metadata.name, &args[0], options),
        "exp" => exp(&args[0], options),
        "ln" => ln(&args[0], options),
        "log" => log(&args[0], base, options),
        "sqrt" => sqrt(&args[0], index, options),
        "abs" => arithmetic::absolute_value(args[0].clone()),
        "floor" => args[0].as_numeric().map(|n| Value::Numeric(n.floor())),
        "ceil" => args[0].as_numeric().map(|n| Value::Numeric(n.ceil())),
        "round" => args[0].as_numeric().map(|n| Value::Numeric(n.round())),
        "sign" => args[0].as_numeric().map(|n| Value::Numeric(sign(n))),
        "min" | "max" => min_max(metadata.name == "min", args),
        "gcd" => gcd_lcm(true, &args[0], &args[1]),
        "lcm" => gcd_lcm(false, &args[0], &args[1]),
        "factorial" => functions::factorial(args[0].as_numeric()?).map(Value::Numeric),
        "fibonacci" => functions::fibonacci(args[0].as_numeric()?).map(Value::Numeric),
        "det" => args[0].as_matrix()?.determinant().map(Value::Numeric),
        "trace" => args[0].as_matrix()?.trace().map(Value::Numeric),
        "transpose" => Ok(Value::Matrix(args[0].as_matrix()?.transpose())),
        "inverse" => args[0].as_matrix()?.inverse().map(Value::Matrix),
        "norm" => norm(&args[0]),
        "dot" => {
            arithmetic::dot_product(args[0].as_vector()?, args[1].as_vector()?).map(Value::Numeric)
        }
        "cross" => {
            arithmetic::cross_product(args[0].as_vector()?, args[1].as_vector()?).map(Value::Vector)
        }
        "Re" => args[0].as_complex().map(|c| Value::Numeric(c.re)),
        "Im" => args[0].as_complex().map(|c| Value::Numeric(c.im)),
        "conj" => {
            let c = args[0].as_complex()?;
            Ok(Value::from_complex(c.conj(), options.real_only))
        }
        "arg" => args[0].as_complex().map(|c| Value::Numeric(c.arg())),
        other => Err(Error::evaluation(format!(
            "function '{}' has no evaluation rule",
            other
        ))),
    }
}

fn sign(n: f64) -> f64 {
    if n > 0.0 {
        1.0
    } else if n < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn trig(name: &str, arg: &Value, options: &EvalOptions) -> Result<Value> {
    match arg {
        Value::Numeric(x) => {
            let value = match name {
                "sin" => x.sin(),
                "cos" => x.cos(),
                "tan" => x.tan(),
                "cot" => {
                    let t = x.tan();
                    if t == 0.0 {
                        return Err(Error::evaluation("cot undefined: tan is zero"));
                    }
                    1.0 / t
                }
                "sec" => {
                    let c = x.cos();
                    if c == 0.0 {
                        return Err(Error::evaluation("sec undefined: cos is zero"));
                    }
                    1.0 / c
                }
                "csc" => {
                    let s = x.sin();
                    if s == 0.0 {
                        return Err(Error::evaluation("csc undefined: sin is zero"));
                    }
                    1.0 / s
                }
                _ => unreachable!(),
            };
            Ok(Value::Numeric(value))
        }
        Value::Complex(c) => {
            let value = match name {
                "sin" => c.sin(),
                "cos" => c.cos(),
                "tan" => c.tan(),
                "cot" => Complex64::new(1.0, 0.0) / c.tan(),
                "sec" => Complex64::new(1.0, 0.0) / c.cos(),
                "csc" => Complex64::new(1.0, 0.0) / c.sin(),
                _ => unreachable!(),
            };
            Ok(Value::from_complex(value, options.real_only))
        }
        other => Err(Error::evaluation(format!(
            "{} is not defined on {}",
            name,
            other.type_name()
        ))),
    }
}

fn inverse_trig(name: &str, arg: &Value, options: &EvalOptions) -> Result<Value> {
    match arg {
        Value::Numeric(x) => match name {
            "arctan" => Ok(Value::Numeric(x.atan())),
            "arcsin" if x.abs() <= 1.0 => Ok(Value::Numeric(x.asin())),
            "arccos" if x.abs() <= 1.0 => Ok(Value::Numeric(x.acos())),
            // Out of the real domain: principal complex branch
            "arcsin" => Ok(Value::from_complex(
                Complex64::new(*x, 0.0).asin(),
                options.real_only,
            )),
            "arccos" => Ok(Value::from_complex(
                Complex64::new(*x, 0.0).acos(),
                options.real_only,
            )),
            _ => unreachable!(),
        },
        Value::Complex(c) => {
            let value = match name {
                "arcsin" => c.asin(),
                "arccos" => c.acos(),
                "arctan" => c.atan(),
                _ => unreachable!(),
            };
            Ok(Value::from_complex(value, options.real_only))
        }
        other => Err(Error::evaluation(format!(
            "{} is not defined on {}",
            name,
            other.type_name()
        ))),
    }
}

fn hyperbolic(name: &str, arg: &Value, options: &EvalOptions) -> Result<Value> {
    match arg {
        Value::Numeric(x) => {
            let value = match name {
                "sinh" => x.sinh(),
                "cosh" => x.cosh(),
                "tanh" => x.tanh(),
                _ => unreachable!(),
            };
            Ok(Value::Numeric(value))
        }
        Value::Complex(c) => {
            let value = match name {
                "sinh" => c.sinh(),
                "cosh" => c.cosh(),
                "tanh" => c.tanh(),
                _ => unreachable!(),
            };
            Ok(Value::from_complex(value, options.real_only))
        }
        other => Err(Error::evaluation(format!(
            "{} is not defined on {}",
            name,
            other.type_name()
        ))),
    }
}

fn exp(arg: &Value, options: &EvalOptions) -> Result<Value> {
    match arg {
        Value::Numeric(x) => Ok(Value::Numeric(x.exp())),
        Value::Complex(c) => Ok(Value::from_complex(c.exp(), options.real_only)),
        Value::Interval(iv) => Ok(Value::Interval(iv.map_monotone(f64::exp))),
        other => Err(Error::evaluation(format!(
            "exp is not defined on {}",
            other.type_name()
        ))),
    }
}

fn ln(arg: &Value, options: &EvalOptions) -> Result<Value> {
    match arg {
        Value::Numeric(x) => {
            if *x > 0.0 {
                Ok(Value::Numeric(x.ln()))
            } else if *x == 0.0 {
                Err(Error::evaluation("logarithm of zero"))
            } else {
                // Principal branch: ln|x| + iπ
                Ok(Value::from_complex(
                    Complex64::new(*x, 0.0).ln(),
                    options.real_only,
                ))
            }
        }
        Value::Complex(c) => {
            if c.norm_sqr() == 0.0 {
                return Err(Error::evaluation("logarithm of zero"));
            }
            Ok(Value::from_complex(c.ln(), options.real_only))
        }
        Value::Interval(iv) => {
            if iv.lo <= 0.0 {
                return Err(Error::evaluation(
                    "logarithm of an interval reaching zero or below",
                ));
            }
            Ok(Value::Interval(iv.map_monotone(f64::ln)))
        }
        other => Err(Error::evaluation(format!(
            "ln is not defined on {}",
            other.type_name()
        ))),
    }
}

fn log(arg: &Value, base: Option<Value>, options: &EvalOptions) -> Result<Value> {
    let base = match base {
        Some(base) => base.as_numeric()?,
        None => 10.0,
    };
    if base <= 0.0 || base == 1.0 {
        return Err(Error::evaluation(format!(
            "logarithm base must be positive and not 1, got {}",
            base
        )));
    }
    let natural = ln(arg, options)?;
    arithmetic::apply_binary(
        crate::ast::BinaryOperator::Divide,
        natural,
        Value::Numeric(base.ln()),
        options,
    )
}

fn sqrt(arg: &Value, index: Option<Value>, options: &EvalOptions) -> Result<Value> {
    let index = match index {
        Some(index) => index.as_numeric()?,
        None => 2.0,
    };
    if index == 0.0 {
        return Err(Error::evaluation("zeroth root is undefined"));
    }
    match arg {
        Value::Numeric(x) => real_root(*x, index, options),
        Value::Complex(c) => {
            if index == 2.0 {
                Ok(Value::from_complex(c.sqrt(), options.real_only))
            } else {
                Ok(Value::from_complex(
                    c.powc(Complex64::new(1.0 / index, 0.0)),
                    options.real_only,
                ))
            }
        }
        Value::Interval(iv) if index == 2.0 => {
            if iv.lo < 0.0 {
                return Err(Error::evaluation(
                    "square root of an interval reaching below zero",
                ));
            }
            Ok(Value::Interval(iv.map_monotone(f64::sqrt)))
        }
        other => Err(Error::evaluation(format!(
            "root is not defined on {}",
            other.type_name()
        ))),
    }
}

fn real_root(x: f64, index: f64, options: &EvalOptions) -> Result<Value> {
    if x >= 0.0 {
        return Ok(Value::Numeric(x.powf(1.0 / index)));
    }
    let is_integer = index.fract() == 0.0;
    if is_integer && (index as i64) % 2 != 0 {
        // Odd real root of a negative number stays real
        return Ok(Value::Numeric(-(-x).powf(1.0 / index)));
    }
    // Even or fractional root of a negative number: principal branch
    Ok(Value::from_complex(
        Complex64::new(x, 0.0).powc(Complex64::new(1.0 / index, 0.0)),
        options.real_only,
    ))
}

fn min_max(is_min: bool, args: &[Value]) -> Result<Value> {
    let mut best: Option<f64> = None;
    for arg in args {
        let n = arg.as_numeric()?;
        best = Some(match best {
            Some(current) => {
                if is_min {
                    current.min(n)
                } else {
                    current.max(n)
                }
            }
            None => n,
        });
    }
    best.map(Value::Numeric)
        .ok_or_else(|| Error::evaluation("min/max needs at least one argument"))
}

fn gcd_lcm(is_gcd: bool, a: &Value, b: &Value) -> Result<Value> {
    let a = a.as_numeric()?;
    let b = b.as_numeric()?;
    if a.fract() != 0.0 || b.fract() != 0.0 {
        return Err(Error::evaluation("gcd/lcm require integer arguments"));
    }
    let (mut x, mut y) = ((a.abs()) as u64, (b.abs()) as u64);
    while y != 0 {
        let r = x % y;
        x = y;
        y = r;
    }
    let gcd = x;
    if is_gcd {
        return Ok(Value::Numeric(gcd as f64));
    }
    if gcd == 0 {
        return Ok(Value::Numeric(0.0));
    }
    Ok(Value::Numeric((a.abs() / gcd as f64) * b.abs()))
}

fn norm(arg: &Value) -> Result<Value> {
    match arg {
        Value::Vector(v) => Ok(Value::Numeric(v.iter().map(|x| x * x).sum::<f64>().sqrt())),
        Value::Numeric(n) => Ok(Value::Numeric(n.abs())),
        Value::Complex(c) => Ok(Value::Numeric(c.norm())),
        other => Err(Error::evaluation(format!(
            "norm is not defined on {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EvalOptions {
        EvalOptions::default()
    }

    fn real_only() -> EvalOptions {
        EvalOptions {
            real_only: true,
            ..EvalOptions::default()
        }
    }

    #[test]
    fn sqrt_of_negative_takes_complex_branch() {
        match apply("sqrt", &[Value::Numeric(-1.0)], None, None, &options()).unwrap() {
            Value::Complex(c) => {
                assert!((c.re).abs() < 1e-12);
                assert!((c.im - 1.0).abs() < 1e-12);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn sqrt_of_negative_is_nan_in_real_only() {
        match apply("sqrt", &[Value::Numeric(-1.0)], None, None, &real_only()).unwrap() {
            Value::Numeric(n) => assert!(n.is_nan()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn cube_root_of_negative_stays_real() {
        match apply(
            "sqrt",
            &[Value::Numeric(-8.0)],
            None,
            Some(Value::Numeric(3.0)),
            &options(),
        )
        .unwrap()
        {
            Value::Numeric(n) => assert!((n + 2.0).abs() < 1e-12),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn log_of_zero_is_a_domain_error() {
        assert!(apply("ln", &[Value::Numeric(0.0)], None, None, &options()).is_err());
    }

    #[test]
    fn log_with_base() {
        match apply(
            "log",
            &[Value::Numeric(8.0)],
            Some(Value::Numeric(2.0)),
            None,
            &options(),
        )
        .unwrap()
        {
            Value::Numeric(n) => assert!((n - 3.0).abs() < 1e-12),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn complex_trig_uses_standard_extension() {
        let c = Value::Complex(Complex64::new(0.0, 1.0));
        match apply("cos", &[c], None, None, &options()).unwrap() {
            // cos(i) = cosh(1)
            Value::Numeric(n) => assert!((n - 1.0f64.cosh()).abs() < 1e-12),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn gcd_and_lcm() {
        match apply(
            "gcd",
            &[Value::Numeric(12.0), Value::Numeric(18.0)],
            None,
            None,
            &options(),
        )
        .unwrap()
        {
            Value::Numeric(n) => assert_eq!(n, 6.0),
            other => panic!("unexpected: {:?}", other),
        }
        match apply(
            "lcm",
            &[Value::Numeric(4.0), Value::Numeric(6.0)],
            None,
            None,
            &options(),
        )
        .unwrap()
        {
            Value::Numeric(n) => assert_eq!(n, 12.0),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn exp_extends_to_intervals_monotonically() {
        let iv = Value::Interval(crate::interval::Interval::new(0.0, 1.0));
        match apply("exp", &[iv], None, None, &options()).unwrap() {
            Value::Interval(result) => {
                assert_eq!(result.lo, 1.0);
                assert!((result.hi - std::f64::consts::E).abs() < 1e-12);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
