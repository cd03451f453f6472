//! Iterated and approximate constructs: sums, products, definite integrals,
//! numeric limits, and gradients.

use crate::ast::{BinaryOperator, Expr, LimitSide};
use crate::error::{Error, Result};
use crate::eval::{apply_binary, Evaluator};
use crate::symbolic;
use crate::value::Value;

/// Relative tolerance for accepting a converged limit.
const LIMIT_TOLERANCE: f64 = 1e-6;

/// Starting offset for finite-target limit sampling.
const LIMIT_INITIAL_OFFSET: f64 = 1e-1;

pub(crate) fn sum_or_product(
    ev: &mut Evaluator,
    is_sum: bool,
    index: &str,
    lower: &Expr,
    upper: &Expr,
    body: &Expr,
    depth: usize,
) -> Result<Value> {
    let what = if is_sum { "sum" } else { "product" };
    let lower = ev.eval_expr(lower, depth + 1)?.as_numeric()?;
    let upper = ev.eval_expr(upper, depth + 1)?.as_numeric()?;
    if !lower.is_finite() || !upper.is_finite() {
        return Err(Error::evaluation(format!(
            "{} bounds must be finite, got {}..{}",
            what, lower, upper
        )));
    }
    let lower = lower.round() as i64;
    let upper = upper.round() as i64;

    // Empty-range convention
    if upper < lower {
        return Ok(Value::Numeric(if is_sum { 0.0 } else { 1.0 }));
    }

    let count = (upper - lower + 1) as u64;
    let cap = ev.options().iteration_cap;
    if count > cap {
        return Err(Error::evaluation(format!(
            "{} over {} iterations exceeds the cap of {}",
            what, count, cap
        )));
    }

    let op = if is_sum {
        BinaryOperator::Add
    } else {
        BinaryOperator::Multiply
    };
    let mut acc = Value::Numeric(if is_sum { 0.0 } else { 1.0 });
    for k in lower..=upper {
        let step = ev.with_binding(index, Value::Numeric(k as f64), |ev| {
            ev.eval_expr(body, depth + 1)
        })?;
        let options = ev.options().clone();
        acc = apply_binary(op, acc, step, &options)?;
    }
    Ok(acc)
}

pub(crate) fn definite_integral(
    ev: &mut Evaluator,
    variable: &str,
    lower: &Expr,
    upper: &Expr,
    body: &Expr,
    depth: usize,
) -> Result<Value> {
    let surrogate = ev.options().infinity_surrogate;
    let lower = clamp_bound(ev.eval_expr(lower, depth + 1)?.as_numeric()?, surrogate);
    let upper = clamp_bound(ev.eval_expr(upper, depth + 1)?.as_numeric()?, surrogate);
    let n = even_at_least(ev.options().simpson_subintervals, 2);
    simpson(ev, variable, lower, upper, body, n, depth).map(Value::Numeric)
}

pub(crate) fn multi_integral(
    ev: &mut Evaluator,
    variables: &[String],
    lower: &Expr,
    upper: &Expr,
    body: &Expr,
    depth: usize,
) -> Result<Value> {
    let surrogate = ev.options().infinity_surrogate;
    let lower = clamp_bound(ev.eval_expr(lower, depth + 1)?.as_numeric()?, surrogate);
    let upper = clamp_bound(ev.eval_expr(upper, depth + 1)?.as_numeric()?, surrogate);

    // Spread the configured evaluation budget across dimensions
    let per_dimension = (ev.options().simpson_subintervals as f64)
        .powf(1.0 / variables.len() as f64)
        .round() as usize;
    let n = even_at_least(per_dimension, 4);
    nested_simpson(ev, variables, lower, upper, body, n, depth).map(Value::Numeric)
}

fn clamp_bound(bound: f64, surrogate: f64) -> f64 {
    if bound == f64::INFINITY {
        surrogate
    } else if bound == f64::NEG_INFINITY {
        -surrogate
    } else {
        bound
    }
}

fn even_at_least(n: usize, floor: usize) -> usize {
    let n = n.max(floor);
    if n % 2 == 0 {
        n
    } else {
        n + 1
    }
}

/// Composite Simpson's rule over [lower, upper] with n even subintervals.
fn simpson(
    ev: &mut Evaluator,
    variable: &str,
    lower: f64,
    upper: f64,
    body: &Expr,
    n: usize,
    depth: usize,
) -> Result<f64> {
    if lower == upper {
        return Ok(0.0);
    }
    let h = (upper - lower) / n as f64;
    let mut acc = 0.0;
    for k in 0..=n {
        let x = lower + h * k as f64;
        let weight = if k == 0 || k == n {
            1.0
        } else if k % 2 == 1 {
            4.0
        } else {
            2.0
        };
        let sample = ev.with_binding(variable, Value::Numeric(x), |ev| {
            ev.eval_expr(body, depth + 1)
        })?;
        acc += weight * sample.as_numeric()?;
    }
    Ok(acc * h / 3.0)
}

fn nested_simpson(
    ev: &mut Evaluator,
    variables: &[String],
    lower: f64,
    upper: f64,
    body: &Expr,
    n: usize,
    depth: usize,
) -> Result<f64> {
    if lower == upper {
        return Ok(0.0);
    }
    let h = (upper - lower) / n as f64;
    let mut acc = 0.0;
    for k in 0..=n {
        let x = lower + h * k as f64;
        let weight = if k == 0 || k == n {
            1.0
        } else if k % 2 == 1 {
            4.0
        } else {
            2.0
        };
        let sample = ev.with_binding(&variables[0], Value::Numeric(x), |ev| {
            if variables.len() == 1 {
                ev.eval_expr(body, depth + 1)?.as_numeric()
            } else {
                nested_simpson(ev, &variables[1..], lower, upper, body, n, depth)
            }
        })?;
        acc += weight * sample;
    }
    Ok(acc * h / 3.0)
}

pub(crate) fn limit(
    ev: &mut Evaluator,
    variable: &str,
    target: &Expr,
    body: &Expr,
    side: LimitSide,
    depth: usize,
) -> Result<Value> {
    let target = ev.eval_expr(target, depth + 1)?.as_numeric()?;
    let steps = ev.options().limit_halvings;

    if target.is_infinite() {
        let sign = target.signum();
        let samples: Vec<f64> = (0..steps)
            .map(|k| sign * 10f64.powi(2 + k as i32))
            .collect();
        return Ok(match converge(ev, variable, body, &samples, depth) {
            Some(value) => Value::Numeric(value),
            None => Value::Numeric(f64::NAN),
        });
    }

    let offsets: Vec<f64> = (0..steps)
        .map(|k| LIMIT_INITIAL_OFFSET * 0.5f64.powi(k as i32))
        .collect();
    let from_right: Vec<f64> = offsets.iter().map(|eps| target + eps).collect();
    let from_left: Vec<f64> = offsets.iter().map(|eps| target - eps).collect();

    let value = match side {
        LimitSide::Right => converge(ev, variable, body, &from_right, depth),
        LimitSide::Left => converge(ev, variable, body, &from_left, depth),
        LimitSide::Both => {
            let right = converge(ev, variable, body, &from_right, depth);
            let left = converge(ev, variable, body, &from_left, depth);
            match (left, right) {
                (Some(l), Some(r)) if agree(l, r) => Some((l + r) / 2.0),
                _ => None,
            }
        }
    };
    Ok(Value::Numeric(value.unwrap_or(f64::NAN)))
}

/// Sample the body along the sequence and accept once successive samples
/// agree within the relative tolerance.
fn converge(
    ev: &mut Evaluator,
    variable: &str,
    body: &Expr,
    xs: &[f64],
    depth: usize,
) -> Option<f64> {
    let mut previous: Option<f64> = None;
    let mut accepted: Option<f64> = None;
    for &x in xs {
        let sample = ev
            .with_binding(variable, Value::Numeric(x), |ev| ev.eval_expr(body, depth + 1))
            .ok()
            .and_then(|value| value.as_numeric().ok())?;
        if !sample.is_finite() {
            return None;
        }
        if let Some(previous) = previous {
            if agree(previous, sample) {
                accepted = Some(sample);
            } else {
                accepted = None;
            }
        }
        previous = Some(sample);
    }
    accepted
}

fn agree(a: f64, b: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= LIMIT_TOLERANCE * scale
}

/// Free variables in lexicographic order, each differentiated symbolically
/// and evaluated at the current environment.
pub(crate) fn gradient(ev: &mut Evaluator, body: &Expr, depth: usize) -> Result<Value> {
    let variables = body.free_variables();
    let mut components = Vec::with_capacity(variables.len());
    for variable in &variables {
        let derivative = symbolic::differentiate(body, variable)?;
        components.push(ev.eval_expr(&derivative, depth + 1)?.as_numeric()?);
    }
    Ok(Value::Vector(components))
}
