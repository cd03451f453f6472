//! Tree-walking evaluator
//!
//! Maps an expression tree and an environment to a `Value`. The walk is
//! depth-bounded with the same kind of explicit counter the parser uses.
//! Identifier resolution order: local frames (innermost first), the global
//! environment, then built-in constants.

mod arithmetic;
mod builtins;
mod calculus;

pub use arithmetic::apply_binary;

use crate::ast::{BinaryOperator, Expr, LogicOperator, UnaryOperator};
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::extension::ExtensionRegistry;
use crate::functions;
use crate::symbolic;
use crate::value::{FunctionValue, Value};
use std::collections::HashMap;

/// Maximum accepted derivative order.
pub const MAX_DERIVATIVE_ORDER: u32 = 10;

/// Configuration for the evaluator.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Substitute NaN where a result would otherwise be complex.
    pub real_only: bool,
    /// Recursion-depth ceiling per call.
    pub max_depth: usize,
    /// Iteration cap for sums and products (inclusive count).
    pub iteration_cap: u64,
    /// Composite Simpson subinterval count for definite integrals.
    pub simpson_subintervals: usize,
    /// Finite stand-in for infinite integration bounds.
    pub infinity_surrogate: f64,
    /// Halving steps when approximating limits numerically.
    pub limit_halvings: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            real_only: false,
            max_depth: crate::parser::DEFAULT_MAX_DEPTH,
            iteration_cap: 1_000_000,
            simpson_subintervals: 1000,
            infinity_surrogate: 1e3,
            limit_halvings: 8,
        }
    }
}

/// The evaluator. Holds a mutable borrow of the global environment for the
/// duration of one call; assignments write through it.
pub struct Evaluator<'a> {
    global: &'a mut Environment,
    extensions: Option<&'a ExtensionRegistry>,
    options: EvalOptions,
    locals: Vec<HashMap<String, Value>>,
    call_stack: Vec<String>,
}

impl<'a> Evaluator<'a> {
    pub fn new(global: &'a mut Environment, options: EvalOptions) -> Self {
        Self {
            global,
            extensions: None,
            options,
            locals: Vec::new(),
            call_stack: Vec::new(),
        }
    }

    pub fn with_extensions(
        global: &'a mut Environment,
        options: EvalOptions,
        extensions: Option<&'a ExtensionRegistry>,
    ) -> Self {
        Self {
            global,
            extensions,
            options,
            locals: Vec::new(),
            call_stack: Vec::new(),
        }
    }

    /// Evaluate a tree with caller-supplied local bindings.
    pub fn evaluate(&mut self, expr: &Expr, locals: &HashMap<String, Value>) -> Result<Value> {
        self.locals.clear();
        self.locals.push(locals.clone());
        self.call_stack.clear();
        self.eval_expr(expr, 0)
    }

    pub(crate) fn options(&self) -> &EvalOptions {
        &self.options
    }

    fn check_depth(&self, depth: usize, expr_kind: &str) -> Result<()> {
        if depth > self.options.max_depth {
            return Err(Error::evaluation(format!(
                "evaluation depth exceeds maximum of {} in {}",
                self.options.max_depth, expr_kind
            )));
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<Value> {
        for frame in self.locals.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Some(value.clone());
            }
        }
        self.global.resolve(name)
    }

    pub(crate) fn eval_expr(&mut self, expr: &Expr, depth: usize) -> Result<Value> {
        self.check_depth(depth, "expression")?;

        // Extension evaluators run ahead of the built-ins and may claim any
        // node; `None` falls through.
        if let Some(extensions) = self.extensions {
            if !extensions.is_empty() {
                let locals = self.locals.last().cloned().unwrap_or_default();
                let mut recurse = |e: &Expr| self.eval_expr(e, depth + 1);
                if let Some(result) = extensions.evaluate(expr, &locals, &mut recurse) {
                    return result;
                }
            }
        }

        match expr {
            Expr::Number(n) => Ok(Value::Numeric(*n)),

            Expr::Variable(name) => self.resolve(name).ok_or_else(|| {
                Error::evaluation(format!("undefined variable '{}'", name))
            }),

            Expr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => {
                let value = self.eval_expr(operand, depth + 1)?;
                arithmetic::negate(value)
            }

            Expr::BinaryOp { op, left, right } => {
                let left_value = self.eval_expr(left, depth + 1)?;
                let right_value = self.eval_expr(right, depth + 1)?;
                // Implicit multiplication of a function value is application:
                // `f(2)` parses as f * (2).
                if *op == BinaryOperator::Multiply {
                    if let Value::Function(f) = left_value {
                        return self.apply_user_function(&f, vec![right_value], depth);
                    }
                }
                apply_binary(*op, left_value, right_value, &self.options)
            }

            Expr::FunctionCall {
                name,
                args,
                base,
                index,
            } => self.eval_function_call(name, args, base.as_deref(), index.as_deref(), depth),

            Expr::AbsoluteValue(inner) => {
                let value = self.eval_expr(inner, depth + 1)?;
                arithmetic::absolute_value(value)
            }

            Expr::Comparison { op, left, right } => {
                let left_value = self.eval_expr(left, depth + 1)?;
                let right_value = self.eval_expr(right, depth + 1)?;
                arithmetic::compare(*op, &left_value, &right_value).map(Value::Boolean)
            }

            Expr::ChainedComparison {
                operands,
                operators,
            } => {
                if operators.len() + 1 != operands.len() {
                    return Err(Error::evaluation(
                        "comparison chain is malformed: operator count must be one less than operand count",
                    ));
                }
                let values: Vec<Value> = operands
                    .iter()
                    .map(|operand| self.eval_expr(operand, depth + 1))
                    .collect::<Result<_>>()?;
                for (k, op) in operators.iter().enumerate() {
                    if !arithmetic::compare(*op, &values[k], &values[k + 1])? {
                        return Ok(Value::Boolean(false));
                    }
                }
                Ok(Value::Boolean(true))
            }

            Expr::LogicOp { op, operands } => self.eval_logic(*op, operands, depth),

            Expr::Conditional { value, condition } => {
                let holds = self.eval_expr(condition, depth + 1)?.as_boolean()?;
                if holds {
                    self.eval_expr(value, depth + 1)
                } else {
                    Ok(Value::Numeric(f64::NAN))
                }
            }

            Expr::Piecewise { cases } => {
                for case in cases {
                    match &case.condition {
                        Some(condition) => {
                            if self.eval_expr(condition, depth + 1)?.as_boolean()? {
                                return self.eval_expr(&case.value, depth + 1);
                            }
                        }
                        None => return self.eval_expr(&case.value, depth + 1),
                    }
                }
                Ok(Value::Numeric(f64::NAN))
            }

            Expr::Sum {
                index,
                lower,
                upper,
                body,
            } => calculus::sum_or_product(self, true, index, lower, upper, body, depth),

            Expr::Product {
                index,
                lower,
                upper,
                body,
            } => calculus::sum_or_product(self, false, index, lower, upper, body, depth),

            Expr::Limit {
                variable,
                target,
                body,
                side,
            } => calculus::limit(self, variable, target, body, *side, depth),

            Expr::Integral {
                variable,
                lower,
                upper,
                body,
                ..
            } => match (lower, upper) {
                (Some(lower), Some(upper)) => {
                    calculus::definite_integral(self, variable, lower, upper, body, depth)
                }
                _ => {
                    // Indefinite integrals route through the symbolic
                    // integrator; the antiderivative is then evaluated.
                    let antiderivative = symbolic::integrate(body, variable)?;
                    self.eval_expr(&antiderivative, depth + 1)
                }
            },

            Expr::MultiIntegral {
                variables,
                lower,
                upper,
                body,
                ..
            } => {
                let (Some(lower), Some(upper)) = (lower, upper) else {
                    return Err(Error::evaluation(
                        "multiple integrals require explicit bounds",
                    ));
                };
                calculus::multi_integral(self, variables, lower, upper, body, depth)
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
                self.check_derivative_order(*order)?;
                // User-defined functions are expanded inline before the
                // syntactic differentiator runs.
                let inlined = symbolic::inline_user_functions(body, &|name| {
                    match self.resolve(name) {
                        Some(Value::Function(f)) => Some(f),
                        _ => None,
                    }
                })?;
                let derivative = symbolic::differentiate_n(&inlined, variable, *order)?;
                self.eval_expr(&derivative, depth + 1)
            }

            Expr::Gradient(body) => calculus::gradient(self, body, depth),

            Expr::Binom { n, k } => {
                let n = self.eval_expr(n, depth + 1)?.as_numeric()?;
                let k = self.eval_expr(k, depth + 1)?.as_numeric()?;
                functions::binomial(n, k).map(Value::Numeric)
            }

            Expr::Matrix { rows, .. } => {
                let width = rows.first().map(Vec::len).unwrap_or(0);
                let mut data = Vec::with_capacity(rows.len() * width);
                for row in rows {
                    if row.len() != width {
                        return Err(Error::evaluation("matrix rows must have equal width"));
                    }
                    for cell in row {
                        data.push(self.eval_expr(cell, depth + 1)?.as_numeric()?);
                    }
                }
                crate::matrix::Matrix::new(rows.len(), width, data).map(Value::Matrix)
            }

            Expr::Vector { components, unit } => {
                let mut values = Vec::with_capacity(components.len());
                for component in components {
                    values.push(self.eval_expr(component, depth + 1)?.as_numeric()?);
                }
                if *unit {
                    let magnitude = values.iter().map(|v| v * v).sum::<f64>().sqrt();
                    if magnitude == 0.0 {
                        return Err(Error::evaluation("cannot normalize a zero vector"));
                    }
                    for v in &mut values {
                        *v /= magnitude;
                    }
                }
                Ok(Value::Vector(values))
            }

            Expr::Assignment { name, value } => {
                let value = self.eval_expr(value, depth + 1)?;
                self.global.set(name.clone(), value.clone());
                Ok(value)
            }

            Expr::FunctionDefinition { name, params, body } => {
                let function = Value::Function(FunctionValue {
                    name: name.clone(),
                    params: params.clone(),
                    body: (**body).clone(),
                });
                self.global.set(name.clone(), function.clone());
                Ok(function)
            }
        }
    }

    fn check_derivative_order(&self, order: u32) -> Result<()> {
        if order == 0 || order > MAX_DERIVATIVE_ORDER {
            return Err(Error::evaluation(format!(
                "derivative order {} is outside the supported range 1..={}",
                order, MAX_DERIVATIVE_ORDER
            )));
        }
        Ok(())
    }

    fn eval_logic(&mut self, op: LogicOperator, operands: &[Expr], depth: usize) -> Result<Value> {
        let expect_arity = |n: usize| -> Result<()> {
            if operands.len() != n {
                return Err(Error::evaluation(format!(
                    "logic operator expects {} operand{}, got {}",
                    n,
                    if n == 1 { "" } else { "s" },
                    operands.len()
                )));
            }
            Ok(())
        };
        match op {
            LogicOperator::Not => {
                expect_arity(1)?;
                let value = self.eval_expr(&operands[0], depth + 1)?.as_boolean()?;
                Ok(Value::Boolean(!value))
            }
            LogicOperator::And => {
                expect_arity(2)?;
                // Short-circuit
                if !self.eval_expr(&operands[0], depth + 1)?.as_boolean()? {
                    return Ok(Value::Boolean(false));
                }
                let right = self.eval_expr(&operands[1], depth + 1)?.as_boolean()?;
                Ok(Value::Boolean(right))
            }
            LogicOperator::Or => {
                expect_arity(2)?;
                if self.eval_expr(&operands[0], depth + 1)?.as_boolean()? {
                    return Ok(Value::Boolean(true));
                }
                let right = self.eval_expr(&operands[1], depth + 1)?.as_boolean()?;
                Ok(Value::Boolean(right))
            }
            LogicOperator::Xor => {
                expect_arity(2)?;
                let left = self.eval_expr(&operands[0], depth + 1)?.as_boolean()?;
                let right = self.eval_expr(&operands[1], depth + 1)?.as_boolean()?;
                Ok(Value::Boolean(left != right))
            }
            LogicOperator::Implies => {
                expect_arity(2)?;
                let left = self.eval_expr(&operands[0], depth + 1)?.as_boolean()?;
                if !left {
                    return Ok(Value::Boolean(true));
                }
                let right = self.eval_expr(&operands[1], depth + 1)?.as_boolean()?;
                Ok(Value::Boolean(right))
            }
            LogicOperator::Iff => {
                expect_arity(2)?;
                let left = self.eval_expr(&operands[0], depth + 1)?.as_boolean()?;
                let right = self.eval_expr(&operands[1], depth + 1)?.as_boolean()?;
                Ok(Value::Boolean(left == right))
            }
        }
    }

    fn eval_function_call(
        &mut self,
        name: &str,
        args: &[Expr],
        base: Option<&Expr>,
        index: Option<&Expr>,
        depth: usize,
    ) -> Result<Value> {
        // User-defined functions shadow the catalogue.
        if let Some(Value::Function(function)) = self.resolve(name) {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(self.eval_expr(arg, depth + 1)?);
            }
            return self.apply_user_function(&function, values, depth);
        }

        if functions::lookup(name).is_none() {
            return Err(Error::evaluation(format!("unknown function '{}'", name)));
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_expr(arg, depth + 1)?);
        }
        let base = match base {
            Some(base) => Some(self.eval_expr(base, depth + 1)?),
            None => None,
        };
        let index = match index {
            Some(index) => Some(self.eval_expr(index, depth + 1)?),
            None => None,
        };
        builtins::apply(name, &values, base, index, &self.options)
    }

    fn apply_user_function(
        &mut self,
        function: &FunctionValue,
        args: Vec<Value>,
        depth: usize,
    ) -> Result<Value> {
        if args.len() != function.params.len() {
            return Err(Error::evaluation(format!(
                "function '{}' expects {} argument{}, got {}",
                function.name,
                function.params.len(),
                if function.params.len() == 1 { "" } else { "s" },
                args.len()
            )));
        }

        let frame: HashMap<String, Value> = function
            .params
            .iter()
            .cloned()
            .zip(args)
            .collect();
        // The body sees its parameters, the global environment, and the
        // constants only — never the caller's local frames.
        let saved_locals = std::mem::replace(&mut self.locals, vec![frame]);
        self.call_stack.push(function.name.clone());
        let result = self.eval_expr(&function.body, depth + 1);
        self.locals = saved_locals;
        let reentrant = self
            .call_stack
            .iter()
            .filter(|name| *name == &function.name)
            .count()
            > 1;
        self.call_stack.pop();

        // Bounded self-recursion is allowed; a definition that never reaches
        // a base case trips the depth guard inside a re-entrant call and is
        // reported as a cycle.
        match result {
            Err(Error::Evaluation { ref message })
                if reentrant && message.contains("depth exceeds") =>
            {
                Err(Error::evaluation(format!(
                    "cycle detected in definition of function '{}'",
                    function.name
                )))
            }
            other => other,
        }
    }

    /// Bind one variable in a fresh frame, run `f`, and unbind.
    pub(crate) fn with_binding<T>(
        &mut self,
        name: &str,
        value: Value,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mut frame = HashMap::with_capacity(1);
        frame.insert(name.to_string(), value);
        self.locals.push(frame);
        let result = f(self);
        self.locals.pop();
        result
    }
}
