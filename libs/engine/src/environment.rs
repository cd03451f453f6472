//! Variable environments
//!
//! Resolution order for an identifier is local frame(s), then the global
//! environment, then the built-in constants. Constants survive
//! `clear`: they live in their own read-only table, not in the global map.

use crate::value::Value;
use num_complex::Complex64;
use std::collections::HashMap;

/// Euler–Mascheroni constant.
const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// Reduced Planck constant, J·s.
const HBAR: f64 = 1.054_571_817e-34;

/// Whether `name` is a built-in constant.
pub fn is_constant(name: &str) -> bool {
    matches!(name, "pi" | "e" | "hbar" | "gamma" | "i" | "infinity")
}

/// Value of a built-in constant.
pub fn constant_value(name: &str) -> Option<Value> {
    match name {
        "pi" => Some(Value::Numeric(std::f64::consts::PI)),
        "e" => Some(Value::Numeric(std::f64::consts::E)),
        "hbar" => Some(Value::Numeric(HBAR)),
        "gamma" => Some(Value::Numeric(EULER_MASCHERONI)),
        "i" => Some(Value::Complex(Complex64::new(0.0, 1.0))),
        "infinity" => Some(Value::Numeric(f64::INFINITY)),
        _ => None,
    }
}

/// The persistent global environment, owned by the facade and mutated only by
/// assignment and function-definition nodes evaluated at the top level.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.bindings.remove(name)
    }

    /// Drop every user binding. Constants remain resolvable: they are not
    /// stored here.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Resolve through global bindings, then constants.
    pub fn resolve(&self, name: &str) -> Option<Value> {
        self.bindings
            .get(name)
            .cloned()
            .or_else(|| constant_value(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_survive_clear() {
        let mut env = Environment::new();
        env.set("x", Value::Numeric(3.0));
        env.clear();
        assert!(env.get("x").is_none());
        assert!(matches!(env.resolve("pi"), Some(Value::Numeric(_))));
    }

    #[test]
    fn global_bindings_shadow_constants() {
        let mut env = Environment::new();
        env.set("e", Value::Numeric(2.0));
        match env.resolve("e") {
            Some(Value::Numeric(n)) => assert_eq!(n, 2.0),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
