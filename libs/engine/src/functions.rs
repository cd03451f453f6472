//! Built-in function catalogue
//!
//! Maps function names to arity metadata. Uses a compile-time perfect hash
//! map (phf) for O(1) name lookups with zero runtime allocation. Structural
//! commands (`\frac`, `\sum`, ...) are listed separately: they parse into
//! dedicated tree nodes rather than function calls.
//!
//! Also hosts the process-wide factorial and Fibonacci memo tables, read-only
//! after initialisation.

use crate::error::{Error, Result};
use phf::{phf_map, phf_set};
use std::sync::OnceLock;

/// Largest n with a finite f64 factorial.
pub const MAX_FACTORIAL: usize = 170;

/// Largest n with a finite f64 Fibonacci number.
pub const MAX_FIBONACCI: usize = 1476;

/// Function metadata
#[derive(Debug, Clone, Copy)]
pub struct FunctionMetadata {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
}

const fn meta(name: &'static str, min_args: usize, max_args: usize) -> FunctionMetadata {
    FunctionMetadata {
        name,
        min_args,
        max_args,
    }
}

/// Commands that parse into dedicated tree nodes.
static STRUCTURAL_COMMANDS: phf::Set<&'static str> = phf_set! {
    "frac", "sum", "prod", "int", "oint", "iint", "iiint", "lim", "binom",
    "vec", "hat", "partial", "nabla",
};

/// Static compile-time function registry.
static FUNCTIONS_BY_NAME: phf::Map<&'static str, FunctionMetadata> = phf_map! {
    // Trigonometric
    "sin" => meta("sin", 1, 1),
    "cos" => meta("cos", 1, 1),
    "tan" => meta("tan", 1, 1),
    "cot" => meta("cot", 1, 1),
    "sec" => meta("sec", 1, 1),
    "csc" => meta("csc", 1, 1),

    // Inverse trigonometric
    "arcsin" => meta("arcsin", 1, 1),
    "arccos" => meta("arccos", 1, 1),
    "arctan" => meta("arctan", 1, 1),
    "asin" => meta("arcsin", 1, 1),
    "acos" => meta("arccos", 1, 1),
    "atan" => meta("arctan", 1, 1),

    // Hyperbolic
    "sinh" => meta("sinh", 1, 1),
    "cosh" => meta("cosh", 1, 1),
    "tanh" => meta("tanh", 1, 1),

    // Exponential / logarithmic / roots
    "exp" => meta("exp", 1, 1),
    "ln" => meta("ln", 1, 1),
    "log" => meta("log", 1, 1),
    "sqrt" => meta("sqrt", 1, 1),

    // Numeric
    "abs" => meta("abs", 1, 1),
    "floor" => meta("floor", 1, 1),
    "ceil" => meta("ceil", 1, 1),
    "round" => meta("round", 1, 1),
    "sign" => meta("sign", 1, 1),
    "min" => meta("min", 1, usize::MAX),
    "max" => meta("max", 1, usize::MAX),
    "gcd" => meta("gcd", 2, 2),
    "lcm" => meta("lcm", 2, 2),

    // Combinatorial
    "factorial" => meta("factorial", 1, 1),
    "fibonacci" => meta("fibonacci", 1, 1),

    // Matrix / vector
    "det" => meta("det", 1, 1),
    "trace" => meta("trace", 1, 1),
    "tr" => meta("trace", 1, 1),
    "transpose" => meta("transpose", 1, 1),
    "inverse" => meta("inverse", 1, 1),
    "inv" => meta("inverse", 1, 1),
    "norm" => meta("norm", 1, 1),
    "dot" => meta("dot", 2, 2),
    "cross" => meta("cross", 2, 2),

    // Complex parts
    "Re" => meta("Re", 1, 1),
    "Im" => meta("Im", 1, 1),
    "conj" => meta("conj", 1, 1),
    "arg" => meta("arg", 1, 1),
};

/// Look up metadata for a catalogue function. The returned `name` is the
/// canonical spelling (`asin` resolves to `arcsin`).
pub fn lookup(name: &str) -> Option<&'static FunctionMetadata> {
    FUNCTIONS_BY_NAME.get(name)
}

/// Whether the tokenizer should pass this backslash command through without
/// consulting the extension registry.
pub fn is_known_command(name: &str) -> bool {
    STRUCTURAL_COMMANDS.contains(name) || FUNCTIONS_BY_NAME.contains_key(name)
}

/// Whether this command parses into a dedicated tree node.
pub fn is_structural_command(name: &str) -> bool {
    STRUCTURAL_COMMANDS.contains(name)
}

/// All catalogue + structural command names, for edit-distance suggestions.
pub fn known_command_names() -> impl Iterator<Item = &'static str> {
    STRUCTURAL_COMMANDS
        .iter()
        .copied()
        .chain(FUNCTIONS_BY_NAME.keys().copied())
}

fn factorial_table() -> &'static [f64] {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = Vec::with_capacity(MAX_FACTORIAL + 1);
        let mut acc = 1.0f64;
        table.push(acc);
        for n in 1..=MAX_FACTORIAL {
            acc *= n as f64;
            table.push(acc);
        }
        table
    })
}

fn fibonacci_table() -> &'static [f64] {
    static TABLE: OnceLock<Vec<f64>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = Vec::with_capacity(MAX_FIBONACCI + 1);
        let (mut a, mut b) = (0.0f64, 1.0f64);
        for _ in 0..=MAX_FIBONACCI {
            table.push(a);
            let next = a + b;
            a = b;
            b = next;
        }
        table
    })
}

/// `n!` for integer n, overflow-protected at 170.
pub fn factorial(n: f64) -> Result<f64> {
    if n < 0.0 || n.fract() != 0.0 {
        return Err(Error::evaluation(format!(
            "factorial requires a non-negative integer, got {}",
            n
        )));
    }
    let n = n as usize;
    if n > MAX_FACTORIAL {
        return Err(Error::evaluation(format!(
            "factorial({}) overflows: maximum supported is {}",
            n, MAX_FACTORIAL
        )));
    }
    Ok(factorial_table()[n])
}

/// `fib(n)`, overflow-protected at 1476.
pub fn fibonacci(n: f64) -> Result<f64> {
    if n < 0.0 || n.fract() != 0.0 {
        return Err(Error::evaluation(format!(
            "fibonacci requires a non-negative integer, got {}",
            n
        )));
    }
    let n = n as usize;
    if n > MAX_FIBONACCI {
        return Err(Error::evaluation(format!(
            "fibonacci({}) overflows: maximum supported is {}",
            n, MAX_FIBONACCI
        )));
    }
    Ok(fibonacci_table()[n])
}

/// Binomial coefficient C(n, k) through the factorial table where possible,
/// falling back to the multiplicative form for large n.
pub fn binomial(n: f64, k: f64) -> Result<f64> {
    if n < 0.0 || k < 0.0 || n.fract() != 0.0 || k.fract() != 0.0 {
        return Err(Error::evaluation(format!(
            "binomial requires non-negative integers, got ({}, {})",
            n, k
        )));
    }
    if k > n {
        return Ok(0.0);
    }
    if n as usize <= MAX_FACTORIAL {
        let table = factorial_table();
        return Ok(table[n as usize] / (table[k as usize] * table[(n - k) as usize]));
    }
    let k = k.min(n - k);
    let mut acc = 1.0f64;
    for i in 0..k as u64 {
        acc = acc * (n - i as f64) / (i as f64 + 1.0);
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_canonicalizes_aliases() {
        assert_eq!(lookup("asin").unwrap().name, "arcsin");
        assert_eq!(lookup("tr").unwrap().name, "trace");
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn factorial_values() {
        assert_eq!(factorial(0.0).unwrap(), 1.0);
        assert_eq!(factorial(5.0).unwrap(), 120.0);
        assert!(factorial(170.0).unwrap().is_finite());
        assert!(factorial(171.0).is_err());
        assert!(factorial(-1.0).is_err());
        assert!(factorial(2.5).is_err());
    }

    #[test]
    fn fibonacci_values() {
        assert_eq!(fibonacci(0.0).unwrap(), 0.0);
        assert_eq!(fibonacci(10.0).unwrap(), 55.0);
        assert!(fibonacci(1476.0).unwrap().is_finite());
        assert!(fibonacci(1477.0).is_err());
    }

    #[test]
    fn binomial_values() {
        assert_eq!(binomial(5.0, 2.0).unwrap(), 10.0);
        assert_eq!(binomial(10.0, 3.0).unwrap(), 120.0);
        assert_eq!(binomial(4.0, 7.0).unwrap(), 0.0);
    }
}
