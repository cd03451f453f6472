//! LaTeX math engine
//!
//! Parses a practical subset of TeX math notation into an expression tree,
//! evaluates it over real, complex, interval, vector, and matrix domains,
//! rewrites it symbolically, and serialises it back out.
//!
//! # Architecture Overview
//!
//! ```text
//! Source String
//!      |
//!   Lexer -> Token tape
//!      |
//!   Parser -> Expr tree
//!      |
//!      +---> Evaluator -> Value (via the two-layer environment)
//!      +---> Symbolic passes -> Expr tree
//!      +---> Exporters -> TeX / MathML / JSON / SymPy
//! ```
//!
//! The [`Engine`] facade bundles the pipeline with a bounded parse cache,
//! the persistent global environment, and the assumption table.
//!
//! # Example
//!
//! ```
//! use mathtex_engine::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! assert_eq!(engine.evaluate("2 + 3 * 4").unwrap(), Value::Numeric(14.0));
//! ```

pub mod ast;
pub mod engine;
pub mod environment;
pub mod error;
pub mod eval;
pub mod export;
pub mod extension;
pub mod functions;
pub mod interval;
pub mod lexer;
pub mod matrix;
pub mod parser;
pub mod symbolic;
pub mod token;
pub mod value;

// Re-export main types
pub use ast::Expr;
pub use engine::{Engine, EngineOptions, ValidationReport};
pub use error::{Error, Result};
pub use extension::ExtensionRegistry;
pub use interval::Interval;
pub use matrix::Matrix;
pub use symbolic::{Assumption, Assumptions};
pub use value::Value;
