//! Export visitors
//!
//! Four independent, pure, depth-bounded tree walks: a canonical TeX writer
//! (round-trip law: parsing its output reproduces a structurally equal
//! tree), a presentation-MathML writer, a JSON tree dump, and a SymPy
//! surface-syntax writer with a script-skeleton helper.

pub mod json;
pub mod latex;
pub mod mathml;
pub mod sympy;

use crate::error::{Error, Result};

/// Depth ceiling shared by the writers.
pub(crate) const MAX_EXPORT_DEPTH: usize = crate::parser::DEFAULT_MAX_DEPTH;

pub(crate) fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_EXPORT_DEPTH {
        return Err(Error::evaluation(format!(
            "export exceeds the depth ceiling of {}",
            MAX_EXPORT_DEPTH
        )));
    }
    Ok(())
}
