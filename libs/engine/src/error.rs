//! Error types for the math engine

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the tokenizer, parser, and evaluator.
///
/// Each variant carries a human-readable message; tokenizer and parser errors
/// also carry the byte position of first detection, and parser errors may
/// carry a best-effort suggestion ("use braces", a near-miss command name).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Tokenization error at byte {position}: {message}")]
    Tokenization { message: String, position: usize },

    #[error("Parse error at byte {position}: {message}")]
    Parse {
        message: String,
        position: usize,
        suggestion: Option<String>,
    },

    #[error("Evaluation error: {message}")]
    Evaluation { message: String },
}

impl Error {
    pub fn tokenization(message: impl Into<String>, position: usize) -> Self {
        Self::Tokenization {
            message: message.into(),
            position,
        }
    }

    pub fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
            suggestion: None,
        }
    }

    pub fn parse_with_suggestion(
        message: impl Into<String>,
        position: usize,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Parse {
            message: message.into(),
            position,
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }

    /// Byte position of first detection, when available.
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Tokenization { position, .. } | Self::Parse { position, .. } => Some(*position),
            Self::Evaluation { .. } => None,
        }
    }

    /// Best-effort suggestion, when one exists.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Parse { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Tokenization { message, .. }
            | Self::Parse { message, .. }
            | Self::Evaluation { message } => message,
        }
    }
}
