//! Error types for parsing and evaluating scripts.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// A parse failure with its source position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("SyntaxError: {message} (line {line}, column {column})")]
pub struct SyntaxError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, line: u32, column: u32) -> Self {
        SyntaxError {
            message: message.into(),
            line,
            column,
        }
    }
}

/// The budget an execution ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Budget {
    Steps { limit: u64 },
    Time { limit_ms: u64 },
}

impl Budget {
    pub fn time(limit: Duration) -> Self {
        Budget::Time {
            limit_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Steps { limit } => write!(f, "step budget of {limit}"),
            Budget::Time { limit_ms } => write!(f, "time budget of {limit_ms} ms"),
        }
    }
}

/// Why evaluation stopped early. Thrown script values travel as
/// `Throw`; running out of budget is not catchable by the script.
#[derive(Debug, Clone)]
pub enum Abort {
    Throw(Value),
    Timeout(Budget),
}

/// Outcome of a failed script run, as seen by the embedder.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// An uncaught exception. `message` is the error's message (or the
    /// thrown value's string form); `trace` is its stack text.
    #[error("uncaught {message}")]
    Uncaught { message: String, trace: String },

    #[error("execution exceeded its {0}")]
    Timeout(Budget),
}
