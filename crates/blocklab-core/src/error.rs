//! Core error types for blocklab-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! the ways a block program can be structurally invalid and the ways a
//! workspace edit can be refused.

use thiserror::Error;

use crate::id::BlockId;

/// Core errors produced by the blocklab-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A language name did not match any known [`LanguageKey`](crate::LanguageKey).
    #[error("unknown language: '{name}'")]
    UnknownLanguage { name: String },

    /// A variable, parameter or procedure was given an empty name.
    #[error("empty {what} name")]
    EmptyName { what: &'static str },

    /// Two procedures share a name.
    #[error("duplicate procedure name: '{name}'")]
    DuplicateProcedure { name: String },

    /// A procedure declares the same parameter twice.
    #[error("procedure '{procedure}' declares parameter '{param}' more than once")]
    DuplicateParameter { procedure: String, param: String },

    /// A call block names a procedure that is not defined.
    #[error("call to undefined procedure '{name}'")]
    UnknownProcedure { name: String },

    /// A call block passes the wrong number of arguments.
    #[error("procedure '{name}' expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// A procedure without a return value is used as an expression.
    #[error("procedure '{name}' returns no value but is used as an expression")]
    NoReturnValue { name: String },

    /// `break` or `continue` outside of any loop.
    #[error("'{keyword}' used outside of a loop")]
    LoopControlOutsideLoop { keyword: &'static str },

    /// A block ID was not found in the workspace.
    #[error("block not found: BlockId({id})", id = id.0)]
    BlockNotFound { id: BlockId },

    /// A variable was not found in the workspace.
    #[error("variable not found: '{name}'")]
    VariableNotFound { name: String },

    /// Canonical serialization of the program failed while fingerprinting.
    #[error("failed to fingerprint program: {0}")]
    Fingerprint(#[from] serde_json::Error),
}
