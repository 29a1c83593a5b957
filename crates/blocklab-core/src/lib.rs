//! Block program model for blocklab.
//!
//! Holds the structural program representation produced by the block
//! workspace ([`Program`], [`Expr`], [`Stmt`]), the closed set of output
//! languages ([`LanguageKey`]), and the [`Workspace`] that owns and edits a
//! program while notifying listeners of every change.

pub mod block;
pub mod error;
pub mod id;
pub mod language;
pub mod program;
pub mod workspace;

// Re-export commonly used types
pub use block::{Branch, Expr, Stmt};
pub use error::CoreError;
pub use id::{BlockId, ListenerId};
pub use language::LanguageKey;
pub use program::{BlockStack, Procedure, Program, ProgramFingerprint};
pub use workspace::{ProgramSource, Workspace, WorkspaceEvent};
