//! Studio error types.

use std::path::PathBuf;

use blocklab_codegen::CodegenError;
use blocklab_core::CoreError;
use blocklab_exec::HarnessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    /// A workspace edit or program file was rejected.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Harness(#[from] HarnessError),

    /// A configuration value (environment variable or flag) did not parse.
    #[error("invalid value for {name}: '{value}'")]
    InvalidSetting { name: &'static str, value: String },

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StudioError {
    /// Process exit code for the `blocklab` binary: 1 for usage or
    /// configuration problems, 2 for execution failures, 3 for I/O.
    pub fn exit_code(&self) -> i32 {
        match self {
            StudioError::Harness(_) => 2,
            StudioError::Io { .. } => 3,
            _ => 1,
        }
    }
}
