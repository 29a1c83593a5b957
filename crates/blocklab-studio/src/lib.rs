//! Shell-side glue for blocklab.
//!
//! [`Studio`] is the headless presentation shell: it owns the workspace,
//! keeps the source text current through the code generation controller,
//! and runs that text in the execution harness on request. The `blocklab`
//! binary drives it from the command line.

pub mod config;
pub mod error;
pub mod studio;

pub use config::StudioConfig;
pub use error::StudioError;
pub use studio::Studio;
