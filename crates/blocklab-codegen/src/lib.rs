//! Multi-target source emission for blocklab programs.
//!
//! A [`Program`](blocklab_core::Program) is rendered to text by an
//! [`Emitter`] chosen from the [`EmitterRegistry`] by
//! [`LanguageKey`](blocklab_core::LanguageKey). Nothing outside the
//! registry branches on which language is selected.
//!
//! # Modules
//!
//! - [`emitter`] -- The [`Emitter`] trait
//! - [`emitters`] -- Built-in JavaScript, Python, PHP, Lua and Dart emitters
//! - [`registry`] -- Language key to emitter map, validated at startup
//! - [`controller`] -- Re-derives and publishes text on program or language changes
//! - [`context`] -- Per-emission naming, imports, helpers and precedence
//! - [`names`] -- Per-language safe identifiers
//! - [`writer`] -- Indentation-aware text buffer

pub mod context;
pub mod controller;
pub mod emitter;
pub mod emitters;
pub mod error;
pub mod names;
pub mod registry;
pub mod writer;

pub use controller::{CodegenController, SourceSnapshot};
pub use emitter::Emitter;
pub use error::CodegenError;
pub use registry::EmitterRegistry;
