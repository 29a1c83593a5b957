//! Codegen error types covering registry configuration and emission.

use blocklab_core::{CoreError, LanguageKey};

/// Errors that can occur while registering emitters or producing source text.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// No emitter is registered for the requested language.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(LanguageKey),

    /// Selectable languages without an emitter, found by
    /// [`EmitterRegistry::validate`](crate::EmitterRegistry::validate).
    #[error("no emitter registered for: {}", .0.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(", "))]
    MissingEmitters(Vec<LanguageKey>),

    /// A second emitter was registered for the same language.
    #[error("emitter already registered for {0}")]
    DuplicateEmitter(LanguageKey),

    /// The program is not structurally valid and cannot be emitted.
    #[error("invalid program: {0}")]
    InvalidProgram(#[from] CoreError),
}
