//! The per-language emission seam.

use blocklab_core::{LanguageKey, Program};

/// Renders a [`Program`] as source text in one language.
///
/// Implementations are pure: the same program always yields the same text,
/// and every program that passes [`Program::validate`] yields some text.
/// Nothing outside the emitter knows which language it targets beyond the
/// key it reports.
pub trait Emitter {
    /// The language this emitter produces.
    fn language(&self) -> LanguageKey;

    /// Renders `program`. The program has already been validated.
    fn emit(&self, program: &Program) -> String;
}

impl<E: Emitter + ?Sized> Emitter for Box<E> {
    fn language(&self) -> LanguageKey {
        (**self).language()
    }

    fn emit(&self, program: &Program) -> String {
        (**self).emit(program)
    }
}
