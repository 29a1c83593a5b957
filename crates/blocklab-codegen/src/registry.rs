//! Emitter registry: language key to emission strategy.
//!
//! The registry is built once at startup and only read afterwards. The
//! controller and the studio never branch on which language is selected;
//! they hand the key to [`EmitterRegistry::emit`] and get text back.

use blocklab_core::{LanguageKey, Program};
use indexmap::IndexMap;

use crate::emitter::Emitter;
use crate::emitters::{DartEmitter, JavaScriptEmitter, LuaEmitter, PhpEmitter, PythonEmitter};
use crate::error::CodegenError;

pub struct EmitterRegistry {
    emitters: IndexMap<LanguageKey, Box<dyn Emitter>>,
}

impl std::fmt::Debug for EmitterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmitterRegistry")
            .field("languages", &self.emitters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for EmitterRegistry {
    fn default() -> Self {
        EmitterRegistry::with_builtin()
    }
}

impl EmitterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        EmitterRegistry {
            emitters: IndexMap::new(),
        }
    }

    /// A registry holding the five built-in emitters, in
    /// [`LanguageKey::ALL`] order.
    pub fn with_builtin() -> Self {
        let mut emitters: IndexMap<LanguageKey, Box<dyn Emitter>> = IndexMap::new();
        emitters.insert(LanguageKey::JavaScript, Box::new(JavaScriptEmitter));
        emitters.insert(LanguageKey::Python, Box::new(PythonEmitter));
        emitters.insert(LanguageKey::Php, Box::new(PhpEmitter));
        emitters.insert(LanguageKey::Lua, Box::new(LuaEmitter));
        emitters.insert(LanguageKey::Dart, Box::new(DartEmitter));
        EmitterRegistry { emitters }
    }

    /// Adds an emitter under the key it reports.
    pub fn register(&mut self, emitter: Box<dyn Emitter>) -> Result<(), CodegenError> {
        let key = emitter.language();
        if self.emitters.contains_key(&key) {
            return Err(CodegenError::DuplicateEmitter(key));
        }
        self.emitters.insert(key, emitter);
        Ok(())
    }

    /// Checks that every selectable language has an emitter.
    pub fn validate(&self) -> Result<(), CodegenError> {
        let missing: Vec<LanguageKey> = LanguageKey::ALL
            .iter()
            .copied()
            .filter(|key| !self.emitters.contains_key(key))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            tracing::warn!(?missing, "emitter registry is incomplete");
            Err(CodegenError::MissingEmitters(missing))
        }
    }

    pub fn supports(&self, language: LanguageKey) -> bool {
        self.emitters.contains_key(&language)
    }

    /// Registered languages, in registration order.
    pub fn languages(&self) -> impl Iterator<Item = LanguageKey> + '_ {
        self.emitters.keys().copied()
    }

    /// Renders `program` in `language`.
    pub fn emit(&self, program: &Program, language: LanguageKey) -> Result<String, CodegenError> {
        let emitter = self
            .emitters
            .get(&language)
            .ok_or(CodegenError::UnsupportedLanguage(language))?;
        program.validate()?;
        let text = emitter.emit(program);
        tracing::trace!(%language, bytes = text.len(), "emitted program");
        Ok(text)
    }
}
