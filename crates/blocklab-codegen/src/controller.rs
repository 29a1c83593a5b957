//! Code generation controller.
//!
//! Holds the selected output language and the latest derived source text.
//! Every relevant event (a program edit or a language selection) re-derives
//! the text wholesale through the [`EmitterRegistry`] and publishes the new
//! [`SourceSnapshot`] to subscribers before returning, so a subscriber never
//! sees text that belongs to an older (program, language) pair.

use blocklab_core::{LanguageKey, ListenerId, ProgramFingerprint, ProgramSource};
use serde::{Serialize, Serializer};

use crate::error::CodegenError;
use crate::registry::EmitterRegistry;

/// Source text together with the inputs it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSnapshot {
    pub language: LanguageKey,
    /// Program source revision at derivation time.
    pub revision: u64,
    #[serde(serialize_with = "fingerprint_hex")]
    pub fingerprint: ProgramFingerprint,
    pub text: String,
}

fn fingerprint_hex<S: Serializer>(fingerprint: &ProgramFingerprint, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&fingerprint.to_string())
}

type Subscriber = Box<dyn FnMut(&SourceSnapshot)>;

pub struct CodegenController {
    registry: EmitterRegistry,
    language: LanguageKey,
    snapshot: Option<SourceSnapshot>,
    subscribers: Vec<(ListenerId, Subscriber)>,
    next_subscriber: u32,
    derivations: u64,
}

impl std::fmt::Debug for CodegenController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodegenController")
            .field("registry", &self.registry)
            .field("language", &self.language)
            .field("snapshot", &self.snapshot)
            .field("subscribers", &self.subscribers.len())
            .field("derivations", &self.derivations)
            .finish()
    }
}

impl CodegenController {
    /// Creates a controller over a validated registry. Fails if any
    /// selectable language lacks an emitter.
    pub fn new(registry: EmitterRegistry, language: LanguageKey) -> Result<Self, CodegenError> {
        registry.validate()?;
        Ok(CodegenController {
            registry,
            language,
            snapshot: None,
            subscribers: Vec::new(),
            next_subscriber: 0,
            derivations: 0,
        })
    }

    pub fn language(&self) -> LanguageKey {
        self.language
    }

    pub fn registry(&self) -> &EmitterRegistry {
        &self.registry
    }

    /// The latest published snapshot, if anything has been derived yet.
    pub fn snapshot(&self) -> Option<&SourceSnapshot> {
        self.snapshot.as_ref()
    }

    /// The latest derived text; empty before the first derivation.
    pub fn current_source_text(&self) -> &str {
        self.snapshot.as_ref().map_or("", |s| s.text.as_str())
    }

    /// Number of re-derivations performed so far.
    pub fn derivations(&self) -> u64 {
        self.derivations
    }

    /// Whether the published snapshot lags behind `source` or the selected
    /// language.
    pub fn is_stale(&self, source: &dyn ProgramSource) -> bool {
        match &self.snapshot {
            Some(s) => s.language != self.language || s.revision != source.revision(),
            None => true,
        }
    }

    /// Registers a snapshot subscriber. Subscribers run synchronously, in
    /// registration order, after every derivation.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&SourceSnapshot) + 'static) -> ListenerId {
        let id = ListenerId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Re-derives the text for the current language after a program edit.
    pub fn on_program_changed(
        &mut self,
        source: &dyn ProgramSource,
    ) -> Result<&SourceSnapshot, CodegenError> {
        self.derive(self.language, source)
    }

    /// Selects `language` and re-derives the text for the existing program.
    /// An unsupported key, or a program that cannot be emitted, leaves the
    /// controller untouched.
    pub fn on_language_changed(
        &mut self,
        language: LanguageKey,
        source: &dyn ProgramSource,
    ) -> Result<&SourceSnapshot, CodegenError> {
        if !self.registry.supports(language) {
            return Err(CodegenError::UnsupportedLanguage(language));
        }
        self.derive(language, source)
    }

    /// Emits `source` in `language`; the language is only committed once
    /// the text exists.
    fn derive(
        &mut self,
        language: LanguageKey,
        source: &dyn ProgramSource,
    ) -> Result<&SourceSnapshot, CodegenError> {
        let program = source.program();
        let text = self.registry.emit(program, language)?;
        let snapshot = SourceSnapshot {
            language,
            revision: source.revision(),
            fingerprint: program.fingerprint()?,
            text,
        };
        self.language = language;
        self.derivations += 1;
        tracing::debug!(
            language = %snapshot.language,
            revision = snapshot.revision,
            fingerprint = %snapshot.fingerprint,
            derivation = self.derivations,
            "re-derived source text"
        );
        for (_, subscriber) in &mut self.subscribers {
            subscriber(&snapshot);
        }
        Ok(self.snapshot.insert(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blocklab_core::{BlockId, BlockStack, Expr, Program, Stmt, Workspace};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller() -> CodegenController {
        CodegenController::new(EmitterRegistry::with_builtin(), LanguageKey::JavaScript).unwrap()
    }

    #[test]
    fn text_is_empty_before_first_derivation() {
        let controller = controller();
        assert_eq!(controller.current_source_text(), "");
        assert!(controller.snapshot().is_none());
        assert!(controller.is_stale(&Workspace::new()));
    }

    #[test]
    fn incomplete_registry_is_rejected() {
        let err = CodegenController::new(EmitterRegistry::new(), LanguageKey::JavaScript).unwrap_err();
        assert!(matches!(err, CodegenError::MissingEmitters(_)));
    }

    #[test]
    fn program_change_rederives_with_current_language() {
        let mut workspace = Workspace::new();
        let mut controller = controller();
        workspace
            .add_stack(vec![Stmt::print(Expr::text("hi"))])
            .unwrap();
        let snapshot = controller.on_program_changed(&workspace).unwrap();
        assert_eq!(snapshot.language, LanguageKey::JavaScript);
        assert_eq!(snapshot.revision, 1);
        assert_eq!(snapshot.text, "window.alert('hi');\n");
        assert!(!controller.is_stale(&workspace));
    }

    #[test]
    fn language_change_rederives_existing_program_once() {
        let mut workspace = Workspace::new();
        workspace
            .add_stack(vec![Stmt::print(Expr::text("hi"))])
            .unwrap();
        let mut controller = controller();
        controller.on_program_changed(&workspace).unwrap();
        let before = controller.derivations();
        let revision = workspace.revision();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        controller.subscribe(move |s| sink.borrow_mut().push(s.language));

        controller
            .on_language_changed(LanguageKey::Python, &workspace)
            .unwrap();
        assert_eq!(controller.derivations(), before + 1);
        assert_eq!(*seen.borrow(), vec![LanguageKey::Python]);
        assert_eq!(controller.current_source_text(), "print('hi')\n");
        assert_eq!(workspace.revision(), revision);
    }

    #[test]
    fn failed_language_change_keeps_previous_selection() {
        let mut workspace = Workspace::new();
        workspace
            .add_stack(vec![Stmt::print(Expr::text("hi"))])
            .unwrap();
        let mut controller = controller();
        controller.on_program_changed(&workspace).unwrap();
        let before = controller.derivations();

        let broken = Program {
            stacks: vec![BlockStack {
                id: BlockId(1),
                body: vec![Stmt::Break],
            }],
            ..Program::default()
        };
        assert!(controller.on_language_changed(LanguageKey::Python, &broken).is_err());
        assert_eq!(controller.language(), LanguageKey::JavaScript);
        assert_eq!(controller.derivations(), before);
        assert_eq!(controller.current_source_text(), "window.alert('hi');\n");
        assert!(!controller.is_stale(&workspace));

        controller.on_program_changed(&workspace).unwrap();
        assert_eq!(controller.snapshot().unwrap().language, LanguageKey::JavaScript);
    }

    #[test]
    fn reading_text_is_idempotent() {
        let workspace = Workspace::new();
        let mut controller = controller();
        controller.on_program_changed(&workspace).unwrap();
        let first = controller.current_source_text().to_string();
        assert_eq!(controller.current_source_text(), first);
        assert_eq!(controller.derivations(), 1);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let workspace = Workspace::new();
        let mut controller = controller();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        let id = controller.subscribe(move |_| *counter.borrow_mut() += 1);
        controller.on_program_changed(&workspace).unwrap();
        assert!(controller.unsubscribe(id));
        controller.on_program_changed(&workspace).unwrap();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn snapshot_serializes_short_fingerprint() {
        let workspace = Workspace::new();
        let mut controller = controller();
        let snapshot = controller.on_program_changed(&workspace).unwrap().clone();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["language"], "javascript");
        assert_eq!(json["fingerprint"].as_str().unwrap().len(), 16);
        assert_eq!(json["text"], "");
    }
}
