//! The presentation shell, minus the presentation.
//!
//! [`Studio`] wires a [`Workspace`], a [`CodegenController`] and a
//! [`Harness`] together: edits and language switches re-derive the source
//! text, and [`Studio::execute`] hands whatever text is current to the
//! harness together with the selected language.

use blocklab_codegen::{CodegenController, EmitterRegistry, SourceSnapshot};
use blocklab_core::{CoreError, LanguageKey, ListenerId, Program, Workspace};
use blocklab_exec::{ExecutionReport, Harness};

use crate::config::StudioConfig;
use crate::error::StudioError;

#[derive(Debug)]
pub struct Studio {
    workspace: Workspace,
    controller: CodegenController,
    harness: Harness,
}

impl Studio {
    /// A studio with an empty program.
    pub fn new(config: StudioConfig) -> Result<Self, StudioError> {
        Studio::with_workspace(Workspace::new(), config)
    }

    /// A studio over `program`, which must validate.
    pub fn with_program(program: Program, config: StudioConfig) -> Result<Self, StudioError> {
        Studio::with_workspace(Workspace::from_program(program)?, config)
    }

    fn with_workspace(workspace: Workspace, config: StudioConfig) -> Result<Self, StudioError> {
        let mut controller = CodegenController::new(EmitterRegistry::with_builtin(), config.language)?;
        controller.on_program_changed(&workspace)?;
        Ok(Studio {
            workspace,
            controller,
            harness: Harness::new(config.harness),
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn controller(&self) -> &CodegenController {
        &self.controller
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    pub fn language(&self) -> LanguageKey {
        self.controller.language()
    }

    /// The text for the current program in the selected language.
    pub fn current_source_text(&self) -> &str {
        self.controller.current_source_text()
    }

    pub fn snapshot(&self) -> Option<&SourceSnapshot> {
        self.controller.snapshot()
    }

    /// Forwards every published snapshot to `subscriber`.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&SourceSnapshot) + 'static) -> ListenerId {
        self.controller.subscribe(subscriber)
    }

    /// Applies an edit through the workspace and re-derives the text if it
    /// was committed.
    pub fn edit<T>(
        &mut self,
        edit: impl FnOnce(&mut Program) -> Result<T, CoreError>,
    ) -> Result<T, StudioError> {
        let value = self.workspace.edit(edit)?;
        self.refresh()?;
        Ok(value)
    }

    /// Replaces the whole program.
    pub fn load(&mut self, program: Program) -> Result<(), StudioError> {
        self.workspace.load(program)?;
        self.refresh()
    }

    /// Selects the output language. An unsupported key changes nothing.
    pub fn set_language(&mut self, language: LanguageKey) -> Result<(), StudioError> {
        self.controller.on_language_changed(language, &self.workspace)?;
        Ok(())
    }

    /// Runs the current source text in the selected language.
    pub fn execute(&mut self) -> Result<ExecutionReport, StudioError> {
        let language = self.controller.language();
        let text = self.controller.current_source_text();
        Ok(self.harness.execute(text, language)?)
    }

    /// Runs arbitrary `source` as if it were in the selected language.
    pub fn execute_source(&mut self, source: &str) -> Result<ExecutionReport, StudioError> {
        let language = self.controller.language();
        Ok(self.harness.execute(source, language)?)
    }

    fn refresh(&mut self) -> Result<(), StudioError> {
        if self.controller.is_stale(&self.workspace) {
            self.controller.on_program_changed(&self.workspace)?;
        }
        Ok(())
    }
}
