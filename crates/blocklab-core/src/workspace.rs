//! Block workspace: the mutable owner of a [`Program`].
//!
//! The workspace is the only thing allowed to change a program. Every edit
//! is applied to a scratch copy, validated, and only then committed, so the
//! program a [`ProgramSource`] hands out always validates and can be emitted
//! in every language. Each committed edit bumps the revision and notifies
//! listeners; the notification carries no payload beyond "something
//! changed" and the new revision.

use std::fmt;

use indexmap::IndexSet;

use crate::block::{rename_all, Expr, Stmt};
use crate::error::CoreError;
use crate::id::{BlockId, ListenerId};
use crate::program::{BlockStack, Procedure, Program};

/// Read access to the current program plus a change counter.
pub trait ProgramSource {
    /// The current structural program representation.
    fn program(&self) -> &Program;

    /// Monotonically increasing counter bumped by every committed edit.
    fn revision(&self) -> u64;
}

/// Notification delivered to workspace listeners after a committed edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkspaceEvent {
    pub revision: u64,
}

type Listener = Box<dyn FnMut(&WorkspaceEvent)>;

/// In-process block workspace.
pub struct Workspace {
    program: Program,
    revision: u64,
    next_block_id: u32,
    next_listener_id: u32,
    listeners: Vec<(ListenerId, Listener)>,
}

impl fmt::Debug for Workspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("program", &self.program)
            .field("revision", &self.revision)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Workspace::new()
    }
}

impl Workspace {
    /// Creates an empty workspace at revision 0.
    pub fn new() -> Self {
        Workspace {
            program: Program::new(),
            revision: 0,
            next_block_id: 1,
            next_listener_id: 0,
            listeners: Vec::new(),
        }
    }

    /// Creates a workspace holding `program`, after validating it.
    pub fn from_program(program: Program) -> Result<Self, CoreError> {
        program.validate()?;
        let next_block_id = program
            .procedures
            .iter()
            .map(|p| p.id.0)
            .chain(program.stacks.iter().map(|s| s.id.0))
            .max()
            .map_or(1, |max| max + 1);
        Ok(Workspace {
            program,
            revision: 0,
            next_block_id,
            next_listener_id: 0,
            listeners: Vec::new(),
        })
    }

    /// Registers a change listener. Listeners run synchronously, in
    /// registration order, after each committed edit.
    pub fn subscribe(&mut self, listener: impl FnMut(&WorkspaceEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Applies `edit` to a copy of the program and commits it if the result
    /// validates. A rejected edit leaves the workspace untouched and fires
    /// no notification.
    pub fn edit<T>(
        &mut self,
        edit: impl FnOnce(&mut Program) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let mut scratch = self.program.clone();
        let value = edit(&mut scratch)?;
        scratch.validate()?;
        self.program = scratch;
        self.revision += 1;
        let event = WorkspaceEvent {
            revision: self.revision,
        };
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
        Ok(value)
    }

    /// Creates a variable. Returns `false` if it already existed.
    pub fn declare_variable(&mut self, name: &str) -> Result<bool, CoreError> {
        let name = name.to_string();
        self.edit(move |program| {
            if name.trim().is_empty() {
                return Err(CoreError::EmptyName { what: "variable" });
            }
            if program.variables.contains(&name) {
                return Ok(false);
            }
            program.variables.push(name);
            Ok(true)
        })
    }

    /// Renames a variable everywhere it is used, parameters included.
    pub fn rename_variable(&mut self, from: &str, to: &str) -> Result<(), CoreError> {
        let (from, to) = (from.to_string(), to.to_string());
        self.edit(move |program| {
            if to.trim().is_empty() {
                return Err(CoreError::EmptyName { what: "variable" });
            }
            if !program.all_variables().contains(&from) {
                return Err(CoreError::VariableNotFound { name: from });
            }
            for name in &mut program.variables {
                if *name == from {
                    *name = to.clone();
                }
            }
            let unique: IndexSet<String> = program.variables.drain(..).collect();
            program.variables = unique.into_iter().collect();
            for procedure in &mut program.procedures {
                for param in &mut procedure.params {
                    if *param == from {
                        *param = to.clone();
                    }
                }
                rename_all(&mut procedure.body, &from, &to);
                if let Some(ret) = &mut procedure.returns {
                    ret.rename_variable(&from, &to);
                }
            }
            for stack in &mut program.stacks {
                rename_all(&mut stack.body, &from, &to);
            }
            Ok(())
        })
    }

    /// Places a new statement stack on the workspace.
    pub fn add_stack(&mut self, body: Vec<Stmt>) -> Result<BlockId, CoreError> {
        let id = BlockId(self.next_block_id);
        self.edit(move |program| {
            program.stacks.push(BlockStack { id, body });
            Ok(id)
        })?;
        self.next_block_id += 1;
        Ok(id)
    }

    /// Replaces the statements of an existing stack.
    pub fn replace_stack(&mut self, id: BlockId, body: Vec<Stmt>) -> Result<(), CoreError> {
        self.edit(move |program| {
            let stack = program
                .stacks
                .iter_mut()
                .find(|s| s.id == id)
                .ok_or(CoreError::BlockNotFound { id })?;
            stack.body = body;
            Ok(())
        })
    }

    /// Defines a procedure.
    pub fn add_procedure(
        &mut self,
        name: &str,
        params: Vec<String>,
        body: Vec<Stmt>,
        returns: Option<Expr>,
    ) -> Result<BlockId, CoreError> {
        let id = BlockId(self.next_block_id);
        let name = name.to_string();
        self.edit(move |program| {
            program.procedures.push(Procedure {
                id,
                name,
                params,
                body,
                returns,
            });
            Ok(id)
        })?;
        self.next_block_id += 1;
        Ok(id)
    }

    /// Deletes a stack or procedure. Deleting a procedure that is still
    /// called somewhere is refused by validation.
    pub fn remove_block(&mut self, id: BlockId) -> Result<(), CoreError> {
        self.edit(move |program| {
            let before = program.stacks.len() + program.procedures.len();
            program.stacks.retain(|s| s.id != id);
            program.procedures.retain(|p| p.id != id);
            if program.stacks.len() + program.procedures.len() == before {
                return Err(CoreError::BlockNotFound { id });
            }
            Ok(())
        })
    }

    /// Replaces the whole program, as when loading a document.
    pub fn load(&mut self, program: Program) -> Result<(), CoreError> {
        let next = program
            .procedures
            .iter()
            .map(|p| p.id.0)
            .chain(program.stacks.iter().map(|s| s.id.0))
            .max()
            .map_or(1, |max| max + 1);
        self.edit(move |current| {
            *current = program;
            Ok(())
        })?;
        self.next_block_id = self.next_block_id.max(next);
        Ok(())
    }

    /// Removes every block and variable.
    pub fn clear(&mut self) -> Result<(), CoreError> {
        self.edit(|program| {
            *program = Program::new();
            Ok(())
        })
    }
}

impl ProgramSource for Workspace {
    fn program(&self) -> &Program {
        &self.program
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

impl ProgramSource for Program {
    fn program(&self) -> &Program {
        self
    }

    fn revision(&self) -> u64 {
        0
    }
}
