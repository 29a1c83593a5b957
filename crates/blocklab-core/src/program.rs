//! Program: the structural representation handed to emitters.
//!
//! A [`Program`] is what the block workspace contains: declared variables,
//! procedure definitions and free-standing statement stacks. It is never
//! mutated by code generation or execution; emitters only read it.
//!
//! [`Program::validate`] checks the structural rules every emitter relies
//! on (calls resolve, arities match, loop control sits inside a loop). A
//! program that validates can be emitted in every language.

use std::cell::RefCell;
use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::block::{walk_stmts, Expr, Stmt};
use crate::error::CoreError;
use crate::id::BlockId;

/// A procedure definition block ("to do something" / "to do something and
/// return").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    pub id: BlockId,
    pub name: String,
    #[serde(default)]
    pub params: Vec<String>,
    #[serde(default)]
    pub body: Vec<Stmt>,
    /// Value returned at the end of the body. `None` for procedures that
    /// return nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<Expr>,
}

/// A stack of statement blocks not attached to any procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStack {
    pub id: BlockId,
    pub body: Vec<Stmt>,
}

/// The full contents of a block workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Variables created explicitly in the workspace, in creation order.
    #[serde(default)]
    pub variables: Vec<String>,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
    #[serde(default)]
    pub stacks: Vec<BlockStack>,
}

/// Deterministic content hash of a program (blake3 over canonical JSON).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramFingerprint(pub blake3::Hash);

impl fmt::Display for ProgramFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.to_hex();
        f.write_str(&hex.as_str()[..16])
    }
}

impl Program {
    pub fn new() -> Self {
        Program::default()
    }

    /// True when the workspace contains no blocks at all.
    ///
    /// Declared-but-unused variables do not count as blocks.
    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty() && self.stacks.iter().all(|s| s.body.is_empty())
    }

    /// Looks up a procedure definition by name.
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }

    /// Every variable the program uses: explicitly declared ones first, then
    /// ones referenced by blocks and procedure parameters, each once, in
    /// first-seen order.
    pub fn all_variables(&self) -> Vec<String> {
        let mut seen: IndexSet<String> = self.variables.iter().cloned().collect();
        for procedure in &self.procedures {
            for param in &procedure.params {
                seen.insert(param.clone());
            }
            collect_variables(&procedure.body, procedure.returns.as_ref(), &mut seen);
        }
        for stack in &self.stacks {
            collect_variables(&stack.body, None, &mut seen);
        }
        seen.into_iter().collect()
    }

    /// Top-level statements in display order.
    pub fn statements(&self) -> impl Iterator<Item = &Stmt> {
        self.stacks.iter().flat_map(|s| s.body.iter())
    }

    /// Calls `stmt_fn` / `expr_fn` on every block of the program, procedure
    /// bodies first.
    pub fn walk<'a>(&'a self, stmt_fn: &mut dyn FnMut(&'a Stmt), expr_fn: &mut dyn FnMut(&'a Expr)) {
        for procedure in &self.procedures {
            walk_stmts(&procedure.body, stmt_fn, expr_fn);
            if let Some(ret) = &procedure.returns {
                ret.walk(expr_fn);
            }
        }
        for stack in &self.stacks {
            walk_stmts(&stack.body, stmt_fn, expr_fn);
        }
    }

    /// Whether any block matches `pred`.
    pub fn any_expr(&self, mut pred: impl FnMut(&Expr) -> bool) -> bool {
        let mut found = false;
        self.walk(&mut |_| {}, &mut |e| {
            if !found && pred(e) {
                found = true;
            }
        });
        found
    }

    /// Checks the structural rules emission relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        for name in &self.variables {
            if name.trim().is_empty() {
                return Err(CoreError::EmptyName { what: "variable" });
            }
        }

        let mut names: IndexSet<&str> = IndexSet::new();
        for procedure in &self.procedures {
            if procedure.name.trim().is_empty() {
                return Err(CoreError::EmptyName { what: "procedure" });
            }
            if !names.insert(procedure.name.as_str()) {
                return Err(CoreError::DuplicateProcedure {
                    name: procedure.name.clone(),
                });
            }
            let mut params: IndexSet<&str> = IndexSet::new();
            for param in &procedure.params {
                if param.trim().is_empty() {
                    return Err(CoreError::EmptyName { what: "parameter" });
                }
                if !params.insert(param.as_str()) {
                    return Err(CoreError::DuplicateParameter {
                        procedure: procedure.name.clone(),
                        param: param.clone(),
                    });
                }
            }
        }

        for procedure in &self.procedures {
            check_loop_control(&procedure.body, false)?;
        }
        for stack in &self.stacks {
            check_loop_control(&stack.body, false)?;
        }

        let result = RefCell::new(Ok(()));
        self.walk(
            &mut |stmt| {
                if result.borrow().is_err() {
                    return;
                }
                let outcome = match stmt {
                    Stmt::Call { name, args } => self.check_call(name, args.len(), false),
                    _ => match stmt.assigned_variable() {
                        Some(name) if name.trim().is_empty() => {
                            Err(CoreError::EmptyName { what: "variable" })
                        }
                        _ => Ok(()),
                    },
                };
                *result.borrow_mut() = outcome;
            },
            &mut |expr| {
                if result.borrow().is_err() {
                    return;
                }
                let outcome = match expr {
                    Expr::Call { name, args } => self.check_call(name, args.len(), true),
                    Expr::Variable { name } if name.trim().is_empty() => {
                        Err(CoreError::EmptyName { what: "variable" })
                    }
                    _ => Ok(()),
                };
                *result.borrow_mut() = outcome;
            },
        );
        result.into_inner()
    }

    fn check_call(&self, name: &str, got: usize, needs_value: bool) -> Result<(), CoreError> {
        let procedure = self.procedure(name).ok_or_else(|| CoreError::UnknownProcedure {
            name: name.to_string(),
        })?;
        if procedure.params.len() != got {
            return Err(CoreError::ArityMismatch {
                name: name.to_string(),
                expected: procedure.params.len(),
                got,
            });
        }
        if needs_value && procedure.returns.is_none() {
            return Err(CoreError::NoReturnValue {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Content hash over the canonical JSON form of the program.
    ///
    /// Equal programs always produce equal fingerprints; the program uses
    /// only `Vec`s and ordered sets, so serialization order is stable.
    pub fn fingerprint(&self) -> Result<ProgramFingerprint, CoreError> {
        let mut hasher = blake3::Hasher::new();
        serde_json::to_writer(&mut hasher, self)?;
        Ok(ProgramFingerprint(hasher.finalize()))
    }
}

fn collect_variables(body: &[Stmt], returns: Option<&Expr>, seen: &mut IndexSet<String>) {
    let ordered: RefCell<Vec<&str>> = RefCell::new(Vec::new());
    walk_stmts(
        body,
        &mut |stmt| {
            if let Some(name) = stmt.assigned_variable() {
                ordered.borrow_mut().push(name);
            }
        },
        &mut |expr| {
            if let Expr::Variable { name } = expr {
                ordered.borrow_mut().push(name);
            }
        },
    );
    if let Some(ret) = returns {
        ret.walk(&mut |expr| {
            if let Expr::Variable { name } = expr {
                ordered.borrow_mut().push(name);
            }
        });
    }
    for name in ordered.into_inner() {
        if !seen.contains(name) {
            seen.insert(name.to_string());
        }
    }
}

fn check_loop_control(body: &[Stmt], in_loop: bool) -> Result<(), CoreError> {
    for stmt in body {
        match stmt {
            Stmt::Break if !in_loop => {
                return Err(CoreError::LoopControlOutsideLoop { keyword: "break" })
            }
            Stmt::Continue if !in_loop => {
                return Err(CoreError::LoopControlOutsideLoop { keyword: "continue" })
            }
            _ => {
                let nested = in_loop || stmt.is_loop();
                for inner in stmt.bodies() {
                    check_loop_control(inner, nested)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{ArithmeticOp, CompareOp};

    fn counter_program() -> Program {
        Program {
            variables: vec!["count".into()],
            procedures: vec![Procedure {
                id: BlockId(1),
                name: "double".into(),
                params: vec!["n".into()],
                body: vec![],
                returns: Some(Expr::arithmetic(
                    ArithmeticOp::Multiply,
                    Expr::var("n"),
                    Expr::number(2.0),
                )),
            }],
            stacks: vec![BlockStack {
                id: BlockId(2),
                body: vec![
                    Stmt::set("count", Expr::number(0.0)),
                    Stmt::repeat(
                        Expr::number(3.0),
                        vec![Stmt::set("total", Expr::call("double", vec![Expr::var("count")]))],
                    ),
                ],
            }],
        }
    }

    #[test]
    fn empty_program_is_empty() {
        assert!(Program::new().is_empty());
        let mut with_variable = Program::new();
        with_variable.variables.push("x".into());
        assert!(with_variable.is_empty());
        assert!(!counter_program().is_empty());
    }

    #[test]
    fn all_variables_in_first_seen_order() {
        assert_eq!(counter_program().all_variables(), vec!["count", "n", "total"]);
    }

    #[test]
    fn valid_program_validates() {
        counter_program().validate().unwrap();
    }

    #[test]
    fn unknown_procedure_is_rejected() {
        let mut program = counter_program();
        program.stacks[0].body.push(Stmt::call("missing", vec![]));
        let err = program.validate().unwrap_err();
        assert!(matches!(err, CoreError::UnknownProcedure { ref name } if name == "missing"));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut program = counter_program();
        program.stacks[0]
            .body
            .push(Stmt::set("x", Expr::call("double", vec![])));
        let err = program.validate().unwrap_err();
        assert!(matches!(err, CoreError::ArityMismatch { expected: 1, got: 0, .. }));
    }

    #[test]
    fn void_procedure_used_as_value_is_rejected() {
        let mut program = counter_program();
        program.procedures.push(Procedure {
            id: BlockId(3),
            name: "greet".into(),
            params: vec![],
            body: vec![Stmt::print(Expr::text("hi"))],
            returns: None,
        });
        program.stacks[0]
            .body
            .push(Stmt::print(Expr::call("greet", vec![])));
        assert!(matches!(
            program.validate().unwrap_err(),
            CoreError::NoReturnValue { .. }
        ));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let mut program = Program::new();
        program.stacks.push(BlockStack {
            id: BlockId(1),
            body: vec![Stmt::if_then(Expr::boolean(true), vec![Stmt::Break])],
        });
        assert!(matches!(
            program.validate().unwrap_err(),
            CoreError::LoopControlOutsideLoop { keyword: "break" }
        ));
    }

    #[test]
    fn break_inside_nested_if_in_loop_is_fine() {
        let mut program = Program::new();
        program.stacks.push(BlockStack {
            id: BlockId(1),
            body: vec![Stmt::While {
                mode: crate::block::LoopMode::While,
                condition: Expr::boolean(true),
                body: vec![Stmt::if_then(
                    Expr::compare(CompareOp::Gt, Expr::var("x"), Expr::number(3.0)),
                    vec![Stmt::Break],
                )],
            }],
        });
        program.validate().unwrap();
    }

    #[test]
    fn duplicate_procedures_are_rejected() {
        let mut program = counter_program();
        let mut copy = program.procedures[0].clone();
        copy.id = BlockId(9);
        program.procedures.push(copy);
        assert!(matches!(
            program.validate().unwrap_err(),
            CoreError::DuplicateProcedure { .. }
        ));
    }

    #[test]
    fn fingerprint_is_deterministic_and_content_sensitive() {
        let a = counter_program().fingerprint().unwrap();
        let b = counter_program().fingerprint().unwrap();
        assert_eq!(a, b);

        let mut changed = counter_program();
        changed.variables.push("other".into());
        assert_ne!(a, changed.fingerprint().unwrap());
        assert_eq!(a.to_string().len(), 16);
    }

    #[test]
    fn program_document_defaults_missing_sections() {
        let program: Program = serde_json::from_str(r#"{ "stacks": [] }"#).unwrap();
        assert!(program.variables.is_empty());
        assert!(program.procedures.is_empty());
    }
}
