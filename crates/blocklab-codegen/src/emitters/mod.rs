//! Built-in emitters, one per [`LanguageKey`](blocklab_core::LanguageKey).
//!
//! Every emitter lays a file out the same way: imports, variable
//! declarations, helper functions in first-use order, procedure
//! definitions, then the top-level stacks separated by blank lines.

mod dart;
mod javascript;
mod lua;
mod php;
mod python;

pub use dart::DartEmitter;
pub use javascript::JavaScriptEmitter;
pub use lua::LuaEmitter;
pub use php::PhpEmitter;
pub use python::PythonEmitter;

use blocklab_core::{Expr, Stmt};

use crate::context::as_whole;

/// The value of a number literal block.
pub(crate) fn number_literal(expr: &Expr) -> Option<f64> {
    match expr {
        Expr::Number { value } => Some(*value),
        _ => None,
    }
}

/// Literals and variable reads: safe to evaluate more than once.
pub(crate) fn is_simple(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Number { .. } | Expr::Text { .. } | Expr::Boolean { .. } | Expr::Variable { .. }
    )
}

/// A counted loop whose bounds are all number literals.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LiteralRange {
    pub from: f64,
    pub to: f64,
    /// Always non-negative; direction comes from `from` and `to`.
    pub step: f64,
}

impl LiteralRange {
    pub fn of(from: &Expr, to: &Expr, by: &Expr) -> Option<LiteralRange> {
        Some(LiteralRange {
            from: number_literal(from)?,
            to: number_literal(to)?,
            step: number_literal(by)?.abs(),
        })
    }

    pub fn ascending(&self) -> bool {
        self.from <= self.to
    }

    /// Integer bounds, when all three values are whole.
    pub fn whole(&self) -> Option<(i64, i64, i64)> {
        Some((as_whole(self.from)?, as_whole(self.to)?, as_whole(self.step)?))
    }
}

/// Whether `body` contains a `continue` that targets the loop owning
/// `body` (one not nested inside an inner loop).
pub(crate) fn continues_here(body: &[Stmt]) -> bool {
    body.iter().any(|stmt| match stmt {
        Stmt::Continue => true,
        s if s.is_loop() => false,
        s => s.bodies().into_iter().any(continues_here),
    })
}

/// Joins rendered stacks with one blank line between them.
pub(crate) fn join_stacks(stacks: Vec<String>) -> String {
    stacks
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether `code` starts like a number literal, which cannot be followed
/// directly by `.member` in some languages.
pub(crate) fn looks_numeric(code: &str) -> bool {
    code.starts_with(|c: char| c.is_ascii_digit())
}

/// Builds a helper definition from its source lines, substituting the
/// identifier the helper was assigned for `{NAME}`.
pub(crate) fn template(lines: &[&str], name: &str) -> String {
    lines.join("\n").replace("{NAME}", name)
}
