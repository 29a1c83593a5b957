//! A small JavaScript-subset engine.
//!
//! Covers what the block emitters produce plus the everyday language a user
//! might paste into the output pane: `var`/`let`/`const`, functions and
//! closures, the usual operators, loops, `try`/`catch`/`finally`, arrays and
//! object literals, and the standard globals in [`builtins`]. Classes,
//! regular expressions, template literals and async code are not supported.

pub mod ast;
pub mod builtins;
pub mod error;
pub mod interp;
pub mod json;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod scope;
pub mod value;

pub use error::{Abort, Budget, ScriptError, SyntaxError};
pub use interp::{Interpreter, Limits, MAX_STRING_LENGTH};
pub use parser::parse;
pub use scope::{Scope, ScopeKind};
pub use value::Value;
