//! Per-emission state shared by every emitter: identifiers, imports, helper
//! definitions and precedence-aware parenthesization.

use blocklab_core::Program;
use indexmap::{IndexMap, IndexSet};

use crate::names::{NameKind, NameTable};

/// Binding strength of an emitted expression. Lower binds tighter; each
/// emitter defines its own table of constants.
pub type Order = u8;

/// Loosest possible order: the expression is used on its own.
pub const ORDER_NONE: Order = u8::MAX;

/// Wraps `code` in parentheses when an expression of strength `inner`
/// appears where `outer` is expected and would otherwise re-associate.
pub fn parenthesize(code: String, inner: Order, outer: Order) -> String {
    if inner >= outer && !(inner == outer && (outer == 0 || outer == ORDER_NONE)) {
        format!("({code})")
    } else {
        code
    }
}

/// State carried through one `emit` call.
#[derive(Debug)]
pub struct EmitContext {
    pub names: NameTable,
    imports: IndexSet<String>,
    helpers: IndexMap<&'static str, (String, String)>,
}

impl EmitContext {
    /// Creates a context and assigns identifiers for every variable and
    /// procedure of `program`, in declaration order.
    pub fn new(program: &Program, reserved: &[&'static str]) -> Self {
        let mut names = NameTable::new(reserved);
        for variable in program.all_variables() {
            names.declare(NameKind::Variable, &variable);
        }
        for procedure in &program.procedures {
            names.declare(NameKind::Procedure, &procedure.name);
        }
        EmitContext {
            names,
            imports: IndexSet::new(),
            helpers: IndexMap::new(),
        }
    }

    pub fn var(&self, name: &str) -> String {
        self.names.get(NameKind::Variable, name)
    }

    pub fn procedure(&self, name: &str) -> String {
        self.names.get(NameKind::Procedure, name)
    }

    /// Records an import line; duplicates are ignored.
    pub fn import(&mut self, line: &str) {
        if !self.imports.contains(line) {
            self.imports.insert(line.to_string());
        }
    }

    /// Registers a helper function once and returns its identifier.
    ///
    /// `key` identifies the helper; `build` receives the allocated
    /// identifier and returns the full definition text. It only runs the
    /// first time a helper is requested.
    pub fn helper(&mut self, key: &'static str, build: impl FnOnce(&str) -> String) -> String {
        if let Some((name, _)) = self.helpers.get(key) {
            return name.clone();
        }
        let name = self.names.distinct(key);
        let body = build(&name);
        self.helpers.insert(key, (name.clone(), body));
        name
    }

    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().map(String::as_str)
    }

    pub fn helper_definitions(&self) -> impl Iterator<Item = &str> {
        self.helpers.values().map(|(_, body)| body.as_str())
    }
}

/// Formats a number the way JavaScript's `Number#toString` does, which is
/// also valid literal syntax in every supported language for finite values.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }
    format!("{value}")
}

/// Quotes `text` as a single-quoted literal, escaping backslashes, quotes,
/// control characters and any extra characters the language treats
/// specially inside strings (such as `$` in Dart).
pub fn quote_single(text: &str, extra: &[char]) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if extra.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// If `value` is a whole number that fits comfortably in an integer
/// literal, returns it as one.
pub fn as_whole(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        Some(value as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_format_like_javascript() {
        assert_eq!(format_number(4.0), "4");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(3.1), "3.1");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(-2e-7), "-2e-7");
        assert_eq!(format_number(0.000001), "0.000001");
        assert_eq!(format_number(0.0000015), "0.0000015");
        assert_eq!(format_number(123456789.0), "123456789");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn quoting_escapes_specials() {
        assert_eq!(quote_single("it's", &[]), r"'it\'s'");
        assert_eq!(quote_single("a\\b\nc", &[]), r"'a\\b\nc'");
        assert_eq!(quote_single("$x", &['$']), r"'\$x'");
    }

    #[test]
    fn parenthesize_respects_order() {
        assert_eq!(parenthesize("a + b".into(), 62, 51), "(a + b)");
        assert_eq!(parenthesize("a * b".into(), 51, 62), "a * b");
        assert_eq!(parenthesize("x".into(), 0, 0), "x");
        assert_eq!(parenthesize("f(x)".into(), 20, ORDER_NONE), "f(x)");
    }

    #[test]
    fn helpers_are_registered_once() {
        let mut ctx = EmitContext::new(&Program::new(), &[]);
        let first = ctx.helper("repeat", |name| format!("def {name}(): pass"));
        let second = ctx.helper("repeat", |_| unreachable!());
        assert_eq!(first, second);
        assert_eq!(ctx.helper_definitions().count(), 1);
    }

    #[test]
    fn whole_numbers() {
        assert_eq!(as_whole(10.0), Some(10));
        assert_eq!(as_whole(-3.0), Some(-3));
        assert_eq!(as_whole(2.5), None);
        assert_eq!(as_whole(f64::INFINITY), None);
    }
}
