//! `JSON.stringify` and `JSON.parse`.

use std::cell::RefCell;
use std::rc::Rc;

use super::error::Abort;
use super::interp::{enumerable_keys, Interpreter, TOO_DEEP};
use super::value::{number_to_string, Object, ObjectKind, Value, MAX_VALUE_DEPTH};

/// Serializes `value`; `None` when the value has no JSON form
/// (`undefined` or a function at the top level).
pub fn stringify(interp: &Interpreter, value: &Value, indent: &str) -> Result<Option<String>, Abort> {
    let mut writer = Writer {
        interp,
        indent,
        stack: Vec::new(),
    };
    writer.serialize(value, 0)
}

/// The `space` argument of `JSON.stringify`, as an indent string.
pub fn indent_from(space: Option<&Value>) -> String {
    match space {
        Some(Value::Number(n)) if *n >= 1.0 => " ".repeat(n.min(10.0) as usize),
        Some(Value::String(s)) => s.chars().take(10).collect(),
        _ => String::new(),
    }
}

struct Writer<'a> {
    interp: &'a Interpreter,
    indent: &'a str,
    stack: Vec<*const RefCell<Object>>,
}

impl Writer<'_> {
    fn serialize(&mut self, value: &Value, depth: usize) -> Result<Option<String>, Abort> {
        Ok(Some(match value {
            Value::Undefined => return Ok(None),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if n.is_finite() => number_to_string(*n),
            Value::Number(_) => "null".into(),
            Value::String(s) => quote(s),
            Value::Object(obj) => {
                if matches!(obj.borrow().kind, ObjectKind::Function(_)) {
                    return Ok(None);
                }
                let ptr = Rc::as_ptr(obj);
                if self.stack.contains(&ptr) {
                    return Err(self.interp.type_error("Converting circular structure to JSON"));
                }
                if self.stack.len() >= MAX_VALUE_DEPTH {
                    return Err(self.interp.range_error(TOO_DEEP));
                }
                self.stack.push(ptr);
                let result = if value.is_array() {
                    self.array(obj, depth)
                } else {
                    self.object(value, obj, depth)
                };
                self.stack.pop();
                result?
            }
        }))
    }

    fn array(&mut self, obj: &RefCell<Object>, depth: usize) -> Result<String, Abort> {
        let items = match &obj.borrow().kind {
            ObjectKind::Array(items) => items.clone(),
            _ => Vec::new(),
        };
        let mut parts = Vec::with_capacity(items.len());
        for item in &items {
            parts.push(self.serialize(item, depth + 1)?.unwrap_or_else(|| "null".into()));
        }
        Ok(self.wrap('[', ']', &parts, depth))
    }

    fn object(&mut self, value: &Value, obj: &RefCell<Object>, depth: usize) -> Result<String, Abort> {
        let entries: Vec<(String, Value)> = {
            let object = obj.borrow();
            enumerable_keys(value)
                .into_iter()
                .filter_map(|k| object.properties.get(&k).cloned().map(|v| (k, v)))
                .collect()
        };
        let separator = if self.indent.is_empty() { ":" } else { ": " };
        let mut parts = Vec::with_capacity(entries.len());
        for (key, value) in &entries {
            if let Some(text) = self.serialize(value, depth + 1)? {
                parts.push(format!("{}{separator}{text}", quote(key)));
            }
        }
        Ok(self.wrap('{', '}', &parts, depth))
    }

    fn wrap(&self, open: char, close: char, parts: &[String], depth: usize) -> String {
        if parts.is_empty() {
            return format!("{open}{close}");
        }
        if self.indent.is_empty() {
            return format!("{open}{}{close}", parts.join(","));
        }
        let inner = self.indent.repeat(depth + 1);
        let outer = self.indent.repeat(depth);
        format!(
            "{open}\n{inner}{}\n{outer}{close}",
            parts.join(&format!(",\n{inner}"))
        )
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `JSON.parse`: malformed input throws a `SyntaxError`.
pub fn parse(interp: &Interpreter, text: &str) -> Result<Value, Abort> {
    serde_json::from_str::<serde_json::Value>(text)
        .map(from_json)
        .map_err(|err| interp.throw("SyntaxError", format!("Unexpected token in JSON: {err}")))
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::record(map.into_iter().map(|(k, v)| (k, from_json(v))))
        }
    }
}
