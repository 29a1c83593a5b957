//! Runtime values and the conversions between them.
//!
//! Primitives are held inline; objects (plain objects, arrays, functions,
//! errors) live behind `Rc<RefCell<..>>` so that aliasing behaves the way
//! scripts expect. A `frozen` object rejects every write.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ast::FunctionDef;
use super::error::Abort;
use super::interp::Interpreter;
use super::scope::Scope;

pub type ObjectRef = Rc<RefCell<Object>>;

/// How deep string conversion follows nested arrays before giving up.
pub const MAX_VALUE_DEPTH: usize = 256;

/// A value nested deeper than [`MAX_VALUE_DEPTH`] was converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooDeep;

/// Signature of a host-provided function: interpreter, `this`, arguments.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, Abort>>;

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(ObjectRef),
}

pub struct Object {
    pub kind: ObjectKind,
    pub properties: IndexMap<String, Value>,
    pub frozen: bool,
}

pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Callable),
    Error,
}

#[derive(Clone)]
pub enum Callable {
    Script {
        def: Rc<FunctionDef>,
        scope: Rc<Scope>,
    },
    Native {
        name: Rc<str>,
        func: NativeFn,
    },
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Script { def, .. } => def.name.as_deref().unwrap_or(""),
            Callable::Native { name, .. } => name,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Callable::Script { def, .. } => def.params.len(),
            Callable::Native { .. } => 0,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => f.write_str(&number_to_string(*n)),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Ordinary => f.write_str("[object Object]"),
                ObjectKind::Array(items) => write!(f, "[Array({})]", items.len()),
                ObjectKind::Function(c) => write!(f, "[Function: {}]", c.name()),
                ObjectKind::Error => f.write_str("[Error]"),
            },
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl Object {
    pub fn new(kind: ObjectKind) -> Self {
        Object {
            kind,
            properties: IndexMap::new(),
            frozen: false,
        }
    }

    /// Moves everything this object owns onto `pending`.
    fn release_into(&mut self, pending: &mut Vec<Owned>) {
        pending.extend(std::mem::take(&mut self.properties).into_values().map(Owned::Value));
        match std::mem::replace(&mut self.kind, ObjectKind::Ordinary) {
            ObjectKind::Array(items) => pending.extend(items.into_iter().map(Owned::Value)),
            ObjectKind::Function(Callable::Script { scope, .. }) => pending.push(Owned::Scope(scope)),
            _ => {}
        }
    }
}

enum Owned {
    Value(Value),
    Scope(Rc<Scope>),
}

/// Frees nested objects (and closure scopes) with a work list instead of
/// one native frame per level, so arbitrarily deep values can be dropped.
impl Drop for Object {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.release_into(&mut pending);
        while let Some(owned) = pending.pop() {
            match owned {
                Owned::Value(Value::Object(obj)) => {
                    if let Ok(cell) = Rc::try_unwrap(obj) {
                        cell.into_inner().release_into(&mut pending);
                    }
                }
                Owned::Scope(scope) => {
                    if let Ok(scope) = Rc::try_unwrap(scope) {
                        let (values, parent) = scope.into_parts();
                        pending.extend(values.into_iter().map(Owned::Value));
                        pending.extend(parent.map(Owned::Scope));
                    }
                }
                Owned::Value(_) => {}
            }
        }
    }
}

impl Value {
    pub fn object(kind: ObjectKind) -> Value {
        Value::Object(Rc::new(RefCell::new(Object::new(kind))))
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::object(ObjectKind::Array(items))
    }

    /// A plain object with the given properties, in order.
    pub fn record(properties: impl IntoIterator<Item = (String, Value)>) -> Value {
        let mut object = Object::new(ObjectKind::Ordinary);
        object.properties.extend(properties);
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn native(
        name: &str,
        func: impl Fn(&mut Interpreter, &Value, &[Value]) -> Result<Value, Abort> + 'static,
    ) -> Value {
        Value::object(ObjectKind::Function(Callable::Native {
            name: Rc::from(name),
            func: Rc::new(func),
        }))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_callable(&self) -> Option<Callable> {
        match self {
            Value::Object(obj) => match &obj.borrow().kind {
                ObjectKind::Function(c) => Some(c.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Object(obj) if matches!(obj.borrow().kind, ObjectKind::Array(_)))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(obj) => match obj.borrow().kind {
                ObjectKind::Function(_) => "function",
                _ => "object",
            },
        }
    }

    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => string_to_number(&self.to_js_string()),
        }
    }

    /// `String(value)`. Parts nested deeper than [`MAX_VALUE_DEPTH`]
    /// render as empty; [`Value::try_to_js_string`] reports them instead.
    pub fn to_js_string(&self) -> Rc<str> {
        match self.try_to_js_string() {
            Ok(text) => text,
            Err(TooDeep) => Rc::from(""),
        }
    }

    /// `String(value)`, failing on values nested too deeply to convert.
    pub fn try_to_js_string(&self) -> Result<Rc<str>, TooDeep> {
        match self {
            Value::String(s) => Ok(Rc::clone(s)),
            _ => self.display(&mut Vec::new(), 0).map(Rc::from),
        }
    }

    fn display(&self, seen: &mut Vec<*const RefCell<Object>>, depth: usize) -> Result<String, TooDeep> {
        Ok(match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Object(obj) => {
                let ptr = Rc::as_ptr(obj);
                if seen.contains(&ptr) {
                    return Ok(String::new());
                }
                if depth >= MAX_VALUE_DEPTH {
                    return Err(TooDeep);
                }
                let object = obj.borrow();
                match &object.kind {
                    ObjectKind::Ordinary => "[object Object]".into(),
                    ObjectKind::Array(items) => {
                        seen.push(ptr);
                        let parts: Result<Vec<String>, TooDeep> = items
                            .iter()
                            .map(|v| {
                                if v.is_nullish() {
                                    Ok(String::new())
                                } else {
                                    v.display(seen, depth + 1)
                                }
                            })
                            .collect();
                        seen.pop();
                        parts?.join(",")
                    }
                    ObjectKind::Function(Callable::Native { name, .. }) => {
                        format!("function {name}() {{ [native code] }}")
                    }
                    ObjectKind::Function(Callable::Script { def, .. }) => format!(
                        "function {}({}) {{ [code] }}",
                        def.name.as_deref().unwrap_or(""),
                        def.params.join(", ")
                    ),
                    ObjectKind::Error => {
                        let name = match object.properties.get("name") {
                            Some(v) => v.display(seen, depth + 1)?,
                            None => "Error".to_string(),
                        };
                        let message = match object.properties.get("message") {
                            Some(v) => v.display(seen, depth + 1)?,
                            None => String::new(),
                        };
                        match (name.is_empty(), message.is_empty()) {
                            (_, true) => name,
                            (true, false) => message,
                            (false, false) => format!("{name}: {message}"),
                        }
                    }
                }
            }
        })
    }

    /// Property key form of a value (`obj[key]`).
    pub fn to_property_key(&self) -> String {
        match self {
            Value::Number(n) => number_to_string(*n),
            other => other.to_js_string().to_string(),
        }
    }
}

/// `===`.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Object(x), Value::Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// `==`.
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            a.to_number() == b.to_number()
        }
        (Value::Bool(_), _) => loose_equals(&Value::Number(a.to_number()), b),
        (_, Value::Bool(_)) => loose_equals(a, &Value::Number(b.to_number())),
        (Value::Object(_), Value::Object(_)) => strict_equals(a, b),
        (Value::Object(_), _) => loose_equals(&Value::String(a.to_js_string()), b),
        (_, Value::Object(_)) => loose_equals(a, &Value::String(b.to_js_string())),
        _ => strict_equals(a, b),
    }
}

/// Equality used by `includes`: like `===` but NaN equals NaN.
pub fn same_value_zero(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => strict_equals(a, b),
    }
}

/// Whitespace as the script language defines it for `trim` and number parsing.
pub fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// `Number(string)`.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(is_js_whitespace);
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = t.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64);
        }
    }
    let valid = t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !valid {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// `Number.prototype.toString()` for radix 10: shortest round-trip digits,
/// exponent notation outside `1e-7 ..= 1e21`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n == 0.0 {
        return "0".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n < 0.0 {
        return format!("-{}", number_to_string(-n));
    }
    let sci = format!("{n:e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let k = digits.len() as i32;
    let point = exponent + 1;
    if k <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{int}.{frac}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let e = point - 1;
        let sign = if e >= 0 { '+' } else { '-' };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{first}e{sign}{}", e.abs())
        } else {
            format!("{first}.{rest}e{sign}{}", e.abs())
        }
    }
}

/// Parses a canonical array index (`"0"`, `"17"`, not `"01"` or `"1.0"`).
pub fn array_index(key: &str) -> Option<usize> {
    let index: u32 = key.parse().ok()?;
    (index.to_string() == key).then_some(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_format_like_scripts_expect() {
        assert_eq!(number_to_string(4.0), "4");
        assert_eq!(number_to_string(-2.5), "-2.5");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(123456789012345680000.0), "123456789012345680000");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(-0.0), "0");
    }

    #[test]
    fn strings_convert_to_numbers() {
        assert_eq!(string_to_number("  42 "), 42.0);
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
    }

    #[test]
    fn loose_equality_coerces() {
        assert!(loose_equals(&Value::from("1"), &Value::from(1.0)));
        assert!(loose_equals(&Value::Null, &Value::Undefined));
        assert!(loose_equals(&Value::from(true), &Value::from(1.0)));
        assert!(!loose_equals(&Value::Null, &Value::from(0.0)));
        assert!(!strict_equals(&Value::from("1"), &Value::from(1.0)));
        assert!(!strict_equals(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(same_value_zero(&Value::from(f64::NAN), &Value::from(f64::NAN)));
    }

    #[test]
    fn arrays_stringify_with_commas() {
        let nested = Value::array(vec![Value::from(2.0), Value::Null]);
        let list = Value::array(vec![Value::from(1.0), nested, Value::from("x")]);
        assert_eq!(&*list.to_js_string(), "1,2,,x");
        assert_eq!(list.type_of(), "object");
    }

    #[test]
    fn canonical_indices_only() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("length"), None);
    }
}
