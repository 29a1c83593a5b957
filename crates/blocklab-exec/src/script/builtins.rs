//! Standard globals: `Math`, `JSON`, conversions and the error family.
//!
//! Everything installed here is frozen. The realm that owns these values
//! outlives every execution, so no script may change them.

use std::rc::Rc;

use rand::Rng;

use super::error::Abort;
use super::interp::{enumerable_keys, Interpreter};
use super::json;
use super::scope::Scope;
use super::value::{is_js_whitespace, string_to_number, ObjectKind, Value};

/// Error constructors available to scripts.
pub const ERROR_TYPES: &[&str] = &["Error", "TypeError", "RangeError", "ReferenceError", "SyntaxError"];

/// Declares every standard global in `realm`.
pub fn install(realm: &Scope) {
    let globals = [
        ("undefined", Value::Undefined),
        ("NaN", Value::Number(f64::NAN)),
        ("Infinity", Value::Number(f64::INFINITY)),
        ("Math", math()),
        ("JSON", json_object()),
        ("Number", number_constructor()),
        ("String", Value::native("String", |interp, _, args| match args.first() {
            Some(value) => interp.string_of(value).map(Value::String),
            None => Ok(Value::String(Rc::from(""))),
        })),
        ("Boolean", Value::native("Boolean", |_, _, args| {
            Ok(Value::Bool(args.first().is_some_and(Value::to_boolean)))
        })),
        ("Array", array_constructor()),
        ("Object", object_constructor()),
        ("parseInt", Value::native("parseInt", |interp, _, args| {
            let text = interp.string_of(&args.first().cloned().unwrap_or_default())?;
            let radix = args.get(1).map_or(0.0, Value::to_number);
            Ok(Value::Number(parse_int(&text, radix)))
        })),
        ("parseFloat", Value::native("parseFloat", |interp, _, args| {
            let text = interp.string_of(&args.first().cloned().unwrap_or_default())?;
            Ok(Value::Number(parse_float(&text)))
        })),
        ("isNaN", Value::native("isNaN", |_, _, args| {
            Ok(Value::Bool(args.first().map_or(f64::NAN, Value::to_number).is_nan()))
        })),
        ("isFinite", Value::native("isFinite", |_, _, args| {
            Ok(Value::Bool(args.first().map_or(f64::NAN, Value::to_number).is_finite()))
        })),
    ];
    for (name, value) in globals {
        freeze(&value);
        realm.declare(name, value, false);
    }
    for &name in ERROR_TYPES {
        let value = error_constructor(name);
        freeze(&value);
        realm.declare(name, value, false);
    }
}

/// Marks `value` and everything reachable from it read-only.
pub fn freeze(value: &Value) {
    let Value::Object(obj) = value else { return };
    let children: Vec<Value> = {
        let mut object = obj.borrow_mut();
        if object.frozen {
            return;
        }
        object.frozen = true;
        let mut children: Vec<Value> = object.properties.values().cloned().collect();
        if let ObjectKind::Array(items) = &object.kind {
            children.extend(items.iter().cloned());
        }
        children
    };
    children.iter().for_each(freeze);
}

fn with_properties(value: Value, properties: Vec<(&str, Value)>) -> Value {
    if let Value::Object(obj) = &value {
        let mut object = obj.borrow_mut();
        for (key, property) in properties {
            object.properties.insert(key.to_string(), property);
        }
    }
    value
}

fn number_arg(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(f64::NAN, Value::to_number)
}

fn unary(name: &'static str, f: fn(f64) -> f64) -> (&'static str, Value) {
    (name, Value::native(name, move |_, _, args| Ok(Value::Number(f(number_arg(args, 0))))))
}

fn math() -> Value {
    let mut members = vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("LN2", Value::Number(std::f64::consts::LN_2)),
        ("LN10", Value::Number(std::f64::consts::LN_10)),
        ("LOG2E", Value::Number(std::f64::consts::LOG2_E)),
        ("LOG10E", Value::Number(std::f64::consts::LOG10_E)),
        ("SQRT2", Value::Number(std::f64::consts::SQRT_2)),
        ("SQRT1_2", Value::Number(std::f64::consts::FRAC_1_SQRT_2)),
        unary("abs", f64::abs),
        unary("floor", f64::floor),
        unary("ceil", f64::ceil),
        unary("round", round),
        unary("trunc", f64::trunc),
        unary("sign", sign),
        unary("sqrt", f64::sqrt),
        unary("cbrt", f64::cbrt),
        unary("exp", f64::exp),
        unary("log", f64::ln),
        unary("log10", f64::log10),
        unary("log2", f64::log2),
        unary("sin", f64::sin),
        unary("cos", f64::cos),
        unary("tan", f64::tan),
        unary("asin", f64::asin),
        unary("acos", f64::acos),
        unary("atan", f64::atan),
    ];
    members.extend([
        ("atan2", Value::native("atan2", |_, _, args| {
            Ok(Value::Number(number_arg(args, 0).atan2(number_arg(args, 1))))
        })),
        ("pow", Value::native("pow", |interp, _, args| {
            interp.binary(
                super::ast::BinaryOp::Pow,
                &Value::Number(number_arg(args, 0)),
                &Value::Number(number_arg(args, 1)),
            )
        })),
        ("max", Value::native("max", |_, _, args| Ok(Value::Number(extremum(args, f64::NEG_INFINITY, f64::max))))),
        ("min", Value::native("min", |_, _, args| Ok(Value::Number(extremum(args, f64::INFINITY, f64::min))))),
        ("hypot", Value::native("hypot", |_, _, args| {
            Ok(Value::Number(args.iter().map(|v| v.to_number().powi(2)).sum::<f64>().sqrt()))
        })),
        ("random", Value::native("random", |interp, _, _| Ok(Value::Number(interp.rng().gen::<f64>())))),
    ]);
    Value::record(members.into_iter().map(|(k, v)| (k.to_string(), v)))
}

/// `Math.round`: halves round toward positive infinity.
fn round(n: f64) -> f64 {
    if !n.is_finite() || n.fract() == 0.0 {
        return n;
    }
    (n + 0.5).floor()
}

fn sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 {
        n
    } else {
        n.signum()
    }
}

fn extremum(args: &[Value], start: f64, pick: fn(f64, f64) -> f64) -> f64 {
    let mut result = start;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return f64::NAN;
        }
        result = pick(result, n);
    }
    result
}

fn json_object() -> Value {
    Value::record([
        (
            "stringify".to_string(),
            Value::native("stringify", |interp, _, args| {
                let value = args.first().cloned().unwrap_or_default();
                let indent = json::indent_from(args.get(2));
                Ok(json::stringify(interp, &value, &indent)?.map_or(Value::Undefined, Value::from))
            }),
        ),
        (
            "parse".to_string(),
            Value::native("parse", |interp, _, args| {
                let text = interp.string_of(&args.first().cloned().unwrap_or_default())?;
                json::parse(interp, &text)
            }),
        ),
    ])
}

fn number_constructor() -> Value {
    let constructor = Value::native("Number", |_, _, args| {
        Ok(Value::Number(args.first().map_or(0.0, Value::to_number)))
    });
    with_properties(
        constructor,
        vec![
            ("MAX_SAFE_INTEGER", Value::Number(9007199254740991.0)),
            ("MIN_SAFE_INTEGER", Value::Number(-9007199254740991.0)),
            ("EPSILON", Value::Number(f64::EPSILON)),
            ("MAX_VALUE", Value::Number(f64::MAX)),
            ("MIN_VALUE", Value::Number(5e-324)),
            ("POSITIVE_INFINITY", Value::Number(f64::INFINITY)),
            ("NEGATIVE_INFINITY", Value::Number(f64::NEG_INFINITY)),
            ("NaN", Value::Number(f64::NAN)),
            ("isInteger", Value::native("isInteger", |_, _, args| {
                Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_finite() && n.fract() == 0.0)))
            })),
            ("isFinite", Value::native("isFinite", |_, _, args| {
                Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_finite())))
            })),
            ("isNaN", Value::native("isNaN", |_, _, args| {
                Ok(Value::Bool(matches!(args.first(), Some(Value::Number(n)) if n.is_nan())))
            })),
            ("parseFloat", Value::native("parseFloat", |interp, _, args| {
                let text = interp.string_of(&args.first().cloned().unwrap_or_default())?;
                Ok(Value::Number(parse_float(&text)))
            })),
        ],
    )
}

fn array_constructor() -> Value {
    let constructor = Value::native("Array", |interp, _, args| match args {
        [Value::Number(n)] => {
            if *n < 0.0 || n.fract() != 0.0 || *n > super::interp::MAX_DENSE_LENGTH as f64 {
                return Err(interp.range_error("Invalid array length"));
            }
            Ok(Value::array(vec![Value::Undefined; *n as usize]))
        }
        _ => Ok(Value::array(args.to_vec())),
    });
    with_properties(
        constructor,
        vec![
            ("isArray", Value::native("isArray", |_, _, args| {
                Ok(Value::Bool(args.first().is_some_and(Value::is_array)))
            })),
            ("from", Value::native("from", |interp, _, args| {
                let source = args.first().cloned().unwrap_or_default();
                let items = match &source {
                    Value::String(s) => s.chars().map(|c| Value::from(c.to_string())).collect(),
                    Value::Object(obj) => match &obj.borrow().kind {
                        ObjectKind::Array(items) => items.clone(),
                        _ => Vec::new(),
                    },
                    _ => Vec::new(),
                };
                match args.get(1) {
                    Some(f) if f.as_callable().is_some() => {
                        let mut mapped = Vec::with_capacity(items.len());
                        for (i, item) in items.into_iter().enumerate() {
                            mapped.push(interp.call(f, Value::Undefined, &[item, Value::Number(i as f64)])?);
                        }
                        Ok(Value::array(mapped))
                    }
                    _ => Ok(Value::array(items)),
                }
            })),
        ],
    )
}

fn object_constructor() -> Value {
    let constructor = Value::native("Object", |_, _, args| match args.first() {
        Some(value @ Value::Object(_)) => Ok(value.clone()),
        _ => Ok(Value::object(ObjectKind::Ordinary)),
    });
    with_properties(
        constructor,
        vec![
            ("keys", Value::native("keys", |interp, _, args| {
                let target = args.first().cloned().unwrap_or_default();
                require_object(interp, &target)?;
                Ok(Value::array(enumerable_keys(&target).into_iter().map(Value::from).collect()))
            })),
            ("values", Value::native("values", |interp, _, args| {
                let target = args.first().cloned().unwrap_or_default();
                require_object(interp, &target)?;
                let mut values = Vec::new();
                for key in enumerable_keys(&target) {
                    values.push(interp.get_property(&target, &key)?);
                }
                Ok(Value::array(values))
            })),
            ("entries", Value::native("entries", |interp, _, args| {
                let target = args.first().cloned().unwrap_or_default();
                require_object(interp, &target)?;
                let mut entries = Vec::new();
                for key in enumerable_keys(&target) {
                    let value = interp.get_property(&target, &key)?;
                    entries.push(Value::array(vec![Value::from(key), value]));
                }
                Ok(Value::array(entries))
            })),
            ("freeze", Value::native("freeze", |_, _, args| {
                let target = args.first().cloned().unwrap_or_default();
                if let Value::Object(obj) = &target {
                    obj.borrow_mut().frozen = true;
                }
                Ok(target)
            })),
            ("isFrozen", Value::native("isFrozen", |_, _, args| {
                Ok(Value::Bool(match args.first() {
                    Some(Value::Object(obj)) => obj.borrow().frozen,
                    _ => true,
                }))
            })),
        ],
    )
}

fn require_object(interp: &Interpreter, value: &Value) -> Result<(), Abort> {
    if value.is_nullish() {
        return Err(interp.type_error("Cannot convert undefined or null to object"));
    }
    Ok(())
}

fn error_constructor(name: &'static str) -> Value {
    Value::native(name, move |interp, _, args| {
        let message = match args.first() {
            None | Some(Value::Undefined) => String::new(),
            Some(value) => interp.string_of(value)?.to_string(),
        };
        Ok(interp.make_error(name, &message))
    })
}

/// `parseInt`: the longest valid digit prefix, or NaN when there is none.
pub fn parse_int(text: &str, radix: f64) -> f64 {
    let mut rest = text.trim_start_matches(is_js_whitespace);
    let negative = rest.starts_with('-');
    if let Some(stripped) = rest.strip_prefix(['-', '+']) {
        rest = stripped;
    }
    let mut radix = if radix.is_nan() { 0 } else { radix.trunc() as i64 };
    if radix != 0 && !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if (radix == 0 || radix == 16) && (rest.starts_with("0x") || rest.starts_with("0X")) {
        rest = &rest[2..];
        radix = 16;
    }
    if radix == 0 {
        radix = 10;
    }
    let digits: Vec<u32> = rest.chars().map_while(|c| c.to_digit(radix as u32)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let magnitude = digits
        .iter()
        .fold(0.0, |acc, d| acc * radix as f64 + f64::from(*d));
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// `parseFloat`: the longest prefix that reads as a decimal literal.
pub fn parse_float(text: &str) -> f64 {
    let rest = text.trim_start_matches(is_js_whitespace);
    let unsigned = rest.strip_prefix(['-', '+']).unwrap_or(rest);
    if unsigned.starts_with("Infinity") {
        return if rest.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let bytes = rest.as_bytes();
    let mut end = 0;
    let mut best = None;
    if matches!(bytes.first(), Some(b'-' | b'+')) {
        end = 1;
    }
    let mut seen_dot = false;
    let mut seen_digit = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => {
                seen_digit = true;
                best = Some(end + 1);
            }
            b'.' if !seen_dot => seen_dot = true,
            b'e' | b'E' if seen_digit => {
                let mut exp_end = end + 1;
                if matches!(bytes.get(exp_end), Some(b'-' | b'+')) {
                    exp_end += 1;
                }
                let digits_start = exp_end;
                while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
                    exp_end += 1;
                }
                if exp_end > digits_start {
                    best = Some(exp_end);
                }
                break;
            }
            _ => break,
        }
        end += 1;
    }
    match best {
        Some(end) => string_to_number(&rest[..end]),
        None => f64::NAN,
    }
}
