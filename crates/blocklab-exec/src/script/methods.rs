//! Built-in methods of primitive strings, numbers and arrays.
//!
//! Method calls first look for an own function property on the receiver;
//! only when none exists does [`call`] get a chance. Strings are indexed
//! by Unicode scalar value.

use std::cmp::Ordering;
use std::rc::Rc;

use super::error::Abort;
use super::interp::Interpreter;
use super::value::{
    is_js_whitespace, number_to_string, same_value_zero, strict_equals, ObjectKind, ObjectRef,
    Value,
};

/// Dispatches `this.name(args)` to a built-in method, or `None` when the
/// receiver has no such method.
pub fn call(interp: &mut Interpreter, this: &Value, name: &str, args: &[Value]) -> Option<Result<Value, Abort>> {
    match this {
        Value::String(s) => string_method(interp, s, name, args).transpose(),
        Value::Number(n) => number_method(interp, *n, name, args),
        Value::Bool(_) if name == "toString" => Some(Ok(Value::String(this.to_js_string()))),
        Value::Object(obj) => {
            let is_array = matches!(obj.borrow().kind, ObjectKind::Array(_));
            if is_array {
                if let Some(result) = array_method(interp, obj, this, name, args) {
                    return Some(result);
                }
            }
            object_method(interp, this, obj, name, args)
        }
        _ => None,
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or_default()
}

fn arg_string(interp: &Interpreter, args: &[Value], i: usize) -> Result<Rc<str>, Abort> {
    interp.string_of(&arg(args, i))
}

/// `ToIntegerOrInfinity`.
fn to_integer(value: &Value) -> f64 {
    let n = value.to_number();
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// Resolves a possibly negative relative index against `len`.
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = to_integer(value);
    let len_f = len as f64;
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}

/// Clamps a non-relative position (as `substring` and `indexOf` use them).
fn clamp_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    to_integer(value).clamp(0.0, len as f64) as usize
}

fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn rfind_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    let start = from.min(haystack.len() - needle.len());
    (0..=start).rev().find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn index_result(found: Option<usize>) -> Value {
    Value::Number(found.map_or(-1.0, |i| i as f64))
}

/// `ToUint32`, as `split` applies it to its limit.
fn to_uint32(value: &Value) -> u32 {
    let n = value.to_number();
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn string_method(
    interp: &mut Interpreter,
    s: &Rc<str>,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>, Abort> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let text = |cs: &[char]| Value::from(cs.iter().collect::<String>());
    let value = match name {
        "toString" | "valueOf" => Value::String(Rc::clone(s)),
        "charAt" => {
            let i = to_integer(&arg(args, 0));
            if i >= 0.0 && (i as usize) < len {
                Value::from(chars[i as usize].to_string())
            } else {
                Value::from("")
            }
        }
        "charCodeAt" | "codePointAt" => {
            let i = to_integer(&arg(args, 0));
            if i >= 0.0 && (i as usize) < len {
                Value::Number(f64::from(chars[i as usize] as u32))
            } else if name == "charCodeAt" {
                Value::Number(f64::NAN)
            } else {
                Value::Undefined
            }
        }
        "at" => {
            let i = to_integer(&arg(args, 0));
            let i = if i < 0.0 { len as f64 + i } else { i };
            if i >= 0.0 && (i as usize) < len {
                Value::from(chars[i as usize].to_string())
            } else {
                Value::Undefined
            }
        }
        "indexOf" => {
            let needle: Vec<char> = arg_string(interp, args, 0)?.chars().collect();
            index_result(find_chars(&chars, &needle, clamp_index(&arg(args, 1), len, 0)))
        }
        "lastIndexOf" => {
            let needle: Vec<char> = arg_string(interp, args, 0)?.chars().collect();
            let from = match arg(args, 1).to_number() {
                n if n.is_nan() => len,
                n => n.clamp(0.0, len as f64) as usize,
            };
            index_result(rfind_chars(&chars, &needle, from))
        }
        "includes" => {
            let needle: Vec<char> = arg_string(interp, args, 0)?.chars().collect();
            Value::Bool(find_chars(&chars, &needle, clamp_index(&arg(args, 1), len, 0)).is_some())
        }
        "startsWith" => {
            let needle: Vec<char> = arg_string(interp, args, 0)?.chars().collect();
            let from = clamp_index(&arg(args, 1), len, 0);
            Value::Bool(chars[from..].starts_with(&needle))
        }
        "endsWith" => {
            let needle: Vec<char> = arg_string(interp, args, 0)?.chars().collect();
            let end = clamp_index(&arg(args, 1), len, len);
            Value::Bool(chars[..end].ends_with(&needle))
        }
        "slice" => {
            let start = relative_index(&arg(args, 0), len, 0);
            let end = relative_index(&arg(args, 1), len, len);
            text(if start < end { &chars[start..end] } else { &[] })
        }
        "substring" => {
            let a = clamp_index(&arg(args, 0), len, 0);
            let b = clamp_index(&arg(args, 1), len, len);
            text(&chars[a.min(b)..a.max(b)])
        }
        "substr" => {
            let start = relative_index(&arg(args, 0), len, 0);
            let count = match arg(args, 1) {
                Value::Undefined => len - start,
                v => to_integer(&v).clamp(0.0, (len - start) as f64) as usize,
            };
            text(&chars[start..start + count])
        }
        "toUpperCase" | "toLocaleUpperCase" => Value::from(s.to_uppercase()),
        "toLowerCase" | "toLocaleLowerCase" => Value::from(s.to_lowercase()),
        "trim" => Value::from(s.trim_matches(is_js_whitespace)),
        "trimStart" => Value::from(s.trim_start_matches(is_js_whitespace)),
        "trimEnd" => Value::from(s.trim_end_matches(is_js_whitespace)),
        "split" => {
            let limit = match arg(args, 1) {
                Value::Undefined => usize::MAX,
                v => to_uint32(&v) as usize,
            };
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::String(Rc::clone(s))],
                separator => {
                    let separator = interp.string_of(&separator)?;
                    if separator.is_empty() {
                        chars.iter().map(|c| Value::from(c.to_string())).collect()
                    } else {
                        s.split(&*separator).map(Value::from).collect()
                    }
                }
            };
            Value::array(parts.into_iter().take(limit).collect())
        }
        "replace" | "replaceAll" => {
            let pattern = arg_string(interp, args, 0)?;
            let replacement = arg(args, 1);
            return replace(interp, s, &pattern, &replacement, name == "replaceAll").map(Some);
        }
        "repeat" => {
            let count = arg(args, 0).to_number();
            if count < 0.0 || count.is_infinite() {
                return Err(interp.range_error(format!(
                    "Invalid count value: {}",
                    number_to_string(count)
                )));
            }
            let count = if count.is_nan() { 0 } else { count as usize };
            interp.check_string_length(count.saturating_mul(s.len()))?;
            Value::from(s.repeat(count))
        }
        "padStart" | "padEnd" => {
            let target = to_integer(&arg(args, 0)).max(0.0) as usize;
            let filler: Rc<str> = match arg(args, 1) {
                Value::Undefined => Rc::from(" "),
                v => interp.string_of(&v)?,
            };
            let filler: Vec<char> = filler.chars().collect();
            if target <= len || filler.is_empty() {
                Value::String(Rc::clone(s))
            } else {
                let missing = target - len;
                let cycle_bytes: usize = filler.iter().map(|c| c.len_utf8()).sum();
                let tail_bytes: usize = filler[..missing % filler.len()].iter().map(|c| c.len_utf8()).sum();
                let pad_bytes = (missing / filler.len()).saturating_mul(cycle_bytes).saturating_add(tail_bytes);
                interp.check_string_length(s.len().saturating_add(pad_bytes))?;
                let pad: String = filler.iter().cycle().take(target - len).collect();
                if name == "padStart" {
                    Value::from(format!("{pad}{s}"))
                } else {
                    Value::from(format!("{s}{pad}"))
                }
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                let piece = interp.string_of(value)?;
                interp.check_string_length(out.len() + piece.len())?;
                out.push_str(&piece);
            }
            Value::from(out)
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn replace(
    interp: &mut Interpreter,
    s: &str,
    pattern: &str,
    replacement: &Value,
    all: bool,
) -> Result<Value, Abort> {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    let mut offset = 0;
    loop {
        let Some(found) = rest.find(pattern) else { break };
        out.push_str(&rest[..found]);
        let position = s[..offset + found].chars().count();
        let piece = match replacement.as_callable() {
            Some(_) => {
                let result = interp.call(
                    replacement,
                    Value::Undefined,
                    &[Value::from(pattern), Value::Number(position as f64), Value::from(s)],
                )?;
                interp.string_of(&result)?.to_string()
            }
            None => interp.string_of(replacement)?.replace("$&", pattern),
        };
        interp.check_string_length(out.len() + piece.len())?;
        out.push_str(&piece);
        let advance = found + pattern.len();
        if pattern.is_empty() {
            // An empty pattern matches between every character.
            match rest[found..].chars().next() {
                Some(c) => {
                    out.push(c);
                    offset += c.len_utf8();
                    rest = &rest[c.len_utf8()..];
                }
                None => {
                    rest = "";
                    break;
                }
            }
        } else {
            offset += advance;
            rest = &rest[advance..];
        }
        if !all {
            break;
        }
    }
    interp.check_string_length(out.len() + rest.len())?;
    out.push_str(rest);
    Ok(Value::from(out))
}

fn number_method(interp: &mut Interpreter, n: f64, name: &str, args: &[Value]) -> Option<Result<Value, Abort>> {
    let value = match name {
        "valueOf" => Value::Number(n),
        "toString" => match arg(args, 0) {
            Value::Undefined => Value::from(number_to_string(n)),
            radix => {
                let radix = to_integer(&radix);
                if !(2.0..=36.0).contains(&radix) {
                    return Some(Err(interp.range_error("toString() radix must be between 2 and 36")));
                }
                Value::from(to_radix(n, radix as u32))
            }
        },
        "toFixed" => {
            let digits = to_integer(&arg(args, 0));
            if !(0.0..=100.0).contains(&digits) {
                return Some(Err(interp.range_error("toFixed() digits argument must be between 0 and 100")));
            }
            Value::from(to_fixed(n, digits as usize))
        }
        _ => return None,
    };
    Some(Ok(value))
}

fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() || n.abs() >= 1e21 {
        return number_to_string(n);
    }
    let factor = 10f64.powi(digits as i32);
    let scaled = n * factor;
    // Exact ties round away from zero rather than to even.
    let n = if scaled.fract().abs() == 0.5 && scaled / factor == n {
        (scaled.trunc() + scaled.signum()) / factor
    } else {
        n
    };
    format!("{n:.digits$}")
}

fn to_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() || n.fract() != 0.0 || n.abs() > 2f64.powi(53) {
        return number_to_string(n);
    }
    let mut magnitude = n.abs() as u64;
    if magnitude == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while magnitude > 0 {
        digits.push(char::from_digit((magnitude % u64::from(radix)) as u32, radix).unwrap_or('0'));
        magnitude /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn object_method(
    interp: &Interpreter,
    this: &Value,
    obj: &ObjectRef,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, Abort>> {
    let value = match name {
        "toString" => return Some(interp.string_of(this).map(Value::String)),
        "valueOf" => this.clone(),
        "hasOwnProperty" => {
            let key = arg(args, 0).to_property_key();
            let object = obj.borrow();
            let own = match &object.kind {
                ObjectKind::Array(items) => {
                    super::value::array_index(&key).is_some_and(|i| i < items.len())
                        || key == "length"
                }
                _ => false,
            };
            Value::Bool(own || object.properties.contains_key(&key))
        }
        _ => return None,
    };
    Some(Ok(value))
}

// ----------------------------------------------------------------------
// Arrays
// ----------------------------------------------------------------------

fn items_of(obj: &ObjectRef) -> Vec<Value> {
    match &obj.borrow().kind {
        ObjectKind::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

fn len_of(obj: &ObjectRef) -> usize {
    match &obj.borrow().kind {
        ObjectKind::Array(items) => items.len(),
        _ => 0,
    }
}

fn item_at(obj: &ObjectRef, i: usize) -> Option<Value> {
    match &obj.borrow().kind {
        ObjectKind::Array(items) => items.get(i).cloned(),
        _ => None,
    }
}

/// Runs `f` on the items of a mutable array; frozen arrays throw.
fn mutate<R>(interp: &Interpreter, obj: &ObjectRef, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, Abort> {
    let mut object = obj.borrow_mut();
    if object.frozen {
        return Err(interp.type_error("Cannot modify a frozen array"));
    }
    match &mut object.kind {
        ObjectKind::Array(items) => Ok(f(items)),
        _ => Err(interp.type_error("receiver is not an array")),
    }
}

fn callback(interp: &Interpreter, args: &[Value], name: &str) -> Result<Value, Abort> {
    let f = arg(args, 0);
    if f.as_callable().is_none() {
        return Err(interp.type_error(format!(
            "{} is not a function (in Array.prototype.{name})",
            f.to_js_string()
        )));
    }
    Ok(f)
}

fn array_method(
    interp: &mut Interpreter,
    obj: &ObjectRef,
    this: &Value,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, Abort>> {
    let result = match name {
        "push" => mutate(interp, obj, |items| {
            items.extend(args.iter().cloned());
            Value::Number(items.len() as f64)
        }),
        "pop" => mutate(interp, obj, |items| items.pop().unwrap_or_default()),
        "shift" => mutate(interp, obj, |items| {
            if items.is_empty() {
                Value::Undefined
            } else {
                items.remove(0)
            }
        }),
        "unshift" => mutate(interp, obj, |items| {
            items.splice(0..0, args.iter().cloned());
            Value::Number(items.len() as f64)
        }),
        "splice" => {
            let len = len_of(obj);
            let start = relative_index(&arg(args, 0), len, 0);
            let count = match args.len() {
                0 => 0,
                1 => len - start,
                _ => to_integer(&args[1]).clamp(0.0, (len - start) as f64) as usize,
            };
            let inserted: Vec<Value> = args.iter().skip(2).cloned().collect();
            mutate(interp, obj, |items| {
                Value::array(items.splice(start..start + count, inserted).collect())
            })
        }
        "reverse" => mutate(interp, obj, |items| items.reverse()).map(|()| this.clone()),
        "fill" => {
            let len = len_of(obj);
            let value = arg(args, 0);
            let start = relative_index(&arg(args, 1), len, 0);
            let end = relative_index(&arg(args, 2), len, len);
            mutate(interp, obj, |items| {
                for item in items.iter_mut().take(end).skip(start) {
                    *item = value.clone();
                }
            })
            .map(|()| this.clone())
        }
        "sort" => sort(interp, obj, args).map(|()| this.clone()),
        "slice" => {
            let items = items_of(obj);
            let start = relative_index(&arg(args, 0), items.len(), 0);
            let end = relative_index(&arg(args, 1), items.len(), items.len());
            Ok(Value::array(if start < end { items[start..end].to_vec() } else { Vec::new() }))
        }
        "concat" => {
            let mut items = items_of(obj);
            for value in args {
                match value {
                    Value::Object(other) if value.is_array() => items.extend(items_of(other)),
                    other => items.push(other.clone()),
                }
            }
            Ok(Value::array(items))
        }
        "join" => join(interp, obj, args),
        "indexOf" | "lastIndexOf" | "includes" => {
            let items = items_of(obj);
            let needle = arg(args, 0);
            Ok(match name {
                "indexOf" => {
                    let from = relative_index(&arg(args, 1), items.len(), 0);
                    index_result((from..items.len()).find(|&i| strict_equals(&items[i], &needle)))
                }
                "lastIndexOf" => index_result(items.iter().rposition(|v| strict_equals(v, &needle))),
                _ => {
                    let from = relative_index(&arg(args, 1), items.len(), 0);
                    Value::Bool(items[from..].iter().any(|v| same_value_zero(v, &needle)))
                }
            })
        }
        "at" => {
            let len = len_of(obj) as f64;
            let i = to_integer(&arg(args, 0));
            let i = if i < 0.0 { len + i } else { i };
            Ok(if i >= 0.0 { item_at(obj, i as usize).unwrap_or_default() } else { Value::Undefined })
        }
        "forEach" | "map" | "filter" | "some" | "every" | "find" | "findIndex" => {
            iterate(interp, obj, this, name, args)
        }
        "reduce" => reduce(interp, obj, this, args),
        _ => return None,
    };
    Some(result)
}

fn join(interp: &Interpreter, obj: &ObjectRef, args: &[Value]) -> Result<Value, Abort> {
    let separator = match arg(args, 0) {
        Value::Undefined => Rc::from(","),
        v => interp.string_of(&v)?,
    };
    let mut out = String::new();
    for (i, item) in items_of(obj).iter().enumerate() {
        let piece = if item.is_nullish() { Rc::from("") } else { interp.string_of(item)? };
        let sep = if i == 0 { "" } else { &*separator };
        interp.check_string_length(out.len() + sep.len() + piece.len())?;
        out.push_str(sep);
        out.push_str(&piece);
    }
    Ok(Value::from(out))
}

fn iterate(interp: &mut Interpreter, obj: &ObjectRef, this: &Value, name: &str, args: &[Value]) -> Result<Value, Abort> {
    let f = callback(interp, args, name)?;
    let receiver = arg(args, 1);
    let mut mapped = Vec::new();
    let mut i = 0;
    while let Some(item) = item_at(obj, i) {
        let outcome = interp.call(
            &f,
            receiver.clone(),
            &[item.clone(), Value::Number(i as f64), this.clone()],
        )?;
        match name {
            "map" => mapped.push(outcome),
            "filter" if outcome.to_boolean() => mapped.push(item),
            "some" if outcome.to_boolean() => return Ok(Value::Bool(true)),
            "every" if !outcome.to_boolean() => return Ok(Value::Bool(false)),
            "find" if outcome.to_boolean() => return Ok(item),
            "findIndex" if outcome.to_boolean() => return Ok(Value::Number(i as f64)),
            _ => {}
        }
        i += 1;
    }
    Ok(match name {
        "map" | "filter" => Value::array(mapped),
        "some" => Value::Bool(false),
        "every" => Value::Bool(true),
        "findIndex" => Value::Number(-1.0),
        _ => Value::Undefined,
    })
}

fn reduce(interp: &mut Interpreter, obj: &ObjectRef, this: &Value, args: &[Value]) -> Result<Value, Abort> {
    let f = callback(interp, args, "reduce")?;
    let mut i = 0;
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match item_at(obj, 0) {
            Some(first) => {
                i = 1;
                first
            }
            None => return Err(interp.type_error("Reduce of empty array with no initial value")),
        },
    };
    while let Some(item) = item_at(obj, i) {
        accumulator = interp.call(
            &f,
            Value::Undefined,
            &[accumulator, item, Value::Number(i as f64), this.clone()],
        )?;
        i += 1;
    }
    Ok(accumulator)
}

fn sort(interp: &mut Interpreter, obj: &ObjectRef, args: &[Value]) -> Result<(), Abort> {
    let comparator = match arg(args, 0) {
        Value::Undefined => None,
        f if f.as_callable().is_some() => Some(f),
        other => {
            return Err(interp.type_error(format!(
                "The comparison function must be either a function or undefined: {}",
                other.to_js_string()
            )))
        }
    };
    let items = items_of(obj);
    let (mut defined, undefined): (Vec<Value>, Vec<Value>) =
        items.into_iter().partition(|v| !matches!(v, Value::Undefined));
    let mut compare = |interp: &mut Interpreter, a: &Value, b: &Value| -> Result<Ordering, Abort> {
        match &comparator {
            Some(f) => {
                let n = interp.call(f, Value::Undefined, &[a.clone(), b.clone()])?.to_number();
                Ok(if n < 0.0 {
                    Ordering::Less
                } else if n > 0.0 {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                })
            }
            None => Ok(interp.string_of(a)?.cmp(&interp.string_of(b)?)),
        }
    };
    defined = merge_sort(interp, defined, &mut compare)?;
    defined.extend(undefined);
    mutate(interp, obj, |items| *items = defined)
}

/// Stable sort with a comparator that may throw.
fn merge_sort<F>(interp: &mut Interpreter, mut items: Vec<Value>, compare: &mut F) -> Result<Vec<Value>, Abort>
where
    F: FnMut(&mut Interpreter, &Value, &Value) -> Result<Ordering, Abort>,
{
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interp, items, compare)?;
    let right = merge_sort(interp, right, compare)?;
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        if compare(interp, a, b)? == Ordering::Greater {
            merged.extend(right.next());
        } else {
            merged.extend(left.next());
        }
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}
