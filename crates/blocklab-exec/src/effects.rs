//! Effect records and the per-execution capability bundle.
//!
//! A script observes the outside world only through the capabilities bound
//! into its top-level scope. Each capability appends one record to the
//! execution's [`EffectLog`] and returns immediately; nothing blocks and
//! nothing reaches the host.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::script::error::Abort;
use crate::script::json;
use crate::script::{Interpreter, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Log,
    Warn,
    Error,
    Alert,
    Prompt,
    Result,
}

impl EffectKind {
    /// Prefix used when the record is rendered for the output pane.
    pub fn prefix(self) -> &'static str {
        match self {
            EffectKind::Log => "📝 ",
            EffectKind::Warn => "⚠️ ",
            EffectKind::Error => "❌ ",
            EffectKind::Alert => "🔔 Alert: ",
            EffectKind::Prompt => "❓ Prompt: ",
            EffectKind::Result => "↩️ Result: ",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub kind: EffectKind,
    pub text: String,
}

impl EffectRecord {
    pub fn new(kind: EffectKind, text: impl Into<String>) -> Self {
        EffectRecord {
            kind,
            text: text.into(),
        }
    }

    pub fn render(&self) -> String {
        format!("{}{}", self.kind.prefix(), self.text)
    }
}

/// Ordered records of one execution. Once sealed, further writes are
/// dropped: a capability that escaped its execution cannot add to a
/// finished report.
#[derive(Debug, Default)]
pub struct EffectLog {
    records: Vec<EffectRecord>,
    sealed: bool,
}

impl EffectLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: EffectKind, text: impl Into<String>) {
        if self.sealed {
            tracing::debug!(?kind, "dropping effect recorded after the execution ended");
            return;
        }
        self.records.push(EffectRecord::new(kind, text));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Ends the log and hands out its records.
    pub fn seal(&mut self) -> Vec<EffectRecord> {
        self.sealed = true;
        std::mem::take(&mut self.records)
    }
}

/// `console.log` formatting: objects (and `null`) as two-space JSON,
/// everything else through `String(x)`, joined by spaces.
pub fn log_text(interp: &Interpreter, args: &[Value]) -> Result<String, Abort> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(display_value(interp, arg)?);
    }
    Ok(parts.join(" "))
}

/// `console.warn` / `console.error` formatting: `String(x)` joined by spaces.
pub fn plain_text(interp: &Interpreter, args: &[Value]) -> Result<String, Abort> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(interp.string_of(arg)?.to_string());
    }
    Ok(parts.join(" "))
}

/// Renders one value the way the output pane shows it.
pub fn display_value(interp: &Interpreter, value: &Value) -> Result<String, Abort> {
    if value.type_of() == "object" {
        Ok(json::stringify(interp, value, "  ")?.unwrap_or_else(|| "undefined".into()))
    } else {
        Ok(interp.string_of(value)?.to_string())
    }
}

/// The capability bundle for one execution.
pub struct Capabilities {
    log: Rc<RefCell<EffectLog>>,
    prompt_default: Rc<str>,
}

impl Capabilities {
    pub fn new(prompt_default: &str) -> Self {
        Capabilities {
            log: Rc::new(RefCell::new(EffectLog::new())),
            prompt_default: Rc::from(prompt_default),
        }
    }

    pub fn log(&self) -> &Rc<RefCell<EffectLog>> {
        &self.log
    }

    /// Appends a record directly (used for the completion value).
    pub fn push(&self, kind: EffectKind, text: impl Into<String>) {
        self.log.borrow_mut().push(kind, text);
    }

    /// Seals the log and returns its records.
    pub fn seal(&self) -> Vec<EffectRecord> {
        self.log.borrow_mut().seal()
    }

    /// Global bindings that make up the bundle: `console`, `window`,
    /// `alert` and `prompt`.
    pub fn bindings(&self) -> Vec<(&'static str, Value)> {
        let console = Value::record([
            ("log".to_string(), self.logger("log", EffectKind::Log, true)),
            ("info".to_string(), self.logger("info", EffectKind::Log, true)),
            ("warn".to_string(), self.logger("warn", EffectKind::Warn, false)),
            ("error".to_string(), self.logger("error", EffectKind::Error, false)),
        ]);
        let alert = self.alert();
        let prompt = self.prompt();
        let window = Value::record([
            ("alert".to_string(), alert.clone()),
            ("prompt".to_string(), prompt.clone()),
            ("console".to_string(), console.clone()),
        ]);
        vec![
            ("console", console),
            ("window", window),
            ("alert", alert),
            ("prompt", prompt),
        ]
    }

    fn logger(&self, name: &str, kind: EffectKind, structured: bool) -> Value {
        let log = Rc::clone(&self.log);
        Value::native(name, move |interp, _, args| {
            let text = if structured {
                log_text(interp, args)?
            } else {
                plain_text(interp, args)?
            };
            log.borrow_mut().push(kind, text);
            Ok(Value::Undefined)
        })
    }

    fn alert(&self) -> Value {
        let log = Rc::clone(&self.log);
        Value::native("alert", move |interp, _, args| {
            let message = interp.string_of(&args.first().cloned().unwrap_or_default())?;
            log.borrow_mut().push(EffectKind::Alert, message.to_string());
            Ok(Value::Undefined)
        })
    }

    fn prompt(&self) -> Value {
        let log = Rc::clone(&self.log);
        let fallback = Rc::clone(&self.prompt_default);
        Value::native("prompt", move |interp, _, args| {
            let message = interp.string_of(&args.first().cloned().unwrap_or_default())?;
            log.borrow_mut().push(EffectKind::Prompt, message.to_string());
            Ok(match args.get(1) {
                Some(default) if default.to_boolean() => default.clone(),
                _ => Value::String(Rc::clone(&fallback)),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_logs_ignore_late_writes() {
        let mut log = EffectLog::new();
        log.push(EffectKind::Log, "first");
        let records = log.seal();
        log.push(EffectKind::Log, "late");

        assert_eq!(records, vec![EffectRecord::new(EffectKind::Log, "first")]);
        assert!(log.is_empty());
        assert!(log.is_sealed());
    }

    #[test]
    fn records_render_with_their_prefix() {
        assert_eq!(EffectRecord::new(EffectKind::Alert, "hey").render(), "🔔 Alert: hey");
        assert_eq!(EffectRecord::new(EffectKind::Result, "4").render(), "↩️ Result: 4");
    }

    #[test]
    fn effect_kinds_serialize_in_snake_case() {
        let json = serde_json::to_string(&EffectRecord::new(EffectKind::Warn, "w")).unwrap();
        assert_eq!(json, r#"{"kind":"warn","text":"w"}"#);
    }
}
