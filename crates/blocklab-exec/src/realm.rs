//! The shared global environment that executions run on top of.
//!
//! A [`Realm`] owns the standard globals and a host-bound `console` that
//! writes to a [`HostEffects`] sink. Everything in it is frozen, and each
//! execution layers its own top-level scope over it, so a script can shadow
//! realm globals but never change them. [`Realm::fingerprint`] hashes the
//! realm's observable state so harnesses can check that it survived an
//! execution untouched.

use std::cell::Cell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::effects::{self, EffectKind};
use crate::script::builtins;
use crate::script::scope::{Scope, ScopeKind};
use crate::script::value::{Callable, ObjectKind, Value};

/// Where the realm's own `console` writes. Executions never reach it:
/// their capability bundle shadows `console`.
pub trait HostEffects {
    fn emit(&self, kind: EffectKind, text: &str);
}

/// Host sink that forwards console output to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHost;

impl HostEffects for TracingHost {
    fn emit(&self, kind: EffectKind, text: &str) {
        match kind {
            EffectKind::Error => tracing::error!(target: "blocklab::console", "{text}"),
            EffectKind::Warn => tracing::warn!(target: "blocklab::console", "{text}"),
            _ => tracing::info!(target: "blocklab::console", ?kind, "{text}"),
        }
    }
}

/// Hash of a realm's observable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealmFingerprint(blake3::Hash);

impl fmt::Display for RealmFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.0.to_hex();
        f.write_str(&hex.as_str()[..16])
    }
}

/// Returned by [`Realm::acquire`] while another execution holds the realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealmBusy;

pub struct Realm {
    scope: Rc<Scope>,
    busy: Cell<bool>,
}

impl fmt::Debug for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Realm")
            .field("globals", &self.scope.entries().len())
            .field("busy", &self.busy.get())
            .finish()
    }
}

impl Default for Realm {
    fn default() -> Self {
        Realm::new()
    }
}

impl Realm {
    /// A realm whose console writes to `tracing`.
    pub fn new() -> Self {
        Realm::with_host(Rc::new(TracingHost))
    }

    pub fn with_host(host: Rc<dyn HostEffects>) -> Self {
        let scope = Scope::new(ScopeKind::Realm, None);
        builtins::install(&scope);
        let console = host_console(host);
        builtins::freeze(&console);
        scope.declare("console", console, false);
        Realm {
            scope,
            busy: Cell::new(false),
        }
    }

    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    /// Takes the realm for one execution. The lease releases it on drop,
    /// including during unwinding.
    pub fn acquire(self: &Rc<Self>) -> Result<RealmLease, RealmBusy> {
        if self.busy.replace(true) {
            return Err(RealmBusy);
        }
        Ok(RealmLease {
            realm: Rc::clone(self),
        })
    }

    pub fn fingerprint(&self) -> RealmFingerprint {
        let mut hasher = blake3::Hasher::new();
        let mut seen = HashSet::new();
        for (name, value) in self.scope.entries() {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
            hash_value(&mut hasher, &value, &mut seen);
        }
        RealmFingerprint(hasher.finalize())
    }
}

/// Exclusive hold on a realm for the duration of one execution.
#[derive(Debug)]
pub struct RealmLease {
    realm: Rc<Realm>,
}

impl RealmLease {
    pub fn realm(&self) -> &Rc<Realm> {
        &self.realm
    }
}

impl Drop for RealmLease {
    fn drop(&mut self) {
        self.realm.busy.set(false);
    }
}

fn host_console(host: Rc<dyn HostEffects>) -> Value {
    let method = |name: &str, kind: EffectKind, structured: bool| {
        let host = Rc::clone(&host);
        Value::native(name, move |interp, _, args| {
            let text = if structured {
                effects::log_text(interp, args)?
            } else {
                effects::plain_text(interp, args)?
            };
            host.emit(kind, &text);
            Ok(Value::Undefined)
        })
    };
    Value::record([
        ("log".to_string(), method("log", EffectKind::Log, true)),
        ("info".to_string(), method("info", EffectKind::Log, true)),
        ("warn".to_string(), method("warn", EffectKind::Warn, false)),
        ("error".to_string(), method("error", EffectKind::Error, false)),
    ])
}

/// Feeds a canonical description of `value` into the hasher. Objects are
/// identified by address as well as content, so replacing a global object
/// with an equal copy still changes the fingerprint.
fn hash_value(hasher: &mut blake3::Hasher, value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Undefined => {
            hasher.update(b"u");
        }
        Value::Null => {
            hasher.update(b"n");
        }
        Value::Bool(b) => {
            hasher.update(if *b { b"t" } else { b"f" });
        }
        Value::Number(n) => {
            hasher.update(b"#");
            hasher.update(&n.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            hasher.update(b"s");
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Value::Object(obj) => {
            let address = Rc::as_ptr(obj) as usize;
            hasher.update(b"o");
            hasher.update(&address.to_le_bytes());
            if !seen.insert(address) {
                return;
            }
            let object = obj.borrow();
            hasher.update(&[u8::from(object.frozen)]);
            match &object.kind {
                ObjectKind::Ordinary => {
                    hasher.update(b"O");
                }
                ObjectKind::Error => {
                    hasher.update(b"E");
                }
                ObjectKind::Array(items) => {
                    hasher.update(b"A");
                    hasher.update(&(items.len() as u64).to_le_bytes());
                    for item in items {
                        hash_value(hasher, item, seen);
                    }
                }
                ObjectKind::Function(callable) => {
                    hasher.update(b"F");
                    hasher.update(callable.name().as_bytes());
                    if let Callable::Native { func, .. } = callable {
                        let address = Rc::as_ptr(func) as *const () as usize;
                        hasher.update(&address.to_le_bytes());
                    }
                }
            }
            hasher.update(&(object.properties.len() as u64).to_le_bytes());
            for (key, property) in &object.properties {
                hasher.update(key.as_bytes());
                hasher.update(&[0]);
                hash_value(hasher, property, seen);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<(EffectKind, String)>>);

    impl HostEffects for Recorder {
        fn emit(&self, kind: EffectKind, text: &str) {
            self.0.borrow_mut().push((kind, text.to_string()));
        }
    }

    #[test]
    fn fingerprint_is_stable() {
        let realm = Realm::new();
        assert_eq!(realm.fingerprint(), realm.fingerprint());
        assert_eq!(realm.fingerprint().to_string().len(), 16);
    }

    #[test]
    fn fingerprint_sees_mutation() {
        let realm = Realm::new();
        let before = realm.fingerprint();
        let Some(Value::Object(math)) = realm.scope().lookup("Math") else {
            panic!("Math missing");
        };
        math.borrow_mut()
            .properties
            .insert("PI".into(), Value::Number(3.0));
        assert_ne!(before, realm.fingerprint());
    }

    #[test]
    fn lease_is_exclusive_and_released_on_drop() {
        let realm = Rc::new(Realm::new());
        let lease = realm.acquire().unwrap();
        assert!(realm.is_busy());
        assert_eq!(realm.acquire().unwrap_err(), RealmBusy);
        drop(lease);
        assert!(!realm.is_busy());
        assert!(realm.acquire().is_ok());
    }

    #[test]
    fn host_console_reaches_the_sink() {
        let recorder = Rc::new(Recorder::default());
        let realm = Realm::with_host(recorder.clone());
        let console = realm.scope().lookup("console").unwrap();
        let mut interp = crate::script::Interpreter::new(Default::default(), 0);
        let warn = interp.get_property(&console, "warn").unwrap();
        interp
            .call(&warn, console.clone(), &[Value::from("careful"), Value::from(2.0)])
            .unwrap();
        assert_eq!(
            recorder.0.borrow().as_slice(),
            &[(EffectKind::Warn, "careful 2".to_string())]
        );
    }
}
