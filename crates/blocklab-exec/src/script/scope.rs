//! Lexical environments.
//!
//! Scopes form a parent chain from the innermost block out to the realm.
//! The realm scope is read-only: every binding in it is immutable, so a
//! script can shadow a global but never replace it.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Host-owned globals shared by every execution.
    Realm,
    /// Top level of one execution; receives implicit globals.
    Global,
    Function,
    Block,
}

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

/// Result of writing to a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Done,
    /// The binding exists but is `const` or belongs to the realm.
    ReadOnly,
    /// No binding and no global scope to create one in.
    Unresolved,
}

#[derive(Debug)]
pub struct Scope {
    kind: ScopeKind,
    bindings: RefCell<IndexMap<String, Binding>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<Rc<Scope>>) -> Rc<Scope> {
        Rc::new(Scope {
            kind,
            bindings: RefCell::new(IndexMap::new()),
            parent,
        })
    }

    pub fn child(self: &Rc<Self>, kind: ScopeKind) -> Rc<Scope> {
        Scope::new(kind, Some(Rc::clone(self)))
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Creates (or overwrites) a binding in this scope.
    pub fn declare(&self, name: &str, value: Value, mutable: bool) {
        let mutable = mutable && self.kind != ScopeKind::Realm;
        self.bindings
            .borrow_mut()
            .insert(name.to_string(), Binding { value, mutable });
    }

    /// `var` semantics: only creates the binding when it is missing.
    pub fn declare_var(&self, name: &str) {
        let mut bindings = self.bindings.borrow_mut();
        if !bindings.contains_key(name) {
            bindings.insert(
                name.to_string(),
                Binding {
                    value: Value::Undefined,
                    mutable: true,
                },
            );
        }
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref()?.lookup(name)
    }

    pub fn assign(&self, name: &str, value: Value) -> Assignment {
        {
            let mut bindings = self.bindings.borrow_mut();
            if let Some(binding) = bindings.get_mut(name) {
                if !binding.mutable {
                    return Assignment::ReadOnly;
                }
                binding.value = value;
                return Assignment::Done;
            }
        }
        match &self.parent {
            // Past the global scope lies only the realm: a missing name
            // becomes an implicit global of this execution.
            Some(parent) if self.kind == ScopeKind::Global => {
                if parent.lookup(name).is_some() {
                    return Assignment::ReadOnly;
                }
                self.declare(name, value, true);
                Assignment::Done
            }
            Some(parent) => parent.assign(name, value),
            None if self.kind == ScopeKind::Global => {
                self.declare(name, value, true);
                Assignment::Done
            }
            None if self.has_own(name) => Assignment::ReadOnly,
            None => Assignment::Unresolved,
        }
    }

    /// Names and values bound directly in this scope, in declaration order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.bindings
            .borrow()
            .iter()
            .map(|(k, b)| (k.clone(), b.value.clone()))
            .collect()
    }

    /// Drops every binding. Closures stored in a scope keep the scope
    /// alive through `Rc`, so per-execution scopes are cleared on exit.
    pub fn clear(&self) {
        // Values are dropped after the borrow ends; their teardown may
        // reach back into this scope through a closure.
        let bindings = std::mem::take(&mut *self.bindings.borrow_mut());
        drop(bindings);
    }

    /// Splits an unshared scope into its values and parent.
    pub(crate) fn into_parts(self) -> (Vec<Value>, Option<Rc<Scope>>) {
        let values = self
            .bindings
            .into_inner()
            .into_values()
            .map(|binding| binding.value)
            .collect();
        (values, self.parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_bindings_are_read_only() {
        let realm = Scope::new(ScopeKind::Realm, None);
        realm.declare("Math", Value::Null, true);
        let global = realm.child(ScopeKind::Global);

        assert_eq!(global.assign("Math", Value::from(1.0)), Assignment::ReadOnly);
        assert!(matches!(realm.lookup("Math"), Some(Value::Null)));
    }

    #[test]
    fn undeclared_assignment_lands_in_global_scope() {
        let realm = Scope::new(ScopeKind::Realm, None);
        let global = realm.child(ScopeKind::Global);
        let function = global.child(ScopeKind::Function);

        assert_eq!(function.assign("leak", Value::from(1.0)), Assignment::Done);
        assert!(global.has_own("leak"));
        assert!(!realm.has_own("leak"));
    }

    #[test]
    fn shadowing_a_global_is_allowed() {
        let realm = Scope::new(ScopeKind::Realm, None);
        realm.declare("name", Value::from("realm"), false);
        let global = realm.child(ScopeKind::Global);
        global.declare("name", Value::from("mine"), true);

        assert_eq!(global.assign("name", Value::from("again")), Assignment::Done);
        assert_eq!(&*global.lookup("name").unwrap().to_js_string(), "again");
        assert_eq!(&*realm.lookup("name").unwrap().to_js_string(), "realm");
    }

    #[test]
    fn const_bindings_reject_writes() {
        let scope = Scope::new(ScopeKind::Global, None);
        scope.declare("k", Value::from(1.0), false);
        assert_eq!(scope.assign("k", Value::from(2.0)), Assignment::ReadOnly);
    }
}
