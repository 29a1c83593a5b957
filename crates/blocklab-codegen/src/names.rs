//! Per-language identifier allocation.
//!
//! Block programs may use any text as a variable or procedure name. The
//! [`NameTable`] turns those into identifiers that are legal in the target
//! language, do not collide with its reserved words, and do not collide
//! with each other. Names are assigned in declaration order, so the same
//! program always yields the same identifiers.

use std::collections::HashSet;

use indexmap::IndexMap;

/// What a user-facing name refers to. Variables and procedures share one
/// identifier space but are looked up separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    Variable,
    Procedure,
}

#[derive(Debug)]
pub struct NameTable {
    reserved: HashSet<&'static str>,
    assigned: IndexMap<(NameKind, String), String>,
    used: HashSet<String>,
}

impl NameTable {
    pub fn new(reserved: &[&'static str]) -> Self {
        NameTable {
            reserved: reserved.iter().copied().collect(),
            assigned: IndexMap::new(),
            used: HashSet::new(),
        }
    }

    /// Assigns (or returns the already assigned) identifier for `name`.
    pub fn declare(&mut self, kind: NameKind, name: &str) -> String {
        if let Some(existing) = self.assigned.get(&(kind, name.to_string())) {
            return existing.clone();
        }
        let ident = self.distinct(name);
        self.assigned.insert((kind, name.to_string()), ident.clone());
        ident
    }

    /// The identifier assigned to `name`, or its sanitized form if it was
    /// never declared.
    pub fn get(&self, kind: NameKind, name: &str) -> String {
        self.assigned
            .get(&(kind, name.to_string()))
            .cloned()
            .unwrap_or_else(|| safe_identifier(name))
    }

    /// A fresh identifier based on `base` that collides with nothing
    /// assigned so far. Used for loop temporaries and helper functions.
    pub fn distinct(&mut self, base: &str) -> String {
        let safe = safe_identifier(base);
        let mut candidate = safe.clone();
        let mut n = 2;
        while self.reserved.contains(candidate.as_str()) || self.used.contains(&candidate) {
            candidate = format!("{safe}{n}");
            n += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// Replaces characters that are not ASCII letters, digits or `_`, and
/// prefixes names that would start with a digit.
pub fn safe_identifier(name: &str) -> String {
    let mut out: String = name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push_str("unnamed");
    } else if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "my_");
    }
    out
}
