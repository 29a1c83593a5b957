//! Output language keys.
//!
//! The set of languages is closed: every [`LanguageKey`] must have exactly
//! one emitter registered for it. Only [`LanguageKey::HOST`] can be
//! executed in-process; the others are rendered for the user to run
//! elsewhere.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Identifier of an output language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKey {
    JavaScript,
    Python,
    Php,
    Lua,
    Dart,
}

impl LanguageKey {
    /// The language the execution harness can evaluate.
    pub const HOST: LanguageKey = LanguageKey::JavaScript;

    /// Every language key, in selector order.
    pub const ALL: [LanguageKey; 5] = [
        LanguageKey::JavaScript,
        LanguageKey::Python,
        LanguageKey::Php,
        LanguageKey::Lua,
        LanguageKey::Dart,
    ];

    /// Stable lowercase identifier (`"javascript"`, `"python"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            LanguageKey::JavaScript => "javascript",
            LanguageKey::Python => "python",
            LanguageKey::Php => "php",
            LanguageKey::Lua => "lua",
            LanguageKey::Dart => "dart",
        }
    }

    /// Human-readable name as shown in a language selector.
    pub fn display_name(self) -> &'static str {
        match self {
            LanguageKey::JavaScript => "JavaScript",
            LanguageKey::Python => "Python",
            LanguageKey::Php => "PHP",
            LanguageKey::Lua => "Lua",
            LanguageKey::Dart => "Dart",
        }
    }

    /// Conventional source file extension, without the dot.
    pub fn file_extension(self) -> &'static str {
        match self {
            LanguageKey::JavaScript => "js",
            LanguageKey::Python => "py",
            LanguageKey::Php => "php",
            LanguageKey::Lua => "lua",
            LanguageKey::Dart => "dart",
        }
    }

    pub fn is_host(self) -> bool {
        self == LanguageKey::HOST
    }
}

impl Default for LanguageKey {
    fn default() -> Self {
        LanguageKey::HOST
    }
}

impl fmt::Display for LanguageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageKey {
    type Err = CoreError;

    /// Accepts the canonical identifier, the file extension, or the display
    /// name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        LanguageKey::ALL
            .into_iter()
            .find(|key| {
                lowered == key.as_str()
                    || lowered == key.file_extension()
                    || lowered == key.display_name().to_ascii_lowercase()
            })
            .ok_or_else(|| CoreError::UnknownLanguage {
                name: s.to_string(),
            })
    }
}
