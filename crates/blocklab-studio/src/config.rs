//! Studio configuration.
//!
//! Layers, lowest to highest precedence: [`StudioConfig::default`], an
//! optional JSON file, `BLOCKLAB_*` environment variables, then whatever
//! the command line sets explicitly.

use std::path::Path;

use blocklab_core::LanguageKey;
use blocklab_exec::HarnessConfig;
use serde::{Deserialize, Serialize};

use crate::error::StudioError;

pub const ENV_LANGUAGE: &str = "BLOCKLAB_LANGUAGE";
pub const ENV_STEP_LIMIT: &str = "BLOCKLAB_STEP_LIMIT";
pub const ENV_TIME_LIMIT_MS: &str = "BLOCKLAB_TIME_LIMIT_MS";
pub const ENV_MAX_CALL_DEPTH: &str = "BLOCKLAB_MAX_CALL_DEPTH";
pub const ENV_MAX_STRING_LENGTH: &str = "BLOCKLAB_MAX_STRING_LENGTH";
pub const ENV_PROMPT_DEFAULT: &str = "BLOCKLAB_PROMPT_DEFAULT";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Output language selected at startup. Default: JavaScript.
    pub language: LanguageKey,
    /// Limits for the execution harness.
    pub harness: HarnessConfig,
}

impl StudioConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, StudioError> {
        StudioConfig::default().with_env(|key| std::env::var(key).ok())
    }

    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, StudioError> {
        let text = std::fs::read_to_string(path).map_err(|source| StudioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StudioError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlays every `BLOCKLAB_*` variable that `lookup` finds. Limits
    /// accept `none` to switch the budget off.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StudioError> {
        if let Some(value) = lookup(ENV_LANGUAGE) {
            self.language = value.parse()?;
        }
        if let Some(value) = lookup(ENV_STEP_LIMIT) {
            self.harness.step_limit = parse_limit(ENV_STEP_LIMIT, &value)?;
        }
        if let Some(value) = lookup(ENV_TIME_LIMIT_MS) {
            self.harness.time_limit_ms = parse_limit(ENV_TIME_LIMIT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_CALL_DEPTH) {
            self.harness.max_call_depth = parse_number(ENV_MAX_CALL_DEPTH, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_STRING_LENGTH) {
            self.harness.max_string_length = parse_number(ENV_MAX_STRING_LENGTH, &value)?;
        }
        if let Some(value) = lookup(ENV_PROMPT_DEFAULT) {
            self.harness.prompt_default = value;
        }
        Ok(self)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, StudioError> {
    value.trim().parse().map_err(|_| StudioError::InvalidSetting {
        name,
        value: value.to_string(),
    })
}

fn parse_limit(name: &'static str, value: &str) -> Result<Option<u64>, StudioError> {
    if value.trim().eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    parse_number(name, value).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = StudioConfig::default()
            .with_env(env(&[
                (ENV_LANGUAGE, "Python"),
                (ENV_STEP_LIMIT, "none"),
                (ENV_TIME_LIMIT_MS, "250"),
                (ENV_MAX_CALL_DEPTH, "32"),
                (ENV_MAX_STRING_LENGTH, "4096"),
                (ENV_PROMPT_DEFAULT, "Ada"),
            ]))
            .unwrap();
        assert_eq!(config.language, LanguageKey::Python);
        assert_eq!(config.harness.step_limit, None);
        assert_eq!(config.harness.time_limit_ms, Some(250));
        assert_eq!(config.harness.max_call_depth, 32);
        assert_eq!(config.harness.max_string_length, 4096);
        assert_eq!(config.harness.prompt_default, "Ada");
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = StudioConfig::default().with_env(env(&[])).unwrap();
        assert_eq!(config, StudioConfig::default());
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = StudioConfig::default()
            .with_env(env(&[(ENV_STEP_LIMIT, "lots")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid value for BLOCKLAB_STEP_LIMIT: 'lots'");
        assert_eq!(err.exit_code(), 1);

        let err = StudioConfig::default()
            .with_env(env(&[(ENV_LANGUAGE, "cobol")]))
            .unwrap_err();
        assert!(matches!(err, StudioError::Core(_)));
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: StudioConfig =
            serde_json::from_str(r#"{"language": "lua", "harness": {"time_limit_ms": null}}"#).unwrap();
        assert_eq!(config.language, LanguageKey::Lua);
        assert_eq!(config.harness.time_limit_ms, None);
        assert_eq!(config.harness.step_limit, HarnessConfig::default().step_limit);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = StudioConfig::from_file(Path::new("/nonexistent/blocklab.json")).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
