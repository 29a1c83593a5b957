//! Outcome of one `execute` request.
//!
//! Reports are plain data: a failing script yields a `Failed` report, never
//! an `Err`. [`ExecutionReport::render`] produces the text the output pane
//! shows; the serde form is what the CLI prints with `--json`.

use blocklab_core::LanguageKey;
use serde::Serialize;

use crate::effects::EffectRecord;
use crate::script::Budget;

/// Value of the last top-level expression statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Completion {
    /// No expression statement ran at top level.
    NoValue,
    /// The last one evaluated to `undefined`.
    Undefined,
    /// Anything else, rendered for display.
    Value(String),
}

/// Which guard kept the source from running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NotExecutable {
    WrongLanguage { language: LanguageKey },
    EmptySource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionReport {
    NotExecutable {
        #[serde(flatten)]
        reason: NotExecutable,
    },
    Completed {
        effects: Vec<EffectRecord>,
        completion: Completion,
    },
    Failed {
        message: String,
        trace: String,
    },
    TimedOut {
        budget: Budget,
        effects: Vec<EffectRecord>,
    },
}

impl ExecutionReport {
    pub fn status(&self) -> &'static str {
        match self {
            ExecutionReport::NotExecutable { .. } => "not_executable",
            ExecutionReport::Completed { .. } => "completed",
            ExecutionReport::Failed { .. } => "failed",
            ExecutionReport::TimedOut { .. } => "timed_out",
        }
    }

    /// Records captured before the execution ended, if it ran at all.
    pub fn effects(&self) -> &[EffectRecord] {
        match self {
            ExecutionReport::Completed { effects, .. } | ExecutionReport::TimedOut { effects, .. } => {
                effects
            }
            _ => &[],
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionReport::Completed { .. })
    }

    /// Text for the output pane.
    pub fn render(&self) -> String {
        match self {
            ExecutionReport::NotExecutable {
                reason: NotExecutable::WrongLanguage { language },
            } => {
                let language = language.as_str();
                format!(
                    "⚠️ Code execution is only for JavaScript.\nCurrent language: {language}\n\n\
                     To run this code:\n\
                     • Switch to JavaScript language\n\
                     • Or copy the code and run it in a {language} environment"
                )
            }
            ExecutionReport::NotExecutable {
                reason: NotExecutable::EmptySource,
            } => "No code to execute".to_string(),
            ExecutionReport::Completed { effects, .. } if effects.is_empty() => {
                "✅ Code executed successfully (no output)".to_string()
            }
            ExecutionReport::Completed { effects, .. } => render_effects(effects),
            ExecutionReport::Failed { message, trace } => {
                format!("❌ Error: {message}\n\nStack trace:\n{trace}")
            }
            ExecutionReport::TimedOut { budget, effects } => {
                let notice = format!("⏱️ Execution stopped: exceeded the {budget}");
                if effects.is_empty() {
                    notice
                } else {
                    format!("{}\n{notice}", render_effects(effects))
                }
            }
        }
    }
}

fn render_effects(effects: &[EffectRecord]) -> String {
    effects
        .iter()
        .map(EffectRecord::render)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectKind;

    #[test]
    fn wrong_language_names_the_language() {
        let report = ExecutionReport::NotExecutable {
            reason: NotExecutable::WrongLanguage {
                language: LanguageKey::Python,
            },
        };
        insta::assert_snapshot!(report.render(), @r"
        ⚠️ Code execution is only for JavaScript.
        Current language: python

        To run this code:
        • Switch to JavaScript language
        • Or copy the code and run it in a python environment
        ");
    }

    #[test]
    fn completed_reports_join_records_in_order() {
        let report = ExecutionReport::Completed {
            effects: vec![
                EffectRecord::new(EffectKind::Log, "a"),
                EffectRecord::new(EffectKind::Warn, "b"),
                EffectRecord::new(EffectKind::Error, "c"),
            ],
            completion: Completion::NoValue,
        };
        assert_eq!(report.render(), "📝 a\n⚠️ b\n❌ c");
    }

    #[test]
    fn empty_completed_report() {
        let report = ExecutionReport::Completed {
            effects: Vec::new(),
            completion: Completion::Undefined,
        };
        assert_eq!(report.render(), "✅ Code executed successfully (no output)");
    }

    #[test]
    fn failures_show_the_trace() {
        let report = ExecutionReport::Failed {
            message: "boom".into(),
            trace: "Error: boom\n    at <anonymous> (line 1)".into(),
        };
        assert_eq!(
            report.render(),
            "❌ Error: boom\n\nStack trace:\nError: boom\n    at <anonymous> (line 1)"
        );
    }

    #[test]
    fn reports_serialize_with_a_status_tag() {
        let report = ExecutionReport::Completed {
            effects: vec![EffectRecord::new(EffectKind::Result, "4")],
            completion: Completion::Value("4".into()),
        };
        insta::assert_json_snapshot!(report, @r#"
        {
          "status": "completed",
          "effects": [
            {
              "kind": "result",
              "text": "4"
            }
          ],
          "completion": {
            "kind": "value",
            "value": "4"
          }
        }
        "#);

        let empty = ExecutionReport::NotExecutable {
            reason: NotExecutable::EmptySource,
        };
        assert_eq!(
            serde_json::to_string(&empty).unwrap(),
            r#"{"status":"not_executable","reason":"empty_source"}"#
        );
    }
}
