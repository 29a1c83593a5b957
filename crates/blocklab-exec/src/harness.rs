//! The execution harness: runs host-language source against a shared realm
//! and turns whatever happens into an [`ExecutionReport`].
//!
//! # Architecture
//!
//! - [`Harness`] owns an `Rc<Realm>` (possibly shared with other harnesses)
//!   and a [`HarnessConfig`].
//! - [`HarnessState`] tracks the lifecycle: `Idle -> Running -> Idle`, or
//!   `Poisoned` once the realm was observed to change across an execution.
//! - Each execution gets a fresh top-level scope over the realm with the
//!   capability bundle from [`crate::effects`] bound in it. The scope, the
//!   bundle and the realm lease are all released before `execute` returns.
//! - Script failures are data (`Failed`, `TimedOut`); only harness-level
//!   problems ([`HarnessError`]) come back as `Err`.

use std::rc::Rc;
use std::time::Duration;

use blocklab_core::LanguageKey;
use serde::{Deserialize, Serialize};

use crate::effects::{self, Capabilities, EffectKind};
use crate::realm::{Realm, RealmBusy};
use crate::report::{Completion, ExecutionReport, NotExecutable};
use crate::script::value::ObjectKind;
use crate::script::{self, Abort, Interpreter, Limits, ScopeKind, ScriptError, Value};

/// Limits and defaults applied to every execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Statements a run may execute; `None` disables the step budget.
    pub step_limit: Option<u64>,
    /// Wall-clock budget in milliseconds; `None` disables the deadline.
    pub time_limit_ms: Option<u64>,
    /// Maximum depth of script function calls.
    pub max_call_depth: usize,
    /// Maximum syntactic nesting accepted by the parser.
    pub max_nesting: usize,
    /// Longest string, in bytes, a script may build.
    pub max_string_length: usize,
    /// What `prompt()` returns when the script supplies no default.
    pub prompt_default: String,
    /// Seed for `Math.random`. Unset means a fresh seed per execution.
    pub random_seed: Option<u64>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            step_limit: Some(1_000_000),
            time_limit_ms: Some(5_000),
            max_call_depth: 100,
            max_nesting: 100,
            max_string_length: script::MAX_STRING_LENGTH,
            prompt_default: "user_input".to_string(),
            random_seed: None,
        }
    }
}

impl HarnessConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            step_limit: self.step_limit,
            time_limit: self.time_limit_ms.map(Duration::from_millis),
            max_call_depth: self.max_call_depth,
            max_string_length: self.max_string_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    #[error("the realm is held by another execution")]
    Busy,

    /// The realm's fingerprint changed across an execution. The harness
    /// refuses all further work.
    #[error("realm state changed during execution ({before} -> {after}); harness is poisoned")]
    RestorationInvariantViolation { before: String, after: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HarnessState {
    Idle,
    Running,
    Poisoned,
}

#[derive(Debug)]
pub struct Harness {
    realm: Rc<Realm>,
    config: HarnessConfig,
    state: HarnessState,
    violation: Option<HarnessError>,
    executions: u64,
}

impl Harness {
    /// A harness with a realm of its own.
    pub fn new(config: HarnessConfig) -> Self {
        Harness::with_realm(Rc::new(Realm::new()), config)
    }

    pub fn with_realm(realm: Rc<Realm>, config: HarnessConfig) -> Self {
        Harness {
            realm,
            config,
            state: HarnessState::Idle,
            violation: None,
            executions: 0,
        }
    }

    pub fn realm(&self) -> &Rc<Realm> {
        &self.realm
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// Number of requests that actually ran code.
    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Runs `source` if `language` is the host language and the source is
    /// not blank.
    pub fn execute(&mut self, source: &str, language: LanguageKey) -> Result<ExecutionReport, HarnessError> {
        if let Some(violation) = &self.violation {
            return Err(violation.clone());
        }
        if !language.is_host() {
            tracing::debug!(%language, "refusing to execute non-host language");
            return Ok(ExecutionReport::NotExecutable {
                reason: NotExecutable::WrongLanguage { language },
            });
        }
        if source.trim().is_empty() {
            return Ok(ExecutionReport::NotExecutable {
                reason: NotExecutable::EmptySource,
            });
        }

        let lease = self.realm.acquire().map_err(|RealmBusy| HarnessError::Busy)?;
        let before = self.realm.fingerprint();
        let span = tracing::info_span!("execute", run = self.executions + 1, bytes = source.len());
        let _entered = span.enter();
        tracing::info!("execution started");

        let report = {
            let _running = RunningGuard::enter(&mut self.state);
            run(lease.realm(), &self.config, source)
        };
        drop(lease);
        self.executions += 1;

        let after = self.realm.fingerprint();
        if before != after {
            let violation = HarnessError::RestorationInvariantViolation {
                before: before.to_string(),
                after: after.to_string(),
            };
            tracing::error!(%before, %after, "realm changed across an execution; poisoning harness");
            self.state = HarnessState::Poisoned;
            self.violation = Some(violation.clone());
            return Err(violation);
        }

        tracing::info!(
            status = report.status(),
            effects = report.effects().len(),
            "execution finished"
        );
        Ok(report)
    }
}

/// Holds the harness in `Running`; back to `Idle` on every exit path.
struct RunningGuard<'a>(&'a mut HarnessState);

impl<'a> RunningGuard<'a> {
    fn enter(state: &'a mut HarnessState) -> Self {
        *state = HarnessState::Running;
        RunningGuard(state)
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        if *self.0 == HarnessState::Running {
            *self.0 = HarnessState::Idle;
        }
    }
}

fn run(realm: &Realm, config: &HarnessConfig, source: &str) -> ExecutionReport {
    let capabilities = Capabilities::new(&config.prompt_default);
    let outcome = evaluate(realm, config, source, &capabilities);
    let effects = capabilities.seal();
    match outcome {
        Ok(completion) => ExecutionReport::Completed {
            effects,
            completion,
        },
        Err(ScriptError::Timeout(budget)) => {
            tracing::debug!(%budget, "execution ran out of budget");
            ExecutionReport::TimedOut { budget, effects }
        }
        Err(ScriptError::Syntax(err)) => ExecutionReport::Failed {
            trace: format!(
                "SyntaxError: {}\n    at <anonymous> (line {}, column {})",
                err.message, err.line, err.column
            ),
            message: err.message,
        },
        Err(ScriptError::Uncaught { message, trace }) => ExecutionReport::Failed { message, trace },
    }
}

fn evaluate(
    realm: &Realm,
    config: &HarnessConfig,
    source: &str,
    capabilities: &Capabilities,
) -> Result<Completion, ScriptError> {
    let parsed = script::parse(source, config.max_nesting)?;
    let global = realm.scope().child(ScopeKind::Global);
    for (name, value) in capabilities.bindings() {
        global.declare(name, value, true);
    }
    let seed = config.random_seed.unwrap_or_else(rand::random);
    let mut interp = Interpreter::new(config.limits(), seed);
    let outcome = match interp.run(&parsed, &global) {
        Ok(None) => Ok(Completion::NoValue),
        Ok(Some(Value::Undefined)) => Ok(Completion::Undefined),
        Ok(Some(value)) => effects::display_value(&interp, &value).map(Completion::Value),
        Err(abort) => Err(abort),
    };
    tracing::debug!(steps = interp.steps(), "evaluation ended");
    interp.release();
    global.clear();

    match outcome {
        Ok(completion) => {
            if let Completion::Value(text) = &completion {
                capabilities.push(EffectKind::Result, text.clone());
            }
            Ok(completion)
        }
        Err(Abort::Timeout(budget)) => Err(ScriptError::Timeout(budget)),
        Err(Abort::Throw(thrown)) => Err(uncaught(&thrown)),
    }
}

/// Message and trace of an exception that escaped the script. Error
/// objects supply both; any other thrown value is shown as `String(x)`.
fn uncaught(thrown: &Value) -> ScriptError {
    if let Value::Object(obj) = thrown {
        let object = obj.borrow();
        if matches!(object.kind, ObjectKind::Error) {
            let field = |key: &str| {
                object
                    .properties
                    .get(key)
                    .map(|v| v.to_js_string().to_string())
                    .unwrap_or_default()
            };
            let message = field("message");
            let trace = match object.properties.get("stack") {
                Some(stack) => stack.to_js_string().to_string(),
                None => thrown.to_js_string().to_string(),
            };
            return ScriptError::Uncaught { message, trace };
        }
    }
    let text = thrown.to_js_string().to_string();
    ScriptError::Uncaught {
        message: text.clone(),
        trace: text,
    }
}
