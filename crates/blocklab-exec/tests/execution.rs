//! Integration tests for the execution harness.
//!
//! Tests cover:
//! - Guard order and the not-executable outcomes
//! - Effect capture, completion values and failure reports
//! - Budgets, busy realms and poisoning
//! - Running what the JavaScript emitter produces
//! - Realm restoration across arbitrary request sequences (proptest)

use std::rc::Rc;

use blocklab_codegen::EmitterRegistry;
use blocklab_core::block::PromptKind;
use blocklab_core::{BlockId, BlockStack, Expr, LanguageKey, Procedure, Program, Stmt};
use blocklab_exec::script::value::ObjectKind;
use blocklab_exec::script::Value;
use blocklab_exec::{
    Budget, Completion, EffectKind, EffectRecord, ExecutionReport, Harness, HarnessConfig,
    HarnessError, HarnessState, NotExecutable, Realm,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_config() -> HarnessConfig {
    HarnessConfig {
        step_limit: Some(20_000),
        time_limit_ms: None,
        max_call_depth: 20,
        random_seed: Some(7),
        ..HarnessConfig::default()
    }
}

fn run(source: &str) -> ExecutionReport {
    Harness::new(test_config())
        .execute(source, LanguageKey::JavaScript)
        .unwrap()
}

fn kinds(report: &ExecutionReport) -> Vec<EffectKind> {
    report.effects().iter().map(|r| r.kind).collect()
}

fn texts_of(report: &ExecutionReport, kind: EffectKind) -> Vec<&str> {
    report
        .effects()
        .iter()
        .filter(|r| r.kind == kind)
        .map(|r| r.text.as_str())
        .collect()
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

#[test]
fn empty_source_is_not_executable() {
    let mut harness = Harness::new(test_config());
    for source in ["", "  \n\t "] {
        assert_eq!(
            harness.execute(source, LanguageKey::JavaScript).unwrap(),
            ExecutionReport::NotExecutable {
                reason: NotExecutable::EmptySource
            }
        );
    }
    assert_eq!(harness.executions(), 0);
}

#[test]
fn other_languages_are_not_executable() {
    let mut harness = Harness::new(test_config());
    let before = harness.realm().fingerprint();
    let report = harness
        .execute("print('hi')", LanguageKey::Python)
        .unwrap();
    assert_eq!(
        report,
        ExecutionReport::NotExecutable {
            reason: NotExecutable::WrongLanguage {
                language: LanguageKey::Python
            }
        }
    );
    assert!(report.render().contains("Current language: python"));
    assert_eq!(before, harness.realm().fingerprint());
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[test]
fn log_then_expression_value() {
    let report = run("console.log('hi'); 2+2");
    assert_eq!(
        report,
        ExecutionReport::Completed {
            effects: vec![
                EffectRecord::new(EffectKind::Log, "hi"),
                EffectRecord::new(EffectKind::Result, "4"),
            ],
            completion: Completion::Value("4".into()),
        }
    );
    assert_eq!(report.render(), "📝 hi\n↩️ Result: 4");
}

#[test]
fn console_levels_keep_call_order() {
    let report = run("console.log('a'); console.warn('b'); console.error('c'); console.log('d')");
    assert_eq!(
        kinds(&report),
        vec![EffectKind::Log, EffectKind::Warn, EffectKind::Error, EffectKind::Log]
    );
    assert_eq!(report.render(), "📝 a\n⚠️ b\n❌ c\n📝 d");
}

#[test]
fn uncaught_error_reports_message_and_trace() {
    let report = run("function explode() {\n  throw new Error('boom');\n}\nexplode();");
    let ExecutionReport::Failed { message, trace } = &report else {
        panic!("expected failure, got {report:?}");
    };
    assert_eq!(message, "boom");
    assert!(trace.starts_with("Error: boom"), "{trace}");
    assert!(trace.contains("explode"), "{trace}");
    assert!(report.render().starts_with("❌ Error: boom\n\nStack trace:\n"));
}

#[test]
fn caught_errors_do_not_fail_the_run() {
    let report = run("try { null.x } catch (e) { console.log(e.name) } 'done'");
    assert_eq!(texts_of(&report, EffectKind::Log), vec!["TypeError"]);
    assert_eq!(texts_of(&report, EffectKind::Result), vec!["done"]);
}

#[test]
fn completion_kinds() {
    let ExecutionReport::Completed { completion, effects } = run("var x = 1;") else {
        panic!("expected completion");
    };
    assert_eq!(completion, Completion::NoValue);
    assert!(effects.is_empty());

    let ExecutionReport::Completed { completion, effects } = run("console.log('x')") else {
        panic!("expected completion");
    };
    assert_eq!(completion, Completion::Undefined);
    assert_eq!(effects, vec![EffectRecord::new(EffectKind::Log, "x")]);

    let ExecutionReport::Completed { completion, .. } = run("({ a: [1, null] })") else {
        panic!("expected completion");
    };
    assert_eq!(
        completion,
        Completion::Value("{\n  \"a\": [\n    1,\n    null\n  ]\n}".into())
    );
}

#[test]
fn objects_are_logged_as_json() {
    let report = run("console.log('list', [1, 'two'], null, undefined)");
    assert_eq!(
        texts_of(&report, EffectKind::Log),
        vec!["list [\n  1,\n  \"two\"\n] null undefined"]
    );
}

#[test]
fn alerts_and_prompts_are_recorded_without_blocking() {
    let report = run("window.alert('hello'); var n = prompt('Name?'); alert(n); prompt('Age?', '42')");
    assert_eq!(
        report.effects(),
        &[
            EffectRecord::new(EffectKind::Alert, "hello"),
            EffectRecord::new(EffectKind::Prompt, "Name?"),
            EffectRecord::new(EffectKind::Alert, "user_input"),
            EffectRecord::new(EffectKind::Prompt, "Age?"),
            EffectRecord::new(EffectKind::Result, "42"),
        ]
    );
}

#[test]
fn prompt_default_is_configurable() {
    let mut harness = Harness::new(HarnessConfig {
        prompt_default: "Ada".into(),
        ..test_config()
    });
    let report = harness
        .execute("prompt('Name?')", LanguageKey::JavaScript)
        .unwrap();
    assert_eq!(texts_of(&report, EffectKind::Result), vec!["Ada"]);
}

#[test]
fn globals_do_not_survive_between_runs() {
    let mut harness = Harness::new(test_config());
    harness
        .execute("var leaked = 1; total = 2; function helper() {}", LanguageKey::JavaScript)
        .unwrap();
    let report = harness
        .execute("[typeof leaked, typeof total, typeof helper].join()", LanguageKey::JavaScript)
        .unwrap();
    assert_eq!(
        texts_of(&report, EffectKind::Result),
        vec!["undefined,undefined,undefined"]
    );
}

#[test]
fn scripts_cannot_change_realm_globals() {
    let mut harness = Harness::new(test_config());
    let before = harness.realm().fingerprint();

    let report = harness.execute("Math.PI = 3", LanguageKey::JavaScript).unwrap();
    assert!(matches!(report, ExecutionReport::Failed { .. }), "{report:?}");

    let report = harness.execute("var Math = 1; Math", LanguageKey::JavaScript).unwrap();
    assert_eq!(texts_of(&report, EffectKind::Result), vec!["1"]);

    let report = harness.execute("Math.PI", LanguageKey::JavaScript).unwrap();
    assert_eq!(texts_of(&report, EffectKind::Result), vec!["3.141592653589793"]);

    assert_eq!(before, harness.realm().fingerprint());
    assert_eq!(harness.state(), HarnessState::Idle);
}

// ---------------------------------------------------------------------------
// Budgets and harness state
// ---------------------------------------------------------------------------

#[test]
fn step_budget_keeps_effects_recorded_so_far() {
    let mut harness = Harness::new(HarnessConfig {
        step_limit: Some(1_000),
        ..test_config()
    });
    let report = harness
        .execute("console.log('before'); for (;;) {}", LanguageKey::JavaScript)
        .unwrap();
    assert_eq!(
        report,
        ExecutionReport::TimedOut {
            budget: Budget::Steps { limit: 1_000 },
            effects: vec![EffectRecord::new(EffectKind::Log, "before")],
        }
    );
    assert_eq!(
        report.render(),
        "📝 before\n⏱️ Execution stopped: exceeded the step budget of 1000"
    );
    assert_eq!(harness.state(), HarnessState::Idle);
}

#[test]
fn time_budget_stops_unbounded_loops() {
    let mut harness = Harness::new(HarnessConfig {
        step_limit: None,
        time_limit_ms: Some(50),
        ..test_config()
    });
    let report = harness
        .execute("while (true) { try {} finally {} }", LanguageKey::JavaScript)
        .unwrap();
    assert_eq!(
        report,
        ExecutionReport::TimedOut {
            budget: Budget::Time { limit_ms: 50 },
            effects: vec![],
        }
    );
}

#[test]
fn runaway_recursion_is_a_range_error() {
    let report = run("function f(n) { return f(n + 1); } f(0)");
    let ExecutionReport::Failed { message, .. } = report else {
        panic!("expected failure");
    };
    assert_eq!(message, "Maximum call stack size exceeded");
}

#[test]
fn deeply_nested_arrays_are_released_without_overflow() {
    let mut harness = Harness::new(HarnessConfig {
        step_limit: Some(2_000_000),
        ..test_config()
    });
    let report = harness
        .execute("var a = []; for (var i = 0; i < 200000; i++) { a = [a]; } 1", LanguageKey::JavaScript)
        .unwrap();
    assert_eq!(
        report,
        ExecutionReport::Completed {
            effects: vec![EffectRecord::new(EffectKind::Result, "1")],
            completion: Completion::Value("1".into()),
        }
    );
    assert_eq!(harness.state(), HarnessState::Idle);
}

#[test]
fn deeply_nested_arrays_fail_to_convert() {
    let mut harness = Harness::new(HarnessConfig {
        step_limit: Some(2_000_000),
        ..test_config()
    });
    let build = "var a = []; for (var i = 0; i < 200000; i++) { a = [a]; }";
    for tail in [
        "JSON.stringify(a).length",
        "String(a).length",
        "(a + '').length",
        "console.log(a)",
        "console.warn(a)",
        "alert(a)",
    ] {
        let report = harness
            .execute(&format!("{build} {tail}"), LanguageKey::JavaScript)
            .unwrap();
        let ExecutionReport::Failed { message, trace } = &report else {
            panic!("{tail}: expected failure, got {report:?}");
        };
        assert_eq!(message, "Maximum call stack size exceeded", "{tail}");
        assert!(trace.starts_with("RangeError"), "{trace}");
        assert!(report.effects().is_empty(), "{tail}");
        assert_eq!(harness.state(), HarnessState::Idle);
    }

    let report = harness.execute("1 + 1", LanguageKey::JavaScript).unwrap();
    assert_eq!(texts_of(&report, EffectKind::Result), vec!["2"]);
}

#[test]
fn oversized_strings_are_range_errors() {
    let report = run("'x'.padStart(1e9)");
    let ExecutionReport::Failed { message, trace } = &report else {
        panic!("expected failure, got {report:?}");
    };
    assert_eq!(message, "Invalid string length");
    assert!(trace.starts_with("RangeError: Invalid string length"), "{trace}");

    let mut harness = Harness::new(HarnessConfig {
        max_string_length: 1_000,
        ..test_config()
    });
    for source in ["'ab'.repeat(501)", "'x'.padEnd(1001)", "Array(1002).join('x')"] {
        let report = harness.execute(source, LanguageKey::JavaScript).unwrap();
        assert!(
            matches!(&report, ExecutionReport::Failed { message, .. } if message == "Invalid string length"),
            "{source}: {report:?}"
        );
    }
    let report = harness
        .execute("try { 'x'.repeat(5000) } catch (e) { e.name }", LanguageKey::JavaScript)
        .unwrap();
    assert_eq!(texts_of(&report, EffectKind::Result), vec!["RangeError"]);
}

#[test]
fn held_realm_rejects_requests_until_released() {
    let realm = Rc::new(Realm::new());
    let mut first = Harness::with_realm(Rc::clone(&realm), test_config());
    let mut second = Harness::with_realm(Rc::clone(&realm), test_config());

    let lease = realm.acquire().unwrap();
    assert_eq!(
        second.execute("1", LanguageKey::JavaScript),
        Err(HarnessError::Busy)
    );
    // Guards still answer without touching the realm.
    assert_eq!(
        second.execute("", LanguageKey::JavaScript).unwrap(),
        ExecutionReport::NotExecutable {
            reason: NotExecutable::EmptySource
        }
    );
    drop(lease);

    assert!(first.execute("1", LanguageKey::JavaScript).unwrap().is_success());
    assert!(second.execute("2", LanguageKey::JavaScript).unwrap().is_success());
    assert!(!realm.is_busy());
}

#[test]
fn realm_change_poisons_the_harness() {
    let realm = Rc::new(Realm::new());
    let scope = Rc::downgrade(realm.scope());
    realm.scope().declare(
        "tamper",
        Value::native("tamper", move |_, _, _| {
            if let Some(scope) = scope.upgrade() {
                scope.declare("planted", Value::object(ObjectKind::Ordinary), false);
            }
            Ok(Value::Undefined)
        }),
        false,
    );
    let mut harness = Harness::with_realm(Rc::clone(&realm), test_config());

    let err = harness.execute("tamper()", LanguageKey::JavaScript).unwrap_err();
    assert!(matches!(err, HarnessError::RestorationInvariantViolation { .. }));
    assert_eq!(harness.state(), HarnessState::Poisoned);

    assert_eq!(harness.execute("1", LanguageKey::JavaScript), Err(err.clone()));
    assert_eq!(harness.execute("", LanguageKey::JavaScript), Err(err));
    assert!(!realm.is_busy());
}

// ---------------------------------------------------------------------------
// Emitted programs
// ---------------------------------------------------------------------------

fn run_program(program: &Program) -> ExecutionReport {
    let source = EmitterRegistry::with_builtin()
        .emit(program, LanguageKey::JavaScript)
        .unwrap();
    let report = run(&source);
    assert!(
        !matches!(report, ExecutionReport::Failed { .. }),
        "emitted code failed:\n{source}\n{report:?}"
    );
    report
}

#[test]
fn emitted_greeting_runs() {
    let program = Program {
        variables: vec!["name".into()],
        procedures: vec![Procedure {
            id: BlockId(1),
            name: "double".into(),
            params: vec!["n".into()],
            body: vec![],
            returns: Some(Expr::arithmetic(
                blocklab_core::block::ArithmeticOp::Multiply,
                Expr::var("n"),
                Expr::number(2.0),
            )),
        }],
        stacks: vec![BlockStack {
            id: BlockId(2),
            body: vec![
                Stmt::set("name", Expr::text("Ada")),
                Stmt::print(Expr::join(vec![Expr::text("Hello, "), Expr::var("name")])),
                Stmt::repeat(
                    Expr::number(2.0),
                    vec![Stmt::print(Expr::call("double", vec![Expr::number(21.0)]))],
                ),
            ],
        }],
    };
    let report = run_program(&program);
    assert_eq!(
        texts_of(&report, EffectKind::Alert),
        vec!["Hello, Ada", "42", "42"]
    );
}

#[test]
fn emitted_lists_and_prompts_run() {
    let program = Program {
        variables: vec!["item".into(), "answer".into()],
        procedures: vec![],
        stacks: vec![BlockStack {
            id: BlockId(1),
            body: vec![
                Stmt::ForEach {
                    name: "item".into(),
                    list: Expr::list(vec![Expr::text("a"), Expr::text("b")]),
                    body: vec![Stmt::print(Expr::var("item"))],
                },
                Stmt::set(
                    "answer",
                    Expr::Prompt {
                        kind: PromptKind::Text,
                        message: Box::new(Expr::text("Name?")),
                    },
                ),
                Stmt::print(Expr::var("answer")),
            ],
        }],
    };
    let report = run_program(&program);
    assert_eq!(texts_of(&report, EffectKind::Alert), vec!["a", "b", "user_input"]);
    assert_eq!(texts_of(&report, EffectKind::Prompt), vec!["Name?"]);
}

// ---------------------------------------------------------------------------
// Restoration (proptest)
// ---------------------------------------------------------------------------

const SNIPPETS: &[&str] = &[
    "console.log('hi'); 2 + 2",
    "Math.PI = 3",
    "Math.random = function () { return 0; }",
    "var Math = 1; Math",
    "JSON = null",
    "parseInt = 5",
    "console.log = null; console.log",
    "window.alert = 1; alert('still here')",
    "Object.freeze(Object); Object.isFrozen(Math)",
    "Array.isArray = 0",
    "var leaked = [1, 2, 3]; leaked.push(leaked.length)",
    "throw new Error('boom')",
    "throw 42",
    "while (true) {}",
    "function f() { return f(); } f()",
    "missing.x",
    "var o = {}; o.self = o; JSON.stringify(o)",
    "let x = ;",
    "",
    "prompt('q') + Math.floor(Math.random() * 10)",
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn realm_is_restored_after_every_outcome(
        picks in prop::collection::vec(prop::sample::select(SNIPPETS), 1..8),
        javascript in prop::collection::vec(any::<bool>(), 8),
    ) {
        let mut harness = Harness::new(HarnessConfig {
            step_limit: Some(5_000),
            ..test_config()
        });
        let initial = harness.realm().fingerprint();
        for (i, source) in picks.iter().enumerate() {
            let language = if javascript[i] { LanguageKey::JavaScript } else { LanguageKey::Lua };
            let report = harness.execute(source, language);
            prop_assert!(report.is_ok(), "{source}: {report:?}");
            prop_assert_eq!(harness.state(), HarnessState::Idle);
            prop_assert_eq!(harness.realm().fingerprint(), initial);
            prop_assert!(!harness.realm().is_busy());
        }
    }
}
