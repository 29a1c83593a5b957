//! End-to-end tests through the `Studio` facade.
//!
//! Tests cover:
//! - The user-visible scenarios: empty program, non-host language, console
//!   output with a completion value, uncaught errors, language switches
//! - Subscribers seeing every re-derivation
//! - Derivation counts and text stability over switch sequences (proptest)

use std::cell::RefCell;
use std::rc::Rc;

use blocklab_core::{BlockId, BlockStack, Expr, LanguageKey, Program, Stmt};
use blocklab_exec::{Completion, EffectKind, EffectRecord, ExecutionReport, NotExecutable};
use blocklab_studio::{Studio, StudioConfig};
use proptest::prelude::*;

fn hello_program() -> Program {
    Program {
        stacks: vec![BlockStack {
            id: BlockId(1),
            body: vec![Stmt::print(Expr::text("hello"))],
        }],
        ..Program::default()
    }
}

fn studio_with(program: Program, language: LanguageKey) -> Studio {
    Studio::with_program(
        program,
        StudioConfig {
            language,
            ..StudioConfig::default()
        },
    )
    .unwrap()
}

#[test]
fn empty_program_has_nothing_to_execute() {
    let mut studio = studio_with(Program::new(), LanguageKey::JavaScript);
    let report = studio.execute().unwrap();
    assert_eq!(
        report,
        ExecutionReport::NotExecutable {
            reason: NotExecutable::EmptySource
        }
    );
    assert_eq!(report.render(), "No code to execute");
}

#[test]
fn python_output_is_shown_but_not_run() {
    let mut studio = studio_with(hello_program(), LanguageKey::Python);
    assert_eq!(studio.current_source_text(), "print('hello')\n");
    let report = studio.execute().unwrap();
    assert_eq!(
        report,
        ExecutionReport::NotExecutable {
            reason: NotExecutable::WrongLanguage {
                language: LanguageKey::Python
            }
        }
    );
    assert_eq!(studio.harness().executions(), 0);
}

#[test]
fn console_output_and_completion_value() {
    let mut studio = studio_with(Program::new(), LanguageKey::JavaScript);
    let report = studio.execute_source("console.log('hi'); 2+2").unwrap();
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
}

#[test]
fn thrown_error_is_reported() {
    let mut studio = studio_with(Program::new(), LanguageKey::JavaScript);
    let report = studio.execute_source("throw new Error('boom')").unwrap();
    let ExecutionReport::Failed { message, .. } = &report else {
        panic!("expected failure, got {report:?}");
    };
    assert!(message.contains("boom"));
    insta::assert_json_snapshot!(report, @r#"
    {
      "status": "failed",
      "message": "boom",
      "trace": "Error: boom\n    at <anonymous> (line 1)"
    }
    "#);
}

#[test]
fn language_switch_re_derives_exactly_once() {
    let mut studio = studio_with(hello_program(), LanguageKey::JavaScript);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    studio.subscribe(move |snapshot| sink.borrow_mut().push((snapshot.language, snapshot.text.clone())));

    let before = studio.controller().derivations();
    studio.set_language(LanguageKey::Lua).unwrap();
    assert_eq!(studio.controller().derivations(), before + 1);
    assert_eq!(
        seen.borrow().as_slice(),
        &[(LanguageKey::Lua, "print('hello')\n".to_string())]
    );
    assert_eq!(studio.current_source_text(), "print('hello')\n");
}

#[test]
fn edits_flow_through_to_execution() {
    let mut studio = studio_with(Program::new(), LanguageKey::JavaScript);
    studio.load(hello_program()).unwrap();
    let report = studio.execute().unwrap();
    assert_eq!(report.render(), "🔔 Alert: hello");

    studio
        .edit(|program| {
            program.stacks[0].body.push(Stmt::print(Expr::number(2.0)));
            Ok(())
        })
        .unwrap();
    let report = studio.execute().unwrap();
    assert_eq!(report.render(), "🔔 Alert: hello\n🔔 Alert: 2");
}

proptest! {
    #[test]
    fn every_switch_derives_once_and_text_is_stable(
        switches in prop::collection::vec(prop::sample::select(LanguageKey::ALL.to_vec()), 0..12),
    ) {
        let mut studio = studio_with(hello_program(), LanguageKey::JavaScript);
        let start = studio.controller().derivations();
        for (i, language) in switches.iter().enumerate() {
            studio.set_language(*language).unwrap();
            prop_assert_eq!(studio.controller().derivations(), start + i as u64 + 1);
            let text = studio.current_source_text().to_string();
            prop_assert_eq!(studio.current_source_text(), text.as_str());
            prop_assert_eq!(studio.language(), *language);
            prop_assert!(text.contains("hello"));
        }
    }
}
