//! Integration tests for multi-target emission.
//!
//! Tests cover:
//! - Every registered language emits for empty and non-trivial programs
//! - Language-specific shape of the same program
//! - Determinism and totality over generated programs (proptest)
//! - Controller re-derivation through a live workspace

use std::cell::RefCell;
use std::rc::Rc;

use blocklab_codegen::{CodegenController, EmitterRegistry};
use blocklab_core::block::{ArithmeticOp, CompareOp, LogicOp, LoopMode, RoundOp, SingleOp, TextCase};
use blocklab_core::{BlockId, BlockStack, Expr, LanguageKey, Procedure, Program, Stmt, Workspace};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn greeting_program() -> Program {
    Program {
        variables: vec!["name".into()],
        procedures: vec![Procedure {
            id: BlockId(1),
            name: "double".into(),
            params: vec!["n".into()],
            body: vec![],
            returns: Some(Expr::arithmetic(
                ArithmeticOp::Multiply,
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
    }
}

// ---------------------------------------------------------------------------
// Fixed programs
// ---------------------------------------------------------------------------

#[test]
fn every_language_emits_empty_program() {
    let registry = EmitterRegistry::with_builtin();
    for language in LanguageKey::ALL {
        let text = registry.emit(&Program::new(), language).unwrap();
        if language == LanguageKey::Dart {
            assert_eq!(text, "main() {\n}\n");
        } else {
            assert_eq!(text, "", "{language} should emit nothing for an empty program");
        }
    }
}

#[test]
fn every_language_emits_greeting() {
    let registry = EmitterRegistry::with_builtin();
    let program = greeting_program();
    for language in LanguageKey::ALL {
        let text = registry.emit(&program, language).unwrap();
        assert!(text.contains("Ada"), "{language}: {text}");
        assert!(text.contains("double"), "{language}: {text}");
        assert!(text.ends_with('\n'), "{language}: {text}");
    }
}

#[test]
fn languages_have_their_own_shape() {
    let registry = EmitterRegistry::with_builtin();
    let program = greeting_program();

    let js = registry.emit(&program, LanguageKey::JavaScript).unwrap();
    assert!(js.starts_with("var name, n;\n"));
    assert!(js.contains("function double(n) {\n  return n * 2;\n}\n"));
    assert!(js.contains("window.alert('Hello, ' + String(name));"));

    let python = registry.emit(&program, LanguageKey::Python).unwrap();
    assert!(python.contains("def double(n):\n"));
    assert!(python.contains("for count in range(2):\n  print(double(21))\n"));

    let php = registry.emit(&program, LanguageKey::Php).unwrap();
    assert!(php.contains("function double($n) {"));
    assert!(php.contains("$name = 'Ada';"));

    let lua = registry.emit(&program, LanguageKey::Lua).unwrap();
    assert!(lua.contains("function double(n)\n"));
    assert!(lua.contains("for count = 1, 2 do\n"));

    let dart = registry.emit(&program, LanguageKey::Dart).unwrap();
    assert!(dart.contains("dynamic double2(n) {"));
    assert!(dart.contains("main() {\n"));
}

#[test]
fn reserved_words_are_renamed() {
    let registry = EmitterRegistry::with_builtin();
    let program = Program {
        stacks: vec![BlockStack {
            id: BlockId(1),
            body: vec![Stmt::set("for", Expr::number(1.0))],
        }],
        ..Program::default()
    };
    let js = registry.emit(&program, LanguageKey::JavaScript).unwrap();
    insta::assert_snapshot!(js.lines().last().unwrap_or_default(), @"for2 = 1;");
    let lua = registry.emit(&program, LanguageKey::Lua).unwrap();
    assert!(!lua.contains("\nfor = 1"));
}

#[test]
fn controller_follows_workspace_edits() {
    let mut workspace = Workspace::new();
    let controller = Rc::new(RefCell::new(
        CodegenController::new(EmitterRegistry::with_builtin(), LanguageKey::Lua).unwrap(),
    ));
    let texts = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&texts);
    controller
        .borrow_mut()
        .subscribe(move |snapshot| sink.borrow_mut().push(snapshot.text.clone()));

    workspace.add_stack(vec![Stmt::print(Expr::number(1.0))]).unwrap();
    controller.borrow_mut().on_program_changed(&workspace).unwrap();
    workspace.add_stack(vec![Stmt::print(Expr::number(2.0))]).unwrap();
    controller.borrow_mut().on_program_changed(&workspace).unwrap();

    assert_eq!(*texts.borrow(), vec!["print(1)\n", "print(1)\n\nprint(2)\n"]);
    assert_eq!(controller.borrow().derivations(), 2);
}

// ---------------------------------------------------------------------------
// Generated programs
// ---------------------------------------------------------------------------

const NAMES: &[&str] = &["a", "b", "item", "list", "for", "2nd", "my var"];

fn name() -> impl Strategy<Value = String> {
    prop::sample::select(NAMES).prop_map(str::to_string)
}

fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec!['a', 'Z', ' ', '\'', '"', '\\', '$', '\n', '%', '#']),
        0..6,
    )
    .prop_map(|chars| chars.into_iter().collect())
}

fn expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        (-1000i32..1000).prop_map(|n| Expr::number(f64::from(n))),
        (-1000i32..1000).prop_map(|n| Expr::number(f64::from(n) / 8.0)),
        text().prop_map(Expr::text),
        any::<bool>().prop_map(Expr::boolean),
        name().prop_map(Expr::var),
        Just(Expr::RandomFraction),
    ];
    leaf.prop_recursive(4, 24, 3, |inner| {
        prop_oneof![
            (
                prop::sample::select(vec![
                    ArithmeticOp::Add,
                    ArithmeticOp::Subtract,
                    ArithmeticOp::Multiply,
                    ArithmeticOp::Divide,
                    ArithmeticOp::Power,
                ]),
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, l, r)| Expr::arithmetic(op, l, r)),
            (
                prop::sample::select(vec![CompareOp::Eq, CompareOp::Lt, CompareOp::Gte]),
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, l, r)| Expr::compare(op, l, r)),
            (
                prop::sample::select(vec![LogicOp::And, LogicOp::Or]),
                inner.clone(),
                inner.clone()
            )
                .prop_map(|(op, l, r)| Expr::logic(op, l, r)),
            inner.clone().prop_map(|e| Expr::Not { operand: Box::new(e) }),
            (
                prop::sample::select(vec![SingleOp::Negate, SingleOp::Abs, SingleOp::Root]),
                inner.clone()
            )
                .prop_map(|(op, e)| Expr::Single {
                    op,
                    operand: Box::new(e)
                }),
            inner.clone().prop_map(|e| Expr::Round {
                op: RoundOp::Round,
                operand: Box::new(e)
            }),
            inner.clone().prop_map(|e| Expr::ChangeCase {
                case: TextCase::Title,
                text: Box::new(e)
            }),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Expr::join),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Expr::list),
            (inner.clone(), inner.clone()).prop_map(|(l, i)| Expr::ListGet {
                list: Box::new(l),
                index: Box::new(i)
            }),
            (inner.clone(), inner.clone(), inner.clone()).prop_map(|(c, a, b)| Expr::Ternary {
                condition: Box::new(c),
                then: Box::new(a),
                otherwise: Box::new(b)
            }),
            (inner.clone(), inner).prop_map(|(a, b)| Expr::RandomInt {
                from: Box::new(a),
                to: Box::new(b)
            }),
        ]
    })
}

fn simple_stmt() -> impl Strategy<Value = Stmt> {
    prop_oneof![
        (name(), expr()).prop_map(|(n, e)| Stmt::set(n, e)),
        (name(), expr()).prop_map(|(name, delta)| Stmt::ChangeBy { name, delta }),
        (name(), expr()).prop_map(|(name, text)| Stmt::Append { name, text }),
        expr().prop_map(Stmt::print),
    ]
}

fn stmt() -> impl Strategy<Value = Stmt> {
    simple_stmt().prop_recursive(3, 16, 3, |inner| {
        let body = prop::collection::vec(inner, 0..3);
        let loop_body = (body.clone(), prop::option::of(prop::sample::select(vec![
            Stmt::Break,
            Stmt::Continue,
        ])))
            .prop_map(|(mut body, control)| {
                body.extend(control);
                body
            });
        prop_oneof![
            (expr(), body.clone(), prop::option::of(body.clone())).prop_map(
                |(condition, then, otherwise)| Stmt::If {
                    branches: vec![blocklab_core::Branch {
                        condition,
                        body: then
                    }],
                    otherwise,
                }
            ),
            (expr(), loop_body.clone()).prop_map(|(times, body)| Stmt::repeat(times, body)),
            (expr(), loop_body.clone()).prop_map(|(condition, body)| Stmt::While {
                mode: LoopMode::Until,
                condition,
                body,
            }),
            (name(), expr(), expr(), expr(), loop_body.clone()).prop_map(
                |(name, from, to, by, body)| Stmt::For {
                    name,
                    from,
                    to,
                    by,
                    body,
                }
            ),
            (name(), expr(), loop_body).prop_map(|(name, list, body)| Stmt::ForEach {
                name,
                list,
                body,
            }),
        ]
    })
}

fn program() -> impl Strategy<Value = Program> {
    prop::collection::vec(prop::collection::vec(stmt(), 0..4), 0..3).prop_map(|stacks| Program {
        variables: Vec::new(),
        procedures: Vec::new(),
        stacks: stacks
            .into_iter()
            .enumerate()
            .map(|(i, body)| BlockStack {
                id: BlockId(i as u32 + 1),
                body,
            })
            .collect(),
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn emission_is_total_and_deterministic(program in program()) {
        let registry = EmitterRegistry::with_builtin();
        for language in LanguageKey::ALL {
            let first = registry.emit(&program, language);
            prop_assert!(first.is_ok(), "{} failed: {:?}", language, first);
            let second = registry.emit(&program.clone(), language).unwrap();
            prop_assert_eq!(first.unwrap(), second);
        }
    }

    #[test]
    fn helpers_are_defined_once(program in program()) {
        let registry = EmitterRegistry::with_builtin();
        let js = registry.emit(&program, LanguageKey::JavaScript).unwrap();
        prop_assert!(js.matches("function mathRandomInt(").count() <= 1);
        prop_assert!(js.matches("function textToTitleCase(").count() <= 1);
        let python = registry.emit(&program, LanguageKey::Python).unwrap();
        prop_assert!(python.matches("import random\n").count() <= 1);
    }
}
