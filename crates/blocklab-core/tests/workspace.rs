//! Integration tests for the workspace as a program source.
//!
//! Tests cover:
//! - Program documents as the CLI reads them
//! - Revision and notification bookkeeping seen through `ProgramSource`
//! - Arbitrary edit sequences never committing an invalid program (proptest)

use std::cell::RefCell;
use std::rc::Rc;

use blocklab_core::{BlockId, CoreError, Expr, LanguageKey, Program, ProgramSource, Stmt, Workspace};
use proptest::prelude::*;

#[test]
fn program_document_shape() {
    let mut workspace = Workspace::new();
    workspace.declare_variable("x").unwrap();
    workspace
        .add_stack(vec![
            Stmt::set("x", Expr::number(2.0)),
            Stmt::print(Expr::var("x")),
        ])
        .unwrap();
    insta::assert_json_snapshot!(workspace.program(), @r#"
    {
      "variables": [
        "x"
      ],
      "procedures": [],
      "stacks": [
        {
          "id": 1,
          "body": [
            {
              "block": "set",
              "name": "x",
              "value": {
                "block": "number",
                "value": 2.0
              }
            },
            {
              "block": "print",
              "value": {
                "block": "variable",
                "name": "x"
              }
            }
          ]
        }
      ]
    }
    "#);
}

#[test]
fn documents_round_trip_through_a_workspace() {
    let text = r#"{
        "variables": ["n"],
        "procedures": [{
            "id": 4, "name": "twice", "params": ["n"],
            "returns": { "block": "arithmetic", "op": "multiply",
                         "left": { "block": "variable", "name": "n" },
                         "right": { "block": "number", "value": 2 } }
        }],
        "stacks": [{ "id": 7, "body": [
            { "block": "print", "value": { "block": "call", "name": "twice", "args": [{ "block": "number", "value": 21 }] } }
        ] }]
    }"#;
    let program: Program = serde_json::from_str(text).unwrap();
    let mut workspace = Workspace::from_program(program.clone()).unwrap();
    assert_eq!(workspace.program(), &program);
    assert_eq!(workspace.revision(), 0);

    // New blocks are numbered after the highest loaded id.
    let id = workspace.add_stack(vec![]).unwrap();
    assert_eq!(id, BlockId(8));
}

#[test]
fn invalid_documents_are_refused() {
    let program: Program = serde_json::from_str(
        r#"{ "stacks": [{ "id": 1, "body": [{ "block": "call", "name": "missing", "args": [] }] }] }"#,
    )
    .unwrap();
    let err = Workspace::from_program(program).unwrap_err();
    assert!(matches!(err, CoreError::UnknownProcedure { .. }), "{err}");
}

#[test]
fn listeners_see_each_committed_revision() {
    let mut workspace = Workspace::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    workspace.subscribe(move |event| sink.borrow_mut().push(event.revision));

    workspace.declare_variable("a").unwrap();
    assert!(workspace.declare_variable("").is_err());
    let id = workspace.add_stack(vec![Stmt::print(Expr::text("hi"))]).unwrap();
    workspace.remove_block(id).unwrap();
    workspace.clear().unwrap();

    assert_eq!(*seen.borrow(), vec![1, 2, 3, 4]);
    assert_eq!(workspace.revision(), 4);
    assert!(workspace.program().is_empty());
}

#[test]
fn language_keys_parse_from_any_spelling() {
    for key in LanguageKey::ALL {
        assert_eq!(key.as_str().parse::<LanguageKey>().unwrap(), key);
        assert_eq!(key.display_name().parse::<LanguageKey>().unwrap(), key);
        assert_eq!(key.file_extension().parse::<LanguageKey>().unwrap(), key);
    }
    assert!("cobol".parse::<LanguageKey>().is_err());
}

#[derive(Debug, Clone)]
enum Op {
    Declare(String),
    AddPrint(String),
    AddBreak,
    Rename(String, String),
    Remove(u32),
    Clear,
}

fn name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", ""]).prop_map(str::to_string)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        name().prop_map(Op::Declare),
        name().prop_map(Op::AddPrint),
        Just(Op::AddBreak),
        (name(), name()).prop_map(|(a, b)| Op::Rename(a, b)),
        (0u32..6).prop_map(Op::Remove),
        Just(Op::Clear),
    ]
}

proptest! {
    #[test]
    fn edits_keep_the_program_valid(ops in prop::collection::vec(op(), 0..20)) {
        let mut workspace = Workspace::new();
        let mut committed = 0u64;
        for op in ops {
            let result = match op {
                Op::Declare(name) => workspace.declare_variable(&name).map(drop),
                Op::AddPrint(name) => workspace
                    .add_stack(vec![Stmt::set(name.clone(), Expr::number(1.0)), Stmt::print(Expr::var(name))])
                    .map(drop),
                Op::AddBreak => workspace.add_stack(vec![Stmt::Break]).map(drop),
                Op::Rename(from, to) => workspace.rename_variable(&from, &to),
                Op::Remove(id) => workspace.remove_block(BlockId(id)),
                Op::Clear => workspace.clear(),
            };
            if result.is_ok() {
                committed += 1;
            }
            prop_assert!(workspace.program().validate().is_ok());
            prop_assert_eq!(workspace.revision(), committed);
        }
    }
}
