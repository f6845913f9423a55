//! Tests for SET: concatenation, interleaving, dataset options and flags

use maplit::hashmap;

use super::helpers::*;
use crate::executor::types::{BinaryOp, Expr, InputBinding, InputSpec, Stmt, Value};
use crate::executor::{ErrorKind, StepError};
use crate::types::Column;

fn keyed(name: &str, rows: &[(f64, &str)]) -> crate::types::Dataset {
    dataset(
        name,
        vec![Column::num("k"), Column::char("src").with_length(4)],
        rows.iter().map(|(k, s)| vec![num(*k), text(s)]).collect(),
    )
}

/* ===================== Concatenation ===================== */

#[test]
fn test_concatenation_order() {
    let store = store(hashmap! {
        "a" => numbers("a", "x", &[1.0, 2.0]),
        "b" => numbers("b", "x", &[10.0, 20.0, 30.0]),
    });
    let s = step(&["out"], set(vec![input("a"), input("b")]), vec![]);

    let outcome = run(&s, &store);
    assert_eq!(outcome.stats.iterations, 5);
    assert_eq!(
        column(&outcome, "out", "x"),
        nums(&[1.0, 2.0, 10.0, 20.0, 30.0])
    );
}

#[test]
fn test_columns_missing_from_current_input() {
    let store = store(hashmap! {
        "a" => numbers("a", "x", &[1.0]),
        "b" => numbers("b", "y", &[2.0]),
    });
    let s = step(&["out"], set(vec![input("a"), input("b")]), vec![]);

    let outcome = run(&s, &store);
    assert_eq!(outcome.dataset("out").unwrap().column_names(), vec!["x", "y"]);
    assert_eq!(column(&outcome, "out", "x"), vec![num(1.0), Value::MissingNum]);
    assert_eq!(column(&outcome, "out", "y"), vec![Value::MissingNum, num(2.0)]);
}

#[test]
fn test_in_and_end_flags() {
    let store = store(hashmap! {
        "a" => numbers("a", "x", &[1.0, 2.0]),
        "b" => numbers("b", "x", &[3.0]),
    });
    let s = step(
        &["out"],
        Some(InputBinding::Set {
            datasets: vec![
                InputSpec {
                    in_var: Some("ina".into()),
                    ..input("a")
                },
                input("b"),
            ],
            by: vec![],
            end: Some("eof".into()),
        }),
        vec![
            Stmt::assign("from_a", Expr::var("ina")),
            Stmt::assign("at_end", Expr::var("eof")),
        ],
    );

    let outcome = run(&s, &store);
    assert_eq!(column(&outcome, "out", "from_a"), nums(&[1.0, 1.0, 0.0]));
    assert_eq!(column(&outcome, "out", "at_end"), nums(&[0.0, 0.0, 1.0]));
    // Flag variables are never written out
    assert_eq!(
        outcome.dataset("out").unwrap().column_names(),
        vec!["x", "from_a", "at_end"]
    );
}

#[test]
fn test_input_keep_and_rename() {
    let store = store(hashmap! {
        "in" => dataset(
            "in",
            vec![Column::num("a"), Column::num("b"), Column::num("c")],
            vec![vec![num(1.0), num(2.0), num(3.0)]],
        )
    });
    let s = step(
        &["out"],
        set(vec![InputSpec {
            keep: Some(vec!["a".into(), "c".into()]),
            rename: vec![("c".into(), "z".into())],
            ..input("in")
        }]),
        vec![],
    );

    let outcome = run(&s, &store);
    let out = outcome.dataset("out").unwrap();
    assert_eq!(out.column_names(), vec!["a", "z"]);
    assert_eq!(out.rows[0], nums(&[1.0, 3.0]));
}

#[test]
fn test_input_drop_of_unknown_column() {
    let store = store(hashmap! { "in" => numbers("in", "x", &[1.0]) });
    let s = step(
        &["out"],
        set(vec![InputSpec {
            drop: vec!["nope".into()],
            ..input("in")
        }]),
        vec![],
    );

    let failure = run_err(&s, &store);
    assert!(matches!(failure.error, StepError::UnknownColumn { .. }));
    assert_eq!(failure.row, None);
}

#[test]
fn test_dataset_not_found() {
    let s = step(&["out"], set(vec![input("ghost")]), vec![]);
    let failure = run_err(&s, &store(hashmap! {}));
    assert_eq!(failure.kind(), ErrorKind::Configuration);
    assert_eq!(
        failure.error,
        StepError::DatasetNotFound {
            name: "ghost".into()
        }
    );
}

#[test]
fn test_empty_input_produces_no_rows() {
    let store = store(hashmap! { "in" => numbers("in", "x", &[]) });
    let s = step(&["out"], set(vec![input("in")]), vec![]);

    let outcome = run(&s, &store);
    assert_eq!(outcome.stats.iterations, 0);
    let out = outcome.dataset("out").unwrap();
    assert!(out.is_empty());
    assert_eq!(out.column_names(), vec!["x"]);
}

/* ===================== Interleaving ===================== */

#[test]
fn test_set_by_interleaves_and_prefers_earlier_dataset() {
    let store = store(hashmap! {
        "a" => keyed("a", &[(1.0, "a"), (3.0, "a")]),
        "b" => keyed("b", &[(2.0, "b"), (3.0, "b")]),
    });
    let s = step(&["out"], set_by(vec![input("a"), input("b")], &["k"]), vec![]);

    let outcome = run(&s, &store);
    assert_eq!(column(&outcome, "out", "k"), nums(&[1.0, 2.0, 3.0, 3.0]));
    assert_eq!(
        column(&outcome, "out", "src"),
        vec![text("a"), text("b"), text("a"), text("b")]
    );
}

#[test]
fn test_first_and_last_flags_on_set_by() {
    let store = store(hashmap! {
        "in" => keyed("in", &[(1.0, "p"), (1.0, "q"), (2.0, "r")]),
    });
    let s = step(
        &["out"],
        set_by(vec![input("in")], &["k"]),
        vec![
            Stmt::assign("f", Expr::var("first.k")),
            Stmt::assign("l", Expr::var("LAST.K")),
        ],
    );

    let outcome = run(&s, &store);
    assert_eq!(column(&outcome, "out", "f"), nums(&[1.0, 0.0, 1.0]));
    assert_eq!(column(&outcome, "out", "l"), nums(&[0.0, 1.0, 1.0]));
}

#[test]
fn test_group_count_with_first_flag() {
    // Count rows per group and emit one row per group
    let store = store(hashmap! {
        "in" => keyed("in", &[(1.0, "p"), (1.0, "q"), (2.0, "r"), (4.0, "s"), (4.0, "t")]),
    });
    let s = step(
        &["out"],
        set_by(vec![input("in")], &["k"]),
        vec![
            Stmt::if_then(Expr::var("first.k"), vec![Stmt::assign("n", Expr::num(0.0))]),
            Stmt::sum("n", Expr::num(1.0)),
            Stmt::if_then(Expr::var("last.k"), vec![Stmt::output()]),
            Stmt::keep(vec!["k", "n"]),
        ],
    );

    let outcome = run(&s, &store);
    assert_eq!(column(&outcome, "out", "k"), nums(&[1.0, 2.0, 4.0]));
    assert_eq!(column(&outcome, "out", "n"), nums(&[2.0, 1.0, 2.0]));
}

#[test]
fn test_unsorted_input_fails() {
    let store = store(hashmap! { "in" => keyed("in", &[(2.0, "x"), (1.0, "y")]) });
    let s = step(&["out"], set_by(vec![input("in")], &["k"]), vec![]);

    let failure = run_err(&s, &store);
    assert_eq!(
        failure.error,
        StepError::UnsortedInput {
            dataset: "in".into(),
            row: 2
        }
    );
}

#[test]
fn test_descending_by_key() {
    let store = store(hashmap! { "in" => keyed("in", &[(3.0, "x"), (1.0, "y")]) });
    let s = step(
        &["out"],
        Some(InputBinding::Set {
            datasets: vec![input("in")],
            by: vec![crate::executor::types::ByKey {
                name: "k".into(),
                descending: true,
            }],
            end: None,
        }),
        vec![Stmt::assign(
            "big",
            Expr::binary(BinaryOp::Gt, Expr::var("k"), Expr::num(2.0)),
        )],
    );

    let outcome = run(&s, &store);
    assert_eq!(column(&outcome, "out", "big"), nums(&[1.0, 0.0]));
}
