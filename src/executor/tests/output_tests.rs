//! Tests for output timing, DELETE/RETURN/STOP and column projection

use maplit::hashmap;

use super::helpers::*;
use crate::config::EngineOptions;
use crate::executor::types::{BinaryOp, DataStep, Expr, OutputSpec, Stmt, Value};
use crate::executor::{StepEnv, StepError};

fn gt(name: &str, v: f64) -> Expr {
    Expr::binary(BinaryOp::Gt, Expr::var(name), Expr::num(v))
}

fn eq(name: &str, v: f64) -> Expr {
    Expr::binary(BinaryOp::Eq, Expr::var(name), Expr::num(v))
}

fn three() -> crate::store::DatasetStore {
    store(hashmap! { "in" => numbers("in", "x", &[1.0, 2.0, 3.0]) })
}

/* ===================== Timing ===================== */

#[test]
fn test_conditional_output() {
    // data out; set in; if x>1 then output; run;
    let s = step(
        &["out"],
        set(vec![input("in")]),
        vec![Stmt::if_then(gt("x", 1.0), vec![Stmt::output()])],
    );

    let outcome = run(&s, &three());
    assert_eq!(column(&outcome, "out", "x"), nums(&[2.0, 3.0]));
    assert!(outcome.dataset("out").unwrap().len() < outcome.stats.iterations);
}

#[test]
fn test_output_captures_pdv_at_that_moment() {
    let s = step(
        &["out"],
        set(vec![input("in")]),
        vec![
            Stmt::output(),
            Stmt::assign("x", Expr::binary(BinaryOp::Mul, Expr::var("x"), Expr::num(10.0))),
            Stmt::output(),
        ],
    );

    let outcome = run(&s, &three());
    assert_eq!(
        column(&outcome, "out", "x"),
        nums(&[1.0, 10.0, 2.0, 20.0, 3.0, 30.0])
    );
}

#[test]
fn test_output_to_named_datasets() {
    let s = step(
        &["big", "small"],
        set(vec![input("in")]),
        vec![Stmt::if_else(
            gt("x", 1.0),
            vec![Stmt::output_to(vec!["big"])],
            vec![Stmt::output_to(vec!["small"])],
        )],
    );

    let outcome = run(&s, &three());
    assert_eq!(column(&outcome, "big", "x"), nums(&[2.0, 3.0]));
    assert_eq!(column(&outcome, "small", "x"), nums(&[1.0]));
    let names: Vec<&str> = outcome.datasets.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["big", "small"]);
}

#[test]
fn test_implicit_output_goes_to_every_dataset() {
    let s = step(&["a", "b"], set(vec![input("in")]), vec![]);
    let outcome = run(&s, &three());
    assert_eq!(outcome.dataset("a").unwrap().len(), 3);
    assert_eq!(outcome.dataset("b").unwrap().len(), 3);
}

#[test]
fn test_delete_and_subsetting_if_suppress_output() {
    let with_delete = step(
        &["out"],
        set(vec![input("in")]),
        vec![Stmt::if_then(eq("x", 2.0), vec![Stmt::delete()])],
    );
    let outcome = run(&with_delete, &three());
    assert_eq!(column(&outcome, "out", "x"), nums(&[1.0, 3.0]));

    let subset = step(&["out"], set(vec![input("in")]), vec![Stmt::subset_if(gt("x", 1.0))]);
    let outcome = run(&subset, &three());
    assert_eq!(column(&outcome, "out", "x"), nums(&[2.0, 3.0]));
}

#[test]
fn test_return_still_outputs() {
    let s = step(
        &["out"],
        set(vec![input("in")]),
        vec![
            Stmt::if_then(eq("x", 2.0), vec![Stmt::ret()]),
            Stmt::assign("y", Expr::num(1.0)),
        ],
    );

    let outcome = run(&s, &three());
    assert_eq!(
        column(&outcome, "out", "y"),
        vec![num(1.0), Value::MissingNum, num(1.0)]
    );
}

#[test]
fn test_stop_ends_step() {
    let s = step(
        &["out"],
        set(vec![input("in")]),
        vec![Stmt::if_then(eq("x", 2.0), vec![Stmt::stop()])],
    );
    let outcome = run(&s, &three());
    assert_eq!(column(&outcome, "out", "x"), nums(&[1.0]));
    assert_eq!(outcome.stats.iterations, 2);
}

#[test]
fn test_stop_keeps_explicit_output_of_same_iteration() {
    let s = step(
        &["out"],
        set(vec![input("in")]),
        vec![
            Stmt::output(),
            Stmt::if_then(eq("x", 2.0), vec![Stmt::stop()]),
        ],
    );
    let outcome = run(&s, &three());
    assert_eq!(column(&outcome, "out", "x"), nums(&[1.0, 2.0]));
}

/* ===================== Projection ===================== */

#[test]
fn test_column_order_is_first_reference() {
    let s = step(
        &["out"],
        set(vec![input("in")]),
        vec![
            Stmt::assign("z", Expr::num(1.0)),
            Stmt::assign("y", Expr::num(2.0)),
            Stmt::assign("x", Expr::num(0.0)),
        ],
    );
    let outcome = run(&s, &three());
    assert_eq!(outcome.dataset("out").unwrap().column_names(), vec!["x", "z", "y"]);
}

#[test]
fn test_keep_and_drop_statements() {
    let s = step(
        &["out"],
        set(vec![input("in")]),
        vec![
            Stmt::assign("y", Expr::num(1.0)),
            Stmt::assign("z", Expr::num(2.0)),
            Stmt::drop(vec!["y"]),
        ],
    );
    let outcome = run(&s, &three());
    assert_eq!(outcome.dataset("out").unwrap().column_names(), vec!["x", "z"]);

    let s = step(
        &["out"],
        set(vec![input("in")]),
        vec![Stmt::assign("y", Expr::num(1.0)), Stmt::keep(vec!["y"])],
    );
    let outcome = run(&s, &three());
    assert_eq!(outcome.dataset("out").unwrap().column_names(), vec!["y"]);
}

#[test]
fn test_output_dataset_options() {
    let s = DataStep {
        outputs: vec![
            OutputSpec {
                name: "renamed".into(),
                rename: vec![("x".into(), "value".into())],
                ..OutputSpec::default()
            },
            OutputSpec {
                name: "only_y".into(),
                keep: Some(vec!["y".into()]),
                ..OutputSpec::default()
            },
        ],
        input: set(vec![input("in")]),
        body: vec![Stmt::assign("y", Expr::binary(BinaryOp::Add, Expr::var("x"), Expr::num(1.0)))],
    };

    let outcome = run(&s, &three());
    assert_eq!(
        outcome.dataset("renamed").unwrap().column_names(),
        vec!["value", "y"]
    );
    assert_eq!(column(&outcome, "renamed", "value"), nums(&[1.0, 2.0, 3.0]));
    assert_eq!(column(&outcome, "only_y", "y"), nums(&[2.0, 3.0, 4.0]));
}

#[test]
fn test_output_column_metadata() {
    let s = step(
        &["out"],
        None,
        vec![
            Stmt::length("code", true, 4),
            Stmt::assign("code", Expr::str("abcdef")),
            Stmt::Label {
                labels: vec![("code".into(), "Short code".into())],
                span: Default::default(),
            },
        ],
    );
    let outcome = run(&s, &store(hashmap! {}));
    let out = outcome.dataset("out").unwrap();
    let code = out.column("code").unwrap();
    assert_eq!(code.length, Some(4));
    assert_eq!(code.label.as_deref(), Some("Short code"));
    assert_eq!(out.rows[0], vec![text("abcd")]);
}

#[test]
fn test_unknown_output_target() {
    let s = step(&["out"], set(vec![input("in")]), vec![Stmt::output_to(vec!["other"])]);
    let failure = run_err(&s, &three());
    assert_eq!(failure.error, StepError::UnknownOutput { name: "other".into() });
}

/* ===================== Store ===================== */

#[test]
fn test_store_commits_outputs_only_on_success() {
    let mut store = three();
    let env = StepEnv::new(EngineOptions::default());

    let failing = step(
        &["out"],
        set(vec![input("in")]),
        vec![Stmt::assign_elem("nope", vec![Expr::num(1.0)], Expr::num(1.0))],
    );
    assert!(store.run_step(&failing, &env).is_err());
    assert!(!store.contains("out"));

    let ok = step(&["out"], set(vec![input("in")]), vec![Stmt::subset_if(gt("x", 1.0))]);
    store.run_step(&ok, &env).unwrap();
    assert_eq!(store.get("out").unwrap().len(), 2);

    // A later step reads the committed output
    let chained = step(&["again"], set(vec![input("OUT")]), vec![]);
    let outcome = store.run_step(&chained, &env).unwrap();
    assert_eq!(column(&outcome, "again", "x"), nums(&[2.0, 3.0]));
}
