//! Tests for the semantic validation system

use super::*;
use crate::executor::types::{ArrayBound, BinaryOp, Expr, InputBinding, InputSpec, OutputSpec, Stmt};
use crate::types::{Column, Dataset};

// ============================================================================
// Helper Functions
// ============================================================================

fn step(outputs: &[&str], input: Option<InputBinding>, body: Vec<Stmt>) -> DataStep {
    DataStep {
        outputs: outputs
            .iter()
            .map(|name| OutputSpec {
                name: name.to_string(),
                ..OutputSpec::default()
            })
            .collect(),
        input,
        body,
    }
}

fn set_of(name: &str) -> Option<InputBinding> {
    Some(InputBinding::Set {
        datasets: vec![InputSpec {
            name: name.into(),
            ..InputSpec::default()
        }],
        by: vec![],
        end: None,
    })
}

fn store() -> DatasetStore {
    let mut store = DatasetStore::new();
    store.insert(Dataset::new("scores", vec![Column::num("score"), Column::char("name")]));
    store
}

/// Validate against the fixture store
fn validate(step: &DataStep) -> Vec<ValidationError> {
    let context = ValidationContext::for_step(step, &store());
    validate_step(step, &context)
}

/// Check if errors contain a specific rule
fn has_rule(errors: &[ValidationError], rule_id: &str) -> bool {
    errors.iter().any(|e| e.rule_id == rule_id)
}

/// Get errors for a specific rule
fn for_rule<'a>(errors: &'a [ValidationError], rule_id: &str) -> Vec<&'a ValidationError> {
    errors.iter().filter(|e| e.rule_id == rule_id).collect()
}

// ============================================================================
// Loop Control Tests
// ============================================================================

#[test]
fn test_leave_outside_loop() {
    let s = step(&["out"], None, vec![Stmt::if_then(Expr::num(1.0), vec![Stmt::leave()])]);

    let errors = validate(&s);
    let found = for_rule(&errors, "loop-control");
    assert_eq!(found.len(), 1);
    assert!(found[0].is_error());
    assert_eq!(
        found[0].cause,
        Some(StepError::Scoping { statement: "LEAVE" })
    );
}

#[test]
fn test_continue_in_plain_do_group() {
    let s = step(&["out"], None, vec![Stmt::block(vec![Stmt::cont()])]);
    assert!(has_rule(&validate(&s), "loop-control"));
}

#[test]
fn test_leave_inside_loop_ok() {
    let s = step(
        &["out"],
        None,
        vec![Stmt::do_to(
            "i",
            Expr::num(1.0),
            Expr::num(3.0),
            None,
            vec![Stmt::block(vec![Stmt::leave()])],
        )],
    );
    assert!(!has_rule(&validate(&s), "loop-control"));
}

// ============================================================================
// Output Target Tests
// ============================================================================

#[test]
fn test_output_to_unknown_dataset() {
    let s = step(
        &["big", "small"],
        set_of("scores"),
        vec![Stmt::output_to(vec!["small", "huge"])],
    );

    let errors = validate(&s);
    let found = for_rule(&errors, "output-target");
    assert_eq!(found.len(), 1);
    assert!(found[0].message.contains("huge"));
}

#[test]
fn test_output_names_are_case_insensitive() {
    let s = step(&["Big"], set_of("scores"), vec![Stmt::output_to(vec!["BIG"])]);
    assert!(!has_rule(&validate(&s), "output-target"));
}

// ============================================================================
// Undefined Array Tests
// ============================================================================

#[test]
fn test_array_used_before_definition() {
    let s = step(
        &["out"],
        None,
        vec![
            Stmt::assign_elem("q", vec![Expr::num(1.0)], Expr::num(0.0)),
            Stmt::array("q", vec![ArrayBound::extent(3)], vec![]),
        ],
    );

    let errors = validate(&s);
    assert_eq!(for_rule(&errors, "undefined-array").len(), 1);
}

#[test]
fn test_dim_of_unknown_array() {
    let s = step(
        &["out"],
        None,
        vec![Stmt::assign("n", Expr::call("dim", vec![Expr::var("nope")]))],
    );
    assert!(has_rule(&validate(&s), "undefined-array"));
}

#[test]
fn test_array_defined_first_ok() {
    let s = step(
        &["out"],
        None,
        vec![
            Stmt::array("q", vec![ArrayBound::extent(3)], vec![]),
            Stmt::assign("total", Expr::call("sum", vec![Expr::all("q")])),
            Stmt::assign("first", Expr::elem("Q", vec![Expr::num(1.0)])),
        ],
    );
    assert!(!has_rule(&validate(&s), "undefined-array"));
}

// ============================================================================
// Uninitialized Variable Tests
// ============================================================================

#[test]
fn test_uninitialized_variable_warns_once() {
    let s = step(
        &["out"],
        set_of("scores"),
        vec![
            Stmt::assign("a", Expr::binary(BinaryOp::Mul, Expr::var("score"), Expr::var("rate"))),
            Stmt::assign("b", Expr::var("rate")),
        ],
    );

    let errors = validate(&s);
    let found = for_rule(&errors, "uninitialized-variable");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].severity, Severity::Warning);
    assert!(found[0].message.contains("'rate'"));
}

#[test]
fn test_assigned_later_is_not_uninitialized() {
    // Retained values flow from a later assignment into the next iteration
    let s = step(
        &["out"],
        None,
        vec![
            Stmt::assign("prev_copy", Expr::var("prev")),
            Stmt::assign("prev", Expr::var("_N_")),
        ],
    );
    assert!(!has_rule(&validate(&s), "uninitialized-variable"));
}

#[test]
fn test_array_members_and_loop_index_are_initialized() {
    let s = step(
        &["out"],
        None,
        vec![
            Stmt::array("x", vec![ArrayBound::extent(2)], vec![]),
            Stmt::do_to(
                "i",
                Expr::num(1.0),
                Expr::call("dim", vec![Expr::var("x")]),
                None,
                vec![Stmt::assign_elem("x", vec![Expr::var("i")], Expr::var("i"))],
            ),
            Stmt::assign("y", Expr::var("x2")),
        ],
    );
    assert!(!has_rule(&validate(&s), "uninitialized-variable"));
}

// ============================================================================
// Check Step Tests
// ============================================================================

#[test]
fn test_check_step_returns_first_error() {
    let s = step(
        &["out"],
        None,
        vec![Stmt::output_to(vec!["elsewhere"]), Stmt::leave()],
    );
    let err = check_step(&s, &store()).unwrap_err();
    assert_eq!(
        err,
        StepError::Scoping { statement: "LEAVE" },
        "rules run in registration order"
    );
}

#[test]
fn test_check_step_ignores_warnings() {
    let s = step(&["out"], None, vec![Stmt::assign("y", Expr::var("x"))]);
    assert!(check_step(&s, &store()).is_ok());
}

#[test]
fn test_display_format() {
    let err = ValidationError::warning(Span::default(), "something", "some-rule");
    assert_eq!(err.to_string(), "warning at line 1, col 1: something [some-rule]");
}

#[test]
fn test_rules_are_registered() {
    let ids: Vec<_> = Validator::new().rules().map(|(id, _)| id).collect();
    assert_eq!(
        ids,
        vec![
            "loop-control",
            "output-target",
            "undefined-array",
            "uninitialized-variable"
        ]
    );
}
