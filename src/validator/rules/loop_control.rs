//! Rule: Loop Control
//!
//! Reports an error when `LEAVE` or `CONTINUE` appears outside an iterative
//! DO loop. A plain `DO; ... END;` group is not a loop.
//!
//! # Examples
//!
//! ```sas
//! * Error: nothing to leave;
//! if x > 1 then leave;
//! ```
//!
//! ```sas
//! * OK;
//! do i = 1 to 10;
//!   if i > 3 then leave;
//! end;
//! ```

use crate::executor::errors::StepError;
use crate::executor::types::ast::{DataStep, Stmt};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct LoopControlRule;

impl ValidationRule for LoopControlRule {
    fn id(&self) -> &'static str {
        "loop-control"
    }

    fn description(&self) -> &'static str {
        "LEAVE and CONTINUE must be inside an iterative DO loop"
    }

    fn validate(&self, step: &DataStep, _context: &ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_block(&step.body, false, &mut errors, self.id());
        errors
    }
}

fn check_block(
    body: &[Stmt],
    in_loop: bool,
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    for stmt in body {
        check_stmt(stmt, in_loop, errors, rule_id);
    }
}

fn check_stmt(stmt: &Stmt, in_loop: bool, errors: &mut Vec<ValidationError>, rule_id: &'static str) {
    match stmt {
        Stmt::Leave { span } if !in_loop => errors.push(ValidationError::error(
            *span,
            StepError::Scoping { statement: "LEAVE" },
            rule_id,
        )),
        Stmt::Continue { span } if !in_loop => errors.push(ValidationError::error(
            *span,
            StepError::Scoping {
                statement: "CONTINUE",
            },
            rule_id,
        )),
        Stmt::If { then_s, else_s, .. } => {
            check_block(then_s, in_loop, errors, rule_id);
            if let Some(else_s) = else_s {
                check_block(else_s, in_loop, errors, rule_id);
            }
        }
        Stmt::Block { body, .. } => check_block(body, in_loop, errors, rule_id),
        Stmt::DoLoop { body, .. } => check_block(body, true, errors, rule_id),
        _ => {}
    }
}
