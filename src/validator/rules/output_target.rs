//! Rule: Output Target
//!
//! Reports an error when `OUTPUT` names a dataset that is not on the DATA
//! statement.
//!
//! # Examples
//!
//! ```sas
//! data big small;
//!   set scores;
//!   if score > 90 then output huge;  * Error: huge is not an output;
//! run;
//! ```

use crate::executor::errors::StepError;
use crate::executor::types::ast::{DataStep, Stmt};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct OutputTargetRule;

impl ValidationRule for OutputTargetRule {
    fn id(&self) -> &'static str {
        "output-target"
    }

    fn description(&self) -> &'static str {
        "OUTPUT may only name datasets listed on the DATA statement"
    }

    fn validate(&self, step: &DataStep, _context: &ValidationContext) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check_block(step, &step.body, &mut errors, self.id());
        errors
    }
}

fn check_block(
    step: &DataStep,
    body: &[Stmt],
    errors: &mut Vec<ValidationError>,
    rule_id: &'static str,
) {
    for stmt in body {
        match stmt {
            Stmt::Output { datasets, span } => {
                for name in datasets {
                    let declared = step
                        .outputs
                        .iter()
                        .any(|o| o.name.eq_ignore_ascii_case(name));
                    if !declared {
                        errors.push(ValidationError::error(
                            *span,
                            StepError::UnknownOutput { name: name.clone() },
                            rule_id,
                        ));
                    }
                }
            }
            Stmt::If { then_s, else_s, .. } => {
                check_block(step, then_s, errors, rule_id);
                if let Some(else_s) = else_s {
                    check_block(step, else_s, errors, rule_id);
                }
            }
            Stmt::Block { body, .. } | Stmt::DoLoop { body, .. } => {
                check_block(step, body, errors, rule_id)
            }
            _ => {}
        }
    }
}
