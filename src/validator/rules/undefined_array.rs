//! Rule: Undefined Array
//!
//! Reports an error when an array is referenced before its ARRAY statement.
//! Arrays are defined in program order, so a reference in a statement that
//! precedes the definition is an error even if the ARRAY statement follows.
//!
//! # Examples
//!
//! ```sas
//! * Error: q is defined after its first use;
//! q{1} = 0;
//! array q{3} q1-q3;
//! ```

use std::collections::HashSet;

use crate::executor::errors::StepError;
use crate::executor::types::ast::{DataStep, DoKind, Expr, PutItem, Span, Stmt, Target};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct UndefinedArrayRule;

impl ValidationRule for UndefinedArrayRule {
    fn id(&self) -> &'static str {
        "undefined-array"
    }

    fn description(&self) -> &'static str {
        "Arrays must be defined before they are referenced"
    }

    fn validate(&self, step: &DataStep, _context: &ValidationContext) -> Vec<ValidationError> {
        let mut walker = Walker {
            defined: HashSet::new(),
            errors: Vec::new(),
            rule_id: self.id(),
        };
        walker.block(&step.body);
        walker.errors
    }
}

struct Walker {
    /// Upper-cased names of arrays defined so far
    defined: HashSet<String>,
    errors: Vec<ValidationError>,
    rule_id: &'static str,
}

impl Walker {
    fn check(&mut self, array: &str, span: Span) {
        if !self.defined.contains(&array.to_ascii_uppercase()) {
            self.errors.push(ValidationError::error(
                span,
                StepError::UndefinedArray {
                    name: array.to_string(),
                },
                self.rule_id,
            ));
        }
    }

    fn block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Array { name, .. } => {
                self.defined.insert(name.to_ascii_uppercase());
            }
            Stmt::Assign {
                target,
                value,
                span,
            } => {
                if let Target::Element { array, indices } = target {
                    self.check(array, *span);
                    indices.iter().for_each(|i| self.expr(i));
                }
                self.expr(value);
            }
            Stmt::Sum { value, .. } => self.expr(value),
            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                self.expr(test);
                self.block(then_s);
                if let Some(else_s) = else_s {
                    self.block(else_s);
                }
            }
            Stmt::SubsetIf { test, .. } => self.expr(test),
            Stmt::Block { body, .. } => self.block(body),
            Stmt::DoLoop { kind, body, .. } => {
                match kind {
                    DoKind::Counted {
                        start,
                        end,
                        step,
                        while_test,
                        until_test,
                        ..
                    } => {
                        self.expr(start);
                        self.expr(end);
                        for expr in [step, while_test, until_test].into_iter().flatten() {
                            self.expr(expr);
                        }
                    }
                    DoKind::List { values, .. } => values.iter().for_each(|v| self.expr(v)),
                    DoKind::While { test } | DoKind::Until { test } => self.expr(test),
                }
                self.block(body);
            }
            Stmt::Put { items, .. } => {
                for item in items {
                    if let PutItem::Value { expr } = item {
                        self.expr(expr);
                    }
                }
            }
            _ => {}
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Element {
                array,
                indices,
                span,
            } => {
                self.check(array, *span);
                indices.iter().for_each(|i| self.expr(i));
            }
            Expr::ArrayAll { array, span } => self.check(array, *span),
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::In { operand, list, .. } => {
                self.expr(operand);
                list.iter().for_each(|item| self.expr(item));
            }
            Expr::Call { name, args, span } => {
                let array_fn = ["DIM", "LBOUND", "HBOUND"]
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(name));
                for (i, arg) in args.iter().enumerate() {
                    match arg {
                        Expr::Ident { name, .. } if array_fn && i == 0 => self.check(name, *span),
                        _ => self.expr(arg),
                    }
                }
            }
            Expr::LitNum { .. } | Expr::LitStr { .. } | Expr::LitMissing { .. } | Expr::Ident { .. } => {}
        }
    }
}
