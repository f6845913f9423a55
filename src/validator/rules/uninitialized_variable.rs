//! Rule: Uninitialized Variable
//!
//! Warns when a variable is read but nothing ever gives it a value: it is
//! not an input column, never assigned, not retained, not a loop index and
//! not an array member. Such a variable is missing on every row.
//!
//! # Examples
//!
//! ```sas
//! * Warning: rate is never assigned;
//! cost = price * rate;
//! ```

use std::collections::HashSet;

use crate::executor::arrays::{element_count, resolve_bounds};
use crate::executor::types::ast::{
    ArrayBound, DataStep, DoKind, Expr, PutItem, Span, Stmt, Target,
};

use super::super::{ValidationContext, ValidationError, ValidationRule};

pub struct UninitializedVariableRule;

impl ValidationRule for UninitializedVariableRule {
    fn id(&self) -> &'static str {
        "uninitialized-variable"
    }

    fn description(&self) -> &'static str {
        "Variables that are read should be given a value somewhere"
    }

    fn validate(&self, step: &DataStep, context: &ValidationContext) -> Vec<ValidationError> {
        let mut usage = Usage::default();
        usage.block(&step.body);

        let mut warned = HashSet::new();
        let mut warnings = Vec::new();
        for (name, span) in usage.reads {
            let key = name.to_ascii_uppercase();
            if context.is_provided(&name) || usage.written.contains(&key) {
                continue;
            }
            if warned.insert(key) {
                warnings.push(ValidationError::warning(
                    span,
                    format!("Variable '{}' is uninitialized", name),
                    self.id(),
                ));
            }
        }
        warnings
    }
}

#[derive(Default)]
struct Usage {
    /// Upper-cased names that receive a value somewhere in the step
    written: HashSet<String>,
    /// Reads in program order
    reads: Vec<(String, Span)>,
}

impl Usage {
    fn write(&mut self, name: &str) {
        self.written.insert(name.to_ascii_uppercase());
    }

    fn block(&mut self, body: &[Stmt]) {
        for stmt in body {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                match target {
                    Target::Var { name } => self.write(name),
                    Target::Element { indices, .. } => indices.iter().for_each(|i| self.expr(i)),
                }
                self.expr(value);
            }
            Stmt::Sum { var, value, .. } => {
                self.write(var);
                self.expr(value);
            }
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
                        var,
                        start,
                        end,
                        step,
                        while_test,
                        until_test,
                    } => {
                        self.write(var);
                        self.expr(start);
                        self.expr(end);
                        for expr in [step, while_test, until_test].into_iter().flatten() {
                            self.expr(expr);
                        }
                    }
                    DoKind::List { var, values } => {
                        self.write(var);
                        values.iter().for_each(|v| self.expr(v));
                    }
                    DoKind::While { test } | DoKind::Until { test } => self.expr(test),
                }
                self.block(body);
            }
            Stmt::Retain { vars, .. } => {
                for item in vars {
                    self.write(&item.name);
                }
            }
            Stmt::Array {
                name,
                bounds,
                members,
                ..
            } => {
                // Element writes go through the array, so members count as set
                if members.is_empty() {
                    self.write_auto_members(name, bounds);
                } else {
                    members.iter().for_each(|m| self.write(m));
                }
            }
            Stmt::Put { items, .. } => {
                for item in items {
                    match item {
                        PutItem::Text { .. } => {}
                        PutItem::Named { name } => self.reads.push((name.clone(), stmt.span())),
                        PutItem::Value { expr } => self.expr(expr),
                    }
                }
            }
            _ => {}
        }
    }

    fn write_auto_members(&mut self, name: &str, bounds: &[ArrayBound]) {
        if let Ok(resolved) = resolve_bounds(name, bounds, 0) {
            for i in 1..=element_count(&resolved) {
                self.write(&format!("{name}{i}"));
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Ident { name, span } => self.reads.push((name.clone(), *span)),
            Expr::Element { indices, .. } => indices.iter().for_each(|i| self.expr(i)),
            Expr::Unary { operand, .. } => self.expr(operand),
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::In { operand, list, .. } => {
                self.expr(operand);
                list.iter().for_each(|item| self.expr(item));
            }
            Expr::Call { name, args, .. } => {
                let array_fn = ["DIM", "LBOUND", "HBOUND"]
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(name));
                let skip = usize::from(array_fn);
                args.iter().skip(skip).for_each(|arg| self.expr(arg));
            }
            Expr::LitNum { .. }
            | Expr::LitStr { .. }
            | Expr::LitMissing { .. }
            | Expr::ArrayAll { .. } => {}
        }
    }
}
