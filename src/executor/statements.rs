//! Statement execution
//!
//! One exhaustive dispatch over the statement kinds. Declarative statements
//! (`RETAIN`, `ARRAY`, `LENGTH`, ...) did their work in the static pass and
//! are no-ops here.

use super::errors::StepError;
use super::expressions::{eval_expr, resolve_element, to_number};
use super::types::{Control, DoKind, Expr, PutItem, Stmt, Target, Value};
use super::ExecContext;

/// Execute statements in order until one diverts control
pub fn execute_block(body: &[Stmt], ctx: &mut ExecContext<'_>) -> Result<Control, StepError> {
    for stmt in body {
        let control = execute_stmt(stmt, ctx)?;
        if control != Control::None {
            return Ok(control);
        }
    }
    Ok(Control::None)
}

pub fn execute_stmt(stmt: &Stmt, ctx: &mut ExecContext<'_>) -> Result<Control, StepError> {
    match stmt {
        Stmt::Assign { target, value, .. } => {
            let value = eval_expr(value, ctx)?;
            match target {
                Target::Var { name } => ctx.pdv.set(name, value)?,
                Target::Element { array, indices } => {
                    let slot = resolve_element(array, indices, ctx)?;
                    ctx.pdv.set_slot(slot, value)?;
                }
            }
            Ok(Control::None)
        }

        Stmt::Sum { var, value, .. } => {
            execute_sum(var, value, ctx)?;
            Ok(Control::None)
        }

        Stmt::If {
            test,
            then_s,
            else_s,
            ..
        } => {
            if eval_expr(test, ctx)?.is_truthy() {
                execute_block(then_s, ctx)
            } else if let Some(else_s) = else_s {
                execute_block(else_s, ctx)
            } else {
                Ok(Control::None)
            }
        }

        Stmt::SubsetIf { test, .. } => {
            if eval_expr(test, ctx)?.is_truthy() {
                Ok(Control::None)
            } else {
                Ok(Control::Delete)
            }
        }

        Stmt::Block { body, .. } => execute_block(body, ctx),

        Stmt::DoLoop { kind, body, .. } => execute_loop(kind, body, ctx),

        Stmt::Leave { .. } => Ok(Control::Leave),

        Stmt::Continue { .. } => Ok(Control::Continue),

        Stmt::Output { datasets, .. } => {
            ctx.sink.record(datasets, &ctx.pdv)?;
            Ok(Control::None)
        }

        Stmt::Delete { .. } => Ok(Control::Delete),

        Stmt::Return { .. } => Ok(Control::Return),

        Stmt::Stop { .. } => Ok(Control::Stop),

        Stmt::Put { items, .. } => {
            execute_put(items, ctx)?;
            Ok(Control::None)
        }

        // Handled by the static pass and the output sink
        Stmt::Retain { .. }
        | Stmt::Array { .. }
        | Stmt::Length { .. }
        | Stmt::Format { .. }
        | Stmt::Informat { .. }
        | Stmt::Label { .. }
        | Stmt::Drop { .. }
        | Stmt::Keep { .. } => Ok(Control::None),
    }
}

/// `var + expr;`: a missing addend counts as zero
fn execute_sum(var: &str, value: &Expr, ctx: &mut ExecContext<'_>) -> Result<(), StepError> {
    let addend = eval_expr(value, ctx)?;
    let addend = to_number(addend, ctx)?.as_num().unwrap_or(0.0);
    let current = ctx.pdv.get(var)?.as_num().unwrap_or(0.0);
    ctx.pdv.set(var, Value::number(current + addend))
}

fn execute_put(items: &[PutItem], ctx: &mut ExecContext<'_>) -> Result<(), StepError> {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item {
            PutItem::Text { text } => parts.push(text.clone()),
            PutItem::Named { name } => {
                let value = ctx.pdv.get(name)?;
                parts.push(format!("{name}={value}"));
            }
            PutItem::Value { expr } => parts.push(eval_expr(expr, ctx)?.to_string()),
        }
    }
    let line = parts.join(" ");
    tracing::info!(target: "datastep::put", "{}", line);
    ctx.log.push(line);
    Ok(())
}

/* ===================== Loops ===================== */

/// What a loop does after running its body once
enum Pass {
    Next,
    Exit,
    Propagate(Control),
}

fn run_body(body: &[Stmt], ctx: &mut ExecContext<'_>) -> Result<Pass, StepError> {
    Ok(match execute_block(body, ctx)? {
        Control::None | Control::Continue => Pass::Next,
        Control::Leave => Pass::Exit,
        other => Pass::Propagate(other),
    })
}

/// Counts passes through one loop execution against the configured cap
struct Guard {
    passes: u64,
    limit: Option<u64>,
}

impl Guard {
    fn new(ctx: &ExecContext<'_>) -> Self {
        Self {
            passes: 0,
            limit: ctx.env.options.max_loop_iterations,
        }
    }

    fn tick(&mut self) -> Result<(), StepError> {
        self.passes += 1;
        match self.limit {
            Some(limit) if self.passes > limit => Err(StepError::IterationLimit { limit }),
            _ => Ok(()),
        }
    }
}

fn execute_loop(kind: &DoKind, body: &[Stmt], ctx: &mut ExecContext<'_>) -> Result<Control, StepError> {
    let mut guard = Guard::new(ctx);

    match kind {
        DoKind::Counted {
            var,
            start,
            end,
            step,
            while_test,
            until_test,
        } => {
            let start = loop_bound(start, "start", ctx)?;
            let end = loop_bound(end, "end", ctx)?;
            let step = match step {
                Some(expr) => loop_bound(expr, "BY", ctx)?,
                None => 1.0,
            };
            if step == 0.0 {
                return Err(StepError::InvalidLoop {
                    message: "BY increment is zero".into(),
                });
            }

            ctx.pdv.set(var, Value::Num(start))?;
            loop {
                // The body may assign the index; its current value decides
                let index = ctx.pdv.get(var)?.as_num().ok_or_else(|| StepError::InvalidLoop {
                    message: format!("index variable {var} became missing"),
                })?;
                let in_range = if step > 0.0 { index <= end } else { index >= end };
                if !in_range {
                    break;
                }
                if let Some(test) = while_test {
                    if !eval_expr(test, ctx)?.is_truthy() {
                        break;
                    }
                }

                guard.tick()?;
                match run_body(body, ctx)? {
                    Pass::Next => {}
                    Pass::Exit => break,
                    Pass::Propagate(control) => return Ok(control),
                }

                if let Some(test) = until_test {
                    if eval_expr(test, ctx)?.is_truthy() {
                        break;
                    }
                }

                let index = ctx.pdv.get(var)?.as_num().unwrap_or(index);
                ctx.pdv.set(var, Value::number(index + step))?;
            }
        }

        DoKind::List { var, values } => {
            for expr in values {
                let value = eval_expr(expr, ctx)?;
                ctx.pdv.set(var, value)?;
                guard.tick()?;
                match run_body(body, ctx)? {
                    Pass::Next => {}
                    Pass::Exit => break,
                    Pass::Propagate(control) => return Ok(control),
                }
            }
        }

        DoKind::While { test } => loop {
            if !eval_expr(test, ctx)?.is_truthy() {
                break;
            }
            guard.tick()?;
            match run_body(body, ctx)? {
                Pass::Next => {}
                Pass::Exit => break,
                Pass::Propagate(control) => return Ok(control),
            }
        },

        DoKind::Until { test } => loop {
            guard.tick()?;
            match run_body(body, ctx)? {
                Pass::Next => {}
                Pass::Exit => break,
                Pass::Propagate(control) => return Ok(control),
            }
            if eval_expr(test, ctx)?.is_truthy() {
                break;
            }
        },
    }

    Ok(Control::None)
}

/// Evaluate a counted-loop bound once; missing is fatal
fn loop_bound(expr: &Expr, what: &str, ctx: &mut ExecContext<'_>) -> Result<f64, StepError> {
    let value = eval_expr(expr, ctx)?;
    to_number(value, ctx)?
        .as_num()
        .ok_or_else(|| StepError::InvalidLoop {
            message: format!("{what} value is missing"),
        })
}
