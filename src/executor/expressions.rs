//! Expression evaluation
//!
//! Evaluates expression trees against the PDV. Missing operands propagate
//! through arithmetic without raising errors; type mixing follows the
//! configured strictness.

use std::cmp::Ordering;

use crate::config::{ArithmeticPolicy, MissingComparison, Strictness};

use super::errors::StepError;
use super::pdv::SlotId;
use super::types::values::{parse_number, render_number, ParsedNumber};
use super::types::{BinaryOp, Expr, UnaryOp, Value, VarType};
use super::ExecContext;

/// Evaluate an expression to a value
pub fn eval_expr(expr: &Expr, ctx: &mut ExecContext<'_>) -> Result<Value, StepError> {
    match expr {
        Expr::LitNum { v, .. } => Ok(Value::number(*v)),

        Expr::LitStr { v, .. } => Ok(Value::Str(v.clone())),

        Expr::LitMissing { .. } => Ok(Value::MissingNum),

        Expr::Ident { name, .. } => Ok(ctx.pdv.get(name)?.clone()),

        Expr::Element { array, indices, .. } => {
            let slot = resolve_element(array, indices, ctx)?;
            Ok(ctx.pdv.get_slot(slot).clone())
        }

        Expr::ArrayAll { array, .. } => Err(StepError::type_mismatch(format!(
            "OF {array}{{*}} is only allowed as a function argument"
        ))),

        Expr::Unary { op, operand, .. } => {
            let value = eval_expr(operand, ctx)?;
            eval_unary(*op, value, ctx)
        }

        Expr::Binary {
            op, left, right, ..
        } => match op {
            BinaryOp::And => {
                if !eval_expr(left, ctx)?.is_truthy() {
                    return Ok(Value::boolean(false));
                }
                Ok(Value::boolean(eval_expr(right, ctx)?.is_truthy()))
            }
            BinaryOp::Or => {
                if eval_expr(left, ctx)?.is_truthy() {
                    return Ok(Value::boolean(true));
                }
                Ok(Value::boolean(eval_expr(right, ctx)?.is_truthy()))
            }
            _ => {
                let l = eval_expr(left, ctx)?;
                let r = eval_expr(right, ctx)?;
                eval_binary(*op, l, r, ctx)
            }
        },

        Expr::In { operand, list, .. } => {
            let value = eval_expr(operand, ctx)?;
            for item in list {
                let candidate = eval_expr(item, ctx)?;
                if compare(&value, &candidate, ctx)? == Some(Ordering::Equal) {
                    return Ok(Value::boolean(true));
                }
            }
            Ok(Value::boolean(false))
        }

        Expr::Call { name, args, .. } => eval_call(name, args, ctx),
    }
}

/// Resolve `array{i, ...}` to the aliased PDV slot
pub fn resolve_element(
    array: &str,
    indices: &[Expr],
    ctx: &mut ExecContext<'_>,
) -> Result<SlotId, StepError> {
    let mut subscripts = Vec::with_capacity(indices.len());
    for index in indices {
        let value = eval_expr(index, ctx)?;
        match to_number(value, ctx)? {
            Value::Num(v) => subscripts.push(v.trunc() as i64),
            _ => {
                return Err(StepError::bounds(array, "subscript is missing"));
            }
        }
    }
    ctx.arrays.at(array, &subscripts)
}

/* ===================== Coercion ===================== */

/// Convert to a number in a numeric context
pub fn to_number(value: Value, ctx: &mut ExecContext<'_>) -> Result<Value, StepError> {
    match value {
        Value::Num(_) | Value::MissingNum => Ok(value),
        Value::MissingStr => Ok(Value::MissingNum),
        Value::Str(s) => match ctx.pdv.strictness() {
            Strictness::Strict => Err(StepError::type_mismatch(format!(
                "character value '{}' used where a number is required",
                s.trim_end()
            ))),
            Strictness::Lenient => match parse_number(&s) {
                ParsedNumber::Number(v) => Ok(Value::Num(v)),
                ParsedNumber::Missing => Ok(Value::MissingNum),
                ParsedNumber::Invalid => {
                    ctx.pdv.note_invalid_data(s.trim_end());
                    Ok(Value::MissingNum)
                }
            },
        },
    }
}

/// Convert to text in a character context
pub fn to_text(value: Value, ctx: &ExecContext<'_>) -> Result<Value, StepError> {
    match value {
        Value::Str(_) | Value::MissingStr => Ok(value),
        Value::MissingNum => Ok(Value::MissingStr),
        Value::Num(v) => match ctx.pdv.strictness() {
            Strictness::Strict => Err(StepError::type_mismatch(format!(
                "numeric value {} used where text is required",
                render_number(v)
            ))),
            Strictness::Lenient => Ok(Value::Str(render_number(v))),
        },
    }
}

/* ===================== Operators ===================== */

fn eval_unary(op: UnaryOp, value: Value, ctx: &mut ExecContext<'_>) -> Result<Value, StepError> {
    match op {
        UnaryOp::Not => Ok(Value::boolean(!value.is_truthy())),
        UnaryOp::Plus => to_number(value, ctx),
        UnaryOp::Neg => match to_number(value, ctx)? {
            Value::Num(v) => Ok(Value::Num(-v)),
            _ => {
                ctx.stats.missing_values += 1;
                Ok(Value::MissingNum)
            }
        },
    }
}

fn eval_binary(
    op: BinaryOp,
    left: Value,
    right: Value,
    ctx: &mut ExecContext<'_>,
) -> Result<Value, StepError> {
    if op.is_arithmetic() {
        let l = to_number(left, ctx)?;
        let r = to_number(right, ctx)?;
        return match (l, r) {
            (Value::Num(a), Value::Num(b)) => arithmetic(op, a, b, ctx),
            _ => {
                ctx.stats.missing_values += 1;
                Ok(Value::MissingNum)
            }
        };
    }

    if op.is_comparison() {
        return Ok(match compare(&left, &right, ctx)? {
            None => Value::MissingNum,
            Some(ordering) => Value::boolean(match op {
                BinaryOp::Eq => ordering == Ordering::Equal,
                BinaryOp::Ne => ordering != Ordering::Equal,
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }),
        });
    }

    match op {
        BinaryOp::Concat => {
            let l = to_text(left, ctx)?;
            let r = to_text(right, ctx)?;
            let mut joined = String::new();
            if let Value::Str(s) = l {
                joined.push_str(&s);
            }
            if let Value::Str(s) = r {
                joined.push_str(&s);
            }
            Ok(Value::Str(joined))
        }
        BinaryOp::Min | BinaryOp::Max => {
            // Missing sorts lowest, so `. >< 1` is missing and `. <> 1` is 1
            let l = to_number(left, ctx)?;
            let r = to_number(right, ctx)?;
            let ordering = l.collate(&r);
            let pick_left = match op {
                BinaryOp::Min => ordering != Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(if pick_left { l } else { r })
        }
        _ => Err(StepError::type_mismatch(format!("unsupported operator {op:?}"))),
    }
}

fn arithmetic(op: BinaryOp, a: f64, b: f64, ctx: &mut ExecContext<'_>) -> Result<Value, StepError> {
    if op == BinaryOp::Div && b == 0.0 {
        return arithmetic_fault("division by zero", ctx);
    }
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a.powf(b),
    };
    if result.is_finite() {
        Ok(Value::Num(result))
    } else {
        arithmetic_fault("result is not a finite number", ctx)
    }
}

fn arithmetic_fault(message: &str, ctx: &mut ExecContext<'_>) -> Result<Value, StepError> {
    match ctx.env.options.arithmetic {
        ArithmeticPolicy::Missing => {
            tracing::warn!("{message}; result set to missing");
            ctx.stats.missing_values += 1;
            Ok(Value::MissingNum)
        }
        ArithmeticPolicy::Error => Err(StepError::Arithmetic {
            message: message.to_string(),
        }),
    }
}

/// Order two values for comparison operators.
///
/// `None` means the comparison itself is missing, which only happens in
/// propagate mode.
fn compare(
    left: &Value,
    right: &Value,
    ctx: &mut ExecContext<'_>,
) -> Result<Option<Ordering>, StepError> {
    let (l, r) = match (left.var_type(), right.var_type()) {
        (VarType::Num, VarType::Num) | (VarType::Char, VarType::Char) => {
            (left.clone(), right.clone())
        }
        _ if left.is_missing() && right.is_missing() => {
            (Value::MissingNum, Value::MissingNum)
        }
        _ => (to_number(left.clone(), ctx)?, to_number(right.clone(), ctx)?),
    };

    if ctx.env.options.missing_comparison == MissingComparison::Propagate
        && (l.is_missing() || r.is_missing())
    {
        return Ok(None);
    }
    Ok(Some(l.collate(&r)))
}

/* ===================== Calls ===================== */

fn eval_call(name: &str, args: &[Expr], ctx: &mut ExecContext<'_>) -> Result<Value, StepError> {
    let upper = name.to_ascii_uppercase();
    if matches!(upper.as_str(), "DIM" | "LBOUND" | "HBOUND") {
        return array_bound(&upper, args, ctx);
    }

    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Expr::ArrayAll { array, .. } => {
                let def = ctx
                    .arrays
                    .get(array)
                    .ok_or_else(|| StepError::UndefinedArray {
                        name: array.clone(),
                    })?;
                values.extend(def.members.iter().map(|&id| ctx.pdv.get_slot(id).clone()));
            }
            _ => values.push(eval_expr(arg, ctx)?),
        }
    }

    ctx.env
        .functions
        .call(&upper, &values)
        .map_err(|e| StepError::Function {
            name: upper,
            message: e.to_string(),
        })
}

/// `DIM(arr)`, `DIM(arr, n)` and the `LBOUND`/`HBOUND` forms
fn array_bound(name: &str, args: &[Expr], ctx: &mut ExecContext<'_>) -> Result<Value, StepError> {
    let array = match args.first() {
        Some(Expr::Ident { name: array, .. }) | Some(Expr::ArrayAll { array, .. }) => array.clone(),
        _ => {
            return Err(StepError::Function {
                name: name.to_string(),
                message: "first argument must be an array name".into(),
            })
        }
    };

    let dimension = match args.get(1) {
        None => 1,
        Some(expr) => {
            let value = eval_expr(expr, ctx)?;
            match to_number(value, ctx)? {
                Value::Num(v) if v >= 1.0 => v.trunc() as usize,
                _ => {
                    return Err(StepError::Function {
                        name: name.to_string(),
                        message: "dimension must be a positive number".into(),
                    })
                }
            }
        }
    };

    let def = ctx
        .arrays
        .get(&array)
        .ok_or_else(|| StepError::UndefinedArray {
            name: array.clone(),
        })?;
    let bound = match name {
        "DIM" => def.dim(dimension),
        "LBOUND" => def.lbound(dimension),
        _ => def.hbound(dimension),
    };
    bound
        .map(|b| Value::Num(b as f64))
        .ok_or_else(|| StepError::bounds(&array, format!("array has no dimension {dimension}")))
}
