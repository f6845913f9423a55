//! Numeric functions
//!
//! Statistics functions skip missing arguments; everything else returns
//! missing when an argument is missing or outside the function's domain.

use super::{arity, num_arg, FunctionError};
use crate::executor::types::Value;

/// Non-missing numeric arguments
fn present(args: &[Value]) -> Result<Vec<f64>, FunctionError> {
    let mut values = Vec::with_capacity(args.len());
    for i in 0..args.len() {
        if let Some(v) = num_arg(args, i)? {
            values.push(v);
        }
    }
    Ok(values)
}

/// Apply a one-argument function, propagating missing
fn unary(args: &[Value], f: impl Fn(f64) -> Option<f64>) -> Result<Value, FunctionError> {
    arity(args, 1, 1)?;
    Ok(match num_arg(args, 0)? {
        Some(v) => f(v).map(Value::number).unwrap_or(Value::MissingNum),
        None => Value::MissingNum,
    })
}

pub fn sum(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    let values = present(args)?;
    if values.is_empty() {
        return Ok(Value::MissingNum);
    }
    Ok(Value::number(values.iter().sum()))
}

pub fn mean(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    let values = present(args)?;
    if values.is_empty() {
        return Ok(Value::MissingNum);
    }
    Ok(Value::number(values.iter().sum::<f64>() / values.len() as f64))
}

pub fn min(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    Ok(present(args)?
        .into_iter()
        .reduce(f64::min)
        .map(Value::Num)
        .unwrap_or(Value::MissingNum))
}

pub fn max(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    Ok(present(args)?
        .into_iter()
        .reduce(f64::max)
        .map(Value::Num)
        .unwrap_or(Value::MissingNum))
}

pub fn n(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    Ok(Value::Num(present(args)?.len() as f64))
}

pub fn nmiss(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    let missing = args.iter().filter(|v| v.is_missing()).count();
    Ok(Value::Num(missing as f64))
}

pub fn coalesce(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    Ok(present(args)?
        .first()
        .map(|v| Value::Num(*v))
        .unwrap_or(Value::MissingNum))
}

pub fn abs(args: &[Value]) -> Result<Value, FunctionError> {
    unary(args, |v| Some(v.abs()))
}

pub fn int(args: &[Value]) -> Result<Value, FunctionError> {
    unary(args, |v| Some(v.trunc()))
}

pub fn floor(args: &[Value]) -> Result<Value, FunctionError> {
    unary(args, |v| Some(v.floor()))
}

pub fn ceil(args: &[Value]) -> Result<Value, FunctionError> {
    unary(args, |v| Some(v.ceil()))
}

pub fn sqrt(args: &[Value]) -> Result<Value, FunctionError> {
    unary(args, |v| (v >= 0.0).then(|| v.sqrt()))
}

pub fn exp(args: &[Value]) -> Result<Value, FunctionError> {
    unary(args, |v| Some(v.exp()))
}

pub fn log(args: &[Value]) -> Result<Value, FunctionError> {
    unary(args, |v| (v > 0.0).then(|| v.ln()))
}

/// `ROUND(x [, unit])`, rounding half away from zero to a multiple of unit
pub fn round(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, 2)?;
    let unit = if args.len() == 2 {
        match num_arg(args, 1)? {
            Some(u) if u > 0.0 => u,
            Some(_) => return Err(FunctionError::argument(2, "must be positive")),
            None => return Ok(Value::MissingNum),
        }
    } else {
        1.0
    };
    Ok(match num_arg(args, 0)? {
        Some(v) => {
            let rounded = (v / unit).round() * unit;
            // Clean up binary noise such as 0.30000000000000004
            let digits = (-unit.log10().floor()).max(0.0) as i32;
            let scale = 10f64.powi(digits);
            Value::number((rounded * scale).round() / scale)
        }
        None => Value::MissingNum,
    })
}

/// `MOD(a, b)`: remainder with the sign of `a`
pub fn modulo(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 2, 2)?;
    Ok(match (num_arg(args, 0)?, num_arg(args, 1)?) {
        (Some(_), Some(b)) if b == 0.0 => Value::MissingNum,
        (Some(a), Some(b)) => Value::number(a % b),
        _ => Value::MissingNum,
    })
}
