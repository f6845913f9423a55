//! Built-in function library
//!
//! Functions are resolved by upper-case name through a [`FunctionRegistry`].
//! [`Builtins`] routes each name to its implementation in `math`, `text` or
//! `date`. Hosts can wrap or replace it to add their own functions.

pub mod date;
pub mod math;
pub mod text;

use thiserror::Error;

use super::types::values::{parse_number, ParsedNumber};
use super::types::{Value, VarType};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FunctionError {
    #[error("unknown function")]
    Unknown,

    #[error("expects {expected} arguments, got {found}")]
    Arity { expected: String, found: usize },

    #[error("argument {position} {message}")]
    Argument { position: usize, message: String },
}

impl FunctionError {
    pub fn argument(position: usize, message: impl Into<String>) -> Self {
        FunctionError::Argument {
            position,
            message: message.into(),
        }
    }
}

/// Resolves function names to implementations
pub trait FunctionRegistry {
    /// Call `name` (upper case) with evaluated arguments
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError>;

    /// Result type, used to type assignment targets before the step runs
    fn return_type(&self, name: &str) -> Option<VarType>;
}

/* ===================== Builtins ===================== */

#[derive(Debug, Clone, Copy, Default)]
pub struct Builtins;

impl FunctionRegistry for Builtins {
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, FunctionError> {
        match name {
            // Descriptive statistics
            "SUM" => math::sum(args),
            "MEAN" => math::mean(args),
            "MIN" => math::min(args),
            "MAX" => math::max(args),
            "N" => math::n(args),
            "NMISS" => math::nmiss(args),

            // Arithmetic
            "ABS" => math::abs(args),
            "INT" => math::int(args),
            "ROUND" => math::round(args),
            "FLOOR" => math::floor(args),
            "CEIL" => math::ceil(args),
            "SQRT" => math::sqrt(args),
            "EXP" => math::exp(args),
            "LOG" => math::log(args),
            "MOD" => math::modulo(args),

            // Missing values
            "MISSING" => {
                arity(args, 1, 1)?;
                Ok(Value::boolean(args[0].is_missing()))
            }
            "COALESCE" => math::coalesce(args),
            "COALESCEC" => text::coalescec(args),

            // Text
            "UPCASE" => text::upcase(args),
            "LOWCASE" => text::lowcase(args),
            "TRIM" => text::trim(args),
            "STRIP" => text::strip(args),
            "LEFT" => text::left(args),
            "LENGTH" => text::length(args),
            "SUBSTR" => text::substr(args),
            "INDEX" => text::index(args),
            "SCAN" => text::scan(args),
            "CATS" => text::cats(args),
            "CATX" => text::catx(args),

            // Dates
            "MDY" => date::mdy(args),
            "YEAR" => date::year(args),
            "MONTH" => date::month(args),
            "DAY" => date::day(args),
            "WEEKDAY" => date::weekday(args),
            "TODAY" => date::today(args),

            _ => Err(FunctionError::Unknown),
        }
    }

    fn return_type(&self, name: &str) -> Option<VarType> {
        match name {
            "COALESCEC" | "UPCASE" | "LOWCASE" | "TRIM" | "STRIP" | "LEFT" | "SUBSTR"
            | "SCAN" | "CATS" | "CATX" => Some(VarType::Char),
            "SUM" | "MEAN" | "MIN" | "MAX" | "N" | "NMISS" | "ABS" | "INT" | "ROUND"
            | "FLOOR" | "CEIL" | "SQRT" | "EXP" | "LOG" | "MOD" | "MISSING" | "COALESCE"
            | "LENGTH" | "INDEX" | "MDY" | "YEAR" | "MONTH" | "DAY" | "WEEKDAY" | "TODAY"
            | "DIM" | "LBOUND" | "HBOUND" => Some(VarType::Num),
            _ => None,
        }
    }
}

/* ===================== Argument Helpers ===================== */

/// Check the argument count against an inclusive range
pub(crate) fn arity(args: &[Value], min: usize, max: usize) -> Result<(), FunctionError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else if max == usize::MAX {
            format!("at least {min}")
        } else {
            format!("{min} to {max}")
        };
        return Err(FunctionError::Arity {
            expected,
            found: args.len(),
        });
    }
    Ok(())
}

/// Read a numeric argument; `None` when missing. Text is parsed.
pub(crate) fn num_arg(args: &[Value], position: usize) -> Result<Option<f64>, FunctionError> {
    match &args[position] {
        Value::Num(v) => Ok(Some(*v)),
        Value::MissingNum | Value::MissingStr => Ok(None),
        Value::Str(s) => match parse_number(s) {
            ParsedNumber::Number(v) => Ok(Some(v)),
            ParsedNumber::Missing => Ok(None),
            ParsedNumber::Invalid => Err(FunctionError::argument(
                position + 1,
                format!("'{}' is not a number", s.trim_end()),
            )),
        },
    }
}

/// Read a text argument; numbers are rendered
pub(crate) fn text_arg(args: &[Value], position: usize) -> String {
    match &args[position] {
        Value::Str(s) => s.clone(),
        Value::MissingStr => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_function() {
        assert_eq!(Builtins.call("NOPE", &[]), Err(FunctionError::Unknown));
        assert_eq!(Builtins.return_type("NOPE"), None);
    }

    #[test]
    fn test_return_types() {
        assert_eq!(Builtins.return_type("SUBSTR"), Some(VarType::Char));
        assert_eq!(Builtins.return_type("LENGTH"), Some(VarType::Num));
    }

    #[test]
    fn test_missing_function() {
        assert_eq!(Builtins.call("MISSING", &[Value::text(" ")]), Ok(Value::Num(1.0)));
        assert_eq!(Builtins.call("MISSING", &[Value::Num(0.0)]), Ok(Value::Num(0.0)));
        assert!(matches!(
            Builtins.call("MISSING", &[]),
            Err(FunctionError::Arity { .. })
        ));
    }
}
