//! Runtime value types
//!
//! A DATA step has exactly two value types, numeric and character, and each
//! has its own missing sentinel. Missing values are ordinary values: they flow
//! through arithmetic and comparisons without raising errors.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Storage length of every numeric variable, in bytes
pub const NUM_LENGTH: usize = 8;

/// Length given to character variables whose length cannot be inferred
pub const DEFAULT_CHAR_LENGTH: usize = 200;

/// Length of character array members declared without an explicit length
pub const DEFAULT_ARRAY_CHAR_LENGTH: usize = 8;

/* ===================== Variable Type ===================== */

/// Declared type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Num,
    Char,
}

impl VarType {
    /// The missing sentinel for this type
    pub fn missing(self) -> Value {
        match self {
            VarType::Num => Value::MissingNum,
            VarType::Char => Value::MissingStr,
        }
    }

    pub fn default_length(self) -> usize {
        match self {
            VarType::Num => NUM_LENGTH,
            VarType::Char => DEFAULT_CHAR_LENGTH,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Num => write!(f, "numeric"),
            VarType::Char => write!(f, "character"),
        }
    }
}

/* ===================== Values ===================== */

/// A typed value held by a PDV slot or an output row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Value {
    Num(f64),
    Str(String),
    MissingNum,
    MissingStr,
}

impl Value {
    /// Build a numeric value, mapping NaN and infinities to missing
    pub fn number(v: f64) -> Self {
        if v.is_finite() {
            Value::Num(v)
        } else {
            Value::MissingNum
        }
    }

    /// Numeric boolean: 1 for true, 0 for false
    pub fn boolean(b: bool) -> Self {
        Value::Num(if b { 1.0 } else { 0.0 })
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn var_type(&self) -> VarType {
        match self {
            Value::Num(_) | Value::MissingNum => VarType::Num,
            Value::Str(_) | Value::MissingStr => VarType::Char,
        }
    }

    /// A blank string counts as missing, as do both sentinels
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Num(_) => false,
            Value::Str(s) => s.trim_end_matches(' ').is_empty(),
            Value::MissingNum | Value::MissingStr => true,
        }
    }

    /// The number held, if this is a non-missing numeric value
    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(v) => Some(*v),
            _ => None,
        }
    }

    /// Character content with trailing blanks removed; missing text is empty
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.trim_end_matches(' ')),
            Value::MissingStr => Some(""),
            _ => None,
        }
    }

    /// Condition truth: a non-missing, non-zero number
    pub fn is_truthy(&self) -> bool {
        matches!(self, Value::Num(v) if *v != 0.0)
    }

    /// Collating order used for BY keys and comparisons.
    ///
    /// Numeric missing sorts below every number. Text compares with trailing
    /// blanks ignored, so missing text equals the empty string. Values of
    /// different types order numeric first.
    pub fn collate(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Value::MissingNum, Value::MissingNum) => Ordering::Equal,
            (Value::MissingNum, Value::Num(_)) => Ordering::Less,
            (Value::Num(_), Value::MissingNum) => Ordering::Greater,
            (a, b) => match (a.as_text(), b.as_text()) {
                (Some(x), Some(y)) => x.cmp(y),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(v) => write!(f, "{}", render_number(*v)),
            Value::Str(s) => write!(f, "{}", s.trim_end_matches(' ')),
            Value::MissingNum => write!(f, "."),
            Value::MissingStr => Ok(()),
        }
    }
}

/* ===================== Conversions ===================== */

/// Render a number the way numeric-to-character conversion does: integral
/// values without a fraction, everything else in shortest round-trip form.
pub fn render_number(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Outcome of reading text as a number
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedNumber {
    Number(f64),
    /// Blank text or a lone `.`
    Missing,
    Invalid,
}

/// Parse text as a number
pub fn parse_number(text: &str) -> ParsedNumber {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "." {
        return ParsedNumber::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => ParsedNumber::Number(v),
        _ => ParsedNumber::Invalid,
    }
}
