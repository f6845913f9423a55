//! Character functions
//!
//! Positions are 1-based. Numeric arguments are rendered before use.

use super::{arity, num_arg, text_arg, FunctionError};
use crate::executor::types::Value;

/// Delimiters `SCAN` uses when none are given
const SCAN_DELIMITERS: &str = " !$%&()*+,-./;<^|";

fn text_result(s: String) -> Value {
    if s.is_empty() {
        Value::MissingStr
    } else {
        Value::Str(s)
    }
}

pub fn upcase(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, 1)?;
    Ok(text_result(text_arg(args, 0).to_uppercase()))
}

pub fn lowcase(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, 1)?;
    Ok(text_result(text_arg(args, 0).to_lowercase()))
}

pub fn trim(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, 1)?;
    Ok(text_result(text_arg(args, 0).trim_end_matches(' ').to_string()))
}

pub fn strip(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, 1)?;
    Ok(text_result(text_arg(args, 0).trim_matches(' ').to_string()))
}

pub fn left(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, 1)?;
    Ok(text_result(text_arg(args, 0).trim_start_matches(' ').to_string()))
}

/// Length without trailing blanks; 1 for blank text
pub fn length(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, 1)?;
    let s = text_arg(args, 0);
    let n = s.trim_end_matches(' ').chars().count().max(1);
    Ok(Value::Num(n as f64))
}

/// `SUBSTR(s, position [, length])`
pub fn substr(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 2, 3)?;
    let s: Vec<char> = text_arg(args, 0).chars().collect();

    let Some(position) = num_arg(args, 1)? else {
        return Ok(Value::MissingStr);
    };
    let position = position.trunc();
    if position < 1.0 {
        return Err(FunctionError::argument(2, "must be at least 1"));
    }
    let start = position as usize - 1;
    if start >= s.len() {
        return Ok(Value::MissingStr);
    }

    let end = if args.len() == 3 {
        match num_arg(args, 2)? {
            Some(len) if len < 0.0 => return Err(FunctionError::argument(3, "must not be negative")),
            Some(len) => (start + len.trunc() as usize).min(s.len()),
            None => s.len(),
        }
    } else {
        s.len()
    };
    Ok(text_result(s[start..end].iter().collect()))
}

/// `INDEX(s, excerpt)`: 1-based position of the first occurrence, or 0
pub fn index(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 2, 2)?;
    let haystack = text_arg(args, 0);
    let needle = text_arg(args, 1);
    let needle = needle.trim_end_matches(' ');
    if needle.is_empty() {
        return Ok(Value::Num(0.0));
    }
    let position = haystack
        .find(needle)
        .map(|byte| haystack[..byte].chars().count() + 1)
        .unwrap_or(0);
    Ok(Value::Num(position as f64))
}

/// `SCAN(s, n [, delimiters])`; negative `n` counts from the right
pub fn scan(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 2, 3)?;
    let s = text_arg(args, 0);
    let delimiters = if args.len() == 3 {
        text_arg(args, 2)
    } else {
        SCAN_DELIMITERS.to_string()
    };

    let Some(n) = num_arg(args, 1)? else {
        return Ok(Value::MissingStr);
    };
    let n = n.trunc() as i64;

    let words: Vec<&str> = s
        .split(|c: char| delimiters.contains(c))
        .filter(|w| !w.is_empty())
        .collect();

    let word = match n {
        0 => return Err(FunctionError::argument(2, "must not be zero")),
        n if n > 0 => words.get(n as usize - 1),
        n => words.len().checked_sub(n.unsigned_abs() as usize).and_then(|i| words.get(i)),
    };
    Ok(text_result(word.map(|w| w.to_string()).unwrap_or_default()))
}

/// Concatenate with leading and trailing blanks removed
pub fn cats(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    let joined: String = (0..args.len())
        .filter(|&i| !args[i].is_missing())
        .map(|i| text_arg(args, i).trim_matches(' ').to_string())
        .collect();
    Ok(text_result(joined))
}

/// `CATX(separator, ...)`: stripped, non-blank items joined by the separator
pub fn catx(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 2, usize::MAX)?;
    let separator = text_arg(args, 0);
    let items: Vec<String> = (1..args.len())
        .filter(|&i| !args[i].is_missing())
        .map(|i| text_arg(args, i).trim_matches(' ').to_string())
        .collect();
    Ok(text_result(items.join(&separator)))
}

/// First non-blank argument
pub fn coalescec(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 1, usize::MAX)?;
    Ok((0..args.len())
        .find(|&i| !args[i].is_missing())
        .map(|i| Value::Str(text_arg(args, i)))
        .unwrap_or(Value::MissingStr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    #[test]
    fn test_case_and_trimming() {
        assert_eq!(upcase(&[t("abc")]).unwrap(), t("ABC"));
        assert_eq!(strip(&[t("  a b  ")]).unwrap(), t("a b"));
        assert_eq!(trim(&[t("  a  ")]).unwrap(), t("  a"));
        assert_eq!(left(&[t("  a")]).unwrap(), t("a"));
        assert_eq!(trim(&[t("   ")]).unwrap(), Value::MissingStr);
    }

    #[test]
    fn test_length_ignores_trailing_blanks() {
        assert_eq!(length(&[t("abc  ")]).unwrap(), Value::Num(3.0));
        assert_eq!(length(&[Value::MissingStr]).unwrap(), Value::Num(1.0));
    }

    #[test]
    fn test_substr() {
        assert_eq!(substr(&[t("abcdef"), Value::Num(2.0), Value::Num(3.0)]).unwrap(), t("bcd"));
        assert_eq!(substr(&[t("abcdef"), Value::Num(4.0)]).unwrap(), t("def"));
        assert_eq!(substr(&[t("abc"), Value::Num(2.0), Value::Num(10.0)]).unwrap(), t("bc"));
        assert_eq!(substr(&[t("abc"), Value::Num(9.0)]).unwrap(), Value::MissingStr);
        assert!(substr(&[t("abc"), Value::Num(0.0)]).is_err());
    }

    #[test]
    fn test_index_and_scan() {
        assert_eq!(index(&[t("hello world"), t("wor")]).unwrap(), Value::Num(7.0));
        assert_eq!(index(&[t("hello"), t("z")]).unwrap(), Value::Num(0.0));
        assert_eq!(scan(&[t("a,b  c"), Value::Num(2.0)]).unwrap(), t("b"));
        assert_eq!(scan(&[t("a,b  c"), Value::Num(-1.0)]).unwrap(), t("c"));
        assert_eq!(scan(&[t("a:b"), Value::Num(2.0), t(":")]).unwrap(), t("b"));
        assert_eq!(scan(&[t("a"), Value::Num(5.0)]).unwrap(), Value::MissingStr);
    }

    #[test]
    fn test_cats_and_catx() {
        assert_eq!(cats(&[t(" a "), Value::Num(1.0), Value::MissingNum]).unwrap(), t("a1"));
        assert_eq!(
            catx(&[t("-"), t(" x"), Value::MissingStr, t("y ")]).unwrap(),
            t("x-y")
        );
        assert_eq!(coalescec(&[t(" "), t("b")]).unwrap(), t("b"));
    }
}
