//! Date functions
//!
//! A date value is the number of days since 1960-01-01.

use chrono::{Datelike, Days, Local, NaiveDate};

use super::{arity, num_arg, FunctionError};
use crate::executor::types::Value;

/// Two-digit years at or above this value are read as 19xx
const YEAR_CUTOFF: i64 = 26;

fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1960, 1, 1)
}

pub fn date_to_days(date: NaiveDate) -> Option<i64> {
    Some(date.signed_duration_since(epoch()?).num_days())
}

pub fn days_to_date(days: i64) -> Option<NaiveDate> {
    let epoch = epoch()?;
    if days >= 0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs()))
    }
}

fn date_arg(args: &[Value]) -> Result<Option<NaiveDate>, FunctionError> {
    arity(args, 1, 1)?;
    Ok(num_arg(args, 0)?.and_then(|days| days_to_date(days.floor() as i64)))
}

fn from_date(args: &[Value], f: impl Fn(NaiveDate) -> i64) -> Result<Value, FunctionError> {
    Ok(date_arg(args)?
        .map(|d| Value::Num(f(d) as f64))
        .unwrap_or(Value::MissingNum))
}

/// `MDY(month, day, year)`; an invalid date is missing
pub fn mdy(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 3, 3)?;
    let (Some(month), Some(day), Some(year)) =
        (num_arg(args, 0)?, num_arg(args, 1)?, num_arg(args, 2)?)
    else {
        return Ok(Value::MissingNum);
    };

    let mut year = year.trunc() as i64;
    if (0..100).contains(&year) {
        year += if year >= YEAR_CUTOFF { 1900 } else { 2000 };
    }

    let date = i32::try_from(year)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, month.trunc() as u32, day.trunc() as u32));
    Ok(date
        .and_then(date_to_days)
        .map(|d| Value::Num(d as f64))
        .unwrap_or(Value::MissingNum))
}

pub fn year(args: &[Value]) -> Result<Value, FunctionError> {
    from_date(args, |d| d.year() as i64)
}

pub fn month(args: &[Value]) -> Result<Value, FunctionError> {
    from_date(args, |d| d.month() as i64)
}

pub fn day(args: &[Value]) -> Result<Value, FunctionError> {
    from_date(args, |d| d.day() as i64)
}

/// 1 for Sunday through 7 for Saturday
pub fn weekday(args: &[Value]) -> Result<Value, FunctionError> {
    from_date(args, |d| d.weekday().num_days_from_sunday() as i64 + 1)
}

pub fn today(args: &[Value]) -> Result<Value, FunctionError> {
    arity(args, 0, 0)?;
    Ok(date_to_days(Local::now().date_naive())
        .map(|d| Value::Num(d as f64))
        .unwrap_or(Value::MissingNum))
}
