// src/calc/periods.rs
use chrono::{Datelike, NaiveDate};

use super::CalcError;
use crate::types::Observation;

/// First day of the calendar quarter containing `date`.
pub fn quarter_start(date: NaiveDate) -> Result<NaiveDate, CalcError> {
    let month = (date.month0() / 3) * 3 + 1;
    NaiveDate::from_ymd_opt(date.year(), month, 1).ok_or(CalcError::Calendar(date))
}

/// January 1 of the year containing `date`.
pub fn year_start(date: NaiveDate) -> Result<NaiveDate, CalcError> {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).ok_or(CalcError::Calendar(date))
}

/// Tail of an ascending slice dated on or after `start` (inclusive).
pub fn since(points: &[Observation], start: NaiveDate) -> &[Observation] {
    let first = points.partition_point(|p| p.date < start);
    &points[first..]
}
