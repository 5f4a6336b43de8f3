// src/series.rs
//! Turns whatever a provider hands back into one clean [`Series`].
//!
//! Providers return either a table (several value columns sharing a date
//! index) or an already-extracted column. When a table carries more than one
//! column the value column is picked by an ordered [`ColumnPrecedence`]. The
//! default order is an exact `close` column, then a column whose name is tagged
//! as a ratio/percentage, then the last column. This is a heuristic: if a
//! provider renames its columns the wrong one may be picked without any error,
//! which is why every source section and every instrument can override it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Observation, Series};

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>, // aligned with `Table::dates`
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self { name: name.into(), values }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Drop rows older than `days` calendar days before the newest row.
    pub fn trailing_days(mut self, days: i64) -> Self {
        let Some(newest) = self.dates.iter().max().copied() else {
            return self;
        };
        let cutoff = newest - chrono::Duration::days(days);
        let keep: Vec<bool> = self.dates.iter().map(|d| *d >= cutoff).collect();
        let mut flags = keep.iter();
        self.dates.retain(|_| *flags.next().unwrap_or(&false));
        for col in &mut self.columns {
            let mut flags = keep.iter();
            col.values.retain(|_| *flags.next().unwrap_or(&false));
        }
        self
    }
}

/// Raw provider output, before column selection and cleaning.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSeries {
    Empty,
    Table(Table),
    Values(Vec<(NaiveDate, Option<f64>)>),
}

impl RawSeries {
    pub fn is_empty(&self) -> bool {
        match self {
            RawSeries::Empty => true,
            RawSeries::Table(t) => t.dates.is_empty() || t.columns.is_empty(),
            RawSeries::Values(v) => v.is_empty(),
        }
    }
}

/// One step of the column selection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "lowercase")]
pub enum ColumnRule {
    /// Column whose name equals `name`, ignoring ASCII case.
    Exact { name: String },
    /// Column whose name contains any of `tags`, ignoring ASCII case.
    Tagged { tags: Vec<String> },
    Last,
}

impl ColumnRule {
    pub fn exact(name: impl Into<String>) -> Self { ColumnRule::Exact { name: name.into() } }

    pub fn tagged<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnRule::Tagged { tags: tags.into_iter().map(Into::into).collect() }
    }

    fn pick<'a>(&self, columns: &'a [Column]) -> Option<&'a Column> {
        match self {
            ColumnRule::Exact { name } => columns.iter().find(|c| c.name.trim().eq_ignore_ascii_case(name)),
            ColumnRule::Tagged { tags } => columns.iter().find(|c| {
                let lower = c.name.to_ascii_lowercase();
                tags.iter().any(|t| lower.contains(&t.to_ascii_lowercase()))
            }),
            ColumnRule::Last => columns.last(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnPrecedence(pub Vec<ColumnRule>);

impl Default for ColumnPrecedence {
    fn default() -> Self {
        Self(vec![
            ColumnRule::exact("close"),
            ColumnRule::tagged(["ratio", "pct", "percent", "%"]),
            ColumnRule::Last,
        ])
    }
}

impl ColumnPrecedence {
    /// First column matched by the rules, in rule order.
    pub fn select<'a>(&self, columns: &'a [Column]) -> Option<&'a Column> {
        self.0.iter().find_map(|rule| rule.pick(columns))
    }
}

/// Clean a raw provider response into an ascending, de-duplicated series.
/// Absent or empty input gives an empty series, never an error.
pub fn normalize(raw: &RawSeries, precedence: &ColumnPrecedence) -> Series {
    match raw {
        RawSeries::Empty => Series::empty(),
        RawSeries::Values(values) => Series::from_points(
            values.iter().filter_map(|(d, v)| v.map(|v| Observation::new(*d, v))),
        ),
        RawSeries::Table(table) => {
            let Some(column) = precedence.select(&table.columns) else {
                return Series::empty();
            };
            tracing::debug!(column = %column.name, rows = table.dates.len(), "selected value column");
            Series::from_points(
                table
                    .dates
                    .iter()
                    .zip(column.values.iter())
                    .filter_map(|(d, v)| v.map(|v| Observation::new(*d, v))),
            )
        }
    }
}
