// src/calc/mod.rs
//! Trailing change metrics over a daily series.
//!
//! Point lookbacks count observations, not calendar days: `1d`, `1w`, `1m`
//! and `1y` step back 1, 5, 21 and 252 points from the latest one. `QTD` and
//! `YTD` compare the first and last observation dated on or after the start of
//! the latest observation's quarter/year, and need at least two points in that
//! window. A metric without enough history is left out of the set.

use chrono::NaiveDate;

use crate::types::{MetricKind, MetricLabel, MetricSet, Observation};

pub mod periods;
pub mod sanitize;

pub use sanitize::sanitize;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CalcError {
    #[error("series not strictly ascending at {0}")]
    Unordered(NaiveDate),
    #[error("no period start for {0}")]
    Calendar(NaiveDate),
}

/// Point offsets for the lookback metrics.
pub const LOOKBACKS: [(MetricLabel, usize); 4] = [
    (MetricLabel::OneDay, 1),
    (MetricLabel::OneWeek, 5),
    (MetricLabel::OneMonth, 21),
    (MetricLabel::OneYear, 252),
];

impl MetricKind {
    #[inline]
    pub fn change(self, new: f64, old: f64) -> f64 {
        match self {
            MetricKind::Return => new / old - 1.0,
            MetricKind::Delta => new - old,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricCalculator {
    pub lookbacks: [(MetricLabel, usize); 4],
    /// Emit QTD/YTD (as absolute change) for delta-kind instruments too.
    pub period_to_date_for_delta: bool,
}

impl Default for MetricCalculator {
    fn default() -> Self { Self::new(true) }
}

impl MetricCalculator {
    pub fn new(period_to_date_for_delta: bool) -> Self {
        Self { lookbacks: LOOKBACKS, period_to_date_for_delta }
    }

    pub fn compute(&self, points: &[Observation], kind: MetricKind) -> Result<MetricSet, CalcError> {
        if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(CalcError::Unordered(w[1].date));
        }

        let mut out = MetricSet::new();
        let Some(last) = points.last().copied() else {
            return Ok(out);
        };
        out.set(MetricLabel::Latest, sanitize(last.value));
        if points.len() < 2 {
            return Ok(out);
        }

        for (label, offset) in self.lookbacks {
            if points.len() > offset {
                let base = points[points.len() - 1 - offset].value;
                out.set(label, sanitize(kind.change(last.value, base)));
            }
        }

        if kind == MetricKind::Return || self.period_to_date_for_delta {
            let qtd = periods::since(points, periods::quarter_start(last.date)?);
            out.set(MetricLabel::Qtd, window_change(qtd, kind));
            let ytd = periods::since(points, periods::year_start(last.date)?);
            out.set(MetricLabel::Ytd, window_change(ytd, kind));
        }
        Ok(out)
    }
}

fn window_change(window: &[Observation], kind: MetricKind) -> Option<f64> {
    if window.len() < 2 {
        return None;
    }
    let (first, last) = (window.first()?, window.last()?);
    sanitize(kind.change(last.value, first.value))
}
