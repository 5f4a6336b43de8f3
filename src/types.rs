// src/types.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate, // exchange-local trading date
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self { Self { date, value } }
}

/// Clean observation series: strictly ascending dates, finite values only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<Observation>,
}

impl Series {
    /// Builds a series from unordered, possibly dirty points. Non-finite values
    /// are dropped; for duplicate dates the later point in input order wins.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for p in points {
            if p.value.is_finite() {
                by_date.insert(p.date, p.value);
            }
        }
        Self {
            points: by_date.into_iter().map(|(date, value)| Observation { date, value }).collect(),
        }
    }

    pub fn empty() -> Self { Self::default() }

    pub fn points(&self) -> &[Observation] { &self.points }
    pub fn len(&self) -> usize { self.points.len() }
    pub fn is_empty(&self) -> bool { self.points.is_empty() }
    pub fn last(&self) -> Option<&Observation> { self.points.last() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// `(new / old) - 1`
    #[default]
    Return,
    /// `new - old`, for rates, spreads and ratios
    Delta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MetricLabel {
    #[serde(rename = "latest")]
    Latest,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "QTD")]
    Qtd,
    #[serde(rename = "YTD")]
    Ytd,
}

impl MetricLabel {
    pub const ALL: [MetricLabel; 7] = [
        MetricLabel::Latest,
        MetricLabel::OneDay,
        MetricLabel::OneWeek,
        MetricLabel::OneMonth,
        MetricLabel::OneYear,
        MetricLabel::Qtd,
        MetricLabel::Ytd,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            MetricLabel::Latest => "latest",
            MetricLabel::OneDay => "1d",
            MetricLabel::OneWeek => "1w",
            MetricLabel::OneMonth => "1m",
            MetricLabel::OneYear => "1y",
            MetricLabel::Qtd => "QTD",
            MetricLabel::Ytd => "YTD",
        }
    }
}

impl fmt::Display for MetricLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Named metrics for one instrument. A label that is missing had too little history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricSet(BTreeMap<MetricLabel, f64>);

impl MetricSet {
    pub fn new() -> Self { Self::default() }

    /// Stores `value` under `label`; `None` leaves the label absent.
    pub fn set(&mut self, label: MetricLabel, value: Option<f64>) {
        match value {
            Some(v) => { self.0.insert(label, v); }
            None => { self.0.remove(&label); }
        }
    }

    pub fn get(&self, label: MetricLabel) -> Option<f64> { self.0.get(&label).copied() }
    pub fn contains(&self, label: MetricLabel) -> bool { self.0.contains_key(&label) }
    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (MetricLabel, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

/// Instrument display name -> metrics, built once per run.
pub type ResultSet = BTreeMap<String, MetricSet>;

/// Document written by the local snapshot publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub updated_at: String, // RFC 3339, local offset
    pub instruments: ResultSet,
}
