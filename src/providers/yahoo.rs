// src/providers/yahoo.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use super::http::HttpFetcher;
use super::{ProviderError, SeriesProvider};
use crate::series::{Column, RawSeries, Table};

/// Daily bars from the Yahoo Finance chart endpoint on one host.
pub struct YahooChart {
    http: HttpFetcher,
    base_url: String,
    range: String, // e.g. "2y"
    name: String,
}

impl YahooChart {
    pub fn new(http: HttpFetcher, base_url: String, range: String) -> Self {
        let name = format!("yahoo:{}", base_url.trim_start_matches("https://"));
        Self { http, base_url, range, name }
    }
}

#[async_trait]
impl SeriesProvider for YahooChart {
    fn name(&self) -> &str { &self.name }

    async fn fetch(&self, ticker: &str) -> Result<RawSeries, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url.trim_end_matches('/'), ticker);
        let query = [
            ("range", self.range.clone()),
            ("interval", "1d".to_string()),
            ("includeAdjustedClose", "true".to_string()),
        ];
        let body = self.http.get_text(&url, &query).await?;
        parse_chart(&body)
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64, // seconds east of UTC for the listing exchange
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Vec<ChartAdjClose>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Chart JSON -> table with `open/high/low/close/volume[/adjclose]` columns,
/// dated in the exchange's local calendar.
pub fn parse_chart(body: &str) -> Result<RawSeries, ProviderError> {
    let resp: ChartResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(format!("yahoo chart: {e}")))?;

    if let Some(err) = resp.chart.error.filter(|e| !e.is_null()) {
        return Err(ProviderError::Malformed(format!("yahoo chart error: {err}")));
    }
    let Some(result) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(RawSeries::Empty);
    };
    if result.timestamp.is_empty() {
        return Ok(RawSeries::Empty);
    }

    let offset = result.meta.gmtoffset;
    let dates = result
        .timestamp
        .iter()
        .map(|ts| local_date(*ts, offset))
        .collect::<Result<Vec<_>, _>>()?;

    let align = |v: &[Option<f64>]| -> Vec<Option<f64>> {
        (0..dates.len()).map(|i| v.get(i).copied().flatten()).collect()
    };

    let mut columns = Vec::new();
    if let Some(q) = result.indicators.quote.first() {
        columns.push(Column::new("open", align(&q.open)));
        columns.push(Column::new("high", align(&q.high)));
        columns.push(Column::new("low", align(&q.low)));
        columns.push(Column::new("close", align(&q.close)));
        columns.push(Column::new("volume", align(&q.volume)));
    }
    if let Some(a) = result.indicators.adjclose.first() {
        columns.push(Column::new("adjclose", align(&a.adjclose)));
    }
    Ok(RawSeries::Table(Table { dates, columns }))
}

fn local_date(ts: i64, gmtoffset: i64) -> Result<NaiveDate, ProviderError> {
    DateTime::from_timestamp(ts + gmtoffset, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| ProviderError::Malformed(format!("yahoo timestamp out of range: {ts}")))
}
