// src/providers/fred.rs
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

use super::csv_table;
use super::http::HttpFetcher;
use super::{ProviderError, SeriesProvider};
use crate::series::RawSeries;

fn window_start(lookback_days: i64) -> String {
    (Utc::now().date_naive() - Duration::days(lookback_days)).format("%Y-%m-%d").to_string()
}

/// FRED observations endpoint (needs an API key).
pub struct FredApi {
    http: HttpFetcher,
    base_url: String,
    api_key: String,
    lookback_days: i64,
}

impl FredApi {
    pub fn new(http: HttpFetcher, base_url: String, api_key: String, lookback_days: i64) -> Self {
        Self { http, base_url, api_key, lookback_days }
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    #[serde(default)]
    observations: Vec<FredObservation>,
}

#[derive(Debug, Deserialize)]
struct FredObservation {
    date: String,
    value: String, // "." when missing
}

pub fn parse_observations(body: &str) -> Result<RawSeries, ProviderError> {
    let resp: ObservationsResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::Malformed(format!("fred observations: {e}")))?;
    if resp.observations.is_empty() {
        return Ok(RawSeries::Empty);
    }
    let values = resp
        .observations
        .iter()
        .map(|o| {
            let date = NaiveDate::parse_from_str(&o.date, "%Y-%m-%d")
                .map_err(|e| ProviderError::Malformed(format!("fred date {:?}: {e}", o.date)))?;
            Ok((date, o.value.trim().parse::<f64>().ok()))
        })
        .collect::<Result<Vec<_>, ProviderError>>()?;
    Ok(RawSeries::Values(values))
}

#[async_trait]
impl SeriesProvider for FredApi {
    fn name(&self) -> &str { "fred:api" }

    async fn fetch(&self, series_id: &str) -> Result<RawSeries, ProviderError> {
        let url = format!("{}/fred/series/observations", self.base_url.trim_end_matches('/'));
        let query = [
            ("series_id", series_id.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
            ("observation_start", window_start(self.lookback_days)),
        ];
        let body = self.http.get_text(&url, &query).await?;
        parse_observations(&body)
    }
}

/// `fredgraph.csv` download, no key required.
pub struct FredCsv {
    http: HttpFetcher,
    base_url: String,
    lookback_days: i64,
}

impl FredCsv {
    pub fn new(http: HttpFetcher, base_url: String, lookback_days: i64) -> Self {
        Self { http, base_url, lookback_days }
    }
}

#[async_trait]
impl SeriesProvider for FredCsv {
    fn name(&self) -> &str { "fred:csv" }

    async fn fetch(&self, series_id: &str) -> Result<RawSeries, ProviderError> {
        let url = format!("{}/graph/fredgraph.csv", self.base_url.trim_end_matches('/'));
        let query = [("id", series_id.to_string()), ("cosd", window_start(self.lookback_days))];
        let body = self.http.get_text(&url, &query).await?;
        let table = csv_table::parse_table(&body)?.trailing_days(self.lookback_days);
        Ok(RawSeries::Table(table))
    }
}
