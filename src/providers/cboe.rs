// src/providers/cboe.rs
use async_trait::async_trait;

use super::csv_table;
use super::http::HttpFetcher;
use super::{ProviderError, SeriesProvider};
use crate::series::RawSeries;

/// CBOE put/call ratio files, addressed by file stem (`totalpc`, `equitypc`, ...).
pub struct CboeRatios {
    http: HttpFetcher,
    base_url: String,
    lookback_days: i64,
}

impl CboeRatios {
    pub fn new(http: HttpFetcher, base_url: String, lookback_days: i64) -> Self {
        Self { http, base_url, lookback_days }
    }
}

#[async_trait]
impl SeriesProvider for CboeRatios {
    fn name(&self) -> &str { "cboe:csv" }

    async fn fetch(&self, stem: &str) -> Result<RawSeries, ProviderError> {
        let url = format!("{}/{}.csv", self.base_url.trim_end_matches('/'), stem);
        let body = self.http.get_text(&url, &[]).await?;
        let table = csv_table::parse_table(&body)?.trailing_days(self.lookback_days);
        Ok(RawSeries::Table(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::{normalize, ColumnPrecedence};
    use httpmock::prelude::*;

    #[tokio::test]
    async fn picks_ratio_column_from_download() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/totalpc.csv");
                then.status(200).body(
                    "CBOE data,,,,\nDATE,CALLS,PUTS,TOTAL,P/C Ratio\n\
                     8/14/2024,100,95,195,0.95\n8/15/2024,120,90,210,0.75\n",
                );
            })
            .await;
        let http = HttpFetcher::new(reqwest::Client::new(), 0, std::time::Duration::ZERO);
        let raw = CboeRatios::new(http, server.base_url(), 365).fetch("totalpc").await.unwrap();
        let s = normalize(&raw, &ColumnPrecedence::default());
        let values: Vec<f64> = s.points().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![0.95, 0.75]);
    }
}
