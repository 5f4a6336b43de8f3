// src/providers/mod.rs
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::config::{ms, Credentials, SourcesConfig};
use crate::series::{ColumnPrecedence, RawSeries};

pub mod cboe;
pub mod csv_table;
pub mod fred;
pub mod http;
pub mod yahoo;

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("no provider registered for {0}")]
    NotRegistered(ProviderKind),
}

impl ProviderError {
    /// Worth one more attempt against the same endpoint.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::Status(s) => matches!(*s, 408 | 429 | 500..=599),
            ProviderError::Timeout(_) => true,
            ProviderError::Malformed(_) | ProviderError::NotRegistered(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Yahoo,
    Fred,
    Cboe,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::Yahoo => "yahoo",
            ProviderKind::Fred => "fred",
            ProviderKind::Cboe => "cboe",
        })
    }
}

#[async_trait]
pub trait SeriesProvider: Send + Sync {
    fn name(&self) -> &str;
    /// Raw history for a ticker or series id. "Nothing published" is
    /// `Ok(RawSeries::Empty)`, not an error.
    async fn fetch(&self, id: &str) -> Result<RawSeries, ProviderError>;
}

/// Ordered fetch strategies for one source. Each attempt is time-bounded and
/// isolated; the first non-empty response wins.
pub struct FallbackProvider {
    name: String,
    strategies: Vec<Arc<dyn SeriesProvider>>,
    attempt_timeout: Duration,
}

impl FallbackProvider {
    pub fn new<S: Into<String>>(name: S, strategies: Vec<Arc<dyn SeriesProvider>>, attempt_timeout: Duration) -> Self {
        Self { name: name.into(), strategies, attempt_timeout }
    }
}

#[async_trait]
impl SeriesProvider for FallbackProvider {
    fn name(&self) -> &str { &self.name }

    async fn fetch(&self, id: &str) -> Result<RawSeries, ProviderError> {
        let mut last_err = None;
        let mut answered = false;
        for strategy in &self.strategies {
            match tokio::time::timeout(self.attempt_timeout, strategy.fetch(id)).await {
                Ok(Ok(raw)) if !raw.is_empty() => return Ok(raw),
                Ok(Ok(_)) => {
                    answered = true;
                    tracing::debug!(strategy = strategy.name(), id, "strategy returned no data");
                }
                Ok(Err(e)) => {
                    tracing::warn!(strategy = strategy.name(), id, "strategy failed: {e}");
                    last_err = Some(e);
                }
                Err(_) => {
                    tracing::warn!(strategy = strategy.name(), id, "strategy timed out");
                    last_err = Some(ProviderError::Timeout(self.attempt_timeout));
                }
            }
        }
        match last_err {
            Some(e) if !answered => Err(e),
            _ => Ok(RawSeries::Empty),
        }
    }
}

/// A registered provider together with its column selection order and the
/// oldest last observation still worth publishing.
#[derive(Clone)]
pub struct Source {
    pub provider: Arc<dyn SeriesProvider>,
    pub columns: ColumnPrecedence,
    pub max_age_days: Option<i64>,
}

impl Source {
    pub fn new(provider: Arc<dyn SeriesProvider>, columns: ColumnPrecedence) -> Self {
        Self { provider, columns, max_age_days: None }
    }

    pub fn with_max_age_days(mut self, days: Option<i64>) -> Self {
        self.max_age_days = days;
        self
    }

    /// `last` is older than `max_age_days` before `today`.
    pub fn is_stale(&self, last: NaiveDate, today: NaiveDate) -> bool {
        self.max_age_days
            .is_some_and(|days| last < today - chrono::Duration::days(days))
    }
}

#[derive(Clone, Default)]
pub struct ProviderRegistry {
    sources: HashMap<ProviderKind, Source>,
}

impl ProviderRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, kind: ProviderKind, provider: Arc<dyn SeriesProvider>, columns: ColumnPrecedence) {
        self.register_source(kind, Source::new(provider, columns));
    }

    pub fn register_source(&mut self, kind: ProviderKind, source: Source) {
        self.sources.insert(kind, source);
    }

    pub fn get(&self, kind: ProviderKind) -> Result<&Source, ProviderError> {
        self.sources.get(&kind).ok_or(ProviderError::NotRegistered(kind))
    }

    /// Wire the production providers. FRED's JSON API is only tried when a key
    /// is present; its CSV download needs none.
    ///
    /// Each request is bounded by `request_timeout`. Each fallback attempt is
    /// bounded by `attempt_timeout`, raised where needed so that a source's
    /// retries fit inside it.
    pub fn from_config(
        cfg: &SourcesConfig,
        creds: &Credentials,
        client: reqwest::Client,
        request_timeout: Duration,
        attempt_timeout: Duration,
    ) -> Self {
        let mut reg = Self::new();

        let yahoo_http = http::HttpFetcher::new(client.clone(), cfg.yahoo.retries, ms(cfg.yahoo.retry_delay_ms))
            .with_request_timeout(request_timeout);
        let yahoo_bound = yahoo_http.attempt_bound(attempt_timeout);
        let yahoo: Vec<Arc<dyn SeriesProvider>> = cfg
            .yahoo
            .base_urls
            .iter()
            .map(|base| Arc::new(yahoo::YahooChart::new(yahoo_http.clone(), base.clone(), cfg.yahoo.range.clone())) as Arc<dyn SeriesProvider>)
            .collect();
        reg.register_source(
            ProviderKind::Yahoo,
            Source::new(Arc::new(FallbackProvider::new("yahoo", yahoo, yahoo_bound)), cfg.yahoo.columns.clone())
                .with_max_age_days(cfg.yahoo.max_age_days),
        );

        let fred_http = http::HttpFetcher::new(client.clone(), cfg.fred.retries, ms(cfg.fred.retry_delay_ms))
            .with_request_timeout(request_timeout);
        let fred_bound = fred_http.attempt_bound(attempt_timeout);
        let mut fred: Vec<Arc<dyn SeriesProvider>> = Vec::new();
        if let Some(key) = &creds.fred_api_key {
            fred.push(Arc::new(fred::FredApi::new(fred_http.clone(), cfg.fred.api_url.clone(), key.clone(), cfg.fred.lookback_days)));
        }
        fred.push(Arc::new(fred::FredCsv::new(fred_http, cfg.fred.download_url.clone(), cfg.fred.lookback_days)));
        reg.register_source(
            ProviderKind::Fred,
            Source::new(Arc::new(FallbackProvider::new("fred", fred, fred_bound)), cfg.fred.columns.clone())
                .with_max_age_days(cfg.fred.max_age_days),
        );

        let cboe_http = http::HttpFetcher::new(client, cfg.cboe.retries, ms(cfg.cboe.retry_delay_ms))
            .with_request_timeout(request_timeout);
        let cboe_bound = cboe_http.attempt_bound(attempt_timeout);
        let cboe: Vec<Arc<dyn SeriesProvider>> =
            vec![Arc::new(cboe::CboeRatios::new(cboe_http, cfg.cboe.url.clone(), cfg.cboe.lookback_days))];
        reg.register_source(
            ProviderKind::Cboe,
            Source::new(Arc::new(FallbackProvider::new("cboe", cboe, cboe_bound)), cfg.cboe.columns.clone())
                .with_max_age_days(cfg.cboe.max_age_days),
        );

        reg
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Canned;
    use super::*;
    use crate::config::YahooConfig;
    use httpmock::prelude::*;

    fn some_values() -> Result<RawSeries, ProviderError> {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        Ok(RawSeries::Values(vec![(d, Some(1.0))]))
    }
    fn nothing() -> Result<RawSeries, ProviderError> { Ok(RawSeries::Empty) }
    fn down() -> Result<RawSeries, ProviderError> { Err(ProviderError::Status(503)) }

    fn chain(strategies: Vec<Arc<Canned>>, timeout: Duration) -> FallbackProvider {
        let strategies = strategies.into_iter().map(|s| s as Arc<dyn SeriesProvider>).collect();
        FallbackProvider::new("test", strategies, timeout)
    }

    #[tokio::test]
    async fn first_non_empty_strategy_wins() {
        let a = Arc::new(Canned::new("a", down));
        let b = Arc::new(Canned::new("b", some_values));
        let c = Arc::new(Canned::new("c", some_values));
        let p = chain(vec![a.clone(), b.clone(), c.clone()], Duration::from_secs(1));
        assert!(!p.fetch("X").await.unwrap().is_empty());
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn empty_answer_moves_on_and_is_not_an_error() {
        let a = Arc::new(Canned::new("a", nothing));
        let b = Arc::new(Canned::new("b", down));
        let p = chain(vec![a, b.clone()], Duration::from_secs(1));
        assert!(p.fetch("X").await.unwrap().is_empty());
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn all_failures_surface_last_error() {
        let p = chain(vec![Arc::new(Canned::new("a", down)), Arc::new(Canned::new("b", down))], Duration::from_secs(1));
        assert!(matches!(p.fetch("X").await, Err(ProviderError::Status(503))));
    }

    #[tokio::test]
    async fn slow_strategy_is_cut_off() {
        let mut slow = Canned::new("slow", some_values);
        slow.delay = Duration::from_millis(200);
        let fast = Arc::new(Canned::new("fast", some_values));
        let p = chain(vec![Arc::new(slow), fast.clone()], Duration::from_millis(20));
        assert!(!p.fetch("X").await.unwrap().is_empty());
        assert_eq!(fast.calls(), 1);
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Status(429).is_transient());
        assert!(ProviderError::Status(502).is_transient());
        assert!(!ProviderError::Status(404).is_transient());
        assert!(!ProviderError::Malformed("x".into()).is_transient());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn unregistered_kind_is_an_error() {
        let reg = ProviderRegistry::new();
        assert!(matches!(reg.get(ProviderKind::Cboe), Err(ProviderError::NotRegistered(ProviderKind::Cboe))));
    }

    #[test]
    fn staleness_needs_a_limit() {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let src = Source::new(Arc::new(Canned::new("a", nothing)), ColumnPrecedence::default());
        assert!(!src.is_stale(d(1, 1), d(8, 15)));
        let src = src.with_max_age_days(Some(10));
        assert!(!src.is_stale(d(8, 5), d(8, 15)));
        assert!(src.is_stale(d(8, 4), d(8, 15)));
    }

    #[tokio::test]
    async fn production_wiring_leaves_room_for_the_retry() {
        let server = MockServer::start_async().await;
        let m = server
            .mock_async(|when, then| {
                when.method(GET).path("/v8/finance/chart/SPY");
                then.status(200).body("{}").delay(Duration::from_millis(600));
            })
            .await;
        let cfg = SourcesConfig {
            yahoo: YahooConfig { base_urls: vec![server.base_url()], retries: 1, retry_delay_ms: 10, ..YahooConfig::default() },
            ..SourcesConfig::default()
        };
        // Request and attempt bounds configured equal: the attempt bound must stretch.
        let reg = ProviderRegistry::from_config(
            &cfg,
            &Credentials::default(),
            reqwest::Client::new(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );
        let err = reg.get(ProviderKind::Yahoo).unwrap().provider.fetch("SPY").await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(ref e) if e.is_timeout()));
        m.assert_hits_async(2).await;
    }
}
