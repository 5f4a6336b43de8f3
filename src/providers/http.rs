// src/providers/http.rs
use backon::{ConstantBuilder, Retryable};
use std::time::Duration;

use super::ProviderError;

/// Shared GET path for providers: status check plus a bounded retry on
/// transient failures (timeouts, connect errors, 408/429/5xx).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    pub retries: usize,
    pub retry_delay: Duration,
    /// Per-request bound; overrides the client-wide timeout when set.
    pub request_timeout: Option<Duration>,
}

/// Headroom on top of the worst-case retry schedule.
pub const ATTEMPT_SLACK: Duration = Duration::from_millis(250);

/// Shortest outer bound that still lets every retry run to its own timeout.
pub fn attempt_budget(request_timeout: Duration, retries: usize, retry_delay: Duration) -> Duration {
    let tries = u32::try_from(retries).unwrap_or(u32::MAX).saturating_add(1);
    request_timeout
        .saturating_mul(tries)
        .saturating_add(retry_delay.saturating_mul(tries - 1))
        .saturating_add(ATTEMPT_SLACK)
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, retries: usize, retry_delay: Duration) -> Self {
        Self { client, retries, retry_delay, request_timeout: None }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Outer bound for one `get_text` call, never shorter than `floor`.
    pub fn attempt_bound(&self, floor: Duration) -> Duration {
        match self.request_timeout {
            Some(t) => floor.max(attempt_budget(t, self.retries, self.retry_delay)),
            None => floor,
        }
    }

    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        let backoff = ConstantBuilder::default()
            .with_delay(self.retry_delay)
            .with_max_times(self.retries);
        (|| self.get_once(url, query))
            .retry(backoff)
            .when(ProviderError::is_transient)
            .notify(|err: &ProviderError, after: Duration| {
                tracing::debug!(url, ?after, "retrying: {err}");
            })
            .await
    }

    async fn get_once(&self, url: &str, query: &[(&str, String)]) -> Result<String, ProviderError> {
        let mut req = self.client.get(url).query(query);
        if let Some(t) = self.request_timeout {
            req = req.timeout(t);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }
}
