// src/updater.rs
use chrono::Utc;
use std::time::Duration;

use crate::calc::{CalcError, MetricCalculator};
use crate::config::InstrumentConfig;
use crate::providers::{ProviderError, ProviderRegistry};
use crate::publishing::{PublishReport, Publisher};
use crate::series::normalize;
use crate::telemetry;
use crate::types::{MetricSet, ResultSet};

#[derive(thiserror::Error, Debug)]
pub enum InstrumentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Calc(#[from] CalcError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentOutcome {
    /// Metric set recorded, with this many metrics.
    Computed(usize),
    NoSource,
    NoData,
    Failed(String),
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: ResultSet,
    pub outcomes: Vec<(String, InstrumentOutcome)>,
    pub reports: Vec<PublishReport>,
}

impl RunSummary {
    pub fn outcome(&self, name: &str) -> Option<&InstrumentOutcome> {
        self.outcomes.iter().find(|(n, _)| n == name).map(|(_, o)| o)
    }
}

/// One fetch, compute, publish pass over a fixed instrument list.
pub struct Updater {
    instruments: Vec<InstrumentConfig>,
    registry: ProviderRegistry,
    calculator: MetricCalculator,
    fetch_delay: Duration,
    publishers: Vec<Box<dyn Publisher>>,
}

impl Updater {
    pub fn new(
        instruments: Vec<InstrumentConfig>,
        registry: ProviderRegistry,
        calculator: MetricCalculator,
        fetch_delay: Duration,
    ) -> Self {
        Self { instruments, registry, calculator, fetch_delay, publishers: Vec::new() }
    }

    /// Publishers run in the order they were added.
    pub fn with_publisher(mut self, p: Box<dyn Publisher>) -> Self {
        self.publishers.push(p);
        self
    }

    /// Fetch and compute every instrument in turn. Failures stay per instrument.
    pub async fn collect(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut fetched_any = false;

        for inst in &self.instruments {
            let Some(src) = &inst.source else {
                tracing::debug!(instrument = %inst.name, "no source configured, skipped");
                summary.outcomes.push((inst.name.clone(), InstrumentOutcome::NoSource));
                continue;
            };
            if fetched_any && !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            fetched_any = true;

            let provider = src.provider.to_string();
            let outcome = match self.fetch_one(inst).await {
                Ok(Some(set)) => {
                    tracing::info!(instrument = %inst.name, provider = %provider, metrics = set.len(), "computed");
                    telemetry::record_fetch(&provider, "ok");
                    let n = set.len();
                    summary.results.insert(inst.name.clone(), set);
                    InstrumentOutcome::Computed(n)
                }
                Ok(None) => {
                    tracing::warn!(instrument = %inst.name, provider = %provider, id = %src.id, "no data");
                    telemetry::record_fetch(&provider, "empty");
                    InstrumentOutcome::NoData
                }
                Err(e) => {
                    tracing::warn!(instrument = %inst.name, provider = %provider, id = %src.id, "failed: {e}");
                    telemetry::record_fetch(&provider, "error");
                    InstrumentOutcome::Failed(e.to_string())
                }
            };
            summary.outcomes.push((inst.name.clone(), outcome));
        }
        summary
    }

    async fn fetch_one(&self, inst: &InstrumentConfig) -> Result<Option<MetricSet>, InstrumentError> {
        let Some(src) = &inst.source else { return Ok(None) };
        let source = self.registry.get(src.provider)?;
        let raw = source.provider.fetch(&src.id).await?;
        let columns = inst.columns.as_ref().unwrap_or(&source.columns);
        let series = normalize(&raw, columns);
        tracing::debug!(instrument = %inst.name, points = series.len(), "normalized");
        let Some(last) = series.last() else {
            return Ok(None);
        };
        if source.is_stale(last.date, Utc::now().date_naive()) {
            tracing::warn!(instrument = %inst.name, last = %last.date, max_age_days = ?source.max_age_days, "series is stale");
            return Ok(None);
        }
        let set = self.calculator.compute(series.points(), inst.kind)?;
        Ok((!set.is_empty()).then_some(set))
    }

    /// `collect`, then hand the results to each publisher. A publisher that
    /// fails is logged and the rest still run.
    pub async fn run_once(&self) -> RunSummary {
        let mut summary = self.collect().await;
        tracing::info!(
            instruments = self.instruments.len(),
            computed = summary.results.len(),
            "fetch pass finished"
        );
        for p in &self.publishers {
            match p.publish(&summary.results).await {
                Ok(report) => {
                    tracing::info!(
                        target_name = p.name(),
                        updated = report.updated(),
                        failed = report.failed(),
                        unmatched = report.unmatched(),
                        "published"
                    );
                    summary.reports.push(report);
                }
                Err(e) => tracing::warn!(target_name = p.name(), "publish failed: {e:#}"),
            }
        }
        summary
    }
}
