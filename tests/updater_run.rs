// tests/updater_run.rs
use async_trait::async_trait;
use chrono::{Duration as Days, NaiveDate};
use std::time::Duration;

use market_matrix::calc::MetricCalculator;
use market_matrix::config::{InstrumentConfig, SourceRef};
use market_matrix::providers::{ProviderError, ProviderKind, ProviderRegistry, SeriesProvider};
use market_matrix::series::{ColumnPrecedence, RawSeries};
use market_matrix::types::{MetricKind, MetricLabel};
use market_matrix::updater::{InstrumentOutcome, Updater};

/// Answers by id: "EMPTY" gives nothing, anything else 300 daily points.
struct Stub;

#[async_trait]
impl SeriesProvider for Stub {
    fn name(&self) -> &str { "stub" }

    async fn fetch(&self, id: &str) -> Result<RawSeries, ProviderError> {
        if id == "EMPTY" {
            return Ok(RawSeries::Empty);
        }
        let start = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();
        Ok(RawSeries::Values(
            (0..300).map(|i| (start + Days::days(i), Some(100.0 + i as f64))).collect(),
        ))
    }
}

fn instrument(name: &str, id: &str) -> InstrumentConfig {
    InstrumentConfig {
        name: name.into(),
        source: Some(SourceRef { provider: ProviderKind::Yahoo, id: id.into() }),
        kind: MetricKind::Return,
        columns: None,
    }
}

#[tokio::test]
async fn empty_instrument_is_dropped_and_full_one_has_every_metric() {
    let mut registry = ProviderRegistry::new();
    registry.register(ProviderKind::Yahoo, std::sync::Arc::new(Stub), ColumnPrecedence::default());

    let updater = Updater::new(
        vec![instrument("nothing", "EMPTY"), instrument("full", "FULL")],
        registry,
        MetricCalculator::default(),
        Duration::ZERO,
    );
    let summary = updater.run_once().await;

    assert_eq!(summary.results.len(), 1);
    let full = &summary.results["full"];
    for label in MetricLabel::ALL {
        assert!(full.contains(label), "missing {label}");
    }
    assert_eq!(full.get(MetricLabel::Latest), Some(399.0));
    assert_eq!(full.get(MetricLabel::OneDay), Some(0.002513));
    assert_eq!(summary.outcome("nothing"), Some(&InstrumentOutcome::NoData));
    assert_eq!(summary.outcome("full"), Some(&InstrumentOutcome::Computed(7)));
}
