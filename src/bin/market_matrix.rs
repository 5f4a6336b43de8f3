// src/bin/market_matrix.rs
use anyhow::Context;
use market_matrix::{
    calc::MetricCalculator,
    config::{AppConfig, Credentials},
    providers::ProviderRegistry,
    publishing::{ConsolePublisher, NotionPublisher, SnapshotFile},
    updater::Updater,
};
use tracing_subscriber::EnvFilter;

const USER_AGENT: &str = concat!("market-matrix/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let cfg = AppConfig::load().context("loading configuration")?;
    let creds = Credentials::from_env();
    tracing::debug!(?creds, "credentials");

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(cfg.request_timeout())
        .build()
        .context("building http client")?;

    let registry =
        ProviderRegistry::from_config(&cfg.sources, &creds, client.clone(), cfg.request_timeout(), cfg.fetch_timeout());
    let names = cfg.instruments.iter().map(|i| i.name.clone()).collect();

    let mut updater = Updater::new(
        cfg.instruments.clone(),
        registry,
        MetricCalculator::new(cfg.calculator.period_to_date_for_delta),
        cfg.fetch_delay(),
    )
    .with_publisher(Box::new(SnapshotFile::new(cfg.snapshot_path.clone())))
    .with_publisher(Box::new(ConsolePublisher::new(names)));

    if let Some(notion) = NotionPublisher::from_credentials(&creds, &cfg.notion, client) {
        updater = updater.with_publisher(Box::new(notion));
    }

    let summary = updater.run_once().await;
    tracing::info!(
        computed = summary.results.len(),
        publishers = summary.reports.len(),
        "run complete"
    );
    Ok(())
}
