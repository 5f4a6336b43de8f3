// src/bin/series_probe.rs
//! Fetch one configured instrument and print its raw point count and metrics.
use anyhow::{anyhow, Context};
use clap::Parser;
use market_matrix::{
    calc::MetricCalculator,
    config::{AppConfig, Credentials},
    providers::ProviderRegistry,
    series::normalize,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Fetch and compute one instrument from the configured list")]
struct Args {
    /// Display name as configured, e.g. "标普500"
    name: String,
    /// Also print the last N normalized observations
    #[arg(long, default_value_t = 0)]
    tail: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = AppConfig::load().context("loading configuration")?;
    let inst = cfg
        .instruments
        .iter()
        .find(|i| i.name == args.name)
        .ok_or_else(|| anyhow!("no instrument named {:?}", args.name))?;
    let src = inst.source.as_ref().ok_or_else(|| anyhow!("{:?} has no source configured", inst.name))?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("market-matrix/", env!("CARGO_PKG_VERSION")))
        .timeout(cfg.request_timeout())
        .build()?;
    let registry = ProviderRegistry::from_config(
        &cfg.sources,
        &Credentials::from_env(),
        client,
        cfg.request_timeout(),
        cfg.fetch_timeout(),
    );
    let source = registry.get(src.provider)?;

    let raw = source.provider.fetch(&src.id).await?;
    let series = normalize(&raw, inst.columns.as_ref().unwrap_or(&source.columns));
    let metrics = MetricCalculator::new(cfg.calculator.period_to_date_for_delta).compute(series.points(), inst.kind)?;

    println!("{} ({} {}) points={}", inst.name, src.provider, src.id, series.len());
    if let Some(last) = series.last().filter(|l| source.is_stale(l.date, chrono::Utc::now().date_naive())) {
        println!("  stale: last observation {} is older than {:?} days", last.date, source.max_age_days);
    }
    for p in series.points().iter().rev().take(args.tail).rev() {
        println!("  {} {}", p.date, p.value);
    }
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
