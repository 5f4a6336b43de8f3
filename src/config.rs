// src/config.rs
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::providers::ProviderKind;
use crate::series::{ColumnPrecedence, ColumnRule};
use crate::types::{MetricKind, MetricLabel};

/// Env var naming a TOML file that replaces the built-in configuration.
pub const CONFIG_ENV: &str = "MARKET_MATRIX_CONFIG";

const BUILTIN: &str = include_str!("../config/market_matrix.toml");

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("parsing {origin}: {source}")]
    Parse { origin: String, source: toml::de::Error },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "d_snapshot_path")]      pub snapshot_path: PathBuf,
    #[serde(default = "d_fetch_delay_ms")]     pub fetch_delay_ms: u64,
    /// Bound on one fallback attempt, stretched per source to fit its retries.
    #[serde(default = "d_fetch_timeout_ms")]   pub fetch_timeout_ms: u64,
    /// Bound on a single HTTP request.
    #[serde(default = "d_request_timeout_ms")] pub request_timeout_ms: u64,
    #[serde(default)]                          pub calculator: CalculatorConfig,
    #[serde(default)]                          pub notion: NotionConfig,
    #[serde(default)]                          pub sources: SourcesConfig,
    #[serde(default)]                          pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentConfig {
    /// Display name; also the key matched against the remote title column.
    pub name: String,
    /// `None` means no automated source: the instrument is skipped.
    #[serde(default)]                          pub source: Option<SourceRef>,
    #[serde(default)]                          pub kind: MetricKind,
    /// Overrides the source's column precedence for this instrument only.
    #[serde(default)]                          pub columns: Option<ColumnPrecedence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceRef {
    pub provider: ProviderKind,
    pub id: String, // ticker, FRED series id or CBOE file stem
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalculatorConfig {
    /// QTD/YTD for delta instruments, as absolute change. `false` omits them.
    #[serde(default = "d_true")]               pub period_to_date_for_delta: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]                          pub database_id: Option<String>,
    #[serde(default = "d_notion_url")]         pub base_url: String,
    #[serde(default = "d_notion_version")]     pub version: String,
    #[serde(default = "d_publish_delay_ms")]   pub publish_delay_ms: u64,
    #[serde(default = "d_max_pages")]          pub max_pages: usize,
    #[serde(default = "d_title_property")]     pub title_property: String,
    #[serde(default = "d_updated_property")]   pub updated_property: String,
    #[serde(default = "d_timezone")]           pub timezone: String,
    /// Metric label (`latest`, `1d`, ... `YTD`) -> remote number property.
    #[serde(default = "d_properties")]         pub properties: BTreeMap<String, String>,
}

impl NotionConfig {
    pub fn property_for(&self, label: MetricLabel) -> Option<&str> {
        self.properties.get(label.as_str()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]                          pub yahoo: YahooConfig,
    #[serde(default)]                          pub fred: FredConfig,
    #[serde(default)]                          pub cboe: CboeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YahooConfig {
    /// Tried in order until one host returns data.
    #[serde(default = "d_yahoo_urls")]         pub base_urls: Vec<String>,
    #[serde(default = "d_yahoo_range")]        pub range: String,
    /// Dividend-adjusted close first, like `yf.download`.
    #[serde(default = "d_yahoo_columns")]      pub columns: ColumnPrecedence,
    #[serde(default = "d_retries")]            pub retries: usize,
    #[serde(default = "d_retry_delay_ms")]     pub retry_delay_ms: u64,
    #[serde(default = "d_daily_max_age")]      pub max_age_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FredConfig {
    #[serde(default = "d_fred_api_url")]       pub api_url: String,
    #[serde(default = "d_fred_download_url")]  pub download_url: String,
    #[serde(default = "d_lookback_days")]      pub lookback_days: i64,
    #[serde(default)]                          pub columns: ColumnPrecedence,
    #[serde(default = "d_retries")]            pub retries: usize,
    #[serde(default = "d_retry_delay_ms")]     pub retry_delay_ms: u64,
    #[serde(default = "d_daily_max_age")]      pub max_age_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CboeConfig {
    #[serde(default = "d_cboe_url")]           pub url: String,
    #[serde(default = "d_lookback_days")]      pub lookback_days: i64,
    #[serde(default)]                          pub columns: ColumnPrecedence,
    #[serde(default = "d_retries")]            pub retries: usize,
    #[serde(default = "d_retry_delay_ms")]     pub retry_delay_ms: u64,
    #[serde(default = "d_daily_max_age")]      pub max_age_days: Option<i64>,
}

fn d_snapshot_path() -> PathBuf { PathBuf::from("market_matrix.json") }
fn d_fetch_delay_ms() -> u64 { 250 }
fn d_fetch_timeout_ms() -> u64 { 20_000 }
fn d_request_timeout_ms() -> u64 { 8_000 }
fn d_true() -> bool { true }
fn d_notion_url() -> String { "https://api.notion.com".into() }
fn d_notion_version() -> String { "2022-06-28".into() }
fn d_publish_delay_ms() -> u64 { 300 }
fn d_max_pages() -> usize { 20 }
fn d_title_property() -> String { "资产名称".into() }
fn d_updated_property() -> String { "更新时间".into() }
fn d_timezone() -> String { "Asia/Shanghai".into() }
fn d_properties() -> BTreeMap<String, String> {
    [
        (MetricLabel::Latest, "收盘价"),
        (MetricLabel::OneDay, "1天"),
        (MetricLabel::OneWeek, "1星期"),
        (MetricLabel::OneMonth, "1个月"),
        (MetricLabel::OneYear, "1年"),
        (MetricLabel::Qtd, "QTD"),
        (MetricLabel::Ytd, "YTD"),
    ]
    .into_iter()
    .map(|(l, p)| (l.as_str().to_string(), p.to_string()))
    .collect()
}
fn d_yahoo_urls() -> Vec<String> {
    vec!["https://query1.finance.yahoo.com".into(), "https://query2.finance.yahoo.com".into()]
}
fn d_yahoo_range() -> String { "2y".into() }
fn d_yahoo_columns() -> ColumnPrecedence {
    ColumnPrecedence(vec![ColumnRule::exact("adjclose"), ColumnRule::exact("close"), ColumnRule::Last])
}
/// Calendar days a daily series may lag today before it counts as dead.
fn d_daily_max_age() -> Option<i64> { Some(14) }
fn d_retries() -> usize { 1 }
fn d_retry_delay_ms() -> u64 { 500 }
fn d_fred_api_url() -> String { "https://api.stlouisfed.org".into() }
fn d_fred_download_url() -> String { "https://fred.stlouisfed.org".into() }
fn d_lookback_days() -> i64 { 365 }
fn d_cboe_url() -> String { "https://cdn.cboe.com/resources/options/volume_and_call_put_ratios".into() }
#[inline]
pub fn ms(d: u64) -> std::time::Duration { Duration::from_millis(d) }

impl Default for CalculatorConfig {
    fn default() -> Self { Self { period_to_date_for_delta: d_true() } }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            database_id: None,
            base_url: d_notion_url(),
            version: d_notion_version(),
            publish_delay_ms: d_publish_delay_ms(),
            max_pages: d_max_pages(),
            title_property: d_title_property(),
            updated_property: d_updated_property(),
            timezone: d_timezone(),
            properties: d_properties(),
        }
    }
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_urls: d_yahoo_urls(),
            range: d_yahoo_range(),
            columns: d_yahoo_columns(),
            retries: d_retries(),
            retry_delay_ms: d_retry_delay_ms(),
            max_age_days: d_daily_max_age(),
        }
    }
}

impl Default for FredConfig {
    fn default() -> Self {
        Self {
            api_url: d_fred_api_url(),
            download_url: d_fred_download_url(),
            lookback_days: d_lookback_days(),
            columns: ColumnPrecedence::default(),
            retries: d_retries(),
            retry_delay_ms: d_retry_delay_ms(),
            max_age_days: d_daily_max_age(),
        }
    }
}

impl Default for CboeConfig {
    fn default() -> Self {
        Self {
            url: d_cboe_url(),
            lookback_days: d_lookback_days(),
            columns: ColumnPrecedence::default(),
            retries: d_retries(),
            retry_delay_ms: d_retry_delay_ms(),
            max_age_days: d_daily_max_age(),
        }
    }
}

impl AppConfig {
    /// `$MARKET_MATRIX_CONFIG` if set, otherwise the built-in configuration.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Self::builtin(),
        }
    }

    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(BUILTIN, "built-in configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&text, &path.display().to_string())
    }

    pub fn from_toml_str(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text)
            .map_err(|source| ConfigError::Parse { origin: origin.to_string(), source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for inst in &self.instruments {
            if inst.name.trim().is_empty() {
                return Err(ConfigError::Invalid("instrument with empty name".into()));
            }
            if !seen.insert(inst.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate instrument {:?}", inst.name)));
            }
            if inst.source.as_ref().is_some_and(|s| s.id.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!("instrument {:?} has an empty source id", inst.name)));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        let ages = [
            ("yahoo", self.sources.yahoo.max_age_days),
            ("fred", self.sources.fred.max_age_days),
            ("cboe", self.sources.cboe.max_age_days),
        ];
        if let Some((name, _)) = ages.iter().find(|(_, d)| d.is_some_and(|d| d < 0)) {
            return Err(ConfigError::Invalid(format!("sources.{name}.max_age_days must not be negative")));
        }
        if let Some(bad) = self.notion.properties.keys().find(|k| !MetricLabel::ALL.iter().any(|l| l.as_str() == k.as_str())) {
            return Err(ConfigError::Invalid(format!("unknown metric label {bad:?} in notion.properties")));
        }
        Ok(())
    }

    pub fn fetch_delay(&self) -> Duration { ms(self.fetch_delay_ms) }
    pub fn fetch_timeout(&self) -> Duration { ms(self.fetch_timeout_ms) }
    pub fn request_timeout(&self) -> Duration { ms(self.request_timeout_ms) }
}

/// Secrets taken from the process environment (after `.env` is loaded).
#[derive(Clone, Default)]
pub struct Credentials {
    pub notion_api_key: Option<String>,
    pub notion_database_id: Option<String>,
    pub fred_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        let var = |k: &str| std::env::var(k).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        Self {
            notion_api_key: var("NOTION_API_KEY"),
            notion_database_id: var("NOTION_DATABASE_ID"),
            fred_api_key: var("FRED_API_KEY"),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("notion_api_key", &self.notion_api_key.as_ref().map(|_| "<set>"))
            .field("notion_database_id", &self.notion_database_id)
            .field("fred_api_key", &self.fred_api_key.as_ref().map(|_| "<set>"))
            .finish()
    }
}
