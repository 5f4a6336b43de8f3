// src/publishing/notion.rs
//! Remote table updates through the Notion REST API.
//!
//! Rows are matched by the plain text of their title property. Only metrics
//! present in an instrument's set are written, so missing history never
//! blanks out an existing cell.

use anyhow::{anyhow, Context};
use chrono::Utc;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{PublishReport, Publisher, RowOutcome};
use crate::config::{ms, Credentials, NotionConfig};
use crate::telemetry;
use crate::types::{MetricSet, ResultSet};

const PAGE_SIZE: usize = 100;

pub struct NotionPublisher {
    client: reqwest::Client,
    api_key: String,
    database_id: String,
    cfg: NotionConfig,
    tz: Tz,
}

/// A database row as far as matching is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct QueryPage {
    #[serde(default)]
    results: Vec<PageObject>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageObject {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl NotionPublisher {
    pub fn new(client: reqwest::Client, api_key: String, database_id: String, cfg: NotionConfig) -> anyhow::Result<Self> {
        let tz: Tz = cfg
            .timezone
            .parse()
            .map_err(|e| anyhow!("notion.timezone {:?}: {e}", cfg.timezone))?;
        Ok(Self { client, api_key, database_id, cfg, tz })
    }

    /// Remote publishing is enabled only with an API key and a database id;
    /// `NOTION_DATABASE_ID` wins over the configured id. `None` is logged, not fatal.
    pub fn from_credentials(creds: &Credentials, cfg: &NotionConfig, client: reqwest::Client) -> Option<Self> {
        let Some(key) = creds.notion_api_key.clone() else {
            tracing::warn!("NOTION_API_KEY not set, remote publishing disabled");
            return None;
        };
        let Some(db) = creds.notion_database_id.clone().or_else(|| cfg.database_id.clone()) else {
            tracing::warn!("no notion database id configured, remote publishing disabled");
            return None;
        };
        match Self::new(client, key, db, cfg.clone()) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!("remote publishing disabled: {e:#}");
                None
            }
        }
    }

    pub fn database_id(&self) -> &str { &self.database_id }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(&self.api_key)
            .header("Notion-Version", &self.cfg.version)
    }

    /// Every row of the database, following `next_cursor` up to `max_pages` pages.
    pub async fn query_rows(&self) -> anyhow::Result<Vec<Row>> {
        let path = format!("databases/{}/query", self.database_id);
        let mut rows = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 0..self.cfg.max_pages.max(1) {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }
            let resp = self
                .request(reqwest::Method::POST, &path)
                .json(&body)
                .send()
                .await
                .context("querying notion database")?;
            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(anyhow!("notion query returned {status}: {text}"));
            }
            let page: QueryPage = resp.json().await.context("decoding notion query page")?;
            rows.extend(page.results.iter().map(|p| Row { id: p.id.clone(), title: self.title_of(p) }));

            match (page.has_more, page.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => return Ok(rows),
            }
            tracing::debug!(page = page_no + 1, rows = rows.len(), "notion query has more pages");
        }
        tracing::warn!(max_pages = self.cfg.max_pages, "notion query truncated at page limit");
        Ok(rows)
    }

    fn title_of(&self, page: &PageObject) -> String {
        page.properties
            .get(&self.cfg.title_property)
            .and_then(|p| p.get("title"))
            .and_then(Value::as_array)
            .map(|parts| parts.iter().filter_map(|t| t.get("plain_text").and_then(Value::as_str)).collect::<String>())
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// Property payload for one row: present metrics plus today's date in the configured zone.
    pub fn properties_for(&self, metrics: &MetricSet) -> Value {
        let mut props = Map::new();
        for (label, value) in metrics.iter() {
            if let Some(name) = self.cfg.property_for(label) {
                props.insert(name.to_string(), json!({ "number": value }));
            }
        }
        let today = Utc::now().with_timezone(&self.tz).date_naive();
        props.insert(
            self.cfg.updated_property.clone(),
            json!({ "date": { "start": today.format("%Y-%m-%d").to_string() } }),
        );
        Value::Object(props)
    }

    async fn update_row(&self, row: &Row, metrics: &MetricSet) -> anyhow::Result<()> {
        let body = json!({ "properties": self.properties_for(metrics) });
        let resp = self
            .request(reqwest::Method::PATCH, &format!("pages/{}", row.id))
            .json(&body)
            .send()
            .await
            .context("updating notion page")?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("status {status}: {text}"));
        }
        Ok(())
    }

    fn publish_delay(&self) -> Duration { ms(self.cfg.publish_delay_ms) }
}

#[async_trait::async_trait]
impl Publisher for NotionPublisher {
    fn name(&self) -> &str { "notion" }

    async fn publish(&self, results: &ResultSet) -> anyhow::Result<PublishReport> {
        let rows = self.query_rows().await?;
        tracing::info!(rows = rows.len(), "notion rows fetched");

        let mut report = PublishReport::new(self.name());
        let mut first = true;
        for row in &rows {
            let Some(metrics) = results.get(&row.title) else {
                tracing::debug!(row = %row.title, "no results for row");
                telemetry::record_row("unmatched");
                report.push(row.title.clone(), RowOutcome::Unmatched);
                continue;
            };
            if !first && !self.publish_delay().is_zero() {
                tokio::time::sleep(self.publish_delay()).await;
            }
            first = false;

            match self.update_row(row, metrics).await {
                Ok(()) => {
                    tracing::info!(row = %row.title, metrics = metrics.len(), "row updated");
                    telemetry::record_row("updated");
                    report.push(row.title.clone(), RowOutcome::Updated);
                }
                Err(e) => {
                    tracing::warn!(row = %row.title, "row update failed: {e:#}");
                    telemetry::record_row("failed");
                    report.push(row.title.clone(), RowOutcome::Failed(format!("{e:#}")));
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetricLabel;
    use httpmock::prelude::*;

    fn cfg(base_url: String) -> NotionConfig {
        NotionConfig { base_url, publish_delay_ms: 0, ..NotionConfig::default() }
    }

    fn page(id: &str, title: &str) -> Value {
        json!({
            "object": "page",
            "id": id,
            "properties": {
                "资产名称": { "id": "title", "type": "title",
                    "title": [{ "type": "text", "plain_text": title }] }
            }
        })
    }

    fn creds(key: Option<&str>, db: Option<&str>) -> Credentials {
        Credentials {
            notion_api_key: key.map(str::to_string),
            notion_database_id: db.map(str::to_string),
            fred_api_key: None,
        }
    }

    #[test]
    fn missing_key_disables_publishing() {
        let c = NotionConfig { database_id: Some("db".into()), ..NotionConfig::default() };
        assert!(NotionPublisher::from_credentials(&creds(None, Some("env-db")), &c, reqwest::Client::new()).is_none());
    }

    #[test]
    fn missing_database_id_disables_publishing() {
        let c = NotionConfig { database_id: None, ..NotionConfig::default() };
        assert!(NotionPublisher::from_credentials(&creds(Some("k"), None), &c, reqwest::Client::new()).is_none());
    }

    #[test]
    fn env_database_id_overrides_configured_one() {
        let c = NotionConfig { database_id: Some("configured".into()), ..NotionConfig::default() };
        let p = NotionPublisher::from_credentials(&creds(Some("k"), Some("from-env")), &c, reqwest::Client::new()).unwrap();
        assert_eq!(p.database_id(), "from-env");
        let p = NotionPublisher::from_credentials(&creds(Some("k"), None), &c, reqwest::Client::new()).unwrap();
        assert_eq!(p.database_id(), "configured");
    }

    #[tokio::test]
    async fn query_follows_cursor() {
        let server = MockServer::start_async().await;
        let second = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/databases/db1/query")
                    .header("notion-version", "2022-06-28")
                    .json_body(json!({ "page_size": 100, "start_cursor": "c2" }));
                then.status(200).json_body(json!({
                    "results": [page("p2", "黄金")], "has_more": false, "next_cursor": null
                }));
            })
            .await;
        let first = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/databases/db1/query")
                    .header("authorization", "Bearer secret")
                    .json_body(json!({ "page_size": 100 }));
                then.status(200).json_body(json!({
                    "results": [page("p1", "标普500")], "has_more": true, "next_cursor": "c2"
                }));
            })
            .await;

        let n = NotionPublisher::new(reqwest::Client::new(), "secret".into(), "db1".into(), cfg(server.base_url())).unwrap();
        let rows = n.query_rows().await.unwrap();
        assert_eq!(
            rows,
            vec![Row { id: "p1".into(), title: "标普500".into() }, Row { id: "p2".into(), title: "黄金".into() }]
        );
        first.assert_hits_async(1).await;
        second.assert_hits_async(1).await;
    }

    #[test]
    fn only_present_metrics_are_written() {
        let n = NotionPublisher::new(reqwest::Client::new(), "k".into(), "db".into(), NotionConfig::default()).unwrap();
        let mut m = MetricSet::new();
        m.set(MetricLabel::Latest, Some(4.21));
        m.set(MetricLabel::OneDay, Some(-0.03));
        let props = n.properties_for(&m);
        let obj = props.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert_eq!(obj["收盘价"]["number"], json!(4.21));
        assert_eq!(obj["1天"]["number"], json!(-0.03));
        assert!(obj["更新时间"]["date"]["start"].as_str().unwrap().len() == 10);
        assert!(!obj.contains_key("1年"));
    }

    #[test]
    fn bad_timezone_is_rejected() {
        let c = NotionConfig { timezone: "Mars/Olympus".into(), ..NotionConfig::default() };
        assert!(NotionPublisher::new(reqwest::Client::new(), "k".into(), "db".into(), c).is_err());
    }

    #[tokio::test]
    async fn rejected_update_is_reported_per_row() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/databases/db1/query");
                then.status(200).json_body(json!({
                    "results": [page("p1", "标普500"), page("p2", "黄金")], "has_more": false
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH).path("/v1/pages/p1");
                then.status(400).body(r#"{"message":"validation_error"}"#);
            })
            .await;
        let ok = server
            .mock_async(|when, then| {
                when.method(httpmock::Method::PATCH).path("/v1/pages/p2");
                then.status(200).json_body(json!({ "object": "page", "id": "p2" }));
            })
            .await;

        let mut m = MetricSet::new();
        m.set(MetricLabel::Latest, Some(1.0));
        let mut results = ResultSet::new();
        results.insert("标普500".into(), m.clone());
        results.insert("黄金".into(), m);

        let n = NotionPublisher::new(reqwest::Client::new(), "k".into(), "db1".into(), cfg(server.base_url())).unwrap();
        let report = n.publish(&results).await.unwrap();
        assert!(matches!(report.status("标普500"), Some(RowOutcome::Failed(_))));
        assert_eq!(report.status("黄金"), Some(&RowOutcome::Updated));
        ok.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn failed_query_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/databases/db1/query");
                then.status(401).body(r#"{"code":"unauthorized"}"#);
            })
            .await;
        let n = NotionPublisher::new(reqwest::Client::new(), "bad".into(), "db1".into(), cfg(server.base_url())).unwrap();
        assert!(n.publish(&ResultSet::new()).await.is_err());
    }
}
