// src/publishing/snapshot.rs
use anyhow::Context;
use chrono::{Local, SecondsFormat};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{PublishReport, Publisher, RowOutcome};
use crate::types::{ResultSet, Snapshot};

/// Pretty JSON snapshot of the whole result set, replaced every run.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }

    pub fn publish_local(&self, results: &ResultSet) -> anyhow::Result<()> {
        let snap = Snapshot {
            updated_at: Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
            instruments: results.clone(),
        };
        let body = serde_json::to_string_pretty(&snap).context("serializing snapshot")?;
        self.replace_with(body.as_bytes())?;
        tracing::info!(path = %self.path.display(), instruments = results.len(), "snapshot saved");
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the target so readers
    /// never see a half-written snapshot.
    fn replace_with(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).with_context(|| format!("creating temp file in {}", dir.display()))?;
        tmp.write_all(bytes).context("writing snapshot")?;
        tmp.as_file().sync_all().context("flushing snapshot")?;
        tmp.persist(&self.path).with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    pub fn read(path: &Path) -> anyhow::Result<Snapshot> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}

#[async_trait::async_trait]
impl Publisher for SnapshotFile {
    fn name(&self) -> &str { "snapshot" }

    async fn publish(&self, results: &ResultSet) -> anyhow::Result<PublishReport> {
        self.publish_local(results)?;
        let mut report = PublishReport::new(self.name());
        for name in results.keys() {
            report.push(name.clone(), RowOutcome::Updated);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricLabel, MetricSet};

    fn results() -> ResultSet {
        let mut spy = MetricSet::new();
        spy.set(MetricLabel::Latest, Some(553.07));
        spy.set(MetricLabel::OneDay, Some(0.017154));
        let mut rs = ResultSet::new();
        rs.insert("标普500".to_string(), spy);
        rs
    }

    #[tokio::test]
    async fn writes_and_overwrites_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.json");
        std::fs::write(&path, "stale content from an earlier run").unwrap();

        let report = SnapshotFile::new(&path).publish(&results()).await.unwrap();
        assert_eq!(report.updated(), 1);

        let snap = SnapshotFile::read(&path).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&snap.updated_at).is_ok());
        assert_eq!(snap.instruments, results());

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"1d\": 0.017154"));
        assert!(!raw.contains("stale"));
    }

    #[tokio::test]
    async fn replace_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.json");
        let file = SnapshotFile::new(&path);
        file.publish(&results()).await.unwrap();
        file.publish(&ResultSet::new()).await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("matrix.json")]);
        assert!(SnapshotFile::read(&path).unwrap().instruments.is_empty());
    }

    #[test]
    fn unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("matrix.json");
        assert!(SnapshotFile::new(path).publish_local(&results()).is_err());
    }
}
