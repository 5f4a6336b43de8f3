// src/publishing/mod.rs
use std::fmt;

use crate::types::ResultSet;

pub mod console;
pub mod notion;
pub mod snapshot;

pub use console::ConsolePublisher;
pub use notion::NotionPublisher;
pub use snapshot::SnapshotFile;

/// Sink for one run's results. Failures inside a report are per row; an
/// `Err` means the sink as a whole could not be reached.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    fn name(&self) -> &str;
    async fn publish(&self, results: &ResultSet) -> anyhow::Result<PublishReport>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Updated,
    Failed(String),
    /// Row or instrument with no counterpart on the other side.
    Unmatched,
}

impl fmt::Display for RowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowOutcome::Updated => f.write_str("updated"),
            RowOutcome::Failed(why) => write!(f, "failed: {why}"),
            RowOutcome::Unmatched => f.write_str("unmatched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowStatus {
    pub name: String,
    pub outcome: RowOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub target: String,
    pub rows: Vec<RowStatus>,
}

impl PublishReport {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into(), rows: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<String>, outcome: RowOutcome) {
        self.rows.push(RowStatus { name: name.into(), outcome });
    }

    pub fn updated(&self) -> usize { self.count(|o| matches!(o, RowOutcome::Updated)) }
    pub fn failed(&self) -> usize { self.count(|o| matches!(o, RowOutcome::Failed(_))) }
    pub fn unmatched(&self) -> usize { self.count(|o| matches!(o, RowOutcome::Unmatched)) }

    pub fn status(&self, name: &str) -> Option<&RowOutcome> {
        self.rows.iter().find(|r| r.name == name).map(|r| &r.outcome)
    }

    fn count(&self, f: impl Fn(&RowOutcome) -> bool) -> usize {
        self.rows.iter().filter(|r| f(&r.outcome)).count()
    }
}
