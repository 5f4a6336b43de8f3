// src/publishing/console.rs
use super::{PublishReport, Publisher, RowOutcome};
use crate::types::{MetricLabel, ResultSet};

/// One line per configured instrument: `✓` with its metrics, or `✗` when the
/// run produced nothing for it.
pub struct ConsolePublisher {
    expected: Vec<String>,
}

impl ConsolePublisher {
    pub fn new(expected: Vec<String>) -> Self { Self { expected } }

    pub fn lines(&self, results: &ResultSet) -> Vec<String> {
        let mut names: Vec<&str> = self.expected.iter().map(String::as_str).collect();
        names.extend(results.keys().map(String::as_str).filter(|k| !self.expected.iter().any(|e| e == k)));

        names
            .into_iter()
            .map(|name| match results.get(name) {
                Some(m) => {
                    let cells: Vec<String> = MetricLabel::ALL
                        .iter()
                        .filter_map(|l| m.get(*l).map(|v| format!("{l}={v}")))
                        .collect();
                    format!("✓ {name}: {}", cells.join(" "))
                }
                None => format!("✗ {name}: no data"),
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Publisher for ConsolePublisher {
    fn name(&self) -> &str { "console" }

    async fn publish(&self, results: &ResultSet) -> anyhow::Result<PublishReport> {
        for line in self.lines(results) {
            println!("{line}");
        }
        let mut report = PublishReport::new(self.name());
        for name in &self.expected {
            let outcome = if results.contains_key(name) { RowOutcome::Updated } else { RowOutcome::Unmatched };
            report.push(name.clone(), outcome);
        }
        Ok(report)
    }
}
