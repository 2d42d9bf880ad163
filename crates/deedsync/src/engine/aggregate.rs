//! Thread-safe, append-only outcome aggregation

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::{info, warn};

use super::outcome::{ItemOutcome, Outcome};

/// Committed/skipped/failed tallies
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub committed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl OutcomeCounts {
    pub fn total(&self) -> usize {
        self.committed + self.skipped + self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Skipped,
    Failed,
}

/// A non-committed outcome, kept for the itemized report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub item: String,
    pub kind: IssueKind,
    pub reason: String,
}

/// Snapshot of an aggregator
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub label: String,
    pub counts: OutcomeCounts,
    pub issues: Vec<Issue>,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {} committed, {} skipped, {} failed ({} total)",
            self.label,
            self.counts.committed,
            self.counts.skipped,
            self.counts.failed,
            self.counts.total()
        )?;
        for issue in &self.issues {
            let kind = match issue.kind {
                IssueKind::Skipped => "SKIPPED",
                IssueKind::Failed => "FAILED ",
            };
            writeln!(f, "  {kind} {}: {}", issue.item, issue.reason)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Tally {
    counts: OutcomeCounts,
    issues: Vec<Issue>,
}

/// Collects outcomes from any number of concurrent runs.
///
/// Recording only takes a short lock; non-committed outcomes are logged as
/// they arrive so problems show up while the run is still going.
#[derive(Debug)]
pub struct ResultAggregator {
    label: String,
    tally: Mutex<Tally>,
}

impl ResultAggregator {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tally: Mutex::new(Tally::default()),
        }
    }

    pub fn record(&self, item_outcome: ItemOutcome) {
        let ItemOutcome { item, outcome } = item_outcome;

        let issue = match outcome {
            Outcome::Committed => None,
            Outcome::Skipped(reason) => {
                info!(run = %self.label, item = %item, reason = %reason, "Skipped");
                Some(Issue {
                    item,
                    kind: IssueKind::Skipped,
                    reason,
                })
            },
            Outcome::Failed(reason) => {
                warn!(run = %self.label, item = %item, reason = %reason, "Failed");
                Some(Issue {
                    item,
                    kind: IssueKind::Failed,
                    reason,
                })
            },
        };

        let mut tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
        match issue {
            None => tally.counts.committed += 1,
            Some(issue) => {
                match issue.kind {
                    IssueKind::Skipped => tally.counts.skipped += 1,
                    IssueKind::Failed => tally.counts.failed += 1,
                }
                tally.issues.push(issue);
            },
        }
    }

    pub fn extend(&self, outcomes: impl IntoIterator<Item = ItemOutcome>) {
        for outcome in outcomes {
            self.record(outcome);
        }
    }

    pub fn counts(&self) -> OutcomeCounts {
        self.tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .counts
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .issues
            .clone()
    }

    pub fn report(&self) -> RunReport {
        let tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
        RunReport {
            label: self.label.clone(),
            counts: tally.counts,
            issues: tally.issues.clone(),
        }
    }
}
