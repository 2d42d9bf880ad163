//! Work items and their terminal outcomes

use serde::Serialize;

/// A unit of transfer handed to a chunk worker.
///
/// Items are immutable once enumerated; `identity` is what the run report
/// uses to name the item.
pub trait WorkItem: Send + Sync + 'static {
    fn identity(&self) -> String;
}

/// Terminal classification of one item's processing attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Committed,
    Skipped(String),
    Failed(String),
}

impl Outcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Outcome::Skipped(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed(reason.into())
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Committed => None,
            Outcome::Skipped(reason) | Outcome::Failed(reason) => Some(reason),
        }
    }
}

/// An outcome bound to the identity of the item it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub item: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ItemOutcome {
    pub fn new(item: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            item: item.into(),
            outcome,
        }
    }
}
