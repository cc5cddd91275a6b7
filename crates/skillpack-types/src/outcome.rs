//! Result of a load pass: delivered blocks, a completion status and
//! non-fatal warnings

use crate::DocId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sub-document the caller may ask for with an explicit expand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandableDoc {
    pub name: String,
    pub cost: u64,
}

/// One delivered document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: DocId,
    pub body: String,
    pub cost: u64,
    /// Cost consumed by this pass up to and including this block
    pub cumulative_cost: u64,
    /// Session-wide delivery order
    pub sequence: u64,
    /// Advisory references; nothing is loaded for them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub see_also: Vec<DocId>,
    /// Sub-documents of a core body that were not delivered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expandable: Vec<ExpandableDoc>,
}

/// Why a pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    /// Every candidate was delivered or already cached
    Complete,
    /// A candidate could not be afforded; the pass stopped there
    PartialBudgetExhausted,
    /// The caller cancelled the pass; undelivered reservations were released
    Cancelled,
}

/// Non-fatal conditions reported alongside delivered content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    /// A cross-reference points to a document that does not exist
    DanglingReference { from: DocId, target: DocId },
    /// A requested identifier is unknown
    NotFound { id: String },
    /// Stored content could not be resolved
    ContentUnavailable { id: DocId, reason: String },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::DanglingReference { from, target } => {
                write!(f, "dangling reference from '{from}' to '{target}'")
            }
            LoadWarning::NotFound { id } => write!(f, "'{id}' not found"),
            LoadWarning::ContentUnavailable { id, reason } => {
                write!(f, "content of '{id}' unavailable: {reason}")
            }
        }
    }
}

/// Everything a load or expand call produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub blocks: Vec<ContentBlock>,
    pub status: LoadStatus,
    #[serde(default)]
    pub warnings: Vec<LoadWarning>,
    /// Candidates passed over because the session already holds them
    #[serde(default)]
    pub skipped: Vec<DocId>,
}

impl Default for LoadOutcome {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            status: LoadStatus::Complete,
            warnings: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl LoadOutcome {
    /// Total cost consumed by this pass
    pub fn consumed(&self) -> u64 {
        self.blocks.last().map_or(0, |b| b.cumulative_cost)
    }

    pub fn is_complete(&self) -> bool {
        self.status == LoadStatus::Complete
    }

    /// Identifiers of delivered blocks, in delivery order
    pub fn emitted_ids(&self) -> Vec<&DocId> {
        self.blocks.iter().map(|b| &b.id).collect()
    }

    /// Render for a tool result
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
