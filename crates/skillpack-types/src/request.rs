use crate::DocId;
use serde::{Deserialize, Serialize};

/// A single retrieval call: free-text query, optional tags, optional explicit
/// target and a caller-supplied budget hint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadRequest {
    pub query: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub target: Option<DocId>,
    /// Upper bound on what this pass may consume
    #[serde(default)]
    pub budget_hint: Option<u64>,
    /// Per-request override of the candidate cap
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl LoadRequest {
    /// Ranked request driven by free text
    pub fn query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Explicit request for one document, bypassing ranking
    pub fn target(target: DocId) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_budget_hint(mut self, hint: u64) -> Self {
        self.budget_hint = Some(hint);
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}
