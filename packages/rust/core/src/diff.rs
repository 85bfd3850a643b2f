//! Snapshots of an overview page's pairs and the diff between two of them.
//!
//! Pairs are identified by question only. A changed answer on an unchanged
//! question produces no operation.

use std::collections::HashSet;

use qnasync_client::UpdateRequest;
use qnasync_shared::QnaPair;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Ordered pairs of one container version, unique by question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pairs: Vec<QnaPair>,
}

impl Snapshot {
    /// Build from pairs in container order. Later duplicates of a question are dropped.
    pub fn from_pairs(pairs: impl IntoIterator<Item = QnaPair>) -> Self {
        let mut seen = HashSet::new();
        let pairs = pairs
            .into_iter()
            .filter(|pair| seen.insert(pair.question.clone()))
            .collect();
        Self { pairs }
    }

    pub fn pairs(&self) -> &[QnaPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn questions(&self) -> HashSet<&str> {
        self.pairs.iter().map(|p| p.question.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Diff
// ---------------------------------------------------------------------------

/// Pairs to add and delete to move a knowledge base from one snapshot to another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub to_add: Vec<QnaPair>,
    pub to_delete: Vec<QnaPair>,
}

impl SnapshotDiff {
    /// `to_add` is `current - previous`, `to_delete` is `previous - current`,
    /// both by question and both in their snapshot's order.
    pub fn compute(previous: &Snapshot, current: &Snapshot) -> Self {
        let previous_questions = previous.questions();
        let current_questions = current.questions();

        let to_add = current
            .pairs
            .iter()
            .filter(|p| !previous_questions.contains(p.question.as_str()))
            .cloned()
            .collect();
        let to_delete = previous
            .pairs
            .iter()
            .filter(|p| !current_questions.contains(p.question.as_str()))
            .cloned()
            .collect();

        Self { to_add, to_delete }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_delete.is_empty()
    }

    /// Turn the diff into an update request, attaching source URLs to the additions.
    pub fn into_request(self, urls: Vec<String>) -> UpdateRequest {
        UpdateRequest::new(self.to_add, self.to_delete).with_urls(urls)
    }
}
