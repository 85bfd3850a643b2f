//! Reconciliation of content repositories with remote knowledge bases.
//!
//! This crate turns content lifecycle events into knowledge-base updates:
//! the schema registry classifies content, the extractor reads pairs and
//! snapshots, the resolver finds the overview pages behind a shared item,
//! and the engine computes diffs and drives the client.

pub mod diff;
pub mod engine;
pub mod extractor;
pub mod history;
pub mod memory;
pub mod resolver;
pub mod schema;

pub use diff::{Snapshot, SnapshotDiff};
pub use engine::{
    ContentEvent, EventOutcome, KbOperation, PublishDecision, ReconciliationEngine, SyncReport,
};
pub use extractor::QnaPairExtractor;
pub use memory::InMemoryRepository;
pub use resolver::ReferenceResolver;
pub use schema::{ContentKind, OverviewSchema, QnaItemSchema, SchemaRegistry};
