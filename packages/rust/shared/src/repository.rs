//! The content-repository seam.
//!
//! The engine never touches storage directly. Hosts implement
//! [`ContentRepository`] over their CMS; `qnasync-storage` provides a libSQL
//! implementation and `qnasync-core` an in-memory one.

use crate::error::Result;
use crate::types::{ContentId, ContentItem, ContentVersion, PersistField, SoftLink};

/// Read access to content and version history, plus single-field writes.
#[allow(async_fn_in_trait)]
pub trait ContentRepository {
    /// Load the current version of an item. `Ok(None)` when it does not exist.
    async fn get(&self, id: ContentId) -> Result<Option<ContentItem>>;

    /// List every stored version of an item, in no particular order.
    async fn list_versions(&self, id: ContentId) -> Result<Vec<ContentVersion>>;

    /// Load an item as it was at a given version.
    async fn get_version(&self, id: ContentId, version: u32) -> Result<Option<ContentItem>>;

    /// All links whose target is `id`.
    async fn reverse_links(&self, id: ContentId) -> Result<Vec<SoftLink>>;

    /// Write one property of an item.
    async fn persist_field(&self, command: &PersistField) -> Result<()>;
}
