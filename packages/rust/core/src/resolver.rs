//! Reverse lookup from a QnA item to the overview pages that reference it.

use std::collections::HashSet;

use qnasync_shared::{ContentId, ContentItem, ContentRepository, LinkKind, Result};
use tracing::{debug, instrument};

use crate::schema::{ContentKind, SchemaRegistry};

/// Finds overview pages referencing a content item through soft links.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceResolver<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Overview pages owning a page-reference link to `content_id` that
    /// carry a knowledge-base id, once each, in first-seen link order.
    ///
    /// Only direct owners are considered.
    #[instrument(skip_all, fields(content_id = %content_id))]
    pub async fn find_referencing_overview_pages<R: ContentRepository>(
        &self,
        repo: &R,
        content_id: ContentId,
    ) -> Result<Vec<ContentItem>> {
        let links = repo.reverse_links(content_id).await?;

        let mut seen = HashSet::new();
        let mut pages = Vec::new();

        for link in links {
            if link.kind != LinkKind::PageReference {
                continue;
            }
            let Some(owner) = link.owner else {
                continue;
            };
            if !seen.insert(owner) {
                continue;
            }

            let Some(item) = repo.get(owner).await? else {
                debug!(%owner, "link owner not found");
                continue;
            };
            if self.registry.classify(&item) != ContentKind::OverviewPage {
                continue;
            }
            if self.registry.knowledge_base_id(&item).is_none() {
                debug!(%owner, "overview page has no knowledge base id");
                continue;
            }

            pages.push(item);
        }

        debug!(count = pages.len(), "referencing overview pages resolved");
        Ok(pages)
    }
}
