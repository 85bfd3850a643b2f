//! Version history lookups.

use qnasync_shared::{ContentId, ContentItem, ContentRepository, ContentVersion, Result, VersionStatus};
use tracing::debug;

/// The most recently saved previously-published version on the master language branch.
pub fn previous_published(versions: &[ContentVersion]) -> Option<&ContentVersion> {
    versions
        .iter()
        .filter(|v| v.master_language && v.status == VersionStatus::PreviouslyPublished)
        .max_by_key(|v| v.saved_at)
}

/// Load the item as it was at its previous published version, if any.
pub async fn load_previous_published<R: ContentRepository>(
    repo: &R,
    id: ContentId,
) -> Result<Option<ContentItem>> {
    let versions = repo.list_versions(id).await?;
    let Some(previous) = previous_published(&versions) else {
        debug!(content_id = %id, "no previously published version");
        return Ok(None);
    };
    repo.get_version(id, previous.version).await
}
