//! In-memory content repository for tests and embedding hosts.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use qnasync_shared::{
    ContentFixture, ContentId, ContentItem, ContentRepository, ContentVersion, PersistField,
    QnaSyncError, Result, SoftLink, VersionStatus, Versioning,
};

#[derive(Debug, Default)]
struct State {
    items: HashMap<ContentId, ContentItem>,
    versions: HashMap<ContentId, Vec<(ContentVersion, ContentItem)>>,
    links: Vec<SoftLink>,
    writes: Vec<PersistField>,
}

/// A [`ContentRepository`] held entirely in memory.
///
/// Every [`PersistField`] command is also recorded and can be inspected
/// with [`InMemoryRepository::writes`].
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: Mutex<State>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a repository from a fixture document.
    pub fn from_fixture(fixture: &ContentFixture) -> Self {
        let repo = Self::new();
        for entry in &fixture.content {
            for version in &entry.versions {
                repo.insert_version(version.meta(entry.item.id), version.materialize(&entry.item));
            }
            repo.insert(entry.item.clone());
        }
        for link in &fixture.links {
            repo.add_link(link.clone());
        }
        repo
    }

    /// Insert or replace the current version of an item.
    pub fn insert(&self, item: ContentItem) {
        self.lock().items.insert(item.id, item);
    }

    /// Store a historical version of an item.
    pub fn insert_version(&self, meta: ContentVersion, item: ContentItem) {
        let mut state = self.lock();
        let versions = state.versions.entry(meta.content_id).or_default();
        versions.retain(|(existing, _)| existing.version != meta.version);
        versions.push((meta, item));
    }

    pub fn add_link(&self, link: SoftLink) {
        self.lock().links.push(link);
    }

    /// Every write received so far, in order.
    pub fn writes(&self) -> Vec<PersistField> {
        self.lock().writes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContentRepository for InMemoryRepository {
    async fn get(&self, id: ContentId) -> Result<Option<ContentItem>> {
        Ok(self.lock().items.get(&id).cloned())
    }

    async fn list_versions(&self, id: ContentId) -> Result<Vec<ContentVersion>> {
        Ok(self
            .lock()
            .versions
            .get(&id)
            .map(|versions| versions.iter().map(|(meta, _)| meta.clone()).collect())
            .unwrap_or_default())
    }

    async fn get_version(&self, id: ContentId, version: u32) -> Result<Option<ContentItem>> {
        Ok(self.lock().versions.get(&id).and_then(|versions| {
            versions
                .iter()
                .find(|(meta, _)| meta.version == version)
                .map(|(_, item)| item.clone())
        }))
    }

    async fn reverse_links(&self, id: ContentId) -> Result<Vec<SoftLink>> {
        Ok(self
            .lock()
            .links
            .iter()
            .filter(|link| link.target == id)
            .cloned()
            .collect())
    }

    async fn persist_field(&self, command: &PersistField) -> Result<()> {
        let mut state = self.lock();
        state.writes.push(command.clone());

        let Some(item) = state.items.get_mut(&command.content_id) else {
            return Err(QnaSyncError::Storage(format!(
                "content {} not found",
                command.content_id
            )));
        };
        item.fields.insert(command.field.clone(), command.value.clone());
        let updated = item.clone();

        let versions = state.versions.entry(command.content_id).or_default();
        match command.versioning {
            Versioning::CurrentVersion => {
                if let Some((_, latest)) = versions.iter_mut().max_by_key(|(meta, _)| meta.version)
                {
                    latest
                        .fields
                        .insert(command.field.clone(), command.value.clone());
                }
            }
            Versioning::NewVersion => {
                let next = versions
                    .iter()
                    .map(|(meta, _)| meta.version)
                    .max()
                    .unwrap_or(0)
                    + 1;
                versions.push((
                    ContentVersion {
                        content_id: command.content_id,
                        version: next,
                        saved_at: Utc::now(),
                        status: VersionStatus::CheckedOut,
                        master_language: true,
                    },
                    updated,
                ));
            }
        }

        Ok(())
    }
}
