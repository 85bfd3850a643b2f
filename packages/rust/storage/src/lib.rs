//! libSQL-backed content repository (offline, local file).
//!
//! The [`Storage`] struct wraps a libSQL database holding content items,
//! their version history and the reverse-reference index, and implements
//! [`ContentRepository`] over it.
//!
//! **Access rules:**
//! - `qnasync import` and `qnasync replay`: read-write via [`Storage::open`]
//! - Inspection tools: read-only via [`Storage::open_readonly`]

mod migrations;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, Row, params};
use qnasync_shared::{
    ContentFixture, ContentId, ContentItem, ContentRepository, ContentVersion, FieldValue,
    LinkKind, PersistField, QnaSyncError, Result, SoftLink, VersionStatus, Versioning,
};
use tracing::{debug, info, instrument};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

/// Row counts written by [`Storage::import_fixture`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub content: usize,
    pub versions: usize,
    pub links: usize,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| QnaSyncError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        QnaSyncError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(QnaSyncError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Content operations
    // -----------------------------------------------------------------------

    /// Insert or replace the current version of an item.
    pub async fn upsert_content(&self, item: &ContentItem) -> Result<()> {
        self.check_writable()?;
        let fields_json = encode_fields(&item.fields)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO content (id, content_type, name, url, changed, fields_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                   content_type = excluded.content_type,
                   name = excluded.name,
                   url = excluded.url,
                   changed = excluded.changed,
                   fields_json = excluded.fields_json,
                   updated_at = excluded.updated_at",
                params![
                    item.id.0,
                    item.content_type.as_str(),
                    item.name.as_str(),
                    item.url.as_deref(),
                    i64::from(item.changed),
                    fields_json,
                    now,
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Delete the current version of an item. History and links stay.
    pub async fn delete_content(&self, id: ContentId) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM content WHERE id = ?1", params![id.0])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Store a historical version, replacing one with the same number.
    pub async fn insert_version(&self, meta: &ContentVersion, item: &ContentItem) -> Result<()> {
        self.check_writable()?;
        let fields_json = encode_fields(&item.fields)?;
        self.conn
            .execute(
                "INSERT INTO content_version
                   (content_id, version, saved_at, status, master_language, name, fields_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(content_id, version) DO UPDATE SET
                   saved_at = excluded.saved_at,
                   status = excluded.status,
                   master_language = excluded.master_language,
                   name = excluded.name,
                   fields_json = excluded.fields_json",
                params![
                    meta.content_id.0,
                    i64::from(meta.version),
                    meta.saved_at.to_rfc3339(),
                    meta.status.as_str(),
                    i64::from(meta.master_language),
                    item.name.as_str(),
                    fields_json,
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Link operations
    // -----------------------------------------------------------------------

    /// Insert a soft link.
    pub async fn insert_link(&self, link: &SoftLink) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "INSERT INTO soft_link (owner_id, target_id, kind) VALUES (?1, ?2, ?3)",
                params![link.owner.map(|o| o.0), link.target.0, link.kind.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fixtures
    // -----------------------------------------------------------------------

    /// Load every item, version and link of a fixture document.
    #[instrument(skip_all, fields(items = fixture.content.len()))]
    pub async fn import_fixture(&self, fixture: &ContentFixture) -> Result<ImportStats> {
        self.check_writable()?;
        fixture.validate()?;

        let mut stats = ImportStats::default();
        for entry in &fixture.content {
            self.upsert_content(&entry.item).await?;
            stats.content += 1;

            for version in &entry.versions {
                self.insert_version(
                    &version.meta(entry.item.id),
                    &version.materialize(&entry.item),
                )
                .await?;
                stats.versions += 1;
            }
        }
        for link in &fixture.links {
            self.insert_link(link).await?;
            stats.links += 1;
        }

        info!(
            content = stats.content,
            versions = stats.versions,
            links = stats.links,
            "fixture imported"
        );
        Ok(stats)
    }

    // -----------------------------------------------------------------------
    // Version helpers
    // -----------------------------------------------------------------------

    async fn latest_version_number(&self, id: ContentId) -> Result<Option<u32>> {
        let mut rows = self
            .conn
            .query(
                "SELECT MAX(version) FROM content_version WHERE content_id = ?1",
                params![id.0],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<u32>(0).ok()),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn update_version_fields(
        &self,
        id: ContentId,
        version: u32,
        fields: &BTreeMap<String, FieldValue>,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE content_version SET fields_json = ?1 WHERE content_id = ?2 AND version = ?3",
                params![encode_fields(fields)?, id.0, i64::from(version)],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}

impl ContentRepository for Storage {
    async fn get(&self, id: ContentId) -> Result<Option<ContentItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, content_type, name, url, changed, fields_json
                 FROM content WHERE id = ?1",
                params![id.0],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_content(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn list_versions(&self, id: ContentId) -> Result<Vec<ContentVersion>> {
        let mut rows = self
            .conn
            .query(
                "SELECT content_id, version, saved_at, status, master_language
                 FROM content_version WHERE content_id = ?1 ORDER BY version",
                params![id.0],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_version(&row)?);
        }
        Ok(results)
    }

    async fn get_version(&self, id: ContentId, version: u32) -> Result<Option<ContentItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT c.id, c.content_type, v.name, c.url, c.changed, v.fields_json
                 FROM content_version v JOIN content c ON c.id = v.content_id
                 WHERE v.content_id = ?1 AND v.version = ?2",
                params![id.0, i64::from(version)],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_content(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn reverse_links(&self, id: ContentId) -> Result<Vec<SoftLink>> {
        let mut rows = self
            .conn
            .query(
                "SELECT owner_id, target_id, kind FROM soft_link WHERE target_id = ?1 ORDER BY id",
                params![id.0],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let kind = match row.get::<String>(2).map_err(storage_err)?.as_str() {
                "page_reference" => LinkKind::PageReference,
                _ => LinkKind::Other,
            };
            results.push(SoftLink {
                owner: row.get::<i64>(0).ok().map(ContentId),
                target: ContentId(row.get::<i64>(1).map_err(storage_err)?),
                kind,
            });
        }
        Ok(results)
    }

    #[instrument(skip_all, fields(content_id = %command.content_id, field = %command.field))]
    async fn persist_field(&self, command: &PersistField) -> Result<()> {
        self.check_writable()?;

        let Some(mut item) = self.get(command.content_id).await? else {
            return Err(QnaSyncError::Storage(format!(
                "content {} not found",
                command.content_id
            )));
        };
        item.fields
            .insert(command.field.clone(), command.value.clone());
        self.upsert_content(&item).await?;

        let latest = self.latest_version_number(command.content_id).await?;
        match command.versioning {
            Versioning::CurrentVersion => {
                if let Some(version) = latest {
                    self.update_version_fields(command.content_id, version, &item.fields)
                        .await?;
                }
            }
            Versioning::NewVersion => {
                let meta = ContentVersion {
                    content_id: command.content_id,
                    version: latest.unwrap_or(0) + 1,
                    saved_at: Utc::now(),
                    status: VersionStatus::CheckedOut,
                    master_language: true,
                };
                self.insert_version(&meta, &item).await?;
            }
        }

        debug!("field persisted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn storage_err(e: impl std::fmt::Display) -> QnaSyncError {
    QnaSyncError::Storage(e.to_string())
}

fn encode_fields(fields: &BTreeMap<String, FieldValue>) -> Result<String> {
    serde_json::to_string(fields).map_err(storage_err)
}

fn row_to_content(row: &Row) -> Result<ContentItem> {
    let fields_json = row.get::<String>(5).map_err(storage_err)?;
    let fields: BTreeMap<String, FieldValue> =
        serde_json::from_str(&fields_json).map_err(storage_err)?;

    Ok(ContentItem {
        id: ContentId(row.get::<i64>(0).map_err(storage_err)?),
        content_type: row.get::<String>(1).map_err(storage_err)?,
        name: row.get::<String>(2).map_err(storage_err)?,
        url: row.get::<String>(3).ok(),
        changed: row.get::<i64>(4).map_err(storage_err)? != 0,
        fields,
    })
}

fn row_to_version(row: &Row) -> Result<ContentVersion> {
    let saved_at = row.get::<String>(2).map_err(storage_err)?;
    let saved_at = DateTime::parse_from_rfc3339(&saved_at)
        .map_err(storage_err)?
        .with_timezone(&Utc);
    let status: VersionStatus = row
        .get::<String>(3)
        .map_err(storage_err)?
        .parse()
        .map_err(storage_err)?;

    Ok(ContentVersion {
        content_id: ContentId(row.get::<i64>(0).map_err(storage_err)?),
        version: row.get::<u32>(1).map_err(storage_err)?,
        saved_at,
        status,
        master_language: row.get::<i64>(4).map_err(storage_err)? != 0,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("qnasync_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn fixture() -> ContentFixture {
        ContentFixture::from_json(include_str!("../../../../fixtures/json/content.fixture.json"))
            .expect("fixture")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("qnasync_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 2);
    }

    #[tokio::test]
    async fn content_roundtrip() {
        let storage = test_storage().await;
        let item = ContentItem::new(ContentId(11), "QnaItemBlock", "Opening hours")
            .with_url("https://example.com/hours")
            .with_changed(true)
            .with_field("Question", FieldValue::Text("When are you open?".into()))
            .with_field("Answer", FieldValue::Html("<p>9-17</p>".into()));

        storage.upsert_content(&item).await.expect("upsert");
        let found = storage.get(ContentId(11)).await.expect("get").expect("exists");
        assert_eq!(found, item);

        assert!(storage.get(ContentId(99)).await.unwrap().is_none());

        storage.delete_content(ContentId(11)).await.expect("delete");
        assert!(storage.get(ContentId(11)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn import_fixture_loads_everything() {
        let storage = test_storage().await;
        let stats = storage.import_fixture(&fixture()).await.expect("import");
        assert_eq!(
            stats,
            ImportStats {
                content: 6,
                versions: 3,
                links: 5,
            }
        );

        let versions = storage.list_versions(ContentId(10)).await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].status, VersionStatus::PreviouslyPublished);

        let v1 = storage
            .get_version(ContentId(10), 1)
            .await
            .unwrap()
            .expect("version 1");
        assert_eq!(
            v1.field("QnaItems").and_then(FieldValue::as_references),
            Some(&[ContentId(11)][..])
        );
        assert_eq!(v1.name, "Customer service FAQ");
    }

    #[tokio::test]
    async fn reverse_links_keep_insertion_order() {
        let storage = test_storage().await;
        storage.import_fixture(&fixture()).await.unwrap();

        let links = storage.reverse_links(ContentId(11)).await.unwrap();
        let owners: Vec<_> = links.iter().map(|l| (l.owner, l.kind)).collect();
        assert_eq!(
            owners,
            vec![
                (Some(ContentId(10)), LinkKind::PageReference),
                (Some(ContentId(20)), LinkKind::PageReference),
                (Some(ContentId(10)), LinkKind::Other),
            ]
        );
    }

    #[tokio::test]
    async fn persist_current_version_rewrites_latest_version() {
        let storage = test_storage().await;
        storage.import_fixture(&fixture()).await.unwrap();

        storage
            .persist_field(&PersistField {
                content_id: ContentId(10),
                field: "QnaKnowledgebaseId".into(),
                value: FieldValue::Text(String::new()),
                versioning: Versioning::CurrentVersion,
            })
            .await
            .expect("persist");

        let current = storage.get(ContentId(10)).await.unwrap().unwrap();
        assert_eq!(current.text("QnaKnowledgebaseId"), Some(""));

        let v2 = storage.get_version(ContentId(10), 2).await.unwrap().unwrap();
        assert_eq!(v2.text("QnaKnowledgebaseId"), Some(""));
        let v1 = storage.get_version(ContentId(10), 1).await.unwrap().unwrap();
        assert_eq!(v1.text("QnaKnowledgebaseId"), Some("kb1"));

        assert_eq!(storage.list_versions(ContentId(10)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn persist_new_version_appends() {
        let storage = test_storage().await;
        storage.import_fixture(&fixture()).await.unwrap();

        storage
            .persist_field(&PersistField {
                content_id: ContentId(12),
                field: "Answer".into(),
                value: FieldValue::Text("Within 60 days.".into()),
                versioning: Versioning::NewVersion,
            })
            .await
            .expect("persist");

        let versions = storage.list_versions(ContentId(12)).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version, 1);
        assert_eq!(versions[0].status, VersionStatus::CheckedOut);
    }

    #[tokio::test]
    async fn persist_to_missing_content_fails() {
        let storage = test_storage().await;
        let result = storage
            .persist_field(&PersistField {
                content_id: ContentId(404),
                field: "X".into(),
                value: FieldValue::Bool(true),
                versioning: Versioning::CurrentVersion,
            })
            .await;
        assert!(matches!(result, Err(QnaSyncError::Storage(_))));
    }

    #[tokio::test]
    async fn unreadable_version_row_fails_the_listing() {
        let storage = test_storage().await;
        storage.import_fixture(&fixture()).await.unwrap();
        storage
            .conn
            .execute(
                "INSERT INTO content_version
                 (content_id, version, saved_at, status, master_language, name, fields_json)
                 VALUES (10, 3, 'not a timestamp', 'published', 1, 'FAQ', '{}')",
                params![],
            )
            .await
            .unwrap();

        let result = storage.list_versions(ContentId(10)).await;
        assert!(matches!(result, Err(QnaSyncError::Storage(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("qnasync_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.upsert_content(&ContentItem::new(ContentId(1), "QnaItemBlock", "a"))
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert!(ro.get(ContentId(1)).await.unwrap().is_some());

        let result = ro
            .upsert_content(&ContentItem::new(ContentId(2), "QnaItemBlock", "b"))
            .await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }
}
