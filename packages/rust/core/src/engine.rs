//! Reconciliation engine: turns content lifecycle events into knowledge-base calls.
//!
//! Each handler is stateless. It reads what it needs from the repository,
//! issues remote calls one at a time, and reports what it did. Nothing is
//! retried: when the Nth call of a fan-out fails, the earlier ones stay
//! applied and the error propagates. The one rollback is a knowledge base
//! created during Publishing whose id could not be stored.

use qnasync_client::{CreateKnowledgeBaseRequest, KnowledgeBaseClient, UpdateRequest};
use qnasync_shared::{
    AppConfig, ClientConfig, ContentId, ContentItem, ContentRepository, EngineConfig, FieldValue,
    PersistField, QnaPair, Result, Versioning,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::diff::{Snapshot, SnapshotDiff};
use crate::extractor::QnaPairExtractor;
use crate::history;
use crate::resolver::ReferenceResolver;
use crate::schema::{ContentKind, SchemaRegistry};

// ---------------------------------------------------------------------------
// Events & outcomes
// ---------------------------------------------------------------------------

/// A content lifecycle event raised by the host CMS.
#[derive(Debug, Clone)]
pub enum ContentEvent {
    /// About to publish; the outcome can cancel the publish.
    Publishing(ContentItem),
    /// Publish committed.
    Published(ContentItem),
    /// About to move under `target`.
    Moving { content: ContentItem, target: ContentId },
    /// Permanently deleted.
    Deleted(ContentItem),
}

impl ContentEvent {
    pub fn content(&self) -> &ContentItem {
        match self {
            Self::Publishing(c) | Self::Published(c) | Self::Deleted(c) => c,
            Self::Moving { content, .. } => content,
        }
    }
}

/// Verdict of the Publishing handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PublishDecision {
    Proceed,
    Cancel { reason: String },
}

impl PublishDecision {
    fn cancel(reason: impl Into<String>) -> Self {
        Self::Cancel {
            reason: reason.into(),
        }
    }
}

/// A knowledge-base operation the engine performed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum KbOperation {
    Updated { kb_id: String, request: UpdateRequest },
    Published { kb_id: String },
    Deleted { kb_id: String },
}

/// What a Published, Moving or Deleted handler did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub operations: Vec<KbOperation>,
    pub persisted: Vec<PersistField>,
}

impl SyncReport {
    /// `true` when no remote call was made and nothing was written.
    pub fn is_noop(&self) -> bool {
        self.operations.is_empty() && self.persisted.is_empty()
    }

    /// Update requests sent, with their target knowledge base.
    pub fn updates(&self) -> impl Iterator<Item = (&str, &UpdateRequest)> {
        self.operations.iter().filter_map(|op| match op {
            KbOperation::Updated { kb_id, request } => Some((kb_id.as_str(), request)),
            _ => None,
        })
    }
}

/// Result of [`ReconciliationEngine::handle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventOutcome {
    Decision(PublishDecision),
    Report(SyncReport),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Keeps remote knowledge bases in step with overview pages and QnA items.
#[derive(Debug)]
pub struct ReconciliationEngine<R> {
    repo: R,
    client: KnowledgeBaseClient,
    registry: SchemaRegistry,
    config: EngineConfig,
}

impl<R: ContentRepository> ReconciliationEngine<R> {
    pub fn new(
        repo: R,
        client: KnowledgeBaseClient,
        registry: SchemaRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            repo,
            client,
            registry,
            config,
        }
    }

    /// Build the client, the registry and the engine settings from the app config.
    pub fn from_config(repo: R, config: &AppConfig) -> Result<Self> {
        let client = KnowledgeBaseClient::new(&ClientConfig::resolve(config)?)?;
        let registry = SchemaRegistry::from_config(&config.content_types)?;
        Ok(Self::new(repo, client, registry, EngineConfig::from(config)))
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Dispatch an event to its handler.
    pub async fn handle(&self, event: &ContentEvent) -> Result<EventOutcome> {
        match event {
            ContentEvent::Publishing(content) => {
                Ok(EventOutcome::Decision(self.on_publishing(content).await))
            }
            ContentEvent::Published(content) => {
                self.on_published(content).await.map(EventOutcome::Report)
            }
            ContentEvent::Moving { content, target } => {
                self.on_moving(content, *target).await.map(EventOutcome::Report)
            }
            ContentEvent::Deleted(content) => {
                self.on_deleted(content).await.map(EventOutcome::Report)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Publishing
    // -----------------------------------------------------------------------

    /// Make sure an overview page owns a knowledge base before it is published.
    ///
    /// Creates an empty knowledge base when the page has no id yet and
    /// stores the new id without creating a version. Any failure cancels.
    #[instrument(skip_all, fields(content_id = %content.id))]
    pub async fn on_publishing(&self, content: &ContentItem) -> PublishDecision {
        let Some(schema) = self.registry.overview(content) else {
            return PublishDecision::Proceed;
        };
        if schema.container_field.is_none() {
            warn!("overview page type has no container property");
            return PublishDecision::cancel("missing container property");
        }
        let Some(id_field) = schema.id_field.as_deref() else {
            warn!("overview page type has no id property");
            return PublishDecision::cancel("missing id property");
        };

        if self.registry.knowledge_base_id(content).is_some() {
            debug!("knowledge base already exists");
            return PublishDecision::Proceed;
        }

        let name = schema
            .name_field
            .as_deref()
            .and_then(|field| content.text(field))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(content.name.as_str());

        let mut request = CreateKnowledgeBaseRequest::empty(name);
        request.urls = self.source_urls(content);

        let kb_id = match self.client.create(&request).await {
            Ok(id) => id,
            Err(e) => return PublishDecision::cancel(e.to_string()),
        };
        if kb_id.trim().is_empty() {
            warn!("knowledge base service returned no id");
            return PublishDecision::cancel("knowledge base service returned no id");
        }

        let command = PersistField {
            content_id: content.id,
            field: id_field.to_string(),
            value: FieldValue::Text(kb_id.clone()),
            versioning: Versioning::CurrentVersion,
        };
        if let Err(e) = self.repo.persist_field(&command).await {
            warn!(error = %e, %kb_id, "failed to store knowledge base id");
            // Nothing local points at the new knowledge base, so drop it.
            if let Err(delete_err) = self.client.delete(&kb_id).await {
                warn!(error = %delete_err, %kb_id, "failed to delete unowned knowledge base");
            }
            return PublishDecision::cancel(e.to_string());
        }

        info!(%kb_id, "knowledge base created for overview page");
        PublishDecision::Proceed
    }

    // -----------------------------------------------------------------------
    // Published
    // -----------------------------------------------------------------------

    /// Push the pairs changed by a publish to the affected knowledge bases.
    #[instrument(skip_all, fields(content_id = %content.id))]
    pub async fn on_published(&self, content: &ContentItem) -> Result<SyncReport> {
        match self.registry.classify(content) {
            ContentKind::OverviewPage => self.published_overview_page(content).await,
            ContentKind::QnaItem => self.published_qna_item(content).await,
            ContentKind::Other => Ok(SyncReport::default()),
        }
    }

    async fn published_overview_page(&self, page: &ContentItem) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        let Some(kb_id) = self.registry.knowledge_base_id(page) else {
            debug!("overview page has no knowledge base id, skipping");
            return Ok(report);
        };

        let extractor = self.extractor();
        let current = extractor.extract_snapshot(&self.repo, page).await?;
        let previous = match history::load_previous_published(&self.repo, page.id).await? {
            Some(old) => extractor.extract_snapshot(&self.repo, &old).await?,
            None => Snapshot::default(),
        };

        let diff = SnapshotDiff::compute(&previous, &current);
        debug!(
            add = diff.to_add.len(),
            delete = diff.to_delete.len(),
            "snapshot diff computed"
        );

        if diff.is_empty() {
            debug!("no pair changes");
        } else {
            let request = diff.into_request(self.source_urls(page));
            self.client.update(&kb_id, &request).await?;
            report.operations.push(KbOperation::Updated {
                kb_id: kb_id.clone(),
                request,
            });
        }

        if page.changed && self.client.publish(&kb_id).await? {
            report.operations.push(KbOperation::Published { kb_id });
        }

        Ok(report)
    }

    async fn published_qna_item(&self, item: &ContentItem) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        let extractor = self.extractor();

        let Some(pair) = extractor.extract_pair(item) else {
            debug!("item holds no valid pair, skipping");
            return Ok(report);
        };

        let pages = self.referencing_pages(item.id).await?;
        if pages.is_empty() {
            debug!("item is not referenced by any overview page");
            return Ok(report);
        }

        let stale: Vec<QnaPair> = history::load_previous_published(&self.repo, item.id)
            .await?
            .and_then(|old| extractor.extract_pair(&old))
            .filter(|old| old.question != pair.question)
            .into_iter()
            .collect();

        let mut urls: Vec<String> = Vec::new();
        for url in pages.iter().flat_map(|page| self.source_urls(page)) {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        let request = UpdateRequest::new(vec![pair], stale).with_urls(urls);

        self.fan_out(&pages, &request, &mut report).await?;
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Moving & Deleted
    // -----------------------------------------------------------------------

    /// Treat a move into the trash container as a removal.
    #[instrument(skip_all, fields(content_id = %content.id, target = %target))]
    pub async fn on_moving(&self, content: &ContentItem, target: ContentId) -> Result<SyncReport> {
        if target != self.config.trash_container_id {
            debug!("move target is not the trash container");
            return Ok(SyncReport::default());
        }
        self.remove(content, true).await
    }

    /// Remove deleted content from its knowledge bases.
    #[instrument(skip_all, fields(content_id = %content.id))]
    pub async fn on_deleted(&self, content: &ContentItem) -> Result<SyncReport> {
        self.remove(content, false).await
    }

    async fn remove(&self, content: &ContentItem, write_back: bool) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        match self.registry.classify(content) {
            ContentKind::OverviewPage => {
                let Some(kb_id) = self.registry.knowledge_base_id(content) else {
                    debug!("overview page has no knowledge base id");
                    return Ok(report);
                };

                if self.client.delete(&kb_id).await? {
                    report.operations.push(KbOperation::Deleted { kb_id });
                }

                if !write_back {
                    return Ok(report);
                }
                let id_field = self
                    .registry
                    .overview(content)
                    .and_then(|schema| schema.id_field.clone());
                if let Some(field) = id_field {
                    let command = PersistField {
                        content_id: content.id,
                        field,
                        value: FieldValue::Text(String::new()),
                        versioning: Versioning::CurrentVersion,
                    };
                    self.repo.persist_field(&command).await?;
                    report.persisted.push(command);
                }
            }
            ContentKind::QnaItem => {
                let Some(pair) = self.extractor().extract_pair(content) else {
                    debug!("item holds no valid pair");
                    return Ok(report);
                };
                let pages = self.referencing_pages(content.id).await?;
                let request = UpdateRequest::delete_only(vec![pair]);
                self.fan_out(&pages, &request, &mut report).await?;
            }
            ContentKind::Other => {}
        }

        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn extractor(&self) -> QnaPairExtractor<'_> {
        QnaPairExtractor::new(&self.registry)
    }

    async fn referencing_pages(&self, id: ContentId) -> Result<Vec<ContentItem>> {
        ReferenceResolver::new(&self.registry)
            .find_referencing_overview_pages(&self.repo, id)
            .await
    }

    /// Send the same request to every page's knowledge base, in order.
    async fn fan_out(
        &self,
        pages: &[ContentItem],
        request: &UpdateRequest,
        report: &mut SyncReport,
    ) -> Result<()> {
        for page in pages {
            let Some(kb_id) = self.registry.knowledge_base_id(page) else {
                continue;
            };
            self.client.update(&kb_id, request).await?;
            report.operations.push(KbOperation::Updated {
                kb_id,
                request: request.clone(),
            });
        }
        Ok(())
    }

    fn source_urls(&self, content: &ContentItem) -> Vec<String> {
        match (&content.url, self.config.include_urls) {
            (Some(url), true) if !url.trim().is_empty() => vec![url.clone()],
            _ => Vec::new(),
        }
    }
}
