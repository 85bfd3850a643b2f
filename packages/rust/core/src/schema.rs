//! Schema registry: which content types take part in synchronization and
//! which of their properties hold QnA data.
//!
//! Built once at startup from the `[[content_types]]` configuration.

use std::collections::HashMap;

use qnasync_shared::{ContentItem, ContentRole, ContentTypeConfig, QnaSyncError, Result};
use tracing::debug;

/// Classification of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    OverviewPage,
    QnaItem,
    Other,
}

/// Property layout of an overview page type.
///
/// Missing fields are legal here; they cancel publishing later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewSchema {
    pub container_field: Option<String>,
    pub id_field: Option<String>,
    pub name_field: Option<String>,
}

/// Property layout of a QnA item type. At least one answer field is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QnaItemSchema {
    pub question_field: String,
    pub answer_field: Option<String>,
    pub rich_answer_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Schema {
    Overview(OverviewSchema),
    QnaItem(QnaItemSchema),
}

/// Lookup table from content type name to schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    /// Build and validate the registry.
    ///
    /// Fails with a config error on duplicate content types or on a QnA
    /// item type that lacks a question field or any answer field.
    pub fn from_config(types: &[ContentTypeConfig]) -> Result<Self> {
        let mut schemas = HashMap::with_capacity(types.len());

        for entry in types {
            let name = entry.content_type.trim();
            if name.is_empty() {
                return Err(QnaSyncError::config("content type name is empty"));
            }

            let schema = match entry.role {
                ContentRole::OverviewPage => Schema::Overview(OverviewSchema {
                    container_field: non_blank(&entry.container_field),
                    id_field: non_blank(&entry.id_field),
                    name_field: non_blank(&entry.name_field),
                }),
                ContentRole::QnaItem => {
                    let question_field = non_blank(&entry.question_field).ok_or_else(|| {
                        QnaSyncError::config(format!(
                            "content type '{name}' has no question field"
                        ))
                    })?;
                    let answer_field = non_blank(&entry.answer_field);
                    let rich_answer_field = non_blank(&entry.rich_answer_field);
                    if answer_field.is_none() && rich_answer_field.is_none() {
                        return Err(QnaSyncError::config(format!(
                            "content type '{name}' has no answer field"
                        )));
                    }
                    Schema::QnaItem(QnaItemSchema {
                        question_field,
                        answer_field,
                        rich_answer_field,
                    })
                }
            };

            if schemas.insert(name.to_string(), schema).is_some() {
                return Err(QnaSyncError::config(format!(
                    "content type '{name}' is registered more than once"
                )));
            }
        }

        debug!(count = schemas.len(), "schema registry built");
        Ok(Self { schemas })
    }

    /// Classify an item by its content type.
    pub fn classify(&self, content: &ContentItem) -> ContentKind {
        match self.schemas.get(&content.content_type) {
            Some(Schema::Overview(_)) => ContentKind::OverviewPage,
            Some(Schema::QnaItem(_)) => ContentKind::QnaItem,
            None => ContentKind::Other,
        }
    }

    /// Overview schema for the item's type.
    pub fn overview(&self, content: &ContentItem) -> Option<&OverviewSchema> {
        match self.schemas.get(&content.content_type) {
            Some(Schema::Overview(schema)) => Some(schema),
            _ => None,
        }
    }

    /// QnA item schema for the item's type.
    pub fn qna_item(&self, content: &ContentItem) -> Option<&QnaItemSchema> {
        match self.schemas.get(&content.content_type) {
            Some(Schema::QnaItem(schema)) => Some(schema),
            _ => None,
        }
    }

    /// The knowledge-base id stored on an overview page, if non-blank.
    pub fn knowledge_base_id(&self, page: &ContentItem) -> Option<String> {
        let field = self.overview(page)?.id_field.as_deref()?;
        page.text(field)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }

    /// Number of registered content types.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// `true` when no content type is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
