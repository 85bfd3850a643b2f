//! Core domain types shared by the engine, the client and the repository adapters.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ContentId
// ---------------------------------------------------------------------------

/// Identifier of a content item in the content repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub i64);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ContentId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

// ---------------------------------------------------------------------------
// Content items
// ---------------------------------------------------------------------------

/// Value of a single content property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Plain string.
    Text(String),
    /// Rich text (XHTML markup).
    Html(String),
    /// A content area: ordered references to other content items.
    References(Vec<ContentId>),
    /// Boolean flag.
    Bool(bool),
}

impl FieldValue {
    /// The plain string, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The referenced ids, if this is a `References` value.
    pub fn as_references(&self) -> Option<&[ContentId]> {
        match self {
            Self::References(ids) => Some(ids),
            _ => None,
        }
    }
}

/// A content item (page or block) as loaded from the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Repository identifier.
    pub id: ContentId,
    /// Content type name, used as the schema registry key.
    pub content_type: String,
    /// Display name of the item.
    pub name: String,
    /// Resolved public URL, when the item is routable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// The "changed on publish" marker set by the editor.
    #[serde(default)]
    pub changed: bool,
    /// Property values keyed by property name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl ContentItem {
    /// Create an item with no fields.
    pub fn new(id: ContentId, content_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            content_type: content_type.into(),
            name: name.into(),
            url: None,
            changed: false,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Builder-style URL setter.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Builder-style "changed on publish" setter.
    pub fn with_changed(mut self, changed: bool) -> Self {
        self.changed = changed;
        self
    }

    /// Look up a property value.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Look up a `Text` property value.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(FieldValue::as_text)
    }
}

// ---------------------------------------------------------------------------
// Version history
// ---------------------------------------------------------------------------

/// Lifecycle status of a stored content version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    CheckedOut,
    Published,
    PreviouslyPublished,
}

impl VersionStatus {
    /// Storage key for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckedOut => "checked_out",
            Self::Published => "published",
            Self::PreviouslyPublished => "previously_published",
        }
    }
}

impl std::str::FromStr for VersionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "checked_out" => Ok(Self::CheckedOut),
            "published" => Ok(Self::Published),
            "previously_published" => Ok(Self::PreviouslyPublished),
            other => Err(format!("unknown version status: {other}")),
        }
    }
}

/// Metadata of one stored version of a content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVersion {
    /// The item this version belongs to.
    pub content_id: ContentId,
    /// Version number, unique per item.
    pub version: u32,
    /// When the version was saved.
    pub saved_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: VersionStatus,
    /// Whether the version belongs to the master language branch.
    #[serde(default = "default_true")]
    pub master_language: bool,
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Soft links
// ---------------------------------------------------------------------------

/// Kind of a soft link between two content items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// The owner references the target as content (e.g. in a content area).
    PageReference,
    /// Any other link (hyperlinks, images, ...).
    Other,
}

impl LinkKind {
    /// Storage key for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageReference => "page_reference",
            Self::Other => "other",
        }
    }
}

/// An entry of the reverse-reference index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftLink {
    /// The referring item. `None` for links whose owner is unknown.
    #[serde(default)]
    pub owner: Option<ContentId>,
    /// The referenced item.
    pub target: ContentId,
    /// Link kind.
    pub kind: LinkKind,
}

// ---------------------------------------------------------------------------
// QnA pairs
// ---------------------------------------------------------------------------

/// A question/answer unit synced to a knowledge base.
///
/// The remote service keys entries by `question`, so that field is the
/// pair's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QnaPair {
    pub question: String,
    pub answer: String,
}

impl QnaPair {
    /// Build a pair, or `None` when either side is blank.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Option<Self> {
        let question = question.into();
        let answer = answer.into();
        if question.trim().is_empty() || answer.trim().is_empty() {
            return None;
        }
        Some(Self { question, answer })
    }
}

/// Role a content type plays in synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentRole {
    /// Owns a knowledge base and aggregates QnA items.
    OverviewPage,
    /// Holds a single QnA pair.
    QnaItem,
}

// ---------------------------------------------------------------------------
// Repository commands
// ---------------------------------------------------------------------------

/// How a [`PersistField`] write interacts with version history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Versioning {
    /// Overwrite the current version in place; no new version, no publish cycle.
    CurrentVersion,
    /// Save as a new version.
    NewVersion,
}

/// Command asking the repository to write a single property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistField {
    pub content_id: ContentId,
    pub field: String,
    pub value: FieldValue,
    pub versioning: Versioning,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_parses_and_displays() {
        let id: ContentId = " 42 ".parse().expect("parse id");
        assert_eq!(id, ContentId(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<ContentId>().is_err());
    }

    #[test]
    fn qna_pair_rejects_blank_sides() {
        assert!(QnaPair::new("Q1", "A1").is_some());
        assert!(QnaPair::new("  ", "A1").is_none());
        assert!(QnaPair::new("Q1", "\n").is_none());
    }

    #[test]
    fn field_value_json_shape() {
        let value = FieldValue::References(vec![ContentId(7), ContentId(8)]);
        let json = serde_json::to_string(&value).expect("serialize");
        assert_eq!(json, r#"{"type":"references","value":[7,8]}"#);
    }

    #[test]
    fn content_item_deserializes_with_defaults() {
        let json = r#"{
            "id": 5,
            "content_type": "QnaItemBlock",
            "name": "Opening hours",
            "fields": {
                "Question": {"type": "text", "value": "When are you open?"}
            }
        }"#;
        let item: ContentItem = serde_json::from_str(json).expect("deserialize");
        assert_eq!(item.id, ContentId(5));
        assert!(!item.changed);
        assert!(item.url.is_none());
        assert_eq!(item.text("Question"), Some("When are you open?"));
        assert_eq!(item.text("Answer"), None);
    }

    #[test]
    fn version_status_roundtrips_through_storage_key() {
        for status in [
            VersionStatus::CheckedOut,
            VersionStatus::Published,
            VersionStatus::PreviouslyPublished,
        ] {
            assert_eq!(status.as_str().parse::<VersionStatus>(), Ok(status));
        }
    }
}
