//! JSON fixture documents describing a content repository.
//!
//! Used to seed the libSQL adapter (`qnasync import`) and the in-memory
//! repository in tests.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{QnaSyncError, Result};
use crate::types::{ContentId, ContentItem, ContentVersion, FieldValue, SoftLink, VersionStatus};

/// A complete repository snapshot: items, their version history and links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentFixture {
    #[serde(default)]
    pub content: Vec<FixtureContent>,
    #[serde(default)]
    pub links: Vec<SoftLink>,
}

/// One content item plus its stored versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureContent {
    #[serde(flatten)]
    pub item: ContentItem,
    #[serde(default)]
    pub versions: Vec<FixtureVersion>,
}

/// A stored version. Fields default to empty; name falls back to the item's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureVersion {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub status: VersionStatus,
    #[serde(default = "default_true")]
    pub master_language: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
}

fn default_true() -> bool {
    true
}

impl FixtureVersion {
    /// Version metadata for the owning item.
    pub fn meta(&self, content_id: ContentId) -> ContentVersion {
        ContentVersion {
            content_id,
            version: self.version,
            saved_at: self.saved_at,
            status: self.status,
            master_language: self.master_language,
        }
    }

    /// The item as it was at this version.
    pub fn materialize(&self, current: &ContentItem) -> ContentItem {
        ContentItem {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            fields: self.fields.clone(),
            ..current.clone()
        }
    }
}

impl ContentFixture {
    /// Parse and validate a fixture document.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Self = serde_json::from_str(json)
            .map_err(|e| QnaSyncError::validation(format!("invalid fixture JSON: {e}")))?;
        fixture.validate()?;
        Ok(fixture)
    }

    /// Reject duplicate content ids and duplicate version numbers per item.
    pub fn validate(&self) -> Result<()> {
        let mut ids = HashSet::new();
        for entry in &self.content {
            if !ids.insert(entry.item.id) {
                return Err(QnaSyncError::validation(format!(
                    "duplicate content id {} in fixture",
                    entry.item.id
                )));
            }

            let mut versions = HashSet::new();
            for version in &entry.versions {
                if !versions.insert(version.version) {
                    return Err(QnaSyncError::validation(format!(
                        "duplicate version {} for content {}",
                        version.version, entry.item.id
                    )));
                }
            }
        }
        Ok(())
    }
}
