//! Application configuration for QnaSync.
//!
//! User config lives at `~/.qnasync/qnasync.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QnaSyncError, Result};
use crate::types::{ContentId, ContentRole};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "qnasync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".qnasync";

/// Regional endpoint used when no base URI is configured.
pub const DEFAULT_BASE_URI: &str =
    "https://westus.api.cognitive.microsoft.com/qnamaker/v2.0/knowledgebases";

// ---------------------------------------------------------------------------
// Config structs (matching qnasync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Knowledge-base service settings.
    #[serde(default)]
    pub qna: QnaConfig,

    /// Content repository settings.
    #[serde(default)]
    pub content: ContentConfig,

    /// Schema registrations, one per synced content type.
    #[serde(default = "default_content_types")]
    pub content_types: Vec<ContentTypeConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            qna: QnaConfig::default(),
            content: ContentConfig::default(),
            content_types: default_content_types(),
        }
    }
}

/// `[qna]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QnaConfig {
    /// Base URI of the knowledge-base API.
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// Name of the env var holding the subscription key (never store the key itself).
    #[serde(default = "default_subscription_key_env")]
    pub subscription_key_env: String,

    /// Whether content URLs are attached to create and add requests.
    #[serde(default = "default_true")]
    pub include_urls: bool,

    /// Timeout for each HTTP call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for QnaConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            subscription_key_env: default_subscription_key_env(),
            include_urls: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_uri() -> String {
    DEFAULT_BASE_URI.into()
}
fn default_subscription_key_env() -> String {
    "QNA_SUBSCRIPTION_KEY".into()
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    300
}

/// `[content]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Id of the trash / recycle-bin container.
    #[serde(default = "default_trash_container_id")]
    pub trash_container_id: ContentId,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            trash_container_id: default_trash_container_id(),
        }
    }
}

fn default_trash_container_id() -> ContentId {
    ContentId(2)
}

/// `[[content_types]]` entry: which properties of a content type hold QnA data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeConfig {
    /// Content type name, as carried by [`ContentItem::content_type`](crate::ContentItem).
    pub content_type: String,
    /// Role of the type.
    pub role: ContentRole,
    /// Property holding the question (QnA items).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_field: Option<String>,
    /// Property holding the plain-text answer (QnA items).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_field: Option<String>,
    /// Property holding a rich-text answer used when the plain one is blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rich_answer_field: Option<String>,
    /// Content area referencing QnA items (overview pages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_field: Option<String>,
    /// String property storing the knowledge-base id (overview pages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
    /// Optional property overriding the knowledge-base name (overview pages).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_field: Option<String>,
}

fn default_content_types() -> Vec<ContentTypeConfig> {
    vec![
        ContentTypeConfig {
            content_type: "QnaOverviewPage".into(),
            role: ContentRole::OverviewPage,
            question_field: None,
            answer_field: None,
            rich_answer_field: None,
            container_field: Some("QnaItems".into()),
            id_field: Some("QnaKnowledgebaseId".into()),
            name_field: None,
        },
        ContentTypeConfig {
            content_type: "QnaItemBlock".into(),
            role: ContentRole::QnaItem,
            question_field: Some("Question".into()),
            answer_field: Some("Answer".into()),
            rich_answer_field: None,
            container_field: None,
            id_field: None,
            name_field: None,
        },
    ]
}

// ---------------------------------------------------------------------------
// Runtime views (merged from config + environment)
// ---------------------------------------------------------------------------

/// Runtime configuration of the knowledge-base client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URI, without a trailing slash.
    pub base_uri: String,
    /// Subscription key sent with every request.
    pub subscription_key: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    /// Build the client view, reading the subscription key from the environment.
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        let subscription_key = resolve_subscription_key(config)?;
        Ok(Self {
            base_uri: normalize_base_uri(&config.qna.base_uri),
            subscription_key,
            timeout: Duration::from_secs(config.qna.timeout_secs),
        })
    }
}

/// Runtime configuration of the reconciliation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Attach content URLs to create and add requests.
    pub include_urls: bool,
    /// Moving content under this container counts as deletion.
    pub trash_container_id: ContentId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EngineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            include_urls: config.qna.include_urls,
            trash_container_id: config.content.trash_container_id,
        }
    }
}

/// Strip trailing slashes; fall back to the default endpoint when blank.
fn normalize_base_uri(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_BASE_URI.to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.qnasync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| QnaSyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.qnasync/qnasync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| QnaSyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| QnaSyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| QnaSyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| QnaSyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| QnaSyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the subscription key from the configured env var.
///
/// A missing key is fatal: the client cannot be used at all without it.
pub fn resolve_subscription_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.qna.subscription_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(QnaSyncError::config(format!(
            "subscription key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_uri"));
        assert!(toml_str.contains("QNA_SUBSCRIPTION_KEY"));
        assert!(toml_str.contains("QnaOverviewPage"));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").expect("parse empty");
        assert_eq!(config.qna.base_uri, DEFAULT_BASE_URI);
        assert!(config.qna.include_urls);
        assert_eq!(config.qna.timeout_secs, 300);
        assert_eq!(config.content.trash_container_id, ContentId(2));
        assert_eq!(config.content_types.len(), 2);
    }

    #[test]
    fn config_with_custom_content_types() {
        let toml_str = r#"
[qna]
base_uri = "https://kb.example.com/v2/knowledgebases/"
include_urls = false

[content]
trash_container_id = 99

[[content_types]]
content_type = "FaqPage"
role = "overview_page"
container_field = "Faqs"
id_field = "KbId"
name_field = "KbName"

[[content_types]]
content_type = "FaqBlock"
role = "qna_item"
question_field = "Q"
answer_field = "A"
rich_answer_field = "RichA"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.content_types.len(), 2);
        assert_eq!(config.content_types[0].role, ContentRole::OverviewPage);
        assert_eq!(config.content_types[1].rich_answer_field.as_deref(), Some("RichA"));

        let engine = EngineConfig::from(&config);
        assert!(!engine.include_urls);
        assert_eq!(engine.trash_container_id, ContentId(99));
    }

    #[test]
    fn base_uri_is_normalized() {
        assert_eq!(
            normalize_base_uri("https://kb.example.com/v2/"),
            "https://kb.example.com/v2"
        );
        assert_eq!(normalize_base_uri("   "), DEFAULT_BASE_URI);
    }

    #[test]
    fn missing_subscription_key_is_fatal() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.qna.subscription_key_env = "QNASYNC_TEST_NONEXISTENT_KEY_12345".into();
        let result = ClientConfig::resolve(&config);
        let err = result.unwrap_err();
        assert!(matches!(err, QnaSyncError::Config { .. }));
        assert!(err.to_string().contains("subscription key not found"));
    }
}
