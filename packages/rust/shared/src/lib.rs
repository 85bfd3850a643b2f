//! Shared types, error model, and configuration for QnaSync.
//!
//! This crate is the foundation depended on by all other QnaSync crates.
//! It provides:
//! - [`QnaSyncError`]: the unified error type
//! - Domain types ([`ContentItem`], [`QnaPair`], [`SoftLink`], [`PersistField`])
//! - The [`ContentRepository`] seam implemented by hosts and adapters
//! - [`ContentFixture`] documents for seeding repositories
//! - Configuration ([`AppConfig`], [`ClientConfig`], [`EngineConfig`], config loading)

pub mod config;
pub mod error;
pub mod fixture;
pub mod repository;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClientConfig, ContentConfig, ContentTypeConfig, DEFAULT_BASE_URI, EngineConfig,
    QnaConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_subscription_key,
};
pub use error::{BoxError, QnaSyncError, Result};
pub use fixture::{ContentFixture, FixtureContent, FixtureVersion};
pub use repository::ContentRepository;
pub use types::{
    ContentId, ContentItem, ContentRole, ContentVersion, FieldValue, LinkKind, PersistField,
    QnaPair, SoftLink, VersionStatus, Versioning,
};
