//! SQL migration definitions for the QnaSync content database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: content, content_version, soft_link",
            sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Current version of each content item
CREATE TABLE IF NOT EXISTS content (
    id           INTEGER PRIMARY KEY,
    content_type TEXT NOT NULL,
    name         TEXT NOT NULL,
    url          TEXT,
    changed      INTEGER NOT NULL DEFAULT 0,
    fields_json  TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_content_type ON content(content_type);

-- Version history; each row carries the full field map at that version
CREATE TABLE IF NOT EXISTS content_version (
    content_id      INTEGER NOT NULL,
    version         INTEGER NOT NULL,
    saved_at        TEXT NOT NULL,
    status          TEXT NOT NULL,
    master_language INTEGER NOT NULL DEFAULT 1,
    name            TEXT NOT NULL,
    fields_json     TEXT NOT NULL,
    PRIMARY KEY (content_id, version)
);

-- Reverse-reference index
CREATE TABLE IF NOT EXISTS soft_link (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id  INTEGER,
    target_id INTEGER NOT NULL,
    kind      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_soft_link_target ON soft_link(target_id);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Index version history by status",
            sql: r#"
CREATE INDEX IF NOT EXISTS idx_content_version_status
    ON content_version(content_id, status, saved_at);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
    ]
}
