//! SQL migration definitions for the Tidewatch database.
//!
//! Migrations are applied in order on database open. Each migration records
//! its version in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: socialmentions with unique external_id",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Ingested mentions, one row per source item
CREATE TABLE IF NOT EXISTS socialmentions (
    id          TEXT PRIMARY KEY,
    external_id TEXT NOT NULL,
    text        TEXT NOT NULL,
    author_id   TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    source      TEXT NOT NULL DEFAULT 'twitter',
    processed   INTEGER NOT NULL DEFAULT 0,
    ingested_at TEXT NOT NULL
);

-- Backs insert-if-absent; one row per natural key
CREATE UNIQUE INDEX IF NOT EXISTS idx_socialmentions_external_id
    ON socialmentions(external_id);

-- Newest-first listing for downstream consumers
CREATE INDEX IF NOT EXISTS idx_socialmentions_created_at
    ON socialmentions(created_at);

CREATE INDEX IF NOT EXISTS idx_socialmentions_processed
    ON socialmentions(processed);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
