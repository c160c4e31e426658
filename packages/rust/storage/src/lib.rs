//! libSQL storage layer for ingested mentions.
//!
//! The [`Storage`] struct wraps either an embedded database file or a remote
//! libSQL/Turso database and owns the `socialmentions` table.
//!
//! **Access rules:**
//! - Ingestion loop: read-write (sole writer) via [`Storage::connect`] / [`Storage::open`]
//! - Inspection commands: read-only via [`Storage::connect_readonly`] / [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use tidewatch_shared::{DatabaseTarget, MentionRecord, Result, TidewatchError};

/// Table that holds ingested mentions.
pub const MENTIONS_TABLE: &str = "socialmentions";

/// URL schemes that select a remote database instead of a local file.
const REMOTE_SCHEMES: [&str; 5] = ["libsql://", "https://", "http://", "wss://", "ws://"];

const MENTION_COLUMNS: &str =
    "id, external_id, text, author_id, created_at, source, processed, ingested_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Connect using a resolved connection string.
    ///
    /// Remote URLs (`libsql://`, `https://`, ...) go through the libSQL client;
    /// anything else is treated as a local file path, with an optional
    /// `file:` prefix.
    pub async fn connect(target: &DatabaseTarget) -> Result<Self> {
        if is_remote(&target.url) {
            let token = target.auth_token.clone().unwrap_or_default();
            let db = libsql::Builder::new_remote(target.url.clone(), token)
                .build()
                .await
                .map_err(|e| TidewatchError::Storage(e.to_string()))?;
            tracing::info!(url = %target.url, "connected to remote database");
            return Self::from_database(db, false).await;
        }

        Self::open(local_path(&target.url)).await
    }

    /// Like [`Storage::connect`], but never creates anything.
    ///
    /// Local databases must already exist and are opened read-only. Remote
    /// databases have no read-only mode, so they get a normal client.
    pub async fn connect_readonly(target: &DatabaseTarget) -> Result<Self> {
        if is_remote(&target.url) {
            return Self::connect(target).await;
        }
        Self::open_readonly(local_path(&target.url)).await
    }

    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| TidewatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| TidewatchError::Storage(e.to_string()))?;

        tracing::info!(?path, "opened local database");
        Self::from_database(db, false).await
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TidewatchError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| TidewatchError::Storage(e.to_string()))?;

        Self::from_database(db, true).await
    }

    async fn from_database(db: Database, readonly: bool) -> Result<Self> {
        let conn = db
            .connect()
            .map_err(|e| TidewatchError::Storage(e.to_string()))?;

        let storage = Self { db, conn, readonly };
        if !readonly {
            storage.run_migrations().await?;
        }
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        TidewatchError::Storage(format!(
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
            return Err(TidewatchError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    /// Release the connection. Consumes the handle so no further calls can be made.
    pub fn close(self) {
        let Self { db, conn, .. } = self;
        drop(conn);
        drop(db);
        tracing::info!("database connection closed");
    }

    // -----------------------------------------------------------------------
    // Mention operations
    // -----------------------------------------------------------------------

    /// Look up a mention by its natural key.
    pub async fn find_mention(&self, external_id: &str) -> Result<Option<MentionRecord>> {
        let sql =
            format!("SELECT {MENTION_COLUMNS} FROM {MENTIONS_TABLE} WHERE external_id = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![external_id])
            .await
            .map_err(|e| TidewatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_mention(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(TidewatchError::Storage(e.to_string())),
        }
    }

    /// Insert a mention unless one with the same `external_id` exists.
    ///
    /// Returns `true` if a row was written. Existing rows are never touched.
    pub async fn insert_mention(&self, record: &MentionRecord) -> Result<bool> {
        self.check_writable()?;
        let sql = format!(
            "INSERT INTO {MENTIONS_TABLE} ({MENTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(external_id) DO NOTHING"
        );
        let affected = self
            .conn
            .execute(
                &sql,
                params![
                    record.id.as_str(),
                    record.external_id.as_str(),
                    record.text.as_str(),
                    record.author_id.as_str(),
                    format_timestamp(&record.created_at),
                    record.source.as_str(),
                    i64::from(record.processed),
                    format_timestamp(&record.ingested_at),
                ],
            )
            .await
            .map_err(|e| TidewatchError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }

    /// List mentions newest first (by source creation time).
    pub async fn list_recent_mentions(
        &self,
        limit: u32,
        unprocessed_only: bool,
    ) -> Result<Vec<MentionRecord>> {
        let filter = if unprocessed_only {
            "WHERE processed = 0"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {MENTION_COLUMNS} FROM {MENTIONS_TABLE} {filter}
             ORDER BY created_at DESC LIMIT ?1"
        );
        let mut rows = self
            .conn
            .query(&sql, params![i64::from(limit)])
            .await
            .map_err(|e| TidewatchError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| TidewatchError::Storage(e.to_string()))?
        {
            results.push(row_to_mention(&row)?);
        }
        Ok(results)
    }

    /// Total number of stored mentions.
    pub async fn count_mentions(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {MENTIONS_TABLE}");
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| TidewatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let count = row
                    .get::<i64>(0)
                    .map_err(|e| TidewatchError::Storage(e.to_string()))?;
                Ok(count.max(0) as u64)
            }
            Ok(None) => Ok(0),
            Err(e) => Err(TidewatchError::Storage(e.to_string())),
        }
    }

    /// Flag a mention as handled. Downstream consumers own this transition.
    ///
    /// Returns `false` if no mention has that key.
    pub async fn mark_processed(&self, external_id: &str) -> Result<bool> {
        self.check_writable()?;
        let sql = format!("UPDATE {MENTIONS_TABLE} SET processed = 1 WHERE external_id = ?1");
        let affected = self
            .conn
            .execute(
                &sql,
                params![external_id],
            )
            .await
            .map_err(|e| TidewatchError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }
}

fn is_remote(url: &str) -> bool {
    REMOTE_SCHEMES.iter().any(|scheme| url.starts_with(scheme))
}

fn local_path(url: &str) -> &Path {
    Path::new(url.strip_prefix("file:").unwrap_or(url))
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TidewatchError::Storage(format!("invalid date '{s}': {e}")))
}

/// Convert a database row to a [`MentionRecord`].
fn row_to_mention(row: &libsql::Row) -> Result<MentionRecord> {
    let text_at = |idx: i32| {
        row.get::<String>(idx)
            .map_err(|e| TidewatchError::Storage(e.to_string()))
    };

    Ok(MentionRecord {
        id: text_at(0)?,
        external_id: text_at(1)?,
        text: text_at(2)?,
        author_id: text_at(3)?,
        created_at: parse_timestamp(&text_at(4)?)?,
        source: text_at(5)?,
        processed: row
            .get::<i64>(6)
            .map_err(|e| TidewatchError::Storage(e.to_string()))?
            != 0,
        ingested_at: parse_timestamp(&text_at(7)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewatch_shared::SearchItem;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("tw_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn mention(external_id: &str, created_at: &str) -> MentionRecord {
        let item = SearchItem {
            id: external_id.into(),
            text: format!("polluted beach report {external_id}"),
            author_id: "77".into(),
            created_at: created_at.parse().unwrap(),
            geo: None,
        };
        MentionRecord::from_item(&item, "twitter").unwrap()
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);

        let mut rows = storage
            .conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![MENTIONS_TABLE],
            )
            .await
            .unwrap();
        assert!(rows.next().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("tw_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        s1.close();
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn connect_local_with_file_prefix() {
        let tmp = std::env::temp_dir().join(format!("tw_test_{}.db", Uuid::now_v7()));
        let target = DatabaseTarget {
            url: format!("file:{}", tmp.display()),
            auth_token: None,
        };
        let storage = Storage::connect(&target).await.expect("connect");
        assert_eq!(storage.count_mentions().await.unwrap(), 0);
        assert!(tmp.exists());
    }

    #[test]
    fn remote_scheme_detection() {
        assert!(is_remote("libsql://mentions-org.turso.io"));
        assert!(is_remote("https://db.example.com"));
        assert!(!is_remote("/var/lib/tidewatch/mentions.db"));
        assert!(!is_remote("file:mentions.db"));
    }

    #[tokio::test]
    async fn insert_and_find() {
        let storage = test_storage().await;
        let record = mention("1001", "2024-03-01T10:15:00Z");

        assert!(storage.find_mention("1001").await.unwrap().is_none());
        assert!(storage.insert_mention(&record).await.expect("insert"));

        let found = storage.find_mention("1001").await.unwrap().expect("found");
        assert_eq!(found.id, record.id);
        assert_eq!(found.text, record.text);
        assert_eq!(found.author_id, "77");
        assert_eq!(found.source, "twitter");
        assert!(!found.processed);
        assert_eq!(found.created_at, record.created_at);
    }

    #[tokio::test]
    async fn insert_if_absent_keeps_original() {
        let storage = test_storage().await;
        let first = mention("42", "2024-03-01T10:15:00Z");
        assert!(storage.insert_mention(&first).await.unwrap());

        let mut second = mention("42", "2024-03-02T08:00:00Z");
        second.text = "a different text".into();
        assert!(!storage.insert_mention(&second).await.unwrap());

        assert_eq!(storage.count_mentions().await.unwrap(), 1);
        let stored = storage.find_mention("42").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.text, first.text);
    }

    #[tokio::test]
    async fn list_recent_newest_first() {
        let storage = test_storage().await;
        for (id, ts) in [
            ("1", "2024-03-01T09:00:00Z"),
            ("2", "2024-03-01T11:00:00Z"),
            ("3", "2024-03-01T10:00:00Z"),
        ] {
            storage.insert_mention(&mention(id, ts)).await.unwrap();
        }

        let listed = storage.list_recent_mentions(50, false).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|m| m.external_id.as_str()).collect();
        assert_eq!(ids, ["2", "3", "1"]);

        let limited = storage.list_recent_mentions(1, false).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].external_id, "2");
    }

    #[tokio::test]
    async fn mark_processed_filters_listing() {
        let storage = test_storage().await;
        storage
            .insert_mention(&mention("a", "2024-03-01T09:00:00Z"))
            .await
            .unwrap();
        storage
            .insert_mention(&mention("b", "2024-03-01T10:00:00Z"))
            .await
            .unwrap();

        assert!(storage.mark_processed("a").await.unwrap());
        assert!(!storage.mark_processed("missing").await.unwrap());

        let pending = storage.list_recent_mentions(50, true).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].external_id, "b");
        assert!(storage.find_mention("a").await.unwrap().unwrap().processed);
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("tw_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_mention(&mention("1", "2024-03-01T09:00:00Z"))
            .await
            .unwrap();
        rw.close();

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.count_mentions().await.unwrap(), 1);
        let result = ro.insert_mention(&mention("2", "2024-03-01T09:00:00Z")).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_requires_existing_file() {
        let tmp = std::env::temp_dir().join(format!("tw_missing_{}.db", Uuid::now_v7()));
        let result = Storage::open_readonly(&tmp).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn connect_readonly_never_creates_local_file() {
        let tmp = std::env::temp_dir()
            .join(format!("tw_absent_{}", Uuid::now_v7()))
            .join("mentions.db");
        let target = DatabaseTarget {
            url: format!("file:{}", tmp.display()),
            auth_token: None,
        };

        assert!(Storage::connect_readonly(&target).await.is_err());
        assert!(!tmp.exists());
        assert!(!tmp.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn connect_readonly_opens_existing_local_file() {
        let tmp = std::env::temp_dir().join(format!("tw_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.insert_mention(&mention("9", "2024-03-01T09:00:00Z"))
            .await
            .unwrap();
        rw.close();

        let target = DatabaseTarget {
            url: tmp.display().to_string(),
            auth_token: None,
        };
        let ro = Storage::connect_readonly(&target).await.unwrap();
        assert_eq!(ro.list_recent_mentions(10, false).await.unwrap().len(), 1);
        assert!(ro.mark_processed("9").await.is_err());
    }

    #[tokio::test]
    async fn unreadable_row_fails_listing() {
        let storage = test_storage().await;
        storage
            .insert_mention(&mention("1", "2024-03-01T09:00:00Z"))
            .await
            .unwrap();
        storage
            .conn
            .execute(
                &format!("UPDATE {MENTIONS_TABLE} SET created_at = 'yesterday' WHERE external_id = '1'"),
                params![],
            )
            .await
            .unwrap();

        let result = storage.list_recent_mentions(50, false).await;
        assert!(matches!(result, Err(TidewatchError::Storage(_))));
    }
}
