use async_trait::async_trait;
use snip_core::repository::Result;
use snip_core::{OwnerId, ReadRepository, Repository, ShortCode, StorageError, UrlRecord};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS url (
    id           VARCHAR(36) PRIMARY KEY,
    short_url    VARCHAR(255) NOT NULL,
    original_url TEXT NOT NULL UNIQUE,
    user_id      VARCHAR(36) NOT NULL,
    is_deleted   BOOLEAN DEFAULT FALSE
)
"#;

const CREATE_SHORT_URL_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS url_short_url_idx ON url (short_url)";

/// PostgreSQL implementation of the repository contract.
///
/// Soft delete is implemented with `is_deleted`; rows are never removed.
/// `original_url` and `short_url` are both unique, so a second insert of the
/// same content, including over a tombstone, fails with
/// [`StorageError::AlreadyExists`].
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing connection pool.
    ///
    /// The schema is not touched; call [`ensure_schema`][Self::ensure_schema]
    /// if the table may not exist yet.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool and creates the schema if needed.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let repository = Self::new(pool);
        repository.ensure_schema().await?;
        info!(max_connections, "connected to postgres");

        Ok(repository)
    }

    /// Creates the `url` table and its indexes. Safe to run repeatedly.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create table", e))?;
        sqlx::query(CREATE_SHORT_URL_INDEX)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("create index", e))?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Maps a sqlx error onto the storage taxonomy, prefixing the message with
/// the operation and key that failed.
fn map_sqlx_error(context: impl std::fmt::Display, err: sqlx::Error) -> StorageError {
    let message = format!("{context}: {err}");

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn map_insert_error(code: &ShortCode, err: sqlx::Error) -> StorageError {
    if is_unique_violation(&err) {
        StorageError::AlreadyExists(code.clone())
    } else {
        map_sqlx_error(format_args!("add {code}"), err)
    }
}

fn row_to_record(row: &PgRow) -> Result<UrlRecord> {
    let short_url: String = row
        .try_get("short_url")
        .map_err(|e| map_sqlx_error("decode short_url", e))?;
    let original_url: String = row
        .try_get("original_url")
        .map_err(|e| map_sqlx_error("decode original_url", e))?;
    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| map_sqlx_error("decode user_id", e))?;
    let is_deleted: Option<bool> = row
        .try_get("is_deleted")
        .map_err(|e| map_sqlx_error("decode is_deleted", e))?;

    Ok(UrlRecord {
        short_code: ShortCode::new_unchecked(short_url),
        original_url,
        owner_id: OwnerId::new(user_id),
        deleted: is_deleted.unwrap_or(false),
    })
}

#[async_trait]
impl ReadRepository for PostgresRepository {
    async fn read_by_id(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT short_url, original_url, user_id, is_deleted
            FROM url
            WHERE short_url = $1
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(format_args!("read_by_id {code}"), e))?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_user_urls(&self, owner: &OwnerId) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT short_url, original_url, user_id, is_deleted
            FROM url
            WHERE user_id = $1
              AND is_deleted IS NOT TRUE
            "#,
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(format_args!("get_user_urls {owner}"), e))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| match map_sqlx_error("ping", e) {
                StorageError::Query(message) => StorageError::Unavailable(message),
                other => other,
            })?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn add(&self, record: UrlRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO url (id, short_url, original_url, user_id)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(record.short_code.as_str())
        .bind(&record.original_url)
        .bind(record.owner_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(&record.short_code, e))?;

        Ok(())
    }

    async fn add_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("add_batch begin", e))?;

        for record in &records {
            let inserted = sqlx::query(
                r#"
                INSERT INTO url (id, short_url, original_url, user_id)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(record.short_code.as_str())
            .bind(&record.original_url)
            .bind(record.owner_id.as_str())
            .execute(&mut *tx)
            .await;

            if let Err(err) = inserted {
                let err = map_insert_error(&record.short_code, err);
                // the batch error wins over a failed rollback
                if let Err(rollback) = tx.rollback().await {
                    debug!(error = %rollback, "add_batch rollback failed");
                }
                return Err(err);
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("add_batch commit", e))?;

        debug!(count = records.len(), "inserted record batch");
        Ok(())
    }

    async fn delete_batch(&self, codes: &[ShortCode], owner: &OwnerId) -> Result<()> {
        if codes.is_empty() {
            return Ok(());
        }

        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE url
            SET is_deleted = TRUE
            WHERE user_id = $1
              AND short_url = ANY($2)
            "#,
        )
        .bind(owner.as_str())
        .bind(&codes[..])
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error(format_args!("delete_batch {owner}"), e))?;

        debug!(
            owner = %owner,
            requested = codes.len(),
            deleted = result.rows_affected(),
            "soft-deleted records"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
