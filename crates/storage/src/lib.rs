use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;
use uuid::Uuid;

use shared::domain::{CollectionName, Document, DocumentId, Fields};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub document: Document,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionStats {
    pub collection: String,
    pub document_count: i64,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to `sqlite::memory:` opens a distinct database.
        let pool_options = if database_url.starts_with("sqlite::memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_document(
        &self,
        collection: &CollectionName,
        fields: &Fields,
    ) -> Result<DocumentId> {
        let id = DocumentId(Uuid::new_v4().simple().to_string());
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO documents (collection, id, fields, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(collection.as_str())
        .bind(id.as_str())
        .bind(encode_fields(fields)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert document into '{collection}'"))?;
        debug!(%collection, document_id = %id, "document created");
        Ok(id)
    }

    /// Shallow-merges `fields` into the stored document. Returns `false` when
    /// no document with `id` exists in `collection`.
    pub async fn update_document(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
        fields: &Fields,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT fields FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(false);
        };

        let mut merged = decode_fields(&row.get::<String, _>(0))
            .with_context(|| format!("corrupt fields for document '{id}' in '{collection}'"))?;
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }

        sqlx::query(
            "UPDATE documents SET fields = ?, updated_at = ? WHERE collection = ? AND id = ?",
        )
        .bind(encode_fields(&merged)?)
        .bind(Utc::now())
        .bind(collection.as_str())
        .bind(id.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(%collection, document_id = %id, "document updated");
        Ok(true)
    }

    /// Deleting a missing document is not an error; returns whether a row was removed.
    pub async fn delete_document(&self, collection: &CollectionName, id: &DocumentId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        debug!(%collection, document_id = %id, removed = result.rows_affected(), "document deleted");
        Ok(result.rows_affected() > 0)
    }

    pub async fn load_document(
        &self,
        collection: &CollectionName,
        id: &DocumentId,
    ) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            "SELECT id, fields, created_at, updated_at FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection.as_str())
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(stored_document_from_row).transpose()
    }

    /// All documents of `collection` in insertion order.
    pub async fn list_documents(&self, collection: &CollectionName) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            "SELECT id, fields, created_at, updated_at
             FROM documents
             WHERE collection = ?
             ORDER BY seq ASC",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(stored_document_from_row).collect()
    }

    pub async fn list_collections(&self) -> Result<Vec<CollectionStats>> {
        let rows = sqlx::query(
            "SELECT collection, COUNT(*) FROM documents GROUP BY collection ORDER BY collection ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| CollectionStats {
                collection: r.get::<String, _>(0),
                document_count: r.get::<i64, _>(1),
            })
            .collect())
    }

    pub async fn purge_collection(&self, collection: &CollectionName) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ?")
            .bind(collection.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn stored_document_from_row(row: SqliteRow) -> Result<StoredDocument> {
    let id = DocumentId(row.get::<String, _>(0));
    let fields = decode_fields(&row.get::<String, _>(1))
        .with_context(|| format!("corrupt fields for document '{id}'"))?;
    Ok(StoredDocument {
        document: Document { id, fields },
        created_at: row.get::<DateTime<Utc>, _>(2),
        updated_at: row.get::<DateTime<Utc>, _>(3),
    })
}

fn encode_fields(fields: &Fields) -> Result<String> {
    serde_json::to_string(fields).context("failed to encode document fields")
}

fn decode_fields(raw: &str) -> Result<Fields> {
    match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(anyhow!("stored fields are not an object: {other}")),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
