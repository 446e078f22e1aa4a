//! Low-level access to the `documents` table.
//!
//! All functions take a connection, so they can be embedded in a transaction by passing `&mut *tx`.
use log::*;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{Row, SqliteConnection};

use crate::db::sqlite::SqliteDatabaseError;

/// Fetches the document with the given id from the given partition.
pub async fn fetch_document<T: DeserializeOwned>(
    id: &str,
    partition: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<T>, SqliteDatabaseError> {
    let row = sqlx::query("SELECT body FROM documents WHERE id = $1 AND partition_key = $2")
        .bind(id)
        .bind(partition)
        .fetch_optional(conn)
        .await?;
    row.map(|r| parse_body(id, r.get::<String, _>("body").as_str())).transpose()
}

/// Creates or replaces a document. `created_at` (epoch ms) is indexed for range queries.
pub async fn upsert_document(
    id: &str,
    partition: &str,
    doc_type: &str,
    created_at: Option<i64>,
    body: &Value,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let body = serde_json::to_string(body).map_err(|e| SqliteDatabaseError::SerializationError(id.into(), e.to_string()))?;
    sqlx::query(
        r#"
            INSERT INTO documents (id, partition_key, doc_type, created_at, body)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id, partition_key) DO UPDATE SET
                doc_type = excluded.doc_type,
                created_at = excluded.created_at,
                body = excluded.body,
                updated_at = CURRENT_TIMESTAMP;
        "#,
    )
    .bind(id)
    .bind(partition)
    .bind(doc_type)
    .bind(created_at)
    .bind(body)
    .execute(conn)
    .await?;
    trace!("🗃️ Document {id} saved in partition {partition}");
    Ok(())
}

/// Fetches the documents of the given type in the partition whose `created_at` lies in `[from, to]`, oldest first.
/// Documents that cannot be parsed are logged and skipped.
pub async fn fetch_documents_created_between<T: DeserializeOwned>(
    doc_type: &str,
    partition: &str,
    from: i64,
    to: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<T>, SqliteDatabaseError> {
    let rows = sqlx::query(
        r#"
            SELECT id, body FROM documents
            WHERE doc_type = $1 AND partition_key = $2 AND created_at BETWEEN $3 AND $4
            ORDER BY created_at ASC, id ASC;
        "#,
    )
    .bind(doc_type)
    .bind(partition)
    .bind(from)
    .bind(to)
    .fetch_all(conn)
    .await?;
    let docs = rows
        .iter()
        .filter_map(|r| {
            let id = r.get::<String, _>("id");
            parse_body(&id, r.get::<String, _>("body").as_str())
                .map_err(|e| warn!("🗃️ Skipping unreadable document. {e}"))
                .ok()
        })
        .collect();
    Ok(docs)
}

/// Fetches the first document of the given type in the partition whose string field at `path` equals `value`,
/// ignoring case.
pub async fn find_document_by_field<T: DeserializeOwned>(
    doc_type: &str,
    partition: &str,
    path: &str,
    value: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<T>, SqliteDatabaseError> {
    let row = sqlx::query(
        r#"
            SELECT id, body FROM documents
            WHERE doc_type = $1 AND partition_key = $2 AND lower(json_extract(body, $3)) = lower($4)
            ORDER BY created_at ASC
            LIMIT 1;
        "#,
    )
    .bind(doc_type)
    .bind(partition)
    .bind(path)
    .bind(value)
    .fetch_optional(conn)
    .await?;
    row.map(|r| parse_body(&r.get::<String, _>("id"), r.get::<String, _>("body").as_str())).transpose()
}

fn parse_body<T: DeserializeOwned>(id: &str, body: &str) -> Result<T, SqliteDatabaseError> {
    serde_json::from_str(body).map_err(|e| SqliteDatabaseError::CorruptDocument(id.to_string(), e.to_string()))
}
