//! Embedded libSQL record store.
//!
//! The pipeline treats business data as a generic keyed-record store: each
//! collection (clients, offers, tasks, …) holds JSON documents addressed by
//! `(collection, id)`. [`RecordStore`] is the read seam collectors depend on;
//! [`Storage`] is the libSQL implementation.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, Value, params};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use agencypulse_shared::{AgencyPulseError, Result};

// ---------------------------------------------------------------------------
// Record & filters
// ---------------------------------------------------------------------------

/// A single stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub collection: String,
    pub id: String,
    /// Document body; always a JSON object.
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Record {
    /// Decode the document body into a typed DTO.
    pub fn decode<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// A query predicate. Field names address top-level document keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Record key equals the value.
    IdEq(String),
    /// Document field equals the string value.
    FieldEq(String, String),
    /// Document field is absent or differs from the string value.
    FieldNotEq(String, String),
    /// Record was created at or after the instant.
    CreatedSince(DateTime<Utc>),
}

impl Filter {
    pub fn field_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::FieldEq(field.into(), value.into())
    }

    pub fn field_not_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::FieldNotEq(field.into(), value.into())
    }
}

/// Read access to keyed collections.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Return at most `limit` records of `collection` matching every filter,
    /// newest first (ties broken by id).
    async fn query(&self, collection: &str, filters: &[Filter], limit: usize)
    -> Result<Vec<Record>>;
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AgencyPulseError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AgencyPulseError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| AgencyPulseError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        AgencyPulseError::Storage(format!(
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

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert or replace a document. `data` must be a JSON object.
    pub async fn upsert_record(
        &self,
        collection: &str,
        id: &str,
        data: &serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        if !data.is_object() {
            return Err(AgencyPulseError::validation(format!(
                "{collection}/{id}: record body must be a JSON object"
            )));
        }
        let now = timestamp(Utc::now());
        self.conn
            .execute(
                "INSERT INTO records (collection, id, data_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(collection, id) DO UPDATE SET
                   data_json = excluded.data_json,
                   created_at = excluded.created_at,
                   updated_at = excluded.updated_at",
                params![
                    collection,
                    id,
                    data.to_string(),
                    timestamp(created_at),
                    now
                ],
            )
            .await
            .map_err(|e| AgencyPulseError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Import a seed document of the form `{ "<collection>": [ {..}, .. ], .. }`.
    ///
    /// Each entry may carry `id` and `createdAt`; missing ids get a UUID v7
    /// and missing timestamps default to now. Returns the number of records
    /// written.
    #[instrument(skip_all)]
    pub async fn import_json(&self, doc: &serde_json::Value) -> Result<usize> {
        let collections = doc.as_object().ok_or_else(|| {
            AgencyPulseError::validation("import document must be a JSON object of collections")
        })?;

        let mut written = 0;
        for (collection, entries) in collections {
            let entries = entries.as_array().ok_or_else(|| {
                AgencyPulseError::validation(format!("`{collection}` must be an array of records"))
            })?;
            for entry in entries {
                let id = entry
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
                let created_at = entry
                    .get("createdAt")
                    .and_then(|v| v.as_str())
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);
                self.upsert_record(collection, &id, entry, created_at).await?;
                written += 1;
            }
            debug!(collection = %collection, count = entries.len(), "imported collection");
        }

        info!(records = written, "import complete");
        Ok(written)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Number of documents in a collection.
    pub async fn count(&self, collection: &str) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                params![collection],
            )
            .await
            .map_err(|e| AgencyPulseError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n.max(0) as u64)
                .map_err(|e| AgencyPulseError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(AgencyPulseError::Storage(e.to_string())),
        }
    }
}

#[async_trait]
impl RecordStore for Storage {
    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        limit: usize,
    ) -> Result<Vec<Record>> {
        let (sql, values) = build_query(collection, filters, limit)?;

        // A fresh connection per query lets concurrent collectors read in parallel.
        let conn = self
            .db
            .connect()
            .map_err(|e| AgencyPulseError::SourceUnavailable(e.to_string()))?;

        let mut rows = conn
            .query(&sql, libsql::params_from_iter(values))
            .await
            .map_err(|e| AgencyPulseError::SourceUnavailable(format!("{collection}: {e}")))?;

        let mut records = Vec::new();
        loop {
            let row = match rows.next().await {
                Ok(Some(row)) => row,
                Ok(None) => break,
                Err(e) => {
                    return Err(AgencyPulseError::SourceUnavailable(format!(
                        "{collection}: {e}"
                    )));
                }
            };
            let id = row
                .get::<String>(0)
                .map_err(|e| AgencyPulseError::SourceUnavailable(e.to_string()))?;
            let data_json = row
                .get::<String>(1)
                .map_err(|e| AgencyPulseError::SourceUnavailable(e.to_string()))?;
            let created_at = row
                .get::<String>(2)
                .map_err(|e| AgencyPulseError::SourceUnavailable(e.to_string()))?;

            let data = serde_json::from_str(&data_json).map_err(|e| {
                AgencyPulseError::SourceUnavailable(format!("{collection}/{id}: corrupt JSON: {e}"))
            })?;
            let created_at = DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| {
                    AgencyPulseError::SourceUnavailable(format!(
                        "{collection}/{id}: bad timestamp: {e}"
                    ))
                })?;

            records.push(Record {
                collection: collection.to_string(),
                id,
                data,
                created_at,
            });
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Query building
// ---------------------------------------------------------------------------

/// Render a filtered query. Field names are restricted to identifier
/// characters because they are spliced into a JSON path.
fn build_query(collection: &str, filters: &[Filter], limit: usize) -> Result<(String, Vec<Value>)> {
    let mut sql = String::from("SELECT id, data_json, created_at FROM records WHERE collection = ?1");
    let mut values = vec![Value::Text(collection.to_string())];

    for filter in filters {
        let n = values.len() + 1;
        match filter {
            Filter::IdEq(id) => {
                sql.push_str(&format!(" AND id = ?{n}"));
                values.push(Value::Text(id.clone()));
            }
            Filter::FieldEq(field, value) => {
                check_field_name(field)?;
                sql.push_str(&format!(" AND json_extract(data_json, '$.{field}') = ?{n}"));
                values.push(Value::Text(value.clone()));
            }
            Filter::FieldNotEq(field, value) => {
                check_field_name(field)?;
                sql.push_str(&format!(" AND json_extract(data_json, '$.{field}') IS NOT ?{n}"));
                values.push(Value::Text(value.clone()));
            }
            Filter::CreatedSince(since) => {
                sql.push_str(&format!(" AND created_at >= ?{n}"));
                values.push(Value::Text(timestamp(*since)));
            }
        }
    }

    let n = values.len() + 1;
    sql.push_str(&format!(" ORDER BY created_at DESC, id ASC LIMIT ?{n}"));
    values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

    Ok((sql, values))
}

fn check_field_name(field: &str) -> Result<()> {
    if !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(AgencyPulseError::validation(format!(
            "invalid filter field name: {field:?}"
        )))
    }
}

/// Fixed-width UTC timestamps so string comparison matches time order.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
