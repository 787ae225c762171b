//! PostgreSQL staging store.
//!
//! One row per document in a single table (default `public.staging_documents`).
//! `index_fields` is stored as JSONB. A CHECK constraint keeps
//! `uploaded_at` and `remote_document_id` in step, and updates only ever
//! match rows that are still pending.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use std::collections::BTreeMap;
use tokio_postgres::types::Json;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use super::identifier::{qualify_pg, quote_pg};
use super::tls::SslMode;
use super::{StagingRecord, StagingStore, StagingSummary};
use crate::config::StagingConfig;
use crate::error::{MigrateError, Result};

/// Longest prefix of the table name used when deriving the index name.
const INDEX_NAME_PREFIX_MAX: usize = 55;

/// Staging store backed by a PostgreSQL table.
pub struct PgStagingStore {
    pool: Pool,
    table: String,
    index_name: String,
}

impl PgStagingStore {
    /// Connect to the staging database and verify the connection.
    pub async fn connect(config: &StagingConfig) -> Result<Self> {
        let table = qualify_pg(&config.schema, &config.table)?;
        let index_name = quote_pg(&pending_index_name(&config.table))?;

        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match SslMode::parse(&config.ssl_mode)?.connector()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!("Staging store TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(config.max_connections)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating staging store pool"))?;

        // Test connection
        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "connecting to staging store"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to staging store: {}:{}/{} ({})",
            config.host, config.port, config.database, table
        );

        Ok(Self {
            pool,
            table,
            index_name,
        })
    }

    async fn client(&self, context: &str) -> Result<deadpool_postgres::Client> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, context.to_string()))
    }
}

#[async_trait]
impl StagingStore for PgStagingStore {
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.client("creating staging schema").await?;

        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    object_id TEXT PRIMARY KEY,
                    destination_cabinet_id TEXT NOT NULL,
                    source_path TEXT NOT NULL,
                    index_fields JSONB NOT NULL DEFAULT '{{}}'::jsonb,
                    remote_document_id BIGINT NOT NULL DEFAULT 0 CHECK (remote_document_id >= 0),
                    uploaded_at TIMESTAMPTZ,
                    CHECK ((remote_document_id = 0) = (uploaded_at IS NULL))
                )",
                self.table
            ),
            &[],
        )
        .await?;

        // Partial index keeps the pending scan cheap once most rows are uploaded
        conn.execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} (object_id) WHERE remote_document_id = 0",
                self.index_name, self.table
            ),
            &[],
        )
        .await?;

        debug!("Staging schema ready: {}", self.table);
        Ok(())
    }

    async fn fetch_pending(&self) -> Result<Vec<StagingRecord>> {
        let conn = self.client("fetching pending records").await?;

        let rows = conn
            .query(
                &format!(
                    "SELECT object_id, destination_cabinet_id, source_path, index_fields,
                            remote_document_id, uploaded_at
                     FROM {}
                     WHERE remote_document_id = 0
                     ORDER BY object_id COLLATE \"C\"",
                    self.table
                ),
                &[],
            )
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(index_fields): Json<BTreeMap<String, String>> = row.try_get(3)?;
            records.push(StagingRecord {
                object_id: row.try_get(0)?,
                destination_cabinet_id: row.try_get(1)?,
                source_path: row.try_get(2)?,
                index_fields,
                remote_document_id: row.try_get(4)?,
                uploaded_at: row.try_get(5)?,
            });
        }

        Ok(records)
    }

    async fn update_on_success(
        &self,
        object_id: &str,
        remote_id: i64,
        uploaded_at: DateTime<Utc>,
    ) -> Result<()> {
        if remote_id == 0 {
            return Err(MigrateError::State(format!(
                "{}: remote document id must be non-zero",
                object_id
            )));
        }

        let mut conn = self.client("recording upload").await?;
        let tx = conn.transaction().await?;

        let updated = tx
            .execute(
                &format!(
                    "UPDATE {}
                     SET remote_document_id = $2, uploaded_at = $3
                     WHERE object_id = $1 AND remote_document_id = 0",
                    self.table
                ),
                &[&object_id, &remote_id, &uploaded_at],
            )
            .await?;

        if updated != 1 {
            tx.rollback().await?;
            return Err(MigrateError::State(format!(
                "{}: record missing or already uploaded",
                object_id
            )));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn stage(&self, records: &[StagingRecord]) -> Result<u64> {
        let mut conn = self.client("staging records").await?;
        let tx = conn.transaction().await?;

        let stmt = tx
            .prepare(&format!(
                "INSERT INTO {} (object_id, destination_cabinet_id, source_path, index_fields)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (object_id) DO NOTHING",
                self.table
            ))
            .await?;

        let mut inserted = 0;
        for record in records {
            inserted += tx
                .execute(
                    &stmt,
                    &[
                        &record.object_id,
                        &record.destination_cabinet_id,
                        &record.source_path,
                        &Json(&record.index_fields),
                    ],
                )
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn summary(&self) -> Result<StagingSummary> {
        let conn = self.client("summarizing staging table").await?;

        let row = conn
            .query_one(
                &format!(
                    "SELECT COUNT(*), COUNT(*) FILTER (WHERE remote_document_id = 0) FROM {}",
                    self.table
                ),
                &[],
            )
            .await?;

        let total: i64 = row.try_get(0)?;
        let pending: i64 = row.try_get(1)?;
        Ok(StagingSummary {
            total,
            pending,
            uploaded: total - pending,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close();
        debug!("Staging store pool closed");
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}

/// Index name for the pending partial index, kept under PostgreSQL's
/// identifier limit.
fn pending_index_name(table: &str) -> String {
    let mut end = table.len().min(INDEX_NAME_PREFIX_MAX);
    while !table.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}_pending", &table[..end])
}
