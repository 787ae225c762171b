//! Staging store: durable per-document upload state.
//!
//! The [`StagingStore`] trait is the only way the orchestrator touches the
//! staging table. Implementations:
//!
//! - **PostgreSQL**: [`PgStagingStore`] in `postgres.rs`
//! - **Memory**: [`MemoryStagingStore`] in `memory.rs`, for dry runs and tests
//!
//! A record is pending while `remote_document_id == 0`. It leaves that state
//! exactly once, through [`StagingStore::update_on_success`].

pub mod identifier;
mod memory;
mod postgres;
pub mod tls;

pub use memory::MemoryStagingStore;
pub use postgres::PgStagingStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;

/// Column names that belong to the staging table itself and are never sent
/// to the document service as index fields.
pub const BOOKKEEPING_KEYS: [&str; 5] = [
    "object_id",
    "destination_cabinet_id",
    "source_path",
    "remote_document_id",
    "uploaded_at",
];

/// One staged document candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingRecord {
    /// Stable source identifier, unique across the table.
    pub object_id: String,

    /// File cabinet the document is stored into.
    pub destination_cabinet_id: String,

    /// Location of the document payload on disk.
    pub source_path: String,

    /// Extra index metadata attached on upload.
    #[serde(default)]
    pub index_fields: BTreeMap<String, String>,

    /// Identifier assigned by the document service; 0 while pending.
    #[serde(default)]
    pub remote_document_id: i64,

    /// Set together with `remote_document_id`.
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
}

impl StagingRecord {
    /// Create a pending record.
    pub fn new(
        object_id: impl Into<String>,
        destination_cabinet_id: impl Into<String>,
        source_path: impl Into<String>,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            destination_cabinet_id: destination_cabinet_id.into(),
            source_path: source_path.into(),
            index_fields: BTreeMap::new(),
            remote_document_id: 0,
            uploaded_at: None,
        }
    }

    /// Builder-style helper to attach an index field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.index_fields.insert(name.into(), value.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.remote_document_id == 0
    }
}

/// Returns true when `key` names a staging bookkeeping column.
pub fn is_bookkeeping_key(key: &str) -> bool {
    BOOKKEEPING_KEYS
        .iter()
        .any(|k| k.eq_ignore_ascii_case(key))
}

/// Record counts for the `status` report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSummary {
    pub total: i64,
    pub pending: i64,
    pub uploaded: i64,
}

/// Persistence interface for staging records.
///
/// Implementations must be `Send + Sync` so the orchestrator can hold them
/// behind `Arc<dyn StagingStore>`.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Create the staging table and its indexes if missing. Idempotent.
    async fn ensure_schema(&self) -> Result<()>;

    /// All pending records ordered by `object_id` bytes (binary collation).
    async fn fetch_pending(&self) -> Result<Vec<StagingRecord>>;

    /// Record a successful upload in one transaction.
    ///
    /// Fails with [`crate::MigrateError::State`] if the record does not exist
    /// or is no longer pending; an uploaded record is never rewritten.
    async fn update_on_success(
        &self,
        object_id: &str,
        remote_id: i64,
        uploaded_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Insert pending records, skipping any `object_id` already present.
    /// Returns the number of rows inserted.
    async fn stage(&self, records: &[StagingRecord]) -> Result<u64>;

    /// Count total, pending and uploaded records.
    async fn summary(&self) -> Result<StagingSummary>;

    /// Release connections. Safe to call more than once.
    async fn close(&self) -> Result<()>;

    /// Backend name for logging.
    fn backend_type(&self) -> &'static str;
}
