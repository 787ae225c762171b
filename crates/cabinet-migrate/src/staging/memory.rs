//! In-process staging store.
//!
//! Holds records in a `BTreeMap` keyed by `object_id`, which gives the same
//! ordering guarantee as the PostgreSQL backend. Used for dry runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{StagingRecord, StagingStore, StagingSummary};
use crate::error::{MigrateError, Result};

/// Staging store backed by process memory.
#[derive(Default)]
pub struct MemoryStagingStore {
    records: Mutex<BTreeMap<String, StagingRecord>>,
    updates: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = StagingRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.lock();
            for record in records {
                map.entry(record.object_id.clone()).or_insert(record);
            }
        }
        store
    }

    /// Snapshot of one record.
    pub fn get(&self, object_id: &str) -> Option<StagingRecord> {
        self.lock().get(object_id).cloned()
    }

    /// Number of successful `update_on_success` calls.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StagingRecord>> {
        // A poisoned map still holds consistent records: every mutation is a
        // single field assignment pair done under the lock.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl StagingStore for MemoryStagingStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn fetch_pending(&self) -> Result<Vec<StagingRecord>> {
        Ok(self
            .lock()
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect())
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

        let mut map = self.lock();
        let record = map
            .get_mut(object_id)
            .ok_or_else(|| MigrateError::State(format!("{}: no such staging record", object_id)))?;

        if !record.is_pending() {
            return Err(MigrateError::State(format!(
                "{}: already uploaded as document {}",
                object_id, record.remote_document_id
            )));
        }

        record.remote_document_id = remote_id;
        record.uploaded_at = Some(uploaded_at);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stage(&self, records: &[StagingRecord]) -> Result<u64> {
        let mut map = self.lock();
        let mut inserted = 0;
        for record in records {
            if map.contains_key(&record.object_id) {
                continue;
            }
            let mut pending = record.clone();
            pending.remote_document_id = 0;
            pending.uploaded_at = None;
            map.insert(pending.object_id.clone(), pending);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn summary(&self) -> Result<StagingSummary> {
        let map = self.lock();
        let total = map.len() as i64;
        let pending = map.values().filter(|r| r.is_pending()).count() as i64;
        Ok(StagingSummary {
            total,
            pending,
            uploaded: total - pending,
        })
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
