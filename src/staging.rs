//! Pending-batch staging.
//!
//! A parsed batch waits here for an explicit confirm or cancel. The store
//! owns the full lifecycle: created on parse as `Pending`, finalized exactly
//! once, retained afterwards so repeat confirm/cancel requests surface as
//! conflicts, and reaped by a TTL sweep so staging never grows unboundedly.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::ClassifiedRecord;
use crate::error::{PipelineError, Result};
use crate::summary::BatchSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Confirmed => "confirmed",
            BatchStatus::Cancelled => "cancelled",
        }
    }
}

/// One staged batch for a single (institution, call) pair.
#[derive(Debug, Clone)]
pub struct StagedBatch {
    pub id: Uuid,
    pub institution: String,
    pub call_number: u32,
    pub records: Vec<ClassifiedRecord>,
    pub summary: BatchSummary,
    pub status: BatchStatus,
    pub staged_at: DateTime<Utc>,
}

/// Status view returned to callers of the status query.
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatusView {
    pub status: BatchStatus,
    pub institution: String,
    pub call_number: u32,
    pub total: usize,
}

pub struct StagingStore {
    batches: Mutex<HashMap<Uuid, StagedBatch>>,
    ttl: Duration,
}

impl StagingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            batches: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Stage a freshly classified batch and return its id.
    pub fn stage(
        &self,
        institution: &str,
        call_number: u32,
        records: Vec<ClassifiedRecord>,
        summary: BatchSummary,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let batch = StagedBatch {
            id,
            institution: institution.to_string(),
            call_number,
            records,
            summary,
            status: BatchStatus::Pending,
            staged_at: Utc::now(),
        };
        self.batches.lock().unwrap().insert(id, batch);
        debug!(%id, institution, call_number, "batch staged");
        id
    }

    /// Clone a batch that is still pending. Finalized batches are a
    /// conflict, unknown ids are not found; neither mutates state.
    pub fn snapshot_pending(&self, id: Uuid) -> Result<StagedBatch> {
        let batches = self.batches.lock().unwrap();
        let batch = batches.get(&id).ok_or(PipelineError::BatchNotFound(id))?;
        if batch.status != BatchStatus::Pending {
            return Err(PipelineError::BatchConflict {
                id,
                status: batch.status.as_str(),
            });
        }
        Ok(batch.clone())
    }

    /// Transition a pending batch to `Confirmed` or `Cancelled`. The only
    /// legal transitions are out of `Pending`; anything else is rejected
    /// without mutation.
    pub fn finalize(&self, id: Uuid, status: BatchStatus) -> Result<()> {
        debug_assert!(status != BatchStatus::Pending);
        let mut batches = self.batches.lock().unwrap();
        let batch = batches.get_mut(&id).ok_or(PipelineError::BatchNotFound(id))?;
        if batch.status != BatchStatus::Pending {
            return Err(PipelineError::BatchConflict {
                id,
                status: batch.status.as_str(),
            });
        }
        batch.status = status;
        info!(%id, status = status.as_str(), "batch finalized");
        Ok(())
    }

    pub fn status(&self, id: Uuid) -> Result<BatchStatusView> {
        let batches = self.batches.lock().unwrap();
        let batch = batches.get(&id).ok_or(PipelineError::BatchNotFound(id))?;
        Ok(BatchStatusView {
            status: batch.status,
            institution: batch.institution.clone(),
            call_number: batch.call_number,
            total: batch.records.len(),
        })
    }

    /// Drop batches older than the TTL, whatever their status. Returns how
    /// many were reaped.
    pub fn sweep_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut batches = self.batches.lock().unwrap();
        let before = batches.len();
        batches.retain(|_, batch| batch.staged_at > cutoff);
        let reaped = before - batches.len();
        if reaped > 0 {
            info!(reaped, "expired staged batches reaped");
        }
        reaped
    }

    #[cfg(test)]
    fn backdate(&self, id: Uuid, age: Duration) {
        let mut batches = self.batches.lock().unwrap();
        if let Some(batch) = batches.get_mut(&id) {
            batch.staged_at = Utc::now() - age;
        }
    }
}
