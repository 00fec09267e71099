//! Batch orchestration: extraction -> classification -> summary -> staging,
//! then confirm/cancel driving the merge engine.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::classify::classify_batch;
use crate::domain::ClassifiedRecord;
use crate::error::Result;
use crate::extractor::{extract_batch, LineFailure};
use crate::lookups::LookupTables;
use crate::merge::{MergeEngine, MergeOutcome};
use crate::staging::{BatchStatus, BatchStatusView, StagingStore};
use crate::storage::MergeStore;
use crate::remote::RemoteSink;
use crate::summary::{summarize, BatchSummary};

/// How many records the parse result shows as a preview.
const PREVIEW_LEN: usize = 10;

static CALL_IN_SOURCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"chamada(\d+)").unwrap());

/// Infer `(institution_tag, call_number)` from a source URL or label, e.g.
/// ".../chamada2/lista.html" -> ("unicamp", 2). Defaults to an unknown tag
/// and call 1.
pub fn detect_institution_and_call(source: &str) -> (String, u32) {
    let lower = source.to_lowercase();
    let institution = if lower.contains("unicamp") || lower.contains("comvest") {
        "unicamp"
    } else {
        "unknown"
    };
    let call_number = CALL_IN_SOURCE_RE
        .captures(&lower)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(1);
    (institution.to_string(), call_number)
}

/// Result of staging one parsed batch.
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    pub batch_id: Uuid,
    pub institution: String,
    pub call_number: u32,
    pub total: usize,
    pub summary: BatchSummary,
    pub preview: Vec<ClassifiedRecord>,
    pub failures: Vec<LineFailure>,
}

/// Result of confirming a staged batch.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmOutcome {
    pub batch_id: Uuid,
    pub status: BatchStatus,
    pub summary: BatchSummary,
    pub merge: MergeOutcome,
}

/// The process-wide ingestion service: owns the lookup tables, the staging
/// store and the merge engine, and serializes confirmations so a staged
/// batch is merged exactly once and concurrent merges cannot race on the
/// cumulative stores.
pub struct IngestService {
    tables: LookupTables,
    staging: StagingStore,
    engine: MergeEngine,
    confirm_gate: tokio::sync::Mutex<()>,
}

impl IngestService {
    pub fn new(
        tables: LookupTables,
        staging: StagingStore,
        store: Arc<dyn MergeStore>,
        remote: Option<Arc<dyn RemoteSink>>,
    ) -> Self {
        Self {
            tables,
            staging,
            engine: MergeEngine::new(store, remote),
            confirm_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Parse and classify one raw listing, stage the result, and return the
    /// summary with a bounded preview. Parse failures never abort the batch.
    pub fn parse_batch(&self, text: &str, call_number: u32, institution: &str) -> ParseOutcome {
        let report = extract_batch(text, call_number, institution);
        let records = classify_batch(report.records, &self.tables);
        let summary = summarize(&records);
        let preview: Vec<ClassifiedRecord> =
            records.iter().take(PREVIEW_LEN).cloned().collect();
        let total = records.len();

        let batch_id = self
            .staging
            .stage(institution, call_number, records, summary.clone());

        info!(
            %batch_id,
            institution,
            call_number,
            total,
            failures = report.failures.len(),
            "batch parsed and staged"
        );

        ParseOutcome {
            batch_id,
            institution: institution.to_string(),
            call_number,
            total,
            summary,
            preview,
            failures: report.failures,
        }
    }

    /// Confirm a pending batch: run the merge engine once, then finalize.
    /// Confirmations are serialized; a batch that is already finalized is
    /// rejected as a conflict before any side effect.
    pub async fn confirm(&self, batch_id: Uuid) -> Result<ConfirmOutcome> {
        let _gate = self.confirm_gate.lock().await;

        let batch = self.staging.snapshot_pending(batch_id)?;
        let merge = self.engine.merge_batch(&batch).await?;
        self.staging.finalize(batch_id, BatchStatus::Confirmed)?;

        Ok(ConfirmOutcome {
            batch_id,
            status: BatchStatus::Confirmed,
            summary: batch.summary,
            merge,
        })
    }

    /// Cancel a pending batch. No merge side effects.
    pub async fn cancel(&self, batch_id: Uuid) -> Result<()> {
        let _gate = self.confirm_gate.lock().await;
        self.staging.finalize(batch_id, BatchStatus::Cancelled)
    }

    pub fn status(&self, batch_id: Uuid) -> Result<BatchStatusView> {
        self.staging.status(batch_id)
    }

    /// Reap staged batches past their TTL.
    pub fn sweep_expired(&self) -> usize {
        self.staging.sweep_expired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_institution_and_call_from_a_source_url() {
        let (institution, call) =
            detect_institution_and_call("https://www.comvest.unicamp.br/chamada2/lista.html");
        assert_eq!(institution, "unicamp");
        assert_eq!(call, 2);
    }

    #[test]
    fn unknown_source_defaults_to_call_one() {
        let (institution, call) = detect_institution_and_call("https://example.com/lista.html");
        assert_eq!(institution, "unknown");
        assert_eq!(call, 1);
    }

    #[test]
    fn call_detection_is_case_insensitive() {
        let (_, call) = detect_institution_and_call("https://COMVEST.br/Chamada3/x");
        assert_eq!(call, 3);
    }
}
