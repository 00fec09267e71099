//! Accumulation and merge.
//!
//! A confirmed batch is grouped by resolved city and folded into the three
//! persisted views, then mirrored to the remote store. The local merge and
//! the remote mirror are independent failure domains: the mirror runs only
//! after local persistence succeeded, and its failure lands in the outcome
//! instead of propagating.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::domain::ClassifiedRecord;
use crate::error::Result;
use crate::remote::{to_remote_rows, RemoteSink};
use crate::staging::StagedBatch;
use crate::storage::MergeStore;
use crate::summary::INDETERMINATE_CITY;

/// Per-city counts from one merge.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CityMergeOutcome {
    /// Records written into the per-(city, call) snapshot.
    pub snapshot: usize,
    /// Records appended to the cumulative store.
    pub inserted: usize,
    /// Records already present in the cumulative store.
    pub skipped: usize,
}

/// How the remote mirror went, reported alongside a successful local merge.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RemoteOutcome {
    /// No sink configured; mirroring was not attempted.
    Disabled,
    /// Every record was rejected for missing required fields.
    NoEligibleRows { skipped: usize },
    Uploaded { sent: usize, skipped: usize },
    Failed { skipped: usize, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub call_number: u32,
    pub total: usize,
    pub inserted: usize,
    pub skipped_existing: usize,
    pub cities: BTreeMap<String, CityMergeOutcome>,
    pub remote: RemoteOutcome,
}

pub struct MergeEngine {
    store: Arc<dyn MergeStore>,
    remote: Option<Arc<dyn RemoteSink>>,
}

impl MergeEngine {
    pub fn new(store: Arc<dyn MergeStore>, remote: Option<Arc<dyn RemoteSink>>) -> Self {
        Self { store, remote }
    }

    /// Merge one confirmed batch. Re-running the same batch against the same
    /// cumulative state inserts nothing the second time.
    pub async fn merge_batch(&self, batch: &StagedBatch) -> Result<MergeOutcome> {
        let groups = group_by_city(&batch.records);
        let mut cities: BTreeMap<String, CityMergeOutcome> = BTreeMap::new();
        let mut inserted = 0;
        let mut skipped_existing = 0;

        for (city, group) in &groups {
            self.store
                .replace_call_snapshot(city, batch.call_number, group)
                .await?;

            let mut outcome = CityMergeOutcome {
                snapshot: group.len(),
                ..CityMergeOutcome::default()
            };

            // The sentinel group exists for snapshot/dump grouping only; the
            // cumulative store never carries it.
            if city != INDETERMINATE_CITY {
                let appended = self.store.append_missing(city, group).await?;
                outcome.inserted = appended.inserted;
                outcome.skipped = appended.skipped;
                inserted += appended.inserted;
                skipped_existing += appended.skipped;
            }

            cities.insert(city.clone(), outcome);
        }

        self.store
            .write_call_dump(batch.call_number, &batch.records)
            .await?;

        info!(
            call = batch.call_number,
            total = batch.records.len(),
            inserted,
            skipped_existing,
            "local merge completed"
        );

        let remote = self.mirror(&batch.records).await;

        Ok(MergeOutcome {
            call_number: batch.call_number,
            total: batch.records.len(),
            inserted,
            skipped_existing,
            cities,
            remote,
        })
    }

    async fn mirror(&self, records: &[ClassifiedRecord]) -> RemoteOutcome {
        let sink = match &self.remote {
            Some(sink) => sink,
            None => return RemoteOutcome::Disabled,
        };

        let batch = to_remote_rows(records);
        if batch.rows.is_empty() {
            warn!(skipped = batch.skipped, "no rows eligible for the remote mirror");
            return RemoteOutcome::NoEligibleRows {
                skipped: batch.skipped,
            };
        }

        match sink.upsert(&batch.rows).await {
            Ok(sent) => RemoteOutcome::Uploaded {
                sent,
                skipped: batch.skipped,
            },
            Err(e) => {
                error!(error = %e, "remote mirror failed, local merge unaffected");
                RemoteOutcome::Failed {
                    skipped: batch.skipped,
                    message: e.to_string(),
                }
            }
        }
    }
}

fn group_by_city(records: &[ClassifiedRecord]) -> BTreeMap<String, Vec<ClassifiedRecord>> {
    let mut groups: BTreeMap<String, Vec<ClassifiedRecord>> = BTreeMap::new();
    for record in records {
        let city = record
            .city
            .clone()
            .unwrap_or_else(|| INDETERMINATE_CITY.to_string());
        groups.entry(city).or_default().push(record.clone());
    }
    groups
}
