//! Persisted merge views.
//!
//! The merge engine talks to storage through `MergeStore`, which exposes the
//! three views it maintains: per-(city, call) snapshots (replaced wholesale),
//! per-city cumulative collections (append-if-absent by enrollment id), and
//! per-call full dumps. `append_missing` is the dedup primitive: it must be
//! atomic with respect to concurrent merges so a read-modify-write race
//! cannot drop appended records.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::ClassifiedRecord;
use crate::error::{PipelineError, Result};

/// Counts from one `append_missing` call.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AppendOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

#[async_trait]
pub trait MergeStore: Send + Sync {
    /// Replace the snapshot for `(city, call)` with exactly these records.
    async fn replace_call_snapshot(
        &self,
        city: &str,
        call_number: u32,
        records: &[ClassifiedRecord],
    ) -> Result<()>;

    /// Append the records whose enrollment id is not already present in the
    /// city's cumulative collection. Existing entries are never overwritten.
    async fn append_missing(&self, city: &str, records: &[ClassifiedRecord]) -> Result<AppendOutcome>;

    /// Write the full, unfiltered dump for one call.
    async fn write_call_dump(&self, call_number: u32, records: &[ClassifiedRecord]) -> Result<()>;

    async fn load_cumulative(&self, city: &str) -> Result<Vec<ClassifiedRecord>>;

    async fn load_call_snapshot(&self, city: &str, call_number: u32) -> Result<Vec<ClassifiedRecord>>;

    async fn load_call_dump(&self, call_number: u32) -> Result<Vec<ClassifiedRecord>>;
}

/// In-memory store for development and testing.
pub struct InMemoryMergeStore {
    cumulative: Mutex<HashMap<String, Vec<ClassifiedRecord>>>,
    snapshots: Mutex<HashMap<(String, u32), Vec<ClassifiedRecord>>>,
    dumps: Mutex<HashMap<u32, Vec<ClassifiedRecord>>>,
}

impl InMemoryMergeStore {
    pub fn new() -> Self {
        Self {
            cumulative: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
            dumps: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryMergeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MergeStore for InMemoryMergeStore {
    async fn replace_call_snapshot(
        &self,
        city: &str,
        call_number: u32,
        records: &[ClassifiedRecord],
    ) -> Result<()> {
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.insert((city.to_string(), call_number), records.to_vec());
        Ok(())
    }

    async fn append_missing(&self, city: &str, records: &[ClassifiedRecord]) -> Result<AppendOutcome> {
        let mut cumulative = self.cumulative.lock().unwrap();
        let entries = cumulative.entry(city.to_string()).or_default();
        Ok(append_if_absent(entries, records))
    }

    async fn write_call_dump(&self, call_number: u32, records: &[ClassifiedRecord]) -> Result<()> {
        let mut dumps = self.dumps.lock().unwrap();
        dumps.insert(call_number, records.to_vec());
        Ok(())
    }

    async fn load_cumulative(&self, city: &str) -> Result<Vec<ClassifiedRecord>> {
        Ok(self
            .cumulative
            .lock()
            .unwrap()
            .get(city)
            .cloned()
            .unwrap_or_default())
    }

    async fn load_call_snapshot(&self, city: &str, call_number: u32) -> Result<Vec<ClassifiedRecord>> {
        Ok(self
            .snapshots
            .lock()
            .unwrap()
            .get(&(city.to_string(), call_number))
            .cloned()
            .unwrap_or_default())
    }

    async fn load_call_dump(&self, call_number: u32) -> Result<Vec<ClassifiedRecord>> {
        Ok(self
            .dumps
            .lock()
            .unwrap()
            .get(&call_number)
            .cloned()
            .unwrap_or_default())
    }
}

/// The shared append-if-absent step: one pass over the existing ids, then
/// append only unseen incoming records. Duplicate ids inside `incoming`
/// keep the first occurrence, matching listing order.
fn append_if_absent(entries: &mut Vec<ClassifiedRecord>, incoming: &[ClassifiedRecord]) -> AppendOutcome {
    let mut seen: std::collections::HashSet<String> =
        entries.iter().map(|r| r.enrollment_id.clone()).collect();

    let mut outcome = AppendOutcome::default();
    for record in incoming {
        if seen.insert(record.enrollment_id.clone()) {
            entries.push(record.clone());
            outcome.inserted += 1;
        } else {
            outcome.skipped += 1;
        }
    }
    outcome
}

/// File-backed store persisting the portal's historical on-disk layout:
/// `cities/<city>.json`, `chamadas/<city>/c<N>.json` and
/// `chamada_<N>_full.json` under one base directory.
///
/// A single async mutex serializes every read-modify-write cycle, so two
/// concurrent confirmations cannot lose each other's appends.
pub struct JsonFileMergeStore {
    base_dir: PathBuf,
    io_gate: tokio::sync::Mutex<()>,
}

impl JsonFileMergeStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            io_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn cumulative_path(&self, city: &str) -> PathBuf {
        self.base_dir.join("cities").join(format!("{city}.json"))
    }

    fn snapshot_path(&self, city: &str, call_number: u32) -> PathBuf {
        self.base_dir
            .join("chamadas")
            .join(city)
            .join(format!("c{call_number}.json"))
    }

    fn dump_path(&self, call_number: u32) -> PathBuf {
        self.base_dir.join(format!("chamada_{call_number}_full.json"))
    }

    async fn read_records(path: &Path) -> Vec<ClassifiedRecord> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable store file, treating as empty");
                Vec::new()
            }
        }
    }

    async fn write_records(path: &Path, records: &[ClassifiedRecord]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(path, json).await.map_err(|e| PipelineError::Storage {
            message: format!("failed to write '{}': {}", path.display(), e),
        })?;
        debug!(path = %path.display(), count = records.len(), "store file written");
        Ok(())
    }
}

#[async_trait]
impl MergeStore for JsonFileMergeStore {
    async fn replace_call_snapshot(
        &self,
        city: &str,
        call_number: u32,
        records: &[ClassifiedRecord],
    ) -> Result<()> {
        let _guard = self.io_gate.lock().await;
        Self::write_records(&self.snapshot_path(city, call_number), records).await
    }

    async fn append_missing(&self, city: &str, records: &[ClassifiedRecord]) -> Result<AppendOutcome> {
        let _guard = self.io_gate.lock().await;
        let path = self.cumulative_path(city);
        let mut entries = Self::read_records(&path).await;
        let outcome = append_if_absent(&mut entries, records);
        if outcome.inserted > 0 {
            Self::write_records(&path, &entries).await?;
        }
        Ok(outcome)
    }

    async fn write_call_dump(&self, call_number: u32, records: &[ClassifiedRecord]) -> Result<()> {
        let _guard = self.io_gate.lock().await;
        Self::write_records(&self.dump_path(call_number), records).await
    }

    async fn load_cumulative(&self, city: &str) -> Result<Vec<ClassifiedRecord>> {
        Ok(Self::read_records(&self.cumulative_path(city)).await)
    }

    async fn load_call_snapshot(&self, city: &str, call_number: u32) -> Result<Vec<ClassifiedRecord>> {
        Ok(Self::read_records(&self.snapshot_path(city, call_number)).await)
    }

    async fn load_call_dump(&self, call_number: u32) -> Result<Vec<ClassifiedRecord>> {
        Ok(Self::read_records(&self.dump_path(call_number)).await)
    }
}
