//! Remote relational mirror.
//!
//! The final record set is mirrored into a remote store keyed by enrollment
//! id. The mirror is best-effort: it runs after local persistence and its
//! failure is reported, never propagated into the merge outcome.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::ClassifiedRecord;
use crate::error::{PipelineError, Result};

/// One row in the remote schema. The conflict key for the upsert is
/// `inscricao`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub inscricao: String,
    pub name: String,
    pub course: String,
    pub university: String,
    pub cidade: String,
    pub unidade: Option<String>,
    pub chamada: u32,
    pub genero: String,
    pub cota: Option<String>,
    pub remanejado: bool,
}

/// Rows eligible for mirroring plus the count rejected for missing required
/// fields. Rejection here is independent of the local merge: a skipped row
/// still lives in the local snapshot and dump stores.
#[derive(Debug, Clone, Default)]
pub struct RemoteBatch {
    pub rows: Vec<RemoteRow>,
    pub skipped: usize,
}

/// Transform classified records into remote rows.
///
/// Records missing the enrollment id, name, course, or resolved city are
/// skipped. Duplicate enrollment ids within the batch collapse to one row,
/// last write wins, because the remote sink enforces uniqueness on that key.
pub fn to_remote_rows(records: &[ClassifiedRecord]) -> RemoteBatch {
    let mut rows: Vec<RemoteRow> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0;

    for record in records {
        let course = if record.course_normalized.is_empty() {
            record.raw_course.as_str()
        } else {
            record.course_normalized.as_str()
        };

        let city = match record.city.as_deref() {
            Some(city) if !city.is_empty() => city,
            _ => {
                skipped += 1;
                continue;
            }
        };
        if record.enrollment_id.is_empty() || record.raw_name.is_empty() || course.is_empty() {
            skipped += 1;
            continue;
        }

        let row = RemoteRow {
            inscricao: record.enrollment_id.clone(),
            name: record.raw_name.clone(),
            course: course.to_string(),
            university: record.institution.clone(),
            cidade: city.to_string(),
            unidade: record.unit.clone(),
            chamada: record.call_number,
            genero: record.gender.remote_label().to_string(),
            cota: record.quota_marker.clone(),
            remanejado: record.reassigned,
        };

        match index.get(&row.inscricao) {
            Some(&pos) => rows[pos] = row,
            None => {
                index.insert(row.inscricao.clone(), rows.len());
                rows.push(row);
            }
        }
    }

    debug!(rows = rows.len(), skipped, "remote batch transformed");
    RemoteBatch { rows, skipped }
}

#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Upsert the rows, conflict key `inscricao`. Returns how many rows were
    /// sent.
    async fn upsert(&self, rows: &[RemoteRow]) -> Result<usize>;
}

/// PostgREST-style HTTP sink. Credentials come from the environment
/// (`SUPABASE_URL` / `SUPABASE_SERVICE_KEY`); when either is absent the
/// mirror is simply disabled.
pub struct HttpRemoteSink {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    table: String,
}

impl HttpRemoteSink {
    pub fn new(base_url: String, service_key: String, table: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Remote {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            table,
        })
    }

    /// Build a sink from the environment, or `None` when it is not
    /// configured.
    pub fn from_env(table: &str, timeout: Duration) -> Result<Option<Self>> {
        let url = env::var("SUPABASE_URL").ok();
        let key = env::var("SUPABASE_SERVICE_KEY").ok();
        match (url, key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                info!(table, "remote mirror configured");
                Ok(Some(Self::new(url, key, table.to_string(), timeout)?))
            }
            _ => {
                info!("SUPABASE_URL / SUPABASE_SERVICE_KEY not set, remote mirror disabled");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl RemoteSink for HttpRemoteSink {
    async fn upsert(&self, rows: &[RemoteRow]) -> Result<usize> {
        let url = format!(
            "{}/rest/v1/{}?on_conflict=inscricao",
            self.base_url, self.table
        );

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(header::CONTENT_TYPE, "application/json")
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await
            .map_err(|e| PipelineError::Remote {
                message: format!("upsert request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Remote {
                message: format!("upsert rejected with {status}: {body}"),
            });
        }

        info!(rows = rows.len(), table = %self.table, "remote upsert completed");
        Ok(rows.len())
    }
}
