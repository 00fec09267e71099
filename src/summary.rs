use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{ClassifiedRecord, Gender};

/// Sentinel bucket for records whose city could not be resolved. Used for
/// grouping and counting only; the cumulative store never sees this key.
pub const INDETERMINATE_CITY: &str = "indeterminado";

/// Sentinel bucket for records without a quota marker.
pub const NO_QUOTA: &str = "sem_cota";

/// Count distributions for one classified batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    #[serde(rename = "por_genero")]
    pub by_gender: BTreeMap<String, usize>,
    #[serde(rename = "por_cidade")]
    pub by_city: BTreeMap<String, usize>,
    #[serde(rename = "por_cota")]
    pub by_quota: BTreeMap<String, usize>,
    /// First-name tokens that failed gender resolution, deduplicated and
    /// sorted. Feeds curation of the name map.
    #[serde(rename = "nomes_nao_identificados")]
    pub unresolved_names: Vec<String>,
}

/// Pure aggregation over a batch; no side effects.
pub fn summarize(records: &[ClassifiedRecord]) -> BatchSummary {
    let mut by_gender: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_city: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_quota: BTreeMap<String, usize> = BTreeMap::new();
    let mut unresolved: BTreeSet<String> = BTreeSet::new();

    for record in records {
        *by_gender.entry(record.gender.code().to_string()).or_default() += 1;

        let city_key = record.city.as_deref().unwrap_or(INDETERMINATE_CITY);
        *by_city.entry(city_key.to_string()).or_default() += 1;

        let quota_key = record.quota_marker.as_deref().unwrap_or(NO_QUOTA);
        *by_quota.entry(quota_key.to_string()).or_default() += 1;

        if record.gender == Gender::Indeterminate {
            if let Some(first) = record.raw_name.split_whitespace().next() {
                unresolved.insert(first.to_uppercase());
            }
        }
    }

    BatchSummary {
        total: records.len(),
        by_gender,
        by_city,
        by_quota,
        unresolved_names: unresolved.into_iter().collect(),
    }
}
