//! Classification pipeline: derives immutable classified records from
//! extracted candidates using the read-only lookup tables.

pub mod campus;
pub mod gender;

use tracing::debug;

use crate::domain::{CandidateRecord, ClassifiedRecord};
use crate::lookups::LookupTables;
use crate::normalize::{clean_course_name, REASSIGNMENT_MARKER};

/// Classify one candidate. Unresolved lookups degrade to defaults
/// (`city = None`, indeterminate gender) and are never fatal.
pub fn classify_record(candidate: CandidateRecord, tables: &LookupTables) -> ClassifiedRecord {
    let gender = gender::classify(&candidate.raw_name, tables);
    let resolution = campus::resolve(&candidate.raw_course, tables);
    let reassigned = candidate.raw_course.contains(REASSIGNMENT_MARKER);
    let course_normalized = clean_course_name(&candidate.raw_course);

    ClassifiedRecord {
        enrollment_id: candidate.enrollment_id,
        raw_name: candidate.raw_name,
        raw_course: candidate.raw_course,
        course_normalized,
        city: resolution.city,
        unit: resolution.unit,
        call_number: candidate.call_number,
        institution: candidate.institution,
        gender,
        quota_marker: candidate.quota_marker,
        reassigned,
    }
}

/// Classify a whole extracted batch, in listing order.
pub fn classify_batch(
    candidates: Vec<CandidateRecord>,
    tables: &LookupTables,
) -> Vec<ClassifiedRecord> {
    let total = candidates.len();
    let records: Vec<ClassifiedRecord> = candidates
        .into_iter()
        .map(|candidate| classify_record(candidate, tables))
        .collect();
    debug!(total, "batch classified");
    records
}
