//! Raw listing extraction.
//!
//! An admission-call listing is a preformatted text block, one candidate per
//! line: `(<digits>)<ws><name [quota]><3+ spaces><course>`. The run of three
//! or more spaces is the only reliable separator, since both names and course
//! titles may contain single and double spaces internally.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::CandidateRecord;
use crate::normalize::collapse_whitespace;

static LINE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\((\d+)\)\s*(.*?)\s{3,}(.*)$").unwrap());

// Trailing parenthetical run of asterisks/whitespace on the name segment,
// e.g. " (*)" or " (***)".
static QUOTA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\s*\([*\s]+\))\s*$").unwrap());

/// Why a line was rejected by the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The line does not match the outer grammar at all.
    GrammarMismatch,
    /// The name segment is empty once the quota marker is stripped.
    EmptyName,
    /// The course segment is empty after whitespace collapsing.
    EmptyCourse,
}

/// One rejected line, kept for the batch-level report.
#[derive(Debug, Clone, Serialize)]
pub struct LineFailure {
    pub line_number: usize,
    pub line: String,
    pub reason: FailureReason,
}

/// Per-line extraction outcome. Empty lines are skipped without being counted
/// as failures.
#[derive(Debug, Clone)]
pub enum LineOutcome {
    Record(CandidateRecord),
    Empty,
    Failed(LineFailure),
}

/// Extraction result for one raw text blob. A bad line never aborts the
/// batch; it lands in `failures` and extraction continues.
#[derive(Debug, Clone, Default)]
pub struct ExtractionReport {
    pub records: Vec<CandidateRecord>,
    pub failures: Vec<LineFailure>,
}

pub fn extract_line(
    line: &str,
    line_number: usize,
    call_number: u32,
    institution: &str,
) -> LineOutcome {
    let line = line.trim();
    if line.is_empty() {
        return LineOutcome::Empty;
    }

    let caps = match LINE_RE.captures(line) {
        Some(caps) => caps,
        None => {
            return LineOutcome::Failed(LineFailure {
                line_number,
                line: line.to_string(),
                reason: FailureReason::GrammarMismatch,
            })
        }
    };

    let enrollment_id = caps[1].to_string();
    let name_segment = caps[2].trim();
    let course_segment = caps[3].trim();

    let (raw_name, quota_marker) = match QUOTA_RE.captures(name_segment) {
        Some(quota) => {
            let marker = quota[1].trim().to_string();
            let name = name_segment[..quota.get(1).unwrap().start()].trim();
            (name.to_string(), Some(marker))
        }
        None => (name_segment.to_string(), None),
    };

    if raw_name.is_empty() {
        return LineOutcome::Failed(LineFailure {
            line_number,
            line: line.to_string(),
            reason: FailureReason::EmptyName,
        });
    }

    let raw_course = collapse_whitespace(course_segment);
    if raw_course.is_empty() {
        return LineOutcome::Failed(LineFailure {
            line_number,
            line: line.to_string(),
            reason: FailureReason::EmptyCourse,
        });
    }

    LineOutcome::Record(CandidateRecord {
        enrollment_id,
        raw_name,
        raw_course,
        quota_marker,
        call_number,
        institution: institution.to_string(),
    })
}

/// Run the line grammar over a whole listing.
pub fn extract_batch(text: &str, call_number: u32, institution: &str) -> ExtractionReport {
    let mut report = ExtractionReport::default();

    for (idx, line) in text.lines().enumerate() {
        match extract_line(line, idx + 1, call_number, institution) {
            LineOutcome::Record(record) => report.records.push(record),
            LineOutcome::Empty => {}
            LineOutcome::Failed(failure) => {
                warn!(
                    line = failure.line_number,
                    reason = ?failure.reason,
                    "skipping unparseable line"
                );
                report.failures.push(failure);
            }
        }
    }

    debug!(
        records = report.records.len(),
        failures = report.failures.len(),
        call = call_number,
        "extraction finished"
    );
    report
}
