use serde::{Deserialize, Serialize};

/// Gender code inferred from the first name via the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "I")]
    Indeterminate,
}

impl Gender {
    pub fn code(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Indeterminate => "I",
        }
    }

    /// Label used by the remote store schema.
    pub fn remote_label(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Indeterminate => "other",
        }
    }
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Indeterminate
    }
}

/// One admission-call line as extracted from the raw listing, before any
/// classification. Created once per extraction pass and never mutated.
///
/// Serialized field names follow the persisted wire contract inherited from
/// the upstream portal data (Portuguese keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Enrollment id, the globally unique key within a cycle.
    #[serde(rename = "inscricao")]
    pub enrollment_id: String,
    /// Candidate name with the quota marker already stripped.
    #[serde(rename = "nome")]
    pub raw_name: String,
    /// Course segment as listed, whitespace-collapsed. May still carry the
    /// reassignment marker and a trailing shift marker.
    #[serde(rename = "curso")]
    pub raw_course: String,
    /// Asterisk-run quota annotation, e.g. "(***)", when present.
    #[serde(rename = "cota")]
    pub quota_marker: Option<String>,
    /// Admission round this listing belongs to.
    #[serde(rename = "chamada")]
    pub call_number: u32,
    #[serde(rename = "universidade")]
    pub institution: String,
}

/// A candidate record after gender/campus classification and course-name
/// cleaning. Derived once and treated as immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    #[serde(rename = "inscricao")]
    pub enrollment_id: String,
    #[serde(rename = "nome")]
    pub raw_name: String,
    #[serde(rename = "curso")]
    pub raw_course: String,
    /// Display course name: reassignment marker, shift marker, licentiate
    /// suffix and diacritics all stripped.
    #[serde(rename = "curso_limpo")]
    pub course_normalized: String,
    #[serde(rename = "cidade")]
    pub city: Option<String>,
    #[serde(rename = "unidade")]
    pub unit: Option<String>,
    #[serde(rename = "chamada")]
    pub call_number: u32,
    #[serde(rename = "universidade")]
    pub institution: String,
    #[serde(rename = "genero")]
    pub gender: Gender,
    #[serde(rename = "cota")]
    pub quota_marker: Option<String>,
    /// True iff the raw course carried the reassignment marker.
    #[serde(rename = "remanejado")]
    pub reassigned: bool,
}
