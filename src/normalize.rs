//! Course-name normalization.
//!
//! Two distinct outputs are derived from a raw course string and must not be
//! unified: the campus lookup key keeps the trailing shift marker because the
//! course map is keyed with it, while the stored display name strips every
//! marker and all diacritics.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Token flagging a student moved from their original course offer.
pub const REASSIGNMENT_MARKER: &str = "REMANEJADO";

static REASSIGNMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*REMANEJADO\b").unwrap());

// Trailing parenthetical shift marker, e.g. "(N)" or "(I)".
static SHIFT_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]+\)\s*$").unwrap());

static LICENTIATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*-\s*Licenciatura").unwrap());

/// One named transformation in the cleaning pipeline.
pub struct CleaningStep {
    pub name: &'static str,
    pub apply: fn(&str) -> String,
}

/// The display-name cleaning pipeline. Order is a contract: the shift marker
/// is anchored at end-of-string and the licentiate suffix may precede it, so
/// swapping steps 2 and 3 leaves the suffix behind.
pub const CLEANING_STEPS: [CleaningStep; 4] = [
    CleaningStep {
        name: "strip_reassignment_marker",
        apply: strip_reassignment_marker,
    },
    CleaningStep {
        name: "strip_shift_marker",
        apply: strip_shift_marker,
    },
    CleaningStep {
        name: "strip_licentiate_suffix",
        apply: strip_licentiate_suffix,
    },
    CleaningStep {
        name: "strip_diacritics",
        apply: strip_diacritics,
    },
];

/// Step 1: drop the standalone reassignment marker token (case-sensitive)
/// together with the whitespace in front of it.
pub fn strip_reassignment_marker(course: &str) -> String {
    if course.is_empty() {
        return String::new();
    }
    REASSIGNMENT_RE.replace_all(course, "").trim().to_string()
}

/// Step 2: drop a trailing parenthetical group (the shift marker) and any
/// whitespace before it. Only anchored at end-of-string.
pub fn strip_shift_marker(course: &str) -> String {
    if course.is_empty() {
        return String::new();
    }
    SHIFT_MARKER_RE.replace(course, "").trim().to_string()
}

/// Step 3: drop a "- Licenciatura" suffix, case-insensitive, tolerating
/// whitespace around the dash.
pub fn strip_licentiate_suffix(course: &str) -> String {
    if course.is_empty() {
        return String::new();
    }
    LICENTIATE_RE.replace_all(course, "").trim().to_string()
}

/// Step 4: decompose (NFD) and drop combining marks, e.g. "Ciência" ->
/// "Ciencia".
pub fn strip_diacritics(course: &str) -> String {
    course.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapse runs of internal whitespace to single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Display course name: all four cleaning steps, in order.
pub fn clean_course_name(raw: &str) -> String {
    CLEANING_STEPS
        .iter()
        .fold(raw.to_string(), |acc, step| (step.apply)(&acc))
}

/// Campus lookup key: step 1 only. The shift marker stays because the
/// course->units map is keyed on course names that still carry it.
pub fn lookup_key(raw: &str) -> String {
    strip_reassignment_marker(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_reassignment_marker_anywhere() {
        assert_eq!(strip_reassignment_marker("Pedagogia REMANEJADO (N)"), "Pedagogia (N)");
        assert_eq!(strip_reassignment_marker("REMANEJADO Pedagogia"), "Pedagogia");
        assert_eq!(strip_reassignment_marker("Pedagogia (N)"), "Pedagogia (N)");
    }

    #[test]
    fn reassignment_marker_is_case_sensitive() {
        assert_eq!(strip_reassignment_marker("Pedagogia remanejado"), "Pedagogia remanejado");
    }

    #[test]
    fn strips_trailing_shift_marker_only() {
        assert_eq!(strip_shift_marker("Pedagogia (N)"), "Pedagogia");
        assert_eq!(strip_shift_marker("Pedagogia (Integral)"), "Pedagogia");
        // Not anchored at the end: untouched.
        assert_eq!(strip_shift_marker("Musica (Erudita) Popular"), "Musica (Erudita) Popular");
    }

    #[test]
    fn strips_licentiate_suffix_case_insensitive() {
        assert_eq!(strip_licentiate_suffix("Pedagogia - Licenciatura"), "Pedagogia");
        assert_eq!(strip_licentiate_suffix("Pedagogia- licenciatura"), "Pedagogia");
        assert_eq!(strip_licentiate_suffix("Pedagogia -Licenciatura (N)"), "Pedagogia (N)");
    }

    #[test]
    fn strips_diacritics() {
        assert_eq!(strip_diacritics("Ciência da Computação"), "Ciencia da Computacao");
        assert_eq!(strip_diacritics("Química"), "Quimica");
    }

    #[test]
    fn every_step_maps_empty_to_empty() {
        for step in &CLEANING_STEPS {
            assert_eq!((step.apply)(""), "", "step {}", step.name);
        }
    }

    #[test]
    fn clean_course_name_applies_canonical_order() {
        let raw = "Matemática - Licenciatura (N)";
        assert_eq!(clean_course_name(raw), "Matematica");
    }

    #[test]
    fn out_of_order_cleaning_is_wrong() {
        // Stripping the licentiate suffix before the shift marker leaves the
        // suffix in place when the marker sits after it; the canonical order
        // handles it. This pins the order as a contract.
        let raw = "Matemática (N) - Licenciatura";
        let out_of_order = strip_diacritics(&strip_shift_marker(&strip_licentiate_suffix(
            &strip_reassignment_marker(raw),
        )));
        let canonical = clean_course_name(raw);
        assert_eq!(canonical, "Matematica (N)");
        assert_ne!(out_of_order, canonical);
    }

    #[test]
    fn clean_course_name_is_idempotent() {
        let once = clean_course_name("Matemática - Licenciatura (N) REMANEJADO");
        assert_eq!(clean_course_name(&once), once);
    }

    #[test]
    fn lookup_key_keeps_shift_marker() {
        assert_eq!(lookup_key("Pedagogia REMANEJADO (N)"), "Pedagogia (N)");
        assert_eq!(lookup_key("Pedagogia (N)"), "Pedagogia (N)");
    }

    #[test]
    fn collapse_whitespace_joins_runs() {
        assert_eq!(collapse_whitespace("Engenharia  Eletrica   (N)"), "Engenharia Eletrica (N)");
    }
}
