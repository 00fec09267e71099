use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain::Gender;
use crate::error::{PipelineError, Result};

/// The three read-only reference maps the classifiers resolve against.
/// Loaded once per operation and never mutated by the pipeline.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    /// Uppercase first-name token -> gender code.
    pub gender: HashMap<String, Gender>,
    /// Course key (shift-marker-inclusive) -> ordered unit codes. The first
    /// entry is canonical; list order encodes curation priority.
    pub course_units: HashMap<String, Vec<String>>,
    /// Unit code -> city name.
    pub unit_city: HashMap<String, String>,
}

impl LookupTables {
    pub fn load(
        gender_path: impl AsRef<Path>,
        campus_path: impl AsRef<Path>,
        city_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let gender = read_map(gender_path.as_ref())?;
        let course_units = read_map(campus_path.as_ref())?;
        let unit_city = read_map(city_path.as_ref())?;

        let tables = Self {
            gender,
            course_units,
            unit_city,
        };
        info!(
            names = tables.gender.len(),
            courses = tables.course_units.len(),
            units = tables.unit_city.len(),
            "lookup tables loaded"
        );
        Ok(tables)
    }

    /// Build tables directly from maps, bypassing the filesystem. Used by
    /// tests and by embedders that ship their own reference data.
    pub fn from_maps(
        gender: HashMap<String, Gender>,
        course_units: HashMap<String, Vec<String>>,
        unit_city: HashMap<String, String>,
    ) -> Self {
        Self {
            gender,
            course_units,
            unit_city,
        }
    }
}

fn read_map<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        PipelineError::Lookup(format!("failed to read '{}': {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        PipelineError::Lookup(format!("failed to parse '{}': {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_reads_all_three_maps() {
        let dir = tempfile::tempdir().unwrap();
        let gender = dir.path().join("gender_map.json");
        let campus = dir.path().join("campus_map.json");
        let city = dir.path().join("cidade_map.json");
        std::fs::write(&gender, r#"{"ABEL": "M", "MARIA": "F"}"#).unwrap();
        std::fs::write(&campus, r#"{"Matematica - Licenciatura (N)": ["IMECC"]}"#).unwrap();
        std::fs::write(&city, r#"{"IMECC": "Campinas"}"#).unwrap();

        let tables = LookupTables::load(&gender, &campus, &city).unwrap();
        assert_eq!(tables.gender.get("ABEL"), Some(&Gender::Male));
        assert_eq!(
            tables.course_units.get("Matematica - Licenciatura (N)"),
            Some(&vec!["IMECC".to_string()])
        );
        assert_eq!(tables.unit_city.get("IMECC").map(String::as_str), Some("Campinas"));
    }

    #[test]
    fn load_fails_with_lookup_error_on_missing_file() {
        let err = LookupTables::load("/nonexistent/a.json", "/nonexistent/b.json", "/nonexistent/c.json")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Lookup(_)));
    }
}
