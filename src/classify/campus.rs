use crate::lookups::LookupTables;
use crate::normalize::{collapse_whitespace, lookup_key};

/// Outcome of resolving a raw course string through the two-stage
/// course -> units -> city lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampusResolution {
    pub unit: Option<String>,
    pub city: Option<String>,
}

impl CampusResolution {
    fn unresolved() -> Self {
        Self::default()
    }
}

/// Resolve a course to its unit and city.
///
/// The lookup key strips only the reassignment marker; the shift marker is
/// part of the key. A verbatim miss is retried once with internal whitespace
/// collapsed, defending against incidental double-spacing in source data.
/// On a hit the first unit wins; list order encodes curation priority. A
/// unit missing from the city map yields `(unit, None)` rather than a fully
/// unresolved result.
pub fn resolve(raw_course: &str, tables: &LookupTables) -> CampusResolution {
    let key = lookup_key(raw_course);

    let units = tables
        .course_units
        .get(&key)
        .or_else(|| tables.course_units.get(&collapse_whitespace(&key)));

    let units = match units {
        Some(units) => units,
        None => return CampusResolution::unresolved(),
    };
    let unit = match units.first() {
        Some(unit) => unit.clone(),
        None => return CampusResolution::unresolved(),
    };

    let city = tables.unit_city.get(&unit).cloned();
    CampusResolution {
        unit: Some(unit),
        city,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tables() -> LookupTables {
        let mut course_units = HashMap::new();
        course_units.insert(
            "Matematica - Licenciatura (N)".to_string(),
            vec!["IMECC".to_string(), "IFGW".to_string()],
        );
        course_units.insert("Pedagogia (N)".to_string(), vec!["FE".to_string()]);
        course_units.insert("Sem Lista".to_string(), Vec::new());

        let mut unit_city = HashMap::new();
        unit_city.insert("IMECC".to_string(), "Campinas".to_string());
        unit_city.insert("IFGW".to_string(), "Limeira".to_string());

        LookupTables::from_maps(HashMap::new(), course_units, unit_city)
    }

    #[test]
    fn first_unit_wins_on_ties() {
        let resolution = resolve("Matematica - Licenciatura (N)", &tables());
        assert_eq!(resolution.unit.as_deref(), Some("IMECC"));
        assert_eq!(resolution.city.as_deref(), Some("Campinas"));
    }

    #[test]
    fn reassignment_marker_is_stripped_from_the_key() {
        let resolution = resolve("Matematica - Licenciatura (N) REMANEJADO", &tables());
        assert_eq!(resolution.unit.as_deref(), Some("IMECC"));
    }

    #[test]
    fn double_spacing_is_retried_collapsed() {
        let resolution = resolve("Matematica  -  Licenciatura  (N)", &tables());
        assert_eq!(resolution.unit.as_deref(), Some("IMECC"));
    }

    #[test]
    fn unknown_course_is_fully_unresolved() {
        assert_eq!(resolve("Curso Fantasma (N)", &tables()), CampusResolution::unresolved());
    }

    #[test]
    fn empty_unit_list_is_fully_unresolved() {
        assert_eq!(resolve("Sem Lista", &tables()), CampusResolution::unresolved());
    }

    #[test]
    fn unit_without_city_keeps_the_unit() {
        let resolution = resolve("Pedagogia (N)", &tables());
        assert_eq!(resolution.unit.as_deref(), Some("FE"));
        assert_eq!(resolution.city, None);
    }
}
