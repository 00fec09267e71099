use crate::domain::Gender;
use crate::lookups::LookupTables;

/// Resolve a full name to a gender code via the first-name map.
///
/// The first whitespace token is uppercased and looked up verbatim; on a
/// miss the token is retried with everything outside A-Z stripped (accented
/// letters fall out here, matching how the map is keyed). No other fallback
/// is attempted.
pub fn classify(full_name: &str, tables: &LookupTables) -> Gender {
    let first = match full_name.split_whitespace().next() {
        Some(token) => token.to_uppercase(),
        None => return Gender::Indeterminate,
    };

    if let Some(gender) = tables.gender.get(&first) {
        return *gender;
    }

    let letters_only: String = first.chars().filter(|c| c.is_ascii_uppercase()).collect();
    if !letters_only.is_empty() {
        if let Some(gender) = tables.gender.get(&letters_only) {
            return *gender;
        }
    }

    Gender::Indeterminate
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tables() -> LookupTables {
        let mut gender = HashMap::new();
        gender.insert("ABEL".to_string(), Gender::Male);
        gender.insert("MARIA".to_string(), Gender::Female);
        gender.insert("DARC".to_string(), Gender::Female);
        LookupTables::from_maps(gender, HashMap::new(), HashMap::new())
    }

    #[test]
    fn mapped_first_token_resolves() {
        assert_eq!(classify("Abel Rapha de Jesus Macedo", &tables()), Gender::Male);
        assert_eq!(classify("maria clara souza", &tables()), Gender::Female);
    }

    #[test]
    fn unmapped_name_is_indeterminate() {
        assert_eq!(classify("Zyx Unknown", &tables()), Gender::Indeterminate);
    }

    #[test]
    fn non_letter_characters_fall_back_after_stripping() {
        // "D'arc" uppercases to "D'ARC"; the verbatim lookup misses and the
        // stripped "DARC" hits.
        assert_eq!(classify("D'arc Oliveira", &tables()), Gender::Female);
    }

    #[test]
    fn empty_name_is_indeterminate() {
        assert_eq!(classify("", &tables()), Gender::Indeterminate);
        assert_eq!(classify("   ", &tables()), Gender::Indeterminate);
    }
}
