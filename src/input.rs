//! JSON input loading for local references, candidates and reference lists.

use std::fs;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;
use crate::model::{ExternalCandidate, LocalReference, LocalReferences, ReferenceListEntry};

/// Parse local references from JSON.
///
/// Accepts `{"1": {...}, "2": {...}}` or `[{"number": 1, ...}, ...]`.
pub fn parse_local_references(json: &str) -> Result<LocalReferences> {
    let value: Value = serde_json::from_str(json)?;
    if value.is_array() {
        let list: Vec<LocalReference> = serde_json::from_value(value)?;
        Ok(list.into_iter().collect())
    } else {
        Ok(serde_json::from_value(value)?)
    }
}

/// Parse external candidates from JSON.
///
/// Accepts `[...]` or `{"candidates": [...]}`.
pub fn parse_candidates(json: &str) -> Result<Vec<ExternalCandidate>> {
    let value = match serde_json::from_str::<Value>(json)? {
        Value::Object(mut map) => match map.remove("candidates") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };
    Ok(serde_json::from_value(value)?)
}

/// Parse a final reference list from JSON.
pub fn parse_reference_list(json: &str) -> Result<Vec<ReferenceListEntry>> {
    Ok(serde_json::from_str(json)?)
}

/// Load local references from a JSON file.
pub fn load_local_references<P: AsRef<Path>>(path: P) -> Result<LocalReferences> {
    parse_local_references(&fs::read_to_string(path)?)
}

/// Load external candidates from a JSON file.
pub fn load_candidates<P: AsRef<Path>>(path: P) -> Result<Vec<ExternalCandidate>> {
    parse_candidates(&fs::read_to_string(path)?)
}

/// Load a reference list from a JSON file.
pub fn load_reference_list<P: AsRef<Path>>(path: P) -> Result<Vec<ReferenceListEntry>> {
    parse_reference_list(&fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReferenceType;

    #[test]
    fn test_local_references_map_form() {
        let json = r#"{"1": {"title": "A", "authors": ["X. Y"], "year": 2020}, "4": {"title": "B"}}"#;
        let local = parse_local_references(json).unwrap();
        assert_eq!(local.len(), 2);
        assert_eq!(local.get(4).map(|m| m.title.as_str()), Some("B"));
    }

    #[test]
    fn test_local_references_list_form() {
        let json = r#"[{"number": 3, "title": "C", "authors": []}]"#;
        let local = parse_local_references(json).unwrap();
        assert!(local.contains(3));
    }

    #[test]
    fn test_candidates_defaults() {
        let json = r#"{"candidates": [{"placeholder": 31, "metadata": {"title": "T"}, "type": "method"}]}"#;
        let candidates = parse_candidates(json).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].selected);
        assert_eq!(candidates[0].type_tag, ReferenceType::Method);
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(parse_candidates("{not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.json");
        std::fs::write(&path, r#"[{"number": 1, "title": "A"}]"#).unwrap();
        assert_eq!(load_local_references(&path).unwrap().len(), 1);
    }
}
