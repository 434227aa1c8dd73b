//! Which metadata keys are versioned, per record type.
//!
//! ```json
//! {
//!   "record_types": {
//!     "post": {
//!       "subtitle": "Subtitle",
//!       "byline": { "label": "Byline", "source_path": ["meta", "byline"] },
//!       "_thumbnail_id": { "source_path": "thumbnail" }
//!     }
//!   },
//!   "split_view": true
//! }
//! ```

use crate::error::Result;
use crate::field::FieldSet;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionsConfig {
    /// Record type -> tracked key -> declaration, in file order
    #[serde(default)]
    pub record_types: IndexMap<String, IndexMap<String, FieldSpec>>,
    /// Render comparisons side by side
    #[serde(default)]
    pub split_view: bool,
}

/// A field declaration: either just its label, or label and source path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    Label(String),
    Options(FieldOptions),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldOptions {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub source_path: Option<SourcePath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourcePath {
    Key(String),
    Path(Vec<String>),
}

impl RevisionsConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Normalized field sets, one per record type, in declaration order.
    pub fn field_sets(&self) -> Result<Vec<(String, FieldSet)>> {
        self.record_types
            .iter()
            .map(|(record_type, specs)| {
                FieldSet::from_specs(specs.clone()).map(|set| (record_type.clone(), set))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "record_types": {
            "post": {
                "subtitle": "Subtitle",
                "byline": { "label": "Byline", "source_path": ["meta", "byline"] },
                "_thumbnail_id": { "source_path": "thumbnail" }
            },
            "page": {}
        },
        "split_view": true
    }"#;

    #[test]
    fn test_parse_and_normalize() {
        let config = RevisionsConfig::from_json_str(SAMPLE).unwrap();
        assert!(config.split_view);

        let sets = config.field_sets().unwrap();
        assert_eq!(sets.len(), 2);
        let (record_type, post) = &sets[0];
        assert_eq!(record_type, "post");
        assert_eq!(
            post.keys().collect::<Vec<_>>(),
            vec!["subtitle", "byline", "_thumbnail_id"]
        );

        let byline = post.get("byline").unwrap();
        assert_eq!(byline.label, "Byline");
        assert_eq!(byline.source_path, vec!["meta", "byline"]);

        let thumb = post.get("_thumbnail_id").unwrap();
        assert_eq!(thumb.label, "_thumbnail_id");
        assert_eq!(thumb.source_path, vec!["thumbnail"]);

        assert!(sets[1].1.is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = RevisionsConfig::from_json_str("{}").unwrap();
        assert!(config.record_types.is_empty());
        assert!(!config.split_view);
    }

    #[test]
    fn test_reserved_key_is_a_config_error() {
        let config =
            RevisionsConfig::from_json_str(r#"{"record_types": {"post": {"_revision_meta": "x"}}}"#)
                .unwrap();
        assert!(config.field_sets().is_err());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("revisions.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = RevisionsConfig::from_path(&path).unwrap();
        assert_eq!(config.record_types.len(), 2);
    }
}
