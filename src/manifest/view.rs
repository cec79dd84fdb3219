//! View declarations.

use chrono::Utc;
use mongodb::bson::Document;
use serde::Deserialize;

use crate::seed::convert::{self, ConvertError};

/// Read-only view defined by an aggregation pipeline over a collection in the
/// same database.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewSpec {
    pub name: String,
    /// Collection the pipeline reads from.
    pub source: String,
    pub pipeline: Vec<serde_json::Value>,
}

impl ViewSpec {
    /// Pipeline stages as BSON documents.
    pub fn pipeline_documents(&self) -> Result<Vec<Document>, ConvertError> {
        let now = Utc::now();
        self.pipeline
            .iter()
            .map(|stage| convert::to_document(stage, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_pipeline_documents_preserve_stage_key_order() {
        let view: ViewSpec = serde_yaml::from_str(
            r#"
name: by_score
source: items
pipeline:
  - "$match": { active: true }
  - "$sort": { score: -1, name: 1 }
"#,
        )
        .unwrap();

        let stages = view.pipeline_documents().unwrap();
        assert_eq!(stages[0], doc! { "$match": { "active": true } });

        let sort = stages[1].get_document("$sort").unwrap();
        let keys: Vec<&str> = sort.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["score", "name"]);
    }

    #[test]
    fn test_pipeline_stage_must_be_object() {
        let view = ViewSpec {
            name: "v".to_string(),
            source: "c".to_string(),
            pipeline: vec![serde_json::json!("$match")],
        };
        assert!(view.pipeline_documents().is_err());
    }
}
