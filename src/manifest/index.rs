//! Index declarations.

use std::str::FromStr;
use std::time::Duration;

use mongodb::bson::{Bson, Document};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use serde::Deserialize;

/// Direction or type of one index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Ascending,
    Descending,
    Text,
}

impl IndexKind {
    fn to_bson(self) -> Bson {
        match self {
            IndexKind::Ascending => Bson::Int32(1),
            IndexKind::Descending => Bson::Int32(-1),
            IndexKind::Text => Bson::String("text".to_string()),
        }
    }
}

/// One key of an index, written `field`, `field:asc`, `field:desc` or `field:text`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct IndexKey {
    pub field: String,
    pub kind: IndexKind,
}

impl FromStr for IndexKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, kind) = match s.rsplit_once(':') {
            Some((field, "asc")) => (field, IndexKind::Ascending),
            Some((field, "desc")) => (field, IndexKind::Descending),
            Some((field, "text")) => (field, IndexKind::Text),
            Some((_, other)) => {
                return Err(format!(
                    "unknown index kind '{}' in '{}' (expected asc, desc or text)",
                    other, s
                ))
            }
            None => (s, IndexKind::Ascending),
        };

        let field = field.trim();
        if field.is_empty() {
            return Err(format!("index key '{}' has no field name", s));
        }

        Ok(Self {
            field: field.to_string(),
            kind,
        })
    }
}

impl TryFrom<String> for IndexKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// When documents indexed by a TTL index expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// N seconds after the indexed timestamp.
    AfterSeconds(u64),
    /// At the absolute time stored in the indexed field (`expireAfterSeconds: 0`).
    AtFieldValue,
}

/// Index declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexSpec {
    /// Keys in order; order matters for compound indexes.
    pub keys: Vec<IndexKey>,
    pub unique: bool,
    /// Explicit name; the server derives one from the keys otherwise.
    pub name: Option<String>,
    pub expire_after_seconds: Option<u64>,
}

impl IndexSpec {
    pub fn expiry(&self) -> Option<Expiry> {
        self.expire_after_seconds.map(|seconds| match seconds {
            0 => Expiry::AtFieldValue,
            n => Expiry::AfterSeconds(n),
        })
    }

    pub fn is_text(&self) -> bool {
        self.keys.iter().any(|k| k.kind == IndexKind::Text)
    }

    /// Key pattern document, e.g. `{ "createdAt": -1 }`.
    pub fn key_document(&self) -> Document {
        let mut keys = Document::new();
        for key in &self.keys {
            keys.insert(key.field.clone(), key.kind.to_bson());
        }
        keys
    }

    pub fn to_model(&self) -> IndexModel {
        let options = IndexOptions::builder()
            .unique(self.unique.then_some(true))
            .name(self.name.clone())
            .expire_after(self.expire_after_seconds.map(Duration::from_secs))
            .build();

        IndexModel::builder()
            .keys(self.key_document())
            .options(options)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn spec(yaml: &str) -> IndexSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_parse_index_keys() {
        assert_eq!(
            "sku".parse::<IndexKey>().unwrap(),
            IndexKey {
                field: "sku".to_string(),
                kind: IndexKind::Ascending
            }
        );
        assert_eq!(
            "createdAt:desc".parse::<IndexKey>().unwrap().kind,
            IndexKind::Descending
        );
        assert_eq!(
            "reviews.rating:asc".parse::<IndexKey>().unwrap().field,
            "reviews.rating"
        );
        assert_eq!("name:text".parse::<IndexKey>().unwrap().kind, IndexKind::Text);
    }

    #[test]
    fn test_parse_invalid_index_keys() {
        assert!("price:up".parse::<IndexKey>().is_err());
        assert!(":desc".parse::<IndexKey>().is_err());
        assert!(serde_yaml::from_str::<IndexSpec>("keys: [\"a:sideways\"]").is_err());
    }

    #[test]
    fn test_compound_text_key_document_keeps_order() {
        let index = spec("keys: [\"name:text\", \"description:text\", \"tags:text\"]");
        assert!(index.is_text());
        assert_eq!(
            index.key_document(),
            doc! { "name": "text", "description": "text", "tags": "text" }
        );
    }

    #[test]
    fn test_unique_index_model() {
        let model = spec("keys: [sku]\nunique: true").to_model();
        assert_eq!(model.keys, doc! { "sku": 1 });

        let options = model.options.unwrap();
        assert_eq!(options.unique, Some(true));
        assert_eq!(options.expire_after, None);
    }

    #[test]
    fn test_ttl_relative_to_timestamp() {
        let index = spec("keys: [timestamp]\nexpire_after_seconds: 2592000");
        assert_eq!(index.expiry(), Some(Expiry::AfterSeconds(2_592_000)));

        let options = index.to_model().options.unwrap();
        assert_eq!(options.expire_after, Some(Duration::from_secs(2_592_000)));
        assert_eq!(options.unique, None);
    }

    #[test]
    fn test_zero_ttl_means_absolute_expiry() {
        let index = spec("keys: [expiresAt]\nexpire_after_seconds: 0");
        assert_eq!(index.expiry(), Some(Expiry::AtFieldValue));
        assert_eq!(
            index.to_model().options.unwrap().expire_after,
            Some(Duration::from_secs(0))
        );
    }

    #[test]
    fn test_descending_key() {
        let index = spec("keys: [\"score:desc\"]");
        assert_eq!(index.key_document(), doc! { "score": -1 });
        assert_eq!(index.expiry(), None);
    }
}
