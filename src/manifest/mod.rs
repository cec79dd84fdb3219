//! Bootstrap manifest.
//!
//! The manifest declares every database, collection, validator, index, seed
//! file and view the provisioner creates. It is plain data: the provisioning
//! routines are generic over it.

pub mod index;
pub mod schema;
pub mod view;

use std::collections::HashSet;
use std::path::Path;

use mongodb::bson::Document;
use serde::Deserialize;

use crate::seed::convert::ConvertError;

pub use index::{Expiry, IndexKey, IndexKind, IndexSpec};
pub use schema::{BsonType, FieldSchema, Violation};
pub use view::ViewSpec;

/// Manifest compiled into the binary.
pub const DEFAULT_MANIFEST: &str = include_str!("../../manifest/bootstrap.yaml");

/// Errors loading or validating a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Manifest declares no databases")]
    Empty,

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Duplicate database: {0}")]
    DuplicateDatabase(String),

    #[error("Duplicate collection or view {name} in {database}")]
    DuplicateCollection { database: String, name: String },

    #[error("Index #{position} on {database}.{collection} has no keys")]
    EmptyIndex {
        database: String,
        collection: String,
        position: usize,
    },

    #[error("TTL index #{position} on {database}.{collection} must have a single non-text key")]
    InvalidTtl {
        database: String,
        collection: String,
        position: usize,
    },

    #[error("TTL index #{position} on {database}.{collection} expires after {seconds}s, above the int32 limit")]
    TtlOutOfRange {
        database: String,
        collection: String,
        position: usize,
        seconds: u64,
    },

    #[error("{database}.{collection} declares more than one text index")]
    MultipleTextIndexes { database: String, collection: String },

    #[error("View {database}.{view} reads from unknown collection {view_on}")]
    UnknownViewSource {
        database: String,
        view: String,
        view_on: String,
    },

    #[error("View {database}.{view} has an invalid pipeline: {source}")]
    InvalidPipeline {
        database: String,
        view: String,
        #[source]
        source: ConvertError,
    },
}

/// Role the application user receives on a database.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    ReadWrite,
    Read,
    /// No grant at all.
    None,
}

impl AccessLevel {
    /// Built-in role name, if any.
    pub fn role(&self) -> Option<&'static str> {
        match self {
            AccessLevel::ReadWrite => Some("readWrite"),
            AccessLevel::Read => Some("read"),
            AccessLevel::None => None,
        }
    }
}

/// Seed file reference.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedSpec {
    /// Path relative to the seed directory, e.g. `catalog_db/products.json`.
    pub file: String,
    /// Natural key identifying a seed document across runs.
    #[serde(default)]
    pub key: Option<String>,
}

/// Collection declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionSpec {
    pub name: String,
    #[serde(default)]
    pub validator: Option<FieldSchema>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    #[serde(default)]
    pub seed: Option<SeedSpec>,
}

impl CollectionSpec {
    pub fn validator_document(&self) -> Option<Document> {
        self.validator.as_ref().map(FieldSchema::validator)
    }
}

/// Database declaration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSpec {
    pub name: String,
    /// One-line description shown in the bootstrap summary.
    pub purpose: String,
    #[serde(default)]
    pub access: AccessLevel,
    #[serde(default)]
    pub collections: Vec<CollectionSpec>,
    #[serde(default)]
    pub views: Vec<ViewSpec>,
}

impl DatabaseSpec {
    pub fn collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }
}

/// The full manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub databases: Vec<DatabaseSpec>,
}

impl Manifest {
    /// Parse and validate YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// The manifest compiled into the binary.
    pub fn embedded() -> Result<Self, ManifestError> {
        Self::from_yaml(DEFAULT_MANIFEST)
    }

    /// Load from `path`, or the embedded manifest when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ManifestError> {
        match path {
            Some(path) => {
                let yaml = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_yaml(&yaml)
            }
            None => Self::embedded(),
        }
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseSpec> {
        self.databases.iter().find(|d| d.name == name)
    }

    /// Every collection paired with its database, in declaration order.
    pub fn collections(&self) -> impl Iterator<Item = (&DatabaseSpec, &CollectionSpec)> {
        self.databases
            .iter()
            .flat_map(|db| db.collections.iter().map(move |c| (db, c)))
    }

    /// Structural checks the server would otherwise reject halfway through a run.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.databases.is_empty() {
            return Err(ManifestError::Empty);
        }

        let mut databases = HashSet::new();
        for db in &self.databases {
            validate_database_name(&db.name)?;
            if !databases.insert(db.name.as_str()) {
                return Err(ManifestError::DuplicateDatabase(db.name.clone()));
            }

            let mut names = HashSet::new();
            for collection in &db.collections {
                validate_collection_name(&collection.name)?;
                if !names.insert(collection.name.as_str()) {
                    return Err(ManifestError::DuplicateCollection {
                        database: db.name.clone(),
                        name: collection.name.clone(),
                    });
                }
                validate_indexes(&db.name, collection)?;
            }

            for view in &db.views {
                validate_collection_name(&view.name)?;
                if !names.insert(view.name.as_str()) {
                    return Err(ManifestError::DuplicateCollection {
                        database: db.name.clone(),
                        name: view.name.clone(),
                    });
                }
                if db.collection(&view.source).is_none() {
                    return Err(ManifestError::UnknownViewSource {
                        database: db.name.clone(),
                        view: view.name.clone(),
                        view_on: view.source.clone(),
                    });
                }
                view.pipeline_documents()
                    .map_err(|source| ManifestError::InvalidPipeline {
                        database: db.name.clone(),
                        view: view.name.clone(),
                        source,
                    })?;
            }
        }

        Ok(())
    }
}

fn validate_database_name(name: &str) -> Result<(), ManifestError> {
    let reason = if name.is_empty() {
        Some("database name is empty")
    } else if name.len() > 63 {
        Some("database name is longer than 63 bytes")
    } else if name.contains(['/', '\\', '.', ' ', '"', '$']) {
        Some("database name contains a forbidden character")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ManifestError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

fn validate_collection_name(name: &str) -> Result<(), ManifestError> {
    let reason = if name.is_empty() {
        Some("collection name is empty")
    } else if name.contains('$') {
        Some("collection name contains '$'")
    } else if name.starts_with("system.") {
        Some("collection name uses the reserved system. prefix")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ManifestError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Largest `expireAfterSeconds` the server accepts.
const MAX_TTL_SECONDS: u64 = i32::MAX as u64;

fn validate_indexes(database: &str, collection: &CollectionSpec) -> Result<(), ManifestError> {
    let mut text_indexes = 0;

    for (position, index) in collection.indexes.iter().enumerate() {
        if index.keys.is_empty() {
            return Err(ManifestError::EmptyIndex {
                database: database.to_string(),
                collection: collection.name.clone(),
                position,
            });
        }
        if index.expiry().is_some() && (index.keys.len() != 1 || index.is_text()) {
            return Err(ManifestError::InvalidTtl {
                database: database.to_string(),
                collection: collection.name.clone(),
                position,
            });
        }
        if let Some(seconds) = index.expire_after_seconds.filter(|s| *s > MAX_TTL_SECONDS) {
            return Err(ManifestError::TtlOutOfRange {
                database: database.to_string(),
                collection: collection.name.clone(),
                position,
                seconds,
            });
        }
        if index.is_text() {
            text_indexes += 1;
        }
    }

    if text_indexes > 1 {
        return Err(ManifestError::MultipleTextIndexes {
            database: database.to_string(),
            collection: collection.name.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn embedded() -> Manifest {
        Manifest::embedded().unwrap()
    }

    fn ttl_of(manifest: &Manifest, database: &str, collection: &str) -> Vec<Expiry> {
        manifest
            .database(database)
            .unwrap()
            .collection(collection)
            .unwrap()
            .indexes
            .iter()
            .filter_map(IndexSpec::expiry)
            .collect()
    }

    #[test]
    fn test_embedded_manifest_declares_six_databases() {
        let manifest = embedded();
        let names: Vec<&str> = manifest
            .databases
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["catalog_db", "content_db", "logs_db", "sessions_db", "search_db", "config_db"]
        );
    }

    #[test]
    fn test_embedded_manifest_collections() {
        let manifest = embedded();
        let collections: Vec<String> = manifest
            .collections()
            .map(|(db, c)| format!("{}.{}", db.name, c.name))
            .collect();
        assert_eq!(
            collections,
            vec![
                "catalog_db.products",
                "content_db.articles",
                "content_db.comments",
                "logs_db.application_logs",
                "logs_db.audit_logs",
                "sessions_db.sessions",
                "sessions_db.cache",
                "search_db.search_history",
                "search_db.trending_searches",
                "search_db.recommendations",
                "config_db.settings",
            ]
        );
    }

    #[test]
    fn test_only_products_and_articles_have_validators() {
        let manifest = embedded();
        let validated: Vec<&str> = manifest
            .collections()
            .filter(|(_, c)| c.validator.is_some())
            .map(|(_, c)| c.name.as_str())
            .collect();
        assert_eq!(validated, vec!["products", "articles"]);
    }

    #[test]
    fn test_unique_keys() {
        let manifest = embedded();
        let mut unique: Vec<String> = manifest
            .collections()
            .flat_map(|(_, c)| {
                c.indexes
                    .iter()
                    .filter(|i| i.unique)
                    .map(move |i| format!("{}.{}", c.name, i.keys[0].field))
            })
            .collect();
        unique.sort();
        assert_eq!(
            unique,
            vec!["articles.slug", "cache.key", "products.sku", "sessions.sessionId", "settings.key"]
        );
    }

    #[test]
    fn test_ttl_indexes() {
        let manifest = embedded();
        assert_eq!(
            ttl_of(&manifest, "logs_db", "application_logs"),
            vec![Expiry::AfterSeconds(30 * 24 * 3600)]
        );
        assert!(ttl_of(&manifest, "logs_db", "audit_logs").is_empty());
        assert_eq!(
            ttl_of(&manifest, "sessions_db", "sessions"),
            vec![Expiry::AfterSeconds(24 * 3600)]
        );
        assert_eq!(
            ttl_of(&manifest, "sessions_db", "cache"),
            vec![Expiry::AtFieldValue]
        );
        assert_eq!(
            ttl_of(&manifest, "search_db", "search_history"),
            vec![Expiry::AfterSeconds(90 * 24 * 3600)]
        );
    }

    #[test]
    fn test_access_levels() {
        let manifest = embedded();
        for db in &manifest.databases {
            let expected = if db.name == "config_db" {
                AccessLevel::Read
            } else {
                AccessLevel::ReadWrite
            };
            assert_eq!(db.access, expected, "{}", db.name);
        }
    }

    #[test]
    fn test_popular_products_pipeline() {
        let manifest = embedded();
        let catalog = manifest.database("catalog_db").unwrap();
        assert_eq!(catalog.views.len(), 1);

        let view = &catalog.views[0];
        assert_eq!(view.name, "popular_products");
        assert_eq!(view.source, "products");

        let stages = view.pipeline_documents().unwrap();
        assert_eq!(stages[0], doc! { "$match": { "isActive": true } });

        let project = stages[1].get_document("$project").unwrap();
        assert_eq!(
            project.get_document("averageRating").unwrap(),
            &doc! { "$avg": "$reviews.rating" }
        );
        assert_eq!(
            project.get_document("reviewCount").unwrap(),
            &doc! { "$size": { "$ifNull": ["$reviews", []] } }
        );

        assert_eq!(
            stages[2],
            doc! { "$sort": { "reviewCount": -1, "averageRating": -1 } }
        );
        let sort_keys: Vec<&str> = stages[2]
            .get_document("$sort")
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(sort_keys, vec!["reviewCount", "averageRating"]);
    }

    #[test]
    fn test_rejects_duplicate_database() {
        let yaml = r#"
databases:
  - { name: a, purpose: x }
  - { name: a, purpose: y }
"#;
        assert!(matches!(
            Manifest::from_yaml(yaml),
            Err(ManifestError::DuplicateDatabase(name)) if name == "a"
        ));
    }

    #[test]
    fn test_rejects_view_clashing_with_collection() {
        let yaml = r#"
databases:
  - name: a
    purpose: x
    collections:
      - name: items
    views:
      - { name: items, source: items, pipeline: [] }
"#;
        assert!(matches!(
            Manifest::from_yaml(yaml),
            Err(ManifestError::DuplicateCollection { .. })
        ));
    }

    #[test]
    fn test_rejects_compound_ttl_index() {
        let yaml = r#"
databases:
  - name: a
    purpose: x
    collections:
      - name: items
        indexes:
          - keys: [a, b]
            expire_after_seconds: 60
"#;
        assert!(matches!(
            Manifest::from_yaml(yaml),
            Err(ManifestError::InvalidTtl { position: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_ttl_beyond_int32() {
        let yaml = r#"
databases:
  - name: a
    purpose: x
    collections:
      - name: items
        indexes:
          - keys: [createdAt]
          - keys: [expiresAt]
            expire_after_seconds: 3000000000
"#;
        assert!(matches!(
            Manifest::from_yaml(yaml),
            Err(ManifestError::TtlOutOfRange {
                position: 1,
                seconds: 3_000_000_000,
                ..
            })
        ));

        let at_limit = yaml.replace("3000000000", "2147483647");
        assert!(Manifest::from_yaml(&at_limit).is_ok());
    }

    #[test]
    fn test_rejects_two_text_indexes() {
        let yaml = r#"
databases:
  - name: a
    purpose: x
    collections:
      - name: items
        indexes:
          - keys: ["title:text"]
          - keys: ["body:text"]
"#;
        assert!(matches!(
            Manifest::from_yaml(yaml),
            Err(ManifestError::MultipleTextIndexes { .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_view_source() {
        let yaml = r#"
databases:
  - name: a
    purpose: x
    views:
      - { name: v, source: missing, pipeline: [] }
"#;
        assert!(matches!(
            Manifest::from_yaml(yaml),
            Err(ManifestError::UnknownViewSource { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_names() {
        let yaml = "databases:\n  - { name: \"bad.name\", purpose: x }\n";
        assert!(matches!(
            Manifest::from_yaml(yaml),
            Err(ManifestError::InvalidName { .. })
        ));

        let yaml = "databases:\n  - name: ok\n    purpose: x\n    collections:\n      - name: system.users\n";
        assert!(matches!(
            Manifest::from_yaml(yaml),
            Err(ManifestError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_manifest_and_unknown_fields() {
        assert!(matches!(
            Manifest::from_yaml("databases: []"),
            Err(ManifestError::Empty)
        ));
        assert!(matches!(
            Manifest::from_yaml("databases:\n  - { name: a, purpose: x, shards: 3 }\n"),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        std::fs::write(&path, "databases:\n  - { name: only_db, purpose: Testing }\n").unwrap();

        let manifest = Manifest::load(Some(&path)).unwrap();
        assert_eq!(manifest.databases.len(), 1);
        assert_eq!(manifest.databases[0].access, AccessLevel::ReadWrite);

        let err = Manifest::load(Some(&dir.path().join("missing.yaml"))).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
