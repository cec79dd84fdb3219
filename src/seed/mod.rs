//! Seed data.
//!
//! Seed files are JSON arrays of documents, one file per seeded collection,
//! referenced from the manifest. The stock files are compiled into the binary;
//! a seed directory can replace them at runtime.

pub mod convert;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use mongodb::bson::Document;
use serde_json::Value;
use tracing::debug;

use crate::manifest::{Manifest, Violation};

use convert::ConvertError;

/// Seed files compiled into the binary, keyed by manifest path.
pub const EMBEDDED_SEEDS: &[(&str, &str)] = &[
    (
        "catalog_db/products.json",
        include_str!("../../seed/catalog_db/products.json"),
    ),
    (
        "content_db/articles.json",
        include_str!("../../seed/content_db/articles.json"),
    ),
    (
        "logs_db/application_logs.json",
        include_str!("../../seed/logs_db/application_logs.json"),
    ),
    (
        "logs_db/audit_logs.json",
        include_str!("../../seed/logs_db/audit_logs.json"),
    ),
    (
        "search_db/trending_searches.json",
        include_str!("../../seed/search_db/trending_searches.json"),
    ),
    (
        "config_db/settings.json",
        include_str!("../../seed/config_db/settings.json"),
    ),
];

/// Where seed files are read from.
#[derive(Debug, Clone, Copy)]
pub enum SeedSource<'a> {
    Embedded,
    Directory(&'a Path),
}

/// Errors loading or validating seed data.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("Seed file not found: {0}")]
    NotFound(String),

    #[error("Failed to read seed file {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse seed file {file}: {source}")]
    Json {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Seed file {0} must contain a JSON array of documents")]
    NotAnArray(String),

    #[error("Seed file {file}, document #{index}: {source}")]
    Convert {
        file: String,
        index: usize,
        #[source]
        source: ConvertError,
    },

    #[error("Seed file {file}, document #{index} has no '{key}' field")]
    MissingKey {
        file: String,
        index: usize,
        key: String,
    },

    #[error(
        "Seed file {file}, document #{index} fails the {database}.{collection} validator: {}",
        format_violations(.violations)
    )]
    Invalid {
        file: String,
        index: usize,
        database: String,
        collection: String,
        violations: Vec<Violation>,
    },
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Seed documents for every seeded collection, keyed by `database.collection`.
#[derive(Debug, Clone, Default)]
pub struct SeedSet {
    documents: BTreeMap<String, Vec<Document>>,
}

impl SeedSet {
    /// Load and convert the seed file of every collection that declares one.
    ///
    /// `$now` markers resolve against `now`, so one run stamps every document
    /// with the same bootstrap time.
    pub fn load(
        manifest: &Manifest,
        source: SeedSource<'_>,
        now: DateTime<Utc>,
    ) -> Result<Self, SeedError> {
        let mut documents = BTreeMap::new();

        for (db, collection) in manifest.collections() {
            let Some(seed) = &collection.seed else {
                continue;
            };

            let text = read_seed(source, &seed.file)?;
            let value: Value = serde_json::from_str(&text).map_err(|source| SeedError::Json {
                file: seed.file.clone(),
                source,
            })?;
            let Value::Array(items) = value else {
                return Err(SeedError::NotAnArray(seed.file.clone()));
            };

            let mut converted = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let document =
                    convert::to_document(item, now).map_err(|source| SeedError::Convert {
                        file: seed.file.clone(),
                        index,
                        source,
                    })?;

                if let Some(key) = &seed.key {
                    if !document.contains_key(key) {
                        return Err(SeedError::MissingKey {
                            file: seed.file.clone(),
                            index,
                            key: key.clone(),
                        });
                    }
                }
                converted.push(document);
            }

            debug!(
                file = %seed.file,
                documents = converted.len(),
                "Loaded seed file"
            );
            documents.insert(namespace(&db.name, &collection.name), converted);
        }

        Ok(Self { documents })
    }

    /// Check every seed document against its collection's validator.
    ///
    /// Catches bad seed data before anything is written to the server.
    pub fn validate(&self, manifest: &Manifest) -> Result<(), SeedError> {
        for (db, collection) in manifest.collections() {
            let (Some(schema), Some(seed)) = (&collection.validator, &collection.seed) else {
                continue;
            };

            for (index, document) in self.get(&db.name, &collection.name).iter().enumerate() {
                let violations = schema.check_document(document);
                if !violations.is_empty() {
                    return Err(SeedError::Invalid {
                        file: seed.file.clone(),
                        index,
                        database: db.name.clone(),
                        collection: collection.name.clone(),
                        violations,
                    });
                }
            }
        }
        Ok(())
    }

    /// Seed documents for one collection; empty if it has none.
    pub fn get(&self, database: &str, collection: &str) -> &[Document] {
        self.documents
            .get(&namespace(database, collection))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of seed documents.
    pub fn total(&self) -> usize {
        self.documents.values().map(Vec::len).sum()
    }
}

fn namespace(database: &str, collection: &str) -> String {
    format!("{}.{}", database, collection)
}

fn read_seed(source: SeedSource<'_>, file: &str) -> Result<String, SeedError> {
    match source {
        SeedSource::Embedded => EMBEDDED_SEEDS
            .iter()
            .find(|(name, _)| *name == file)
            .map(|(_, text)| (*text).to_string())
            .ok_or_else(|| SeedError::NotFound(file.to_string())),
        SeedSource::Directory(dir) => {
            let path = dir.join(file);
            if !path.is_file() {
                return Err(SeedError::NotFound(path.display().to_string()));
            }
            std::fs::read_to_string(&path).map_err(|source| SeedError::Io {
                file: path.display().to_string(),
                source,
            })
        }
    }
}
