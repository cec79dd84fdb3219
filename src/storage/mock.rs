//! In-memory DocumentStore for testing.
//!
//! Mirrors the server behavior the provisioner relies on: namespace
//! collisions, implicit collection creation, identical-index no-ops and
//! unique index enforcement on insert.

use std::collections::BTreeMap;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use mongodb::IndexModel;
use tokio::sync::RwLock;

use crate::interfaces::{DocumentStore, Result, StoreError, UserDefinition};

#[derive(Default)]
struct MockCollection {
    validator: Option<Document>,
    indexes: Vec<IndexModel>,
    documents: Vec<Document>,
}

struct MockView {
    source: String,
    pipeline: Vec<Document>,
}

#[derive(Default)]
struct MockDatabase {
    collections: BTreeMap<String, MockCollection>,
    views: BTreeMap<String, MockView>,
}

impl MockDatabase {
    fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name) || self.views.contains_key(name)
    }
}

/// Mock document store that keeps everything in memory.
#[derive(Default)]
pub struct MockDocumentStore {
    databases: RwLock<BTreeMap<String, MockDatabase>>,
    users: RwLock<BTreeMap<(String, String), UserDefinition>>,
    ping_failures: RwLock<usize>,
    pings: RwLock<usize>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` pings fail.
    pub async fn set_ping_failures(&self, count: usize) {
        *self.ping_failures.write().await = count;
    }

    /// Total pings received, failed or not.
    pub async fn ping_count(&self) -> usize {
        *self.pings.read().await
    }

    /// Names of databases holding at least one collection or view.
    pub async fn database_names(&self) -> Vec<String> {
        self.databases
            .read()
            .await
            .iter()
            .filter(|(_, db)| !db.collections.is_empty() || !db.views.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub async fn validator(&self, database: &str, collection: &str) -> Option<Document> {
        self.databases
            .read()
            .await
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .and_then(|c| c.validator.clone())
    }

    pub async fn indexes(&self, database: &str, collection: &str) -> Vec<IndexModel> {
        self.databases
            .read()
            .await
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    pub async fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.databases
            .read()
            .await
            .get(database)
            .and_then(|db| db.collections.get(collection))
            .map(|c| c.documents.clone())
            .unwrap_or_default()
    }

    /// Source collection and pipeline of a view.
    pub async fn view(&self, database: &str, view: &str) -> Option<(String, Vec<Document>)> {
        self.databases
            .read()
            .await
            .get(database)
            .and_then(|db| db.views.get(view))
            .map(|v| (v.source.clone(), v.pipeline.clone()))
    }

    pub async fn user(&self, auth_database: &str, username: &str) -> Option<UserDefinition> {
        self.users
            .read()
            .await
            .get(&(auth_database.to_string(), username.to_string()))
            .cloned()
    }
}

fn namespace(database: &str, collection: &str) -> String {
    format!("{}.{}", database, collection)
}

/// Index name the server derives from the key pattern, e.g. `createdAt_-1`.
pub fn index_name(model: &IndexModel) -> String {
    if let Some(name) = model.options.as_ref().and_then(|o| o.name.clone()) {
        return name;
    }

    model
        .keys
        .iter()
        .map(|(field, direction)| {
            let direction = match direction {
                Bson::Int32(n) => n.to_string(),
                Bson::Int64(n) => n.to_string(),
                Bson::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}_{}", field, direction)
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Resolve a dotted path through nested documents.
fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

fn unique_key(index: &IndexModel, document: &Document) -> Vec<Bson> {
    index
        .keys
        .keys()
        .map(|field| lookup(document, field).cloned().unwrap_or(Bson::Null))
        .collect()
}

impl MockCollection {
    fn insert(&mut self, namespace: &str, document: Document) -> Result<()> {
        for index in &self.indexes {
            let unique = index
                .options
                .as_ref()
                .and_then(|o| o.unique)
                .unwrap_or(false);
            if !unique {
                continue;
            }

            let candidate = unique_key(index, &document);
            if self
                .documents
                .iter()
                .any(|existing| unique_key(index, existing) == candidate)
            {
                return Err(StoreError::DuplicateKey {
                    namespace: namespace.to_string(),
                    index: index_name(index),
                });
            }
        }

        self.documents.push(document);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn ping(&self) -> Result<()> {
        *self.pings.write().await += 1;

        let mut failures = self.ping_failures.write().await;
        if *failures > 0 {
            *failures -= 1;
            return Err(StoreError::Unavailable("mock ping failure".to_string()));
        }
        Ok(())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let databases = self.databases.read().await;
        Ok(databases
            .get(database)
            .map(|db| {
                db.collections
                    .keys()
                    .chain(db.views.keys())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
        validator: Option<Document>,
    ) -> Result<()> {
        let mut databases = self.databases.write().await;
        let db = databases.entry(database.to_string()).or_default();
        if db.contains(collection) {
            return Err(StoreError::NamespaceExists {
                namespace: namespace(database, collection),
            });
        }

        db.collections.insert(
            collection.to_string(),
            MockCollection {
                validator,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn set_validator(
        &self,
        database: &str,
        collection: &str,
        validator: Document,
    ) -> Result<()> {
        let mut databases = self.databases.write().await;
        let target = databases
            .get_mut(database)
            .and_then(|db| db.collections.get_mut(collection))
            .ok_or_else(|| StoreError::NamespaceNotFound {
                namespace: namespace(database, collection),
            })?;

        target.validator = Some(validator);
        Ok(())
    }

    async fn create_indexes(
        &self,
        database: &str,
        collection: &str,
        indexes: Vec<IndexModel>,
    ) -> Result<Vec<String>> {
        let mut databases = self.databases.write().await;
        let target = databases
            .entry(database.to_string())
            .or_default()
            .collections
            .entry(collection.to_string())
            .or_default();

        let mut names = Vec::with_capacity(indexes.len());
        for index in indexes {
            names.push(index_name(&index));
            if !target.indexes.iter().any(|existing| existing.keys == index.keys) {
                target.indexes.push(index);
            }
        }
        Ok(names)
    }

    async fn count_documents(&self, database: &str, collection: &str) -> Result<u64> {
        Ok(self.documents(database, collection).await.len() as u64)
    }

    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<u64> {
        let ns = namespace(database, collection);
        let mut databases = self.databases.write().await;
        let target = databases
            .entry(database.to_string())
            .or_default()
            .collections
            .entry(collection.to_string())
            .or_default();

        let mut inserted = 0;
        for document in documents {
            target.insert(&ns, document)?;
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn insert_if_absent(
        &self,
        database: &str,
        collection: &str,
        key: &str,
        document: Document,
    ) -> Result<bool> {
        let ns = namespace(database, collection);
        let value = document
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::MissingKey {
                namespace: ns.clone(),
                key: key.to_string(),
            })?;

        let mut databases = self.databases.write().await;
        let target = databases
            .entry(database.to_string())
            .or_default()
            .collections
            .entry(collection.to_string())
            .or_default();

        if target.documents.iter().any(|d| d.get(key) == Some(&value)) {
            return Ok(false);
        }

        target.insert(&ns, document)?;
        Ok(true)
    }

    async fn create_view(
        &self,
        database: &str,
        view: &str,
        source: &str,
        pipeline: Vec<Document>,
    ) -> Result<()> {
        let mut databases = self.databases.write().await;
        let db = databases.entry(database.to_string()).or_default();
        if db.contains(view) {
            return Err(StoreError::NamespaceExists {
                namespace: namespace(database, view),
            });
        }

        db.views.insert(
            view.to_string(),
            MockView {
                source: source.to_string(),
                pipeline,
            },
        );
        Ok(())
    }

    async fn modify_view(
        &self,
        database: &str,
        view: &str,
        source: &str,
        pipeline: Vec<Document>,
    ) -> Result<()> {
        let mut databases = self.databases.write().await;
        let target = databases
            .get_mut(database)
            .and_then(|db| db.views.get_mut(view))
            .ok_or_else(|| StoreError::NamespaceNotFound {
                namespace: namespace(database, view),
            })?;

        target.source = source.to_string();
        target.pipeline = pipeline;
        Ok(())
    }

    async fn user_exists(&self, auth_database: &str, username: &str) -> Result<bool> {
        Ok(self.user(auth_database, username).await.is_some())
    }

    async fn create_user(&self, auth_database: &str, user: &UserDefinition) -> Result<()> {
        let mut users = self.users.write().await;
        let key = (auth_database.to_string(), user.username.clone());
        if users.contains_key(&key) {
            return Err(StoreError::UserExists {
                username: user.username.clone(),
                database: auth_database.to_string(),
            });
        }

        users.insert(key, user.clone());
        Ok(())
    }

    async fn update_user(&self, auth_database: &str, user: &UserDefinition) -> Result<()> {
        let mut users = self.users.write().await;
        let existing = users
            .get_mut(&(auth_database.to_string(), user.username.clone()))
            .ok_or_else(|| StoreError::UserNotFound {
                username: user.username.clone(),
                database: auth_database.to_string(),
            })?;

        *existing = user.clone();
        Ok(())
    }
}
