//! MongoDB implementation of the document store.

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, CreateCollectionOptions, UpdateOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::debug;

use crate::config::MongodbConfig;
use crate::interfaces::{DocumentStore, Result, StoreError, UserDefinition};

/// Server error code for `NamespaceExists`.
const NAMESPACE_EXISTS: i32 = 48;
/// Server error code for `NamespaceNotFound`.
const NAMESPACE_NOT_FOUND: i32 = 26;
/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;
/// Server error code returned by `createUser` for a taken name.
const USER_EXISTS: i32 = 51003;
/// Server error code returned by `updateUser` for an unknown name.
const USER_NOT_FOUND: i32 = 11;

/// MongoDB implementation of DocumentStore.
#[derive(Clone)]
pub struct MongoDocumentStore {
    client: Client,
}

impl MongoDocumentStore {
    /// Build a client from configuration.
    ///
    /// The driver connects lazily; call `ping` to verify the server is reachable.
    pub async fn connect(config: &MongodbConfig) -> Result<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some(config.app_name.clone());
        let client = Client::with_options(options)?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// The underlying driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn collection(&self, database: &str, collection: &str) -> Collection<Document> {
        self.client.database(database).collection(collection)
    }

    async fn run(&self, database: &str, command: Document) -> Result<Document> {
        Ok(self.client.database(database).run_command(command).await?)
    }
}

fn namespace(database: &str, collection: &str) -> String {
    format!("{}.{}", database, collection)
}

fn command_code(err: &mongodb::error::Error) -> Option<i32> {
    match &*err.kind {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

/// Name of the violated unique index if `err` is a duplicate key error.
fn duplicate_key_index(err: &mongodb::error::Error) -> Option<String> {
    let message = match &*err.kind {
        ErrorKind::InsertMany(failure) => failure
            .write_errors
            .as_ref()?
            .iter()
            .find(|e| e.code == DUPLICATE_KEY)?
            .message
            .clone(),
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY => {
            e.message.clone()
        }
        _ => return None,
    };

    // "E11000 duplicate key error collection: db.coll index: sku_1 dup key: { ... }"
    let index = message
        .split_once(" index: ")
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .unwrap_or("unknown");
    Some(index.to_string())
}

fn map_write_error(err: mongodb::error::Error, database: &str, collection: &str) -> StoreError {
    match duplicate_key_index(&err) {
        Some(index) => StoreError::DuplicateKey {
            namespace: namespace(database, collection),
            index,
        },
        None => StoreError::Mongo(err),
    }
}

fn role_documents(user: &UserDefinition) -> Vec<Bson> {
    user.roles
        .iter()
        .map(|grant| Bson::Document(doc! { "role": &grant.role, "db": &grant.database }))
        .collect()
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn ping(&self) -> Result<()> {
        self.run("admin", doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        Ok(self.client.database(database).list_collection_names().await?)
    }

    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
        validator: Option<Document>,
    ) -> Result<()> {
        let options = CreateCollectionOptions::builder().validator(validator).build();

        self.client
            .database(database)
            .create_collection(collection)
            .with_options(options)
            .await
            .map_err(|e| match command_code(&e) {
                Some(NAMESPACE_EXISTS) => StoreError::NamespaceExists {
                    namespace: namespace(database, collection),
                },
                _ => StoreError::Mongo(e),
            })
    }

    async fn set_validator(
        &self,
        database: &str,
        collection: &str,
        validator: Document,
    ) -> Result<()> {
        let command = doc! {
            "collMod": collection,
            "validator": validator,
            "validationLevel": "strict",
            "validationAction": "error",
        };

        self.run(database, command).await.map_err(|e| match e {
            StoreError::Mongo(err) if command_code(&err) == Some(NAMESPACE_NOT_FOUND) => {
                StoreError::NamespaceNotFound {
                    namespace: namespace(database, collection),
                }
            }
            other => other,
        })?;

        Ok(())
    }

    async fn create_indexes(
        &self,
        database: &str,
        collection: &str,
        indexes: Vec<IndexModel>,
    ) -> Result<Vec<String>> {
        if indexes.is_empty() {
            return Ok(Vec::new());
        }

        let result = self
            .collection(database, collection)
            .create_indexes(indexes)
            .await?;

        Ok(result.index_names)
    }

    async fn count_documents(&self, database: &str, collection: &str) -> Result<u64> {
        Ok(self
            .collection(database, collection)
            .count_documents(doc! {})
            .await?)
    }

    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<u64> {
        // The server rejects an empty batch
        if documents.is_empty() {
            return Ok(0);
        }

        let result = self
            .collection(database, collection)
            .insert_many(documents)
            .await
            .map_err(|e| map_write_error(e, database, collection))?;

        Ok(result.inserted_ids.len() as u64)
    }

    async fn insert_if_absent(
        &self,
        database: &str,
        collection: &str,
        key: &str,
        mut document: Document,
    ) -> Result<bool> {
        let value = document
            .remove(key)
            .ok_or_else(|| StoreError::MissingKey {
                namespace: namespace(database, collection),
                key: key.to_string(),
            })?;

        let filter = doc! { key: value.clone() };
        // $setOnInsert must not be empty; the filter field is copied into new documents anyway
        if document.is_empty() {
            document.insert(key, value);
        }
        let update = doc! { "$setOnInsert": document };
        let options = UpdateOptions::builder().upsert(true).build();

        let result = self
            .collection(database, collection)
            .update_one(filter, update)
            .with_options(options)
            .await
            .map_err(|e| map_write_error(e, database, collection))?;

        debug!(
            namespace = %namespace(database, collection),
            matched = result.matched_count,
            upserted = result.upserted_id.is_some(),
            "Seed upsert"
        );

        Ok(result.upserted_id.is_some())
    }

    async fn create_view(
        &self,
        database: &str,
        view: &str,
        source: &str,
        pipeline: Vec<Document>,
    ) -> Result<()> {
        let options = CreateCollectionOptions::builder()
            .view_on(source.to_string())
            .pipeline(pipeline)
            .build();

        self.client
            .database(database)
            .create_collection(view)
            .with_options(options)
            .await
            .map_err(|e| match command_code(&e) {
                Some(NAMESPACE_EXISTS) => StoreError::NamespaceExists {
                    namespace: namespace(database, view),
                },
                _ => StoreError::Mongo(e),
            })
    }

    async fn modify_view(
        &self,
        database: &str,
        view: &str,
        source: &str,
        pipeline: Vec<Document>,
    ) -> Result<()> {
        let command = doc! {
            "collMod": view,
            "viewOn": source,
            "pipeline": pipeline,
        };

        self.run(database, command).await?;
        Ok(())
    }

    async fn user_exists(&self, auth_database: &str, username: &str) -> Result<bool> {
        let response = self.run(auth_database, doc! { "usersInfo": username }).await?;

        Ok(response
            .get_array("users")
            .map(|users| !users.is_empty())
            .unwrap_or(false))
    }

    async fn create_user(&self, auth_database: &str, user: &UserDefinition) -> Result<()> {
        let command = doc! {
            "createUser": &user.username,
            "pwd": &user.password,
            "roles": role_documents(user),
        };

        self.run(auth_database, command).await.map_err(|e| match e {
            StoreError::Mongo(err) if command_code(&err) == Some(USER_EXISTS) => {
                StoreError::UserExists {
                    username: user.username.clone(),
                    database: auth_database.to_string(),
                }
            }
            other => other,
        })?;

        Ok(())
    }

    async fn update_user(&self, auth_database: &str, user: &UserDefinition) -> Result<()> {
        let command = doc! {
            "updateUser": &user.username,
            "pwd": &user.password,
            "roles": role_documents(user),
        };

        self.run(auth_database, command).await.map_err(|e| match e {
            StoreError::Mongo(err) if command_code(&err) == Some(USER_NOT_FOUND) => {
                StoreError::UserNotFound {
                    username: user.username.clone(),
                    database: auth_database.to_string(),
                }
            }
            other => other,
        })?;

        Ok(())
    }
}
