//! Document store interface.
//!
//! Every server operation the provisioner performs goes through this trait,
//! so the provisioning steps can run against MongoDB or an in-memory mock.

use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::IndexModel;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Namespace already exists: {namespace}")]
    NamespaceExists { namespace: String },

    #[error("Namespace not found: {namespace}")]
    NamespaceNotFound { namespace: String },

    #[error("Duplicate key in {namespace}: index {index}")]
    DuplicateKey { namespace: String, index: String },

    #[error("Document for {namespace} has no '{key}' field")]
    MissingKey { namespace: String, key: String },

    #[error("User {username} already exists in {database}")]
    UserExists { username: String, database: String },

    #[error("User {username} not found in {database}")]
    UserNotFound { username: String, database: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A role granted to a user on one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role: String,
    pub database: String,
}

impl RoleGrant {
    pub fn new(role: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            database: database.into(),
        }
    }
}

/// User definition passed to `create_user` / `update_user`.
#[derive(Clone)]
pub struct UserDefinition {
    pub username: String,
    pub password: String,
    pub roles: Vec<RoleGrant>,
}

impl std::fmt::Debug for UserDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDefinition")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("roles", &self.roles)
            .finish()
    }
}

/// Interface for the document database being provisioned.
///
/// Implementations:
/// - `MongoDocumentStore`: MongoDB driver
/// - `MockDocumentStore`: in-memory, for tests
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Round-trip to the server; fails if it is unreachable.
    async fn ping(&self) -> Result<()>;

    /// Names of all collections and views in a database.
    async fn list_collections(&self, database: &str) -> Result<Vec<String>>;

    /// Create a collection, optionally with a validator document.
    ///
    /// Fails with `NamespaceExists` if the name is taken.
    async fn create_collection(
        &self,
        database: &str,
        collection: &str,
        validator: Option<Document>,
    ) -> Result<()>;

    /// Replace the validator of an existing collection.
    async fn set_validator(&self, database: &str, collection: &str, validator: Document)
        -> Result<()>;

    /// Create indexes, returning their names. Re-creating an identical index is a no-op.
    async fn create_indexes(
        &self,
        database: &str,
        collection: &str,
        indexes: Vec<IndexModel>,
    ) -> Result<Vec<String>>;

    /// Number of documents in a collection.
    async fn count_documents(&self, database: &str, collection: &str) -> Result<u64>;

    /// Insert documents in order, returning how many were written.
    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<u64>;

    /// Insert `document` unless a document with the same value for `key` exists.
    ///
    /// Existing documents are never modified. Returns true if inserted.
    async fn insert_if_absent(
        &self,
        database: &str,
        collection: &str,
        key: &str,
        document: Document,
    ) -> Result<bool>;

    /// Create a read-only view over `source`.
    async fn create_view(
        &self,
        database: &str,
        view: &str,
        source: &str,
        pipeline: Vec<Document>,
    ) -> Result<()>;

    /// Redefine an existing view.
    async fn modify_view(
        &self,
        database: &str,
        view: &str,
        source: &str,
        pipeline: Vec<Document>,
    ) -> Result<()>;

    /// Whether a user exists in the given authentication database.
    async fn user_exists(&self, auth_database: &str, username: &str) -> Result<bool>;

    /// Create a user. Fails with `UserExists` if the name is taken.
    async fn create_user(&self, auth_database: &str, user: &UserDefinition) -> Result<()>;

    /// Replace the password and roles of an existing user.
    async fn update_user(&self, auth_database: &str, user: &UserDefinition) -> Result<()>;
}
