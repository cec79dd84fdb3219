//! Interfaces at the server boundary.

pub mod document_store;

pub use document_store::{DocumentStore, Result, RoleGrant, StoreError, UserDefinition};
