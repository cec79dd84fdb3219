//! Provisioning report and summary banner.

use std::fmt;

use tracing::info;

const RULE: &str = "========================================";

/// What happened to a collection's definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaOutcome {
    Created,
    /// Collection already existed; its validator was replaced.
    ValidatorUpdated,
    Unchanged,
}

/// Seed documents written versus already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    pub inserted: u64,
    pub existing: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    Created,
    Redefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserOutcome {
    Created,
    Updated,
    /// User existed and updates were disabled.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionReport {
    pub name: String,
    pub schema: SchemaOutcome,
    pub indexes: Vec<String>,
    pub seed: SeedOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewReport {
    pub name: String,
    pub outcome: ViewOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseReport {
    pub name: String,
    pub purpose: String,
    pub collections: Vec<CollectionReport>,
    pub views: Vec<ViewReport>,
}

impl DatabaseReport {
    pub fn collection(&self, name: &str) -> Option<&CollectionReport> {
        self.collections.iter().find(|c| c.name == name)
    }
}

/// Result of a complete bootstrap run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub databases: Vec<DatabaseReport>,
    pub user: Option<(String, UserOutcome)>,
}

impl BootstrapReport {
    pub fn database(&self, name: &str) -> Option<&DatabaseReport> {
        self.databases.iter().find(|d| d.name == name)
    }

    pub fn documents_inserted(&self) -> u64 {
        self.databases
            .iter()
            .flat_map(|d| &d.collections)
            .map(|c| c.seed.inserted)
            .sum()
    }

    pub fn indexes_ensured(&self) -> usize {
        self.databases
            .iter()
            .flat_map(|d| &d.collections)
            .map(|c| c.indexes.len())
            .sum()
    }

    /// Banner lines printed at the end of a successful run.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            RULE.to_string(),
            "MongoDB initialized successfully".to_string(),
            "Databases provisioned:".to_string(),
        ];
        lines.extend(
            self.databases
                .iter()
                .map(|db| format!("  - {}: {}", db.name, db.purpose)),
        );
        lines.push(RULE.to_string());
        lines
    }

    /// Log per-collection detail at debug level and totals at info.
    pub fn log(&self) {
        for db in &self.databases {
            for collection in &db.collections {
                tracing::debug!(
                    database = %db.name,
                    collection = %collection.name,
                    schema = ?collection.schema,
                    indexes = collection.indexes.len(),
                    inserted = collection.seed.inserted,
                    existing = collection.seed.existing,
                    "Collection provisioned"
                );
            }
        }

        info!(
            databases = self.databases.len(),
            indexes = self.indexes_ensured(),
            documents_inserted = self.documents_inserted(),
            "Bootstrap complete"
        );
        if let Some((username, outcome)) = &self.user {
            info!(username = %username, outcome = ?outcome, "Application user provisioned");
        }
    }
}

impl fmt::Display for BootstrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.summary_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
