//! Bootstrap orchestration.
//!
//! A single forward pass over the manifest:
//! 1. every database: collections and validators, indexes, seed data
//! 2. every database: views
//! 3. the application user
//!
//! The first failure aborts the run. Nothing already written is rolled back.

pub mod access;
mod index;
mod schema;
mod seed;
mod view;

use std::path::Path;
use std::time::Duration;

use backon::Retryable;
use chrono::Utc;
use tracing::{info, warn};

use crate::config::{Config, SeedPolicy};
use crate::error::{ProvisionError, ProvisionStep};
use crate::interfaces::{DocumentStore, StoreError};
use crate::manifest::{DatabaseSpec, Manifest};
use crate::report::{BootstrapReport, CollectionReport, DatabaseReport, ViewReport};
use crate::seed::{SeedSet, SeedSource};
use crate::storage;
use crate::utils::retry::connection_backoff;

pub use access::AppCredential;

/// Store handle plus the database every step in it operates on.
pub struct DatabaseContext<'a> {
    pub store: &'a dyn DocumentStore,
    pub database: &'a DatabaseSpec,
}

impl<'a> DatabaseContext<'a> {
    pub fn new(store: &'a dyn DocumentStore, database: &'a DatabaseSpec) -> Self {
        Self { store, database }
    }

    /// `database.name` for logs and errors.
    pub fn namespace(&self, name: &str) -> String {
        format!("{}.{}", self.database.name, name)
    }

    async fn existing_names(&self) -> Result<Vec<String>, ProvisionError> {
        self.store
            .list_collections(&self.database.name)
            .await
            .map_err(ProvisionError::step(
                ProvisionStep::Collection,
                &self.database.name,
            ))
    }
}

/// Applies a manifest and its seed data to a store.
pub struct Provisioner<'a> {
    store: &'a dyn DocumentStore,
    manifest: &'a Manifest,
    seeds: &'a SeedSet,
    seed_policy: SeedPolicy,
    credential: Option<AppCredential>,
}

impl<'a> Provisioner<'a> {
    pub fn new(store: &'a dyn DocumentStore, manifest: &'a Manifest, seeds: &'a SeedSet) -> Self {
        Self {
            store,
            manifest,
            seeds,
            seed_policy: SeedPolicy::default(),
            credential: None,
        }
    }

    pub fn with_seed_policy(mut self, policy: SeedPolicy) -> Self {
        self.seed_policy = policy;
        self
    }

    /// Provision this application user after all databases.
    pub fn with_credential(mut self, credential: AppCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub async fn run(&self) -> Result<BootstrapReport, ProvisionError> {
        let mut report = BootstrapReport::default();

        for database in &self.manifest.databases {
            report.databases.push(self.provision_database(database).await?);
        }

        for (database, database_report) in self.manifest.databases.iter().zip(&mut report.databases) {
            if database.views.is_empty() {
                continue;
            }
            let ctx = DatabaseContext::new(self.store, database);
            let existing = ctx.existing_names().await?;
            for spec in &database.views {
                let outcome = view::ensure_view(&ctx, spec, &existing).await?;
                database_report.views.push(ViewReport {
                    name: spec.name.clone(),
                    outcome,
                });
            }
        }

        if let Some(credential) = &self.credential {
            let outcome = access::ensure_user(self.store, credential).await?;
            report.user = Some((credential.user.username.clone(), outcome));
        }

        Ok(report)
    }

    async fn provision_database(
        &self,
        database: &DatabaseSpec,
    ) -> Result<DatabaseReport, ProvisionError> {
        info!(database = %database.name, purpose = %database.purpose, "Provisioning database");

        let ctx = DatabaseContext::new(self.store, database);
        let existing = ctx.existing_names().await?;
        let mut collections = Vec::with_capacity(database.collections.len());

        for collection in &database.collections {
            let schema = schema::ensure_collection(&ctx, collection, &existing).await?;
            let indexes = index::ensure_indexes(&ctx, collection).await?;
            let seed = seed::load_seed(
                &ctx,
                collection,
                self.seeds.get(&database.name, &collection.name),
                self.seed_policy,
            )
            .await?;

            collections.push(CollectionReport {
                name: collection.name.clone(),
                schema,
                indexes,
                seed,
            });
        }

        Ok(DatabaseReport {
            name: database.name.clone(),
            purpose: database.purpose.clone(),
            collections,
            views: Vec::new(),
        })
    }
}

/// Ping the server until it answers, retrying with exponential backoff.
pub async fn wait_for_server<S>(store: &S, retries: usize) -> Result<(), StoreError>
where
    S: DocumentStore + ?Sized,
{
    (move || async move { store.ping().await })
        .retry(connection_backoff(retries))
        .notify(|err: &StoreError, dur: Duration| {
            warn!(error = %err, delay = ?dur, "MongoDB not reachable, retrying");
        })
        .await
}

/// Full bootstrap from configuration: load manifest and seeds, connect, provision.
pub async fn provision(config: &Config) -> Result<BootstrapReport, ProvisionError> {
    let manifest = Manifest::load(config.manifest.path.as_deref().map(Path::new))?;

    let seeds = if config.seed.policy == SeedPolicy::Skip {
        SeedSet::default()
    } else {
        let source = match &config.seed.dir {
            Some(dir) => SeedSource::Directory(Path::new(dir)),
            None => SeedSource::Embedded,
        };
        SeedSet::load(&manifest, source, Utc::now())?
    };
    if config.seed.validate {
        seeds.validate(&manifest)?;
    }
    info!(
        databases = manifest.databases.len(),
        seed_documents = seeds.total(),
        seed_policy = %config.seed.policy,
        "Manifest loaded"
    );

    let uri = config.mongodb.redacted_uri();
    let connection_error = |source| ProvisionError::Connection {
        uri: uri.clone(),
        source,
    };
    let store = storage::init_store(&config.mongodb)
        .await
        .map_err(connection_error)?;
    wait_for_server(&store, config.mongodb.connect_retries)
        .await
        .map_err(connection_error)?;
    info!(uri = %uri, "Connected to MongoDB");

    let mut provisioner =
        Provisioner::new(&store, &manifest, &seeds).with_seed_policy(config.seed.policy);
    if config.access.enabled {
        provisioner =
            provisioner.with_credential(AppCredential::from_manifest(&config.access, &manifest));
    }

    let report = provisioner.run().await?;
    report.log();
    Ok(report)
}
