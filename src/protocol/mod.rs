//! Protocol Layer
//!
//! [`Handler`] is the application facade handed to the REST layer as
//! `Extension<Arc<Handler>>`: it owns the artifact store, the session
//! registry, and the cleanup scheduler, wired from one [`Config`].

pub mod rest;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cleanup::CleanupScheduler;
use crate::config::Config;
use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::retention::RetentionPolicy;
use crate::store::{ArtifactStore, FsArtifactStore};

pub struct Handler {
    config: Config,
    store: Arc<dyn ArtifactStore>,
    registry: Arc<SessionRegistry>,
    scheduler: Arc<CleanupScheduler>,
    started_at: Instant,
}

impl Handler {
    /// Build the full application from configuration.
    ///
    /// Validates the config, opens the store, rebuilds the registry from
    /// disk, and constructs (but does not start) the scheduler.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let store: Arc<dyn ArtifactStore> =
            Arc::new(FsArtifactStore::new(config.storage.temp_dir.clone())?);
        let registry = Arc::new(SessionRegistry::new());
        let restored = registry.hydrate(store.as_ref())?;
        if restored > 0 {
            tracing::info!(restored, "sessions restored from disk");
        }

        let scheduler = Arc::new(CleanupScheduler::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            RetentionPolicy::from_secs(config.cleanup.ttl_secs),
            Duration::from_secs(config.cleanup.interval_secs),
        ));

        Ok(Self {
            config,
            store,
            registry,
            scheduler,
            started_at: Instant::now(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn ArtifactStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<CleanupScheduler> {
        &self.scheduler
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
