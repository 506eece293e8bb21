//! Bio Lab Store - persistence backends
//!
//! - [`PgStore`]: PostgreSQL via SQLx, with embedded migrations
//! - [`MemoryStore`]: process-local tables for tests and development
//!
//! Both implement every store trait from `biolab-core`; [`Stores`] hands the
//! same backend out behind the three trait objects the API layer consumes.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use biolab_core::{CredentialStore, DatabaseConfig, LabStore, Result, SessionStore, StorageBackend};
use std::sync::Arc;

/// One backend, three views
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub lab: Arc<dyn LabStore>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: CredentialStore + SessionStore + LabStore + 'static,
    {
        Self {
            credentials: backend.clone(),
            sessions: backend.clone(),
            lab: backend,
        }
    }

    pub fn memory() -> Self {
        Self::from_backend(Arc::new(MemoryStore::new()))
    }

    /// Open the configured backend, running migrations for PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Postgres => {
                let store = PgStore::connect(config).await?;
                store.migrate().await?;
                tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
                Ok(Self::from_backend(Arc::new(store)))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Ok(Self::memory())
            }
        }
    }
}
