//! Connection state shared by every operation of the client.
//!
//! A [`Session`] is built once at startup and handed to whoever needs the
//! service. It holds at most one live handle.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    EngineError, ResultEngine,
    service::{Connector, ExpenseService},
    settings::{ConfigStore, ConnectionConfig},
};

pub struct Session {
    store: ConfigStore,
    connector: Arc<dyn Connector>,
    handle: RwLock<Handle>,
}

/// The live service plus the attempt counter that guards it.
#[derive(Default)]
struct Handle {
    /// Bumped by every reconfiguration. An attempt started under an older
    /// generation may not install its service.
    generation: u64,
    service: Option<Arc<dyn ExpenseService>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Return a builder for `Session`.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Connects with the stored configuration.
    ///
    /// `Ok(false)` means nothing is configured yet; an error means the
    /// configuration exists but the service could not be reached. No lock is
    /// held while the connector runs.
    pub async fn init(&self) -> ResultEngine<bool> {
        let generation = self.handle.read().await.generation;
        let Some(config) = self.store.connection().await? else {
            tracing::info!("no connection settings stored");
            return Ok(false);
        };
        self.attempt(generation, &config).await
    }

    /// Whether a live handle is available. Never fails and never waits for a
    /// connection attempt.
    pub async fn is_ready(&self) -> bool {
        self.handle.read().await.service.is_some()
    }

    pub async fn service(&self) -> ResultEngine<Arc<dyn ExpenseService>> {
        self.handle
            .read()
            .await
            .service
            .clone()
            .ok_or(EngineError::NotConnected)
    }

    /// Persists `config` and connects again with it.
    ///
    /// The previous handle is dropped first, and any attempt still running
    /// from before this call is discarded when it completes.
    pub async fn reconfigure(&self, config: &ConnectionConfig) -> ResultEngine<bool> {
        let generation = {
            let mut handle = self.handle.write().await;
            handle.generation += 1;
            handle.service = None;
            handle.generation
        };
        self.store.save(&config.to_entries()).await?;
        tracing::info!(host = %config.host, "connection settings updated");
        self.attempt(generation, config).await
    }

    async fn attempt(&self, generation: u64, config: &ConnectionConfig) -> ResultEngine<bool> {
        let service = match self.connector.connect(config).await {
            Ok(service) => service,
            Err(err) => {
                tracing::warn!(host = %config.host, "connection failed: {err}");
                return Err(err.into_connection());
            }
        };

        let mut handle = self.handle.write().await;
        if handle.generation != generation {
            tracing::debug!(host = %config.host, "stale connection discarded");
            return Ok(handle.service.is_some());
        }
        handle.service = Some(service);
        tracing::info!(host = %config.host, port = config.port, "connected");
        Ok(true)
    }
}

#[derive(Default)]
pub struct SessionBuilder {
    store: Option<ConfigStore>,
    connector: Option<Arc<dyn Connector>>,
}

impl SessionBuilder {
    /// Where connection settings are read from and written to.
    pub fn store(mut self, store: ConfigStore) -> SessionBuilder {
        self.store = Some(store);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> SessionBuilder {
        self.connector = Some(connector);
        self
    }

    /// Build the session. No connection is attempted here.
    pub fn build(self) -> ResultEngine<Session> {
        let store = self
            .store
            .ok_or_else(|| EngineError::Validation("missing settings store".to_string()))?;
        let connector = self
            .connector
            .ok_or_else(|| EngineError::Validation("missing connector".to_string()))?;

        Ok(Session {
            store,
            connector,
            handle: RwLock::new(Handle::default()),
        })
    }
}
