//! Client wiring: one session store, one HTTP client, one lifecycle.
//!
//! SYSTEM CONTEXT
//! ==============
//! `App::bootstrap` is the startup path. It rehydrates the session from
//! durable storage, builds the transport and HTTP client from `ClientConfig`,
//! and registers the lifecycle as the client's 401 handler. Views and the
//! CLI get everything else through the accessors.

#[cfg(test)]
#[path = "app_test.rs"]
mod tests;

use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::config::ClientConfig;
use crate::hr::HrApi;
use crate::lifecycle::AuthLifecycle;
use crate::navigation::{self, Navigator};
use crate::routes::{GuardDecision, Route};
use crate::session::SessionStore;
use crate::storage::{DurableStorage, FileStorage, MemoryStorage, StorageError};
use crate::transport;

#[derive(Clone)]
pub struct App {
    session: SessionStore,
    api: ApiClient,
    lifecycle: AuthLifecycle,
    hr: HrApi,
    navigator: Arc<dyn Navigator>,
}

impl App {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn bootstrap(
        config: &ClientConfig,
        storage: Arc<dyn DurableStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let session = SessionStore::rehydrate(storage, config.transport);
        let api = ApiClient::new(config, transport::for_kind(config.transport), session.clone())?;
        let lifecycle = AuthLifecycle::new(api.clone(), Arc::clone(&navigator));
        let hr = HrApi::new(api.clone());

        tracing::info!(
            base_url = %config.base_url,
            transport = %config.transport,
            authenticated = session.snapshot().is_authenticated(),
            "client ready"
        );
        Ok(Self { session, api, lifecycle, hr, navigator })
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn lifecycle(&self) -> &AuthLifecycle {
        &self.lifecycle
    }

    #[must_use]
    pub fn hr(&self) -> &HrApi {
        &self.hr
    }

    /// Navigate to `route` through the route guard.
    pub fn visit(&self, route: &Route) -> GuardDecision {
        navigation::visit(self.navigator.as_ref(), &self.session.snapshot(), route)
    }
}

/// Durable storage for `config`: the session file when one is set, else memory.
///
/// # Errors
///
/// Returns an error if the session file exists but cannot be read or parsed.
pub fn open_storage(config: &ClientConfig) -> Result<Arc<dyn DurableStorage>, StorageError> {
    match &config.session_file {
        Some(path) => Ok(Arc::new(FileStorage::open(path)?)),
        None => Ok(Arc::new(MemoryStorage::new())),
    }
}
