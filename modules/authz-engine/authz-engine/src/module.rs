//! Authorization engine module.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use authz_engine_sdk::AuthzEngineClient;
use axum::Router;
use tracing::info;

use crate::api::rest::{self, AuthState, StaticAuthenticator};
use crate::config::{AuthConfig, BootstrapConfig, EngineConfig};
use crate::domain::{AuthzEngineLocalClient, Service, bootstrap};
use crate::infra::storage::InMemoryStorage;

/// Authorization engine module.
///
/// Owns the service over an in-memory store seeded with the built-in schema,
/// and hands out the in-process client and the REST router.
pub struct AuthzEngine {
    service: Arc<Service>,
}

impl AuthzEngine {
    pub const MODULE_NAME: &'static str = "authz-engine";

    #[tracing::instrument(skip_all, fields(superuser_bypass = engine.superuser_bypass))]
    pub async fn init(engine: &EngineConfig, seed: &BootstrapConfig) -> anyhow::Result<Self> {
        info!("Initializing {} module", Self::MODULE_NAME);

        let storage = Arc::new(InMemoryStorage::new());
        let service = Arc::new(Service::new(storage, engine));
        bootstrap::apply(&service, seed)
            .await
            .context("failed to seed the built-in schema")?;

        info!("{} module initialized", Self::MODULE_NAME);
        Ok(Self { service })
    }

    #[must_use]
    pub fn service(&self) -> Arc<Service> {
        self.service.clone()
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn AuthzEngineClient> {
        Arc::new(AuthzEngineLocalClient::new(self.service.clone()))
    }

    /// REST router guarded by the configured bearer token authentication.
    ///
    /// Each authenticated request gets a deadline `request_timeout` from now.
    pub fn router(&self, auth: &AuthConfig, request_timeout: Duration) -> anyhow::Result<Router> {
        let authenticator =
            StaticAuthenticator::from_config(auth).context("invalid auth identity")?;
        info!(mode = ?auth.mode, tokens = auth.tokens.len(), "REST authentication configured");
        Ok(rest::router(
            self.service.clone(),
            AuthState {
                authenticator: Arc::new(authenticator),
                request_timeout,
            },
        ))
    }
}
