//! HTTP application wiring.
//!
//! - `services.rs`: store, registry and orchestrator wiring
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request/response bodies and parsing helpers
//! - `errors.rs`: JSON error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use payforge_infra::queue::QueueOrchestrator;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Router plus the orchestrator the caller is expected to spawn.
pub struct App {
    pub router: Router,
    pub services: Arc<services::AppServices>,
}

impl App {
    pub fn orchestrator(&self) -> Arc<QueueOrchestrator> {
        self.services.orchestrator.clone()
    }
}

pub async fn build_app(config: &ApiConfig) -> anyhow::Result<App> {
    let jwt = Arc::new(payforge_auth::Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(services::build_services(config).await?);

    // Everything except /health needs a bearer token.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
        .layer(ServiceBuilder::new());

    Ok(App { router, services })
}
