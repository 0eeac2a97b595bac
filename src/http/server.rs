//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the rule API, health and readiness routes
//! - Wire up middleware (request ID, tracing, body limit)
//! - Bind the router to a listener and serve until shutdown

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::SecurityConfig;
use crate::health::Readiness;
use crate::http::handlers;
use crate::http::request::{make_span, propagate_request_id, set_request_id};
use crate::service::RulesService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<RulesService>,
    pub readiness: Arc<Readiness>,
}

/// HTTP server for the rule API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, security: &SecurityConfig) -> Self {
        Self {
            router: build_router(state, security),
        }
    }

    /// Run the server until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState, security: &SecurityConfig) -> Router {
    let api = Router::new()
        .route(
            "/api/rules",
            get(handlers::list_rules).post(handlers::create_rule),
        )
        .route("/api/rules/validate", post(handlers::validate_rule))
        .route(
            "/api/rules/{id}",
            get(handlers::get_rule)
                .put(handlers::update_rule)
                .delete(handlers::delete_rule),
        )
        .route("/api/rules/{id}/yaml", get(handlers::get_rule_yaml))
        .route("/api/middlewares", get(handlers::list_middlewares))
        .route("/api/resync", post(handlers::resync))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready));

    api.with_state(state).layer(
        ServiceBuilder::new()
            .layer(set_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(propagate_request_id())
            .layer(RequestBodyLimitLayer::new(security.max_body_size)),
    )
}
