//! Accounts HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, the authentication layer and tracing middleware,
//! and defines the shared state injected into handlers.
use crate::api;
use crate::auth::middleware;
use crate::config::AuthConfig;
use crate::observability;
use crate::store::{AccountsStore, StoreResources};
use axum::Router;
use axum::routing::{get, post};
use massok_authz::{
    AccessResolver, Authenticator, KeyRing, SessionKeyStore, TokenIssuer, TokenValidator,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AccountsStore>,
    pub sessions: Arc<dyn SessionKeyStore>,
    pub tokens: TokenIssuer,
    pub authenticator: Arc<Authenticator>,
    pub resolver: AccessResolver,
}

impl AppState {
    /// Wire the authorization core around a store, a session key store and
    /// a key ring shared by issuance and validation.
    pub fn new(
        store: Arc<dyn AccountsStore>,
        sessions: Arc<dyn SessionKeyStore>,
        keys: Arc<KeyRing>,
        auth: &AuthConfig,
    ) -> Self {
        let resources = Arc::new(StoreResources::new(store.clone()));
        let mut resolver =
            AccessResolver::new(resources.clone()).with_max_parent_hops(auth.max_parent_hops);
        if let Some(timeout) = auth.resolve_timeout {
            resolver = resolver.with_hop_timeout(timeout);
        }
        let authenticator = Authenticator::new(
            TokenValidator::new(auth.issuer.clone(), keys.clone()),
            resources,
            sessions.clone(),
        );
        Self {
            store,
            sessions,
            tokens: TokenIssuer::new(auth.issuer.clone(), keys),
            authenticator: Arc::new(authenticator),
            resolver,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });

    Router::new()
        .route("/v1/auth/login", post(api::tokens::login))
        .route("/v1/auth/refresh", post(api::tokens::refresh))
        .route(
            "/v1/users",
            get(api::users::list_users).post(api::users::create_user),
        )
        .route(
            "/v1/users/:user_id",
            get(api::users::get_user)
                .patch(api::users::patch_user)
                .delete(api::users::delete_user),
        )
        .route(
            "/v1/users/:user_id/addresses",
            post(api::addresses::create_address),
        )
        .route(
            "/v1/addresses/:address_id",
            get(api::addresses::get_address),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
        .route("/v1/system/health", get(api::system::system_health))
        .route("/v1/openapi.json", get(api::system::openapi_document))
        .layer(trace_layer)
        .with_state(state)
}
