use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{FromRef, Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use common_auth::{AuthContext, JwtVerifier};
use common_http_errors::ApiError;
use serde::{Deserialize, Serialize};
use token_issuer::{TokenEndpointExt, TokenIssuer};
use tracing::error;

use crate::config::ServiceConfig;
use crate::metrics::TokenMetrics;
use crate::users::{CredentialStore, RoleAugmenter};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub metrics: Arc<TokenMetrics>,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

impl AppState {
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        let jwt_verifier = config
            .jwt_verifier()
            .context("Failed to build bearer token verifier")?;
        Ok(Self {
            config: Arc::new(config),
            jwt_verifier: Arc::new(jwt_verifier),
            metrics: Arc::new(TokenMetrics::new()?),
        })
    }
}

/// Issuer backed by the configured users, with role claims when enabled.
pub fn build_issuer(config: &ServiceConfig) -> Result<TokenIssuer> {
    let store = Arc::new(CredentialStore::from_entries(&config.users)?);
    let mut builder = TokenIssuer::builder(config.issuer_options()?).claims_provider(store.clone());
    if config.role_claims {
        builder = builder.claims_augmenter(RoleAugmenter::new(store));
    }
    builder.build().context("Failed to configure token endpoint")
}

pub fn build_router(state: AppState, issuer: Arc<TokenIssuer>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/test", get(protected_test))
        .with_state(state.clone())
        .with_token_endpoint(issuer)
        .layer(middleware::from_fn_with_state(state, track_token_requests))
}

pub fn build_app(config: ServiceConfig) -> Result<Router> {
    let issuer = Arc::new(build_issuer(&config)?);
    let state = AppState::from_config(config)?;
    Ok(build_router(state, issuer))
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => {
            error!(?err, "Unable to render metrics");
            ApiError::internal("MetricsUnavailable", "Unable to render metrics.").into_response()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TestResponse {
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub token_id: Option<String>,
}

async fn protected_test(auth: AuthContext) -> Json<TestResponse> {
    let claims = auth.into_claims();
    Json(TestResponse {
        name: claims.name,
        roles: claims.roles,
        token_id: claims.token_id,
    })
}

async fn track_token_requests(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let is_token_path = request.uri().path() == state.config.endpoint_path;
    let response = next.run(request).await;
    if is_token_path {
        state
            .metrics
            .token_request(TokenMetrics::outcome_for(response.status()));
    }
    response
}
