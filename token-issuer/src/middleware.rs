use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;

use crate::issuer::{Outcome, TokenIssuer};

/// Answers requests for the token path and forwards everything else to `next`.
pub async fn token_endpoint(
    State(issuer): State<Arc<TokenIssuer>>,
    request: Request,
    next: Next,
) -> Response {
    match issuer.handle(request).await {
        Outcome::PassThrough(request) => next.run(request).await,
        Outcome::Respond(response) => response,
    }
}

pub trait TokenEndpointExt {
    /// Install the token endpoint in front of every route, the fallback included.
    fn with_token_endpoint(self, issuer: Arc<TokenIssuer>) -> Self;
}

impl<S> TokenEndpointExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_token_endpoint(self, issuer: Arc<TokenIssuer>) -> Self {
        self.layer(middleware::from_fn_with_state(issuer, token_endpoint))
    }
}
