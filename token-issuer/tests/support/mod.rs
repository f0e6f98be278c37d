#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use token_issuer::{
    Claim, ClaimsAugmenter, ClaimsProvider, Identity, IssuerOptions, SigningAlgorithm,
    SigningCredentials, SigningKey, TokenEndpointExt, TokenIssuer, TokenRequest,
};

pub const SECRET: &str = "issuer-flow-test-secret";
pub const FORM: &str = "application/x-www-form-urlencoded";

/// Accepts `test`/`test` and yields a `name` claim; counts every call.
#[derive(Default)]
pub struct PasswordProvider {
    calls: AtomicUsize,
}

impl PasswordProvider {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClaimsProvider for PasswordProvider {
    async fn authenticate(&self, request: &TokenRequest) -> Result<Option<Identity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let form = request.form();
        match (form.get("username"), form.get("password")) {
            (Some("test"), Some("test")) => Ok(Some(
                Identity::new()
                    .with_authentication_type("password")
                    .with_claim("name", "test")
                    .with_claim("role", "cashier"),
            )),
            _ => Ok(None),
        }
    }
}

/// Authenticates every request as the given identity.
pub struct FixedIdentity(pub Identity);

#[async_trait]
impl ClaimsProvider for FixedIdentity {
    async fn authenticate(&self, _request: &TokenRequest) -> Result<Option<Identity>> {
        Ok(Some(self.0.clone()))
    }
}

pub struct BrokenProvider;

#[async_trait]
impl ClaimsProvider for BrokenProvider {
    async fn authenticate(&self, _request: &TokenRequest) -> Result<Option<Identity>> {
        Err(anyhow!("user store unreachable at 10.0.0.7:5432"))
    }
}

/// Returns a fixed list of claims; counts every call.
pub struct FixedAugmenter {
    claims: Vec<Claim>,
    calls: AtomicUsize,
}

impl FixedAugmenter {
    pub fn shared(claims: Vec<Claim>) -> Arc<Self> {
        Arc::new(Self {
            claims,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClaimsAugmenter for FixedAugmenter {
    async fn augment(&self, _request: &TokenRequest, _identity: &Identity) -> Result<Vec<Claim>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.claims.clone())
    }
}

pub struct BrokenAugmenter;

#[async_trait]
impl ClaimsAugmenter for BrokenAugmenter {
    async fn augment(&self, _request: &TokenRequest, _identity: &Identity) -> Result<Vec<Claim>> {
        Err(anyhow!("role service timed out"))
    }
}

pub fn hmac_options() -> IssuerOptions {
    let credentials =
        SigningCredentials::from_key(SigningAlgorithm::HS256, SigningKey::secret(SECRET))
            .expect("hmac credentials");
    IssuerOptions::new(credentials)
        .with_issuer("peanut-test")
        .with_audience("peanut-api")
}

/// Router with one downstream route and a fallback, fronted by the token endpoint.
pub fn app(issuer: TokenIssuer) -> Router {
    Router::new()
        .route("/other", get(|| async { "downstream" }))
        .fallback(|| async { (StatusCode::NOT_FOUND, "fallback") })
        .with_token_endpoint(Arc::new(issuer))
}

pub fn form_post(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, FORM)
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub async fn body_bytes(resp: Response) -> Vec<u8> {
    resp.into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).expect("json body")
}

pub fn decode_claims(token: &str, key: &DecodingKey, algorithm: Algorithm, audience: &str) -> Value {
    let mut validation = Validation::new(algorithm);
    validation.set_audience(&[audience]);
    decode::<Value>(token, key, &validation)
        .expect("token verifies")
        .claims
}

pub fn decode_hs256(token: &str) -> Value {
    decode_claims(
        token,
        &DecodingKey::from_secret(SECRET.as_bytes()),
        Algorithm::HS256,
        "peanut-api",
    )
}
