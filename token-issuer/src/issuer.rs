use std::sync::Arc;

use axum::extract::Request;
use axum::http::{header::CACHE_CONTROL, header::CONTENT_TYPE, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::claims::{ClaimSet, RegisteredClaims};
use crate::error::{ConfigError, IssueError};
use crate::options::IssuerOptions;
use crate::provider::{ClaimsAugmenter, ClaimsProvider};
use crate::request::{form_encoding, FormEncoding, TokenRequest};

/// Result of offering a request to the issuer.
pub enum Outcome {
    /// Not the token endpoint; forward the request untouched.
    PassThrough(Request),
    /// The issuer answered (token or error).
    Respond(Response),
}

/// JSON body of a successful token response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
}

impl IssuedToken {
    pub fn response(&self) -> IssuedTokenResponse {
        IssuedTokenResponse {
            access_token: self.access_token.clone(),
            expires_in: self.expires_in,
        }
    }
}

impl IntoResponse for IssuedToken {
    fn into_response(self) -> Response {
        let mut resp = (StatusCode::OK, Json(self.response())).into_response();
        resp.headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        resp
    }
}

/// Exchanges credentials posted to the configured path for a signed JWT.
///
/// Stateless per request: options and extension points are read-only after [`TokenIssuerBuilder::build`].
pub struct TokenIssuer {
    options: IssuerOptions,
    provider: Arc<dyn ClaimsProvider>,
    augmenter: Option<Arc<dyn ClaimsAugmenter>>,
}

impl TokenIssuer {
    pub fn builder(options: IssuerOptions) -> TokenIssuerBuilder {
        TokenIssuerBuilder::new(options)
    }

    pub fn options(&self) -> &IssuerOptions {
        &self.options
    }

    pub fn has_augmenter(&self) -> bool {
        self.augmenter.is_some()
    }

    /// Exact, case-sensitive comparison against the configured path.
    pub fn matches(&self, path: &str) -> bool {
        path == self.options.path
    }

    pub async fn handle(&self, request: Request) -> Outcome {
        if !self.matches(request.uri().path()) {
            return Outcome::PassThrough(request);
        }
        debug!(path = %self.options.path, "token endpoint matched");

        match self.issue(request).await {
            Ok(issued) => Outcome::Respond(issued.into_response()),
            Err(err) => Outcome::Respond(err.into_response()),
        }
    }

    /// Validate, authenticate, assemble claims and sign. Assumes the path already matched.
    pub async fn issue(&self, request: Request) -> Result<IssuedToken, IssueError> {
        let encoding = check_shape(&request)?;
        let request = TokenRequest::read(request, encoding, self.options.max_form_bytes)
            .await
            .map_err(|err| {
                warn!(error = %err, "token request body rejected");
                err
            })?;

        debug!("attempting to get identity");
        let identity = match self.provider.authenticate(&request).await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                warn!("token request rejected: invalid credentials");
                return Err(IssueError::AuthenticationFailed);
            }
            Err(err) => {
                error!(error = ?err, "claims provider failed");
                return Err(IssueError::Provider(err));
            }
        };

        let augmented = match &self.augmenter {
            Some(augmenter) => {
                debug!("attempting to get custom claims");
                augmenter
                    .augment(&request, &identity)
                    .await
                    .map_err(|err| {
                        error!(error = ?err, "claims augmenter failed");
                        IssueError::Augmenter(err)
                    })?
            }
            None => Vec::new(),
        };

        let token_id = Uuid::new_v4().to_string();
        let claims = ClaimSet::assemble(&token_id, self.options.subject(), &identity, augmented);
        self.sign(token_id, &claims, Utc::now())
    }

    fn sign(
        &self,
        token_id: String,
        claims: &ClaimSet,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, IssueError> {
        debug!("attempting to generate jwt token");
        let expires_in = self.options.expires_in();
        let expires_at = now + Duration::seconds(expires_in);

        let payload = claims.to_payload(RegisteredClaims {
            issuer: self.options.issuer(),
            audience: self.options.audience(),
            not_before: now.timestamp(),
            expires_at: expires_at.timestamp(),
            issued_at: now.timestamp(),
        });

        let access_token = self.options.signing.sign(&payload).map_err(|err| {
            error!(error = %err, "failed to sign token");
            IssueError::Signing(err)
        })?;

        debug!(
            jti = %token_id,
            iat = now.timestamp(),
            exp = expires_at.timestamp(),
            claims = claims.len(),
            "jwt token generated"
        );

        Ok(IssuedToken {
            access_token,
            expires_in,
        })
    }
}

fn check_shape(request: &Request) -> Result<FormEncoding, IssueError> {
    let encoding = form_encoding(request.headers());
    match (request.method(), encoding) {
        (&Method::POST, Some(encoding)) => Ok(encoding),
        (method, _) => {
            let content_type = request
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("")
                .to_string();
            warn!(method = %method, content_type = %content_type, "token request rejected: not a form post");
            Err(IssueError::MalformedRequest {
                method: method.clone(),
                content_type,
            })
        }
    }
}

pub struct TokenIssuerBuilder {
    options: IssuerOptions,
    provider: Option<Arc<dyn ClaimsProvider>>,
    augmenter: Option<Arc<dyn ClaimsAugmenter>>,
}

impl TokenIssuerBuilder {
    fn new(options: IssuerOptions) -> Self {
        Self {
            options,
            provider: None,
            augmenter: None,
        }
    }

    pub fn claims_provider<P: ClaimsProvider + 'static>(mut self, provider: P) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub fn claims_augmenter<A: ClaimsAugmenter + 'static>(mut self, augmenter: A) -> Self {
        self.augmenter = Some(Arc::new(augmenter));
        self
    }

    /// Fails on any setup defect, including key material that cannot sign.
    pub fn build(self) -> Result<TokenIssuer, ConfigError> {
        let provider = self.provider.ok_or(ConfigError::MissingProvider)?;
        self.options.validate()?;

        self.options
            .signing
            .sign(&json!({ "startup_check": true }))
            .map_err(ConfigError::Signing)?;

        info!(
            path = %self.options.path,
            algorithm = ?self.options.signing.algorithm(),
            expires_in = self.options.expires_in(),
            augmenter = self.augmenter.is_some(),
            "token endpoint configured"
        );

        Ok(TokenIssuer {
            options: self.options,
            provider,
            augmenter: self.augmenter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Identity;
    use crate::signing::{SigningAlgorithm, SigningCredentials, SigningKey};
    use async_trait::async_trait;
    use jsonwebtoken::EncodingKey;

    struct Nobody;

    #[async_trait]
    impl ClaimsProvider for Nobody {
        async fn authenticate(&self, _request: &TokenRequest) -> anyhow::Result<Option<Identity>> {
            Ok(None)
        }
    }

    fn options() -> IssuerOptions {
        IssuerOptions::new(
            SigningCredentials::from_key(SigningAlgorithm::HS256, SigningKey::secret("issuer-unit"))
                .expect("credentials"),
        )
    }

    #[test]
    fn build_without_provider_is_a_config_error() {
        let err = TokenIssuer::builder(options()).build().err().expect("missing provider");
        assert!(matches!(err, ConfigError::MissingProvider));
    }

    #[test]
    fn build_rejects_key_material_that_cannot_sign() {
        let mismatched = IssuerOptions::new(SigningCredentials::new(
            SigningAlgorithm::RS256,
            EncodingKey::from_secret(b"not-an-rsa-key"),
        ));
        let err = TokenIssuer::builder(mismatched)
            .claims_provider(Nobody)
            .build()
            .err()
            .expect("signing check fails");
        assert!(matches!(err, ConfigError::Signing(_)));
    }

    #[test]
    fn sign_sets_expiry_exactly_expiration_after_issue() {
        let issuer = TokenIssuer::builder(options().with_expiration(Duration::seconds(90)))
            .claims_provider(Nobody)
            .build()
            .expect("issuer");
        let claims = ClaimSet::assemble("jti-1", None, &Identity::new(), Vec::new());
        let issued = issuer
            .sign("jti-1".to_string(), &claims, Utc::now())
            .expect("signed");

        assert_eq!(issued.expires_in, 90);
        assert_eq!(issued.response().expires_in, 90);

        let decoded = jsonwebtoken::decode::<serde_json::Value>(
            &issued.access_token,
            &jsonwebtoken::DecodingKey::from_secret(b"issuer-unit"),
            &jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256),
        )
        .expect("token verifies")
        .claims;
        let iat = decoded["iat"].as_i64().expect("iat");
        assert_eq!(decoded["exp"].as_i64(), Some(iat + 90));
        assert_eq!(decoded["nbf"].as_i64(), Some(iat));
    }

    #[test]
    fn matches_is_exact_and_case_sensitive() {
        let issuer = TokenIssuer::builder(options())
            .claims_provider(Nobody)
            .build()
            .expect("issuer");
        assert!(issuer.matches("/token"));
        assert!(!issuer.matches("/Token"));
        assert!(!issuer.matches("/token/"));
        assert!(!issuer.matches("/tokens"));
        assert!(!issuer.has_augmenter());
    }
}
