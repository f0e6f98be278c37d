use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Message returned for every 5xx; the cause stays in the logs.
const SERVER_ERROR_MESSAGE: &str = "Failed to issue token.";

/// Defects in the issuer's setup. Raised while building, never per request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no claims provider configured; register one with TokenIssuerBuilder::claims_provider")]
    MissingProvider,
    #[error("endpoint path '{0}' must start with '/'")]
    InvalidPath(String),
    #[error("expiration must be at least one second, got {0}s")]
    InvalidExpiration(i64),
    #[error("max form size must be greater than zero")]
    InvalidFormLimit,
    #[error("unsupported signing algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    #[error("invalid signing key for {algorithm:?}: {reason}")]
    InvalidKey { algorithm: Algorithm, reason: String },
    #[error("signing credentials failed a test signature: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Client-visible error classification, written as the body `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MalformedRequest,
    AuthenticationFailed,
    ProviderFailure,
    SigningFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedRequest => "MalformedRequest",
            ErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ErrorKind::ProviderFailure => "ProviderFailure",
            ErrorKind::SigningFailure => "SigningFailure",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request failures of the token endpoint.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("Bad request. Request method is {method}. Request content type is {content_type}.")]
    MalformedRequest { method: Method, content_type: String },
    #[error("Bad request. {0}")]
    InvalidForm(String),
    #[error("Invalid credentials.")]
    AuthenticationFailed,
    #[error("claims provider failed: {0:#}")]
    Provider(anyhow::Error),
    #[error("claims augmenter failed: {0:#}")]
    Augmenter(anyhow::Error),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl IssueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssueError::MalformedRequest { .. } | IssueError::InvalidForm(_) => {
                ErrorKind::MalformedRequest
            }
            IssueError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            IssueError::Provider(_) | IssueError::Augmenter(_) => ErrorKind::ProviderFailure,
            IssueError::Signing(_) => ErrorKind::SigningFailure,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::MalformedRequest | ErrorKind::AuthenticationFailed => StatusCode::BAD_REQUEST,
            ErrorKind::ProviderFailure | ErrorKind::SigningFailure => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<IssueError> for ApiError {
    fn from(err: IssueError) -> Self {
        let kind = err.kind().as_str();
        if err.status().is_server_error() {
            ApiError::internal(kind, SERVER_ERROR_MESSAGE)
        } else {
            ApiError::bad_request(kind, err.to_string())
        }
    }
}

impl IntoResponse for IssueError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::errors::ErrorKind as JwtErrorKind;

    #[test]
    fn malformed_request_message_names_method_and_content_type() {
        let err = IssueError::MalformedRequest {
            method: Method::GET,
            content_type: "application/json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Bad request. Request method is GET. Request content type is application/json."
        );
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_errors_hide_their_cause() {
        let err = IssueError::Provider(anyhow::anyhow!("connection refused to db-primary:5432"));
        match ApiError::from(err) {
            ApiError::Internal { kind, message } => {
                assert_eq!(kind, "ProviderFailure");
                assert!(!message.contains("db-primary"));
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn signing_failure_maps_to_500() {
        let err = IssueError::Signing(JwtErrorKind::InvalidAlgorithm.into());
        assert_eq!(err.kind(), ErrorKind::SigningFailure);
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "SigningFailure");
    }

    #[test]
    fn authentication_failure_is_generic() {
        let err = IssueError::AuthenticationFailed;
        assert_eq!(err.kind().as_str(), "AuthenticationFailed");
        let message = err.to_string().to_ascii_lowercase();
        assert!(!message.contains("password"));
        assert!(!message.contains("username"));
    }
}
