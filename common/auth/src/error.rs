use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("failed to parse decoding key: {0}")]
    KeyParse(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

impl AuthError {
    /// Value written to the error body `type`.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => "AuthHeader",
            AuthError::InvalidHeader(_) | AuthError::Verification(_) => "AuthToken",
            AuthError::InvalidClaim(_, _) | AuthError::InvalidJson(_) => "AuthClaims",
            AuthError::KeyParse(_) => "AuthKey",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let code = err.code();
        match err {
            AuthError::KeyParse(_) => ApiError::internal(code, "Token verification unavailable."),
            other => ApiError::unauthorized(code, other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
