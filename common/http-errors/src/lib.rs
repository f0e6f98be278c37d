use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::{Deserialize, Serialize};

/// Header mirroring the body `type`, so proxies and metrics can classify errors without parsing JSON.
pub const ERROR_CODE_HEADER: &str = "X-Error-Code";

/// Wire shape of every error body: `{"type": "<ErrorKind>", "message": "<string>"}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest { kind: &'static str, message: String },
    Unauthorized { kind: &'static str, message: String },
    Internal { kind: &'static str, message: String },
}

impl ApiError {
    pub fn bad_request(kind: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { kind, message: message.into() } }
    pub fn unauthorized(kind: &'static str, message: impl Into<String>) -> Self { Self::Unauthorized { kind, message: message.into() } }
    pub fn internal(kind: &'static str, message: impl Into<String>) -> Self { Self::Internal { kind, message: message.into() } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest { kind, .. }
            | ApiError::Unauthorized { kind, .. }
            | ApiError::Internal { kind, .. } => kind,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match self {
            ApiError::BadRequest { kind, message }
            | ApiError::Unauthorized { kind, message }
            | ApiError::Internal { kind, message } => (kind, message),
        };
        let body = ErrorBody { kind: kind.into(), message };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(kind) {
            resp.headers_mut().insert(ERROR_CODE_HEADER, val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
