use chrono::Duration;

use crate::error::ConfigError;
use crate::signing::SigningCredentials;

pub const DEFAULT_PATH: &str = "/token";
pub const DEFAULT_EXPIRATION_SECONDS: i64 = 300;
pub const DEFAULT_MAX_FORM_BYTES: usize = 1024 * 1024;

/// Static settings for the token endpoint, fixed once the issuer is built.
#[derive(Debug, Clone)]
pub struct IssuerOptions {
    /// Endpoint path, matched exactly and case-sensitively.
    pub path: String,
    /// Subject claim added to every token when non-empty.
    pub subject: Option<String>,
    /// Issuer (`iss`) claim.
    pub issuer: Option<String>,
    /// Audience (`aud`) claim.
    pub audience: Option<String>,
    /// Lifetime of issued tokens.
    pub expiration: Duration,
    /// Upper bound on the buffered form body.
    pub max_form_bytes: usize,
    pub signing: SigningCredentials,
}

impl IssuerOptions {
    /// Construct options with defaults: `/token`, five minute expiration, 1 MiB form cap.
    pub fn new(signing: SigningCredentials) -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            subject: None,
            issuer: None,
            audience: None,
            expiration: Duration::seconds(DEFAULT_EXPIRATION_SECONDS),
            max_form_bytes: DEFAULT_MAX_FORM_BYTES,
            signing,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = normalize(subject.into());
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = normalize(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = normalize(audience.into());
        self
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_max_form_bytes(mut self, limit: usize) -> Self {
        self.max_form_bytes = limit;
        self
    }

    /// `expires_in` value reported to clients.
    pub fn expires_in(&self) -> i64 {
        self.expiration.num_seconds()
    }

    pub(crate) fn subject(&self) -> Option<&str> {
        self.subject.as_deref().filter(|value| !value.is_empty())
    }

    pub(crate) fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref().filter(|value| !value.is_empty())
    }

    pub(crate) fn audience(&self) -> Option<&str> {
        self.audience.as_deref().filter(|value| !value.is_empty())
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::InvalidPath(self.path.clone()));
        }
        if self.expiration.num_seconds() < 1 {
            return Err(ConfigError::InvalidExpiration(self.expiration.num_seconds()));
        }
        if self.max_form_bytes == 0 {
            return Err(ConfigError::InvalidFormLimit);
        }
        Ok(())
    }
}

fn normalize(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
