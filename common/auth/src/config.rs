use jsonwebtoken::Algorithm;

/// Runtime configuration for bearer token verification.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Expected `iss`; unchecked when absent.
    pub issuer: Option<String>,
    /// Expected `aud`; unchecked when absent.
    pub audience: Option<String>,
    pub algorithm: Algorithm,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
}

impl JwtConfig {
    /// Construct config with a 30 second leeway and no issuer/audience checks.
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            issuer: None,
            audience: None,
            algorithm,
            leeway_seconds: 30,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u32) -> Self {
        self.leeway_seconds = seconds;
        self
    }
}
