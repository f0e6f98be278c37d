use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Verifies bearer tokens against one key and the configured algorithm.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    key: DecodingKey,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig, key: DecodingKey) -> Self {
        Self { config, key }
    }

    pub fn builder(config: JwtConfig) -> JwtVerifierBuilder {
        JwtVerifierBuilder::new(config)
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        let header =
            decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;

        let mut validation = Validation::new(self.config.algorithm);
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation.validate_nbf = true;
        validation.leeway = self.config.leeway_seconds.into();

        let token_data = decode::<Value>(token, &self.key, &validation)?;
        let claims = Claims::try_from(token_data.claims)?;
        debug!(kid = ?header.kid, jti = ?claims.token_id, "verified JWT successfully");
        Ok(claims)
    }
}

pub struct JwtVerifierBuilder {
    config: JwtConfig,
    key: Option<DecodingKey>,
}

impl JwtVerifierBuilder {
    fn new(config: JwtConfig) -> Self {
        Self { config, key: None }
    }

    pub fn with_decoding_key(mut self, key: DecodingKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_secret(self, secret: &[u8]) -> Self {
        self.with_decoding_key(DecodingKey::from_secret(secret))
    }

    pub fn with_rsa_pem(self, pem: &[u8]) -> AuthResult<Self> {
        let key = DecodingKey::from_rsa_pem(pem).map_err(|err| AuthError::KeyParse(err.to_string()))?;
        Ok(self.with_decoding_key(key))
    }

    /// Base64url-encoded modulus and exponent, as published in a JWK.
    pub fn with_rsa_components(self, modulus: &str, exponent: &str) -> AuthResult<Self> {
        let key = DecodingKey::from_rsa_components(modulus, exponent)
            .map_err(|err| AuthError::KeyParse(err.to_string()))?;
        Ok(self.with_decoding_key(key))
    }

    pub fn with_ec_pem(self, pem: &[u8]) -> AuthResult<Self> {
        let key = DecodingKey::from_ec_pem(pem).map_err(|err| AuthError::KeyParse(err.to_string()))?;
        Ok(self.with_decoding_key(key))
    }

    pub fn with_ed_pem(self, pem: &[u8]) -> AuthResult<Self> {
        let key = DecodingKey::from_ed_pem(pem).map_err(|err| AuthError::KeyParse(err.to_string()))?;
        Ok(self.with_decoding_key(key))
    }

    pub fn build(self) -> AuthResult<JwtVerifier> {
        let key = self
            .key
            .ok_or_else(|| AuthError::KeyParse("no decoding key configured".to_string()))?;
        Ok(JwtVerifier::new(self.config, key))
    }
}
