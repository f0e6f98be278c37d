use std::fmt;

use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;

use crate::error::ConfigError;

pub use jsonwebtoken::Algorithm as SigningAlgorithm;

/// Raw key material as supplied by the host.
#[derive(Clone)]
pub enum SigningKey {
    /// Shared secret for the HMAC family.
    Secret(Vec<u8>),
    /// PEM private key (RSA PKCS#1/PKCS#8, EC or Ed25519 PKCS#8).
    Pem(String),
}

impl SigningKey {
    pub fn secret(value: impl AsRef<[u8]>) -> Self {
        Self::Secret(value.as_ref().to_vec())
    }

    pub fn pem(value: impl Into<String>) -> Self {
        Self::Pem(value.into())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigningKey::Secret(bytes) => write!(f, "SigningKey::Secret({} bytes)", bytes.len()),
            SigningKey::Pem(_) => f.write_str("SigningKey::Pem(..)"),
        }
    }
}

/// Key and algorithm used to sign every token.
#[derive(Clone)]
pub struct SigningCredentials {
    algorithm: SigningAlgorithm,
    key: EncodingKey,
    key_id: Option<String>,
}

impl SigningCredentials {
    /// Wrap an already-built encoding key. The pairing is checked when the issuer is built.
    pub fn new(algorithm: SigningAlgorithm, key: EncodingKey) -> Self {
        Self {
            algorithm,
            key,
            key_id: None,
        }
    }

    pub fn from_key(algorithm: SigningAlgorithm, key: SigningKey) -> Result<Self, ConfigError> {
        let key = create_encoding_key(&key, algorithm)?;
        Ok(Self::new(algorithm, key))
    }

    pub fn with_key_id(mut self, kid: impl Into<String>) -> Self {
        let kid = kid.into();
        self.key_id = if kid.trim().is_empty() { None } else { Some(kid) };
        self
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    pub fn header(&self) -> Header {
        let mut header = Header::new(self.algorithm);
        header.kid = self.key_id.clone();
        header
    }

    /// Produce the compact `header.payload.signature` form. Pure CPU work.
    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&self.header(), payload, &self.key)
    }
}

impl fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Parse algorithm string to jsonwebtoken Algorithm.
pub fn parse_algorithm(alg: &str) -> Result<SigningAlgorithm, ConfigError> {
    match alg.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(SigningAlgorithm::HS256),
        "HS384" => Ok(SigningAlgorithm::HS384),
        "HS512" => Ok(SigningAlgorithm::HS512),
        "RS256" => Ok(SigningAlgorithm::RS256),
        "RS384" => Ok(SigningAlgorithm::RS384),
        "RS512" => Ok(SigningAlgorithm::RS512),
        "PS256" => Ok(SigningAlgorithm::PS256),
        "PS384" => Ok(SigningAlgorithm::PS384),
        "PS512" => Ok(SigningAlgorithm::PS512),
        "ES256" => Ok(SigningAlgorithm::ES256),
        "ES384" => Ok(SigningAlgorithm::ES384),
        "EDDSA" => Ok(SigningAlgorithm::EdDSA),
        _ => Err(ConfigError::UnsupportedAlgorithm(alg.to_string())),
    }
}

fn create_encoding_key(
    key: &SigningKey,
    algorithm: SigningAlgorithm,
) -> Result<EncodingKey, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidKey { algorithm, reason };

    match (algorithm, key) {
        (
            SigningAlgorithm::HS256 | SigningAlgorithm::HS384 | SigningAlgorithm::HS512,
            SigningKey::Secret(bytes),
        ) => {
            if bytes.is_empty() {
                return Err(invalid("HMAC secret must not be empty".to_string()));
            }
            Ok(EncodingKey::from_secret(bytes))
        }
        (
            SigningAlgorithm::HS256 | SigningAlgorithm::HS384 | SigningAlgorithm::HS512,
            SigningKey::Pem(_),
        ) => Err(invalid("HMAC algorithms require a shared secret, not a PEM key".to_string())),
        (_, SigningKey::Secret(_)) => Err(invalid("asymmetric algorithms require a PEM private key".to_string())),
        (
            SigningAlgorithm::RS256
            | SigningAlgorithm::RS384
            | SigningAlgorithm::RS512
            | SigningAlgorithm::PS256
            | SigningAlgorithm::PS384
            | SigningAlgorithm::PS512,
            SigningKey::Pem(pem),
        ) => EncodingKey::from_rsa_pem(pem.trim().as_bytes())
            .map_err(|err| invalid(format!("failed to parse RSA private key: {err}"))),
        (SigningAlgorithm::ES256 | SigningAlgorithm::ES384, SigningKey::Pem(pem)) => {
            EncodingKey::from_ec_pem(pem.trim().as_bytes())
                .map_err(|err| invalid(format!("failed to parse EC private key: {err}")))
        }
        (SigningAlgorithm::EdDSA, SigningKey::Pem(pem)) => {
            EncodingKey::from_ed_pem(pem.trim().as_bytes())
                .map_err(|err| invalid(format!("failed to parse Ed25519 private key: {err}")))
        }
    }
}
