use std::env;
use std::fs;
use std::net::{IpAddr, SocketAddr};

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use common_auth::{JwtConfig, JwtVerifier};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use token_issuer::options::{DEFAULT_EXPIRATION_SECONDS, DEFAULT_MAX_FORM_BYTES, DEFAULT_PATH};
use token_issuer::{parse_algorithm, IssuerOptions, SigningAlgorithm, SigningCredentials, SigningKey};

/// One configured login: `user:password[:role|role]`.
#[derive(Clone, PartialEq, Eq)]
pub struct UserEntry {
    pub username: String,
    /// Argon2 PHC string or plaintext.
    pub password: String,
    pub roles: Vec<String>,
}

impl std::fmt::Debug for UserEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserEntry")
            .field("username", &self.username)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub endpoint_path: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub subject: Option<String>,
    pub expiration_seconds: i64,
    pub max_form_bytes: usize,
    pub algorithm: SigningAlgorithm,
    pub signing_key: SigningKey,
    pub key_id: Option<String>,
    pub verify_key_pem: Option<String>,
    pub users: Vec<UserEntry>,
    pub role_claims: bool,
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid HOST '{}'", self.host))?;
        Ok(SocketAddr::from((ip, self.port)))
    }

    pub fn issuer_options(&self) -> Result<IssuerOptions> {
        let mut credentials = SigningCredentials::from_key(self.algorithm, self.signing_key.clone())
            .context("Failed to load signing credentials")?;
        if let Some(kid) = &self.key_id {
            credentials = credentials.with_key_id(kid.clone());
        }

        let mut options = IssuerOptions::new(credentials)
            .with_path(self.endpoint_path.clone())
            .with_expiration(Duration::seconds(self.expiration_seconds))
            .with_max_form_bytes(self.max_form_bytes);
        if let Some(issuer) = &self.issuer {
            options = options.with_issuer(issuer.clone());
        }
        if let Some(audience) = &self.audience {
            options = options.with_audience(audience.clone());
        }
        if let Some(subject) = &self.subject {
            options = options.with_subject(subject.clone());
        }
        Ok(options)
    }

    /// Verifier for bearer tokens this service issued.
    pub fn jwt_verifier(&self) -> Result<JwtVerifier> {
        let mut jwt = JwtConfig::new(self.algorithm);
        if let Some(issuer) = &self.issuer {
            jwt = jwt.with_issuer(issuer.clone());
        }
        if let Some(audience) = &self.audience {
            jwt = jwt.with_audience(audience.clone());
        }
        let builder = JwtVerifier::builder(jwt);
        let verify_pem = self.verify_key_pem.as_deref().map(str::as_bytes);

        let builder = match (self.algorithm, &self.signing_key) {
            (
                SigningAlgorithm::HS256 | SigningAlgorithm::HS384 | SigningAlgorithm::HS512,
                SigningKey::Secret(secret),
            ) => builder.with_secret(secret),
            (
                SigningAlgorithm::RS256
                | SigningAlgorithm::RS384
                | SigningAlgorithm::RS512
                | SigningAlgorithm::PS256
                | SigningAlgorithm::PS384
                | SigningAlgorithm::PS512,
                key,
            ) => match (verify_pem, key) {
                (Some(pem), _) => builder.with_rsa_pem(pem)?,
                (None, SigningKey::Pem(private_pem)) => {
                    let (n, e) = components_from_private_pem(private_pem)?;
                    builder.with_rsa_components(&n, &e)?
                }
                (None, SigningKey::Secret(_)) => bail!("RSA signing requires a PEM private key"),
            },
            (SigningAlgorithm::ES256 | SigningAlgorithm::ES384, _) => builder.with_ec_pem(
                verify_pem.context("TOKEN_VERIFY_KEY_PATH is required for ECDSA signing")?,
            )?,
            (SigningAlgorithm::EdDSA, _) => builder.with_ed_pem(
                verify_pem.context("TOKEN_VERIFY_KEY_PATH is required for EdDSA signing")?,
            )?,
            (algorithm, _) => bail!("No verification key available for {algorithm:?}"),
        };
        Ok(builder.build()?)
    }
}

pub fn load_service_config() -> Result<ServiceConfig> {
    service_config_from(|key| env::var(key).ok())
}

/// Build the config from any variable source; `load_service_config` passes the process env.
pub fn service_config_from<F>(lookup: F) -> Result<ServiceConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

    let host = var("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
    let port = match var("PORT") {
        Some(value) => value
            .parse::<u16>()
            .with_context(|| format!("Invalid PORT '{value}'"))?,
        None => 8085,
    };

    let endpoint_path = var("TOKEN_ENDPOINT_PATH").unwrap_or_else(|| DEFAULT_PATH.to_string());
    let expiration_seconds = match var("TOKEN_EXPIRATION_SECONDS") {
        Some(value) => value
            .parse::<i64>()
            .with_context(|| format!("Invalid TOKEN_EXPIRATION_SECONDS '{value}'"))?,
        None => DEFAULT_EXPIRATION_SECONDS,
    };
    let max_form_bytes = match var("TOKEN_MAX_FORM_BYTES") {
        Some(value) => value
            .parse::<usize>()
            .with_context(|| format!("Invalid TOKEN_MAX_FORM_BYTES '{value}'"))?,
        None => DEFAULT_MAX_FORM_BYTES,
    };

    let algorithm = parse_algorithm(
        &var("TOKEN_SIGNING_ALGORITHM").unwrap_or_else(|| "HS256".to_string()),
    )
    .context("Failed to parse TOKEN_SIGNING_ALGORITHM")?;

    let signing_key = match algorithm {
        SigningAlgorithm::HS256 | SigningAlgorithm::HS384 | SigningAlgorithm::HS512 => {
            let secret = lookup("TOKEN_SIGNING_SECRET")
                .filter(|value| !value.is_empty())
                .context("TOKEN_SIGNING_SECRET must be set for HMAC signing")?;
            SigningKey::secret(secret)
        }
        _ => SigningKey::pem(read_pem(
            &var,
            "TOKEN_SIGNING_KEY_PEM",
            "TOKEN_SIGNING_KEY_PATH",
        )?
        .context("TOKEN_SIGNING_KEY_PEM or TOKEN_SIGNING_KEY_PATH must be set for asymmetric signing")?),
    };

    let verify_key_pem = match var("TOKEN_VERIFY_KEY_PATH") {
        Some(path) => Some(
            fs::read_to_string(&path)
                .with_context(|| format!("Failed to read TOKEN_VERIFY_KEY_PATH '{path}'"))?,
        ),
        None => None,
    };

    let users = match var("TOKEN_SERVICE_USERS") {
        Some(value) => parse_users(&value).context("Failed to parse TOKEN_SERVICE_USERS")?,
        None => Vec::new(),
    };

    Ok(ServiceConfig {
        host,
        port,
        endpoint_path,
        issuer: var("TOKEN_ISSUER"),
        audience: var("TOKEN_AUDIENCE"),
        subject: var("TOKEN_SUBJECT"),
        expiration_seconds,
        max_form_bytes,
        algorithm,
        signing_key,
        key_id: var("TOKEN_SIGNING_KEY_ID"),
        verify_key_pem,
        users,
        role_claims: var("TOKEN_ROLE_CLAIMS")
            .map(|value| bool_from_str(&value))
            .unwrap_or(false),
    })
}

fn read_pem<F>(var: &F, inline_key: &str, path_key: &str) -> Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(pem) = var(inline_key) {
        return Ok(Some(pem));
    }
    match var(path_key) {
        Some(path) => fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {path_key} '{path}'")),
        None => Ok(None),
    }
}

/// Entries are `;`-separated since argon2 PHC strings contain commas.
pub fn parse_users(value: &str) -> Result<Vec<UserEntry>> {
    let mut users = Vec::new();
    for item in value.split(';') {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.splitn(3, ':');
        let username = parts.next().unwrap_or_default().trim();
        let password = parts
            .next()
            .ok_or_else(|| anyhow!("User entry '{username}' is missing a password"))?;
        if username.is_empty() {
            bail!("User entry with empty username");
        }
        if password.is_empty() {
            bail!("User entry '{username}' has an empty password");
        }
        let roles = parts
            .next()
            .map(|roles| {
                roles
                    .split('|')
                    .map(str::trim)
                    .filter(|role| !role.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        users.push(UserEntry {
            username: username.to_string(),
            password: password.to_string(),
            roles,
        });
    }
    Ok(users)
}

fn components_from_private_pem(pem: &str) -> Result<(String, String)> {
    let private = RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|err| anyhow!("Failed to parse RSA private key: {err}"))?;
    let public = private.to_public_key();
    let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public.e().to_bytes_be());
    Ok((n, e))
}

fn bool_from_str(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
