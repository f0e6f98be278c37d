use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use rand_core::OsRng;
use serde_json::json;
use token_issuer::claims::{NAME, ROLE};
use token_issuer::{Claim, ClaimsAugmenter, ClaimsProvider, Identity, TokenRequest};
use tracing::{debug, info};

use crate::config::UserEntry;

pub const USERNAME_FIELD: &str = "username";
pub const PASSWORD_FIELD: &str = "password";
pub const USER_DATA: &str = "user_data";

struct StoredUser {
    password_hash: String,
    roles: Vec<String>,
}

/// In-memory users checked against argon2 hashes.
pub struct CredentialStore {
    users: HashMap<String, StoredUser>,
    /// Verified for unknown usernames so both failure paths cost one argon2 run.
    dummy_hash: String,
}

impl CredentialStore {
    /// Plaintext passwords are hashed here so only PHC strings are kept in memory.
    pub fn from_entries(entries: &[UserEntry]) -> Result<Self> {
        let mut users = HashMap::with_capacity(entries.len());
        let mut hashed = 0usize;
        for entry in entries {
            let password_hash = if PasswordHash::new(&entry.password).is_ok() {
                entry.password.clone()
            } else {
                hashed += 1;
                hash_password(&entry.password)?
            };
            users.insert(
                entry.username.clone(),
                StoredUser {
                    password_hash,
                    roles: entry.roles.clone(),
                },
            );
        }
        let dummy_hash = hash_password(SaltString::generate(&mut OsRng).as_str())?;
        info!(users = users.len(), hashed, "credential store loaded");
        Ok(Self { users, dummy_hash })
    }

    /// Stored hash for `username`, or the dummy hash when the user is unknown.
    fn hash_for(&self, username: &str) -> (Option<&StoredUser>, &str) {
        match self.users.get(username) {
            Some(user) => (Some(user), user.password_hash.as_str()),
            None => (None, self.dummy_hash.as_str()),
        }
    }

    pub fn roles(&self, username: &str) -> Option<&[String]> {
        self.users.get(username).map(|user| user.roles.as_slice())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("Failed to hash password: {err}"))
}

#[async_trait]
impl ClaimsProvider for CredentialStore {
    async fn authenticate(&self, request: &TokenRequest) -> Result<Option<Identity>> {
        let form = request.form();
        let (Some(username), Some(password)) = (form.get(USERNAME_FIELD), form.get(PASSWORD_FIELD))
        else {
            debug!("token request without username or password");
            return Ok(None);
        };

        let (user, password_hash) = self.hash_for(username);
        let parsed = PasswordHash::new(password_hash)
            .map_err(|err| anyhow!("Stored password hash is unreadable: {err}"))?;
        let verified = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        let Some(user) = user.filter(|_| verified) else {
            return Ok(None);
        };

        let user_data = json!({ "roles": user.roles.len() }).to_string();
        Ok(Some(
            Identity::new()
                .with_authentication_type("password")
                .with_claim(NAME, username)
                .with_claim(USER_DATA, user_data),
        ))
    }
}

/// Adds one `role` claim per role configured for the authenticated user.
pub struct RoleAugmenter {
    store: Arc<CredentialStore>,
}

impl RoleAugmenter {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ClaimsAugmenter for RoleAugmenter {
    async fn augment(&self, _request: &TokenRequest, identity: &Identity) -> Result<Vec<Claim>> {
        let Some(name) = identity.find_first(NAME) else {
            return Ok(Vec::new());
        };
        let roles = self.store.roles(&name.value).unwrap_or_default();
        Ok(roles.iter().map(|role| Claim::new(ROLE, role.clone())).collect())
    }
}
