//! Claims, the authenticated identity, and the ordered claim set written into a token.

use serde::{Deserialize, Serialize};
use serde_json::map::Entry;
use serde_json::{Map, Value};
use tracing::warn;

pub const JTI: &str = "jti";
pub const SUB: &str = "sub";
pub const ISS: &str = "iss";
pub const AUD: &str = "aud";
pub const EXP: &str = "exp";
pub const NBF: &str = "nbf";
pub const IAT: &str = "iat";
pub const NAME: &str = "name";
pub const ROLE: &str = "role";

/// Claim types the issuer writes itself; provider or augmenter claims of these types are skipped.
pub const RESERVED_CLAIMS: &[&str] = &[JTI, ISS, AUD, EXP, NBF, IAT];

fn is_reserved(claim: &Claim) -> bool {
    if RESERVED_CLAIMS.contains(&claim.claim_type.as_str()) {
        warn!(claim_type = %claim.claim_type, "skipping reserved claim type supplied by claims source");
        return true;
    }
    false
}

/// A typed key/value assertion about an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }

    pub fn is_type(&self, claim_type: &str) -> bool {
        self.claim_type == claim_type
    }
}

/// Authenticated principal produced by a claims provider. Lives for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    authentication_type: Option<String>,
    claims: Vec<Claim>,
}

impl Identity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label describing how the principal was authenticated (e.g. "password"). Not written to tokens.
    pub fn with_authentication_type(mut self, value: impl Into<String>) -> Self {
        self.authentication_type = Some(value.into());
        self
    }

    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Claim::new(claim_type, value));
        self
    }

    pub fn push(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    pub fn authentication_type(&self) -> Option<&str> {
        self.authentication_type.as_deref()
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }

    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|claim| claim.is_type(claim_type))
    }

    pub fn find_all<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a Claim> + 'a {
        self.claims.iter().filter(move |claim| claim.is_type(claim_type))
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl FromIterator<Claim> for Identity {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self {
            authentication_type: None,
            claims: iter.into_iter().collect(),
        }
    }
}

/// Registered claims stamped by the issuer after the assembled claims.
#[derive(Debug, Clone, Copy)]
pub struct RegisteredClaims<'a> {
    pub issuer: Option<&'a str>,
    pub audience: Option<&'a str>,
    pub not_before: i64,
    pub expires_at: i64,
    pub issued_at: i64,
}

/// Claims of one token in their fixed order: token id, subject, identity, augmenter.
/// Reserved types from the identity or augmenter are dropped on assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimSet {
    claims: Vec<Claim>,
}

impl ClaimSet {
    pub fn assemble(
        token_id: &str,
        subject: Option<&str>,
        identity: &Identity,
        augmented: Vec<Claim>,
    ) -> Self {
        let mut claims = Vec::with_capacity(2 + identity.len() + augmented.len());
        claims.push(Claim::new(JTI, token_id));
        if let Some(subject) = subject.filter(|value| !value.is_empty()) {
            claims.push(Claim::new(SUB, subject));
        }
        claims.extend(identity.iter().filter(|claim| !is_reserved(claim)).cloned());
        claims.extend(augmented.into_iter().filter(|claim| !is_reserved(claim)));
        Self { claims }
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter_type<'a>(&'a self, claim_type: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.claims
            .iter()
            .filter(move |claim| claim.is_type(claim_type))
            .map(|claim| claim.value.as_str())
    }

    /// Render the JSON payload. A type seen once is a string, a repeated type an array in claim order.
    pub fn to_payload(&self, registered: RegisteredClaims<'_>) -> Map<String, Value> {
        let mut payload = Map::new();
        for claim in &self.claims {
            let value = Value::String(claim.value.clone());
            match payload.entry(claim.claim_type.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => match slot.get_mut() {
                    Value::Array(values) => values.push(value),
                    existing => {
                        let first = existing.take();
                        *existing = Value::Array(vec![first, value]);
                    }
                },
            }
        }

        if let Some(issuer) = registered.issuer {
            payload.insert(ISS.to_string(), Value::from(issuer));
        }
        if let Some(audience) = registered.audience {
            payload.insert(AUD.to_string(), Value::from(audience));
        }
        payload.insert(NBF.to_string(), Value::from(registered.not_before));
        payload.insert(EXP.to_string(), Value::from(registered.expires_at));
        payload.insert(IAT.to_string(), Value::from(registered.issued_at));
        payload
    }
}

impl<'a> IntoIterator for &'a ClaimSet {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.iter()
    }
}
