use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Application-focused representation of verified JWT claims.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub token_id: Option<String>,
    pub subject: Option<String>,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    pub audience: Vec<String>,
    pub raw: serde_json::Value,
}

impl Claims {
    /// Convenience helper for role checks.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|value| value == role)
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    #[serde(default)]
    jti: Option<OneOrMany>,
    #[serde(default)]
    sub: Option<OneOrMany>,
    #[serde(default)]
    name: Option<OneOrMany>,
    #[serde(default)]
    role: Option<OneOrMany>,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<OneOrMany>,
}

/// Repeated claim types arrive as arrays, single ones as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Single(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// First value of a repeated claim.
    fn into_first(value: Option<Self>) -> Option<String> {
        Self::into_vec(value).into_iter().next()
    }

    fn into_vec(value: Option<Self>) -> Vec<String> {
        match value {
            Some(OneOrMany::Single(item)) => vec![item],
            Some(OneOrMany::Many(items)) => items,
            None => Vec::new(),
        }
    }
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            token_id: OneOrMany::into_first(value.jti),
            subject: OneOrMany::into_first(value.sub),
            name: OneOrMany::into_first(value.name),
            roles: OneOrMany::into_vec(value.role),
            expires_at,
            issued_at,
            issuer: value.iss,
            audience: OneOrMany::into_vec(value.aud),
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        let mut claims = Claims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_and_audience_accept_string_or_array() {
        let claims = Claims::try_from(json!({
            "jti": "abc",
            "name": "test",
            "role": ["admin", "cashier"],
            "aud": "peanut-api",
            "exp": 4_102_444_800_i64
        }))
        .expect("claims");
        assert_eq!(claims.token_id.as_deref(), Some("abc"));
        assert_eq!(claims.roles, vec!["admin", "cashier"]);
        assert_eq!(claims.audience, vec!["peanut-api"]);
        assert!(claims.has_role("cashier"));
        assert!(claims.issuer.is_none());
        assert_eq!(claims.raw["name"], "test");

        let single = Claims::try_from(json!({ "role": "admin", "exp": 4_102_444_800_i64 }))
            .expect("claims");
        assert_eq!(single.roles, vec!["admin"]);
    }

    #[test]
    fn repeated_subject_and_name_resolve_to_first_value() {
        let claims = Claims::try_from(json!({
            "jti": "a",
            "sub": ["pos-terminal", "provider-sub"],
            "name": ["test", "alias"],
            "exp": 4_102_444_800_i64
        }))
        .expect("claims");
        assert_eq!(claims.subject.as_deref(), Some("pos-terminal"));
        assert_eq!(claims.name.as_deref(), Some("test"));
        assert_eq!(claims.raw["name"], json!(["test", "alias"]));
    }

    #[test]
    fn missing_exp_is_rejected() {
        let err = Claims::try_from(json!({ "name": "test" })).expect_err("exp required");
        assert!(matches!(err, AuthError::InvalidJson(_)));
    }
}
