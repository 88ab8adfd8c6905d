//! Credential and identity model.
//!
//! A [`Credential`] is the bearer token plus the identity it was issued
//! for. It is constructed either from a successful login response or by
//! deserializing a previously persisted record; both paths reject an empty
//! token, so a credential is always complete.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Server-assigned user identifier.
///
/// The login endpoint may return either an integer or a string id; both
/// are kept as-is so the value round-trips through persistence unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Numeric(id) => write!(f, "{id}"),
            UserId::Text(id) => f.write_str(id),
        }
    }
}

/// Who the current session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub email: String,
    /// Name shown in the navigation header ("Welcome, ...").
    #[serde(rename = "name")]
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Bearer token plus identity.
///
/// The token is private and redacted from `Debug` output so it can never
/// leak into logs by accident.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCredential")]
pub struct Credential {
    token: String,
    identity: Identity,
}

/// Unvalidated shape used while deserializing a persisted credential.
#[derive(Deserialize)]
struct RawCredential {
    token: String,
    identity: Identity,
}

impl TryFrom<RawCredential> for Credential {
    type Error = CoreError;

    fn try_from(raw: RawCredential) -> Result<Self, Self::Error> {
        Credential::new(raw.token, raw.identity)
    }
}

impl Credential {
    /// Build a credential, rejecting blank tokens.
    pub fn new(token: impl Into<String>, identity: Identity) -> Result<Self, CoreError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CoreError::Validation(
                "credential token must not be empty".to_string(),
            ));
        }
        Ok(Self { token, identity })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Login response
// ---------------------------------------------------------------------------

/// Body returned by `POST /login` on success.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: UserId,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl LoginResponse {
    pub fn into_credential(self) -> Result<Credential, CoreError> {
        Credential::new(
            self.access_token,
            Identity {
                id: self.user_id,
                email: self.email,
                display_name: self.name,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn identity() -> Identity {
        Identity {
            id: UserId::Numeric(7),
            email: "buyer@example.com".into(),
            display_name: "Buyer".into(),
        }
    }

    #[test]
    fn blank_token_is_rejected() {
        assert_matches!(
            Credential::new("   ", identity()),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn bearer_header_value() {
        let cred = Credential::new("abc", identity()).unwrap();
        assert_eq!(cred.bearer(), "Bearer abc");
    }

    #[test]
    fn debug_output_redacts_token() {
        let cred = Credential::new("super-secret", identity()).unwrap();
        let debug = format!("{cred:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn deserializing_empty_token_fails() {
        let json = serde_json::json!({
            "token": "",
            "identity": { "id": 1, "email": "a@b.c", "name": "A" }
        });
        assert!(serde_json::from_value::<Credential>(json).is_err());
    }

    #[test]
    fn persisted_shape_uses_name_key() {
        let cred = Credential::new("t", identity()).unwrap();
        let value = serde_json::to_value(&cred).unwrap();
        assert_eq!(value["identity"]["name"], "Buyer");
        assert_eq!(value["identity"]["id"], 7);
    }

    #[test]
    fn login_response_accepts_string_user_id() {
        let json = serde_json::json!({
            "access_token": "tok",
            "user_id": "u-42",
            "email": "x@y.z",
            "name": "X"
        });
        let resp: LoginResponse = serde_json::from_value(json).unwrap();
        let cred = resp.into_credential().unwrap();
        assert_eq!(cred.identity().id, UserId::Text("u-42".into()));
        assert_eq!(cred.identity().id.to_string(), "u-42");
    }
}
