//! Session identity decoded from the backend's bearer credential.
//!
//! The backend signs its tokens with a key the client never sees, so the
//! signature is not checked here. The decoded claims only decide which
//! endpoint a scan goes to; the server still authorizes every request.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::error::IdentityError;
use crate::types::{Role, UserId};

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    uid: Option<i64>,
    role: Option<String>,
    exp: Option<i64>,
}

/// Who is operating the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub username: String,
    pub user_id: UserId,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
    bearer: String,
}

impl SessionIdentity {
    /// Decode the claims of a `header.payload.signature` token.
    pub fn from_bearer(token: &str) -> Result<Self, IdentityError> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);

        let mut segments = token.split('.');
        let payload = match (segments.next(), segments.next(), segments.next()) {
            (Some(_), Some(payload), Some(_)) if segments.next().is_none() => payload,
            _ => return Err(IdentityError::Malformed),
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| IdentityError::Encoding)?;
        let claims: Claims = serde_json::from_slice(&bytes)
            .map_err(|e| IdentityError::Payload(e.to_string()))?;

        let username = claims.sub.ok_or(IdentityError::MissingClaim("sub"))?;
        let user_id = claims.uid.ok_or(IdentityError::MissingClaim("uid"))?;
        let raw_role = claims.role.ok_or(IdentityError::MissingClaim("role"))?;
        let role =
            Role::parse(&raw_role).ok_or(IdentityError::UnknownRole(raw_role))?;
        let expires_at = claims
            .exp
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());

        Ok(Self {
            username,
            user_id: UserId(user_id),
            role,
            expires_at,
            bearer: token.to_string(),
        })
    }

    /// The raw credential, without the `Bearer ` prefix.
    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_backend_claims() {
        let token = encode_test_token(&json!({
            "sub": "alice",
            "uid": 2,
            "role": "student",
            "exp": 4_102_444_800i64,
        }));

        let identity = SessionIdentity::from_bearer(&token).unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.user_id, UserId(2));
        assert_eq!(identity.role, Role::Student);
        assert!(!identity.is_expired(Utc::now()));
        assert_eq!(identity.bearer(), token);
    }

    #[test]
    fn accepts_bearer_prefix() {
        let token = encode_test_token(&json!({"sub": "t", "uid": 1, "role": "teacher"}));
        let identity =
            SessionIdentity::from_bearer(&format!("Bearer {token}")).unwrap();
        assert_eq!(identity.role, Role::Teacher);
        assert_eq!(identity.expires_at, None);
    }

    #[test]
    fn expired_token_is_reported() {
        let token = encode_test_token(&json!({
            "sub": "t", "uid": 1, "role": "teacher", "exp": 1_000
        }));
        let identity = SessionIdentity::from_bearer(&token).unwrap();
        assert!(identity.is_expired(Utc::now()));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(
            SessionIdentity::from_bearer("not-a-jwt"),
            Err(IdentityError::Malformed)
        );
        assert_eq!(
            SessionIdentity::from_bearer("a.b.c.d"),
            Err(IdentityError::Malformed)
        );
        assert_eq!(
            SessionIdentity::from_bearer("a.!!!.c"),
            Err(IdentityError::Encoding)
        );
    }

    #[test]
    fn rejects_missing_claims_and_unknown_roles() {
        let no_uid = encode_test_token(&json!({"sub": "x", "role": "student"}));
        assert_eq!(
            SessionIdentity::from_bearer(&no_uid),
            Err(IdentityError::MissingClaim("uid"))
        );

        let admin = encode_test_token(&json!({"sub": "x", "uid": 1, "role": "admin"}));
        assert_eq!(
            SessionIdentity::from_bearer(&admin),
            Err(IdentityError::UnknownRole("admin".into()))
        );
    }
}
