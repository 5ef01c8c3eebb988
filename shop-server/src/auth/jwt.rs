//! JWT codec
//!
//! HS256 tokens. Access and refresh tokens use separate secrets, so a token
//! of one kind never verifies as the other.

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shared::models::UserProfile;

/// Claims carried by an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(flatten)]
    pub user: UserProfile,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

/// Claims carried by a refresh token; `jti` keeps every token string unique
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    #[serde(flatten)]
    pub user: UserProfile,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Outcome of verifying a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenVerdict<C> {
    Valid(C),
    Expired,
    Invalid(String),
}

/// Signs and verifies tokens with one secret
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn sign<C: Serialize>(&self, claims: &C) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
    }

    pub fn verify<C: DeserializeOwned>(&self, token: &str) -> TokenVerdict<C> {
        match decode::<C>(token, &self.decoding_key, &self.validation) {
            Ok(data) => TokenVerdict::Valid(data.claims),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature => TokenVerdict::Expired,
                _ => TokenVerdict::Invalid(e.to_string()),
            },
        }
    }
}

impl AccessClaims {
    pub fn new(user: &UserProfile, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            user: user.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }
}

impl RefreshClaims {
    pub fn new(user: &UserProfile, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            user: user.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use shared::models::Role;

    fn profile() -> UserProfile {
        UserProfile {
            id: 42,
            name: "Jane".into(),
            email: "jane@example.com".into(),
            photo: None,
            role: Role::Customer,
        }
    }

    #[test]
    fn sign_and_verify() {
        let codec = TokenCodec::new("access-secret");
        let now = Utc::now();
        let claims = AccessClaims::new(&profile(), now, now + Duration::minutes(15));
        let token = codec.sign(&claims).unwrap();

        match codec.verify::<AccessClaims>(&token) {
            TokenVerdict::Valid(decoded) => assert_eq!(decoded.user, profile()),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[test]
    fn claims_are_flat() {
        let now = Utc::now();
        let claims = AccessClaims::new(&profile(), now, now);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["role"], "CUSTOMER");
        assert!(json.get("user").is_none());
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let codec = TokenCodec::new("access-secret");
        let now = Utc::now();
        let claims = AccessClaims::new(
            &profile(),
            now - Duration::hours(2),
            now - Duration::hours(1),
        );
        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify::<AccessClaims>(&token), TokenVerdict::Expired);
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let now = Utc::now();
        let claims = RefreshClaims::new(&profile(), now, now + Duration::days(7));
        let token = TokenCodec::new("refresh-secret").sign(&claims).unwrap();
        assert!(matches!(
            TokenCodec::new("access-secret").verify::<AccessClaims>(&token),
            TokenVerdict::Invalid(_)
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        let codec = TokenCodec::new("access-secret");
        assert!(matches!(
            codec.verify::<AccessClaims>("not.a.jwt"),
            TokenVerdict::Invalid(_)
        ));
    }

    #[test]
    fn refresh_tokens_are_unique() {
        let codec = TokenCodec::new("refresh-secret");
        let now = Utc::now();
        let exp = now + Duration::days(7);
        let a = codec.sign(&RefreshClaims::new(&profile(), now, exp)).unwrap();
        let b = codec.sign(&RefreshClaims::new(&profile(), now, exp)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }
}
