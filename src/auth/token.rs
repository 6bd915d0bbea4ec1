use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SecurityConfig, MAX_ACCESS_TOKEN_TTL_MINUTES, MAX_REFRESH_TOKEN_TTL_DAYS};
use crate::database::{Role, User};

/// Claims carried by an access token. Field names are part of the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub username: String,
    pub useremail: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a refresh token.
///
/// Unknown fields are refused so an access token, which carries the same
/// `userId`, cannot be replayed against the refresh endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    #[serde(rename = "userId")]
    pub user_id: i32,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token signature does not match")]
    BadSignature,

    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token could not be signed: {0}")]
    Signing(String),
}

impl TokenError {
    /// Every verification failure; callers answer these uniformly.
    pub fn is_invalid(&self) -> bool {
        !matches!(self, TokenError::Signing(_))
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Signs and verifies HS256 tokens with a single shared secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &SecurityConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl: Duration::minutes(bounded(
                config.access_token_ttl_minutes,
                MAX_ACCESS_TOKEN_TTL_MINUTES,
            )),
            refresh_ttl: Duration::days(bounded(
                config.refresh_token_ttl_days,
                MAX_REFRESH_TOKEN_TTL_DAYS,
            )),
        }
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            user_id: user.id,
            username: user.name.clone(),
            useremail: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: expiry(now, self.access_ttl)?,
        };
        self.sign(&claims)
    }

    pub fn issue_refresh_token(&self, user_id: i32) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            user_id,
            iat: now.timestamp(),
            exp: expiry(now, self.refresh_ttl)?,
        };
        self.sign(&claims)
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        self.verify(token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        self.verify(token)
    }

    pub(crate) fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        decode::<T>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let err = TokenError::from(e);
                tracing::debug!("Token rejected: {}", err);
                err
            })
    }
}

/// Clamp a configured TTL to its ceiling. `AppConfig::validate` refuses
/// anything larger, so this only matters for hand-built configs.
fn bounded(value: u64, max: u64) -> i64 {
    i64::try_from(value.min(max)).unwrap_or(0)
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<i64, TokenError> {
    now.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or_else(|| TokenError::Signing("token expiry out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn service_with_secret(secret: &str) -> TokenService {
        let mut security = AppConfig::development().security;
        security.jwt_secret = secret.to_string();
        TokenService::new(&security)
    }

    fn alice() -> User {
        User {
            id: 7,
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password_hash: "irrelevant".into(),
            role: Role::Admin,
        }
    }

    #[test]
    fn access_token_carries_user_identity() {
        let tokens = service_with_secret("k");
        let token = tokens.issue_access_token(&alice()).unwrap();
        let claims = tokens.verify_access(&token).unwrap();

        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "Alice");
        assert_eq!(claims.useremail, "alice@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn oversized_ttls_are_clamped_not_wrapped() {
        let mut security = AppConfig::development().security;
        security.access_token_ttl_minutes = u64::MAX;
        security.refresh_token_ttl_days = u64::MAX;
        let tokens = TokenService::new(&security);

        let access = tokens.issue_access_token(&alice()).unwrap();
        let claims = tokens.verify_access(&access).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_ACCESS_TOKEN_TTL_MINUTES as i64 * 60);

        let refresh = tokens.issue_refresh_token(7).unwrap();
        let claims = tokens.verify_refresh(&refresh).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_REFRESH_TOKEN_TTL_DAYS as i64 * 24 * 60 * 60);
    }

    #[test]
    fn refresh_token_lives_seven_days() {
        let tokens = service_with_secret("k");
        let token = tokens.issue_refresh_token(7).unwrap();
        let claims = tokens.verify_refresh(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn payload_uses_wire_field_names() {
        let tokens = service_with_secret("k");
        let token = tokens.issue_access_token(&alice()).unwrap();
        let claims: serde_json::Value = serde_json::to_value(tokens.verify_access(&token).unwrap()).unwrap();
        for key in ["userId", "username", "useremail", "role", "iat", "exp"] {
            assert!(claims.get(key).is_some(), "missing {key}");
        }
        assert_eq!(claims["role"], "ADMIN");
    }

    #[test]
    fn expired_token_is_rejected_without_leeway() {
        let tokens = service_with_secret("k");
        let now = Utc::now().timestamp();
        let token = tokens
            .sign(&RefreshClaims {
                user_id: 1,
                iat: now - 60,
                exp: now - 1,
            })
            .unwrap();
        assert!(matches!(tokens.verify_refresh(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let ours = service_with_secret("ours");
        let theirs = service_with_secret("theirs");
        let token = theirs.issue_access_token(&alice()).unwrap();
        assert!(matches!(ours.verify_access(&token), Err(TokenError::BadSignature)));
    }

    #[test]
    fn garbage_is_malformed() {
        let tokens = service_with_secret("k");
        let err = tokens.verify_access("not.a.jwt").unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
        assert!(err.is_invalid());
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let tokens = service_with_secret("k");
        let access = tokens.issue_access_token(&alice()).unwrap();
        let refresh = tokens.issue_refresh_token(7).unwrap();

        assert!(tokens.verify_refresh(&access).is_err());
        assert!(tokens.verify_access(&refresh).is_err());
    }
}
