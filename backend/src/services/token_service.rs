use crate::error::ApiError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Hex user id.
    pub sub: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub email: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// Hex user id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies the access/refresh token pair. Access and refresh
/// tokens are signed over distinct secrets so one can never stand in for
/// the other.
#[derive(Clone)]
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_secs: i64,
        refresh_ttl_secs: i64,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl: Duration::seconds(access_ttl_secs),
            refresh_ttl: Duration::seconds(refresh_ttl_secs),
        }
    }

    pub fn issue_access(
        &self,
        user_id: ObjectId,
        user_name: &str,
        email: &str,
        full_name: &str,
    ) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: user_id.to_hex(),
            user_name: user_name.to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.access_encoding)
            .map_err(|e| ApiError::Internal(e.into()))
    }

    pub fn issue_refresh(&self, user_id: ObjectId) -> Result<String, ApiError> {
        let now = Utc::now();
        let claims = RefreshClaims {
            sub: user_id.to_hex(),
            iat: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.refresh_encoding)
            .map_err(|e| ApiError::Internal(e.into()))
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, ApiError> {
        decode::<AccessClaims>(
            token,
            &self.access_decoding,
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| ApiError::unauthorized("Invalid or expired access token"))
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        decode::<RefreshClaims>(
            token,
            &self.refresh_decoding,
            &Validation::new(Algorithm::HS256),
        )
        .map(|data| data.claims)
        .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("access-secret", "refresh-secret", 900, 864_000)
    }

    #[test]
    fn access_token_round_trips() {
        let svc = service();
        let id = ObjectId::new();
        let token = svc.issue_access(id, "alice", "a@example.com", "Alice").unwrap();
        let claims = svc.verify_access(&token).unwrap();
        assert_eq!(claims.sub, id.to_hex());
        assert_eq!(claims.user_name, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_round_trips() {
        let svc = service();
        let id = ObjectId::new();
        let token = svc.issue_refresh(id).unwrap();
        let claims = svc.verify_refresh(&token).unwrap();
        assert_eq!(claims.sub, id.to_hex());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = service();
        let token = svc.issue_refresh(ObjectId::new()).unwrap();
        // Corrupt one character inside the signature segment.
        let mut tampered = token.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });
        assert!(svc.verify_refresh(&tampered).is_err());
    }

    #[test]
    fn access_token_is_not_a_refresh_token() {
        let svc = service();
        let access = svc
            .issue_access(ObjectId::new(), "alice", "a@example.com", "Alice")
            .unwrap();
        assert!(svc.verify_refresh(&access).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        // A negative TTL puts exp well past the verifier's leeway.
        let svc = TokenService::new("access-secret", "refresh-secret", -120, -120);
        let token = svc.issue_access(ObjectId::new(), "a", "a@b.c", "A").unwrap();
        assert!(svc.verify_access(&token).is_err());
        let refresh = svc.issue_refresh(ObjectId::new()).unwrap();
        assert!(svc.verify_refresh(&refresh).is_err());
    }
}
