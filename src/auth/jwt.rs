use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::database::models::Role;

/// Which half of a session pair a token is. Each kind is signed with its own key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn purpose(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    /// Unique per mint so two tokens issued in the same second never collide
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JwtError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("JWT generation error: {0}")]
    Signing(String),
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn derive(secret: &str, kind: TokenKind, ttl: Duration) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        hasher.update(b":");
        hasher.update(kind.purpose().as_bytes());
        let derived = hasher.finalize();

        Self {
            encoding: EncodingKey::from_secret(&derived),
            decoding: DecodingKey::from_secret(&derived),
            ttl,
        }
    }
}

/// Signing keys for both token kinds, derived from one configured secret
pub struct TokenKeys {
    access: KeyPair,
    refresh: KeyPair,
}

impl TokenKeys {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        Self {
            access: KeyPair::derive(secret, TokenKind::Access, access_ttl),
            refresh: KeyPair::derive(secret, TokenKind::Refresh, refresh_ttl),
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(
            &security.jwt_secret,
            Duration::minutes(security.access_token_ttl_minutes),
            Duration::days(security.refresh_token_ttl_days),
        )
    }

    fn pair(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn sign(&self, kind: TokenKind, user_id: Uuid, role: Role) -> Result<String, JwtError> {
        let keys = self.pair(kind);
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            role,
            jti: Uuid::new_v4(),
            exp: (now + keys.ttl).timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &keys.encoding).map_err(|e| JwtError::Signing(e.to_string()))
    }

    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<Claims>(token, &self.pair(kind).decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid,
            })
    }
}

/// Ledger key for a token; the raw token is never stored
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
