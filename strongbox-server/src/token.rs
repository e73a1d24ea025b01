//! Signed session tokens.
//!
//! Auth tokens carry the user id, refresh tokens carry the session id.
//! Both are HS256 JWTs with a random `jti`, so two tokens minted in the
//! same second still differ.

use crate::error::ServerError;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Auth,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub typ: TokenType,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    auth_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], auth_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            auth_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    pub fn issue(&self, typ: TokenType, subject: Uuid) -> Result<String, ServerError> {
        let now = Utc::now().timestamp();
        let ttl = match typ {
            TokenType::Auth => self.auth_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        let claims = Claims {
            sub: subject.to_string(),
            typ,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServerError::Internal(format!("token signing failed: {}", e)))
    }

    /// Verify signature, expiry and type, returning the subject.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Uuid, ServerError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => ServerError::TokenExpired,
                _ => ServerError::InvalidToken(e.to_string()),
            }
        })?;

        if data.claims.typ != expected {
            return Err(ServerError::InvalidToken("wrong token type".to_string()));
        }
        Uuid::parse_str(&data.claims.sub)
            .map_err(|_| ServerError::InvalidToken("malformed subject".to_string()))
    }
}
