//! Signed-token service.
//!
//! Tokens are HS256 over a server secret: verification is a pure function of
//! token plus secret, so no storage is involved and any replica can verify a
//! token issued by any other. The failure kind (malformed vs. expired vs.
//! signature) is kept for server-side logs; callers surface all of them to
//! clients as one generic invalid-token condition.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    /// Short-lived bearer credential driving caller resolution.
    Access,
    /// Long-lived credential tied to the user's refresh-session identifier.
    Refresh,
    /// Correlates a two-factor code submission to a user; grants nothing.
    Challenge,
    /// Correlates an out-of-band verification link to a user.
    Verification,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
            TokenPurpose::Challenge => "challenge",
            TokenPurpose::Verification => "verification",
        }
    }
}

/// Claims carried by every token this service issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject user key.
    pub sub: Uuid,
    pub purpose: TokenPurpose,
    /// Optional extra parameters, e.g. the refresh-session identifier.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, String>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token signature mismatch")]
    SignatureMismatch,
    #[error("token purpose mismatch")]
    WrongPurpose,
    #[error("failed to encode token: {0}")]
    Encode(String),
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Sign `sub` + `purpose` + `params` with the given time to live.
    pub fn issue(
        &self,
        sub: Uuid,
        purpose: TokenPurpose,
        params: HashMap<String, String>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub,
            purpose,
            params,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Check signature, expiry, and purpose.
    pub fn verify(&self, token: &str, expected: TokenPurpose) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data =
            decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    ErrorKind::InvalidSignature => TokenError::SignatureMismatch,
                    _ => TokenError::Malformed,
                }
            })?;

        if data.claims.purpose != expected {
            return Err(TokenError::WrongPurpose);
        }

        Ok(data.claims)
    }
}
