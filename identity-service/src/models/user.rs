//! User model - the identity record at the heart of the credential core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery policy for the second sign-in factor.
///
/// `Phone` requires `phone_verified` and stored phone details; `Email`
/// requires `email_verified`. Enforced by the mutations that change it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TfaMethod {
    #[default]
    None,
    Email,
    Phone,
}

impl TfaMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TfaMethod::None => "none",
            TfaMethod::Email => "email",
            TfaMethod::Phone => "phone",
        }
    }

    /// Name surfaced to clients in challenge payloads. Phone delivery is
    /// presented as "text"; the persisted state stays `phone`.
    pub fn client_name(&self) -> &'static str {
        match self {
            TfaMethod::None => "none",
            TfaMethod::Email => "email",
            TfaMethod::Phone => "text",
        }
    }
}

/// Encrypted phone details. The number is never stored in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPhone {
    /// Cipher identifier, e.g. "aes-256-gcm".
    pub cipher: String,
    /// Base64 nonce, fresh per encryption.
    pub nonce: String,
    /// Base64 ciphertext of the E.164 number.
    pub number: String,
}

/// Pending two-factor code: keyed digest of the six-digit code plus expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCode {
    pub digest: String,
    pub expiry_utc: DateTime<Utc>,
}

impl PendingCode {
    pub fn is_expired(&self) -> bool {
        self.expiry_utc < Utc::now()
    }
}

/// User entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_key: Uuid,
    /// Login identifier, unique, stored lowercase.
    pub username: String,
    pub display_name: String,
    pub password_hash: String,
    pub preferred_language: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub tfa_method: TfaMethod,
    pub phone: Option<EncryptedPhone>,
    /// Consecutive failed sign-in attempts since the last success.
    pub failed_attempts: u32,
    pub tfa_code: Option<PendingCode>,
    /// Identifier the current refresh token must carry; rotated on every
    /// sign-in and refresh.
    pub refresh_session: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user with a freshly generated key. Verification flags
    /// start false and the two-factor method starts at `none`.
    pub fn new(
        username: String,
        display_name: String,
        password_hash: String,
        preferred_language: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_key: Uuid::new_v4(),
            username,
            display_name,
            password_hash,
            preferred_language,
            email_verified: false,
            phone_verified: false,
            tfa_method: TfaMethod::None,
            phone: None,
            failed_attempts: 0,
            tfa_code: None,
            refresh_session: None,
            created_utc: now,
            updated_utc: now,
        }
    }

    /// Whether further credential checks must be refused.
    pub fn is_locked(&self, lockout_threshold: u32) -> bool {
        self.failed_attempts >= lockout_threshold
    }

    /// Convert to the public projection (no sensitive fields).
    pub fn sanitized(&self) -> SanitizedUser {
        SanitizedUser {
            user_key: self.user_key,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            preferred_language: self.preferred_language.clone(),
            email_verified: self.email_verified,
            phone_verified: self.phone_verified,
            tfa_method: self.tfa_method,
            created_utc: self.created_utc,
        }
    }
}

/// User projection for API responses (no hash, counters, or phone details).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizedUser {
    pub user_key: Uuid,
    pub username: String,
    pub display_name: String,
    pub preferred_language: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub tfa_method: TfaMethod,
    pub created_utc: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(
            "ada".to_string(),
            "Ada Lovelace".to_string(),
            "$argon2id$stub".to_string(),
            "en".to_string(),
        )
    }

    #[test]
    fn test_new_user_defaults() {
        let user = sample_user();
        assert_eq!(user.failed_attempts, 0);
        assert!(!user.email_verified);
        assert!(!user.phone_verified);
        assert_eq!(user.tfa_method, TfaMethod::None);
        assert!(user.phone.is_none());
        assert!(user.refresh_session.is_none());
    }

    #[test]
    fn test_lockout_boundary() {
        let mut user = sample_user();
        user.failed_attempts = 14;
        assert!(!user.is_locked(15));
        user.failed_attempts = 15;
        assert!(user.is_locked(15));
    }

    #[test]
    fn test_phone_method_presents_as_text() {
        assert_eq!(TfaMethod::Phone.client_name(), "text");
        assert_eq!(TfaMethod::Phone.as_str(), "phone");
    }

    #[test]
    fn test_sanitized_drops_credentials() {
        let user = sample_user();
        let json = serde_json::to_string(&user.sanitized()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("failed_attempts"));
        assert!(!json.contains("refresh_session"));
    }
}
