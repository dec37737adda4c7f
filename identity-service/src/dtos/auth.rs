//! Operation inputs and result payloads for the credential core.
//!
//! Derived `validator` rules cover input shape only; semantic checks
//! (password strength, uniqueness) live in the services.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::SanitizedUser;

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpInput {
    #[validate(length(min = 1, max = 128, message = "Display name is required"))]
    pub display_name: String,

    #[validate(length(min = 3, max = 64, message = "User name must be 3-64 characters"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    pub confirm_password: String,

    #[serde(default = "default_language")]
    pub preferred_language: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInInput {
    #[validate(length(min = 1, message = "User name is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteTfaInput {
    #[validate(length(min = 1, message = "Challenge token is required"))]
    pub challenge_token: String,

    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPhoneNumberInput {
    /// E.164 format (+1234567890); checked by the phone mutations.
    pub phone_number: String,
}

/// Tokens plus public user projection after a completed sign-in.
#[derive(Debug, Serialize)]
pub struct AuthResult {
    pub user: SanitizedUser,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Returned when a sign-in requires a second factor: the challenge token and
/// the delivery method name ("email" or "text"), never an access token.
#[derive(Debug, Serialize)]
pub struct TfaSignInResult {
    pub challenge_token: String,
    pub send_method: String,
}

/// Union returned by sign-in.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SignInOutcome {
    Authenticated(AuthResult),
    ChallengeRequired(TfaSignInResult),
}

#[derive(Debug, Serialize)]
pub struct SignUpResult {
    pub user: SanitizedUser,
    pub access_token: String,
    pub message: String,
}

/// Verification and phone mutations return the refreshed projection plus a
/// localized status line.
#[derive(Debug, Serialize)]
pub struct AccountUpdateResult {
    pub user: SanitizedUser,
    pub message: String,
}

/// Sign-out is stateless for this core; the transport layer is instructed to
/// expire the client-held refresh credential immediately.
#[derive(Debug, Serialize)]
pub struct SignOutResult {
    pub expire_refresh_credential: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_input_shape() {
        let input = SignUpInput {
            display_name: "Ada".to_string(),
            username: "ada".to_string(),
            password: "Str0ngEnough".to_string(),
            confirm_password: "Str0ngEnough".to_string(),
            preferred_language: "en".to_string(),
        };
        assert!(input.validate().is_ok());

        let bad = SignUpInput {
            display_name: String::new(),
            username: "a".to_string(),
            password: String::new(),
            confirm_password: String::new(),
            preferred_language: "en".to_string(),
        };
        assert!(bad.validate().is_err());
    }
}
