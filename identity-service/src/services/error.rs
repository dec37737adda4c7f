//! Error taxonomy for the identity core.
//!
//! Two tiers share one enum: domain errors are returned as data with a
//! numeric code and a message-catalog key; system failures are collapsed into
//! [`ServiceError::OperationFailed`] at the operation boundary after the real
//! cause has been logged. Diagnostic detail never reaches a client.

use service_core::error::AppError;
use thiserror::Error;

use super::catalog::MessageCatalog;
use super::policy::PolicyError;

#[derive(Debug, Error)]
pub enum ServiceError {
    // Domain tier: returned as data.
    #[error("sign in failed")]
    SignInFailed,

    #[error("too many failed sign-in attempts")]
    TooManyAttempts,

    #[error("user name already in use")]
    UsernameTaken,

    #[error("passwords do not match")]
    PasswordConfirmMismatch,

    #[error("password does not meet the strength policy")]
    WeakPassword(#[source] PolicyError),

    #[error("verification code must be six digits")]
    CodeMalformed,

    #[error("verification code does not match")]
    CodeMismatch,

    #[error("account verification failed")]
    VerifyAccountFailed,

    #[error("invalid token")]
    InvalidToken,

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // System tier: one generic failure per operation, cause already logged.
    #[error("unable to {operation}, please try again")]
    OperationFailed { operation: &'static str },
}

impl ServiceError {
    /// Numeric code carried by the error payload: 400 bad input/state,
    /// 401 locked or unauthenticated, 403 forbidden, 500 system failure.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::SignInFailed
            | ServiceError::UsernameTaken
            | ServiceError::PasswordConfirmMismatch
            | ServiceError::WeakPassword(_)
            | ServiceError::CodeMalformed
            | ServiceError::CodeMismatch
            | ServiceError::VerifyAccountFailed
            | ServiceError::InvalidToken
            | ServiceError::InvalidInput(_) => 400,
            ServiceError::TooManyAttempts | ServiceError::AuthenticationRequired => 401,
            ServiceError::Forbidden => 403,
            ServiceError::OperationFailed { .. } => 500,
        }
    }

    pub fn message_key(&self) -> &'static str {
        match self {
            ServiceError::SignInFailed => "error.sign_in",
            ServiceError::TooManyAttempts => "error.too_many_attempts",
            ServiceError::UsernameTaken => "error.username_taken",
            ServiceError::PasswordConfirmMismatch => "error.password_confirm",
            ServiceError::WeakPassword(_) => "error.weak_password",
            ServiceError::CodeMalformed => "error.code_malformed",
            ServiceError::CodeMismatch => "error.code_mismatch",
            ServiceError::VerifyAccountFailed => "error.verify_account",
            ServiceError::InvalidToken => "error.invalid_token",
            ServiceError::AuthenticationRequired => "error.authentication_required",
            ServiceError::Forbidden => "error.forbidden",
            ServiceError::InvalidInput(_) => "error.invalid_input",
            ServiceError::OperationFailed { .. } => "error.operation_failed",
        }
    }

    /// Localized client-facing description.
    pub fn describe(&self, catalog: &dyn MessageCatalog, locale: &str) -> String {
        catalog.translate(self.message_key(), locale)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::SignInFailed
            | ServiceError::UsernameTaken
            | ServiceError::PasswordConfirmMismatch
            | ServiceError::WeakPassword(_)
            | ServiceError::CodeMalformed
            | ServiceError::CodeMismatch
            | ServiceError::VerifyAccountFailed
            | ServiceError::InvalidToken => AppError::BadRequest(anyhow::anyhow!("{err}")),
            ServiceError::InvalidInput(detail) => AppError::BadRequest(anyhow::anyhow!(detail)),
            ServiceError::TooManyAttempts => {
                AppError::Unauthorized(anyhow::anyhow!("too many failed sign-in attempts"))
            }
            ServiceError::AuthenticationRequired => {
                AppError::AuthError(anyhow::anyhow!("authentication required"))
            }
            ServiceError::Forbidden => AppError::Forbidden(anyhow::anyhow!("forbidden")),
            ServiceError::OperationFailed { operation } => {
                AppError::InternalError(anyhow::anyhow!("unable to {operation}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::StaticCatalog;

    #[test]
    fn test_status_codes_follow_the_taxonomy() {
        assert_eq!(ServiceError::SignInFailed.status_code(), 400);
        assert_eq!(ServiceError::TooManyAttempts.status_code(), 401);
        assert_eq!(ServiceError::Forbidden.status_code(), 403);
        assert_eq!(
            ServiceError::OperationFailed { operation: "sign in" }.status_code(),
            500
        );
    }

    #[test]
    fn test_describe_localizes_without_leaking_detail() {
        let message = ServiceError::SignInFailed.describe(&StaticCatalog, "en");
        assert_eq!(message, "Incorrect user name or password.");
    }

    #[test]
    fn test_unknown_user_and_bad_password_share_a_message() {
        // Both branches surface the same SignInFailed variant, so a client
        // cannot probe which user names exist.
        let a = ServiceError::SignInFailed.describe(&StaticCatalog, "en");
        let b = ServiceError::SignInFailed.describe(&StaticCatalog, "en");
        assert_eq!(a, b);
    }
}
