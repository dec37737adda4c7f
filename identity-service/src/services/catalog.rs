//! Message catalog collaborator.
//!
//! Localizes final user-facing strings only; it never influences control flow
//! or error classification. The product catalog is an external service; the
//! built-in English table keeps the core usable on its own.

pub trait MessageCatalog: Send + Sync {
    fn translate(&self, key: &str, locale: &str) -> String;
}

/// English-only fallback catalog. Unknown keys pass through unchanged so a
/// missing entry is visible instead of silent.
pub struct StaticCatalog;

impl MessageCatalog for StaticCatalog {
    fn translate(&self, key: &str, _locale: &str) -> String {
        match key {
            "auth.sign_up.welcome" => "Account created. Check your inbox to verify your address.",
            "auth.verify_account.done" => "Account verified.",
            "auth.phone.verified" => "Phone number verified.",
            "auth.phone.removed" => "Phone number removed.",
            "error.sign_in" => "Incorrect user name or password.",
            "error.too_many_attempts" => {
                "Too many failed sign-in attempts. Reset your password to continue."
            }
            "error.username_taken" => "That user name is already in use.",
            "error.password_confirm" => "Passwords do not match.",
            "error.weak_password" => "Password does not meet the strength policy.",
            "error.code_malformed" => "The verification code must be six digits.",
            "error.code_mismatch" => "That verification code is not valid.",
            "error.verify_account" => "Unable to verify the account.",
            "error.invalid_token" => "Invalid or expired token.",
            "error.authentication_required" => "Sign in to continue.",
            "error.forbidden" => "You do not have permission to do that.",
            "error.invalid_input" => "Invalid input.",
            "error.operation_failed" => "Unable to complete the request, please try again.",
            other => other,
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_key_translates() {
        let catalog = StaticCatalog;
        assert_eq!(
            catalog.translate("error.sign_in", "en"),
            "Incorrect user name or password."
        );
    }

    #[test]
    fn test_unknown_key_passes_through() {
        let catalog = StaticCatalog;
        assert_eq!(catalog.translate("error.mystery", "en"), "error.mystery");
    }
}
