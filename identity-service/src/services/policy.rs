//! Password strength policy.
//!
//! Checked before any hashing happens; a violation is fatal to the request
//! and never retried.

use thiserror::Error;

use crate::config::PasswordPolicyConfig;

#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    #[error("Password must be at least {min_length} characters (got {actual_length})")]
    TooShort {
        min_length: u8,
        actual_length: usize,
    },
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one number")]
    MissingNumber,
    #[error("Password must contain at least one special character")]
    MissingSpecial,
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    min_length: u8,
    require_uppercase: bool,
    require_number: bool,
    require_special: bool,
}

impl PasswordPolicy {
    pub fn new(config: &PasswordPolicyConfig) -> Self {
        Self {
            min_length: config.min_length,
            require_uppercase: config.require_uppercase,
            require_number: config.require_number,
            require_special: config.require_special,
        }
    }

    /// Returns the first policy violation found, or Ok(()) when the password
    /// meets all requirements.
    pub fn validate(&self, password: &str) -> Result<(), PolicyError> {
        if password.chars().count() < self.min_length as usize {
            return Err(PolicyError::TooShort {
                min_length: self.min_length,
                actual_length: password.chars().count(),
            });
        }

        if self.require_uppercase && !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PolicyError::MissingUppercase);
        }

        if self.require_number && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PolicyError::MissingNumber);
        }

        if self.require_special && !password.chars().any(|c| c.is_ascii_punctuation()) {
            return Err(PolicyError::MissingSpecial);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict_policy() -> PasswordPolicy {
        PasswordPolicy {
            min_length: 12,
            require_uppercase: true,
            require_number: true,
            require_special: true,
        }
    }

    fn lenient_policy() -> PasswordPolicy {
        PasswordPolicy {
            min_length: 1,
            require_uppercase: false,
            require_number: false,
            require_special: false,
        }
    }

    #[test]
    fn test_password_too_short() {
        let result = strict_policy().validate("Short1!");
        assert!(matches!(result, Err(PolicyError::TooShort { .. })));
    }

    #[test]
    fn test_password_missing_uppercase() {
        let result = strict_policy().validate("longenoughpassword1!");
        assert!(matches!(result, Err(PolicyError::MissingUppercase)));
    }

    #[test]
    fn test_password_missing_number() {
        let result = strict_policy().validate("LongEnoughPassword!");
        assert!(matches!(result, Err(PolicyError::MissingNumber)));
    }

    #[test]
    fn test_password_missing_special() {
        let result = strict_policy().validate("LongEnoughPassword1");
        assert!(matches!(result, Err(PolicyError::MissingSpecial)));
    }

    #[test]
    fn test_valid_password_strict() {
        assert!(strict_policy().validate("LongEnoughP@ss1").is_ok());
    }

    #[test]
    fn test_valid_password_lenient() {
        assert!(lenient_policy().validate("simple").is_ok());
    }
}
