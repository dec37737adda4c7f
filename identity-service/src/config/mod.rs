use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

/// Development-only defaults; production requires every secret to be set.
const DEV_TOKEN_SECRET: &str = "dev-token-secret-0123456789abcdef";
const DEV_CODE_SECRET: &str = "dev-code-secret-0123456789abcdef";
const DEV_PHONE_KEY_HEX: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub token: TokenConfig,
    pub security: SecurityConfig,
    pub password: PasswordPolicyConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// HS256 server secret shared by all replicas.
    pub secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub challenge_ttl_minutes: i64,
    pub verification_ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Failed sign-in attempts after which credential checks are refused.
    pub lockout_threshold: u32,
    /// 32-byte AES key for stored phone numbers, hex-encoded.
    pub phone_key_hex: String,
    /// Keyed-hash secret for two-factor codes.
    pub code_secret: String,
}

#[derive(Debug, Clone)]
pub struct PasswordPolicyConfig {
    pub min_length: u8,
    pub require_uppercase: bool,
    pub require_number: bool,
    pub require_special: bool,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common,
            environment,
            token: TokenConfig {
                secret: get_env("TOKEN_SECRET", Some(DEV_TOKEN_SECRET), is_prod)?,
                access_ttl_minutes: parse_env("ACCESS_TOKEN_TTL_MINUTES", "15", is_prod)?,
                refresh_ttl_days: parse_env("REFRESH_TOKEN_TTL_DAYS", "7", is_prod)?,
                challenge_ttl_minutes: parse_env("CHALLENGE_TTL_MINUTES", "5", is_prod)?,
                verification_ttl_hours: parse_env("VERIFICATION_TTL_HOURS", "24", is_prod)?,
            },
            security: SecurityConfig {
                lockout_threshold: parse_env("LOCKOUT_THRESHOLD", "15", is_prod)?,
                phone_key_hex: get_env("PHONE_CIPHER_KEY_HEX", Some(DEV_PHONE_KEY_HEX), is_prod)?,
                code_secret: get_env("TFA_CODE_SECRET", Some(DEV_CODE_SECRET), is_prod)?,
            },
            password: PasswordPolicyConfig {
                min_length: parse_env("PASSWORD_MIN_LENGTH", "8", is_prod)?,
                require_uppercase: parse_env("PASSWORD_REQUIRE_UPPERCASE", "true", is_prod)?,
                require_number: parse_env("PASSWORD_REQUIRE_NUMBER", "true", is_prod)?,
                require_special: parse_env("PASSWORD_REQUIRE_SPECIAL", "false", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.security.lockout_threshold == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LOCKOUT_THRESHOLD must be greater than 0"
            )));
        }

        if self.token.access_ttl_minutes <= 0
            || self.token.refresh_ttl_days <= 0
            || self.token.challenge_ttl_minutes <= 0
            || self.token.verification_ttl_hours <= 0
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "token TTLs must be positive"
            )));
        }

        let key = hex::decode(&self.security.phone_key_hex)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("PHONE_CIPHER_KEY_HEX: {e}")))?;
        if key.len() != 32 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PHONE_CIPHER_KEY_HEX must decode to 32 bytes"
            )));
        }

        if self.environment == Environment::Prod && self.token.secret.len() < 32 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TOKEN_SECRET must be at least 32 bytes in production"
            )));
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{key}: {e}")))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl AuthConfig {
    /// In-process defaults for tests: no environment involved.
    pub fn for_tests() -> Self {
        AuthConfig {
            common: core_config::Config {
                service_name: "identity-service".to_string(),
                log_level: "error".to_string(),
            },
            environment: Environment::Dev,
            token: TokenConfig {
                secret: DEV_TOKEN_SECRET.to_string(),
                access_ttl_minutes: 15,
                refresh_ttl_days: 7,
                challenge_ttl_minutes: 5,
                verification_ttl_hours: 24,
            },
            security: SecurityConfig {
                lockout_threshold: 15,
                phone_key_hex: DEV_PHONE_KEY_HEX.to_string(),
                code_secret: DEV_CODE_SECRET.to_string(),
            },
            password: PasswordPolicyConfig {
                min_length: 8,
                require_uppercase: true,
                require_number: true,
                require_special: false,
            },
        }
    }
}
