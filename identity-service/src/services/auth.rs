//! Credential & session manager.
//!
//! Orchestrates sign-up, sign-in, lockout accounting, two-factor hand-off,
//! token rotation, and the account/phone verification mutations. All
//! multi-write consistency goes through the transactional upsert protocol;
//! this service holds no mutable state of its own.

use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use service_core::error::AppError;

use crate::config::AuthConfig;
use crate::db::{run_upsert, IdentityStore, StoreError, UserPatch, WriteOp};
use crate::dtos::auth::{
    AccountUpdateResult, AuthResult, CompleteTfaInput, SetPhoneNumberInput, SignInInput,
    SignInOutcome, SignOutResult, SignUpInput, SignUpResult, TfaSignInResult,
};
use crate::models::{TfaMethod, User};
use crate::utils::{CredentialHasher, Password, PasswordHashString, PhoneCipher};

use super::catalog::MessageCatalog;
use super::challenge::{ChallengeCoordinator, ChallengeDelivery, ChallengeKind};
use super::error::ServiceError;
use super::notify::{NotificationDispatcher, VerificationEmail};
use super::policy::PasswordPolicy;
use super::security_events::{SecurityEvent, SecurityEventSink};
use super::token::{TokenPurpose, TokenService};

pub struct AuthService {
    store: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: TokenService,
    challenges: ChallengeCoordinator,
    notify: Arc<dyn NotificationDispatcher>,
    catalog: Arc<dyn MessageCatalog>,
    events: Arc<dyn SecurityEventSink>,
    password_policy: PasswordPolicy,
    phone_cipher: PhoneCipher,
    lockout_threshold: u32,
    access_ttl: Duration,
    refresh_ttl: Duration,
    verification_ttl: Duration,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: TokenService,
        challenges: ChallengeCoordinator,
        notify: Arc<dyn NotificationDispatcher>,
        catalog: Arc<dyn MessageCatalog>,
        events: Arc<dyn SecurityEventSink>,
        config: &AuthConfig,
    ) -> Result<Self, AppError> {
        let phone_cipher = PhoneCipher::from_hex(&config.security.phone_key_hex)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("phone cipher key: {e}")))?;

        Ok(Self {
            store,
            hasher,
            tokens,
            challenges,
            notify,
            catalog,
            events,
            password_policy: PasswordPolicy::new(&config.password),
            phone_cipher,
            lockout_threshold: config.security.lockout_threshold,
            access_ttl: Duration::minutes(config.token.access_ttl_minutes),
            refresh_ttl: Duration::days(config.token.refresh_ttl_days),
            verification_ttl: Duration::hours(config.token.verification_ttl_hours),
        })
    }

    // ==================== Sign-up ====================

    pub async fn sign_up(&self, input: SignUpInput) -> Result<SignUpResult, ServiceError> {
        input
            .validate()
            .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;

        self.password_policy
            .validate(&input.password)
            .map_err(ServiceError::WeakPassword)?;

        if input.password != input.confirm_password {
            return Err(ServiceError::PasswordConfirmMismatch);
        }

        let username = normalize_username(&input.username);
        if self
            .store
            .find_user_by_username(&username)
            .await
            .map_err(|e| self.store_failed("sign up", e))?
            .is_some()
        {
            return Err(ServiceError::UsernameTaken);
        }

        let password_hash = self.hash_password_blocking(Password::new(input.password)).await?;

        let user = User::new(
            username,
            input.display_name,
            password_hash.into_string(),
            input.preferred_language,
        );
        let user_key = user.user_key;

        run_upsert(
            self.store.as_ref(),
            user_key,
            "auth.sign_up",
            vec![WriteOp::InsertUser(user)],
        )
        .await
        .map_err(|_| ServiceError::OperationFailed { operation: "sign up" })?;

        // Re-read the created record to pick up store-generated fields; a
        // failure here is its own diagnostic, downgraded to the same generic
        // sign-up error.
        let user = match self.store.find_user_by_key(user_key).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::error!(user_key = %user_key, "sign-up re-read found no record");
                return Err(ServiceError::OperationFailed { operation: "sign up" });
            }
            Err(e) => {
                tracing::error!(user_key = %user_key, error = %e, "sign-up re-read failed");
                return Err(ServiceError::OperationFailed { operation: "sign up" });
            }
        };

        let access_token = self
            .issue_token(&user, TokenPurpose::Access, HashMap::new(), self.access_ttl, "sign up")?;

        self.dispatch_verification_email(&user)?;

        tracing::info!(user_key = %user.user_key, "user signed up");

        Ok(SignUpResult {
            message: self
                .catalog
                .translate("auth.sign_up.welcome", &user.preferred_language),
            user: user.sanitized(),
            access_token,
        })
    }

    // ==================== Sign-in ====================

    pub async fn sign_in(&self, input: SignInInput) -> Result<SignInOutcome, ServiceError> {
        let username = normalize_username(&input.username);

        let user = self
            .store
            .find_user_by_username(&username)
            .await
            .map_err(|e| self.store_failed("sign in", e))?;
        let Some(user) = user else {
            tracing::warn!(username = %username, "sign-in rejected: unknown user name");
            self.events
                .record(SecurityEvent::SignInUnknownUser { username });
            return Err(ServiceError::SignInFailed);
        };

        // Lockout is checked before any credential work: a locked account
        // neither touches the counter nor reaches the hasher.
        if user.is_locked(self.lockout_threshold) {
            tracing::warn!(
                user_key = %user.user_key,
                failed_attempts = user.failed_attempts,
                "sign-in refused: account locked"
            );
            self.events.record(SecurityEvent::SignInLockedOut {
                user_key: user.user_key,
            });
            return Err(ServiceError::TooManyAttempts);
        }

        let password_ok = self
            .verify_password_blocking(
                Password::new(input.password),
                PasswordHashString::new(user.password_hash.clone()),
            )
            .await?;

        if !password_ok {
            run_upsert(
                self.store.as_ref(),
                user.user_key,
                "auth.sign_in.failed_attempt",
                vec![WriteOp::UpdateUser {
                    user_key: user.user_key,
                    patch: UserPatch::default().bump_failed_attempts(),
                }],
            )
            .await
            .map_err(|_| ServiceError::OperationFailed { operation: "sign in" })?;

            tracing::warn!(
                user_key = %user.user_key,
                failed_attempts = user.failed_attempts + 1,
                "sign-in rejected: password mismatch"
            );
            self.events.record(SecurityEvent::SignInBadPassword {
                user_key: user.user_key,
                failed_attempts: user.failed_attempts + 1,
            });
            return Err(ServiceError::SignInFailed);
        }

        // The counter reset commits in the same transaction as the
        // branch-specific writes, so a crash cannot leave the account
        // unlocked but sessionless (or the reverse).
        let reset = UserPatch::default().set_failed_attempts(0);

        match user.tfa_method {
            TfaMethod::None => {
                let session = Uuid::new_v4();
                run_upsert(
                    self.store.as_ref(),
                    user.user_key,
                    "auth.sign_in",
                    vec![WriteOp::UpdateUser {
                        user_key: user.user_key,
                        patch: reset.set_refresh_session(session),
                    }],
                )
                .await
                .map_err(|_| ServiceError::OperationFailed { operation: "sign in" })?;

                tracing::info!(user_key = %user.user_key, "user signed in");
                Ok(SignInOutcome::Authenticated(
                    self.issue_session_tokens(&user, session)?,
                ))
            }
            TfaMethod::Email => {
                let challenge = self
                    .challenges
                    .start_challenge(&user, reset, ChallengeDelivery::AuthEmail, "sign in")
                    .await?;
                tracing::info!(user_key = %user.user_key, send_method = %challenge.send_method, "sign-in challenge issued");
                Ok(SignInOutcome::ChallengeRequired(challenge))
            }
            TfaMethod::Phone => {
                let phone_number = self.decrypt_stored_phone(&user, "sign in")?;
                let challenge = self
                    .challenges
                    .start_challenge(
                        &user,
                        reset,
                        ChallengeDelivery::AuthText { phone_number },
                        "sign in",
                    )
                    .await?;
                tracing::info!(user_key = %user.user_key, send_method = %challenge.send_method, "sign-in challenge issued");
                Ok(SignInOutcome::ChallengeRequired(challenge))
            }
        }
    }

    /// Complete a two-factor sign-in: challenge token + submitted code in,
    /// access + refresh tokens out.
    pub async fn complete_tfa_sign_in(
        &self,
        input: CompleteTfaInput,
    ) -> Result<AuthResult, ServiceError> {
        let claims = self
            .tokens
            .verify(&input.challenge_token, TokenPurpose::Challenge)
            .map_err(|e| {
                tracing::warn!(error = %e, "challenge token rejected");
                self.events
                    .record(SecurityEvent::InvalidToken { context: "challenge" });
                ServiceError::InvalidToken
            })?;

        let user = self
            .challenges
            .verify_challenge(claims.sub, &input.code, ChallengeKind::SignIn)
            .await?;

        let session = Uuid::new_v4();
        run_upsert(
            self.store.as_ref(),
            user.user_key,
            "auth.sign_in.tfa",
            vec![WriteOp::UpdateUser {
                user_key: user.user_key,
                patch: UserPatch::default().set_refresh_session(session),
            }],
        )
        .await
        .map_err(|_| ServiceError::OperationFailed { operation: "sign in" })?;

        tracing::info!(user_key = %user.user_key, "user signed in with second factor");
        self.issue_session_tokens(&user, session)
    }

    // ==================== Sign-out & refresh ====================

    /// Stateless: no revocation list in this core. The transport expires the
    /// client-held refresh credential immediately.
    pub fn sign_out(&self, user: &User) -> SignOutResult {
        tracing::info!(user_key = %user.user_key, "user signed out");
        SignOutResult {
            expire_refresh_credential: true,
        }
    }

    /// Rotate the refresh session: the presented token must carry the
    /// currently stored session identifier, which is replaced atomically.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResult, ServiceError> {
        let claims = self
            .tokens
            .verify(refresh_token, TokenPurpose::Refresh)
            .map_err(|e| {
                tracing::warn!(error = %e, "refresh token rejected");
                self.events
                    .record(SecurityEvent::InvalidToken { context: "refresh" });
                ServiceError::InvalidToken
            })?;

        let session = claims
            .params
            .get("session")
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                tracing::warn!(user_key = %claims.sub, "refresh token missing session parameter");
                self.events
                    .record(SecurityEvent::InvalidToken { context: "refresh" });
                ServiceError::InvalidToken
            })?;

        let user = self
            .store
            .find_user_by_key(claims.sub)
            .await
            .map_err(|e| self.store_failed("refresh the session", e))?
            .ok_or_else(|| {
                tracing::warn!(user_key = %claims.sub, "refresh token subject not found");
                ServiceError::InvalidToken
            })?;

        if user.refresh_session != Some(session) {
            tracing::warn!(user_key = %user.user_key, "refresh token session is stale");
            self.events
                .record(SecurityEvent::InvalidToken { context: "refresh" });
            return Err(ServiceError::InvalidToken);
        }

        let next_session = Uuid::new_v4();
        run_upsert(
            self.store.as_ref(),
            user.user_key,
            "auth.refresh",
            vec![WriteOp::UpdateUser {
                user_key: user.user_key,
                patch: UserPatch::default().set_refresh_session(next_session),
            }],
        )
        .await
        .map_err(|_| ServiceError::OperationFailed {
            operation: "refresh the session",
        })?;

        self.issue_session_tokens(&user, next_session)
    }

    // ==================== Account & phone verification ====================

    /// Verify the account via an out-of-band link token. The token's subject
    /// parameter must match the resolved caller; each rejection branch keeps
    /// its own diagnostic while the client sees one generic error.
    pub async fn verify_account(
        &self,
        token: &str,
        caller: &User,
    ) -> Result<AccountUpdateResult, ServiceError> {
        let claims = self
            .tokens
            .verify(token, TokenPurpose::Verification)
            .map_err(|e| {
                tracing::warn!(user_key = %caller.user_key, error = %e, "verification token rejected");
                self.events.record(SecurityEvent::VerifyAccountRejected {
                    user_key: caller.user_key,
                    reason: "invalid_token",
                });
                ServiceError::VerifyAccountFailed
            })?;

        let subject = claims
            .params
            .get("user")
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| {
                tracing::warn!(user_key = %caller.user_key, "verification token has no subject parameter");
                self.events.record(SecurityEvent::VerifyAccountRejected {
                    user_key: caller.user_key,
                    reason: "missing_subject",
                });
                ServiceError::VerifyAccountFailed
            })?;

        if subject != caller.user_key {
            tracing::warn!(
                user_key = %caller.user_key,
                subject = %subject,
                "verification token matches no account of the caller"
            );
            self.events.record(SecurityEvent::VerifyAccountRejected {
                user_key: caller.user_key,
                reason: "no_matching_account",
            });
            return Err(ServiceError::VerifyAccountFailed);
        }

        let mut patch = UserPatch::default().set_email_verified(true);
        if caller.tfa_method == TfaMethod::None {
            patch = patch.set_tfa_method(TfaMethod::Email);
        }

        run_upsert(
            self.store.as_ref(),
            caller.user_key,
            "auth.verify_account",
            vec![WriteOp::UpdateUser {
                user_key: caller.user_key,
                patch,
            }],
        )
        .await
        .map_err(|_| ServiceError::OperationFailed {
            operation: "verify the account",
        })?;

        let user = self.reread_user(caller.user_key, "verify the account").await?;
        tracing::info!(user_key = %user.user_key, "account verified");

        Ok(AccountUpdateResult {
            message: self
                .catalog
                .translate("auth.verify_account.done", &user.preferred_language),
            user: user.sanitized(),
        })
    }

    /// Store the encrypted phone number and open a verification challenge in
    /// one atomic upsert. The code travels to the number being set.
    pub async fn set_phone_number(
        &self,
        caller: &User,
        input: SetPhoneNumberInput,
    ) -> Result<TfaSignInResult, ServiceError> {
        validate_phone_number(&input.phone_number)?;

        let encrypted = self.phone_cipher.encrypt(&input.phone_number).map_err(|e| {
            tracing::error!(user_key = %caller.user_key, error = %e, "phone encryption failed");
            ServiceError::OperationFailed {
                operation: "set the phone number",
            }
        })?;

        let patch = UserPatch::default()
            .set_phone(encrypted)
            .set_phone_verified(false);

        let challenge = self
            .challenges
            .start_challenge(
                caller,
                patch,
                ChallengeDelivery::TfaText {
                    phone_number: input.phone_number,
                },
                "set the phone number",
            )
            .await?;

        tracing::info!(user_key = %caller.user_key, "phone number set, verification pending");
        Ok(challenge)
    }

    /// Complete phone verification with the code sent on `set_phone_number`.
    /// Success flips `phone_verified` and switches the send method to phone.
    pub async fn verify_phone_number(
        &self,
        caller: &User,
        code: &str,
    ) -> Result<AccountUpdateResult, ServiceError> {
        let user = self
            .challenges
            .verify_challenge(caller.user_key, code, ChallengeKind::PhoneVerification)
            .await?;

        tracing::info!(user_key = %user.user_key, "phone number verified");
        Ok(AccountUpdateResult {
            message: self
                .catalog
                .translate("auth.phone.verified", &user.preferred_language),
            user: user.sanitized(),
        })
    }

    /// Remove the stored phone number. Always resets `phone_verified` and
    /// demotes the send method to email when the address is verified, or to
    /// none otherwise; a pending phone code is cleared with it.
    pub async fn remove_phone_number(
        &self,
        caller: &User,
    ) -> Result<AccountUpdateResult, ServiceError> {
        let demoted = if caller.email_verified {
            TfaMethod::Email
        } else {
            TfaMethod::None
        };

        let patch = UserPatch::default()
            .clear_phone()
            .set_phone_verified(false)
            .set_tfa_method(demoted)
            .clear_tfa_code();

        run_upsert(
            self.store.as_ref(),
            caller.user_key,
            "auth.remove_phone",
            vec![WriteOp::UpdateUser {
                user_key: caller.user_key,
                patch,
            }],
        )
        .await
        .map_err(|_| ServiceError::OperationFailed {
            operation: "remove the phone number",
        })?;

        let user = self
            .reread_user(caller.user_key, "remove the phone number")
            .await?;
        tracing::info!(user_key = %user.user_key, tfa_method = user.tfa_method.as_str(), "phone number removed");

        Ok(AccountUpdateResult {
            message: self
                .catalog
                .translate("auth.phone.removed", &user.preferred_language),
            user: user.sanitized(),
        })
    }

    // ==================== Caller resolution ====================

    /// Resolve "who is the caller" from an access token, once per request.
    /// Protected operations receive the returned user.
    pub async fn resolve_caller(&self, access_token: &str) -> Result<User, ServiceError> {
        let claims = self
            .tokens
            .verify(access_token, TokenPurpose::Access)
            .map_err(|e| {
                tracing::warn!(error = %e, "access token rejected");
                self.events
                    .record(SecurityEvent::InvalidToken { context: "access" });
                ServiceError::AuthenticationRequired
            })?;

        self.store
            .find_user_by_key(claims.sub)
            .await
            .map_err(|e| self.store_failed("resolve the caller", e))?
            .ok_or_else(|| {
                tracing::warn!(user_key = %claims.sub, "access token subject not found");
                ServiceError::AuthenticationRequired
            })
    }

    // ==================== Helpers ====================

    async fn hash_password_blocking(
        &self,
        password: Password,
    ) -> Result<PasswordHashString, ServiceError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing task failed");
                ServiceError::OperationFailed { operation: "sign up" }
            })?
            .map_err(|e| {
                tracing::error!(error = %e, "password hashing failed");
                ServiceError::OperationFailed { operation: "sign up" }
            })
    }

    async fn verify_password_blocking(
        &self,
        password: Password,
        digest: PasswordHashString,
    ) -> Result<bool, ServiceError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "password verification task failed");
                ServiceError::OperationFailed { operation: "sign in" }
            })
    }

    fn issue_token(
        &self,
        user: &User,
        purpose: TokenPurpose,
        params: HashMap<String, String>,
        ttl: Duration,
        operation: &'static str,
    ) -> Result<String, ServiceError> {
        self.tokens.issue(user.user_key, purpose, params, ttl).map_err(|e| {
            tracing::error!(user_key = %user.user_key, purpose = purpose.as_str(), error = %e, "token issue failed");
            ServiceError::OperationFailed { operation }
        })
    }

    fn issue_session_tokens(&self, user: &User, session: Uuid) -> Result<AuthResult, ServiceError> {
        let access_token =
            self.issue_token(user, TokenPurpose::Access, HashMap::new(), self.access_ttl, "sign in")?;

        let mut params = HashMap::new();
        params.insert("session".to_string(), session.to_string());
        let refresh_token =
            self.issue_token(user, TokenPurpose::Refresh, params, self.refresh_ttl, "sign in")?;

        Ok(AuthResult {
            user: user.sanitized(),
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    fn dispatch_verification_email(&self, user: &User) -> Result<(), ServiceError> {
        let mut params = HashMap::new();
        params.insert("user".to_string(), user.user_key.to_string());
        let verification_token = self.issue_token(
            user,
            TokenPurpose::Verification,
            params,
            self.verification_ttl,
            "sign up",
        )?;

        let notify = Arc::clone(&self.notify);
        let user = user.clone();
        tokio::spawn(async move {
            notify
                .send_verification_email(VerificationEmail {
                    user,
                    verification_token,
                })
                .await;
        });
        Ok(())
    }

    fn decrypt_stored_phone(
        &self,
        user: &User,
        operation: &'static str,
    ) -> Result<String, ServiceError> {
        let Some(phone) = user.phone.as_ref() else {
            // Invariant breach: send method phone without stored details.
            tracing::error!(user_key = %user.user_key, "phone send method with no phone details");
            return Err(ServiceError::OperationFailed { operation });
        };
        self.phone_cipher.decrypt(phone).map_err(|e| {
            tracing::error!(user_key = %user.user_key, error = %e, "stored phone number failed to decrypt");
            ServiceError::OperationFailed { operation }
        })
    }

    async fn reread_user(
        &self,
        user_key: Uuid,
        operation: &'static str,
    ) -> Result<User, ServiceError> {
        self.store
            .find_user_by_key(user_key)
            .await
            .map_err(|e| self.store_failed(operation, e))?
            .ok_or_else(|| {
                tracing::error!(user_key = %user_key, operation, "re-read found no record");
                ServiceError::OperationFailed { operation }
            })
    }

    fn store_failed(&self, operation: &'static str, err: StoreError) -> ServiceError {
        tracing::error!(operation, error = %err, "storage read failed");
        ServiceError::OperationFailed { operation }
    }
}

fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// E.164 shape: leading '+', then at least nine digits.
fn validate_phone_number(value: &str) -> Result<(), ServiceError> {
    let mut chars = value.chars();
    if chars.next() != Some('+') || value.len() < 10 || !chars.all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::InvalidInput(
            "Invalid phone format. Use E.164 format (+1234567890)".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_normalization() {
        assert_eq!(normalize_username("  Ada.Lovelace "), "ada.lovelace");
        assert_eq!(normalize_username("ADA"), "ada");
    }

    #[test]
    fn test_phone_number_format() {
        assert!(validate_phone_number("+15551234567").is_ok());
        assert!(validate_phone_number("15551234567").is_err());
        assert!(validate_phone_number("+1555").is_err());
        assert!(validate_phone_number("+1555123456a").is_err());
    }
}
