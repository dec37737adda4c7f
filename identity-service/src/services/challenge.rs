//! Two-factor challenge coordinator.
//!
//! Owns the per-attempt challenge state machine: generating the six-digit
//! code, persisting its keyed digest with an expiry, issuing the challenge
//! token, and dispatching the code through the notification collaborator
//! after the transaction has committed. A second challenge before expiry
//! overwrites the stored code (last-write-wins).

use chrono::{Duration, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{run_upsert, IdentityStore, UserPatch, WriteOp};
use crate::dtos::auth::TfaSignInResult;
use crate::models::{PendingCode, TfaMethod, User};
use crate::utils::KeyedHasher;

use super::error::ServiceError;
use super::notify::{AuthEmail, AuthTextMsg, NotificationDispatcher, TfaTextMsg};
use super::security_events::{SecurityEvent, SecurityEventSink};
use super::token::{TokenPurpose, TokenService};

const CODE_LENGTH: usize = 6;

/// Which flow a code submission completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// Second factor of a password sign-in.
    SignIn,
    /// Proving ownership of a newly set phone number. Success flips
    /// `phone_verified` and switches the send method to phone.
    PhoneVerification,
}

/// How the generated code reaches the user. The phone number is passed in
/// plaintext by the caller (decrypted stored number, or the number being
/// set), because the dispatcher has no access to the field cipher.
pub enum ChallengeDelivery {
    AuthEmail,
    AuthText { phone_number: String },
    TfaText { phone_number: String },
}

impl ChallengeDelivery {
    fn method_name(&self) -> &'static str {
        match self {
            ChallengeDelivery::AuthEmail => TfaMethod::Email.client_name(),
            ChallengeDelivery::AuthText { .. } | ChallengeDelivery::TfaText { .. } => {
                TfaMethod::Phone.client_name()
            }
        }
    }
}

pub struct ChallengeCoordinator {
    store: Arc<dyn IdentityStore>,
    tokens: TokenService,
    notify: Arc<dyn NotificationDispatcher>,
    events: Arc<dyn SecurityEventSink>,
    codes: KeyedHasher,
    code_ttl: Duration,
    challenge_token_ttl: Duration,
}

impl ChallengeCoordinator {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        tokens: TokenService,
        notify: Arc<dyn NotificationDispatcher>,
        events: Arc<dyn SecurityEventSink>,
        codes: KeyedHasher,
        code_ttl: Duration,
        challenge_token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            notify,
            events,
            codes,
            code_ttl,
            challenge_token_ttl,
        }
    }

    /// Persist a fresh code (merged into `patch` so it commits atomically
    /// with the caller's other writes), issue the challenge token, and
    /// dispatch the code. Dispatch runs after commit and its outcome never
    /// affects the result.
    pub async fn start_challenge(
        &self,
        user: &User,
        patch: UserPatch,
        delivery: ChallengeDelivery,
        operation: &'static str,
    ) -> Result<TfaSignInResult, ServiceError> {
        let code = generate_code();
        let pending = PendingCode {
            digest: self.codes.digest(&code),
            expiry_utc: Utc::now() + self.code_ttl,
        };
        let patch = patch.set_tfa_code(pending);

        run_upsert(
            self.store.as_ref(),
            user.user_key,
            operation,
            vec![WriteOp::UpdateUser {
                user_key: user.user_key,
                patch,
            }],
        )
        .await
        .map_err(|_| ServiceError::OperationFailed { operation })?;

        let mut params = HashMap::new();
        params.insert("method".to_string(), delivery.method_name().to_string());
        let challenge_token = self
            .tokens
            .issue(
                user.user_key,
                TokenPurpose::Challenge,
                params,
                self.challenge_token_ttl,
            )
            .map_err(|e| {
                tracing::error!(user_key = %user.user_key, error = %e, "challenge token issue failed");
                ServiceError::OperationFailed { operation }
            })?;

        let send_method = delivery.method_name().to_string();
        let notify = Arc::clone(&self.notify);
        let user = user.clone();
        tokio::spawn(async move {
            match delivery {
                ChallengeDelivery::AuthEmail => {
                    notify.send_auth_email(AuthEmail { user, code }).await;
                }
                ChallengeDelivery::AuthText { phone_number } => {
                    notify
                        .send_auth_text_msg(AuthTextMsg {
                            user,
                            phone_number,
                            code,
                        })
                        .await;
                }
                ChallengeDelivery::TfaText { phone_number } => {
                    notify
                        .send_tfa_text_msg(TfaTextMsg {
                            user,
                            phone_number,
                            code,
                        })
                        .await;
                }
            }
        });

        Ok(TfaSignInResult {
            challenge_token,
            send_method,
        })
    }

    /// Check a submitted code for `user_key`.
    ///
    /// Input that is not exactly six digits is rejected before any
    /// comparison, so malformed submissions never consume the stored code.
    /// On success the stored code is cleared (plus the phone flags for the
    /// phone-verification variant) and the refreshed user is returned.
    pub async fn verify_challenge(
        &self,
        user_key: Uuid,
        submitted: &str,
        kind: ChallengeKind,
    ) -> Result<User, ServiceError> {
        let operation = match kind {
            ChallengeKind::SignIn => "verify the sign-in code",
            ChallengeKind::PhoneVerification => "verify the phone number",
        };

        if submitted.len() != CODE_LENGTH || !submitted.bytes().all(|b| b.is_ascii_digit()) {
            tracing::warn!(
                user_key = %user_key,
                length = submitted.len(),
                "challenge code rejected: not six digits"
            );
            self.events.record(SecurityEvent::TfaCodeMalformed {
                user_key,
                length: submitted.len(),
            });
            return Err(ServiceError::CodeMalformed);
        }

        let user = self
            .store
            .find_user_by_key(user_key)
            .await
            .map_err(|e| {
                tracing::error!(user_key = %user_key, error = %e, "challenge lookup failed");
                ServiceError::OperationFailed { operation }
            })?;
        let Some(user) = user else {
            tracing::warn!(user_key = %user_key, "challenge code rejected: unknown user");
            self.events
                .record(SecurityEvent::TfaUnknownUser { user_key });
            return Err(ServiceError::CodeMismatch);
        };

        let Some(pending) = user.tfa_code.as_ref() else {
            tracing::warn!(user_key = %user_key, "challenge code rejected: no pending code");
            self.events
                .record(SecurityEvent::TfaCodeMismatch { user_key });
            return Err(ServiceError::CodeMismatch);
        };

        if pending.is_expired() {
            tracing::warn!(user_key = %user_key, "challenge code rejected: expired");
            self.events
                .record(SecurityEvent::TfaCodeMismatch { user_key });
            return Err(ServiceError::CodeMismatch);
        }

        if !self.codes.matches(submitted, &pending.digest) {
            tracing::warn!(user_key = %user_key, "challenge code rejected: mismatch");
            self.events
                .record(SecurityEvent::TfaCodeMismatch { user_key });
            return Err(ServiceError::CodeMismatch);
        }

        let mut patch = UserPatch::default().clear_tfa_code();
        if kind == ChallengeKind::PhoneVerification {
            patch = patch
                .set_phone_verified(true)
                .set_tfa_method(TfaMethod::Phone);
        }

        run_upsert(
            self.store.as_ref(),
            user_key,
            operation,
            vec![WriteOp::UpdateUser { user_key, patch }],
        )
        .await
        .map_err(|_| ServiceError::OperationFailed { operation })?;

        self.store
            .find_user_by_key(user_key)
            .await
            .map_err(|e| {
                tracing::error!(user_key = %user_key, error = %e, "post-challenge re-read failed");
                ServiceError::OperationFailed { operation }
            })?
            .ok_or(ServiceError::OperationFailed { operation })
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| rng.gen_range(0..10).to_string())
        .collect()
}
