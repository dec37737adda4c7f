//! Security event sink.
//!
//! Components receive the sink by constructor injection and report
//! security-relevant branches (lockouts, bad codes, token misuse) through it,
//! so operators can tell brute-force attempts from client bugs and tests can
//! assert on emitted events. The default sink forwards to `tracing`.

use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityEvent {
    SignInUnknownUser { username: String },
    SignInBadPassword { user_key: Uuid, failed_attempts: u32 },
    SignInLockedOut { user_key: Uuid },
    TfaCodeMalformed { user_key: Uuid, length: usize },
    TfaCodeMismatch { user_key: Uuid },
    TfaUnknownUser { user_key: Uuid },
    InvalidToken { context: &'static str },
    VerifyAccountRejected { user_key: Uuid, reason: &'static str },
    AuthorizationDenied { user_key: Option<Uuid>, action: &'static str },
}

pub trait SecurityEventSink: Send + Sync {
    fn record(&self, event: SecurityEvent);
}

/// Default sink: structured warn-level log lines.
pub struct TracingEventSink;

impl SecurityEventSink for TracingEventSink {
    fn record(&self, event: SecurityEvent) {
        match &event {
            SecurityEvent::SignInUnknownUser { username } => {
                tracing::warn!(username = %username, "security event: sign-in with unknown user name");
            }
            SecurityEvent::SignInBadPassword {
                user_key,
                failed_attempts,
            } => {
                tracing::warn!(
                    user_key = %user_key,
                    failed_attempts,
                    "security event: password mismatch"
                );
            }
            SecurityEvent::SignInLockedOut { user_key } => {
                tracing::warn!(user_key = %user_key, "security event: sign-in refused, account locked");
            }
            SecurityEvent::TfaCodeMalformed { user_key, length } => {
                tracing::warn!(
                    user_key = %user_key,
                    length,
                    "security event: malformed two-factor code"
                );
            }
            SecurityEvent::TfaCodeMismatch { user_key } => {
                tracing::warn!(user_key = %user_key, "security event: two-factor code mismatch");
            }
            SecurityEvent::TfaUnknownUser { user_key } => {
                tracing::warn!(user_key = %user_key, "security event: two-factor code for unknown user");
            }
            SecurityEvent::InvalidToken { context } => {
                tracing::warn!(context, "security event: invalid token presented");
            }
            SecurityEvent::VerifyAccountRejected { user_key, reason } => {
                tracing::warn!(user_key = %user_key, reason, "security event: account verification rejected");
            }
            SecurityEvent::AuthorizationDenied { user_key, action } => {
                tracing::warn!(user_key = ?user_key, action, "security event: authorization denied");
            }
        }
    }
}

/// Recording sink for tests.
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SecurityEventSink for RecordingEventSink {
    fn record(&self, event: SecurityEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
