//! Outbound notification collaborator.
//!
//! Delivery is fire-and-forget: implementations log their own failures and
//! never propagate them into the caller's control flow, which is why every
//! method returns unit. Each message carries the full user record so the
//! dispatcher can address and localize without further lookups.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};

use crate::models::User;

#[derive(Clone)]
pub struct AuthEmail {
    pub user: User,
    pub code: String,
}

#[derive(Clone)]
pub struct AuthTextMsg {
    pub user: User,
    pub phone_number: String,
    pub code: String,
}

#[derive(Clone)]
pub struct VerificationEmail {
    pub user: User,
    pub verification_token: String,
}

#[derive(Clone)]
pub struct TfaTextMsg {
    pub user: User,
    pub phone_number: String,
    pub code: String,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Two-factor sign-in code over email.
    async fn send_auth_email(&self, msg: AuthEmail);
    /// Two-factor sign-in code over SMS.
    async fn send_auth_text_msg(&self, msg: AuthTextMsg);
    /// Account verification link.
    async fn send_verification_email(&self, msg: VerificationEmail);
    /// Phone verification code over SMS.
    async fn send_tfa_text_msg(&self, msg: TfaTextMsg);
}

/// Recording dispatcher for tests. Codes are kept so tests can complete the
/// challenge they triggered.
#[derive(Clone)]
pub enum DispatchedMessage {
    AuthEmail(AuthEmail),
    AuthTextMsg(AuthTextMsg),
    VerificationEmail(VerificationEmail),
    TfaTextMsg(TfaTextMsg),
}

#[derive(Default)]
pub struct MockDispatcher {
    messages: Mutex<Vec<DispatchedMessage>>,
}

impl MockDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<DispatchedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn push(&self, msg: DispatchedMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg);
    }
}

#[async_trait]
impl NotificationDispatcher for MockDispatcher {
    async fn send_auth_email(&self, msg: AuthEmail) {
        self.push(DispatchedMessage::AuthEmail(msg));
    }

    async fn send_auth_text_msg(&self, msg: AuthTextMsg) {
        self.push(DispatchedMessage::AuthTextMsg(msg));
    }

    async fn send_verification_email(&self, msg: VerificationEmail) {
        self.push(DispatchedMessage::VerificationEmail(msg));
    }

    async fn send_tfa_text_msg(&self, msg: TfaTextMsg) {
        self.push(DispatchedMessage::TfaTextMsg(msg));
    }
}
