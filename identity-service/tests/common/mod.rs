//! Test helper module for identity-service integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use identity_service::config::AuthConfig;
use identity_service::db::MemoryStore;
use identity_service::dtos::auth::{SignInInput, SignInOutcome, SignUpInput, SignUpResult};
use identity_service::models::User;
use identity_service::services::{
    DispatchedMessage, MockDispatcher, RecordingEventSink, ServiceError, StaticCatalog,
};
use identity_service::utils::{
    Argon2Hasher, CredentialHasher, HashError, Password, PasswordHashString,
};
use identity_service::IdentityCore;

pub const TEST_PASSWORD: &str = "Sufficient1Password";

/// Credential hasher that counts invocations, so tests can assert the
/// lockout path never reaches the hasher.
pub struct CountingHasher {
    inner: Argon2Hasher,
    verify_calls: AtomicUsize,
}

impl CountingHasher {
    pub fn new() -> Self {
        Self {
            inner: Argon2Hasher,
            verify_calls: AtomicUsize::new(0),
        }
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

impl CredentialHasher for CountingHasher {
    fn hash(&self, password: &Password) -> Result<PasswordHashString, HashError> {
        self.inner.hash(password)
    }

    fn verify(&self, password: &Password, digest: &PasswordHashString) -> bool {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(password, digest)
    }
}

/// Fully wired subsystem over the in-memory store with recording doubles for
/// every collaborator.
pub struct TestHarness {
    pub core: IdentityCore,
    pub store: MemoryStore,
    pub notifier: Arc<MockDispatcher>,
    pub events: Arc<RecordingEventSink>,
    pub hasher: Arc<CountingHasher>,
    pub config: AuthConfig,
}

impl TestHarness {
    pub fn new() -> Self {
        let config = AuthConfig::for_tests();
        let store = MemoryStore::new();
        let notifier = Arc::new(MockDispatcher::new());
        let events = Arc::new(RecordingEventSink::new());
        let hasher = Arc::new(CountingHasher::new());

        let core = IdentityCore::with_hasher(
            &config,
            Arc::new(store.clone()),
            hasher.clone(),
            notifier.clone(),
            Arc::new(StaticCatalog),
            events.clone(),
        )
        .expect("failed to build identity core");

        Self {
            core,
            store,
            notifier,
            events,
            hasher,
            config,
        }
    }

    pub async fn sign_up(&self, username: &str) -> SignUpResult {
        self.core
            .auth
            .sign_up(SignUpInput {
                display_name: format!("{username} (display)"),
                username: username.to_string(),
                password: TEST_PASSWORD.to_string(),
                confirm_password: TEST_PASSWORD.to_string(),
                preferred_language: "en".to_string(),
            })
            .await
            .expect("sign-up failed")
    }

    pub async fn sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> Result<SignInOutcome, ServiceError> {
        self.core
            .auth
            .sign_in(SignInInput {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
    }

    pub fn user(&self, user_key: uuid::Uuid) -> User {
        self.store.get_user(user_key).expect("user not found")
    }

    /// Let spawned fire-and-forget dispatch tasks run.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    /// Most recent code handed to the notification collaborator.
    pub fn last_code(&self) -> Option<String> {
        self.notifier
            .messages()
            .into_iter()
            .rev()
            .find_map(|m| match m {
                DispatchedMessage::AuthEmail(m) => Some(m.code),
                DispatchedMessage::AuthTextMsg(m) => Some(m.code),
                DispatchedMessage::TfaTextMsg(m) => Some(m.code),
                DispatchedMessage::VerificationEmail(_) => None,
            })
    }

    /// Most recent verification-link token handed to the collaborator.
    pub fn last_verification_token(&self) -> Option<String> {
        self.notifier
            .messages()
            .into_iter()
            .rev()
            .find_map(|m| match m {
                DispatchedMessage::VerificationEmail(m) => Some(m.verification_token),
                _ => None,
            })
    }
}
