//! identity-service: the credential, session, and authorization core behind
//! the account API.
//!
//! The crate is transport-agnostic: resolvers call the typed operations on
//! [`services::AuthService`] and the predicates on [`services::PolicyEngine`];
//! storage, notification delivery, and the message catalog are injected
//! collaborators.

pub mod config;
pub mod db;
pub mod dtos;
pub mod models;
pub mod services;
pub mod utils;

use chrono::Duration;
use std::sync::Arc;

use service_core::error::AppError;

use crate::config::AuthConfig;
use crate::db::IdentityStore;
use crate::services::{
    AuthService, ChallengeCoordinator, MessageCatalog, NotificationDispatcher, PolicyEngine,
    SecurityEventSink, TokenService,
};
use crate::utils::{Argon2Hasher, CredentialHasher, KeyedHasher};

/// Composition root: the fully wired subsystem, built once per process from
/// configuration plus the external collaborators.
pub struct IdentityCore {
    pub auth: AuthService,
    pub authz: PolicyEngine,
    pub tokens: TokenService,
}

impl IdentityCore {
    pub fn new(
        config: &AuthConfig,
        store: Arc<dyn IdentityStore>,
        notify: Arc<dyn NotificationDispatcher>,
        catalog: Arc<dyn MessageCatalog>,
        events: Arc<dyn SecurityEventSink>,
    ) -> Result<Self, AppError> {
        Self::with_hasher(config, store, Arc::new(Argon2Hasher), notify, catalog, events)
    }

    /// Like [`IdentityCore::new`] with an explicit credential hasher; tests
    /// inject instrumented hashers through this.
    pub fn with_hasher(
        config: &AuthConfig,
        store: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        notify: Arc<dyn NotificationDispatcher>,
        catalog: Arc<dyn MessageCatalog>,
        events: Arc<dyn SecurityEventSink>,
    ) -> Result<Self, AppError> {
        let tokens = TokenService::new(&config.token.secret);

        let codes = KeyedHasher::new(&config.security.code_secret)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("code secret: {e}")))?;

        let challenges = ChallengeCoordinator::new(
            Arc::clone(&store),
            tokens.clone(),
            Arc::clone(&notify),
            Arc::clone(&events),
            codes,
            Duration::minutes(config.token.challenge_ttl_minutes),
            Duration::minutes(config.token.challenge_ttl_minutes),
        );

        let auth = AuthService::new(
            Arc::clone(&store),
            hasher,
            tokens.clone(),
            challenges,
            notify,
            catalog,
            events,
            config,
        )?;

        let authz = PolicyEngine::new(store);

        Ok(Self { auth, authz, tokens })
    }
}
