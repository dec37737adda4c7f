//! In-memory store: the test double for the external document store.
//!
//! Transactions buffer their steps and apply them under one lock at commit,
//! so partial writes are never visible and concurrent counter increments are
//! applied server-side rather than as read-modify-write. Failure injection
//! knobs let tests drive the step/commit error paths of the upsert protocol.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::{IdentityStore, StoreError, Transaction, UserPatch, WriteOp};
use crate::models::{Affiliation, Claim, User};

#[derive(Default, Clone)]
struct StoreState {
    users: HashMap<Uuid, User>,
    affiliations: Vec<Affiliation>,
    claims: Vec<Claim>,
}

#[derive(Default)]
struct FailureInjection {
    next_step: Option<String>,
    next_commit: Option<String>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    failures: Arc<Mutex<FailureInjection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user directly, bypassing the transaction protocol. Test setup
    /// only.
    pub fn seed_user(&self, user: User) {
        self.lock_state().users.insert(user.user_key, user);
    }

    pub fn seed_affiliation(&self, affiliation: Affiliation) {
        self.lock_state().affiliations.push(affiliation);
    }

    pub fn seed_claim(&self, claim: Claim) {
        self.lock_state().claims.push(claim);
    }

    /// Snapshot a user for assertions.
    pub fn get_user(&self, user_key: Uuid) -> Option<User> {
        self.lock_state().users.get(&user_key).cloned()
    }

    /// Make the next transaction step fail with a backend error.
    pub fn fail_next_step(&self, reason: &str) {
        self.lock_failures().next_step = Some(reason.to_string());
    }

    /// Make the next commit fail with a backend error.
    pub fn fail_next_commit(&self, reason: &str) {
        self.lock_failures().next_commit = Some(reason.to_string());
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, FailureInjection> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn apply_patch(user: &mut User, patch: UserPatch) {
    if let Some(value) = patch.failed_attempts {
        user.failed_attempts = value;
    }
    if patch.increment_failed_attempts {
        user.failed_attempts += 1;
    }
    if let Some(value) = patch.email_verified {
        user.email_verified = value;
    }
    if let Some(value) = patch.phone_verified {
        user.phone_verified = value;
    }
    if let Some(method) = patch.tfa_method {
        user.tfa_method = method;
    }
    if let Some(code) = patch.tfa_code {
        user.tfa_code = code;
    }
    if let Some(phone) = patch.phone {
        user.phone = phone;
    }
    if let Some(session) = patch.refresh_session {
        user.refresh_session = session;
    }
    user.updated_utc = Utc::now();
}

fn apply_op(state: &mut StoreState, op: WriteOp) -> Result<(), StoreError> {
    match op {
        WriteOp::InsertUser(user) => {
            if state.users.values().any(|u| u.username == user.username) {
                return Err(StoreError::Conflict(format!(
                    "username already exists: {}",
                    user.username
                )));
            }
            state.users.insert(user.user_key, user);
            Ok(())
        }
        WriteOp::UpdateUser { user_key, patch } => {
            let user = state.users.get_mut(&user_key).ok_or(StoreError::NotFound)?;
            apply_patch(user, patch);
            Ok(())
        }
    }
}

struct MemoryTransaction {
    store: MemoryStore,
    buffered: Vec<WriteOp>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn step(&mut self, op: WriteOp) -> Result<(), StoreError> {
        if let Some(reason) = self.store.lock_failures().next_step.take() {
            return Err(StoreError::Backend(reason));
        }

        // Validate against committed state plus the ops already buffered, so
        // a bad step surfaces here rather than at commit.
        let mut preview = self.store.lock_state().clone();
        for buffered in &self.buffered {
            apply_op(&mut preview, buffered.clone())?;
        }
        apply_op(&mut preview, op.clone())?;

        self.buffered.push(op);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if let Some(reason) = self.store.lock_failures().next_commit.take() {
            return Err(StoreError::Backend(reason));
        }

        let mut state = self.store.lock_state();
        let mut staged = state.clone();
        for op in self.buffered {
            apply_op(&mut staged, op)?;
        }
        *state = staged;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        // Buffered ops are simply dropped.
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock_state()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_key(&self, user_key: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.lock_state().users.get(&user_key).cloned())
    }

    async fn find_affiliation(
        &self,
        org_id: Uuid,
        user_key: Uuid,
    ) -> Result<Option<Affiliation>, StoreError> {
        Ok(self
            .lock_state()
            .affiliations
            .iter()
            .find(|a| a.org_id == org_id && a.user_key == user_key)
            .cloned())
    }

    async fn affiliations_for_user(&self, user_key: Uuid) -> Result<Vec<Affiliation>, StoreError> {
        Ok(self
            .lock_state()
            .affiliations
            .iter()
            .filter(|a| a.user_key == user_key)
            .cloned()
            .collect())
    }

    async fn find_claim(&self, org_id: Uuid, domain_id: Uuid) -> Result<Option<Claim>, StoreError> {
        Ok(self
            .lock_state()
            .claims
            .iter()
            .find(|c| c.org_id == org_id && c.domain_id == domain_id)
            .cloned())
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            buffered: Vec::new(),
        }))
    }
}
