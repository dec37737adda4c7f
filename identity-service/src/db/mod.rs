//! Storage-executor interface for the identity core.
//!
//! The document-store driver is an external collaborator: this module defines
//! the read surface and the transactional write protocol the core depends on,
//! plus an in-memory implementation used by tests. A production adapter wraps
//! the real driver's session/transaction API behind the same traits.

pub mod memory;
pub mod upsert;

pub use memory::MemoryStore;
pub use upsert::{run_upsert, UpsertError};

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Affiliation, Claim, EncryptedPhone, PendingCode, TfaMethod, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Partial update of a User document, the typed analogue of a `$set`/`$inc`
/// update statement. `Some(None)` on a nullable field clears it.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub failed_attempts: Option<u32>,
    /// Server-side increment, applied atomically at commit so concurrent
    /// attempts cannot lose updates.
    pub increment_failed_attempts: bool,
    pub email_verified: Option<bool>,
    pub phone_verified: Option<bool>,
    pub tfa_method: Option<TfaMethod>,
    pub tfa_code: Option<Option<PendingCode>>,
    pub phone: Option<Option<EncryptedPhone>>,
    pub refresh_session: Option<Option<Uuid>>,
}

impl UserPatch {
    pub fn set_failed_attempts(mut self, value: u32) -> Self {
        self.failed_attempts = Some(value);
        self
    }

    pub fn bump_failed_attempts(mut self) -> Self {
        self.increment_failed_attempts = true;
        self
    }

    pub fn set_email_verified(mut self, value: bool) -> Self {
        self.email_verified = Some(value);
        self
    }

    pub fn set_phone_verified(mut self, value: bool) -> Self {
        self.phone_verified = Some(value);
        self
    }

    pub fn set_tfa_method(mut self, method: TfaMethod) -> Self {
        self.tfa_method = Some(method);
        self
    }

    pub fn set_tfa_code(mut self, code: PendingCode) -> Self {
        self.tfa_code = Some(Some(code));
        self
    }

    pub fn clear_tfa_code(mut self) -> Self {
        self.tfa_code = Some(None);
        self
    }

    pub fn set_phone(mut self, phone: EncryptedPhone) -> Self {
        self.phone = Some(Some(phone));
        self
    }

    pub fn clear_phone(mut self) -> Self {
        self.phone = Some(None);
        self
    }

    pub fn set_refresh_session(mut self, session: Uuid) -> Self {
        self.refresh_session = Some(Some(session));
        self
    }
}

/// One storage operation inside a transaction.
#[derive(Debug, Clone)]
pub enum WriteOp {
    InsertUser(User),
    UpdateUser { user_key: Uuid, patch: UserPatch },
}

impl WriteOp {
    pub fn name(&self) -> &'static str {
        match self {
            WriteOp::InsertUser(_) => "insert_user",
            WriteOp::UpdateUser { .. } => "update_user",
        }
    }
}

/// An open storage transaction: ordered steps, then an all-or-nothing commit.
/// Nothing a transaction writes is visible outside it before `commit`.
#[async_trait]
pub trait Transaction: Send {
    async fn step(&mut self, op: WriteOp) -> Result<(), StoreError>;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn abort(self: Box<Self>) -> Result<(), StoreError>;
}

/// Read surface plus transaction entry point consumed by the identity core.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Lookup by the case-normalized (lowercase) login identifier.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_key(&self, user_key: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_affiliation(
        &self,
        org_id: Uuid,
        user_key: Uuid,
    ) -> Result<Option<Affiliation>, StoreError>;

    async fn affiliations_for_user(&self, user_key: Uuid) -> Result<Vec<Affiliation>, StoreError>;

    async fn find_claim(&self, org_id: Uuid, domain_id: Uuid) -> Result<Option<Claim>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}
