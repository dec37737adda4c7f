//! Transactional upsert protocol: begin → ordered steps → commit.
//!
//! Step and commit failures are distinguished, logged here with the
//! originating user key and operation name, and surfaced to the caller to be
//! mapped onto one generic user-facing error per operation. Nothing is
//! retried; the client resubmits the whole logical operation.

use thiserror::Error;
use uuid::Uuid;

use super::{IdentityStore, StoreError, WriteOp};

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("transaction begin failed")]
    Begin(#[source] StoreError),
    #[error("transaction step {step} ({op}) failed")]
    Step {
        step: usize,
        op: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("transaction commit failed")]
    Commit(#[source] StoreError),
}

/// Run `steps` strictly in order inside one transaction.
///
/// Partial writes from a failed sequence are never visible outside the
/// transaction.
pub async fn run_upsert(
    store: &dyn IdentityStore,
    user_key: Uuid,
    operation: &'static str,
    steps: Vec<WriteOp>,
) -> Result<(), UpsertError> {
    let mut txn = store.begin().await.map_err(|source| {
        tracing::error!(
            operation,
            user_key = %user_key,
            error = %source,
            "transaction begin failed"
        );
        UpsertError::Begin(source)
    })?;

    for (step, op) in steps.into_iter().enumerate() {
        let op_name = op.name();
        if let Err(source) = txn.step(op).await {
            tracing::error!(
                operation,
                user_key = %user_key,
                step,
                op = op_name,
                error = %source,
                "transaction step failed"
            );
            if let Err(abort_err) = txn.abort().await {
                tracing::warn!(
                    operation,
                    user_key = %user_key,
                    error = %abort_err,
                    "transaction abort failed after step error"
                );
            }
            return Err(UpsertError::Step {
                step,
                op: op_name,
                source,
            });
        }
    }

    txn.commit().await.map_err(|source| {
        tracing::error!(
            operation,
            user_key = %user_key,
            error = %source,
            "transaction commit failed"
        );
        UpsertError::Commit(source)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, UserPatch};
    use crate::models::User;

    fn sample_user() -> User {
        User::new(
            "ada".to_string(),
            "Ada Lovelace".to_string(),
            "$argon2id$stub".to_string(),
            "en".to_string(),
        )
    }

    #[tokio::test]
    async fn test_ordered_steps_commit_together() {
        let store = MemoryStore::new();
        let user = sample_user();
        let key = user.user_key;

        run_upsert(
            &store,
            key,
            "test.insert_then_update",
            vec![
                WriteOp::InsertUser(user),
                WriteOp::UpdateUser {
                    user_key: key,
                    patch: UserPatch::default().set_failed_attempts(7),
                },
            ],
        )
        .await
        .unwrap();

        assert_eq!(store.get_user(key).unwrap().failed_attempts, 7);
    }

    #[tokio::test]
    async fn test_step_failure_is_distinguished_and_atomic() {
        let store = MemoryStore::new();
        let user = sample_user();
        let key = user.user_key;
        store.fail_next_step("simulated outage");

        let result = run_upsert(&store, key, "test.step_fail", vec![WriteOp::InsertUser(user)]).await;

        assert!(matches!(result, Err(UpsertError::Step { step: 0, .. })));
        assert!(store.get_user(key).is_none());
    }

    #[tokio::test]
    async fn test_commit_failure_is_distinguished_and_atomic() {
        let store = MemoryStore::new();
        let user = sample_user();
        let key = user.user_key;
        store.fail_next_commit("simulated outage");

        let result =
            run_upsert(&store, key, "test.commit_fail", vec![WriteOp::InsertUser(user)]).await;

        assert!(matches!(result, Err(UpsertError::Commit(_))));
        assert!(store.get_user(key).is_none());
    }
}
