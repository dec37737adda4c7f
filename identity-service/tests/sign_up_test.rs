mod common;

use common::{TestHarness, TEST_PASSWORD};
use identity_service::db::IdentityStore;
use identity_service::dtos::auth::SignUpInput;
use identity_service::models::TfaMethod;
use identity_service::services::ServiceError;

fn input(username: &str, password: &str, confirm: &str) -> SignUpInput {
    SignUpInput {
        display_name: "Test User".to_string(),
        username: username.to_string(),
        password: password.to_string(),
        confirm_password: confirm.to_string(),
        preferred_language: "en".to_string(),
    }
}

#[tokio::test]
async fn test_sign_up_creates_user_with_defaults() {
    let harness = TestHarness::new();

    let result = harness.sign_up("ada").await;
    let stored = harness.user(result.user.user_key);

    assert_eq!(stored.username, "ada");
    assert_eq!(stored.failed_attempts, 0);
    assert!(!stored.email_verified);
    assert!(!stored.phone_verified);
    assert_eq!(stored.tfa_method, TfaMethod::None);
    assert_ne!(stored.password_hash, TEST_PASSWORD, "password stored in the clear");
    assert!(stored.password_hash.starts_with("$argon2"));
}

#[tokio::test]
async fn test_sign_up_access_token_resolves_the_caller() {
    let harness = TestHarness::new();

    let result = harness.sign_up("ada").await;
    let caller = harness
        .core
        .auth
        .resolve_caller(&result.access_token)
        .await
        .expect("fresh access token rejected");

    assert_eq!(caller.user_key, result.user.user_key);
}

#[tokio::test]
async fn test_sign_up_duplicate_username_rejected_case_insensitively() {
    let harness = TestHarness::new();
    harness.sign_up("ada").await;

    let result = harness
        .core
        .auth
        .sign_up(input("ADA", TEST_PASSWORD, TEST_PASSWORD))
        .await;

    assert!(matches!(result, Err(ServiceError::UsernameTaken)));
}

#[tokio::test]
async fn test_sign_up_rejects_weak_password() {
    let harness = TestHarness::new();

    // Policy requires an uppercase letter and a number.
    let result = harness
        .core
        .auth
        .sign_up(input("ada", "alllowercase", "alllowercase"))
        .await;

    assert!(matches!(result, Err(ServiceError::WeakPassword(_))));
}

#[tokio::test]
async fn test_sign_up_rejects_confirm_mismatch() {
    let harness = TestHarness::new();

    let result = harness
        .core
        .auth
        .sign_up(input("ada", TEST_PASSWORD, "Different1Password"))
        .await;

    assert!(matches!(result, Err(ServiceError::PasswordConfirmMismatch)));
}

#[tokio::test]
async fn test_sign_up_sends_verification_email() {
    let harness = TestHarness::new();

    harness.sign_up("ada").await;
    harness.settle().await;

    let token = harness.last_verification_token();
    assert!(token.is_some(), "no verification email dispatched");
}

#[tokio::test]
async fn test_sign_up_upsert_failure_maps_to_generic_error() {
    let harness = TestHarness::new();
    harness.store.fail_next_commit("simulated outage");

    let result = harness
        .core
        .auth
        .sign_up(input("ada", TEST_PASSWORD, TEST_PASSWORD))
        .await;

    assert!(matches!(
        result,
        Err(ServiceError::OperationFailed { operation: "sign up" })
    ));
    // Nothing was persisted.
    assert!(harness
        .store
        .find_user_by_username("ada")
        .await
        .unwrap()
        .is_none());
}
