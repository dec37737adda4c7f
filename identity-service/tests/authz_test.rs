mod common;

use common::TestHarness;
use identity_service::models::{Affiliation, Claim, Permission, User};
use identity_service::services::ServiceError;
use uuid::Uuid;

fn seeded_user(harness: &TestHarness, username: &str) -> User {
    let user = User::new(
        username.to_string(),
        format!("{username} (display)"),
        "$argon2id$stub".to_string(),
        "en".to_string(),
    );
    harness.store.seed_user(user.clone());
    user
}

#[tokio::test]
async fn test_check_permission_distinguishes_absence_from_low_role() {
    let harness = TestHarness::new();
    let user = seeded_user(&harness, "ada");
    let org = Uuid::new_v4();
    let other_org = Uuid::new_v4();
    harness
        .store
        .seed_affiliation(Affiliation::new(org, user.user_key, Permission::User));

    let held = harness
        .core
        .authz
        .check_permission(user.user_key, org)
        .await
        .unwrap();
    assert_eq!(held, Some(Permission::User));
    assert_eq!(held.unwrap().as_str(), "user");

    // No affiliation on the other organization: None, not a low role.
    let absent = harness
        .core
        .authz
        .check_permission(user.user_key, other_org)
        .await
        .unwrap();
    assert_eq!(absent, None);
}

#[tokio::test]
async fn test_check_super_admin() {
    let harness = TestHarness::new();
    let admin = seeded_user(&harness, "root");
    let mortal = seeded_user(&harness, "ada");
    let org = Uuid::new_v4();
    harness
        .store
        .seed_affiliation(Affiliation::new(org, admin.user_key, Permission::SuperAdmin));
    harness
        .store
        .seed_affiliation(Affiliation::new(org, mortal.user_key, Permission::Admin));

    assert!(harness.core.authz.check_super_admin(admin.user_key).await.unwrap());
    assert!(!harness.core.authz.check_super_admin(mortal.user_key).await.unwrap());
}

#[tokio::test]
async fn test_check_org_owner_requires_admin_or_above() {
    let harness = TestHarness::new();
    let owner = seeded_user(&harness, "owner");
    let member = seeded_user(&harness, "member");
    let org = Uuid::new_v4();
    harness
        .store
        .seed_affiliation(Affiliation::new(org, owner.user_key, Permission::Admin));
    harness
        .store
        .seed_affiliation(Affiliation::new(org, member.user_key, Permission::User));

    assert!(harness.core.authz.check_org_owner(owner.user_key, org).await.unwrap());
    assert!(!harness.core.authz.check_org_owner(member.user_key, org).await.unwrap());
}

#[tokio::test]
async fn test_check_user_belongs_to_org() {
    let harness = TestHarness::new();
    let user = seeded_user(&harness, "ada");
    let org = Uuid::new_v4();
    harness
        .store
        .seed_affiliation(Affiliation::new(org, user.user_key, Permission::User));

    assert!(harness
        .core
        .authz
        .check_user_belongs_to_org(user.user_key, org)
        .await
        .unwrap());
    assert!(!harness
        .core
        .authz
        .check_user_belongs_to_org(user.user_key, Uuid::new_v4())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_check_domain_ownership() {
    let harness = TestHarness::new();
    let org = Uuid::new_v4();
    let domain = Uuid::new_v4();
    harness.store.seed_claim(Claim::new(org, domain));

    assert!(harness.core.authz.check_domain_ownership(org, domain).await.unwrap());
    assert!(!harness
        .core
        .authz
        .check_domain_ownership(org, Uuid::new_v4())
        .await
        .unwrap());
    assert!(!harness
        .core
        .authz
        .check_domain_ownership(Uuid::new_v4(), domain)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_check_user_is_admin_for_user() {
    let harness = TestHarness::new();
    let admin = seeded_user(&harness, "admin");
    let subject = seeded_user(&harness, "subject");
    let outsider = seeded_user(&harness, "outsider");
    let org = Uuid::new_v4();

    harness
        .store
        .seed_affiliation(Affiliation::new(org, admin.user_key, Permission::Admin));
    harness
        .store
        .seed_affiliation(Affiliation::new(org, subject.user_key, Permission::User));

    assert!(harness
        .core
        .authz
        .check_user_is_admin_for_user(admin.user_key, subject.user_key)
        .await
        .unwrap());
    // No shared organization.
    assert!(!harness
        .core
        .authz
        .check_user_is_admin_for_user(admin.user_key, outsider.user_key)
        .await
        .unwrap());
    // A plain member is no admin for anyone.
    assert!(!harness
        .core
        .authz
        .check_user_is_admin_for_user(subject.user_key, admin.user_key)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_user_required_and_verified_required() {
    let harness = TestHarness::new();
    let mut user = seeded_user(&harness, "ada");

    assert!(matches!(
        harness.core.authz.user_required(None),
        Err(ServiceError::AuthenticationRequired)
    ));
    assert!(harness.core.authz.user_required(Some(&user)).is_ok());

    assert!(matches!(
        harness.core.authz.verified_required(Some(&user)),
        Err(ServiceError::AuthenticationRequired)
    ));
    user.email_verified = true;
    assert!(harness.core.authz.verified_required(Some(&user)).is_ok());
}

#[tokio::test]
async fn test_require_permission_with_super_admin_bypass() {
    let harness = TestHarness::new();
    let member = seeded_user(&harness, "member");
    let root = seeded_user(&harness, "root");
    let org = Uuid::new_v4();
    let other_org = Uuid::new_v4();

    harness
        .store
        .seed_affiliation(Affiliation::new(org, member.user_key, Permission::User));
    harness
        .store
        .seed_affiliation(Affiliation::new(other_org, root.user_key, Permission::SuperAdmin));

    // Member meets `user` but not `admin` on their own organization.
    assert!(harness
        .core
        .authz
        .require_permission(member.user_key, org, Permission::User)
        .await
        .is_ok());
    assert!(matches!(
        harness
            .core
            .authz
            .require_permission(member.user_key, org, Permission::Admin)
            .await,
        Err(ServiceError::Forbidden)
    ));

    // Super admin passes anywhere, even with no affiliation on the target
    // organization.
    let effective = harness
        .core
        .authz
        .require_permission(root.user_key, org, Permission::Admin)
        .await
        .unwrap();
    assert_eq!(effective, Permission::SuperAdmin);
}
