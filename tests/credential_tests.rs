mod common;

use career_portal::{
    auth::{ProfileRef, credentials::AuthFailure},
    models::{RoleKind, Status},
};
use common::{PASSWORD, TestApp};

#[tokio::test]
async fn user_login_matches_username_and_password() {
    let app = TestApp::new();
    let identity = app.seed_account("jdoe", Status::Ok).await;

    let found = app
        .state
        .credentials
        .authenticate(app.repo.as_ref(), RoleKind::User, "jdoe", PASSWORD)
        .await
        .expect("credentials are correct");

    assert_eq!(found.identity.id, identity.id);
    assert_eq!(found.profile, None);
}

#[tokio::test]
async fn unknown_username_and_wrong_password_fail_differently_inside() {
    let app = TestApp::new();
    app.seed_account("jdoe", Status::Ok).await;
    let verifier = &app.state.credentials;

    let missing = verifier
        .authenticate(app.repo.as_ref(), RoleKind::User, "nobody", PASSWORD)
        .await;
    assert!(matches!(missing, Err(AuthFailure::NotFound)));

    let mismatch = verifier
        .authenticate(app.repo.as_ref(), RoleKind::User, "jdoe", "wrong")
        .await;
    assert!(matches!(mismatch, Err(AuthFailure::PasswordMismatch)));
}

#[tokio::test]
async fn username_lookup_is_case_sensitive() {
    let app = TestApp::new();
    app.seed_account("jdoe", Status::Ok).await;

    let result = app
        .state
        .credentials
        .authenticate(app.repo.as_ref(), RoleKind::User, "JDoe", PASSWORD)
        .await;

    assert!(matches!(result, Err(AuthFailure::NotFound)));
}

#[tokio::test]
async fn admin_login_requires_an_ok_admin_profile() {
    let app = TestApp::new();
    let plain = app.seed_account("plain", Status::Ok).await;
    let (admin_identity, admin) = app.seed_admin("root").await;
    let verifier = &app.state.credentials;

    let no_profile = verifier
        .authenticate(app.repo.as_ref(), RoleKind::Admin, &plain.username, PASSWORD)
        .await;
    assert!(matches!(no_profile, Err(AuthFailure::NotFound)));

    let found = verifier
        .authenticate(app.repo.as_ref(), RoleKind::Admin, "root", PASSWORD)
        .await
        .unwrap();
    assert_eq!(
        found.profile,
        Some(ProfileRef {
            kind: RoleKind::Admin,
            id: admin.id
        })
    );

    app.set_admin_status(&admin_identity, Status::Suspended).await;
    let suspended = verifier
        .authenticate(app.repo.as_ref(), RoleKind::Admin, "root", PASSWORD)
        .await;
    assert!(matches!(suspended, Err(AuthFailure::NotFound)));
}

#[tokio::test]
async fn company_login_embeds_the_company_profile() {
    let app = TestApp::new();
    let (_, company) = app.seed_company("acme", "Acme Corp").await;

    let found = app
        .state
        .credentials
        .authenticate(app.repo.as_ref(), RoleKind::Company, "acme", PASSWORD)
        .await
        .unwrap();

    assert_eq!(
        found.profile,
        Some(ProfileRef {
            kind: RoleKind::Company,
            id: company.id
        })
    );

    // A company account is not an admin.
    let as_admin = app
        .state
        .credentials
        .authenticate(app.repo.as_ref(), RoleKind::Admin, "acme", PASSWORD)
        .await;
    assert!(matches!(as_admin, Err(AuthFailure::NotFound)));
}

#[tokio::test]
async fn verification_never_writes() {
    let app = TestApp::new();
    app.seed_account("jdoe", Status::Ok).await;
    let before = app.repo.audit_entries().await.len();

    let _ = app
        .state
        .credentials
        .authenticate(app.repo.as_ref(), RoleKind::User, "jdoe", "wrong")
        .await;
    let _ = app
        .state
        .credentials
        .authenticate(app.repo.as_ref(), RoleKind::User, "jdoe", PASSWORD)
        .await;

    assert_eq!(app.repo.audit_entries().await.len(), before);
    assert_eq!(app.repo.identity_count().await, 1);
}

#[tokio::test]
async fn stored_hashes_are_argon2id_and_salted() {
    let app = TestApp::new();
    let first = app
        .state
        .credentials
        .hash_password(PASSWORD.into())
        .await
        .unwrap();
    let second = app
        .state
        .credentials
        .hash_password(PASSWORD.into())
        .await
        .unwrap();

    assert!(first.starts_with("$argon2id$"));
    assert_ne!(first, second);
}
