mod common;

use career_portal::{
    audit::{AuditKind, AuditType, AuditedTransaction, attach_trails},
    models::{IdentityChanges, NewIdentity, Status},
    repository::{EntityQuery, Repository},
};
use common::TestApp;

fn new_identity(username: &str) -> NewIdentity {
    NewIdentity {
        username: username.into(),
        password_hash: "$argon2id$placeholder".into(),
        status: Status::Ok,
    }
}

#[tokio::test]
async fn committed_entries_share_operator_and_timestamp() {
    let app = TestApp::new();
    let operator = app.seed_account("operator", Status::Ok).await;

    let mut tx = AuditedTransaction::begin(app.repo.as_ref(), Some(operator.id))
        .await
        .unwrap();
    let identity = tx.store().insert_identity(&new_identity("jdoe")).await.unwrap();
    tx.record(AuditKind::User, AuditType::Create, identity.id, &identity)
        .await
        .unwrap();
    let updated = tx
        .store()
        .update_identity(
            identity.id,
            &IdentityChanges {
                status: Some(Status::Unverified),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    tx.record(AuditKind::User, AuditType::Update, updated.id, &updated)
        .await
        .unwrap();
    assert_eq!(tx.commit().await.unwrap(), 2);

    let entries = app.repo.audit_entries().await;
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.operator_id == Some(operator.id)));
    assert_eq!(entries[0].recorded_at, entries[1].recorded_at);
    assert_eq!(entries[0].entry_type, AuditType::Create);
    assert_eq!(entries[1].entry_type, AuditType::Update);
    assert_eq!(entries[1].content["status"], "unverified");
}

#[tokio::test]
async fn snapshots_never_contain_the_password_hash() {
    let app = TestApp::new();

    let mut tx = AuditedTransaction::begin(app.repo.as_ref(), None).await.unwrap();
    let identity = tx.store().insert_identity(&new_identity("jdoe")).await.unwrap();
    tx.record(AuditKind::User, AuditType::Create, identity.id, &identity)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let entry = &app.repo.audit_entries().await[0];
    assert_eq!(entry.content["username"], "jdoe");
    assert!(entry.content.get("passwordHash").is_none());
    assert!(!entry.content.to_string().contains("argon2"));
}

#[tokio::test]
async fn dropping_without_commit_rolls_back_mutations_and_entries() {
    let app = TestApp::new();

    {
        let mut tx = AuditedTransaction::begin(app.repo.as_ref(), None).await.unwrap();
        let identity = tx.store().insert_identity(&new_identity("jdoe")).await.unwrap();
        tx.record(AuditKind::User, AuditType::Create, identity.id, &identity)
            .await
            .unwrap();
    }

    assert_eq!(app.repo.identity_count().await, 0);
    assert!(app.repo.audit_entries().await.is_empty());
}

#[tokio::test]
async fn failed_append_leaves_no_trace_of_the_mutation() {
    let app = TestApp::new();
    app.repo.fail_audit_writes(true);

    let mut tx = AuditedTransaction::begin(app.repo.as_ref(), None).await.unwrap();
    let identity = tx.store().insert_identity(&new_identity("jdoe")).await.unwrap();
    let result = tx
        .record(AuditKind::User, AuditType::Create, identity.id, &identity)
        .await;
    assert!(result.is_err());
    drop(tx);

    assert_eq!(app.repo.identity_count().await, 0);
    assert!(app.repo.audit_entries().await.is_empty());
}

#[tokio::test]
async fn trails_are_newest_first_with_operator_resolved() {
    let app = TestApp::new();
    let operator = app.seed_account("operator", Status::Ok).await;

    let mut tx = AuditedTransaction::begin(app.repo.as_ref(), Some(operator.id))
        .await
        .unwrap();
    let identity = tx.store().insert_identity(&new_identity("jdoe")).await.unwrap();
    tx.record(AuditKind::User, AuditType::Create, identity.id, &identity)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = AuditedTransaction::begin(app.repo.as_ref(), Some(operator.id))
        .await
        .unwrap();
    let renamed = tx
        .store()
        .update_identity(
            identity.id,
            &IdentityChanges {
                username: Some("jdoe2".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    tx.record(AuditKind::User, AuditType::Update, renamed.id, &renamed)
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let trail = app
        .repo
        .audit_trail(&[(AuditKind::User, identity.id)])
        .await
        .unwrap();

    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].entry_type, AuditType::Update);
    assert_eq!(trail[1].entry_type, AuditType::Create);
    let op = trail[0].operator.as_ref().expect("operator resolved");
    assert_eq!(op.username, "operator");
    assert!(op.user_information.is_some());
}

#[tokio::test]
async fn attach_trails_splits_records_between_items() {
    let app = TestApp::new();
    let first = app.seed_account("alpha", Status::Ok).await;
    let second = app.seed_account("beta", Status::Ok).await;

    for identity in [&first, &second] {
        let mut tx = AuditedTransaction::begin(app.repo.as_ref(), None).await.unwrap();
        tx.record(AuditKind::User, AuditType::Create, identity.id, identity)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    let users = app
        .repo
        .query_users(&EntityQuery::listing(&[Status::Ok]))
        .await
        .unwrap();
    let tracked = attach_trails(app.repo.as_ref(), users).await.unwrap();

    assert_eq!(tracked.len(), 2);
    for item in &tracked {
        assert_eq!(item.logs.len(), 1);
        assert_eq!(item.logs[0].subject_id, item.entity.id);
        assert_eq!(item.logs[0].operator, None);
    }
}

#[tokio::test]
async fn entity_without_entries_has_an_empty_trail() {
    let app = TestApp::new();
    app.seed_account("quiet", Status::Ok).await;

    let users = app
        .repo
        .query_users(&EntityQuery::search("quiet", &Status::ALL))
        .await
        .unwrap();
    let tracked = attach_trails(app.repo.as_ref(), users).await.unwrap();

    assert_eq!(tracked.len(), 1);
    assert!(tracked[0].logs.is_empty());
}
