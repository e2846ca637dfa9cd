//! Runs the Postgres repository against a real database. Skipped unless
//! `TEST_DATABASE_URL` is set; every test uses fresh usernames so the suite can
//! share one database across runs.

use career_portal::{
    audit::{AuditKind, AuditType, AuditedTransaction},
    error::RepoError,
    models::{
        AdminChanges, IdentityChanges, JobPostChanges, NewAdmin, NewCompany, NewIdentity,
        NewJobPost, NewUserInformation, Status,
    },
    repository::{EntityQuery, PostgresRepository, Repository},
};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Option<Self> {
        dotenv::dotenv().ok();

        let Ok(db_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping Postgres integration test");
            return None;
        };

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        Some(DbTestContext { pool })
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

// --- Test Data Helpers ---

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn identity(username: &str) -> NewIdentity {
    NewIdentity {
        username: username.to_string(),
        password_hash: "$argon2id$v=19$m=256,t=1,p=1$placeholder".to_string(),
        status: Status::Ok,
    }
}

fn information(last: &str) -> NewUserInformation {
    NewUserInformation {
        last_name: last.to_string(),
        first_name: "Test".to_string(),
        ..Default::default()
    }
}

// --- Tests ---

#[tokio::test]
async fn insert_and_find_identity_by_exact_username() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let username = unique("student");

    let mut uow = repo.begin().await.unwrap();
    let created = uow.insert_identity(&identity(&username)).await.unwrap();
    uow.commit().await.unwrap();

    let found = repo
        .find_identity_by_username(&username)
        .await
        .unwrap()
        .expect("identity was committed");
    assert_eq!(found.id, created.id);
    assert_eq!(found.status, Status::Ok);

    let upper = username.to_uppercase();
    assert!(repo.find_identity_by_username(&upper).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_username_maps_to_its_own_error() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let username = unique("dup");

    let mut uow = repo.begin().await.unwrap();
    uow.insert_identity(&identity(&username)).await.unwrap();
    uow.commit().await.unwrap();

    let mut uow = repo.begin().await.unwrap();
    let err = uow.insert_identity(&identity(&username)).await.unwrap_err();
    assert!(matches!(err, RepoError::DuplicateUsername(name) if name == username));
}

#[tokio::test]
async fn uncommitted_work_is_rolled_back() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let username = unique("ghost");

    {
        let mut tx = AuditedTransaction::begin(&repo, None).await.unwrap();
        let created = tx.store().insert_identity(&identity(&username)).await.unwrap();
        tx.record(AuditKind::User, AuditType::Create, created.id, &created)
            .await
            .unwrap();
    }

    assert!(repo.find_identity_by_username(&username).await.unwrap().is_none());
}

#[tokio::test]
async fn partial_updates_keep_unspecified_columns() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let username = unique("admin");

    let mut uow = repo.begin().await.unwrap();
    let created = uow.insert_identity(&identity(&username)).await.unwrap();
    uow.insert_user_information(created.id, &information("Admin"))
        .await
        .unwrap();
    uow.insert_admin(
        created.id,
        &NewAdmin {
            role: "registrar".into(),
        },
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();

    let mut uow = repo.begin().await.unwrap();
    let updated = uow
        .update_identity(
            created.id,
            &IdentityChanges {
                status: Some(Status::Unverified),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    let admin = uow
        .update_admin(
            created.id,
            &AdminChanges {
                status: Some(Status::Suspended),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    uow.commit().await.unwrap();

    assert_eq!(updated.username, username);
    assert_eq!(updated.password_hash, created.password_hash);
    assert_eq!(admin.role, "registrar");
    assert_eq!(admin.status, Status::Suspended);

    let mut uow = repo.begin().await.unwrap();
    let missing = uow
        .update_identity(Uuid::new_v4(), &IdentityChanges::default())
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn job_post_updates_are_scoped_to_the_owner() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();

    let mut uow = repo.begin().await.unwrap();
    let owner = uow.insert_identity(&identity(&unique("owner"))).await.unwrap();
    let other = uow.insert_identity(&identity(&unique("other"))).await.unwrap();
    let owner_company = uow
        .insert_company(
            owner.id,
            &NewCompany {
                name: unique("Owner Co"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let other_company = uow
        .insert_company(
            other.id,
            &NewCompany {
                name: unique("Other Co"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let post = uow
        .insert_job_post(
            owner_company.id,
            &NewJobPost {
                title: unique("Intern"),
                description: None,
                slots: 1,
            },
        )
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let changes = JobPostChanges {
        id: post.id,
        slots: Some(4),
        ..Default::default()
    };
    let mut uow = repo.begin().await.unwrap();
    assert!(
        uow.update_job_post(other_company.id, &changes)
            .await
            .unwrap()
            .is_none()
    );
    let updated = uow
        .update_job_post(owner_company.id, &changes)
        .await
        .unwrap()
        .unwrap();
    uow.commit().await.unwrap();

    assert_eq!(updated.slots, 4);
    assert_eq!(updated.title, post.title);
}

#[tokio::test]
async fn trail_comes_back_newest_first_with_operator() {
    let Some(ctx) = DbTestContext::setup().await else {
        return;
    };
    let repo = ctx.repository();
    let operator_name = unique("operator");

    let mut uow = repo.begin().await.unwrap();
    let operator = uow.insert_identity(&identity(&operator_name)).await.unwrap();
    uow.insert_user_information(operator.id, &information("Operator"))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    let username = unique("subject");
    let mut tx = AuditedTransaction::begin(&repo, Some(operator.id)).await.unwrap();
    let created = tx.store().insert_identity(&identity(&username)).await.unwrap();
    tx.record(AuditKind::User, AuditType::Create, created.id, &created)
        .await
        .unwrap();
    let renamed = tx
        .store()
        .update_identity(
            created.id,
            &IdentityChanges {
                username: Some(format!("{username}-renamed")),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    tx.record(AuditKind::User, AuditType::Update, renamed.id, &renamed)
        .await
        .unwrap();
    assert_eq!(tx.commit().await.unwrap(), 2);

    let trail = repo
        .audit_trail(&[(AuditKind::User, created.id)])
        .await
        .unwrap();
    assert_eq!(trail.len(), 2);
    // Same timestamp: insertion order breaks the tie.
    assert_eq!(trail[0].entry_type, AuditType::Update);
    assert_eq!(trail[1].entry_type, AuditType::Create);
    let op = trail[0].operator.as_ref().unwrap();
    assert_eq!(op.username, operator_name);
    assert_eq!(
        op.user_information.as_ref().map(|i| i.last_name.as_str()),
        Some("Operator")
    );

    let users = repo
        .query_users(&EntityQuery::search(renamed.username.clone(), &Status::ALL))
        .await
        .unwrap();
    assert_eq!(users.len(), 1);
}
