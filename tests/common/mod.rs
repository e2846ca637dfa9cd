#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use career_portal::{
    AppConfig, AppState, MemoryRepository, create_router,
    auth::Subject,
    models::{
        AdminChanges, AdminProfile, CompanyChanges, CompanyProfile, Identity, IdentityChanges,
        NewAdmin, NewCompany, NewIdentity, NewUserInformation, Status,
    },
    repository::{Repository, RepositoryState},
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const PASSWORD: &str = "correct horse battery staple";

/// A router over a fresh in-memory store, plus handles for inspection.
pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
}

impl TestApp {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let state = AppState::new(repo.clone() as RepositoryState, AppConfig::default())
            .expect("test hashing parameters are valid");
        Self { state, repo }
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Inserts an account directly, bypassing handlers and audit.
    pub async fn seed_account(&self, username: &str, status: Status) -> Identity {
        let password_hash = self
            .state
            .credentials
            .hash_password(PASSWORD.to_string())
            .await
            .unwrap();
        let mut uow = self.repo.begin().await.unwrap();
        let identity = uow
            .insert_identity(&NewIdentity {
                username: username.to_string(),
                password_hash,
                status,
            })
            .await
            .unwrap();
        uow.insert_user_information(
            identity.id,
            &NewUserInformation {
                last_name: format!("{username}-last"),
                first_name: format!("{username}-first"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        uow.commit().await.unwrap();
        identity
    }

    pub async fn seed_admin(&self, username: &str) -> (Identity, AdminProfile) {
        let identity = self.seed_account(username, Status::Ok).await;
        let mut uow = self.repo.begin().await.unwrap();
        let admin = uow
            .insert_admin(
                identity.id,
                &NewAdmin {
                    role: "registrar".into(),
                },
            )
            .await
            .unwrap();
        uow.commit().await.unwrap();
        (identity, admin)
    }

    pub async fn seed_company(&self, username: &str, name: &str) -> (Identity, CompanyProfile) {
        let identity = self.seed_account(username, Status::Ok).await;
        let mut uow = self.repo.begin().await.unwrap();
        let company = uow
            .insert_company(
                identity.id,
                &NewCompany {
                    name: name.into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        uow.commit().await.unwrap();
        (identity, company)
    }

    pub async fn set_status(&self, identity: &Identity, status: Status) {
        let mut uow = self.repo.begin().await.unwrap();
        uow.update_identity(
            identity.id,
            &IdentityChanges {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("identity exists");
        uow.commit().await.unwrap();
    }

    pub async fn set_admin_status(&self, identity: &Identity, status: Status) {
        let mut uow = self.repo.begin().await.unwrap();
        uow.update_admin(
            identity.id,
            &AdminChanges {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("admin exists");
        uow.commit().await.unwrap();
    }

    pub async fn set_company_status(&self, identity: &Identity, status: Status) {
        let mut uow = self.repo.begin().await.unwrap();
        uow.update_company(
            identity.id,
            &CompanyChanges {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .expect("company exists");
        uow.commit().await.unwrap();
    }

    /// A valid access token for `identity`.
    pub fn access_token(&self, identity: &Identity) -> String {
        self.state
            .tokens
            .issue_access(
                &Subject {
                    id: identity.id,
                    username: identity.username.clone(),
                    profile: None,
                },
                self.state.tokens.access_ttl(),
            )
            .unwrap()
    }

    /// POSTs `body` as JSON and returns the status with the parsed body
    /// (`Value::Null` when empty).
    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(uri, token, Some("application/json"), body.to_string())
            .await
    }

    /// POSTs a raw body, with `content_type` only when given.
    pub async fn send(
        &self,
        uri: &str,
        token: Option<&str>,
        content_type: Option<&str>,
        body: String,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body)).unwrap();

        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

pub fn account_body(username: &str) -> Value {
    serde_json::json!({
        "username": username,
        "password": PASSWORD,
    })
}

pub fn information_body(last: &str, first: &str) -> Value {
    serde_json::json!({
        "lastName": last,
        "firstName": first,
    })
}
