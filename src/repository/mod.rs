use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    audit::{AuditEntry, AuditKind, AuditRecord},
    error::RepoError,
    models::{
        AdminChanges, AdminProfile, AdminView, CompanyChanges, CompanyProfile, CompanyView,
        Identity, IdentityChanges, JobPost, JobPostChanges, NewAdmin, NewCompany, NewIdentity,
        NewJobPost, NewStudentInformation, NewUserInformation, Status, StudentInformation,
        UserInformation, UserInformationChanges, UserView,
    },
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// EntityQuery
///
/// The one filter shape shared by every listing, search and select. Each
/// resource applies it to its own columns:
/// * `id` matches the resource's primary id.
/// * `statuses` restricts the resource's own status column.
/// * `key` is an exact match against username, last, first or middle name,
///   plus company name for companies and title for job posts.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    pub id: Option<Uuid>,
    pub statuses: &'static [Status],
    pub key: Option<String>,
}

impl EntityQuery {
    pub fn listing(statuses: &'static [Status]) -> Self {
        Self {
            id: None,
            statuses,
            key: None,
        }
    }

    pub fn search(key: impl Into<String>, statuses: &'static [Status]) -> Self {
        Self {
            id: None,
            statuses,
            key: Some(key.into()),
        }
    }

    pub fn select(id: Uuid) -> Self {
        Self {
            id: Some(id),
            statuses: &Status::ALL,
            key: None,
        }
    }
}

/// Repository Trait
///
/// Read access plus the entry point for transactional writes. Every mutation
/// goes through a [`UnitOfWork`] obtained from [`Repository::begin`].
///
/// **Send + Sync + async_trait** are required so `Arc<dyn Repository>` can live
/// in the axum state.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity & Profiles ---
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, RepoError>;
    // Exact and case-sensitive.
    async fn find_identity_by_username(&self, username: &str)
    -> Result<Option<Identity>, RepoError>;
    // Looked up by the owning identity, any status.
    async fn find_admin(&self, identity_id: Uuid) -> Result<Option<AdminProfile>, RepoError>;
    async fn find_company(&self, identity_id: Uuid) -> Result<Option<CompanyProfile>, RepoError>;

    // --- Read Views ---
    async fn query_users(&self, query: &EntityQuery) -> Result<Vec<UserView>, RepoError>;
    async fn query_admins(&self, query: &EntityQuery) -> Result<Vec<AdminView>, RepoError>;
    async fn query_companies(&self, query: &EntityQuery) -> Result<Vec<CompanyView>, RepoError>;
    async fn query_job_posts(&self, query: &EntityQuery) -> Result<Vec<JobPost>, RepoError>;

    /// audit_trail
    ///
    /// Entries for any of the (kind, subject) pairs, newest first, with the
    /// operator resolved.
    async fn audit_trail(
        &self,
        subjects: &[(AuditKind, Uuid)],
    ) -> Result<Vec<AuditRecord>, RepoError>;

    // --- Writes ---
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError>;
}

/// UnitOfWork
///
/// A transaction. Nothing written through it is visible to other readers until
/// `commit`; dropping it rolls back.
///
/// Update methods return `Ok(None)` when the target row does not exist.
#[async_trait]
pub trait UnitOfWork: Send {
    /// True when another identity already holds `username`.
    async fn username_taken(
        &mut self,
        username: &str,
        except: Option<Uuid>,
    ) -> Result<bool, RepoError>;

    async fn insert_identity(&mut self, new: &NewIdentity) -> Result<Identity, RepoError>;
    async fn update_identity(
        &mut self,
        id: Uuid,
        changes: &IdentityChanges,
    ) -> Result<Option<Identity>, RepoError>;

    async fn insert_user_information(
        &mut self,
        identity_id: Uuid,
        new: &NewUserInformation,
    ) -> Result<UserInformation, RepoError>;
    async fn update_user_information(
        &mut self,
        identity_id: Uuid,
        changes: &UserInformationChanges,
    ) -> Result<Option<UserInformation>, RepoError>;

    async fn insert_student_information(
        &mut self,
        identity_id: Uuid,
        new: &NewStudentInformation,
    ) -> Result<StudentInformation, RepoError>;

    async fn insert_admin(
        &mut self,
        identity_id: Uuid,
        new: &NewAdmin,
    ) -> Result<AdminProfile, RepoError>;
    async fn update_admin(
        &mut self,
        identity_id: Uuid,
        changes: &AdminChanges,
    ) -> Result<Option<AdminProfile>, RepoError>;

    async fn insert_company(
        &mut self,
        identity_id: Uuid,
        new: &NewCompany,
    ) -> Result<CompanyProfile, RepoError>;
    async fn update_company(
        &mut self,
        identity_id: Uuid,
        changes: &CompanyChanges,
    ) -> Result<Option<CompanyProfile>, RepoError>;

    async fn insert_job_post(
        &mut self,
        company_id: Uuid,
        new: &NewJobPost,
    ) -> Result<JobPost, RepoError>;
    // Scoped to `company_id`: posts of other companies are reported as absent.
    async fn update_job_post(
        &mut self,
        company_id: Uuid,
        changes: &JobPostChanges,
    ) -> Result<Option<JobPost>, RepoError>;

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), RepoError>;

    async fn commit(self: Box<Self>) -> Result<(), RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
