//! In-process store implementing the same traits as Postgres.
//!
//! A unit of work holds the store's lock for its whole lifetime and works on a
//! staged copy of the state; `commit` swaps the copy in. Units of work are
//! therefore fully serialized, which is what makes the username check inside
//! them a real uniqueness guarantee.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{EntityQuery, Repository, UnitOfWork};
use crate::{
    audit::{AuditEntry, AuditKind, AuditRecord, OperatorSummary},
    error::RepoError,
    models::{
        AccountSummary, AdminChanges, AdminProfile, AdminView, CompanyChanges, CompanyProfile,
        CompanyView, Identity, IdentityChanges, JobPost, JobPostChanges, NewAdmin, NewCompany,
        NewIdentity, NewJobPost, NewStudentInformation, NewUserInformation, Status,
        StudentInformation, UserInformation, UserInformationChanges, UserView,
    },
};

/// Lookup
///
/// One point read served by the repository, recorded in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Identity(Uuid),
    IdentityByUsername(String),
    Admin(Uuid),
    Company(Uuid),
}

#[derive(Debug, Clone, Default)]
struct State {
    identities: Vec<Identity>,
    information: Vec<UserInformation>,
    students: Vec<StudentInformation>,
    admins: Vec<AdminProfile>,
    companies: Vec<CompanyProfile>,
    job_posts: Vec<JobPost>,
    audit: Vec<AuditEntry>,
}

impl State {
    fn information_of(&self, identity_id: Uuid) -> Option<UserInformation> {
        self.information
            .iter()
            .find(|info| info.identity_id == identity_id)
            .cloned()
    }

    fn summary_of(&self, identity: &Identity) -> AccountSummary {
        AccountSummary {
            id: identity.id,
            username: identity.username.clone(),
            status: identity.status,
            user_information: self.information_of(identity.id),
        }
    }

    fn identity(&self, id: Uuid) -> Option<&Identity> {
        self.identities.iter().find(|identity| identity.id == id)
    }
}

/// Exact match of `key` against the account's username and person names.
fn names_match(account: &AccountSummary, key: &str) -> bool {
    account.username == key
        || account.user_information.as_ref().is_some_and(|info| {
            info.last_name == key
                || info.first_name == key
                || info.middle_name.as_deref() == Some(key)
        })
}

fn admitted(query: &EntityQuery, id: Uuid, status: Status) -> bool {
    query.statuses.contains(&status) && query.id.is_none_or(|wanted| wanted == id)
}

fn name_order(account: &AccountSummary) -> (String, String, String, String) {
    let info = account.user_information.as_ref();
    (
        account.username.clone(),
        info.map(|i| i.last_name.clone()).unwrap_or_default(),
        info.map(|i| i.first_name.clone()).unwrap_or_default(),
        info.and_then(|i| i.middle_name.clone()).unwrap_or_default(),
    )
}

/// MemoryRepository
///
/// Used by the test-suite and for running the service without a database.
#[derive(Default)]
pub struct MemoryRepository {
    state: Arc<Mutex<State>>,
    lookups: Mutex<Vec<Lookup>>,
    fail_audit: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent audit append fail.
    pub fn fail_audit_writes(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    /// Point reads served so far, oldest first.
    pub async fn lookups(&self) -> Vec<Lookup> {
        self.lookups.lock().await.clone()
    }

    pub async fn clear_lookups(&self) {
        self.lookups.lock().await.clear();
    }

    /// Every committed audit entry in append order.
    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }

    pub async fn identity_count(&self) -> usize {
        self.state.lock().await.identities.len()
    }

    async fn log(&self, lookup: Lookup) {
        self.lookups.lock().await.push(lookup);
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, RepoError> {
        self.log(Lookup::Identity(id)).await;
        Ok(self.state.lock().await.identity(id).cloned())
    }

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, RepoError> {
        self.log(Lookup::IdentityByUsername(username.to_string())).await;
        Ok(self
            .state
            .lock()
            .await
            .identities
            .iter()
            .find(|identity| identity.username == username)
            .cloned())
    }

    async fn find_admin(&self, identity_id: Uuid) -> Result<Option<AdminProfile>, RepoError> {
        self.log(Lookup::Admin(identity_id)).await;
        Ok(self
            .state
            .lock()
            .await
            .admins
            .iter()
            .find(|admin| admin.identity_id == identity_id)
            .cloned())
    }

    async fn find_company(&self, identity_id: Uuid) -> Result<Option<CompanyProfile>, RepoError> {
        self.log(Lookup::Company(identity_id)).await;
        Ok(self
            .state
            .lock()
            .await
            .companies
            .iter()
            .find(|company| company.identity_id == identity_id)
            .cloned())
    }

    async fn query_users(&self, query: &EntityQuery) -> Result<Vec<UserView>, RepoError> {
        let state = self.state.lock().await;
        let mut rows: Vec<(AccountSummary, Option<StudentInformation>)> = state
            .identities
            .iter()
            .filter(|identity| admitted(query, identity.id, identity.status))
            .map(|identity| {
                let student = state
                    .students
                    .iter()
                    .find(|student| student.identity_id == identity.id)
                    .cloned();
                (state.summary_of(identity), student)
            })
            .filter(|(account, _)| query.key.as_deref().is_none_or(|key| names_match(account, key)))
            .collect();
        rows.sort_by_key(|(account, _)| name_order(account));

        Ok(rows
            .into_iter()
            .map(|(account, student_information)| UserView {
                id: account.id,
                username: account.username,
                status: account.status,
                user_information: account.user_information,
                student_information,
            })
            .collect())
    }

    async fn query_admins(&self, query: &EntityQuery) -> Result<Vec<AdminView>, RepoError> {
        let state = self.state.lock().await;
        let mut views = Vec::new();
        for admin in state.admins.iter().filter(|a| admitted(query, a.id, a.status)) {
            let identity = state
                .identity(admin.identity_id)
                .ok_or_else(|| RepoError::Corrupt(format!("admin {} has no identity", admin.id)))?;
            let user = state.summary_of(identity);
            if query.key.as_deref().is_none_or(|key| names_match(&user, key)) {
                views.push(AdminView {
                    id: admin.id,
                    role: admin.role.clone(),
                    status: admin.status,
                    user,
                });
            }
        }
        views.sort_by_key(|view| name_order(&view.user));
        Ok(views)
    }

    async fn query_companies(&self, query: &EntityQuery) -> Result<Vec<CompanyView>, RepoError> {
        let state = self.state.lock().await;
        let mut views = Vec::new();
        for company in state.companies.iter().filter(|c| admitted(query, c.id, c.status)) {
            let identity = state.identity(company.identity_id).ok_or_else(|| {
                RepoError::Corrupt(format!("company {} has no identity", company.id))
            })?;
            let user = state.summary_of(identity);
            let matches = query
                .key
                .as_deref()
                .is_none_or(|key| company.name == key || names_match(&user, key));
            if matches {
                views.push(CompanyView {
                    id: company.id,
                    name: company.name.clone(),
                    description: company.description.clone(),
                    profile_image: company.profile_image.clone(),
                    profile_cover: company.profile_cover.clone(),
                    status: company.status,
                    user,
                });
            }
        }
        views.sort_by(|a, b| (&a.name, &a.user.username).cmp(&(&b.name, &b.user.username)));
        Ok(views)
    }

    async fn query_job_posts(&self, query: &EntityQuery) -> Result<Vec<JobPost>, RepoError> {
        let state = self.state.lock().await;
        let mut posts: Vec<JobPost> = state
            .job_posts
            .iter()
            .filter(|post| admitted(query, post.id, post.status))
            .filter(|post| query.key.as_deref().is_none_or(|key| post.title == key))
            .cloned()
            .collect();
        posts.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(posts)
    }

    async fn audit_trail(
        &self,
        subjects: &[(AuditKind, Uuid)],
    ) -> Result<Vec<AuditRecord>, RepoError> {
        let wanted: HashSet<&(AuditKind, Uuid)> = subjects.iter().collect();
        let state = self.state.lock().await;

        let mut records: Vec<(usize, AuditRecord)> = state
            .audit
            .iter()
            .enumerate()
            .filter(|(_, entry)| wanted.contains(&(entry.kind, entry.subject_id)))
            .map(|(seq, entry)| {
                let operator = entry
                    .operator_id
                    .and_then(|id| state.identity(id))
                    .map(|identity| OperatorSummary {
                        id: identity.id,
                        username: identity.username.clone(),
                        user_information: state.information_of(identity.id),
                    });
                let record = AuditRecord {
                    id: entry.id,
                    kind: entry.kind,
                    subject_id: entry.subject_id,
                    datetime: entry.recorded_at,
                    entry_type: entry.entry_type,
                    content: entry.content.clone(),
                    operator,
                };
                (seq, record)
            })
            .collect();
        records.sort_by(|(a_seq, a), (b_seq, b)| {
            b.datetime.cmp(&a.datetime).then(b_seq.cmp(a_seq))
        });

        Ok(records.into_iter().map(|(_, record)| record).collect())
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = State::clone(&guard);
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            staged,
            fail_audit: self.fail_audit.load(Ordering::SeqCst),
        }))
    }
}

/// MemoryUnitOfWork
pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<State>,
    staged: State,
    fail_audit: bool,
}

impl MemoryUnitOfWork {
    fn taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.staged
            .identities
            .iter()
            .any(|identity| identity.username == username && Some(identity.id) != except)
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn username_taken(
        &mut self,
        username: &str,
        except: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        Ok(self.taken(username, except))
    }

    async fn insert_identity(&mut self, new: &NewIdentity) -> Result<Identity, RepoError> {
        if self.taken(&new.username, None) {
            return Err(RepoError::DuplicateUsername(new.username.clone()));
        }
        let now = Utc::now();
        let identity = Identity {
            id: Uuid::new_v4(),
            username: new.username.clone(),
            password_hash: new.password_hash.clone(),
            status: new.status,
            created_at: now,
            updated_at: now,
        };
        self.staged.identities.push(identity.clone());
        Ok(identity)
    }

    async fn update_identity(
        &mut self,
        id: Uuid,
        changes: &IdentityChanges,
    ) -> Result<Option<Identity>, RepoError> {
        if let Some(username) = &changes.username
            && self.taken(username, Some(id))
        {
            return Err(RepoError::DuplicateUsername(username.clone()));
        }
        let Some(identity) = self.staged.identities.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if let Some(username) = &changes.username {
            identity.username = username.clone();
        }
        if let Some(hash) = &changes.password_hash {
            identity.password_hash = hash.clone();
        }
        if let Some(status) = changes.status {
            identity.status = status;
        }
        identity.updated_at = Utc::now();
        Ok(Some(identity.clone()))
    }

    async fn insert_user_information(
        &mut self,
        identity_id: Uuid,
        new: &NewUserInformation,
    ) -> Result<UserInformation, RepoError> {
        let info = UserInformation {
            id: Uuid::new_v4(),
            identity_id,
            last_name: new.last_name.clone(),
            first_name: new.first_name.clone(),
            middle_name: new.middle_name.clone(),
            suffix: new.suffix.clone(),
            gender: new.gender.clone(),
            birth_date: new.birth_date,
        };
        self.staged.information.push(info.clone());
        Ok(info)
    }

    async fn update_user_information(
        &mut self,
        identity_id: Uuid,
        changes: &UserInformationChanges,
    ) -> Result<Option<UserInformation>, RepoError> {
        let Some(info) = self
            .staged
            .information
            .iter_mut()
            .find(|info| info.identity_id == identity_id)
        else {
            return Ok(None);
        };
        if let Some(value) = &changes.last_name {
            info.last_name = value.clone();
        }
        if let Some(value) = &changes.first_name {
            info.first_name = value.clone();
        }
        if changes.middle_name.is_some() {
            info.middle_name = changes.middle_name.clone();
        }
        if changes.suffix.is_some() {
            info.suffix = changes.suffix.clone();
        }
        if changes.gender.is_some() {
            info.gender = changes.gender.clone();
        }
        if changes.birth_date.is_some() {
            info.birth_date = changes.birth_date;
        }
        Ok(Some(info.clone()))
    }

    async fn insert_student_information(
        &mut self,
        identity_id: Uuid,
        new: &NewStudentInformation,
    ) -> Result<StudentInformation, RepoError> {
        let student = StudentInformation {
            id: Uuid::new_v4(),
            identity_id,
            school_id: new.school_id.clone(),
            course: new.course.clone(),
            major: new.major.clone(),
        };
        self.staged.students.push(student.clone());
        Ok(student)
    }

    async fn insert_admin(
        &mut self,
        identity_id: Uuid,
        new: &NewAdmin,
    ) -> Result<AdminProfile, RepoError> {
        let admin = AdminProfile {
            id: Uuid::new_v4(),
            identity_id,
            role: new.role.clone(),
            status: Status::Ok,
        };
        self.staged.admins.push(admin.clone());
        Ok(admin)
    }

    async fn update_admin(
        &mut self,
        identity_id: Uuid,
        changes: &AdminChanges,
    ) -> Result<Option<AdminProfile>, RepoError> {
        let Some(admin) = self
            .staged
            .admins
            .iter_mut()
            .find(|admin| admin.identity_id == identity_id)
        else {
            return Ok(None);
        };
        if let Some(role) = &changes.role {
            admin.role = role.clone();
        }
        if let Some(status) = changes.status {
            admin.status = status;
        }
        Ok(Some(admin.clone()))
    }

    async fn insert_company(
        &mut self,
        identity_id: Uuid,
        new: &NewCompany,
    ) -> Result<CompanyProfile, RepoError> {
        let company = CompanyProfile {
            id: Uuid::new_v4(),
            identity_id,
            name: new.name.clone(),
            description: new.description.clone(),
            profile_image: new.profile_image.clone(),
            profile_cover: new.profile_cover.clone(),
            status: Status::Ok,
        };
        self.staged.companies.push(company.clone());
        Ok(company)
    }

    async fn update_company(
        &mut self,
        identity_id: Uuid,
        changes: &CompanyChanges,
    ) -> Result<Option<CompanyProfile>, RepoError> {
        let Some(company) = self
            .staged
            .companies
            .iter_mut()
            .find(|company| company.identity_id == identity_id)
        else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            company.name = name.clone();
        }
        if changes.description.is_some() {
            company.description = changes.description.clone();
        }
        if changes.profile_image.is_some() {
            company.profile_image = changes.profile_image.clone();
        }
        if changes.profile_cover.is_some() {
            company.profile_cover = changes.profile_cover.clone();
        }
        if let Some(status) = changes.status {
            company.status = status;
        }
        Ok(Some(company.clone()))
    }

    async fn insert_job_post(
        &mut self,
        company_id: Uuid,
        new: &NewJobPost,
    ) -> Result<JobPost, RepoError> {
        let now = Utc::now();
        let post = JobPost {
            id: Uuid::new_v4(),
            company_id,
            title: new.title.clone(),
            description: new.description.clone(),
            slots: new.slots,
            status: Status::Ok,
            created_at: now,
            updated_at: now,
        };
        self.staged.job_posts.push(post.clone());
        Ok(post)
    }

    async fn update_job_post(
        &mut self,
        company_id: Uuid,
        changes: &JobPostChanges,
    ) -> Result<Option<JobPost>, RepoError> {
        let Some(post) = self
            .staged
            .job_posts
            .iter_mut()
            .find(|post| post.id == changes.id && post.company_id == company_id)
        else {
            return Ok(None);
        };
        if let Some(title) = &changes.title {
            post.title = title.clone();
        }
        if changes.description.is_some() {
            post.description = changes.description.clone();
        }
        if let Some(slots) = changes.slots {
            post.slots = slots;
        }
        if let Some(status) = changes.status {
            post.status = status;
        }
        post.updated_at = Utc::now();
        Ok(Some(post.clone()))
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), RepoError> {
        if self.fail_audit {
            return Err(RepoError::Injected("audit append"));
        }
        self.staged.audit.push(entry.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let MemoryUnitOfWork {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}
