//! Audit trail: append-only change log for every tracked entity.
//!
//! Writes go through [`AuditedTransaction`], which owns the unit of work the
//! entity mutations run in, so the entries and the mutations commit or roll
//! back together. Reads go through [`attach_trails`], which resolves the trails
//! of a whole result set with one query.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::RepoError,
    models::{
        AdminView, CompanyView, JobPost, UserInformation, UserView,
    },
    repository::{Repository, UnitOfWork},
};

// --- Entry Kinds ---

/// AuditKind
///
/// One logical stream per tracked entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    User,
    UserInformation,
    StudentInformation,
    Admin,
    Company,
    JobPost,
}

impl AuditKind {
    pub const ALL: [AuditKind; 6] = [
        AuditKind::User,
        AuditKind::UserInformation,
        AuditKind::StudentInformation,
        AuditKind::Admin,
        AuditKind::Company,
        AuditKind::JobPost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::User => "user",
            AuditKind::UserInformation => "user_information",
            AuditKind::StudentInformation => "student_information",
            AuditKind::Admin => "admin",
            AuditKind::Company => "company",
            AuditKind::JobPost => "job_post",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for AuditKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AuditKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| format!("unknown audit kind '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditType {
    Create,
    Update,
}

impl AuditType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditType::Create => "create",
            AuditType::Update => "update",
        }
    }
}

impl TryFrom<String> for AuditType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "create" => Ok(AuditType::Create),
            "update" => Ok(AuditType::Update),
            other => Err(format!("unknown audit type '{other}'")),
        }
    }
}

// --- Write Side ---

/// AuditEntry
///
/// One row of the log as written. `content` is the post-write snapshot of the
/// subject; the password hash is never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub kind: AuditKind,
    pub entry_type: AuditType,
    pub subject_id: Uuid,
    pub operator_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
    pub content: serde_json::Value,
}

/// AuditedTransaction
///
/// Groups one logical operation: a single operator, a single timestamp, and
/// entries in the order they were recorded. Dropping it without calling
/// [`commit`](Self::commit) rolls back everything, mutations included.
pub struct AuditedTransaction {
    uow: Box<dyn UnitOfWork>,
    operator: Option<Uuid>,
    recorded_at: DateTime<Utc>,
    recorded: usize,
}

impl AuditedTransaction {
    /// `operator` is `None` only for self-service registration.
    pub async fn begin(repo: &dyn Repository, operator: Option<Uuid>) -> Result<Self, RepoError> {
        Ok(Self {
            uow: repo.begin().await?,
            operator,
            recorded_at: Utc::now(),
            recorded: 0,
        })
    }

    /// The unit of work entity mutations must run in.
    pub fn store(&mut self) -> &mut dyn UnitOfWork {
        self.uow.as_mut()
    }

    /// record
    ///
    /// Appends one entry for `subject_id` inside the open transaction.
    pub async fn record<T: Serialize>(
        &mut self,
        kind: AuditKind,
        entry_type: AuditType,
        subject_id: Uuid,
        snapshot: &T,
    ) -> Result<(), RepoError> {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            kind,
            entry_type,
            subject_id,
            operator_id: self.operator,
            recorded_at: self.recorded_at,
            content: serde_json::to_value(snapshot)?,
        };
        self.uow.append_audit(&entry).await?;
        self.recorded += 1;
        Ok(())
    }

    /// Commits mutations and entries together; returns the number of entries.
    pub async fn commit(self) -> Result<usize, RepoError> {
        let recorded = self.recorded;
        self.uow.commit().await?;
        tracing::debug!(entries = recorded, operator = ?self.operator, "audited transaction committed");
        Ok(recorded)
    }
}

// --- Read Side ---

/// OperatorSummary
///
/// Who performed a change, resolved at read time.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSummary {
    pub id: Uuid,
    pub username: String,
    pub user_information: Option<UserInformation>,
}

/// AuditRecord
///
/// An entry as returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub id: Uuid,
    pub kind: AuditKind,
    pub subject_id: Uuid,
    pub datetime: DateTime<Utc>,
    #[serde(rename = "type")]
    pub entry_type: AuditType,
    #[schema(value_type = Object)]
    pub content: serde_json::Value,
    pub operator: Option<OperatorSummary>,
}

/// Tracked
///
/// An entity serialized together with its trail under `logs`, newest first.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Tracked<T> {
    #[serde(flatten)]
    pub entity: T,
    pub logs: Vec<AuditRecord>,
}

/// Audited
///
/// Names the (kind, id) pairs whose entries make up an entity's trail.
pub trait Audited {
    fn audit_subjects(&self) -> Vec<(AuditKind, Uuid)>;
}

impl Audited for UserView {
    fn audit_subjects(&self) -> Vec<(AuditKind, Uuid)> {
        let mut subjects = vec![(AuditKind::User, self.id)];
        if let Some(info) = &self.user_information {
            subjects.push((AuditKind::UserInformation, info.id));
        }
        if let Some(student) = &self.student_information {
            subjects.push((AuditKind::StudentInformation, student.id));
        }
        subjects
    }
}

impl Audited for AdminView {
    fn audit_subjects(&self) -> Vec<(AuditKind, Uuid)> {
        let mut subjects = vec![(AuditKind::Admin, self.id), (AuditKind::User, self.user.id)];
        if let Some(info) = &self.user.user_information {
            subjects.push((AuditKind::UserInformation, info.id));
        }
        subjects
    }
}

impl Audited for CompanyView {
    fn audit_subjects(&self) -> Vec<(AuditKind, Uuid)> {
        let mut subjects = vec![(AuditKind::Company, self.id), (AuditKind::User, self.user.id)];
        if let Some(info) = &self.user.user_information {
            subjects.push((AuditKind::UserInformation, info.id));
        }
        subjects
    }
}

impl Audited for JobPost {
    fn audit_subjects(&self) -> Vec<(AuditKind, Uuid)> {
        vec![(AuditKind::JobPost, self.id)]
    }
}

/// attach_trails
///
/// Fetches the trails of every item with one shared query and distributes the
/// records back, keeping the newest-first order the store returned.
pub async fn attach_trails<T: Audited>(
    repo: &dyn Repository,
    items: Vec<T>,
) -> Result<Vec<Tracked<T>>, RepoError> {
    let subjects: Vec<(AuditKind, Uuid)> = items
        .iter()
        .flat_map(|item| item.audit_subjects())
        .collect();
    if subjects.is_empty() {
        return Ok(Vec::new());
    }

    let records = repo.audit_trail(&subjects).await?;

    Ok(items
        .into_iter()
        .map(|entity| {
            let own: HashSet<(AuditKind, Uuid)> = entity.audit_subjects().into_iter().collect();
            let logs = records
                .iter()
                .filter(|record| own.contains(&(record.kind, record.subject_id)))
                .cloned()
                .collect();
            Tracked { entity, logs }
        })
        .collect())
}
