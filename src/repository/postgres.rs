use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction, query_builder::QueryBuilder};
use std::collections::HashSet;
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

const IDENTITY_COLUMNS: &str = "id, username, password_hash, status, created_at, updated_at";
const INFORMATION_COLUMNS: &str =
    "id, identity_id, last_name, first_name, middle_name, suffix, gender, birth_date";
const STUDENT_COLUMNS: &str = "id, identity_id, school_id, course, major";
const ADMIN_COLUMNS: &str = "id, identity_id, role, status";
const COMPANY_COLUMNS: &str =
    "id, identity_id, name, description, profile_image, profile_cover, status";
const JOB_POST_COLUMNS: &str =
    "id, company_id, title, description, slots, status, created_at, updated_at";

// Account columns joined from `identities i` and `user_information ui`.
const ACCOUNT_SELECT: &str = r#"
    i.id AS account_id, i.username AS account_username, i.status AS account_status,
    ui.id AS info_id, ui.identity_id AS info_identity_id, ui.last_name, ui.first_name,
    ui.middle_name, ui.suffix, ui.gender, ui.birth_date
"#;

const NAME_KEYS: &[&str] = &["i.username", "ui.last_name", "ui.first_name", "ui.middle_name"];

// --- Row Mapping ---

/// Nullable `user_information` columns from a LEFT JOIN.
#[derive(FromRow)]
struct InformationColumns {
    info_id: Option<Uuid>,
    info_identity_id: Option<Uuid>,
    last_name: Option<String>,
    first_name: Option<String>,
    middle_name: Option<String>,
    suffix: Option<String>,
    gender: Option<String>,
    birth_date: Option<NaiveDate>,
}

impl InformationColumns {
    fn into_information(self) -> Option<UserInformation> {
        Some(UserInformation {
            id: self.info_id?,
            identity_id: self.info_identity_id?,
            last_name: self.last_name?,
            first_name: self.first_name?,
            middle_name: self.middle_name,
            suffix: self.suffix,
            gender: self.gender,
            birth_date: self.birth_date,
        })
    }
}

#[derive(FromRow)]
struct AccountRow {
    account_id: Uuid,
    account_username: String,
    account_status: String,
    #[sqlx(flatten)]
    information: InformationColumns,
}

impl AccountRow {
    fn into_summary(self) -> Result<AccountSummary, RepoError> {
        Ok(AccountSummary {
            id: self.account_id,
            username: self.account_username,
            status: parse_status(&self.account_status)?,
            user_information: self.information.into_information(),
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    #[sqlx(flatten)]
    account: AccountRow,
    student_id: Option<Uuid>,
    school_id: Option<String>,
    course: Option<String>,
    major: Option<String>,
}

impl UserRow {
    fn into_view(self) -> Result<UserView, RepoError> {
        let identity_id = self.account.account_id;
        let student_information = match (self.student_id, self.school_id) {
            (Some(id), Some(school_id)) => Some(StudentInformation {
                id,
                identity_id,
                school_id,
                course: self.course,
                major: self.major,
            }),
            _ => None,
        };
        let account = self.account.into_summary()?;
        Ok(UserView {
            id: account.id,
            username: account.username,
            status: account.status,
            user_information: account.user_information,
            student_information,
        })
    }
}

#[derive(FromRow)]
struct AdminRow {
    id: Uuid,
    role: String,
    status: String,
    #[sqlx(flatten)]
    account: AccountRow,
}

impl AdminRow {
    fn into_view(self) -> Result<AdminView, RepoError> {
        Ok(AdminView {
            id: self.id,
            role: self.role,
            status: parse_status(&self.status)?,
            user: self.account.into_summary()?,
        })
    }
}

#[derive(FromRow)]
struct CompanyRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    profile_image: Option<String>,
    profile_cover: Option<String>,
    status: String,
    #[sqlx(flatten)]
    account: AccountRow,
}

impl CompanyRow {
    fn into_view(self) -> Result<CompanyView, RepoError> {
        Ok(CompanyView {
            id: self.id,
            name: self.name,
            description: self.description,
            profile_image: self.profile_image,
            profile_cover: self.profile_cover,
            status: parse_status(&self.status)?,
            user: self.account.into_summary()?,
        })
    }
}

#[derive(FromRow)]
struct TrailRow {
    id: Uuid,
    kind: String,
    entry_type: String,
    subject_id: Uuid,
    recorded_at: DateTime<Utc>,
    content: serde_json::Value,
    operator_id: Option<Uuid>,
    operator_username: Option<String>,
    #[sqlx(flatten)]
    information: InformationColumns,
}

impl TrailRow {
    fn into_record(self) -> Result<AuditRecord, RepoError> {
        let operator = match (self.operator_id, self.operator_username) {
            (Some(id), Some(username)) => Some(OperatorSummary {
                id,
                username,
                user_information: self.information.into_information(),
            }),
            _ => None,
        };
        Ok(AuditRecord {
            id: self.id,
            kind: AuditKind::try_from(self.kind).map_err(RepoError::Corrupt)?,
            subject_id: self.subject_id,
            datetime: self.recorded_at,
            entry_type: self.entry_type.try_into().map_err(RepoError::Corrupt)?,
            content: self.content,
            operator,
        })
    }
}

fn parse_status(value: &str) -> Result<Status, RepoError> {
    value.parse().map_err(RepoError::Corrupt)
}

fn status_names(statuses: &[Status]) -> Vec<String> {
    statuses.iter().map(|status| status.as_str().to_string()).collect()
}

/// Maps the username unique constraint to `DuplicateUsername`.
fn username_conflict(err: sqlx::Error, username: &str) -> RepoError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepoError::DuplicateUsername(username.to_string());
    }
    RepoError::from(err)
}

/// FilterColumns
///
/// Where a resource keeps the columns `EntityQuery` filters on.
struct FilterColumns {
    id: &'static str,
    status: &'static str,
    keys: &'static [&'static str],
}

/// push_filters
///
/// Appends the WHERE clause for `query`. Shared by all four listings so that
/// id, status and key filtering behave identically across resources.
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &EntityQuery, columns: &FilterColumns) {
    builder.push(" WHERE ");
    builder.push(columns.status);
    builder.push(" = ANY(");
    builder.push_bind(status_names(query.statuses));
    builder.push(")");

    if let Some(id) = query.id {
        builder.push(" AND ");
        builder.push(columns.id);
        builder.push(" = ");
        builder.push_bind(id);
    }

    if let Some(key) = &query.key {
        builder.push(" AND (");
        for (i, column) in columns.keys.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*column);
            builder.push(" = ");
            builder.push_bind(key.clone());
        }
        builder.push(")");
    }
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>, RepoError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE id = $1");
        Ok(sqlx::query_as::<_, Identity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, RepoError> {
        let sql = format!("SELECT {IDENTITY_COLUMNS} FROM identities WHERE username = $1");
        Ok(sqlx::query_as::<_, Identity>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_admin(&self, identity_id: Uuid) -> Result<Option<AdminProfile>, RepoError> {
        let sql = format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE identity_id = $1");
        Ok(sqlx::query_as::<_, AdminProfile>(&sql)
            .bind(identity_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_company(&self, identity_id: Uuid) -> Result<Option<CompanyProfile>, RepoError> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE identity_id = $1");
        Ok(sqlx::query_as::<_, CompanyProfile>(&sql)
            .bind(identity_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// query_users
    ///
    /// Every identity is a user; admins and companies show up here too.
    async fn query_users(&self, query: &EntityQuery) -> Result<Vec<UserView>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            r#"SELECT {ACCOUNT_SELECT},
                si.id AS student_id, si.school_id, si.course, si.major
            FROM identities i
            LEFT JOIN user_information ui ON ui.identity_id = i.id
            LEFT JOIN student_information si ON si.identity_id = i.id"#
        ));
        push_filters(
            &mut builder,
            query,
            &FilterColumns {
                id: "i.id",
                status: "i.status",
                keys: NAME_KEYS,
            },
        );
        builder.push(" ORDER BY i.username, ui.last_name, ui.first_name, ui.middle_name");

        builder
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(UserRow::into_view)
            .collect()
    }

    async fn query_admins(&self, query: &EntityQuery) -> Result<Vec<AdminView>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            r#"SELECT a.id, a.role, a.status, {ACCOUNT_SELECT}
            FROM admins a
            JOIN identities i ON i.id = a.identity_id
            LEFT JOIN user_information ui ON ui.identity_id = i.id"#
        ));
        push_filters(
            &mut builder,
            query,
            &FilterColumns {
                id: "a.id",
                status: "a.status",
                keys: NAME_KEYS,
            },
        );
        builder.push(" ORDER BY i.username, ui.last_name, ui.first_name, ui.middle_name");

        builder
            .build_query_as::<AdminRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(AdminRow::into_view)
            .collect()
    }

    async fn query_companies(&self, query: &EntityQuery) -> Result<Vec<CompanyView>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            r#"SELECT c.id, c.name, c.description, c.profile_image, c.profile_cover, c.status,
                {ACCOUNT_SELECT}
            FROM companies c
            JOIN identities i ON i.id = c.identity_id
            LEFT JOIN user_information ui ON ui.identity_id = i.id"#
        ));
        push_filters(
            &mut builder,
            query,
            &FilterColumns {
                id: "c.id",
                status: "c.status",
                keys: &[
                    "c.name",
                    "i.username",
                    "ui.last_name",
                    "ui.first_name",
                    "ui.middle_name",
                ],
            },
        );
        builder.push(" ORDER BY c.name, i.username");

        builder
            .build_query_as::<CompanyRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CompanyRow::into_view)
            .collect()
    }

    async fn query_job_posts(&self, query: &EntityQuery) -> Result<Vec<JobPost>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {JOB_POST_COLUMNS} FROM job_posts j"));
        push_filters(
            &mut builder,
            query,
            &FilterColumns {
                id: "j.id",
                status: "j.status",
                keys: &["j.title"],
            },
        );
        builder.push(" ORDER BY j.title");

        Ok(builder
            .build_query_as::<JobPost>()
            .fetch_all(&self.pool)
            .await?)
    }

    /// audit_trail
    ///
    /// One query for any number of subjects: the (kind, id) pairs are passed as
    /// two parallel arrays and joined through UNNEST.
    async fn audit_trail(
        &self,
        subjects: &[(AuditKind, Uuid)],
    ) -> Result<Vec<AuditRecord>, RepoError> {
        let unique: HashSet<&(AuditKind, Uuid)> = subjects.iter().collect();
        let (kinds, ids): (Vec<String>, Vec<Uuid>) = unique
            .into_iter()
            .map(|(kind, id)| (kind.as_str().to_string(), *id))
            .unzip();

        sqlx::query_as::<_, TrailRow>(
            r#"
            SELECT a.id, a.kind, a.entry_type, a.subject_id, a.recorded_at, a.content,
                   o.id AS operator_id, o.username AS operator_username,
                   oi.id AS info_id, oi.identity_id AS info_identity_id, oi.last_name,
                   oi.first_name, oi.middle_name, oi.suffix, oi.gender, oi.birth_date
            FROM audit_entries a
            JOIN UNNEST($1::text[], $2::uuid[]) AS s(kind, subject_id)
                ON a.kind = s.kind AND a.subject_id = s.subject_id
            LEFT JOIN identities o ON o.id = a.operator_id
            LEFT JOIN user_information oi ON oi.identity_id = o.id
            ORDER BY a.recorded_at DESC, a.seq DESC
            "#,
        )
        .bind(kinds)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(TrailRow::into_record)
        .collect()
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepoError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresUnitOfWork { tx }))
    }
}

/// PostgresUnitOfWork
///
/// Wraps a live transaction; sqlx rolls it back on drop.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn username_taken(
        &mut self,
        username: &str,
        except: Option<Uuid>,
    ) -> Result<bool, RepoError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM identities WHERE username = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(username)
        .bind(except)
        .fetch_one(&mut *self.tx)
        .await?)
    }

    async fn insert_identity(&mut self, new: &NewIdentity) -> Result<Identity, RepoError> {
        let sql = format!(
            "INSERT INTO identities (id, username, password_hash, status) VALUES ($1, $2, $3, $4) RETURNING {IDENTITY_COLUMNS}"
        );
        sqlx::query_as::<_, Identity>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.username)
            .bind(&new.password_hash)
            .bind(new.status.as_str())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| username_conflict(e, &new.username))
    }

    /// update_identity
    ///
    /// COALESCE keeps stored values for absent fields.
    async fn update_identity(
        &mut self,
        id: Uuid,
        changes: &IdentityChanges,
    ) -> Result<Option<Identity>, RepoError> {
        let sql = format!(
            r#"UPDATE identities
            SET username = COALESCE($2, username),
                password_hash = COALESCE($3, password_hash),
                status = COALESCE($4, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {IDENTITY_COLUMNS}"#
        );
        sqlx::query_as::<_, Identity>(&sql)
            .bind(id)
            .bind(changes.username.as_deref())
            .bind(changes.password_hash.as_deref())
            .bind(changes.status.map(|status| status.as_str()))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| username_conflict(e, changes.username.as_deref().unwrap_or_default()))
    }

    async fn insert_user_information(
        &mut self,
        identity_id: Uuid,
        new: &NewUserInformation,
    ) -> Result<UserInformation, RepoError> {
        let sql = format!(
            r#"INSERT INTO user_information
                (id, identity_id, last_name, first_name, middle_name, suffix, gender, birth_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {INFORMATION_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, UserInformation>(&sql)
            .bind(Uuid::new_v4())
            .bind(identity_id)
            .bind(&new.last_name)
            .bind(&new.first_name)
            .bind(&new.middle_name)
            .bind(&new.suffix)
            .bind(&new.gender)
            .bind(new.birth_date)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn update_user_information(
        &mut self,
        identity_id: Uuid,
        changes: &UserInformationChanges,
    ) -> Result<Option<UserInformation>, RepoError> {
        let sql = format!(
            r#"UPDATE user_information
            SET last_name = COALESCE($2, last_name),
                first_name = COALESCE($3, first_name),
                middle_name = COALESCE($4, middle_name),
                suffix = COALESCE($5, suffix),
                gender = COALESCE($6, gender),
                birth_date = COALESCE($7, birth_date)
            WHERE identity_id = $1
            RETURNING {INFORMATION_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, UserInformation>(&sql)
            .bind(identity_id)
            .bind(&changes.last_name)
            .bind(&changes.first_name)
            .bind(&changes.middle_name)
            .bind(&changes.suffix)
            .bind(&changes.gender)
            .bind(changes.birth_date)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_student_information(
        &mut self,
        identity_id: Uuid,
        new: &NewStudentInformation,
    ) -> Result<StudentInformation, RepoError> {
        let sql = format!(
            "INSERT INTO student_information (id, identity_id, school_id, course, major) VALUES ($1, $2, $3, $4, $5) RETURNING {STUDENT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, StudentInformation>(&sql)
            .bind(Uuid::new_v4())
            .bind(identity_id)
            .bind(&new.school_id)
            .bind(&new.course)
            .bind(&new.major)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn insert_admin(
        &mut self,
        identity_id: Uuid,
        new: &NewAdmin,
    ) -> Result<AdminProfile, RepoError> {
        let sql = format!(
            "INSERT INTO admins (id, identity_id, role, status) VALUES ($1, $2, $3, $4) RETURNING {ADMIN_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, AdminProfile>(&sql)
            .bind(Uuid::new_v4())
            .bind(identity_id)
            .bind(&new.role)
            .bind(Status::Ok.as_str())
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn update_admin(
        &mut self,
        identity_id: Uuid,
        changes: &AdminChanges,
    ) -> Result<Option<AdminProfile>, RepoError> {
        let sql = format!(
            r#"UPDATE admins
            SET role = COALESCE($2, role),
                status = COALESCE($3, status)
            WHERE identity_id = $1
            RETURNING {ADMIN_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, AdminProfile>(&sql)
            .bind(identity_id)
            .bind(&changes.role)
            .bind(changes.status.map(|status| status.as_str()))
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_company(
        &mut self,
        identity_id: Uuid,
        new: &NewCompany,
    ) -> Result<CompanyProfile, RepoError> {
        let sql = format!(
            r#"INSERT INTO companies
                (id, identity_id, name, description, profile_image, profile_cover, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {COMPANY_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, CompanyProfile>(&sql)
            .bind(Uuid::new_v4())
            .bind(identity_id)
            .bind(&new.name)
            .bind(&new.description)
            .bind(&new.profile_image)
            .bind(&new.profile_cover)
            .bind(Status::Ok.as_str())
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn update_company(
        &mut self,
        identity_id: Uuid,
        changes: &CompanyChanges,
    ) -> Result<Option<CompanyProfile>, RepoError> {
        let sql = format!(
            r#"UPDATE companies
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                profile_image = COALESCE($4, profile_image),
                profile_cover = COALESCE($5, profile_cover),
                status = COALESCE($6, status)
            WHERE identity_id = $1
            RETURNING {COMPANY_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, CompanyProfile>(&sql)
            .bind(identity_id)
            .bind(&changes.name)
            .bind(&changes.description)
            .bind(&changes.profile_image)
            .bind(&changes.profile_cover)
            .bind(changes.status.map(|status| status.as_str()))
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn insert_job_post(
        &mut self,
        company_id: Uuid,
        new: &NewJobPost,
    ) -> Result<JobPost, RepoError> {
        let sql = format!(
            r#"INSERT INTO job_posts (id, company_id, title, description, slots, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {JOB_POST_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, JobPost>(&sql)
            .bind(Uuid::new_v4())
            .bind(company_id)
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.slots)
            .bind(Status::Ok.as_str())
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn update_job_post(
        &mut self,
        company_id: Uuid,
        changes: &JobPostChanges,
    ) -> Result<Option<JobPost>, RepoError> {
        let sql = format!(
            r#"UPDATE job_posts
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                slots = COALESCE($5, slots),
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING {JOB_POST_COLUMNS}"#
        );
        Ok(sqlx::query_as::<_, JobPost>(&sql)
            .bind(changes.id)
            .bind(company_id)
            .bind(&changes.title)
            .bind(&changes.description)
            .bind(changes.slots)
            .bind(changes.status.map(|status| status.as_str()))
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn append_audit(&mut self, entry: &AuditEntry) -> Result<(), RepoError> {
        sqlx::query(
            r#"INSERT INTO audit_entries
                (id, kind, entry_type, subject_id, operator_id, recorded_at, content)
            VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(entry.id)
        .bind(entry.kind.as_str())
        .bind(entry.entry_type.as_str())
        .bind(entry.subject_id)
        .bind(entry.operator_id)
        .bind(entry.recorded_at)
        .bind(&entry.content)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let PostgresUnitOfWork { tx } = *self;
        tx.commit().await?;
        Ok(())
    }
}
