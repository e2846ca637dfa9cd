use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Status ---

/// Status
///
/// Lifecycle marker shared by identities, role profiles and job posts.
/// Stored as lowercase text; nothing is ever physically deleted, records are
/// retired by moving them out of `ok`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Status {
    #[default]
    Ok,
    Unverified,
    Deactivated,
    Suspended,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Ok,
        Status::Unverified,
        Status::Deactivated,
        Status::Suspended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Unverified => "unverified",
            Status::Deactivated => "deactivated",
            Status::Suspended => "suspended",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status '{s}'"))
    }
}

// Used by `#[sqlx(try_from = "String")]` on row fields.
impl TryFrom<String> for Status {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// RoleKind
///
/// The role profile a login is performed against. `User` has no profile filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RoleKind {
    User,
    Admin,
    Company,
}

// --- Core Records (Mapped to Database) ---

/// Identity
///
/// The authenticable account record (`identities` table). The password hash is
/// never serialized, so neither responses nor audit snapshots can leak it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// UserInformation
///
/// Person-name details attached 1:1 to an identity (`user_information`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserInformation {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub suffix: Option<String>,
    pub gender: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

/// StudentInformation
///
/// Academic details for plain user (student) accounts.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StudentInformation {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub school_id: String,
    pub course: Option<String>,
    pub major: Option<String>,
}

/// AdminProfile
///
/// Role profile granting administrative capabilities. Only consulted when its
/// status is `ok`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminProfile {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub role: String,
    #[sqlx(try_from = "String")]
    pub status: Status,
}

/// CompanyProfile
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CompanyProfile {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub profile_image: Option<String>,
    pub profile_cover: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: Status,
}

/// JobPost
///
/// A posting owned by a company profile (`job_posts.company_id`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JobPost {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub slots: i32,
    #[sqlx(try_from = "String")]
    pub status: Status,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

// --- Write Inputs (Repository Layer) ---

/// NewIdentity
///
/// Row to insert; the password is already hashed by the credential verifier.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub username: String,
    pub password_hash: String,
    pub status: Status,
}

/// IdentityChanges
///
/// Partial update; `None` keeps the stored value (COALESCE semantics).
#[derive(Debug, Clone, Default)]
pub struct IdentityChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub status: Option<Status>,
}

// --- Request Payloads (Input Schemas) ---

/// NewAccount
///
/// The `user` section of a create payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub status: Option<Status>,
}

/// AccountChanges
///
/// The `user` section of an update payload. `id` names the target identity.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountChanges {
    pub id: Uuid,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewUserInformation {
    pub last_name: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserInformationChanges {
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewStudentInformation {
    pub school_id: String,
    #[serde(default)]
    pub course: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewAdmin {
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminChanges {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewCompany {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub profile_cover: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CompanyChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub profile_cover: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NewJobPost {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub slots: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JobPostChanges {
    pub id: Uuid,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slots: Option<i32>,
    #[serde(default)]
    pub status: Option<Status>,
}

/// CreateUserRequest
///
/// POST /user/create. Student accounts are created by an already signed-in member.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateUserRequest {
    pub user: NewAccount,
    pub user_information: NewUserInformation,
    pub student_information: NewStudentInformation,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    pub user: AccountChanges,
    #[serde(default)]
    pub user_information: UserInformationChanges,
}

/// CreateAdminRequest
///
/// `password` is the acting admin's own password (re-authentication), not the
/// new account's.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateAdminRequest {
    pub user: NewAccount,
    pub user_information: NewUserInformation,
    pub admin: NewAdmin,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateAdminRequest {
    pub user: AccountChanges,
    #[serde(default)]
    pub user_information: UserInformationChanges,
    #[serde(default)]
    pub admin: AdminChanges,
    pub password: String,
}

/// CreateCompanyRequest
///
/// Public self-registration payload; no bearer token and no operator.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCompanyRequest {
    pub user: NewAccount,
    pub user_information: NewUserInformation,
    pub company: NewCompany,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateCompanyRequest {
    pub user: AccountChanges,
    #[serde(default)]
    pub user_information: UserInformationChanges,
    #[serde(default)]
    pub company: CompanyChanges,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateJobPostRequest {
    pub job_post: NewJobPost,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateJobPostRequest {
    pub job_post: JobPostChanges,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

/// LoginRequest
///
/// Body of the three login endpoints: `{ "user": { "username", "password" } }`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    pub user: LoginCredentials,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SelectRequest {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct SearchRequest {
    pub key: String,
}

// --- Response Schemas (Output) ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// CreatedResponse
///
/// `{ "id": ... }` returned by every create endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreatedResponse {
    pub id: Uuid,
}

/// DataResponse
///
/// `{ "data": ... }` envelope used by every read endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

// --- Read Views ---

/// AccountSummary
///
/// Identity as embedded in admin and company views.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AccountSummary {
    pub id: Uuid,
    pub username: String,
    pub status: Status,
    pub user_information: Option<UserInformation>,
}

/// UserView
///
/// A user account with its information and student sections.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub status: Status,
    pub user_information: Option<UserInformation>,
    pub student_information: Option<StudentInformation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AdminView {
    pub id: Uuid,
    pub role: String,
    pub status: Status,
    pub user: AccountSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CompanyView {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub profile_image: Option<String>,
    pub profile_cover: Option<String>,
    pub status: Status,
    pub user: AccountSummary,
}
