//! HTTP handlers, one module per resource plus the session endpoints.
//!
//! Every mutating handler follows the same order: run its pipeline, hash any
//! new password, open an [`AuditedTransaction`], write and record each touched
//! entity, commit. Nothing is visible to readers before the commit.
//!
//! Handlers behind a pipeline take their body as [`Body`] so that an
//! unauthenticated caller hears 401/403 before anything about the payload.

use axum::{Json, extract::rejection::JsonRejection};
use serde::Serialize;

use crate::{
    AppState,
    audit::{AuditKind, AuditType, AuditedTransaction, Audited, Tracked, attach_trails},
    auth::{AuthContext, BearerToken, CredentialVerifier, Pipeline},
    error::ApiError,
    models::{
        AccountChanges, DataResponse, Identity, IdentityChanges, NewIdentity, NewUserInformation,
        UserInformation, UserInformationChanges,
    },
    repository::Repository,
};

pub mod admin;
pub mod company;
pub mod job_post;
pub mod session;
pub mod user;

/// A JSON body whose rejection is held back until authorization has run.
pub(crate) type Body<T> = Result<Json<T>, JsonRejection>;

// --- Authorization ---

/// authorize_body
///
/// Runs `pipeline` first, then hands back the parsed body. `confirmation`
/// picks the re-authentication password out of a readable body; when the body
/// cannot be read every stage but the password check still runs, and only a
/// caller who passes them gets the body's rejection.
pub(crate) async fn authorize_body<T>(
    state: &AppState,
    pipeline: &Pipeline,
    bearer: BearerToken,
    body: Body<T>,
    confirmation: fn(&T) -> Option<String>,
) -> Result<(AuthContext, T), ApiError> {
    let ctx = bearer.into_context();
    match body {
        Ok(Json(payload)) => {
            let ctx = match confirmation(&payload) {
                Some(password) => ctx.with_confirmation(password),
                None => ctx,
            };
            let ctx = state.authorizer.authorize(pipeline, ctx).await?;
            Ok((ctx, payload))
        }
        Err(rejection) => {
            state.authorizer.authorize_unconfirmed(pipeline, ctx).await?;
            Err(rejection.into())
        }
    }
}

/// No confirmation password in this body.
pub(crate) fn unconfirmed<T>(_: &T) -> Option<String> {
    None
}

// --- Shared Write Steps ---

/// Hashes a changed password; `None` keeps the stored hash.
pub(crate) async fn hash_if_present(
    credentials: &CredentialVerifier,
    password: Option<String>,
) -> Result<Option<String>, ApiError> {
    match password {
        Some(password) => Ok(Some(credentials.hash_password(password).await?)),
        None => Ok(None),
    }
}

/// create_account
///
/// Inserts the identity and its person-name record, recording both. The
/// username check gives an early 409; the store's unique constraint is what
/// actually guarantees it.
pub(crate) async fn create_account(
    tx: &mut AuditedTransaction,
    account: NewIdentity,
    information: &NewUserInformation,
) -> Result<(Identity, UserInformation), ApiError> {
    if tx.store().username_taken(&account.username, None).await? {
        return Err(ApiError::Conflict(account.username));
    }
    let identity = tx.store().insert_identity(&account).await?;
    tx.record(AuditKind::User, AuditType::Create, identity.id, &identity)
        .await?;

    let information = tx
        .store()
        .insert_user_information(identity.id, information)
        .await?;
    tx.record(
        AuditKind::UserInformation,
        AuditType::Create,
        information.id,
        &information,
    )
    .await?;

    Ok((identity, information))
}

/// update_account
///
/// Partial update of the identity named by `changes.id` and its person-name
/// record. Either one missing is a 400.
pub(crate) async fn update_account(
    tx: &mut AuditedTransaction,
    changes: &AccountChanges,
    password_hash: Option<String>,
    information: &UserInformationChanges,
) -> Result<(Identity, UserInformation), ApiError> {
    if let Some(username) = &changes.username
        && tx.store().username_taken(username, Some(changes.id)).await?
    {
        return Err(ApiError::Conflict(username.clone()));
    }
    let identity = tx
        .store()
        .update_identity(
            changes.id,
            &IdentityChanges {
                username: changes.username.clone(),
                password_hash,
                status: changes.status,
            },
        )
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    tx.record(AuditKind::User, AuditType::Update, identity.id, &identity)
        .await?;

    let information = tx
        .store()
        .update_user_information(identity.id, information)
        .await?
        .ok_or(ApiError::NotFound("user information"))?;
    tx.record(
        AuditKind::UserInformation,
        AuditType::Update,
        information.id,
        &information,
    )
    .await?;

    Ok((identity, information))
}

// --- Shared Read Steps ---

pub(crate) type Listing<T> = Json<DataResponse<Vec<Tracked<T>>>>;
pub(crate) type Selection<T> = Json<DataResponse<Tracked<T>>>;

/// Wraps a result set, each item carrying its trail.
pub(crate) async fn listing<T: Audited + Serialize>(
    repo: &dyn Repository,
    items: Vec<T>,
) -> Result<Listing<T>, ApiError> {
    Ok(Json(DataResponse {
        data: attach_trails(repo, items).await?,
    }))
}

/// The single item of a select, or 400 naming `entity`.
pub(crate) async fn selection<T: Audited + Serialize>(
    repo: &dyn Repository,
    items: Vec<T>,
    entity: &'static str,
) -> Result<Selection<T>, ApiError> {
    let item = attach_trails(repo, items)
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::NotFound(entity))?;
    Ok(Json(DataResponse { data: item }))
}
