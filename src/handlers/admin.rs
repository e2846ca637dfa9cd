use axum::{Json, extract::State};

use super::{
    Body, Listing, Selection, authorize_body, create_account, hash_if_present, listing, selection,
    unconfirmed, update_account,
};
use crate::{
    AppState,
    audit::{AuditKind, AuditType, AuditedTransaction},
    auth::{BearerToken, Pipeline, StatusGate},
    error::ApiError,
    models::{
        AdminView, CreateAdminRequest, CreatedResponse, NewIdentity, SearchRequest,
        SelectRequest, UpdateAdminRequest,
    },
    repository::EntityQuery,
};

/// create_admin
///
/// [Admin Route] Creates an account with an admin profile. The acting admin
/// re-enters their own password in `password`.
#[utoipa::path(
    post,
    path = "/admin/create",
    request_body = CreateAdminRequest,
    responses(
        (status = 200, description = "Created; returns the admin id", body = CreatedResponse),
        (status = 401, description = "Not an active admin, or wrong confirmation password"),
        (status = 403, description = "Malformed or expired token"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create_admin(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<CreateAdminRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let (ctx, payload) = authorize_body(
        &state,
        &Pipeline::ADMIN_CONFIRMED,
        bearer,
        payload,
        |body| Some(body.password.clone()),
    )
    .await?;
    let CreateAdminRequest {
        user,
        user_information,
        admin,
        ..
    } = payload;

    let password_hash = state.credentials.hash_password(user.password).await?;

    let mut tx = AuditedTransaction::begin(state.repo.as_ref(), ctx.actor_id()).await?;
    let (identity, _) = create_account(
        &mut tx,
        NewIdentity {
            username: user.username,
            password_hash,
            status: user.status.unwrap_or_default(),
        },
        &user_information,
    )
    .await?;

    let profile = tx.store().insert_admin(identity.id, &admin).await?;
    tx.record(AuditKind::Admin, AuditType::Create, profile.id, &profile)
        .await?;

    let entries = tx.commit().await?;
    tracing::info!(admin_id = %profile.id, identity_id = %identity.id, entries, "admin created");

    Ok(Json(CreatedResponse { id: profile.id }))
}

/// update_admin
///
/// [Admin Route] Partial update of an admin's account, person-name record and
/// admin profile. The target is named by `user.id`.
#[utoipa::path(
    post,
    path = "/admin/update",
    request_body = UpdateAdminRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 400, description = "No such admin"),
        (status = 401, description = "Not an active admin, or wrong confirmation password"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_admin(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<UpdateAdminRequest>,
) -> Result<(), ApiError> {
    let (ctx, payload) = authorize_body(
        &state,
        &Pipeline::ADMIN_CONFIRMED,
        bearer,
        payload,
        |body| Some(body.password.clone()),
    )
    .await?;
    let UpdateAdminRequest {
        mut user,
        user_information,
        admin,
        ..
    } = payload;

    let password_hash = hash_if_present(&state.credentials, user.password.take()).await?;

    let mut tx = AuditedTransaction::begin(state.repo.as_ref(), ctx.actor_id()).await?;
    let (identity, _) = update_account(&mut tx, &user, password_hash, &user_information).await?;

    let profile = tx
        .store()
        .update_admin(identity.id, &admin)
        .await?
        .ok_or(ApiError::NotFound("admin"))?;
    tx.record(AuditKind::Admin, AuditType::Update, profile.id, &profile)
        .await?;

    let entries = tx.commit().await?;
    tracing::info!(admin_id = %profile.id, entries, "admin updated");

    Ok(())
}

/// get_admins
///
/// [Read Route] Admin profiles with status `ok`.
#[utoipa::path(
    post,
    path = "/admin/get",
    responses((status = 200, description = "Admins with their trails", body = [AdminView]))
)]
pub async fn get_admins(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<Listing<AdminView>, ApiError> {
    state
        .authorizer
        .authorize(&Pipeline::READ, bearer.into_context())
        .await?;

    let admins = state
        .repo
        .query_admins(&EntityQuery::listing(StatusGate::PROFILE.allowed()))
        .await?;
    listing(state.repo.as_ref(), admins).await
}

#[utoipa::path(
    post,
    path = "/admin/search",
    request_body = SearchRequest,
    responses((status = 200, description = "Matching admins", body = [AdminView]))
)]
pub async fn search_admins(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<SearchRequest>,
) -> Result<Listing<AdminView>, ApiError> {
    let (_, payload) = authorize_body(&state, &Pipeline::READ, bearer, payload, unconfirmed).await?;

    let admins = state
        .repo
        .query_admins(&EntityQuery::search(payload.key, StatusGate::PROFILE.allowed()))
        .await?;
    listing(state.repo.as_ref(), admins).await
}

#[utoipa::path(
    post,
    path = "/admin/select",
    request_body = SelectRequest,
    responses(
        (status = 200, description = "The admin", body = AdminView),
        (status = 400, description = "No such admin")
    )
)]
pub async fn select_admin(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<SelectRequest>,
) -> Result<Selection<AdminView>, ApiError> {
    let (_, payload) = authorize_body(&state, &Pipeline::READ, bearer, payload, unconfirmed).await?;

    let admins = state.repo.query_admins(&EntityQuery::select(payload.id)).await?;
    selection(state.repo.as_ref(), admins, "admin").await
}
