use axum::{
    Json,
    extract::State,
};

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
        CreateUserRequest, CreatedResponse, NewIdentity, SearchRequest, SelectRequest,
        UpdateUserRequest, UserView,
    },
    repository::EntityQuery,
};

/// create_user
///
/// [Member Route] Creates a student account: identity, person-name record and
/// student record. Three audit entries, operator = the signed-in member.
#[utoipa::path(
    post,
    path = "/user/create",
    request_body = CreateUserRequest,
    responses(
        (status = 200, description = "Created", body = CreatedResponse),
        (status = 401, description = "No token, unknown or inactive account"),
        (status = 403, description = "Malformed or expired token"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<CreateUserRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let (ctx, payload) =
        authorize_body(&state, &Pipeline::MEMBER, bearer, payload, unconfirmed).await?;

    let CreateUserRequest {
        user,
        user_information,
        student_information,
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

    let student = tx
        .store()
        .insert_student_information(identity.id, &student_information)
        .await?;
    tx.record(
        AuditKind::StudentInformation,
        AuditType::Create,
        student.id,
        &student,
    )
    .await?;

    let entries = tx.commit().await?;
    tracing::info!(identity_id = %identity.id, entries, "user created");

    Ok(Json(CreatedResponse { id: identity.id }))
}

/// update_user
///
/// [Member Route] Partial update of an account and its person-name record.
#[utoipa::path(
    post,
    path = "/user/update",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 400, description = "No such user"),
        (status = 401, description = "No token, unknown or inactive account"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<UpdateUserRequest>,
) -> Result<(), ApiError> {
    let (ctx, payload) =
        authorize_body(&state, &Pipeline::MEMBER, bearer, payload, unconfirmed).await?;

    let UpdateUserRequest {
        mut user,
        user_information,
    } = payload;
    let password_hash = hash_if_present(&state.credentials, user.password.take()).await?;

    let mut tx = AuditedTransaction::begin(state.repo.as_ref(), ctx.actor_id()).await?;
    let (identity, _) = update_account(&mut tx, &user, password_hash, &user_information).await?;
    let entries = tx.commit().await?;
    tracing::info!(identity_id = %identity.id, entries, "user updated");

    Ok(())
}

/// get_users
///
/// [Read Route] Accounts with status `ok` or `unverified`.
#[utoipa::path(
    post,
    path = "/user/get",
    responses((status = 200, description = "Users with their trails", body = [UserView]))
)]
pub async fn get_users(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<Listing<UserView>, ApiError> {
    state
        .authorizer
        .authorize(&Pipeline::READ, bearer.into_context())
        .await?;

    let users = state
        .repo
        .query_users(&EntityQuery::listing(StatusGate::ACTIVE.allowed()))
        .await?;
    listing(state.repo.as_ref(), users).await
}

/// search_users
///
/// [Read Route] Exact match on username or person names, any status.
#[utoipa::path(
    post,
    path = "/user/search",
    request_body = SearchRequest,
    responses((status = 200, description = "Matching users", body = [UserView]))
)]
pub async fn search_users(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<SearchRequest>,
) -> Result<Listing<UserView>, ApiError> {
    let (_, payload) = authorize_body(&state, &Pipeline::READ, bearer, payload, unconfirmed).await?;

    let users = state
        .repo
        .query_users(&EntityQuery::search(payload.key, StatusGate::READ.allowed()))
        .await?;
    listing(state.repo.as_ref(), users).await
}

#[utoipa::path(
    post,
    path = "/user/select",
    request_body = SelectRequest,
    responses(
        (status = 200, description = "The user", body = UserView),
        (status = 400, description = "No such user")
    )
)]
pub async fn select_user(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<SelectRequest>,
) -> Result<Selection<UserView>, ApiError> {
    let (_, payload) = authorize_body(&state, &Pipeline::READ, bearer, payload, unconfirmed).await?;

    let users = state.repo.query_users(&EntityQuery::select(payload.id)).await?;
    selection(state.repo.as_ref(), users, "user").await
}
