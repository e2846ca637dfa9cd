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
        CompanyView, CreateCompanyRequest, CreatedResponse, NewIdentity, SearchRequest,
        SelectRequest, UpdateCompanyRequest,
    },
    repository::EntityQuery,
};

/// create_company
///
/// [Public Route] Self-service company registration. Runs no pipeline stages,
/// so its audit entries carry no operator.
#[utoipa::path(
    post,
    path = "/company/create",
    request_body = CreateCompanyRequest,
    responses(
        (status = 200, description = "Registered; returns the company id", body = CreatedResponse),
        (status = 409, description = "Username taken")
    )
)]
pub async fn create_company(
    State(state): State<AppState>,
    Json(payload): Json<CreateCompanyRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let CreateCompanyRequest {
        user,
        user_information,
        company,
    } = payload;
    let password_hash = state.credentials.hash_password(user.password).await?;

    let mut tx = AuditedTransaction::begin(state.repo.as_ref(), None).await?;
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

    let profile = tx.store().insert_company(identity.id, &company).await?;
    tx.record(AuditKind::Company, AuditType::Create, profile.id, &profile)
        .await?;

    let entries = tx.commit().await?;
    tracing::info!(company_id = %profile.id, identity_id = %identity.id, entries, "company registered");

    Ok(Json(CreatedResponse { id: profile.id }))
}

/// update_company
///
/// [Confirmed Route] Partial update of a company's account, person-name record
/// and company profile, named by `user.id`.
#[utoipa::path(
    post,
    path = "/company/update",
    request_body = UpdateCompanyRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 400, description = "No such company"),
        (status = 401, description = "Inactive account or wrong confirmation password"),
        (status = 409, description = "Username taken")
    )
)]
pub async fn update_company(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<UpdateCompanyRequest>,
) -> Result<(), ApiError> {
    let (ctx, payload) = authorize_body(
        &state,
        &Pipeline::CONFIRMED,
        bearer,
        payload,
        |body| Some(body.password.clone()),
    )
    .await?;
    let UpdateCompanyRequest {
        mut user,
        user_information,
        company,
        ..
    } = payload;

    let password_hash = hash_if_present(&state.credentials, user.password.take()).await?;

    let mut tx = AuditedTransaction::begin(state.repo.as_ref(), ctx.actor_id()).await?;
    let (identity, _) = update_account(&mut tx, &user, password_hash, &user_information).await?;

    let profile = tx
        .store()
        .update_company(identity.id, &company)
        .await?
        .ok_or(ApiError::NotFound("company"))?;
    tx.record(AuditKind::Company, AuditType::Update, profile.id, &profile)
        .await?;

    let entries = tx.commit().await?;
    tracing::info!(company_id = %profile.id, entries, "company updated");

    Ok(())
}

/// get_companies
///
/// [Read Route] Company profiles with status `ok`, ordered by name.
#[utoipa::path(
    post,
    path = "/company/get",
    responses((status = 200, description = "Companies with their trails", body = [CompanyView]))
)]
pub async fn get_companies(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<Listing<CompanyView>, ApiError> {
    state
        .authorizer
        .authorize(&Pipeline::READ, bearer.into_context())
        .await?;

    let companies = state
        .repo
        .query_companies(&EntityQuery::listing(StatusGate::PROFILE.allowed()))
        .await?;
    listing(state.repo.as_ref(), companies).await
}

#[utoipa::path(
    post,
    path = "/company/search",
    request_body = SearchRequest,
    responses((status = 200, description = "Matching companies", body = [CompanyView]))
)]
pub async fn search_companies(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<SearchRequest>,
) -> Result<Listing<CompanyView>, ApiError> {
    let (_, payload) = authorize_body(&state, &Pipeline::READ, bearer, payload, unconfirmed).await?;

    let companies = state
        .repo
        .query_companies(&EntityQuery::search(payload.key, StatusGate::PROFILE.allowed()))
        .await?;
    listing(state.repo.as_ref(), companies).await
}

#[utoipa::path(
    post,
    path = "/company/select",
    request_body = SelectRequest,
    responses(
        (status = 200, description = "The company", body = CompanyView),
        (status = 400, description = "No such company")
    )
)]
pub async fn select_company(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<SelectRequest>,
) -> Result<Selection<CompanyView>, ApiError> {
    let (_, payload) = authorize_body(&state, &Pipeline::READ, bearer, payload, unconfirmed).await?;

    let companies = state
        .repo
        .query_companies(&EntityQuery::select(payload.id))
        .await?;
    selection(state.repo.as_ref(), companies, "company").await
}
