use axum::{Json, extract::State};

use super::{Body, Listing, Selection, authorize_body, listing, selection, unconfirmed};
use crate::{
    AppState,
    audit::{AuditKind, AuditType, AuditedTransaction},
    auth::{AuthContext, BearerToken, Pipeline, StatusGate},
    error::ApiError,
    models::{
        CompanyProfile, CreateJobPostRequest, CreatedResponse, JobPost, SearchRequest,
        SelectRequest, UpdateJobPostRequest,
    },
    repository::EntityQuery,
};

fn acting_company(ctx: &AuthContext) -> Result<&CompanyProfile, ApiError> {
    ctx.company()
        .ok_or(ApiError::Unauthorized("no verified company profile"))
}

/// create_job_post
///
/// [Company Route] Creates a post owned by the acting company; the owner is
/// taken from the verified profile, never from the body.
#[utoipa::path(
    post,
    path = "/job-post/create",
    request_body = CreateJobPostRequest,
    responses(
        (status = 200, description = "Created", body = CreatedResponse),
        (status = 401, description = "Not an active company, or wrong confirmation password"),
        (status = 403, description = "Malformed or expired token")
    )
)]
pub async fn create_job_post(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<CreateJobPostRequest>,
) -> Result<Json<CreatedResponse>, ApiError> {
    let (ctx, payload) = authorize_body(
        &state,
        &Pipeline::COMPANY_CONFIRMED,
        bearer,
        payload,
        |body| Some(body.password.clone()),
    )
    .await?;
    let CreateJobPostRequest { job_post, .. } = payload;
    let company_id = acting_company(&ctx)?.id;

    let mut tx = AuditedTransaction::begin(state.repo.as_ref(), ctx.actor_id()).await?;
    let post = tx.store().insert_job_post(company_id, &job_post).await?;
    tx.record(AuditKind::JobPost, AuditType::Create, post.id, &post)
        .await?;
    tx.commit().await?;
    tracing::info!(job_post_id = %post.id, company_id = %company_id, "job post created");

    Ok(Json(CreatedResponse { id: post.id }))
}

/// update_job_post
///
/// [Company Route] Partial update. Posts of other companies are treated as
/// missing (400).
#[utoipa::path(
    post,
    path = "/job-post/update",
    request_body = UpdateJobPostRequest,
    responses(
        (status = 200, description = "Updated"),
        (status = 400, description = "No such post for this company"),
        (status = 401, description = "Not an active company, or wrong confirmation password")
    )
)]
pub async fn update_job_post(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<UpdateJobPostRequest>,
) -> Result<(), ApiError> {
    let (ctx, payload) = authorize_body(
        &state,
        &Pipeline::COMPANY_CONFIRMED,
        bearer,
        payload,
        |body| Some(body.password.clone()),
    )
    .await?;
    let UpdateJobPostRequest { job_post, .. } = payload;
    let company_id = acting_company(&ctx)?.id;

    let mut tx = AuditedTransaction::begin(state.repo.as_ref(), ctx.actor_id()).await?;
    let post = tx
        .store()
        .update_job_post(company_id, &job_post)
        .await?
        .ok_or(ApiError::NotFound("job post"))?;
    tx.record(AuditKind::JobPost, AuditType::Update, post.id, &post)
        .await?;
    tx.commit().await?;
    tracing::info!(job_post_id = %post.id, "job post updated");

    Ok(())
}

/// get_job_posts
///
/// [Read Route] Posts with status `ok`, ordered by title.
#[utoipa::path(
    post,
    path = "/job-post/get",
    responses((status = 200, description = "Job posts with their trails", body = [JobPost]))
)]
pub async fn get_job_posts(
    State(state): State<AppState>,
    bearer: BearerToken,
) -> Result<Listing<JobPost>, ApiError> {
    state
        .authorizer
        .authorize(&Pipeline::READ, bearer.into_context())
        .await?;

    let posts = state
        .repo
        .query_job_posts(&EntityQuery::listing(StatusGate::PROFILE.allowed()))
        .await?;
    listing(state.repo.as_ref(), posts).await
}

#[utoipa::path(
    post,
    path = "/job-post/search",
    request_body = SearchRequest,
    responses((status = 200, description = "Posts with this exact title", body = [JobPost]))
)]
pub async fn search_job_posts(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<SearchRequest>,
) -> Result<Listing<JobPost>, ApiError> {
    let (_, payload) = authorize_body(&state, &Pipeline::READ, bearer, payload, unconfirmed).await?;

    let posts = state
        .repo
        .query_job_posts(&EntityQuery::search(payload.key, StatusGate::PROFILE.allowed()))
        .await?;
    listing(state.repo.as_ref(), posts).await
}

#[utoipa::path(
    post,
    path = "/job-post/select",
    request_body = SelectRequest,
    responses(
        (status = 200, description = "The job post", body = JobPost),
        (status = 400, description = "No such job post")
    )
)]
pub async fn select_job_post(
    State(state): State<AppState>,
    bearer: BearerToken,
    payload: Body<SelectRequest>,
) -> Result<Selection<JobPost>, ApiError> {
    let (_, payload) = authorize_body(&state, &Pipeline::READ, bearer, payload, unconfirmed).await?;

    let posts = state
        .repo
        .query_job_posts(&EntityQuery::select(payload.id))
        .await?;
    selection(state.repo.as_ref(), posts, "job post").await
}
