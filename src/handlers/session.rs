//! Login and token refresh. These endpoints run no pipeline stages.

use axum::{Json, extract::State};

use crate::{
    AppState,
    auth::{StatusGate, Subject, TokenError, TokenKind},
    error::ApiError,
    models::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse, RoleKind},
};

/// login
///
/// Shared by the three role logins. Both failure causes collapse into the
/// same empty 401.
async fn login(
    state: &AppState,
    role: RoleKind,
    payload: LoginRequest,
) -> Result<Json<LoginResponse>, ApiError> {
    let credentials = payload.user;
    let found = state
        .credentials
        .authenticate(
            state.repo.as_ref(),
            role,
            &credentials.username,
            &credentials.password,
        )
        .await
        .inspect_err(|e| tracing::info!(role = ?role, reason = %e, "login rejected"))?;

    let subject = Subject {
        id: found.identity.id,
        username: found.identity.username,
        profile: found.profile,
    };
    let access_token = state
        .tokens
        .issue_access(&subject, state.tokens.access_ttl())?;
    let refresh_token = state.tokens.issue_refresh(&subject)?;
    tracing::info!(identity_id = %subject.id, role = ?role, "login succeeded");

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
    }))
}

#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    login(&state, RoleKind::User, payload).await
}

/// login_admin
///
/// Requires an `ok` admin profile in addition to the password.
#[utoipa::path(
    post,
    path = "/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = LoginResponse),
        (status = 401, description = "Invalid credentials or no active admin profile")
    )
)]
pub async fn login_admin(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    login(&state, RoleKind::Admin, payload).await
}

#[utoipa::path(
    post,
    path = "/company/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair", body = LoginResponse),
        (status = 401, description = "Invalid credentials or no active company profile")
    )
)]
pub async fn login_company(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    login(&state, RoleKind::Company, payload).await
}

/// refresh_token
///
/// Exchanges a refresh token for a new access token. The identity is re-read
/// and must still pass the active gate; the role profile carried in the token
/// is passed through unchanged.
#[utoipa::path(
    post,
    path = "/token/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Account no longer active"),
        (status = 403, description = "Not a valid refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let claims = state.tokens.verify(&payload.refresh_token)?;
    if claims.kind != TokenKind::Refresh {
        return Err(ApiError::BadToken(TokenError::Malformed));
    }

    let identity = state
        .repo
        .find_identity(claims.subject.id)
        .await?
        .filter(|identity| StatusGate::ACTIVE.admits(identity.status))
        .ok_or(ApiError::Unauthorized("refresh for inactive account"))?;

    let subject = Subject {
        id: identity.id,
        username: identity.username,
        profile: claims.subject.profile,
    };
    let access_token = state
        .tokens
        .issue_access(&subject, state.tokens.access_ttl())?;

    Ok(Json(RefreshResponse { access_token }))
}
