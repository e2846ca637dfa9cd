use axum::{Router, http::HeaderName, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// One router per resource.
pub mod routes;
use routes::{admin, company, job_post, token, user};

// --- Public Re-exports ---

pub use auth::{Argon2Hasher, Authorizer, CredentialVerifier, TokenService};
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

use auth::credentials::HashError;

/// ApiDoc
///
/// Auto-generates the OpenAPI document from the `#[utoipa::path]` handlers and
/// `ToSchema` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::user::create_user, handlers::user::update_user, handlers::user::get_users,
        handlers::user::search_users, handlers::user::select_user,
        handlers::admin::create_admin, handlers::admin::update_admin, handlers::admin::get_admins,
        handlers::admin::search_admins, handlers::admin::select_admin,
        handlers::company::create_company, handlers::company::update_company,
        handlers::company::get_companies, handlers::company::search_companies,
        handlers::company::select_company,
        handlers::job_post::create_job_post, handlers::job_post::update_job_post,
        handlers::job_post::get_job_posts, handlers::job_post::search_job_posts,
        handlers::job_post::select_job_post,
        handlers::session::login_user, handlers::session::login_admin,
        handlers::session::login_company, handlers::session::refresh_token
    ),
    components(
        schemas(
            models::Status, models::UserInformation, models::StudentInformation,
            models::AdminProfile, models::CompanyProfile, models::JobPost,
            models::NewAccount, models::AccountChanges, models::NewUserInformation,
            models::UserInformationChanges, models::NewStudentInformation, models::NewAdmin,
            models::AdminChanges, models::NewCompany, models::CompanyChanges,
            models::NewJobPost, models::JobPostChanges,
            models::CreateUserRequest, models::UpdateUserRequest, models::CreateAdminRequest,
            models::UpdateAdminRequest, models::CreateCompanyRequest,
            models::UpdateCompanyRequest, models::CreateJobPostRequest,
            models::UpdateJobPostRequest, models::LoginCredentials, models::LoginRequest,
            models::RefreshRequest, models::SelectRequest, models::SearchRequest,
            models::LoginResponse, models::RefreshResponse, models::CreatedResponse,
            models::AccountSummary, models::UserView, models::AdminView, models::CompanyView,
            audit::AuditRecord, audit::OperatorSummary, audit::AuditKind, audit::AuditType,
        )
    ),
    tags(
        (name = "career-portal", description = "Career Portal API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single, thread-safe container holding every service a request needs.
/// All services are constructed explicitly; nothing is a global.
#[derive(Clone)]
pub struct AppState {
    /// Data access (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    /// Signs and verifies bearer tokens.
    pub tokens: Arc<TokenService>,
    /// Password hashing and login checks.
    pub credentials: Arc<CredentialVerifier>,
    /// Runs the authorization pipelines.
    pub authorizer: Authorizer,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// new
    ///
    /// Wires the services from `config` around `repo`. Fails only if the
    /// configured hashing parameters are rejected.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Result<Self, HashError> {
        let hasher = Arc::new(Argon2Hasher::new(&config.hashing)?);
        let credentials = Arc::new(CredentialVerifier::new(hasher)?);
        let tokens = Arc::new(TokenService::new(
            &config.secret_key,
            config.token_duration(),
        ));
        let authorizer = Authorizer::new(repo.clone(), tokens.clone(), credentials.clone());

        Ok(Self {
            repo,
            tokens,
            credentials,
            authorizer,
            config,
        })
    }
}

/// create_router
///
/// Assembles the routing structure, applies the global layers and registers
/// the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // GET /health
        // Unauthenticated liveness check.
        .route("/health", get(|| async { "ok" }))
        .nest("/user", user::user_routes())
        .nest("/admin", admin::admin_routes())
        .nest("/company", company::company_routes())
        .nest("/job-post", job_post::job_post_routes())
        .nest("/token", token::token_routes())
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing, correlated by the generated request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span: method, URI and `x-request-id`. Bodies are
/// never recorded since they carry passwords.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
