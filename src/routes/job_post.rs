use crate::{AppState, handlers::job_post};
use axum::{Router, routing::post};

/// Job Post Router Module
///
/// Writes run the company-confirmed pipeline and are scoped to the acting
/// company's own posts.
pub fn job_post_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(job_post::create_job_post))
        .route("/update", post(job_post::update_job_post))
        .route("/get", post(job_post::get_job_posts))
        .route("/search", post(job_post::search_job_posts))
        .route("/select", post(job_post::select_job_post))
}
