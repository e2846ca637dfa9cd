use crate::{
    AppState,
    handlers::{company, session},
};
use axum::{Router, routing::post};

/// Company Router Module
pub fn company_routes() -> Router<AppState> {
    Router::new()
        // POST /company/create
        // Public self-registration: no token, audit entries without operator.
        .route("/create", post(company::create_company))
        // POST /company/update
        // Confirmed pipeline (token, active account, password).
        .route("/update", post(company::update_company))
        .route("/get", post(company::get_companies))
        .route("/search", post(company::search_companies))
        .route("/select", post(company::select_company))
        .route("/login", post(session::login_company))
}
