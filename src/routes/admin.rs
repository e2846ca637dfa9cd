use crate::{
    AppState,
    handlers::{admin, session},
};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Administrative accounts. Create and update run the admin-confirmed pipeline:
/// token, active account, `ok` admin profile, then the acting admin's password
/// from the request body.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/create", post(admin::create_admin))
        .route("/update", post(admin::update_admin))
        .route("/get", post(admin::get_admins))
        .route("/search", post(admin::search_admins))
        .route("/select", post(admin::select_admin))
        // POST /admin/login
        // Only succeeds while the admin profile is `ok`.
        .route("/login", post(session::login_admin))
}
