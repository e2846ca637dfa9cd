use crate::{
    AppState,
    handlers::{session, user},
};
use axum::{Router, routing::post};

/// User Router Module
///
/// Student accounts. Writes run the member pipeline (active account);
/// reads accept any authenticated account.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        // POST /user/create
        // Identity, person-name and student records in one audited transaction.
        .route("/create", post(user::create_user))
        .route("/update", post(user::update_user))
        // POST /user/get, /user/search, /user/select
        // Reads; every item carries its audit trail, newest first.
        .route("/get", post(user::get_users))
        .route("/search", post(user::search_users))
        .route("/select", post(user::select_user))
        // POST /user/login
        // No profile requirement; returns an access/refresh token pair.
        .route("/login", post(session::login_user))
}
