use crate::{AppState, handlers::session};
use axum::{Router, routing::post};

pub fn token_routes() -> Router<AppState> {
    Router::new()
        // POST /token/refresh
        // Refresh token in, fresh access token out; the account must still be active.
        .route("/refresh", post(session::refresh_token))
}
