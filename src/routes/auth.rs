use axum::routing::{get, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/auth/signin",
            get(handlers::signin_page).post(handlers::signin),
        )
        .route("/auth/signout", post(handlers::signout))
        .route("/api/auth/signup", post(handlers::signup))
        .route(
            "/api/auth/signup/{id}",
            get(handlers::signup_echo).put(handlers::update_profile),
        )
}
