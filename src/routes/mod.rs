pub mod api;
pub mod assets;
pub mod auth;
pub mod dashboard;
pub mod home;
pub mod multipart;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::auth::guard;
use crate::state::AppState;
use crate::storage::UPLOADS_PREFIX;

/// Largest request body accepted, enough for a 10 MB document plus a cover.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// The whole application: public pages, JSON API, the guarded dashboard and
/// the upload directory, where draft files are hidden from non-admins.
pub fn app(state: AppState) -> Router {
    let dashboard = dashboard::router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        guard::require_admin,
    ));

    let uploads = Router::new()
        .nest_service(UPLOADS_PREFIX, ServeDir::new(state.storage.uploads_dir()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::hide_draft_files,
        ));

    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(api::router())
        .merge(dashboard)
        .merge(uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
