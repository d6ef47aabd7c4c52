use axum::extract::{OriginalUri, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use percent_encoding::percent_decode_str;

use crate::db::documents;
use crate::error::AppResult;
use crate::extractors::user_from_headers;
use crate::state::AppState;

pub const SIGNIN_PATH: &str = "/auth/signin";

/// `/auth/signin?callbackUrl=<path>` with the path percent-encoded.
pub fn signin_redirect_target(path: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    format!("{SIGNIN_PATH}?callbackUrl={encoded}")
}

/// Only relative paths are followed after sign-in; anything else lands on
/// the dashboard.
pub fn safe_callback(callback: Option<&str>) -> String {
    match callback {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.contains('\\') => {
            url.to_string()
        }
        _ => "/dashboard".to_string(),
    }
}

/// Gate for `/dashboard`: admins pass with their user attached to the
/// request, everyone else is sent to sign-in with the path preserved.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match user_from_headers(request.headers(), &state) {
        Ok(user) => user,
        Err(e) => {
            tracing::error!("Session lookup failed: {}", e);
            None
        }
    };

    match user {
        Some(user) if user.is_admin() => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        other => {
            let path = request.uri().path();
            tracing::info!(
                "Redirecting {} to sign-in ({})",
                path,
                if other.is_some() { "not admin" } else { "no session" }
            );
            Redirect::to(&signin_redirect_target(path)).into_response()
        }
    }
}

/// Gate for `/uploads`: files of unpublished documents are served to admins
/// only. Everyone else gets the same 404 as for a missing file.
pub async fn hide_draft_files(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let raw = match request.extensions().get::<OriginalUri>() {
        Some(OriginalUri(uri)) => uri.path().to_string(),
        None => request.uri().path().to_string(),
    };
    let Some(public_path) = upload_request_path(&raw) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match may_read_upload(&state, request.headers(), &public_path) {
        Ok(true) => next.run(request).await,
        Ok(false) => {
            tracing::info!("Hiding draft file {}", public_path);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            tracing::error!("Draft lookup failed for {}: {}", public_path, e);
            e.into_response()
        }
    }
}

fn may_read_upload(state: &AppState, headers: &HeaderMap, public_path: &str) -> AppResult<bool> {
    let is_draft = {
        let conn = state.db.get()?;
        documents::is_draft_file(&conn, public_path)?
    };
    if !is_draft {
        return Ok(true);
    }
    Ok(user_from_headers(headers, state)?.is_some_and(|user| user.is_admin()))
}

/// Decode a request path the way the file server will read it: percent
/// escapes resolved, empty and `.` segments dropped. `..` is refused.
fn upload_request_path(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    let mut segments = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return None,
            other => segments.push(other),
        }
    }
    Some(format!("/{}", segments.join("/")))
}
