use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use serde::Deserialize;

use crate::auth::guard::safe_callback;
use crate::auth::{cookies, password, session};
use crate::db::models::Role;
use crate::db::users::{self, NewUser};
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::routes::home::Html;
use crate::routes::multipart::MultipartForm;
use crate::state::AppState;
use crate::storage::UploadKind;

const BAD_CREDENTIALS: &str = "อีเมลหรือรหัสผ่านไม่ถูกต้อง";

// -- Templates --

#[derive(Template)]
#[template(path = "pages/signin.html")]
pub struct SigninTemplate {
    pub callback_url: String,
    pub email: String,
    pub error: Option<String>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct SigninQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Deserialize)]
pub struct SigninForm {
    pub email: String,
    pub password: String,
    #[serde(rename = "callbackUrl", default)]
    pub callback_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

// -- Sign in / out --

/// GET /auth/signin
pub async fn signin_page(MaybeUser(user): MaybeUser, Query(query): Query<SigninQuery>) -> Response {
    let callback_url = safe_callback(query.callback_url.as_deref());

    if user.is_some_and(|u| u.is_admin()) {
        return Redirect::to(&callback_url).into_response();
    }

    Html(SigninTemplate {
        callback_url,
        email: String::new(),
        error: None,
    })
    .into_response()
}

/// POST /auth/signin: verify credentials, start a session, follow the callback.
pub async fn signin(State(state): State<AppState>, Form(form): Form<SigninForm>) -> AppResult<Response> {
    let callback_url = safe_callback(form.callback_url.as_deref());
    let email = form.email.trim().to_string();

    let user = {
        let conn = state.db.get()?;
        users::find_by_email(&conn, &email)?
    };

    let user = user.filter(|u| {
        u.password_hash
            .as_deref()
            .is_some_and(|hash| password::verify(&form.password, hash))
    });

    let Some(user) = user else {
        tracing::info!("Failed sign-in for {}", email);
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(SigninTemplate {
                callback_url,
                email,
                error: Some(BAD_CREDENTIALS.to_string()),
            }),
        )
            .into_response());
    };

    let token = session::create_session(&state.db, user.id, state.config.auth.session_hours)?;
    tracing::info!("User {} signed in", user.id);

    Ok((
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, callback_url),
            (header::SET_COOKIE, cookies::session_cookie(&state.config.auth, &token)),
        ],
        "",
    )
        .into_response())
}

/// POST /auth/signout
pub async fn signout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = cookies::get_cookie_value(&headers, &state.config.auth.cookie_name) {
        if let Err(e) = session::delete_session(&state.db, token) {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }

    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, "/".to_string()),
            (header::SET_COOKIE, cookies::clear_session_cookie(&state.config.auth)),
        ],
        "",
    )
        .into_response()
}

// -- Accounts --

/// POST /api/auth/signup: create a member account.
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<Response> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(AppError::BadRequest("รูปแบบอีเมลไม่ถูกต้อง".into()));
    }
    let hash = password::hash(&req.password)?;

    let conn = state.db.get()?;
    if users::find_by_email(&conn, &email)?.is_some() {
        return Err(AppError::BadRequest("อีเมลนี้ถูกใช้งานแล้ว".into()));
    }

    let id = users::insert(
        &conn,
        &NewUser {
            first_name: req.first_name.trim(),
            last_name: req.last_name.trim(),
            email: &email,
            password_hash: &hash,
            role: Role::Member,
        },
    )?;
    let user = users::find_by_id(&conn, id)?
        .ok_or_else(|| AppError::Internal("user vanished after insert".into()))?;

    tracing::info!("New member account {}", id);
    Ok((StatusCode::CREATED, Json(user)).into_response())
}

/// GET /api/auth/signup/{id}
pub async fn signup_echo(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": format!("User ID: {}", id) }))
}

/// PUT /api/auth/signup/{id}: update names and optionally the avatar.
/// A replaced avatar file is removed best-effort.
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::BadRequest("รหัสผู้ใช้ไม่ถูกต้อง".into()))?;
    if current.id != id && !current.is_admin() {
        return Err(AppError::Forbidden);
    }

    let existing = {
        let conn = state.db.get()?;
        users::find_by_id(&conn, id)?
    }
    .ok_or_else(|| AppError::NotFound("ไม่พบผู้ใช้".into()))?;

    let mut form = MultipartForm::read(multipart).await?;
    let first_name = form
        .text("firstName")
        .unwrap_or(&existing.first_name)
        .to_string();
    let last_name = form
        .text("lastName")
        .unwrap_or(&existing.last_name)
        .to_string();

    let image = match form.take_file("image") {
        Some(file) => Some(state.storage.save(UploadKind::Avatar, &file).await?),
        None => None,
    };

    let user = {
        let conn = state.db.get()?;
        users::update_profile(&conn, id, &first_name, &last_name, image.as_deref())?;
        users::find_by_id(&conn, id)?
    }
    .ok_or_else(|| AppError::NotFound("ไม่พบผู้ใช้".into()))?;

    if image.is_some() {
        if let Some(old) = &existing.image {
            state.storage.delete_best_effort(old).await;
        }
    }

    Ok(Json(user).into_response())
}
