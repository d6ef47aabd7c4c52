use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::categories;
use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::map::{category_color, THAILAND_BOUNDS};
use crate::state::AppState;

/// Category entry in a map legend.
pub struct LegendEntry {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub count: i64,
}

pub fn legend(state: &AppState) -> AppResult<Vec<LegendEntry>> {
    let conn = state.db.get()?;
    let entries = categories::list_with_counts(&conn)?
        .into_iter()
        .map(|c| LegendEntry {
            id: c.category.id,
            name: c.category.name,
            color: category_color(c.category.id).primary,
            count: c.document_count,
        })
        .collect();
    Ok(entries)
}

pub fn bounds_json() -> String {
    serde_json::to_string(&THAILAND_BOUNDS).unwrap_or_else(|_| "{}".to_string())
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub legend: Vec<LegendEntry>,
    pub bounds_json: String,
    pub signed_in_as: Option<String>,
    pub is_admin: bool,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Public map of published documents.
pub async fn index(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
) -> AppResult<Html<HomeTemplate>> {
    let is_admin = maybe_user.is_admin();
    Ok(Html(HomeTemplate {
        legend: legend(&state)?,
        bounds_json: bounds_json(),
        signed_in_as: maybe_user.0.map(|u| u.display_name()),
        is_admin,
    }))
}
