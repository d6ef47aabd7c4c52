use askama::Template;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;

use crate::catalog;
use crate::db::categories::{self, DeleteOutcome};
use crate::db::documents::{self, DocumentStats};
use crate::db::models::{CategoryWithCount, DocumentWithCategory};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::geocode::{parse_coordinate, Address};
use crate::map::category_color;
use crate::routes::home::{bounds_json, legend, Html, LegendEntry};
use crate::routes::multipart::MultipartForm;
use crate::state::AppState;

const LATEST_LIMIT: i64 = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(overview))
        .route("/dashboard/documents", get(document_list).post(create_document))
        .route("/dashboard/documents/new", get(new_document))
        .route("/dashboard/documents/{id}", post(update_document))
        .route("/dashboard/documents/{id}/edit", get(edit_document))
        .route("/dashboard/documents/{id}/delete", post(delete_document))
        .route("/dashboard/categories", get(category_list).post(create_category))
        .route("/dashboard/categories/{id}", post(update_category))
        .route("/dashboard/categories/{id}/delete", post(delete_category))
        .route("/dashboard/map", get(admin_map))
        .route("/dashboard/geocode", get(lookup_address))
}

// -- View models --

/// One line of a document table.
pub struct DocumentRow {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub color: String,
    pub location: String,
    pub file_path: String,
    pub is_published: bool,
    pub view_count: i64,
    pub download_count: i64,
    pub created: String,
}

impl From<DocumentWithCategory> for DocumentRow {
    fn from(row: DocumentWithCategory) -> Self {
        let doc = row.document;
        DocumentRow {
            id: doc.id,
            title: doc.title,
            color: category_color(row.category.id).primary,
            category: row.category.name,
            location: format!("{} / {} / {}", doc.district, doc.amphoe, doc.province),
            file_path: doc.file_path,
            is_published: doc.is_published,
            view_count: doc.view_count,
            download_count: doc.download_count,
            created: doc.created_at.format("%d/%m/%Y %H:%M").to_string(),
        }
    }
}

pub struct CategoryOption {
    pub id: i64,
    pub name: String,
    pub selected: bool,
}

/// What the document form shows: the submitted values on a failed save,
/// the stored ones when editing.
#[derive(Default)]
pub struct DocumentFormValues {
    pub title: String,
    pub description: String,
    pub category_id: Option<i64>,
    pub province: String,
    pub amphoe: String,
    pub district: String,
    pub latitude: String,
    pub longitude: String,
    pub is_published: bool,
    pub file_path: Option<String>,
    pub cover_image: Option<String>,
}

impl DocumentFormValues {
    fn blank() -> Self {
        DocumentFormValues {
            is_published: true,
            ..Default::default()
        }
    }

    fn from_form(form: &MultipartForm) -> Self {
        let text = |name: &str| form.text(name).unwrap_or_default().to_string();
        DocumentFormValues {
            title: text("title"),
            description: text("description"),
            category_id: form.text("categoryId").and_then(|v| v.parse().ok()),
            province: text("province"),
            amphoe: text("amphoe"),
            district: text("district"),
            latitude: text("latitude"),
            longitude: text("longitude"),
            is_published: form.text("isPublished").map_or(true, catalog::parse_flag),
            file_path: None,
            cover_image: None,
        }
    }

    fn from_document(row: &DocumentWithCategory) -> Self {
        let doc = &row.document;
        DocumentFormValues {
            title: doc.title.clone(),
            description: doc.description.clone(),
            category_id: Some(doc.category_id),
            province: doc.province.clone(),
            amphoe: doc.amphoe.clone(),
            district: doc.district.clone(),
            latitude: doc.latitude.to_string(),
            longitude: doc.longitude.to_string(),
            is_published: doc.is_published,
            file_path: Some(doc.file_path.clone()),
            cover_image: doc.cover_image.clone(),
        }
    }
}

// -- Templates --

#[derive(Template)]
#[template(path = "pages/dashboard.html")]
struct DashboardTemplate {
    user_name: String,
    stats: DocumentStats,
    category_count: usize,
    latest: Vec<DocumentRow>,
}

#[derive(Template)]
#[template(path = "pages/documents.html")]
struct DocumentsTemplate {
    user_name: String,
    documents: Vec<DocumentRow>,
}

#[derive(Template)]
#[template(path = "pages/document_form.html")]
struct DocumentFormTemplate {
    user_name: String,
    heading: String,
    action: String,
    is_edit: bool,
    categories: Vec<CategoryOption>,
    values: DocumentFormValues,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/categories.html")]
struct CategoriesTemplate {
    user_name: String,
    categories: Vec<CategoryWithCount>,
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/map.html")]
struct AdminMapTemplate {
    user_name: String,
    legend: Vec<LegendEntry>,
    bounds_json: String,
}

// -- Helpers --

fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse()
        .map_err(|_| AppError::NotFound("ไม่พบข้อมูล".into()))
}

fn category_options(state: &AppState, selected: Option<i64>) -> AppResult<Vec<CategoryOption>> {
    let conn = state.db.get()?;
    Ok(categories::list(&conn)?
        .into_iter()
        .map(|c| CategoryOption {
            selected: Some(c.id) == selected,
            id: c.id,
            name: c.name,
        })
        .collect())
}

/// Validation failures re-render the page; anything else is a real error.
fn is_form_error(err: &AppError) -> bool {
    matches!(err, AppError::BadRequest(_))
}

fn document_form(
    state: &AppState,
    user: &CurrentUser,
    editing: Option<i64>,
    values: DocumentFormValues,
    error: Option<String>,
) -> AppResult<Response> {
    let (heading, action) = match editing {
        Some(id) => ("แก้ไขเอกสาร".to_string(), format!("/dashboard/documents/{id}")),
        None => ("อัพโหลดเอกสาร".to_string(), "/dashboard/documents".to_string()),
    };
    let status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    let template = DocumentFormTemplate {
        user_name: user.display_name(),
        heading,
        action,
        is_edit: editing.is_some(),
        categories: category_options(state, values.category_id)?,
        values,
        error,
    };
    Ok((status, Html(template)).into_response())
}

fn categories_page(
    state: &AppState,
    user: &CurrentUser,
    error: Option<String>,
) -> AppResult<Response> {
    let status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };
    let categories = {
        let conn = state.db.get()?;
        categories::list_with_counts(&conn)?
    };
    let template = CategoriesTemplate {
        user_name: user.display_name(),
        categories,
        error,
    };
    Ok((status, Html(template)).into_response())
}

// -- Overview --

/// GET /dashboard
async fn overview(State(state): State<AppState>, user: CurrentUser) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let template = DashboardTemplate {
        user_name: user.display_name(),
        stats: documents::stats(&conn)?,
        category_count: categories::list(&conn)?.len(),
        latest: documents::latest(&conn, LATEST_LIMIT)?
            .into_iter()
            .map(DocumentRow::from)
            .collect(),
    };
    Ok(Html(template))
}

// -- Documents --

/// GET /dashboard/documents
async fn document_list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    let conn = state.db.get()?;
    let template = DocumentsTemplate {
        user_name: user.display_name(),
        documents: documents::list(&conn, false)?
            .into_iter()
            .map(DocumentRow::from)
            .collect(),
    };
    Ok(Html(template))
}

/// GET /dashboard/documents/new
async fn new_document(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    document_form(&state, &user, None, DocumentFormValues::blank(), None)
}

/// POST /dashboard/documents
async fn create_document(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = match MultipartForm::read(multipart).await {
        Ok(form) => form,
        Err(e) if is_form_error(&e) => {
            let message = e.public_message();
            return document_form(&state, &user, None, DocumentFormValues::blank(), Some(message));
        }
        Err(e) => return Err(e),
    };
    let values = DocumentFormValues::from_form(&form);

    match catalog::create(&state, form).await {
        Ok(_) => Ok(Redirect::to("/dashboard/documents").into_response()),
        Err(e) if is_form_error(&e) => {
            let message = e.public_message();
            document_form(&state, &user, None, values, Some(message))
        }
        Err(e) => Err(e),
    }
}

/// GET /dashboard/documents/{id}/edit
async fn edit_document(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let doc = {
        let conn = state.db.get()?;
        documents::find(&conn, id)?
    }
    .ok_or_else(|| AppError::NotFound("ไม่พบเอกสาร".into()))?;

    document_form(&state, &user, Some(id), DocumentFormValues::from_document(&doc), None)
}

/// POST /dashboard/documents/{id}
async fn update_document(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let stored = {
        let conn = state.db.get()?;
        documents::find(&conn, id)?
    }
    .ok_or_else(|| AppError::NotFound("ไม่พบเอกสาร".into()))?;

    let form = match MultipartForm::read(multipart).await {
        Ok(form) => form,
        Err(e) if is_form_error(&e) => {
            let values = DocumentFormValues::from_document(&stored);
            let message = e.public_message();
            return document_form(&state, &user, Some(id), values, Some(message));
        }
        Err(e) => return Err(e),
    };
    let mut values = DocumentFormValues::from_form(&form);
    values.file_path = Some(stored.document.file_path.clone());
    values.cover_image = stored.document.cover_image.clone();

    match catalog::update(&state, id, form).await {
        Ok(_) => Ok(Redirect::to("/dashboard/documents").into_response()),
        Err(e) if is_form_error(&e) => {
            let message = e.public_message();
            document_form(&state, &user, Some(id), values, Some(message))
        }
        Err(e) => Err(e),
    }
}

/// POST /dashboard/documents/{id}/delete
async fn delete_document(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Redirect> {
    let id = parse_id(&id)?;
    catalog::delete(&state, id).await?;
    Ok(Redirect::to("/dashboard/documents"))
}

// -- Categories --

#[derive(Deserialize)]
struct CategoryForm {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

impl CategoryForm {
    /// Trimmed name and optional description; an empty name is refused.
    fn cleaned(&self) -> AppResult<(&str, Option<&str>)> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("กรุณากรอกชื่อหมวดหมู่".into()));
        }
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        Ok((name, description))
    }
}

/// GET /dashboard/categories
async fn category_list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    categories_page(&state, &user, None)
}

/// POST /dashboard/categories
async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CategoryForm>,
) -> AppResult<Response> {
    let (name, description) = match form.cleaned() {
        Ok(cleaned) => cleaned,
        Err(e) => return categories_page(&state, &user, Some(e.public_message())),
    };

    let id = {
        let conn = state.db.get()?;
        categories::insert(&conn, name, description)?
    };
    tracing::info!("Created category {} ({})", id, name);
    Ok(Redirect::to("/dashboard/categories").into_response())
}

/// POST /dashboard/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<CategoryForm>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let (name, description) = match form.cleaned() {
        Ok(cleaned) => cleaned,
        Err(e) => return categories_page(&state, &user, Some(e.public_message())),
    };

    let updated = {
        let conn = state.db.get()?;
        categories::update(&conn, id, name, description)?
    };
    if !updated {
        return Err(AppError::NotFound("ไม่พบหมวดหมู่".into()));
    }
    tracing::info!("Updated category {}", id);
    Ok(Redirect::to("/dashboard/categories").into_response())
}

/// POST /dashboard/categories/{id}/delete: refused while documents still
/// reference the category.
async fn delete_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id)?;
    let outcome = {
        let conn = state.db.get()?;
        categories::delete(&conn, id)?
    };

    match outcome {
        DeleteOutcome::Deleted => {
            tracing::info!("Deleted category {}", id);
            Ok(Redirect::to("/dashboard/categories").into_response())
        }
        DeleteOutcome::NotFound => Err(AppError::NotFound("ไม่พบหมวดหมู่".into())),
        DeleteOutcome::InUse(count) => {
            tracing::info!("Refused to delete category {} ({} documents)", id, count);
            categories_page(
                &state,
                &user,
                Some(format!(
                    "ไม่สามารถลบหมวดหมู่ได้ เนื่องจากยังมีเอกสาร {count} รายการในหมวดหมู่นี้"
                )),
            )
        }
    }
}

// -- Map --

/// GET /dashboard/map: every document, click to look up an address.
async fn admin_map(State(state): State<AppState>, user: CurrentUser) -> AppResult<impl IntoResponse> {
    Ok(Html(AdminMapTemplate {
        user_name: user.display_name(),
        legend: legend(&state)?,
        bounds_json: bounds_json(),
    }))
}

#[derive(Deserialize)]
struct PointQuery {
    lat: Option<String>,
    lng: Option<String>,
}

/// GET /dashboard/geocode?lat=&lng=: the address fields for the document form.
async fn lookup_address(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<PointQuery>,
) -> AppResult<Json<Address>> {
    let (Some(lat), Some(lng)) = (
        parse_coordinate(query.lat.as_deref()),
        parse_coordinate(query.lng.as_deref()),
    ) else {
        return Err(AppError::BadRequest("Missing coordinates".into()));
    };

    let value = state.geocoder.reverse(lat, lng).await.map_err(|e| {
        tracing::error!("Reverse geocoding ({}, {}) failed: {}", lat, lng, e);
        AppError::Upstream("Failed to fetch address data".into())
    })?;

    Address::from_value(&value)
        .map(Json)
        .ok_or_else(|| AppError::NotFound("ไม่พบที่อยู่ของตำแหน่งนี้".into()))
}
