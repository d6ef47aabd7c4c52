use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::db::models::{CategoryWithCount, DocumentWithCategory};
use crate::db::{categories, documents};
use crate::error::{AppError, AppResult};
use crate::extractors::{AdminUser, MaybeUser};
use crate::geocode::parse_coordinate;
use crate::map::{self, CategoryTally, MapBounds, Marker};
use crate::routes::multipart::MultipartForm;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list_categories))
        .route(
            "/api/documents/card",
            get(list_documents).post(create_document),
        )
        .route("/api/documents/card/{id}", delete(delete_document))
        .route("/api/documents/search", get(search_documents))
        .route("/api/documents/filter", get(filter_documents))
        .route("/api/documents/download/{id}", get(download_document))
        .route("/api/documents/{id}", get(document_detail))
        .route("/api/gistda/reverse-geocode", get(reverse_geocode))
        .route("/api/map/markers", get(map_markers))
}

// --- Query types ---

#[derive(Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
struct FilterQuery {
    #[serde(rename = "categoryId")]
    category_id: Option<String>,
}

#[derive(Deserialize)]
struct CoordinateQuery {
    lat: Option<String>,
    lng: Option<String>,
}

#[derive(Deserialize)]
struct MarkerQuery {
    categories: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MarkerResponse {
    markers: Vec<Marker>,
    categories: Vec<CategoryTally>,
    total: usize,
    bounds: MapBounds,
}

fn parse_id(raw: &str, not_found: &str) -> AppResult<i64> {
    raw.parse()
        .map_err(|_| AppError::NotFound(not_found.to_string()))
}

// --- Handlers ---

/// GET /api/categories
async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<CategoryWithCount>>> {
    let conn = state.db.get()?;
    Ok(Json(categories::list_with_counts(&conn)?))
}

/// GET /api/documents/card: every document, unpublished included.
async fn list_documents(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<DocumentWithCategory>>> {
    let conn = state.db.get()?;
    Ok(Json(documents::list(&conn, false)?))
}

/// POST /api/documents/card
async fn create_document(
    State(state): State<AppState>,
    _admin: AdminUser,
    multipart: Multipart,
) -> AppResult<Response> {
    let form = MultipartForm::read(multipart).await?;
    let doc = catalog::create(&state, form).await?;
    Ok((StatusCode::CREATED, Json(doc)).into_response())
}

/// DELETE /api/documents/card/{id}
async fn delete_document(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let id = parse_id(&id, "ไม่พบเอกสารที่ต้องการลบ")?;
    catalog::delete(&state, id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/documents/{id}: counts as a view.
async fn document_detail(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Json<DocumentWithCategory>> {
    let id = parse_id(&id, "ไม่พบเอกสาร")?;
    let conn = state.db.get()?;

    let doc = documents::find(&conn, id)?
        .filter(|d| d.document.is_published || maybe_user.is_admin())
        .ok_or_else(|| AppError::NotFound("ไม่พบเอกสาร".into()))?;

    documents::increment_views(&conn, id)?;
    let mut doc = doc;
    doc.document.view_count += 1;
    Ok(Json(doc))
}

/// GET /api/documents/download/{id}: send the file and count the download.
async fn download_document(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let id = parse_id(&id, "ไม่พบเอกสาร")?;

    let doc = {
        let conn = state.db.get()?;
        documents::find(&conn, id)?
    }
    .filter(|d| d.document.is_published || maybe_user.is_admin())
    .ok_or_else(|| AppError::NotFound("ไม่พบเอกสาร".into()))?
    .document;

    let download_failed = || AppError::Internal("เกิดข้อผิดพลาดในการดาวน์โหลด".into());

    let path = state.storage.resolve(&doc.file_path).ok_or_else(|| {
        tracing::error!("Document {} has an unusable path {}", id, doc.file_path);
        download_failed()
    })?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        tracing::error!("Download of document {} failed: {}: {}", id, path.display(), e);
        download_failed()
    })?;

    {
        let conn = state.db.get()?;
        documents::increment_downloads(&conn, id)?;
    }

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();

    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.as_ref()).map_err(|_| download_failed())?,
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&content_disposition(&doc.title, &ext))
            .map_err(|_| download_failed())?,
    );

    tracing::info!("Document {} downloaded", id);
    Ok(response)
}

/// GET /api/documents/search?q=
async fn search_documents(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<DocumentWithCategory>>> {
    let conn = state.db.get()?;
    Ok(Json(documents::search(&conn, query.q.as_deref())?))
}

/// GET /api/documents/filter?categoryId=
async fn filter_documents(
    State(state): State<AppState>,
    Query(query): Query<FilterQuery>,
) -> AppResult<Json<Vec<DocumentWithCategory>>> {
    let category_id = query
        .category_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("ต้องระบุหมวดหมู่".into()))?
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest("หมวดหมู่ไม่ถูกต้อง".into()))?;

    let conn = state.db.get()?;
    Ok(Json(documents::published_in_category(&conn, category_id)?))
}

/// GET /api/gistda/reverse-geocode?lat=&lng=
async fn reverse_geocode(
    State(state): State<AppState>,
    Query(query): Query<CoordinateQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let (Some(lat), Some(lng)) = (
        parse_coordinate(query.lat.as_deref()),
        parse_coordinate(query.lng.as_deref()),
    ) else {
        return Err(AppError::BadRequest("Missing coordinates".into()));
    };

    match state.geocoder.reverse(lat, lng).await {
        Ok(value) => Ok(Json(value)),
        Err(e) => {
            tracing::error!("Reverse geocoding ({}, {}) failed: {}", lat, lng, e);
            Err(AppError::Upstream("Failed to fetch address data".into()))
        }
    }
}

/// GET /api/map/markers?categories=1,2: published documents as map markers.
async fn map_markers(
    State(state): State<AppState>,
    maybe_user: MaybeUser,
    Query(query): Query<MarkerQuery>,
) -> AppResult<Json<MarkerResponse>> {
    let selected = map::parse_selection(query.categories.as_deref());
    let docs = {
        let conn = state.db.get()?;
        // Admins see drafts on the dashboard map too.
        documents::list(&conn, !maybe_user.is_admin())?
    };

    let markers = map::select_markers(docs, &selected);
    Ok(Json(MarkerResponse {
        categories: map::tally(&markers),
        total: markers.len(),
        markers,
        bounds: map::THAILAND_BOUNDS,
    }))
}

// --- Helpers ---

/// `attachment; filename="<title><ext>"` with an RFC 5987 UTF-8 variant,
/// since titles are usually Thai.
fn content_disposition(title: &str, ext: &str) -> String {
    let name = format!("{title}{ext}");
    let ascii: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes())
        .collect::<String>()
        .replace('+', "%20");
    format!("attachment; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
}
