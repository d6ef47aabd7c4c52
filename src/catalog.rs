//! Document create, update and delete: the file writes and the row writes
//! that have to happen together.

use crate::db::documents::{self, DocumentChanges, NewDocument};
use crate::db::models::DocumentWithCategory;
use crate::db::categories;
use crate::error::{AppError, AppResult};
use crate::routes::multipart::MultipartForm;
use crate::state::{AppState, DbPool};
use crate::storage::{self, Storage, UploadKind, UploadedFile};

pub const DOCUMENT_FIELD: &str = "document";
pub const COVER_FIELD: &str = "coverImage";

const DOCUMENT_NOT_FOUND: &str = "ไม่พบเอกสาร";
const DELETE_TARGET_NOT_FOUND: &str = "ไม่พบเอกสารที่ต้องการลบ";

/// Validated metadata from a document form.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInput {
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub province: String,
    pub amphoe: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_published: bool,
}

impl DocumentInput {
    pub fn from_form(form: &MultipartForm) -> AppResult<Self> {
        let required = |name: &str| {
            form.text(name)
                .map(str::to_string)
                .ok_or_else(|| AppError::BadRequest("กรุณากรอกข้อมูลให้ครบถ้วน".into()))
        };

        let title = required("title")?;
        let description = required("description")?;
        let category_id = required("categoryId")?
            .parse::<i64>()
            .map_err(|_| AppError::BadRequest("หมวดหมู่ไม่ถูกต้อง".into()))?;
        let province = required("province")?;
        let amphoe = required("amphoe")?;
        let district = required("district")?;

        Ok(DocumentInput {
            title,
            description,
            category_id,
            province,
            amphoe,
            district,
            latitude: parse_coordinate(form.text("latitude"))?,
            longitude: parse_coordinate(form.text("longitude"))?,
            is_published: form.text("isPublished").map_or(true, parse_flag),
        })
    }
}

/// Missing coordinates default to 0, like an unplaced marker.
fn parse_coordinate(raw: Option<&str>) -> AppResult<f64> {
    match raw {
        None => Ok(0.0),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| AppError::BadRequest("พิกัดไม่ถูกต้อง".into())),
    }
}

pub(crate) fn parse_flag(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "true" | "on" | "1" | "yes")
}

fn ensure_category(state: &AppState, category_id: i64) -> AppResult<()> {
    let conn = state.db.get()?;
    if categories::exists(&conn, category_id)? {
        Ok(())
    } else {
        Err(AppError::BadRequest("ไม่พบหมวดหมู่ที่เลือก".into()))
    }
}

fn load(state: &AppState, id: i64) -> AppResult<DocumentWithCategory> {
    let conn = state.db.get()?;
    documents::find(&conn, id)?.ok_or_else(|| AppError::NotFound(DOCUMENT_NOT_FOUND.into()))
}

/// Validate both files up front so a bad cover never leaves an orphaned document file.
fn prevalidate(document: Option<&UploadedFile>, cover: Option<&UploadedFile>) -> AppResult<()> {
    if let Some(file) = document {
        storage::validate(UploadKind::Document, file)?;
    }
    if let Some(file) = cover {
        storage::validate(UploadKind::Cover, file)?;
    }
    Ok(())
}

async fn store_files(
    state: &AppState,
    document: Option<&UploadedFile>,
    cover: Option<&UploadedFile>,
) -> AppResult<(Option<String>, Option<String>)> {
    let file_path = match document {
        Some(file) => Some(state.storage.save(UploadKind::Document, file).await?),
        None => None,
    };

    let cover_path = match cover {
        Some(file) => match state.storage.save(UploadKind::Cover, file).await {
            Ok(path) => Some(path),
            Err(e) => {
                if let Some(path) = &file_path {
                    state.storage.delete_best_effort(path).await;
                }
                return Err(e);
            }
        },
        None => None,
    };

    Ok((file_path, cover_path))
}

async fn discard(storage: &Storage, paths: &[Option<String>]) {
    for path in paths.iter().flatten() {
        storage.delete_best_effort(path).await;
    }
}

/// Write the edited row. The new files are removed when the write fails or
/// the row is gone, so they never outlive a failed update.
async fn commit_update(
    db: &DbPool,
    storage: &Storage,
    id: i64,
    changes: &DocumentChanges,
) -> AppResult<()> {
    let updated = db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| Ok(documents::update(&conn, id, changes)?));

    let err = match updated {
        Ok(true) => return Ok(()),
        Ok(false) => AppError::NotFound(DOCUMENT_NOT_FOUND.into()),
        Err(e) => e,
    };
    discard(
        storage,
        &[changes.file_path.clone(), changes.cover_image.clone()],
    )
    .await;
    Err(err)
}

fn remove_row(db: &DbPool, id: i64) -> AppResult<()> {
    let conn = db.get()?;
    if documents::delete(&conn, id)? {
        Ok(())
    } else {
        Err(AppError::NotFound(DELETE_TARGET_NOT_FOUND.into()))
    }
}

/// Write the uploaded files, then the row.
pub async fn create(state: &AppState, mut form: MultipartForm) -> AppResult<DocumentWithCategory> {
    let input = DocumentInput::from_form(&form)?;
    let document = form
        .take_file(DOCUMENT_FIELD)
        .ok_or_else(|| AppError::BadRequest("กรุณาเลือกไฟล์เอกสาร".into()))?;
    let cover = form.take_file(COVER_FIELD);

    prevalidate(Some(&document), cover.as_ref())?;
    ensure_category(state, input.category_id)?;

    let (file_path, cover_image) = store_files(state, Some(&document), cover.as_ref()).await?;
    let file_path = file_path.ok_or_else(|| AppError::Internal("document path missing".into()))?;

    let new_doc = NewDocument {
        title: input.title,
        description: input.description,
        category_id: input.category_id,
        file_path: file_path.clone(),
        cover_image: cover_image.clone(),
        province: input.province,
        amphoe: input.amphoe,
        district: input.district,
        latitude: input.latitude,
        longitude: input.longitude,
        is_published: input.is_published,
    };

    let inserted = {
        let conn = state.db.get()?;
        documents::insert(&conn, &new_doc)
    };
    let id = match inserted {
        Ok(id) => id,
        Err(e) => {
            discard(&state.storage, &[Some(file_path), cover_image]).await;
            return Err(e.into());
        }
    };

    tracing::info!("Created document {} ({})", id, new_doc.title);
    load(state, id)
}

/// Update metadata, swapping in any replacement files. Replaced files are
/// removed best-effort once the row points at the new ones.
pub async fn update(
    state: &AppState,
    id: i64,
    mut form: MultipartForm,
) -> AppResult<DocumentWithCategory> {
    let existing = load(state, id)?.document;
    let input = DocumentInput::from_form(&form)?;
    let document = form.take_file(DOCUMENT_FIELD);
    let cover = form.take_file(COVER_FIELD);

    prevalidate(document.as_ref(), cover.as_ref())?;
    ensure_category(state, input.category_id)?;

    let (file_path, cover_image) = store_files(state, document.as_ref(), cover.as_ref()).await?;

    let changes = DocumentChanges {
        title: input.title,
        description: input.description,
        category_id: input.category_id,
        province: input.province,
        amphoe: input.amphoe,
        district: input.district,
        latitude: input.latitude,
        longitude: input.longitude,
        is_published: input.is_published,
        file_path: file_path.clone(),
        cover_image: cover_image.clone(),
    };

    commit_update(&state.db, &state.storage, id, &changes).await?;

    if file_path.is_some() {
        state.storage.delete_best_effort(&existing.file_path).await;
    }
    if cover_image.is_some() {
        if let Some(old) = &existing.cover_image {
            state.storage.delete_best_effort(old).await;
        }
    }

    tracing::info!("Updated document {}", id);
    load(state, id)
}

/// Remove the row, then its files. File errors are logged only.
pub async fn delete(state: &AppState, id: i64) -> AppResult<()> {
    let existing = {
        let conn = state.db.get()?;
        documents::find(&conn, id)?
            .ok_or_else(|| AppError::NotFound(DELETE_TARGET_NOT_FOUND.into()))?
    };

    remove_row(&state.db, id)?;

    let doc = existing.document;
    discard(&state.storage, &[Some(doc.file_path), doc.cover_image]).await;

    tracing::info!("Deleted document {}", id);
    Ok(())
}
