//! Uploaded file storage under the public web root.
//!
//! Files are named after the upload timestamp in milliseconds and are
//! referenced from the database by their relative URL
//! (`/uploads/<bucket>/<name>`). The database and the disk are not
//! transactionally linked, so removal is best-effort.

use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};

const MB: usize = 1024 * 1024;

pub const MAX_DOCUMENT_BYTES: usize = 10 * MB;
pub const MAX_IMAGE_BYTES: usize = 5 * MB;

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

const UPLOAD_FAILED: &str = "เกิดข้อผิดพลาดในการอัพโหลดไฟล์";

/// URL prefix under which uploads are served.
pub const UPLOADS_PREFIX: &str = "/uploads";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Document,
    Cover,
    Avatar,
}

impl UploadKind {
    pub fn bucket(&self) -> &'static str {
        match self {
            UploadKind::Document => "documents",
            UploadKind::Cover => "covers",
            UploadKind::Avatar => "avatars",
        }
    }

    pub fn max_bytes(&self) -> usize {
        match self {
            UploadKind::Document => MAX_DOCUMENT_BYTES,
            UploadKind::Cover | UploadKind::Avatar => MAX_IMAGE_BYTES,
        }
    }

    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadKind::Document => DOCUMENT_EXTENSIONS,
            UploadKind::Cover | UploadKind::Avatar => IMAGE_EXTENSIONS,
        }
    }

    fn type_message(&self) -> &'static str {
        match self {
            UploadKind::Document => "รองรับเฉพาะไฟล์ PDF และ Word (.pdf, .doc, .docx)",
            UploadKind::Cover | UploadKind::Avatar => {
                "รองรับเฉพาะไฟล์รูปภาพ (.jpg, .jpeg, .png, .gif, .webp)"
            }
        }
    }
}

/// A file part received from a multipart form.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Lower-case extension of the client file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Check size and type, returning the extension to store the file under.
///
/// Images sent without an extension are accepted as `.jpg` when the client
/// labels them `image/*`.
pub fn validate(kind: UploadKind, file: &UploadedFile) -> AppResult<String> {
    if file.bytes.len() > kind.max_bytes() {
        return Err(AppError::BadRequest(format!(
            "ขนาดไฟล์ต้องไม่เกิน {}MB",
            kind.max_bytes() / MB
        )));
    }

    match file.extension() {
        Some(ext) if kind.allowed_extensions().contains(&ext.as_str()) => Ok(ext),
        None if kind != UploadKind::Document
            && file
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("image/")) =>
        {
            Ok("jpg".to_string())
        }
        _ => Err(AppError::BadRequest(kind.type_message().to_string())),
    }
}

/// Prefix a stored path with `/` if it lacks one.
pub fn normalize_public_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    public_dir: PathBuf,
}

impl Storage {
    pub fn new(public_dir: impl Into<PathBuf>) -> Self {
        Self {
            public_dir: public_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.public_dir.join("uploads")
    }

    /// Map a stored relative URL to a file under the public directory.
    /// Paths that would escape it resolve to `None`.
    pub fn resolve(&self, public_path: &str) -> Option<PathBuf> {
        let normalized = normalize_public_path(public_path);
        let relative = Path::new(normalized.trim_start_matches('/'));

        if relative.as_os_str().is_empty() {
            return None;
        }
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.public_dir.join(relative))
    }

    /// Validate and write an upload. Returns its relative URL.
    pub async fn save(&self, kind: UploadKind, file: &UploadedFile) -> AppResult<String> {
        let ext = validate(kind, file)?;
        let dir = self.uploads_dir().join(kind.bucket());

        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            tracing::error!("Failed to create upload dir {}: {}", dir.display(), e);
            AppError::Upload(UPLOAD_FAILED.to_string())
        })?;

        let stamp = chrono::Utc::now().timestamp_millis();
        let (name, mut handle) = open_unique(&dir, stamp, &ext).await.map_err(|e| {
            tracing::error!("Failed to create upload file in {}: {}", dir.display(), e);
            AppError::Upload(UPLOAD_FAILED.to_string())
        })?;

        let path = dir.join(&name);
        let written = async {
            handle.write_all(&file.bytes).await?;
            handle.flush().await
        }
        .await;

        if let Err(e) = written {
            tracing::error!("Failed to write upload {}: {}", path.display(), e);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!("Failed to remove partial upload {}: {}", path.display(), e);
            }
            return Err(AppError::Upload(UPLOAD_FAILED.to_string()));
        }

        let public_path = format!("{}/{}/{}", UPLOADS_PREFIX, kind.bucket(), name);
        tracing::info!(
            "Stored upload {} ({} bytes) as {}",
            file.file_name,
            file.bytes.len(),
            public_path
        );
        Ok(public_path)
    }

    pub async fn delete(&self, public_path: &str) -> std::io::Result<()> {
        let path = self.resolve(public_path).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("path outside public dir: {public_path}"),
            )
        })?;
        tokio::fs::remove_file(path).await
    }

    /// Remove a stored file, logging instead of failing.
    pub async fn delete_best_effort(&self, public_path: &str) {
        if let Err(e) = self.delete(public_path).await {
            tracing::warn!("Failed to delete file {}: {}", public_path, e);
        }
    }
}

/// Create `<stamp>.<ext>`, or `<stamp>-<n>.<ext>` when that name is taken.
async fn open_unique(
    dir: &Path,
    stamp: i64,
    ext: &str,
) -> std::io::Result<(String, tokio::fs::File)> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{stamp}.{ext}")
        } else {
            format!("{stamp}-{attempt}.{ext}")
        };
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await
        {
            Ok(handle) => return Ok((name, handle)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 1000 => {
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
