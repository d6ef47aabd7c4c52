use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Generic message returned in place of infrastructure failures.
const INTERNAL_MESSAGE: &str = "เกิดข้อผิดพลาดภายในระบบ";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A file could not be written. The message is shown to the caller.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// The external geocoding service failed. The message is shown to the caller.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the caller.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Upload(msg) | AppError::Upstream(msg) => msg.clone(),
            AppError::Unauthorized => "กรุณาเข้าสู่ระบบ".to_string(),
            AppError::Forbidden => "ไม่มีสิทธิ์เข้าถึง".to_string(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Upload(_)
            | AppError::Upstream(_)
            | AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Io(_)
            | AppError::Internal(_)
            | AppError::Json(_) => tracing::error!("{}", self),
            _ => {}
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (self.status(), Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(
            response_status(AppError::NotFound("ไม่พบเอกสาร".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn unauthorized_returns_401() {
        assert_eq!(
            response_status(AppError::Unauthorized),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn forbidden_returns_403() {
        assert_eq!(response_status(AppError::Forbidden), StatusCode::FORBIDDEN);
    }

    #[test]
    fn bad_request_returns_400() {
        assert_eq!(
            response_status(AppError::BadRequest("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upload_and_upstream_return_500() {
        assert_eq!(
            response_status(AppError::Upload("upload failed".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            response_status(AppError::Upstream("Failed to fetch address data".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AppError::Internal("connection string leaked".into());
        assert!(!err.public_message().contains("leaked"));
    }

    #[test]
    fn caller_facing_messages_pass_through() {
        let err = AppError::BadRequest("ต้องระบุหมวดหมู่".into());
        assert_eq!(err.public_message(), "ต้องระบุหมวดหมู่");
    }
}
