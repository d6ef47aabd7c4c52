#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use geodoc::auth::{self, session};
use geodoc::config::Config;
use geodoc::db::documents::{self, NewDocument};
use geodoc::db::models::Role;
use geodoc::db::users::{self, NewUser};
use geodoc::db::{self, categories};
use geodoc::geocode::{GeocodeError, ReverseGeocoder};
use geodoc::routes;
use geodoc::state::AppState;
use geodoc::storage::Storage;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct-horse";

/// Geocoder that answers from a fixed value, or fails when there is none.
pub struct StubGeocoder(pub Option<Value>);

#[async_trait]
impl ReverseGeocoder for StubGeocoder {
    async fn reverse(&self, _lat: f64, _lng: f64) -> Result<Value, GeocodeError> {
        self.0.clone().ok_or(GeocodeError::Status(503))
    }
}

pub struct TestApp {
    // Held so the data directory outlives the test.
    pub dir: TempDir,
    pub state: AppState,
    pub admin_id: i64,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_geocoder(StubGeocoder(Some(serde_json::json!({
            "province": "กรุงเทพมหานคร",
            "district": "ปทุมวัน",
            "subdistrict": "ลุมพินี",
            "geocode": "103302"
        }))))
    }

    pub fn with_geocoder(geocoder: StubGeocoder) -> Self {
        let dir = TempDir::new().unwrap();
        let config = Config::for_data_dir(dir.path());
        let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
        db::run_migrations(&pool).expect("Failed to run migrations");
        let admin_id = auth::bootstrap_admin(&pool, ADMIN_EMAIL, ADMIN_PASSWORD).unwrap();

        let state = AppState {
            db: pool,
            storage: Storage::new(config.public_dir()),
            geocoder: Arc::new(geocoder),
            config,
        };
        TestApp {
            dir,
            state,
            admin_id,
        }
    }

    pub fn router(&self) -> Router {
        routes::app(self.state.clone())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    fn cookie_for(&self, user_id: i64) -> String {
        let token = session::create_session(&self.state.db, user_id, 1).unwrap();
        format!("{}={}", self.state.config.auth.cookie_name, token)
    }

    pub fn admin_cookie(&self) -> String {
        self.cookie_for(self.admin_id)
    }

    pub fn member_cookie(&self) -> String {
        let conn = self.state.db.get().unwrap();
        let id = users::insert(
            &conn,
            &NewUser {
                first_name: "Somchai",
                last_name: "Jaidee",
                email: "member@example.com",
                password_hash: "not-a-real-hash",
                role: Role::Member,
            },
        )
        .unwrap();
        drop(conn);
        self.cookie_for(id)
    }

    pub fn category(&self, name: &str) -> i64 {
        let conn = self.state.db.get().unwrap();
        categories::insert(&conn, name, None).unwrap()
    }

    /// Insert a document row pointing at a file written under the public dir.
    pub fn document(&self, category_id: i64, title: &str, published: bool) -> i64 {
        let name = format!("{}.pdf", uuid::Uuid::now_v7());
        let file_path = format!("/uploads/documents/{name}");
        let on_disk = self.state.storage.resolve(&file_path).unwrap();
        std::fs::create_dir_all(on_disk.parent().unwrap()).unwrap();
        std::fs::write(&on_disk, b"%PDF-1.4 test").unwrap();

        let conn = self.state.db.get().unwrap();
        documents::insert(
            &conn,
            &NewDocument {
                title: title.to_string(),
                description: "รายละเอียด".to_string(),
                category_id,
                file_path,
                cover_image: None,
                province: "เชียงใหม่".to_string(),
                amphoe: "เมืองเชียงใหม่".to_string(),
                district: "ศรีภูมิ".to_string(),
                latitude: 18.79,
                longitude: 98.98,
                is_published: published,
            },
        )
        .unwrap()
    }

    pub fn uploaded_files(&self, bucket: &str) -> Vec<std::path::PathBuf> {
        let dir = self.state.storage.uploads_dir().join(bucket);
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn form_post(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn text_body(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Hand-built multipart/form-data body.
pub struct MultipartBuilder {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        MultipartBuilder {
            boundary: "geodoc-test-boundary".to_string(),
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// The standard upload form, minus the file.
    pub fn document_fields(self, category_id: i64, title: &str) -> Self {
        self.text("title", title)
            .text("description", "แผนผังการใช้ประโยชน์ที่ดิน")
            .text("categoryId", &category_id.to_string())
            .text("province", "เชียงใหม่")
            .text("amphoe", "เมืองเชียงใหม่")
            .text("district", "ศรีภูมิ")
            .text("latitude", "18.7883")
            .text("longitude", "98.9853")
    }

    pub fn request(mut self, method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        let mut builder = Request::builder().method(method).uri(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", self.boundary),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(self.body)).unwrap()
    }
}
