use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Format SQLite writes for `datetime('now')` and `strftime(... %f ...)`.
const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Parse a timestamp column. Unparseable values fall back to the epoch so
/// a malformed row never fails a whole listing.
pub fn parse_db_time(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, DB_TIME_FORMAT).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw == "ADMIN" {
            Role::Admin
        } else {
            Role::Member
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub image: Option<String>,
    pub role: Role,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Category row plus the number of documents filed under it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub document_count: i64,
}

/// A geotagged document. `district` holds the subdistrict (tambon) and
/// `amphoe` the district.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub file_path: String,
    pub cover_image: Option<String>,
    pub province: String,
    pub amphoe: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_published: bool,
    pub view_count: i64,
    pub download_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentWithCategory {
    #[serde(flatten)]
    pub document: Document,
    pub category: Category,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_second_and_millisecond_precision() {
        let a = parse_db_time("2025-01-15 12:00:00");
        let b = parse_db_time("2025-01-15 12:00:00.250");
        assert!(b > a);
        assert_eq!(a.format("%Y-%m-%d").to_string(), "2025-01-15");
    }

    #[test]
    fn bad_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_db_time("yesterday"), NaiveDateTime::default());
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!(Role::parse(Role::Admin.as_str()), Role::Admin);
        assert_eq!(Role::parse("MEMBER"), Role::Member);
        assert_eq!(Role::parse("something-else"), Role::Member);
    }

    #[test]
    fn user_json_hides_password_hash() {
        let user = User {
            id: 1,
            first_name: "Somchai".into(),
            last_name: "Jaidee".into(),
            email: "somchai@example.com".into(),
            password_hash: Some("$2b$12$secret".into()),
            image: None,
            role: Role::Admin,
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["firstName"], "Somchai");
        assert_eq!(json["role"], "ADMIN");
    }
}
