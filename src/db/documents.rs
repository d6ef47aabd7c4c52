use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{parse_db_time, Category, Document, DocumentWithCategory};

const JOINED_SELECT: &str = "
    SELECT d.id, d.title, d.description, d.category_id, d.file_path, d.cover_image,
           d.province, d.amphoe, d.district, d.latitude, d.longitude, d.is_published,
           d.view_count, d.download_count, d.created_at, d.updated_at,
           c.id, c.name, c.description, c.created_at, c.updated_at
    FROM documents d
    JOIN categories c ON c.id = d.category_id";

const NEWEST_FIRST: &str = "ORDER BY d.created_at DESC, d.id DESC";

/// Fields written when a document is created.
#[derive(Debug, Clone)]
pub struct NewDocument {
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
}

/// Fields written by the edit form. `None` paths keep the stored file.
#[derive(Debug, Clone)]
pub struct DocumentChanges {
    pub title: String,
    pub description: String,
    pub category_id: i64,
    pub province: String,
    pub amphoe: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_published: bool,
    pub file_path: Option<String>,
    pub cover_image: Option<String>,
}

/// Aggregate counters for the dashboard overview.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStats {
    pub total: i64,
    pub published: i64,
    pub views: i64,
    pub downloads: i64,
}

fn map_joined(row: &Row<'_>) -> rusqlite::Result<DocumentWithCategory> {
    let document = Document {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category_id: row.get(3)?,
        file_path: row.get(4)?,
        cover_image: row.get(5)?,
        province: row.get(6)?,
        amphoe: row.get(7)?,
        district: row.get(8)?,
        latitude: row.get(9)?,
        longitude: row.get(10)?,
        is_published: row.get(11)?,
        view_count: row.get(12)?,
        download_count: row.get(13)?,
        created_at: parse_db_time(&row.get::<_, String>(14)?),
        updated_at: parse_db_time(&row.get::<_, String>(15)?),
    };
    let category = Category {
        id: row.get(16)?,
        name: row.get(17)?,
        description: row.get(18)?,
        created_at: parse_db_time(&row.get::<_, String>(19)?),
        updated_at: parse_db_time(&row.get::<_, String>(20)?),
    };
    Ok(DocumentWithCategory { document, category })
}

fn query_joined(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> rusqlite::Result<Vec<DocumentWithCategory>> {
    let sql = format!("{JOINED_SELECT} {filter} {NEWEST_FIRST}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, map_joined)?;
    rows.collect()
}

pub fn insert(conn: &Connection, doc: &NewDocument) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO documents (title, description, category_id, file_path, cover_image,
                                province, amphoe, district, latitude, longitude, is_published)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            doc.title,
            doc.description,
            doc.category_id,
            doc.file_path,
            doc.cover_image,
            doc.province,
            doc.amphoe,
            doc.district,
            doc.latitude,
            doc.longitude,
            doc.is_published,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<DocumentWithCategory>> {
    conn.query_row(
        &format!("{JOINED_SELECT} WHERE d.id = ?1"),
        params![id],
        map_joined,
    )
    .optional()
}

/// Every document, newest first. Public surfaces pass `published_only`.
pub fn list(conn: &Connection, published_only: bool) -> rusqlite::Result<Vec<DocumentWithCategory>> {
    if published_only {
        query_joined(conn, "WHERE d.is_published = 1", &[])
    } else {
        query_joined(conn, "", &[])
    }
}

/// Published documents whose title, description or place names contain `term`.
/// An empty term matches every published document.
pub fn search(conn: &Connection, term: Option<&str>) -> rusqlite::Result<Vec<DocumentWithCategory>> {
    match term.map(str::trim).filter(|t| !t.is_empty()) {
        None => list(conn, true),
        Some(term) => {
            let pattern = format!("%{}%", escape_like(term));
            query_joined(
                conn,
                "WHERE d.is_published = 1 AND (
                    d.title LIKE ?1 ESCAPE '\\' OR d.description LIKE ?1 ESCAPE '\\'
                    OR d.district LIKE ?1 ESCAPE '\\' OR d.amphoe LIKE ?1 ESCAPE '\\'
                    OR d.province LIKE ?1 ESCAPE '\\')",
                &[&pattern],
            )
        }
    }
}

pub fn published_in_category(
    conn: &Connection,
    category_id: i64,
) -> rusqlite::Result<Vec<DocumentWithCategory>> {
    query_joined(
        conn,
        "WHERE d.is_published = 1 AND d.category_id = ?1",
        &[&category_id],
    )
}

pub fn latest(conn: &Connection, limit: i64) -> rusqlite::Result<Vec<DocumentWithCategory>> {
    let sql = format!("{JOINED_SELECT} {NEWEST_FIRST} LIMIT ?1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![limit], map_joined)?;
    rows.collect()
}

pub fn update(conn: &Connection, id: i64, changes: &DocumentChanges) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE documents SET
            title = ?2, description = ?3, category_id = ?4,
            province = ?5, amphoe = ?6, district = ?7,
            latitude = ?8, longitude = ?9, is_published = ?10,
            file_path = COALESCE(?11, file_path),
            cover_image = COALESCE(?12, cover_image),
            updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now')
         WHERE id = ?1",
        params![
            id,
            changes.title,
            changes.description,
            changes.category_id,
            changes.province,
            changes.amphoe,
            changes.district,
            changes.latitude,
            changes.longitude,
            changes.is_published,
            changes.file_path,
            changes.cover_image,
        ],
    )?;
    Ok(rows > 0)
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

pub fn increment_downloads(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE documents SET download_count = download_count + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

pub fn increment_views(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE documents SET view_count = view_count + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

pub fn stats(conn: &Connection) -> rusqlite::Result<DocumentStats> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_published), 0),
                COALESCE(SUM(view_count), 0), COALESCE(SUM(download_count), 0)
         FROM documents",
        [],
        |row| {
            Ok(DocumentStats {
                total: row.get(0)?,
                published: row.get(1)?,
                views: row.get(2)?,
                downloads: row.get(3)?,
            })
        },
    )
}

/// Whether an unpublished document points at this file, as its document or
/// its cover. `public_path` is matched with and without the leading slash.
pub fn is_draft_file(conn: &Connection, public_path: &str) -> rusqlite::Result<bool> {
    let bare = public_path.trim_start_matches('/');
    let rooted = format!("/{bare}");
    conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM documents
            WHERE is_published = 0
              AND (file_path IN (?1, ?2) OR cover_image IN (?1, ?2))
         )",
        params![rooted, bare],
        |row| row.get(0),
    )
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
pub(crate) fn sample(category_id: i64, title: &str, published: bool) -> NewDocument {
    NewDocument {
        title: title.to_string(),
        description: format!("รายละเอียด {title}"),
        category_id,
        file_path: format!("/uploads/documents/{title}.pdf"),
        cover_image: None,
        province: "เชียงใหม่".to_string(),
        amphoe: "เมืองเชียงใหม่".to_string(),
        district: "ศรีภูมิ".to_string(),
        latitude: 18.79,
        longitude: 98.98,
        is_published: published,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{categories, test_pool};

    #[test]
    fn insert_and_find_with_category() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "แผนที่", None).unwrap();
        let id = insert(&conn, &sample(cat, "plan", true)).unwrap();

        let found = find(&conn, id).unwrap().unwrap();
        assert_eq!(found.document.title, "plan");
        assert_eq!(found.category.name, "แผนที่");
        assert!(found.document.is_published);
        assert_eq!(found.document.download_count, 0);

        assert!(find(&conn, id + 100).unwrap().is_none());
    }

    #[test]
    fn list_orders_newest_first_and_respects_published() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "c", None).unwrap();
        let first = insert(&conn, &sample(cat, "first", true)).unwrap();
        let hidden = insert(&conn, &sample(cat, "hidden", false)).unwrap();
        let last = insert(&conn, &sample(cat, "last", true)).unwrap();

        let all: Vec<i64> = list(&conn, false)
            .unwrap()
            .iter()
            .map(|d| d.document.id)
            .collect();
        assert_eq!(all, vec![last, hidden, first]);

        let public: Vec<i64> = list(&conn, true)
            .unwrap()
            .iter()
            .map(|d| d.document.id)
            .collect();
        assert_eq!(public, vec![last, first]);
    }

    #[test]
    fn search_matches_place_names_and_skips_unpublished() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "c", None).unwrap();

        let mut khon_kaen = sample(cat, "report", true);
        khon_kaen.province = "ขอนแก่น".to_string();
        insert(&conn, &khon_kaen).unwrap();

        let mut hidden = sample(cat, "draft", false);
        hidden.province = "ขอนแก่น".to_string();
        insert(&conn, &hidden).unwrap();

        insert(&conn, &sample(cat, "other", true)).unwrap();

        let hits = search(&conn, Some("ขอนแก่น")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.title, "report");

        assert_eq!(search(&conn, None).unwrap().len(), 2);
        assert_eq!(search(&conn, Some("  ")).unwrap().len(), 2);
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "c", None).unwrap();
        insert(&conn, &sample(cat, "plain", true)).unwrap();
        assert!(search(&conn, Some("%")).unwrap().is_empty());
    }

    #[test]
    fn category_filter_returns_only_published_in_category() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let a = categories::insert(&conn, "a", None).unwrap();
        let b = categories::insert(&conn, "b", None).unwrap();
        insert(&conn, &sample(a, "a1", true)).unwrap();
        insert(&conn, &sample(a, "a2", false)).unwrap();
        insert(&conn, &sample(b, "b1", true)).unwrap();

        let docs = published_in_category(&conn, a).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document.title, "a1");
    }

    #[test]
    fn update_keeps_paths_unless_replaced() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "c", None).unwrap();
        let id = insert(&conn, &sample(cat, "doc", true)).unwrap();

        let mut changes = DocumentChanges {
            title: "renamed".into(),
            description: "new".into(),
            category_id: cat,
            province: "p".into(),
            amphoe: "a".into(),
            district: "d".into(),
            latitude: 1.0,
            longitude: 2.0,
            is_published: false,
            file_path: None,
            cover_image: None,
        };
        assert!(update(&conn, id, &changes).unwrap());
        let doc = find(&conn, id).unwrap().unwrap().document;
        assert_eq!(doc.title, "renamed");
        assert_eq!(doc.file_path, "/uploads/documents/doc.pdf");
        assert!(!doc.is_published);

        changes.file_path = Some("/uploads/documents/2.pdf".into());
        update(&conn, id, &changes).unwrap();
        let doc = find(&conn, id).unwrap().unwrap().document;
        assert_eq!(doc.file_path, "/uploads/documents/2.pdf");
    }

    #[test]
    fn counters_and_stats() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "c", None).unwrap();
        let id = insert(&conn, &sample(cat, "doc", true)).unwrap();
        insert(&conn, &sample(cat, "draft", false)).unwrap();

        increment_downloads(&conn, id).unwrap();
        increment_downloads(&conn, id).unwrap();
        increment_views(&conn, id).unwrap();

        let stats = stats(&conn).unwrap();
        assert_eq!(
            stats,
            DocumentStats {
                total: 2,
                published: 1,
                views: 1,
                downloads: 2
            }
        );
    }

    #[test]
    fn delete_reports_whether_row_existed() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "c", None).unwrap();
        let id = insert(&conn, &sample(cat, "doc", true)).unwrap();
        assert!(delete(&conn, id).unwrap());
        assert!(!delete(&conn, id).unwrap());
    }

    #[test]
    fn latest_limits_results() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "c", None).unwrap();
        for i in 0..4 {
            insert(&conn, &sample(cat, &format!("d{i}"), true)).unwrap();
        }
        assert_eq!(latest(&conn, 3).unwrap().len(), 3);
    }

    #[test]
    fn draft_files_are_recognised_by_path() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let cat = categories::insert(&conn, "c", None).unwrap();
        let mut draft = sample(cat, "draft", false);
        draft.cover_image = Some("uploads/covers/draft.png".into());
        insert(&conn, &draft).unwrap();
        insert(&conn, &sample(cat, "public", true)).unwrap();

        assert!(is_draft_file(&conn, "/uploads/documents/draft.pdf").unwrap());
        assert!(is_draft_file(&conn, "/uploads/covers/draft.png").unwrap());
        assert!(!is_draft_file(&conn, "/uploads/documents/public.pdf").unwrap());
        assert!(!is_draft_file(&conn, "/uploads/documents/missing.pdf").unwrap());
    }
}
