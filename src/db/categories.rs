use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{parse_db_time, Category, CategoryWithCount};

fn map_category(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_db_time(&row.get::<_, String>(3)?),
        updated_at: parse_db_time(&row.get::<_, String>(4)?),
    })
}

pub fn list(conn: &Connection) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, created_at, updated_at
         FROM categories ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([], map_category)?;
    rows.collect()
}

pub fn list_with_counts(conn: &Connection) -> rusqlite::Result<Vec<CategoryWithCount>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.description, c.created_at, c.updated_at,
                (SELECT COUNT(*) FROM documents d WHERE d.category_id = c.id)
         FROM categories c ORDER BY c.id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(CategoryWithCount {
            category: map_category(row)?,
            document_count: row.get(5)?,
        })
    })?;
    rows.collect()
}

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Category>> {
    conn.query_row(
        "SELECT id, name, description, created_at, updated_at FROM categories WHERE id = ?1",
        params![id],
        map_category,
    )
    .optional()
}

pub fn exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM categories WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

pub fn insert(conn: &Connection, name: &str, description: Option<&str>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO categories (name, description) VALUES (?1, ?2)",
        params![name, description],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(
    conn: &Connection,
    id: i64,
    name: &str,
    description: Option<&str>,
) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE categories SET name = ?2, description = ?3, updated_at = datetime('now')
         WHERE id = ?1",
        params![id, name, description],
    )?;
    Ok(rows > 0)
}

pub fn document_count(conn: &Connection, id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE category_id = ?1",
        params![id],
        |row| row.get(0),
    )
}

/// Outcome of a delete attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Documents still reference the category.
    InUse(i64),
}

pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<DeleteOutcome> {
    let in_use = document_count(conn, id)?;
    if in_use > 0 {
        return Ok(DeleteOutcome::InUse(in_use));
    }
    let rows = conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    Ok(if rows > 0 {
        DeleteOutcome::Deleted
    } else {
        DeleteOutcome::NotFound
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[test]
    fn insert_list_update() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let id = insert(&conn, "ผังเมือง", Some("แผนผังเมือง")).unwrap();
        insert(&conn, "สิ่งแวดล้อม", None).unwrap();

        let all = list(&conn).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "ผังเมือง");

        assert!(update(&conn, id, "ผังเมืองรวม", None).unwrap());
        let updated = find(&conn, id).unwrap().unwrap();
        assert_eq!(updated.name, "ผังเมืองรวม");
        assert!(updated.description.is_none());

        assert!(!update(&conn, 999, "x", None).unwrap());
        assert!(exists(&conn, id).unwrap());
        assert!(!exists(&conn, 999).unwrap());
    }

    #[test]
    fn delete_is_refused_while_documents_reference_category() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = insert(&conn, "รายงาน", None).unwrap();
        conn.execute(
            "INSERT INTO documents (title, description, category_id, file_path, province, amphoe, district)
             VALUES ('t', 'd', ?1, '/uploads/documents/1.pdf', 'p', 'a', 'd')",
            params![id],
        )
        .unwrap();

        assert_eq!(delete(&conn, id).unwrap(), DeleteOutcome::InUse(1));
        assert!(exists(&conn, id).unwrap());

        let counts = list_with_counts(&conn).unwrap();
        assert_eq!(counts[0].document_count, 1);
    }

    #[test]
    fn delete_unused_and_missing() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = insert(&conn, "ว่าง", None).unwrap();
        assert_eq!(delete(&conn, id).unwrap(), DeleteOutcome::Deleted);
        assert_eq!(delete(&conn, id).unwrap(), DeleteOutcome::NotFound);
    }
}
