use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{parse_db_time, Role, User};

const USER_COLUMNS: &str =
    "id, first_name, last_name, email, password_hash, image, role, created_at, updated_at";

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        image: row.get(5)?,
        role: Role::parse(&row.get::<_, String>(6)?),
        created_at: parse_db_time(&row.get::<_, String>(7)?),
        updated_at: parse_db_time(&row.get::<_, String>(8)?),
    })
}

pub fn insert(conn: &Connection, user: &NewUser<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (first_name, last_name, email, password_hash, role)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user.first_name,
            user.last_name,
            user.email,
            user.password_hash,
            user.role.as_str()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        map_user,
    )
    .optional()
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
        params![email],
        map_user,
    )
    .optional()
}

/// Update name fields, and the avatar when `image` is given.
pub fn update_profile(
    conn: &Connection,
    id: i64,
    first_name: &str,
    last_name: &str,
    image: Option<&str>,
) -> rusqlite::Result<bool> {
    let rows = conn.execute(
        "UPDATE users SET first_name = ?2, last_name = ?3,
                image = COALESCE(?4, image), updated_at = datetime('now')
         WHERE id = ?1",
        params![id, first_name, last_name, image],
    )?;
    Ok(rows > 0)
}

/// Make sure an admin account exists for `email`. An existing account is
/// promoted and its password replaced; otherwise one is created.
pub fn ensure_admin(conn: &Connection, email: &str, password_hash: &str) -> rusqlite::Result<i64> {
    if let Some(user) = find_by_email(conn, email)? {
        conn.execute(
            "UPDATE users SET role = 'ADMIN', password_hash = ?2, updated_at = datetime('now')
             WHERE id = ?1",
            params![user.id, password_hash],
        )?;
        return Ok(user.id);
    }

    insert(
        conn,
        &NewUser {
            first_name: "Admin",
            last_name: "",
            email,
            password_hash,
            role: Role::Admin,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn member<'a>(email: &'a str) -> NewUser<'a> {
        NewUser {
            first_name: "Malee",
            last_name: "Suksai",
            email,
            password_hash: "hash",
            role: Role::Member,
        }
    }

    #[test]
    fn insert_and_find() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = insert(&conn, &member("malee@example.com")).unwrap();

        let by_id = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(by_id.email, "malee@example.com");
        assert_eq!(by_id.role, Role::Member);

        let by_email = find_by_email(&conn, "MALEE@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        insert(&conn, &member("dup@example.com")).unwrap();
        assert!(insert(&conn, &member("dup@example.com")).is_err());
    }

    #[test]
    fn update_profile_keeps_image_when_none() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = insert(&conn, &member("p@example.com")).unwrap();

        update_profile(&conn, id, "A", "B", Some("/uploads/avatars/1.jpg")).unwrap();
        update_profile(&conn, id, "C", "D", None).unwrap();

        let user = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.first_name, "C");
        assert_eq!(user.image.as_deref(), Some("/uploads/avatars/1.jpg"));
    }

    #[test]
    fn update_profile_of_missing_user_reports_false() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert!(!update_profile(&conn, 42, "A", "B", None).unwrap());
    }

    #[test]
    fn ensure_admin_creates_then_promotes() {
        let pool = test_pool();
        let conn = pool.get().unwrap();

        let created = ensure_admin(&conn, "root@example.com", "h1").unwrap();
        assert_eq!(find_by_id(&conn, created).unwrap().unwrap().role, Role::Admin);

        let member_id = insert(&conn, &member("m@example.com")).unwrap();
        let promoted = ensure_admin(&conn, "m@example.com", "h2").unwrap();
        assert_eq!(promoted, member_id);
        let user = find_by_id(&conn, member_id).unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.password_hash.as_deref(), Some("h2"));
    }
}
