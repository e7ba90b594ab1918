use crate::models::UserRow;
use crate::{Database, NOW};
use anyhow::Result;
use rusqlite::{Connection, params};

const USER_COLUMNS: &str = "id, name, email, password, avatar, bio, created_at";

impl Database {
    // -- Users --

    /// Insert a user. Returns `None` when the email is already registered;
    /// the UNIQUE constraint decides, so two racing sign-ups cannot both win.
    pub fn create_user(&self, name: &str, email: &str, password_hash: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (name, email, password) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO NOTHING",
                (name, email, password_hash),
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            Ok(Some(conn.last_insert_rowid()))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", &email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id))
    }

    /// Overwrite name, avatar and bio. Returns false if the user is gone.
    pub fn update_profile(
        &self,
        id: i64,
        name: &str,
        avatar: Option<&str>,
        bio: Option<&str>,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE users SET name = ?2, avatar = ?3, bio = ?4, updated_at = {NOW} WHERE id = ?1"
            );
            let updated = conn.execute(&sql, params![id, name, avatar, bio])?;
            Ok(updated > 0)
        })
    }

    pub fn update_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let sql = format!("UPDATE users SET password = ?2, updated_at = {NOW} WHERE id = ?1");
            let updated = conn.execute(&sql, params![id, password_hash])?;
            Ok(updated > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &dyn rusqlite::ToSql) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                avatar: row.get(4)?,
                bio: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
