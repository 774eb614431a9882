use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::api::SaveUserRequest;
use crate::error::Result;

/// The `users` table behind the save-user and login endpoints
#[derive(Debug)]
pub struct UserDb {
    conn: Mutex<Connection>,
}

impl UserDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                nickname TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a user. Saving an existing username only refreshes its nickname.
    pub fn save(&self, user: &SaveUserRequest) -> Result<()> {
        self.conn().execute(
            r#"
            INSERT INTO users (username, password, nickname) VALUES (?1, ?2, ?3)
            ON CONFLICT(username) DO UPDATE SET nickname = COALESCE(excluded.nickname, users.nickname)
            "#,
            params![user.username, user.password, user.nickname],
        )?;
        Ok(())
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1 AND password = ?2",
            params![username, password],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    #[cfg(test)]
    fn count(&self) -> Result<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }
}
