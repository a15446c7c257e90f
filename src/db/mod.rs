pub mod models;

use crate::confluence::Credentials;
use models::Setting;
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

pub const EMAIL_KEY: &str = "confluence_email";
pub const API_TOKEN_KEY: &str = "confluence_api_token";

/// Local settings store. Holds credentials and provider keys only; pages and
/// chunks are never persisted.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(app_dir: &std::path::Path) -> Result<Self> {
        if let Err(e) = std::fs::create_dir_all(app_dir) {
            warn!("cannot create data directory {}: {}", app_dir.display(), e);
            return Err(rusqlite::Error::InvalidPath(app_dir.to_path_buf()));
        }
        let db_path = app_dir.join("wiki-copilot.db");
        let conn = Connection::open(db_path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn list_settings(&self) -> Result<Vec<Setting>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Setting {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    // ── Credentials ──

    pub fn load_credentials(&self) -> Result<Option<Credentials>> {
        let email = self.get_setting(EMAIL_KEY)?;
        let token = self.get_setting(API_TOKEN_KEY)?;
        Ok(match (email, token) {
            (Some(email), Some(token)) if !email.is_empty() && !token.is_empty() => {
                Some(Credentials { email, token })
            }
            _ => None,
        })
    }

    pub fn store_credentials(&self, credentials: &Credentials) -> Result<()> {
        self.set_setting(EMAIL_KEY, &credentials.email)?;
        self.set_setting(API_TOKEN_KEY, &credentials.token)
    }

    pub fn clear_credentials(&self) -> Result<()> {
        self.delete_setting(EMAIL_KEY)?;
        self.delete_setting(API_TOKEN_KEY)
    }
}
