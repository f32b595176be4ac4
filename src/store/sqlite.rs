// SQLite-backed credential store
//
// Single-file database with one key/value table; stands in for the platform
// keystore on desktop installs.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::{PrefStore, SecretStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and initialize on first use) the credential database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open credential database: {}", path.display()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .context("Failed to initialize auth_kv table")?;

        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("credential store lock poisoned"))
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row("SELECT value FROM auth_kv WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("Failed to read `{key}` from credential store"))
    }

    fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )
        .with_context(|| format!("Failed to write `{key}` to credential store"))?;
        Ok(())
    }

    fn remove_value(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM auth_kv WHERE key = ?1", [key])
            .with_context(|| format!("Failed to remove `{key}` from credential store"))?;
        Ok(())
    }
}

#[async_trait]
impl SecretStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_value(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_value(key)
    }
}

#[async_trait]
impl PrefStore for SqliteStore {
    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        match self.get_value(key)? {
            Some(raw) => {
                let parsed = raw
                    .parse::<i64>()
                    .with_context(|| format!("Preference `{key}` is not an integer: {raw}"))?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.set_value(key, &value.to_string())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.remove_value(key)
    }
}
