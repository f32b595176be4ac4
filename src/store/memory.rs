// In-memory store
//
// Ephemeral backing for tests and for embedding callers that manage
// persistence themselves. The failure toggle simulates a storage outage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{PrefStore, SecretStore};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail, simulating an unavailable store
    pub fn fail_all(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("credential store unavailable");
        }
        Ok(())
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries().remove(key);
        Ok(())
    }
}

#[async_trait]
impl PrefStore for MemoryStore {
    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        self.check_available()?;
        match self.entries().get(key) {
            Some(raw) => Ok(Some(raw.parse::<i64>()?)),
            None => Ok(None),
        }
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.check_available()?;
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.entries().remove(key);
        Ok(())
    }
}
