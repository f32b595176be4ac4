// Credential and preference storage
//
// The token manager is the sole writer of these keys; backings may live out
// of process, so every operation can fail and failures surface to the caller.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Current bearer token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Long-lived refresh credential, never logged
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Absolute expiry of the access token, epoch seconds. The misspelling is
/// load-bearing: existing installs persist their expiry under this key.
pub const EXPIRY_KEY: &str = "access_token_epires_in";

/// Opaque secret storage
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Numeric preference storage, used for the expiry timestamp
#[async_trait]
pub trait PrefStore: Send + Sync {
    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}
