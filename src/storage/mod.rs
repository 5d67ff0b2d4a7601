//! Durable client-side key/value storage.
//!
//! Provides the [`KeyValueStore`] trait and several implementations:
//! - [`FileStore`] - One file per key in a configurable directory
//! - [`MemoryStore`] - In-memory storage for testing
//! - [`KeyringStore`] - System keyring storage (requires `system-keyring` feature)
//!
//! The session container and the workspace container each own a disjoint set
//! of [`keys`]; neither reads the other's.

mod file;
#[cfg(feature = "system-keyring")]
mod keyring;
mod memory;

use std::sync::Arc;

pub use file::FileStore;
#[cfg(feature = "system-keyring")]
pub use self::keyring::KeyringStore;
pub use memory::MemoryStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::{Error, Result};

/// Persisted key layout.
pub mod keys {
    /// JSON session record (access token, refresh token, expiry).
    pub const SESSION: &str = "session";
    /// Bare access token, read by the request interceptor.
    pub const AUTH_TOKEN: &str = "auth_token";
    /// Last chosen workspace kind.
    pub const PREFERRED_SPACE: &str = "preferred_space";
    /// Last chosen organization id.
    pub const PREFERRED_ORGANIZATION_ID: &str = "preferred_organization_id";
}

/// Trait for string key/value storage backends.
///
/// All implementations must be thread-safe (`Send + Sync`). Operations are
/// synchronous; values are small and callers never hold them across awaits.
pub trait KeyValueStore: Send + Sync {
    /// Read the value for a key, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key. Deleting a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;

    /// Check if a key is present.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Name of this storage backend.
    fn name(&self) -> &str;
}

// Blanket implementation for Arc<T>
impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
    fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

// Blanket implementation for Box<T>
impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }
    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
    fn contains(&self, key: &str) -> Result<bool> {
        (**self).contains(key)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the storage backend selected in configuration.
pub fn from_config(config: &StorageConfig) -> Arc<dyn KeyValueStore> {
    match config.backend {
        StorageBackend::File => Arc::new(FileStore::new(&config.dir)),
        #[cfg(feature = "system-keyring")]
        StorageBackend::Keyring => Arc::new(KeyringStore::new()),
        #[cfg(not(feature = "system-keyring"))]
        StorageBackend::Keyring => {
            tracing::warn!(
                "Keyring storage requested but system-keyring feature not enabled, falling back to file storage"
            );
            Arc::new(FileStore::new(&config.dir))
        }
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

/// Keys become file names and keyring entries, so keep them to a safe alphabet.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(Error::Storage(format!("Invalid storage key '{key}'")))
    }
}
