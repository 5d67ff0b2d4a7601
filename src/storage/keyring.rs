//! System keyring storage.

use tracing::instrument;

use super::{KeyValueStore, validate_key};
use crate::error::{Error, Result};

/// Keyring-backed key/value storage.
///
/// Each key is one credential entry under a shared service name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringStore {
    const SERVICE_NAME: &str = "promptdesk";

    pub fn new() -> Self {
        Self::with_service(Self::SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        validate_key(key)?;
        keyring::Entry::new(&self.service, key)
            .map_err(|e| Error::Storage(format!("Failed to create keyring entry: {e}")))
    }
}

impl KeyValueStore for KeyringStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Storage(format!("Keyring error: {e}"))),
        }
    }

    #[instrument(skip(self, value))]
    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| Error::Storage(format!("Keyring error: {e}")))
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Storage(format!("Keyring error: {e}"))),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
