//! File-based storage with secure permissions.

use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use super::{KeyValueStore, validate_key};
use crate::error::{Error, Result};

/// File permissions for value files (Unix only): owner read/write.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Directory permissions (Unix only): owner read/write/execute.
#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// File-based key/value storage.
///
/// Each key lives in its own file: `{dir}/{key}`. Writes go through a temp
/// file and a rename so a crash never leaves a half-written session record.
///
/// # Security
/// - File permissions are set to 0600 (owner read/write only) on Unix
/// - The directory is created with 0700 permissions
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a new FileStore rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the value files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    fn ensure_dir(&self) -> Result<()> {
        if self.dir.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| Error::storage_io(&self.dir, format!("create dir: {e}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(DIR_MODE);
            std::fs::set_permissions(&self.dir, perms)
                .map_err(|e| Error::storage_io(&self.dir, format!("chmod: {e}")))?;
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    #[instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) if content.is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage_io(&path, format!("read: {e}"))),
        }
    }

    #[instrument(skip(self, value))]
    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key)?;
        self.ensure_dir()?;

        let temp_path = path.with_extension("tmp");

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(FILE_MODE)
                .open(&temp_path)
                .map_err(|e| Error::storage_io(&temp_path, format!("create: {e}")))?;
            file.write_all(value.as_bytes())
                .map_err(|e| Error::storage_io(&temp_path, format!("write: {e}")))?;
            file.sync_all()
                .map_err(|e| Error::storage_io(&temp_path, format!("sync: {e}")))?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&temp_path, value)
                .map_err(|e| Error::storage_io(&temp_path, format!("write: {e}")))?;
        }

        if let Err(e) = std::fs::rename(&temp_path, &path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(Error::storage_io(&path, format!("rename: {e}")));
        }

        debug!(path = %path.display(), "Value saved");
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_io(&path, format!("remove: {e}"))),
        }
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.key_path(key)?.exists())
    }

    fn name(&self) -> &str {
        "file"
    }
}
