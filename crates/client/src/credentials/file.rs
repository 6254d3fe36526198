use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sessionlink_domain::constants::APP_DIR_NAME;
use sessionlink_domain::Credential;
use tempfile::NamedTempFile;
use tracing::debug;

use super::persistent::{CredentialBackend, CredentialStoreError};

/// Credential persisted as a single JSON file
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the record, so a crash mid-write leaves either the old or the new
/// record on disk. The temporary file is created owner-readable only.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data dir>/sessionlink/<key>.json`
    ///
    /// # Errors
    /// Returns [`CredentialStoreError::Unavailable`] when the platform has no
    /// data directory.
    pub fn in_data_dir(key: &str) -> Result<Self, CredentialStoreError> {
        let base = dirs::data_dir().ok_or_else(|| {
            CredentialStoreError::Unavailable("platform data directory not found".to_string())
        })?;
        Ok(Self::new(base.join(APP_DIR_NAME).join(format!("{key}.json"))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialBackend for FileBackend {
    fn load(&self) -> Result<Option<Credential>, CredentialStoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| CredentialStoreError::Malformed(err.to_string()))
    }

    fn save(&self, credential: &Credential) -> Result<(), CredentialStoreError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let json = serde_json::to_vec(credential)
            .map_err(|err| CredentialStoreError::Malformed(err.to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| CredentialStoreError::Io(err.error))?;

        debug!(path = %self.path.display(), "credential persisted");
        Ok(())
    }

    fn remove(&self) -> Result<(), CredentialStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
