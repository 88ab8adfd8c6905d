//! Durable slot for the persisted credential.
//!
//! [`FileStorage`] writes a small versioned JSON document atomically
//! (temp file + rename in the same directory), so a concurrent reader
//! sees either the previous document or the new one, never a partial
//! write. [`MemoryStorage`] keeps the same document in memory for tests
//! and embedders without a filesystem.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use pomgmt_core::session::Credential;
use pomgmt_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// On-disk format version.
const STORAGE_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Persisted session is malformed: {0}")]
    Malformed(String),
}

/// Versioned envelope around the persisted credential.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    version: u32,
    credential: Credential,
    saved_at: Timestamp,
}

fn encode(credential: &Credential) -> Result<String, StorageError> {
    let doc = PersistedSession {
        version: STORAGE_VERSION,
        credential: credential.clone(),
        saved_at: chrono::Utc::now(),
    };
    serde_json::to_string_pretty(&doc).map_err(|e| StorageError::Malformed(e.to_string()))
}

fn decode(raw: &str) -> Result<Credential, StorageError> {
    let doc: PersistedSession =
        serde_json::from_str(raw).map_err(|e| StorageError::Malformed(e.to_string()))?;
    if doc.version != STORAGE_VERSION {
        return Err(StorageError::Malformed(format!(
            "unsupported version {} (expected {STORAGE_VERSION})",
            doc.version
        )));
    }
    Ok(doc.credential)
}

/// A single durable key/value slot holding at most one credential.
pub trait CredentialStorage: Send + Sync {
    /// `Ok(None)` when nothing is stored.
    fn load(&self) -> Result<Option<Credential>, StorageError>;

    /// Replace whatever is stored.
    fn store(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Remove the stored credential. Succeeds when nothing is stored.
    fn remove(&self) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// FileStorage
// ---------------------------------------------------------------------------

/// Credential persisted as a JSON file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(context: String) -> impl FnOnce(std::io::Error) -> StorageError {
        move |source| StorageError::Io { context, source }
    }
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io {
                    context: format!("reading {}", self.path.display()),
                    source: e,
                })
            }
        };
        decode(&raw).map(Some)
    }

    fn store(&self, credential: &Credential) -> Result<(), StorageError> {
        let contents = encode(credential)?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        std::fs::create_dir_all(dir)
            .map_err(Self::io_error(format!("creating {}", dir.display())))?;

        let mut tmp = NamedTempFile::new_in(dir)
            .map_err(Self::io_error(format!("creating temp file in {}", dir.display())))?;
        tmp.write_all(contents.as_bytes())
            .map_err(Self::io_error(format!("writing temp file for {}", self.path.display())))?;
        tmp.flush()
            .map_err(Self::io_error(format!("flushing temp file for {}", self.path.display())))?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io {
            context: format!("persisting temp file to {}", self.path.display()),
            source: e.error,
        })?;

        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io {
                context: format!("removing {}", self.path.display()),
                source: e,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStorage
// ---------------------------------------------------------------------------

/// Credential slot that lives only as long as the value.
#[derive(Default)]
pub struct MemoryStorage {
    raw: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with an arbitrary document, valid or not.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// Whether anything is stored, parseable or not.
    pub fn is_occupied(&self) -> bool {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        let raw = self.raw.lock().unwrap_or_else(PoisonError::into_inner);
        raw.as_deref().map(decode).transpose()
    }

    fn store(&self, credential: &Credential) -> Result<(), StorageError> {
        let contents = encode(credential)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(contents);
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
