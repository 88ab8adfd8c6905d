//! Upload coordinator for PO and acceptance files.
//!
//! [`UploadCoordinator::submit`] validates a candidate locally (extension,
//! then size) and only then hands it to an [`UploadTransport`]. Every
//! outcome, including network failures, ends up in the returned
//! [`UploadAttempt`]; nothing is propagated as an error.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use pomgmt_core::upload::{
    validate_candidate, FileKind, RejectionReason, UploadAttempt, UploadOutcome,
    SUCCESS_MESSAGE_TTL,
};

use crate::http::{ApiClient, ApiError};

/// Sends an already-validated file to its ingestion endpoint.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(
        &self,
        kind: FileKind,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl UploadTransport for ApiClient {
    async fn upload(
        &self,
        kind: FileKind,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        self.post_file(kind.endpoint(), file_name, bytes).await
    }
}

// ---------------------------------------------------------------------------
// UploadCandidate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Contents {
    Bytes(Vec<u8>),
    /// Read only after validation passes.
    Path(PathBuf),
}

/// A file the user picked, not yet validated.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    file_name: String,
    size_bytes: u64,
    contents: Contents,
}

impl UploadCandidate {
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            size_bytes: bytes.len() as u64,
            contents: Contents::Bytes(bytes),
        }
    }

    /// Describe a file on disk. Only its metadata is read here.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            file_name,
            size_bytes: metadata.len(),
            contents: Contents::Path(path.to_path_buf()),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    async fn into_bytes(self) -> std::io::Result<Vec<u8>> {
        match self.contents {
            Contents::Bytes(bytes) => Ok(bytes),
            Contents::Path(path) => tokio::fs::read(path).await,
        }
    }
}

// ---------------------------------------------------------------------------
// UploadCoordinator
// ---------------------------------------------------------------------------

/// The most recent attempt and when it finished.
struct Banner {
    attempt: UploadAttempt,
    shown_at: Instant,
}

pub struct UploadCoordinator {
    transport: Arc<dyn UploadTransport>,
    last: Mutex<Option<Banner>>,
}

impl UploadCoordinator {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            transport,
            last: Mutex::new(None),
        }
    }

    /// Validate and dispatch one file. Always returns a terminal attempt.
    pub async fn submit(&self, candidate: UploadCandidate, kind: FileKind) -> UploadAttempt {
        let attempt = UploadAttempt::pending(kind, candidate.file_name(), candidate.size_bytes());
        self.clear_banner();

        if let Err(reason) = validate_candidate(candidate.file_name(), candidate.size_bytes()) {
            tracing::info!(
                file_name = %candidate.file_name(),
                size_bytes = candidate.size_bytes(),
                reason = %reason,
                "Upload rejected before dispatch",
            );
            return self.finish(attempt.reject(reason.into()));
        }

        let file_name = candidate.file_name().to_string();
        let bytes = match candidate.into_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(file_name = %file_name, error = %e, "Could not read upload file");
                return self.finish(attempt.reject(RejectionReason::Unreadable {
                    detail: format!("Could not read {file_name}: {e}"),
                }));
            }
        };

        tracing::info!(
            file_name = %file_name,
            kind = %kind,
            size_bytes = bytes.len(),
            "Uploading file",
        );

        let finished = match self.transport.upload(kind, file_name.clone(), bytes).await {
            Ok(()) => {
                tracing::info!(file_name = %file_name, kind = %kind, "Upload accepted");
                attempt.accept()
            }
            Err(e) => {
                tracing::warn!(file_name = %file_name, kind = %kind, error = %e, "Upload failed");
                attempt.reject(RejectionReason::Dispatch {
                    kind: e.kind(),
                    detail: e.detail().map(str::to_string),
                })
            }
        };
        self.finish(finished)
    }

    /// Message to display right now, if any.
    ///
    /// Success messages disappear after [`SUCCESS_MESSAGE_TTL`]; rejection
    /// messages stay until the next submission.
    pub fn banner(&self) -> Option<String> {
        self.banner_at(Instant::now())
    }

    fn banner_at(&self, now: Instant) -> Option<String> {
        let last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let banner = last.as_ref()?;
        let expired = banner.attempt.outcome == UploadOutcome::Accepted
            && now.duration_since(banner.shown_at) >= SUCCESS_MESSAGE_TTL;
        if expired {
            None
        } else {
            banner.attempt.message.clone()
        }
    }

    fn clear_banner(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn finish(&self, attempt: UploadAttempt) -> UploadAttempt {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(Banner {
            attempt: attempt.clone(),
            shown_at: Instant::now(),
        });
        attempt
    }
}
