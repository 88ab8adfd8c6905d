//! Upload candidates: pre-flight validation and attempt lifecycle.
//!
//! Validation runs before any network call and checks, in order, the
//! file extension against [`ALLOWED_EXTENSIONS`] and the size against
//! [`MAX_UPLOAD_BYTES`]. An [`UploadAttempt`] starts `Pending` and ends
//! in exactly one terminal outcome.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::endpoints;
use crate::error::{CoreError, ErrorKind};
use crate::types::Timestamp;

/// Maximum accepted file size: 50 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Accepted extensions, lower-case, without the dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xls"];

/// How long a success banner stays visible.
pub const SUCCESS_MESSAGE_TTL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// FileKind
// ---------------------------------------------------------------------------

/// Which ingestion pipeline a file is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    PurchaseOrder,
    Acceptance,
}

impl FileKind {
    /// Short label used in user-facing messages.
    pub fn label(self) -> &'static str {
        match self {
            FileKind::PurchaseOrder => "PO",
            FileKind::Acceptance => "Acceptance",
        }
    }

    /// Ingestion endpoint for this kind.
    pub fn endpoint(self) -> &'static str {
        match self {
            FileKind::PurchaseOrder => endpoints::UPLOAD_PURCHASE_ORDER,
            FileKind::Acceptance => endpoints::UPLOAD_ACCEPTANCE,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FileKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "po" | "purchase-order" | "purchase_order" => Ok(FileKind::PurchaseOrder),
            "acceptance" => Ok(FileKind::Acceptance),
            other => Err(CoreError::Validation(format!("unknown file kind '{other}'"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Client-side pre-flight rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Please upload a CSV or Excel file (.csv, .xlsx, .xls)")]
    UnsupportedType,

    #[error("File size must be less than 50MB")]
    TooLarge,
}

/// Lower-cased text after the last `.`, or the whole name if there is none.
fn extension_of(file_name: &str) -> String {
    file_name
        .rsplit('.')
        .next()
        .unwrap_or(file_name)
        .to_ascii_lowercase()
}

/// Check a candidate file before dispatch.
pub fn validate_candidate(file_name: &str, size_bytes: u64) -> Result<(), ValidationError> {
    let ext = extension_of(file_name);
    if !file_name.contains('.') || !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ValidationError::UnsupportedType);
    }
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// UploadAttempt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Pending,
    Accepted,
    Rejected,
}

/// Why an attempt ended up rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    UnsupportedType,
    TooLarge,
    /// The local file could not be read. Nothing was sent.
    Unreadable { detail: String },
    /// The server or the network refused the dispatch.
    Dispatch {
        kind: ErrorKind,
        detail: Option<String>,
    },
}

impl From<ValidationError> for RejectionReason {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnsupportedType => RejectionReason::UnsupportedType,
            ValidationError::TooLarge => RejectionReason::TooLarge,
        }
    }
}

/// One user-initiated upload. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadAttempt {
    pub file_kind: FileKind,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub outcome: UploadOutcome,
    pub rejection_reason: Option<RejectionReason>,
    /// Human-readable result, set once the attempt is terminal.
    pub message: Option<String>,
    pub submitted_at: Timestamp,
}

impl UploadAttempt {
    pub fn pending(file_kind: FileKind, file_name: impl Into<String>, file_size_bytes: u64) -> Self {
        Self {
            file_kind,
            file_name: file_name.into(),
            file_size_bytes,
            outcome: UploadOutcome::Pending,
            rejection_reason: None,
            message: None,
            submitted_at: chrono::Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome != UploadOutcome::Pending
    }

    /// Mark the attempt accepted. Terminal attempts are returned unchanged.
    pub fn accept(mut self) -> Self {
        if self.is_terminal() {
            return self;
        }
        self.outcome = UploadOutcome::Accepted;
        self.message = Some(format!(
            "{} file uploaded successfully! Processing has started in the background.",
            self.file_kind.label()
        ));
        self
    }

    /// Mark the attempt rejected. Terminal attempts are returned unchanged.
    ///
    /// For dispatch failures the server detail is shown when present,
    /// otherwise a fallback naming the file kind.
    pub fn reject(mut self, reason: RejectionReason) -> Self {
        if self.is_terminal() {
            return self;
        }
        let message = match &reason {
            RejectionReason::UnsupportedType => ValidationError::UnsupportedType.to_string(),
            RejectionReason::TooLarge => ValidationError::TooLarge.to_string(),
            RejectionReason::Unreadable { detail } => detail.clone(),
            RejectionReason::Dispatch {
                detail: Some(detail),
                ..
            } => detail.clone(),
            RejectionReason::Dispatch { detail: None, .. } => format!(
                "Failed to upload {} file. Please try again.",
                self.file_kind.label()
            ),
        };
        self.outcome = UploadOutcome::Rejected;
        self.rejection_reason = Some(reason);
        self.message = Some(message);
        self
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn unreadable_file_reports_its_detail() {
        let attempt = UploadAttempt::pending(FileKind::PurchaseOrder, "po.csv", 10).reject(
            RejectionReason::Unreadable {
                detail: "Could not read po.csv: permission denied".into(),
            },
        );
        assert_eq!(attempt.outcome, UploadOutcome::Rejected);
        assert_eq!(
            attempt.message.as_deref(),
            Some("Could not read po.csv: permission denied")
        );
    }

    #[test]
    fn pdf_is_unsupported() {
        assert_eq!(
            validate_candidate("data.pdf", 1024),
            Err(ValidationError::UnsupportedType)
        );
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert_eq!(validate_candidate("REPORT.XLSX", 1024), Ok(()));
        assert_eq!(validate_candidate("legacy.Xls", 1024), Ok(()));
    }

    #[test]
    fn name_without_extension_is_unsupported() {
        assert_eq!(validate_candidate("csv", 10), Err(ValidationError::UnsupportedType));
    }

    #[test]
    fn oversized_file_is_too_large() {
        assert_eq!(
            validate_candidate("data.csv", 60 * 1024 * 1024),
            Err(ValidationError::TooLarge)
        );
    }

    #[test]
    fn exactly_the_limit_is_allowed() {
        assert_eq!(validate_candidate("data.csv", MAX_UPLOAD_BYTES), Ok(()));
    }

    #[test]
    fn type_is_checked_before_size() {
        assert_eq!(
            validate_candidate("huge.pdf", MAX_UPLOAD_BYTES + 1),
            Err(ValidationError::UnsupportedType)
        );
    }

    #[test]
    fn file_kind_routes_to_endpoint() {
        assert_eq!(FileKind::PurchaseOrder.endpoint(), "/api/upload");
        assert_eq!(FileKind::Acceptance.endpoint(), "/api/upload-acceptance");
        assert_eq!("PO".parse::<FileKind>().unwrap(), FileKind::PurchaseOrder);
        assert_matches!("invoice".parse::<FileKind>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn accepted_message_names_the_kind() {
        let attempt = UploadAttempt::pending(FileKind::Acceptance, "acc.csv", 10).accept();
        assert_eq!(attempt.outcome, UploadOutcome::Accepted);
        assert_eq!(
            attempt.message.as_deref(),
            Some("Acceptance file uploaded successfully! Processing has started in the background.")
        );
    }

    #[test]
    fn dispatch_rejection_prefers_server_detail() {
        let attempt = UploadAttempt::pending(FileKind::PurchaseOrder, "po.csv", 10).reject(
            RejectionReason::Dispatch {
                kind: ErrorKind::ClientError,
                detail: Some("Missing column: PO Number".into()),
            },
        );
        assert_eq!(attempt.message.as_deref(), Some("Missing column: PO Number"));
    }

    #[test]
    fn dispatch_rejection_falls_back_to_generic_message() {
        let attempt = UploadAttempt::pending(FileKind::PurchaseOrder, "po.csv", 10).reject(
            RejectionReason::Dispatch {
                kind: ErrorKind::ServerError,
                detail: None,
            },
        );
        assert_eq!(
            attempt.message.as_deref(),
            Some("Failed to upload PO file. Please try again.")
        );
    }

    #[test]
    fn terminal_attempts_do_not_change() {
        let accepted = UploadAttempt::pending(FileKind::PurchaseOrder, "po.csv", 10).accept();
        let still = accepted.clone().reject(RejectionReason::TooLarge);
        assert_eq!(still, accepted);
    }
}
