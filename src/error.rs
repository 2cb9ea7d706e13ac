//! Error and notice types for the sync bridge.
//!
//! Nothing here is fatal. Port and upload failures are logged where they
//! happen and turned into a [`Notice`] for the host to show; local state is
//! never rolled back.

use canvas::doc::EntityKind;
use serde::Serialize;
use uuid::Uuid;

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

// =============================================================================
// ERRORS
// =============================================================================

/// Failures reported by a persistence port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The record to update or delete does not exist in the store.
    #[error("record not found: {0}")]
    NotFound(Uuid),

    /// The store refused the write (permissions, validation).
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the image upload flow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error("upload not permitted: {0}")]
    Denied(String),

    #[error("upload storage misconfigured: {0}")]
    Misconfigured(String),

    #[error("file is empty")]
    EmptyFile,

    #[error("upload failed: {0}")]
    Failed(String),
}

/// Failures of the bridge itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Every background task has exited and no more events will arrive.
    #[error("sync bridge closed")]
    Closed,
}

/// Stable machine-readable error codes.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;
}

impl ErrorCode for PortError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Rejected(_) => "E_REJECTED",
            Self::Unavailable(_) => "E_UNAVAILABLE",
        }
    }
}

impl ErrorCode for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Denied(_) => "E_UPLOAD_DENIED",
            Self::Misconfigured(_) => "E_UPLOAD_MISCONFIGURED",
            Self::EmptyFile => "E_EMPTY_FILE",
            Self::Failed(_) => "E_UPLOAD_FAILED",
        }
    }
}

impl UploadError {
    /// Permission or configuration problems the user cannot fix by retrying.
    #[must_use]
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Denied(_) | Self::Misconfigured(_))
    }
}

// =============================================================================
// NOTICES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    PersistenceFailed,
    UploadDenied,
    UploadFailed,
}

/// A user-facing message about a background failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub code: &'static str,
    pub message: String,
}

impl Notice {
    /// A write to the store failed. The local edit stays in place.
    #[must_use]
    pub fn persistence(op: &str, kind: EntityKind, err: &PortError) -> Self {
        Self {
            kind: NoticeKind::PersistenceFailed,
            code: err.error_code(),
            message: format!("Could not save {} ({op}): {err}. Your change is visible but may not persist.", kind_label(kind)),
        }
    }

    /// A board subscription could not be opened.
    #[must_use]
    pub fn subscription(kind: EntityKind, err: &PortError) -> Self {
        Self {
            kind: NoticeKind::PersistenceFailed,
            code: err.error_code(),
            message: format!("Could not load {}: {err}.", kind_label(kind)),
        }
    }

    #[must_use]
    pub fn upload(err: &UploadError) -> Self {
        if err.is_permission() {
            Self {
                kind: NoticeKind::UploadDenied,
                code: err.error_code(),
                message: format!("Image upload is not available: {err}. Check storage permissions and configuration."),
            }
        } else {
            Self {
                kind: NoticeKind::UploadFailed,
                code: err.error_code(),
                message: format!("Image upload failed: {err}. Please try again."),
            }
        }
    }
}

fn kind_label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Note => "note",
        EntityKind::Connection => "connection",
        EntityKind::Image => "image",
        EntityKind::Drawing => "drawing",
    }
}
