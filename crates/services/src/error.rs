//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use testsync_core::model::{AssignmentError, AssignmentId};

/// Errors emitted by `AssignmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssignmentServiceError {
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error("assignment {0} not found")]
    NotFound(AssignmentId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `InboxService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InboxServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SubmissionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("assignment {0} not found")]
    NotFound(AssignmentId),
    #[error("day {day} is outside the 1..={total_days} test window")]
    DayOutOfRange { day: u32, total_days: u32 },
    #[error("submitted artifact is blank")]
    EmptyArtifact,
    /// The day record write failed; nothing was changed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// The day record was saved but raising the assignment counter failed.
    /// Progress reads recover the counter from the saved day records.
    #[error("day {day} saved but updating completed days failed: {source}")]
    Cascade {
        day: u32,
        #[source]
        source: StorageError,
    },
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
