use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::assignment_service::AssignmentService;
use crate::error::AppServicesError;
use crate::inbox_service::InboxService;
use crate::progress_service::ProgressService;
use crate::submission_service::SubmissionService;

/// Assembles app-facing services over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    assignments: Arc<AssignmentService>,
    progress: Arc<ProgressService>,
    submissions: Arc<SubmissionService>,
    inbox: Arc<InboxService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock) -> Self {
        let assignments = Arc::new(AssignmentService::new(
            clock,
            Arc::clone(&storage.assignments),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.day_records),
        ));
        let submissions = Arc::new(SubmissionService::new(
            clock,
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.day_records),
        ));
        let inbox = Arc::new(InboxService::new(
            clock,
            Arc::clone(&storage.assignments),
            Arc::clone(&storage.day_records),
        ));
        Self {
            assignments,
            progress,
            submissions,
            inbox,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock))
    }

    /// Build services that treat `remote_url` as the source of truth and
    /// `cache_url` as the local read-through cache.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if either database cannot be initialized.
    pub async fn new_cached_sqlite(
        remote_url: &str,
        cache_url: &str,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let remote = Storage::sqlite(remote_url).await?;
        let local = Storage::sqlite(cache_url).await?;
        Ok(Self::new(&Storage::cached(remote, local), clock))
    }

    #[must_use]
    pub fn assignments(&self) -> Arc<AssignmentService> {
        Arc::clone(&self.assignments)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn submissions(&self) -> Arc<SubmissionService> {
        Arc::clone(&self.submissions)
    }

    #[must_use]
    pub fn inbox(&self) -> Arc<InboxService> {
        Arc::clone(&self.inbox)
    }
}
