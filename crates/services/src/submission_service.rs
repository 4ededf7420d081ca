use std::sync::Arc;

use serde::Serialize;
use storage::repository::{AssignmentRepository, DayRecordRepository};
use testsync_core::completion::{Artifact, apply_artifact};
use testsync_core::model::{AssignmentId, DayRecord};

use crate::Clock;
use crate::error::SubmissionError;

//
// ─── RESULT ────────────────────────────────────────────────────────────────────
//

/// Outcome of one artifact submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    /// The day record as persisted.
    pub record: DayRecord,
    /// True only when this submission completed the day.
    pub newly_completed: bool,
    /// The assignment's counter after the submission.
    pub completed_days: u32,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Accepts screenshots and feedback for a test day and applies the
/// completion cascade.
#[derive(Clone)]
pub struct SubmissionService {
    clock: Clock,
    assignments: Arc<dyn AssignmentRepository>,
    day_records: Arc<dyn DayRecordRepository>,
}

impl SubmissionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        assignments: Arc<dyn AssignmentRepository>,
        day_records: Arc<dyn DayRecordRepository>,
    ) -> Self {
        Self {
            clock,
            assignments,
            day_records,
        }
    }

    /// Attach a screenshot reference to `day`.
    ///
    /// # Errors
    ///
    /// See [`SubmissionService::submit`].
    pub async fn submit_screenshot(
        &self,
        id: AssignmentId,
        day: u32,
        url: impl Into<String>,
    ) -> Result<SubmissionResult, SubmissionError> {
        self.submit(id, day, Artifact::Screenshot(url.into())).await
    }

    /// Attach written feedback to `day`.
    ///
    /// # Errors
    ///
    /// See [`SubmissionService::submit`].
    pub async fn submit_feedback(
        &self,
        id: AssignmentId,
        day: u32,
        text: impl Into<String>,
    ) -> Result<SubmissionResult, SubmissionError> {
        self.submit(id, day, Artifact::Feedback(text.into())).await
    }

    /// Merge `artifact` into the stored day record, persist it, and raise the
    /// assignment's `completed_days` when the day just became complete past
    /// the current counter.
    ///
    /// The day record is written first. The counter is raised through
    /// [`AssignmentRepository::raise_completed_days`], so concurrent
    /// completions of different days never lower it. Nothing is retried or
    /// rolled back.
    ///
    /// Two concurrent submissions for the same day both merge into the record
    /// they read, and the later write wins. A screenshot and feedback racing
    /// on one day can therefore leave it partial until either is resent.
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError::EmptyArtifact` for a blank artifact.
    /// Returns `SubmissionError::NotFound` for an unknown assignment.
    /// Returns `SubmissionError::DayOutOfRange` for a day outside the window.
    /// Returns `SubmissionError::Storage` if reading or the day record write fails.
    /// Returns `SubmissionError::Cascade` if raising the counter fails after
    /// the day record was saved.
    pub async fn submit(
        &self,
        id: AssignmentId,
        day: u32,
        artifact: Artifact,
    ) -> Result<SubmissionResult, SubmissionError> {
        let blank = match &artifact {
            Artifact::Screenshot(v) | Artifact::Feedback(v) => v.trim().is_empty(),
        };
        if blank {
            return Err(SubmissionError::EmptyArtifact);
        }

        let assignment = self
            .assignments
            .get_assignment(id)
            .await?
            .ok_or(SubmissionError::NotFound(id))?;
        if !assignment.contains_day(day) {
            return Err(SubmissionError::DayOutOfRange {
                day,
                total_days: assignment.total_days(),
            });
        }

        let stored = self.day_records.get_day_record(id, day).await?;
        let outcome = apply_artifact(
            stored.as_ref(),
            id,
            day,
            artifact,
            assignment.completed_days(),
            self.clock.now(),
        );

        self.day_records.upsert_day_record(&outcome.record).await?;
        if outcome.newly_completed {
            tracing::info!(%id, day, "day completed");
        }

        let completed_days = match outcome.completed_days {
            Some(candidate) => {
                let raised = self
                    .assignments
                    .raise_completed_days(id, candidate)
                    .await
                    .map_err(|source| SubmissionError::Cascade { day, source })?;
                tracing::info!(%id, completed_days = raised, "completed days raised");
                raised
            }
            None => assignment.completed_days(),
        };

        Ok(SubmissionResult {
            record: outcome.record,
            newly_completed: outcome.newly_completed,
            completed_days,
        })
    }
}
