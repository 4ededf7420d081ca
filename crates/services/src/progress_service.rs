use std::sync::Arc;

use storage::repository::{AssignmentRepository, DayRecordRepository};
use testsync_core::model::{AssignmentId, DayRecord, TestAssignment};
use testsync_core::progress::AssignmentProgress;

use crate::Clock;
use crate::error::ProgressServiceError;

/// Read-side view of an assignment: current day, per-day states, percent.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    assignments: Arc<dyn AssignmentRepository>,
    day_records: Arc<dyn DayRecordRepository>,
}

impl ProgressService {
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

    /// Snapshot of the assignment's progress as of now.
    ///
    /// A stored counter that lags behind the saved day records (a cascade
    /// write that failed earlier) is corrected in the snapshot, not in storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` for an unknown assignment.
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn progress(
        &self,
        id: AssignmentId,
    ) -> Result<AssignmentProgress, ProgressServiceError> {
        let assignment = self.load(id).await?;
        let records = self.day_records.list_day_records(id).await?;
        let progress = AssignmentProgress::derive(&assignment, &records, self.clock.now());
        if progress.completed_days > assignment.completed_days() {
            tracing::debug!(
                %id,
                stored = assignment.completed_days(),
                derived = progress.completed_days,
                "completed days behind day records"
            );
        }
        Ok(progress)
    }

    /// Every day of the window in order, with empty records for days that
    /// were never written.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` for an unknown assignment.
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn day_records(
        &self,
        id: AssignmentId,
    ) -> Result<Vec<DayRecord>, ProgressServiceError> {
        let assignment = self.load(id).await?;
        let mut stored = self.day_records.list_day_records(id).await?;
        stored.retain(|r| assignment.contains_day(r.day()));

        let mut stored = stored.into_iter().peekable();
        let mut days = Vec::with_capacity(assignment.total_days() as usize);
        for day in 1..=assignment.total_days() {
            match stored.next_if(|r| r.day() == day) {
                Some(record) => days.push(record),
                None => days.push(DayRecord::empty(id, day)),
            }
        }
        Ok(days)
    }

    /// The 1-based day the tester is on right now.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::NotFound` for an unknown assignment.
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn current_day(&self, id: AssignmentId) -> Result<u32, ProgressServiceError> {
        let assignment = self.load(id).await?;
        Ok(assignment.current_day(self.clock.now()))
    }

    async fn load(&self, id: AssignmentId) -> Result<TestAssignment, ProgressServiceError> {
        self.assignments
            .get_assignment(id)
            .await?
            .ok_or(ProgressServiceError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use storage::repository::InMemoryRepository;
    use testsync_core::model::{CampaignId, DayState, TesterId};
    use testsync_core::time::fixed_now;

    async fn seeded(completed_days: u32) -> (InMemoryRepository, AssignmentId) {
        let repo = InMemoryRepository::new();
        let id = AssignmentId::new(1);
        let assignment = TestAssignment::from_persisted(
            id,
            TesterId::new(1),
            CampaignId::new(1),
            fixed_now(),
            5,
            completed_days,
        )
        .unwrap();
        repo.upsert_assignment(&assignment).await.unwrap();
        (repo, id)
    }

    fn service(repo: &InMemoryRepository, clock: Clock) -> ProgressService {
        ProgressService::new(clock, Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    fn complete(id: AssignmentId, day: u32) -> DayRecord {
        DayRecord::empty(id, day)
            .with_screenshot("https://cdn.example/s.png")
            .with_feedback("fine")
    }

    #[tokio::test]
    async fn progress_reports_current_day_and_percent() {
        let (repo, id) = seeded(2).await;
        repo.upsert_day_record(&complete(id, 1)).await.unwrap();
        repo.upsert_day_record(&complete(id, 2)).await.unwrap();

        let clock = Clock::fixed(fixed_now() + Duration::days(2) + Duration::hours(1));
        let progress = service(&repo, clock).progress(id).await.unwrap();

        assert_eq!(progress.current_day, 3);
        assert_eq!(progress.completed_days, 2);
        assert_eq!(progress.percent, 40);
        assert!(!progress.today_complete);
        assert_eq!(progress.days.len(), 5);
    }

    #[tokio::test]
    async fn progress_heals_a_lagging_counter() {
        let (repo, id) = seeded(0).await;
        repo.upsert_day_record(&complete(id, 3)).await.unwrap();

        let progress = service(&repo, Clock::fixed(fixed_now()))
            .progress(id)
            .await
            .unwrap();
        assert_eq!(progress.completed_days, 3);
        assert_eq!(progress.percent, 60);

        let stored = repo.get_assignment(id).await.unwrap().unwrap();
        assert_eq!(stored.completed_days(), 0);
    }

    #[tokio::test]
    async fn day_records_fill_missing_days_with_placeholders() {
        let (repo, id) = seeded(0).await;
        repo.upsert_day_record(&complete(id, 2)).await.unwrap();
        repo.upsert_day_record(&DayRecord::empty(id, 4).with_feedback("half"))
            .await
            .unwrap();

        let days = service(&repo, Clock::fixed(fixed_now()))
            .day_records(id)
            .await
            .unwrap();
        let states: Vec<DayState> = days.iter().map(DayRecord::state).collect();
        assert_eq!(
            states,
            vec![
                DayState::Empty,
                DayState::Complete,
                DayState::Empty,
                DayState::Partial,
                DayState::Empty,
            ]
        );
        assert!(days.iter().enumerate().all(|(i, d)| d.day() as usize == i + 1));
    }

    #[tokio::test]
    async fn current_day_clamps_after_window_ends() {
        let (repo, id) = seeded(0).await;
        let clock = Clock::fixed(fixed_now() + Duration::days(40));
        assert_eq!(service(&repo, clock).current_day(id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn unknown_assignment_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = service(&repo, Clock::fixed(fixed_now()))
            .progress(AssignmentId::new(77))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::NotFound(id) if id == AssignmentId::new(77)));
    }
}
