use std::sync::Arc;

use storage::repository::{AssignmentRepository, NewAssignmentRecord};
use testsync_core::model::{AssignmentId, CampaignId, TestAssignment, TesterId};

use crate::Clock;
use crate::error::AssignmentServiceError;

/// Creates and looks up picked-app assignments.
#[derive(Clone)]
pub struct AssignmentService {
    clock: Clock,
    assignments: Arc<dyn AssignmentRepository>,
}

impl AssignmentService {
    #[must_use]
    pub fn new(clock: Clock, assignments: Arc<dyn AssignmentRepository>) -> Self {
        Self { clock, assignments }
    }

    /// Assign a campaign to a tester, starting the test window now.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::Assignment` for an invalid window.
    /// Returns `AssignmentServiceError::Storage` if persistence fails.
    pub async fn assign(
        &self,
        tester_id: TesterId,
        campaign_id: CampaignId,
        total_days: u32,
    ) -> Result<TestAssignment, AssignmentServiceError> {
        let assigned_at = self.clock.now();
        let record = NewAssignmentRecord::new(tester_id, campaign_id, assigned_at, total_days)?;
        let id = self.assignments.insert_new_assignment(record).await?;
        tracing::info!(%id, %tester_id, %campaign_id, total_days, "assignment created");

        let assignment =
            TestAssignment::new(id, tester_id, campaign_id, assigned_at, total_days)?;
        Ok(assignment)
    }

    /// Fetch an assignment by ID.
    ///
    /// Returns `Ok(None)` when the assignment does not exist.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::Storage` if repository access fails.
    pub async fn get(
        &self,
        id: AssignmentId,
    ) -> Result<Option<TestAssignment>, AssignmentServiceError> {
        Ok(self.assignments.get_assignment(id).await?)
    }

    /// List a tester's assignments ordered by ID, up to the given limit.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::Storage` if repository access fails.
    pub async fn list_for_tester(
        &self,
        tester_id: TesterId,
        limit: u32,
    ) -> Result<Vec<TestAssignment>, AssignmentServiceError> {
        Ok(self.assignments.list_for_tester(tester_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::InMemoryRepository;
    use testsync_core::model::AssignmentError;
    use testsync_core::time::fixed_now;

    fn service() -> AssignmentService {
        AssignmentService::new(
            Clock::fixed(fixed_now()),
            Arc::new(InMemoryRepository::new()),
        )
    }

    #[tokio::test]
    async fn assign_starts_window_at_clock_time() {
        let service = service();
        let assignment = service
            .assign(TesterId::new(1), CampaignId::new(2), 14)
            .await
            .unwrap();

        assert_eq!(assignment.assigned_at(), fixed_now());
        assert_eq!(assignment.completed_days(), 0);
        assert_eq!(assignment.current_day(fixed_now()), 1);

        let stored = service.get(assignment.id()).await.unwrap();
        assert_eq!(stored, Some(assignment));
    }

    #[tokio::test]
    async fn assign_rejects_empty_window() {
        let err = service()
            .assign(TesterId::new(1), CampaignId::new(2), 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AssignmentServiceError::Assignment(AssignmentError::InvalidTotalDays(0))
        ));
    }

    #[tokio::test]
    async fn list_for_tester_is_scoped_and_limited() {
        let service = service();
        for campaign in 1..=3 {
            service
                .assign(TesterId::new(9), CampaignId::new(campaign), 7)
                .await
                .unwrap();
        }
        service
            .assign(TesterId::new(10), CampaignId::new(4), 7)
            .await
            .unwrap();

        let listed = service.list_for_tester(TesterId::new(9), 2).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|a| a.tester_id() == TesterId::new(9)));
    }
}
