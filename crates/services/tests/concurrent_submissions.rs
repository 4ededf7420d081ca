use std::sync::Arc;

use services::{Clock, SubmissionService};
use storage::repository::{
    AssignmentRepository, DayRecordRepository, InMemoryRepository, StorageError,
};
use testsync_core::model::{AssignmentId, CampaignId, DayRecord, TestAssignment, TesterId};
use testsync_core::time::fixed_now;
use tokio::sync::Barrier;

/// Day records whose reads hold until every submission has read its day.
struct LockstepReads {
    inner: InMemoryRepository,
    barrier: Barrier,
}

#[async_trait::async_trait]
impl DayRecordRepository for LockstepReads {
    async fn upsert_day_record(&self, record: &DayRecord) -> Result<(), StorageError> {
        self.inner.upsert_day_record(record).await
    }

    async fn get_day_record(
        &self,
        assignment_id: AssignmentId,
        day: u32,
    ) -> Result<Option<DayRecord>, StorageError> {
        let found = self.inner.get_day_record(assignment_id, day).await;
        self.barrier.wait().await;
        found
    }

    async fn list_day_records(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<DayRecord>, StorageError> {
        self.inner.list_day_records(assignment_id).await
    }
}

#[tokio::test]
async fn interleaved_completions_never_lower_the_counter() {
    let repo = InMemoryRepository::new();
    let id = AssignmentId::new(1);
    let assignment =
        TestAssignment::new(id, TesterId::new(1), CampaignId::new(1), fixed_now(), 7).unwrap();
    repo.upsert_assignment(&assignment).await.unwrap();
    for day in [3, 5] {
        repo.upsert_day_record(
            &DayRecord::empty(id, day).with_screenshot(format!("https://cdn.example/{day}.png")),
        )
        .await
        .unwrap();
    }

    let submissions = SubmissionService::new(
        Clock::fixed(fixed_now()),
        Arc::new(repo.clone()),
        Arc::new(LockstepReads {
            inner: repo.clone(),
            barrier: Barrier::new(2),
        }),
    );

    let (day3, day5) = tokio::join!(
        submissions.submit_feedback(id, 3, "day three notes"),
        submissions.submit_feedback(id, 5, "day five notes"),
    );
    let day3 = day3.unwrap();
    let day5 = day5.unwrap();
    assert!(day3.newly_completed);
    assert!(day5.newly_completed);
    assert!(day3.completed_days >= 3);
    assert_eq!(day5.completed_days, 5);

    let stored = repo.get_assignment(id).await.unwrap().unwrap();
    assert_eq!(stored.completed_days(), 5);
    for day in [3, 5] {
        let record = repo.get_day_record(id, day).await.unwrap().unwrap();
        assert!(record.is_completed());
    }
}
