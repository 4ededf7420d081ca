use chrono::Duration;
use storage::repository::{
    AssignmentRepository, DayRecordRepository, NewAssignmentRecord, StorageError,
};
use storage::sqlite::SqliteRepository;
use testsync_core::model::{AssignmentId, CampaignId, DayRecord, TestAssignment, TesterId};
use testsync_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrip_persists_assignment_counter() {
    let repo = connect("memdb_assignment_roundtrip").await;

    let record =
        NewAssignmentRecord::new(TesterId::new(7), CampaignId::new(3), fixed_now(), 14).unwrap();
    let id = repo.insert_new_assignment(record).await.unwrap();

    let mut assignment = repo.get_assignment(id).await.unwrap().expect("stored");
    assert_eq!(assignment.tester_id(), TesterId::new(7));
    assert_eq!(assignment.total_days(), 14);
    assert_eq!(assignment.completed_days(), 0);
    assert_eq!(assignment.assigned_at(), fixed_now());

    assert!(assignment.record_completed_day(4));
    repo.upsert_assignment(&assignment).await.unwrap();

    let fetched = repo.get_assignment(id).await.unwrap().expect("stored");
    assert_eq!(fetched.completed_days(), 4);
    assert_eq!(fetched.progress_percent(), 28);

    assert!(
        repo.get_assignment(AssignmentId::new(9_999))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sqlite_counter_raise_is_monotonic_and_clamped() {
    let repo = connect("memdb_assignment_raise").await;

    let record =
        NewAssignmentRecord::new(TesterId::new(1), CampaignId::new(1), fixed_now(), 7).unwrap();
    let id = repo.insert_new_assignment(record).await.unwrap();

    assert_eq!(repo.raise_completed_days(id, 5).await.unwrap(), 5);
    assert_eq!(repo.raise_completed_days(id, 3).await.unwrap(), 5);
    assert_eq!(repo.raise_completed_days(id, 30).await.unwrap(), 7);

    let stored = repo.get_assignment(id).await.unwrap().expect("stored");
    assert_eq!(stored.completed_days(), 7);

    let missing = repo.raise_completed_days(AssignmentId::new(9_999), 1).await;
    assert!(matches!(missing, Err(StorageError::NotFound)));
}

#[tokio::test]
async fn sqlite_lists_assignments_per_tester_in_id_order() {
    let repo = connect("memdb_assignment_listing").await;

    for (tester, campaign) in [(1, 10), (2, 11), (1, 12), (1, 13)] {
        let record = NewAssignmentRecord::new(
            TesterId::new(tester),
            CampaignId::new(campaign),
            fixed_now(),
            7,
        )
        .unwrap();
        repo.insert_new_assignment(record).await.unwrap();
    }

    let listed = repo.list_for_tester(TesterId::new(1), 10).await.unwrap();
    let campaigns: Vec<u64> = listed.iter().map(|a| a.campaign_id().value()).collect();
    assert_eq!(campaigns, vec![10, 12, 13]);

    let limited = repo.list_for_tester(TesterId::new(1), 2).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn sqlite_day_records_recompute_completion_on_read() {
    let repo = connect("memdb_day_records").await;
    let assignment = AssignmentId::new(5);
    let done_at = fixed_now() + Duration::hours(3);

    let complete = DayRecord::from_persisted(
        assignment,
        2,
        Some("https://cdn.example/shot.png".into()),
        Some("Works".into()),
        Some(done_at),
    );
    let partial = DayRecord::empty(assignment, 1).with_screenshot("https://cdn.example/a.png");
    repo.upsert_day_record(&complete).await.unwrap();
    repo.upsert_day_record(&partial).await.unwrap();

    let days = repo.list_day_records(assignment).await.unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0].day(), 1);
    assert!(!days[0].is_completed());
    assert_eq!(days[0].completed_at(), None);
    assert_eq!(days[1].day(), 2);
    assert!(days[1].is_completed());
    assert_eq!(days[1].completed_at(), Some(done_at));

    let updated = days[0].clone().with_feedback("Crashes on login");
    repo.upsert_day_record(&updated).await.unwrap();
    let day_one = repo
        .get_day_record(assignment, 1)
        .await
        .unwrap()
        .expect("stored");
    assert_eq!(day_one.feedback(), Some("Crashes on login"));
    assert_eq!(
        day_one.screenshot_url(),
        Some("https://cdn.example/a.png")
    );

    assert!(repo.get_day_record(assignment, 3).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_migrate_is_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");

    let assignment = TestAssignment::from_persisted(
        AssignmentId::new(42),
        TesterId::new(1),
        CampaignId::new(1),
        fixed_now(),
        10,
        3,
    )
    .unwrap();
    repo.upsert_assignment(&assignment).await.unwrap();
    let fetched = repo
        .get_assignment(AssignmentId::new(42))
        .await
        .unwrap()
        .expect("stored");
    assert_eq!(fetched, assignment);
}
