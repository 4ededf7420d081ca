use serde_json::json;
use storage::document::DocumentStore;
use storage::repository::{NewAssignmentRecord, Storage};
use testsync_core::model::{AssignmentId, CampaignId, DayRecord, TesterId};
use testsync_core::time::fixed_now;

async fn sqlite_cache(name: &str) -> Storage {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    Storage::sqlite(&url).await.expect("sqlite cache")
}

#[tokio::test]
async fn offline_reads_are_served_from_the_sqlite_cache() {
    let remote = DocumentStore::new();
    let storage = Storage::cached(
        Storage::document(remote.clone()),
        sqlite_cache("memdb_cache_offline").await,
    );

    let record =
        NewAssignmentRecord::new(TesterId::new(1), CampaignId::new(2), fixed_now(), 5).unwrap();
    let id = storage.assignments.insert_new_assignment(record).await.unwrap();
    let day = DayRecord::empty(id, 1)
        .with_screenshot("https://cdn.example/1.png")
        .with_feedback("ok");
    storage.day_records.upsert_day_record(&day).await.unwrap();

    remote.set_offline(true);

    let cached = storage
        .assignments
        .get_assignment(id)
        .await
        .unwrap()
        .expect("cached assignment");
    assert_eq!(cached.total_days(), 5);

    let days = storage.day_records.list_day_records(id).await.unwrap();
    assert_eq!(days.len(), 1);
    assert!(days[0].is_completed());

    let listed = storage
        .assignments
        .list_for_tester(TesterId::new(1), 10)
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn offline_writes_fail_and_leave_the_cache_unchanged() {
    let remote = DocumentStore::new();
    let storage = Storage::cached(
        Storage::document(remote.clone()),
        sqlite_cache("memdb_cache_write_fail").await,
    );

    remote.set_offline(true);
    let day = DayRecord::empty(AssignmentId::new(9), 2).with_feedback("late");
    assert!(storage.day_records.upsert_day_record(&day).await.is_err());

    remote.set_offline(false);
    assert!(
        storage
            .day_records
            .get_day_record(AssignmentId::new(9), 2)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn legacy_remote_documents_are_normalized_into_the_cache() {
    let remote = DocumentStore::new();
    remote
        .put_raw(
            "assignments/3",
            json!({ "id": 3, "testerId": 4, "campaignId": 8, "pickedAt": 1_700_000_000_000_i64 }),
        )
        .unwrap();
    let storage = Storage::cached(
        Storage::document(remote.clone()),
        sqlite_cache("memdb_cache_legacy").await,
    );

    let fresh = storage
        .assignments
        .get_assignment(AssignmentId::new(3))
        .await
        .unwrap()
        .expect("remote document");
    assert_eq!(fresh.total_days(), storage::document::DEFAULT_TOTAL_DAYS);
    assert_eq!(fresh.completed_days(), 0);
    assert_eq!(fresh.assigned_at(), fixed_now());

    remote.set_offline(true);
    let cached = storage
        .assignments
        .get_assignment(AssignmentId::new(3))
        .await
        .unwrap()
        .expect("cached copy");
    assert_eq!(cached, fresh);
}
