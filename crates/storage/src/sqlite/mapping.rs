use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use testsync_core::model::{AssignmentId, CampaignId, DayRecord, TestAssignment, TesterId};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u64_from_i64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn map_assignment_row(row: &SqliteRow) -> Result<TestAssignment, StorageError> {
    let id = u64_from_i64("id", row.try_get::<i64, _>("id").map_err(ser)?)?;
    let tester_id = u64_from_i64("tester_id", row.try_get::<i64, _>("tester_id").map_err(ser)?)?;
    let campaign_id = u64_from_i64(
        "campaign_id",
        row.try_get::<i64, _>("campaign_id").map_err(ser)?,
    )?;
    let total_days = u32_from_i64("total_days", row.try_get::<i64, _>("total_days").map_err(ser)?)?;
    let completed_days = u32_from_i64(
        "completed_days",
        row.try_get::<i64, _>("completed_days").map_err(ser)?,
    )?;

    TestAssignment::from_persisted(
        AssignmentId::new(id),
        TesterId::new(tester_id),
        CampaignId::new(campaign_id),
        row.try_get("assigned_at").map_err(ser)?,
        total_days,
        completed_days,
    )
    .map_err(ser)
}

/// The stored `is_completed` column exists for ad hoc queries only; the
/// domain recomputes completion from the artifact columns.
pub(crate) fn map_day_record_row(row: &SqliteRow) -> Result<DayRecord, StorageError> {
    let assignment_id = u64_from_i64(
        "assignment_id",
        row.try_get::<i64, _>("assignment_id").map_err(ser)?,
    )?;
    let day = u32_from_i64("day", row.try_get::<i64, _>("day").map_err(ser)?)?;

    Ok(DayRecord::from_persisted(
        AssignmentId::new(assignment_id),
        day,
        row.try_get("screenshot_url").map_err(ser)?,
        row.try_get("feedback").map_err(ser)?,
        row.try_get("completed_at").map_err(ser)?,
    ))
}
