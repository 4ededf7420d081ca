use testsync_core::model::{AssignmentId, DayRecord};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_day_record_row};
use crate::repository::{DayRecordRepository, StorageError};

#[async_trait::async_trait]
impl DayRecordRepository for SqliteRepository {
    async fn upsert_day_record(&self, record: &DayRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO day_records (
                assignment_id, day, screenshot_url, feedback, is_completed, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(assignment_id, day) DO UPDATE SET
                screenshot_url = excluded.screenshot_url,
                feedback = excluded.feedback,
                is_completed = excluded.is_completed,
                completed_at = excluded.completed_at
            ",
        )
        .bind(id_to_i64("assignment_id", record.assignment_id().value())?)
        .bind(i64::from(record.day()))
        .bind(record.screenshot_url())
        .bind(record.feedback())
        .bind(i64::from(record.is_completed()))
        .bind(record.completed_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_day_record(
        &self,
        assignment_id: AssignmentId,
        day: u32,
    ) -> Result<Option<DayRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT assignment_id, day, screenshot_url, feedback, completed_at
            FROM day_records
            WHERE assignment_id = ?1 AND day = ?2
            ",
        )
        .bind(id_to_i64("assignment_id", assignment_id.value())?)
        .bind(i64::from(day))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_day_record_row).transpose()
    }

    async fn list_day_records(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<DayRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT assignment_id, day, screenshot_url, feedback, completed_at
            FROM day_records
            WHERE assignment_id = ?1
            ORDER BY day ASC
            ",
        )
        .bind(id_to_i64("assignment_id", assignment_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut found = Vec::with_capacity(rows.len());
        for row in rows {
            found.push(map_day_record_row(&row)?);
        }
        Ok(found)
    }
}
