use sqlx::Row;
use testsync_core::model::{AssignmentId, TestAssignment, TesterId};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_assignment_row, ser};
use crate::repository::{AssignmentRepository, NewAssignmentRecord, StorageError};

#[async_trait::async_trait]
impl AssignmentRepository for SqliteRepository {
    async fn insert_new_assignment(
        &self,
        record: NewAssignmentRecord,
    ) -> Result<AssignmentId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO assignments (tester_id, campaign_id, assigned_at, total_days, completed_days)
            VALUES (?1, ?2, ?3, ?4, 0)
            ",
        )
        .bind(id_to_i64("tester_id", record.tester_id.value())?)
        .bind(id_to_i64("campaign_id", record.campaign_id.value())?)
        .bind(record.assigned_at)
        .bind(i64::from(record.total_days))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("id sign overflow".into()))?;
        Ok(AssignmentId::new(id))
    }

    async fn upsert_assignment(&self, assignment: &TestAssignment) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO assignments
                (id, tester_id, campaign_id, assigned_at, total_days, completed_days)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                tester_id = excluded.tester_id,
                campaign_id = excluded.campaign_id,
                assigned_at = excluded.assigned_at,
                total_days = excluded.total_days,
                completed_days = excluded.completed_days
            ",
        )
        .bind(id_to_i64("id", assignment.id().value())?)
        .bind(id_to_i64("tester_id", assignment.tester_id().value())?)
        .bind(id_to_i64("campaign_id", assignment.campaign_id().value())?)
        .bind(assignment.assigned_at())
        .bind(i64::from(assignment.total_days()))
        .bind(i64::from(assignment.completed_days()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn raise_completed_days(
        &self,
        id: AssignmentId,
        day: u32,
    ) -> Result<u32, StorageError> {
        let row = sqlx::query(
            r"
            UPDATE assignments
            SET completed_days = MAX(completed_days, MIN(?2, total_days))
            WHERE id = ?1
            RETURNING completed_days
            ",
        )
        .bind(id_to_i64("id", id.value())?)
        .bind(i64::from(day))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let completed: i64 = row.try_get("completed_days").map_err(ser)?;
        u32::try_from(completed).map_err(|_| {
            StorageError::Serialization(format!("invalid completed_days: {completed}"))
        })
    }

    async fn get_assignment(
        &self,
        id: AssignmentId,
    ) -> Result<Option<TestAssignment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, tester_id, campaign_id, assigned_at, total_days, completed_days
            FROM assignments WHERE id = ?1
            ",
        )
        .bind(id_to_i64("id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_assignment_row).transpose()
    }

    async fn list_for_tester(
        &self,
        tester_id: TesterId,
        limit: u32,
    ) -> Result<Vec<TestAssignment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, tester_id, campaign_id, assigned_at, total_days, completed_days
            FROM assignments
            WHERE tester_id = ?1
            ORDER BY id ASC
            LIMIT ?2
            ",
        )
        .bind(id_to_i64("tester_id", tester_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut found = Vec::with_capacity(rows.len());
        for row in rows {
            found.push(map_assignment_row(&row)?);
        }
        Ok(found)
    }
}
