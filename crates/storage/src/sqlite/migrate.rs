use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies schema versions that have not been recorded yet.
///
/// Version 1 creates assignments, day records, and their indexes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS assignments (
                    id INTEGER PRIMARY KEY,
                    tester_id INTEGER NOT NULL,
                    campaign_id INTEGER NOT NULL,
                    assigned_at TEXT NOT NULL,
                    total_days INTEGER NOT NULL CHECK (total_days > 0),
                    completed_days INTEGER NOT NULL CHECK (completed_days >= 0),
                    CHECK (completed_days <= total_days)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        // No foreign key to assignments: a local cache may hold day records
        // whose assignment has not been fetched yet.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS day_records (
                    assignment_id INTEGER NOT NULL,
                    day INTEGER NOT NULL CHECK (day > 0),
                    screenshot_url TEXT,
                    feedback TEXT,
                    is_completed INTEGER NOT NULL CHECK (is_completed IN (0, 1)),
                    completed_at TEXT,
                    PRIMARY KEY (assignment_id, day)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_assignments_tester
                    ON assignments (tester_id, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied sqlite migration");
    }

    Ok(())
}
