//! # Intake Record DAO
//!
//! SQL for the `medication_intake_record` table. Lists are ordered most
//! recent first; records with the same millisecond fall back to insertion
//! order (higher id first).

use sqlx::SqlitePool;
use tracing::debug;

use pillbox_core::IntakeRecord;

use crate::error::DbResult;

const SELECT_INTAKE: &str =
    "SELECT id, medication_name, intake_time, dosage_taken FROM medication_intake_record";

const NEWEST_FIRST: &str = "ORDER BY intake_time DESC, id DESC";

/// Data access for intake records.
#[derive(Debug, Clone)]
pub struct IntakeRecordDao {
    pool: SqlitePool,
}

impl IntakeRecordDao {
    /// Creates a new IntakeRecordDao.
    pub fn new(pool: SqlitePool) -> Self {
        IntakeRecordDao { pool }
    }

    /// Inserts a record and returns its id.
    pub async fn insert(&self, record: &IntakeRecord) -> DbResult<i64> {
        debug!(medication = %record.medication_name, "Inserting intake record");

        let result = sqlx::query(
            r#"
            INSERT INTO medication_intake_record (medication_name, intake_time, dosage_taken)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&record.medication_name)
        .bind(record.intake_time)
        .bind(record.dosage_taken)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Overwrites a record. Returns rows affected.
    pub async fn update(&self, record: &IntakeRecord) -> DbResult<u64> {
        debug!(id = %record.id, "Updating intake record");

        let result = sqlx::query(
            r#"
            UPDATE medication_intake_record
            SET medication_name = ?2, intake_time = ?3, dosage_taken = ?4
            WHERE id = ?1
            "#,
        )
        .bind(record.id)
        .bind(&record.medication_name)
        .bind(record.intake_time)
        .bind(record.dosage_taken)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes by id. Returns rows affected.
    pub async fn delete_by_id(&self, id: i64) -> DbResult<u64> {
        debug!(id = %id, "Deleting intake record");

        let result = sqlx::query("DELETE FROM medication_intake_record WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes every record for one medication name. Returns rows affected.
    pub async fn delete_by_medication_name(&self, name: &str) -> DbResult<u64> {
        debug!(medication = %name, "Deleting intake records by medication");

        let result = sqlx::query("DELETE FROM medication_intake_record WHERE medication_name = ?1")
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<IntakeRecord>> {
        let record = sqlx::query_as::<_, IntakeRecord>(&format!("{SELECT_INTAKE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    pub async fn all(&self) -> DbResult<Vec<IntakeRecord>> {
        let records = sqlx::query_as::<_, IntakeRecord>(&format!("{SELECT_INTAKE} {NEWEST_FIRST}"))
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    /// Records for one medication name (exact match).
    pub async fn by_medication_name(&self, name: &str) -> DbResult<Vec<IntakeRecord>> {
        let records = sqlx::query_as::<_, IntakeRecord>(&format!(
            "{SELECT_INTAKE} WHERE medication_name = ?1 {NEWEST_FIRST}"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Records with `start <= intake_time <= end`.
    pub async fn by_time_range(&self, start: i64, end: i64) -> DbResult<Vec<IntakeRecord>> {
        let records = sqlx::query_as::<_, IntakeRecord>(&format!(
            "{SELECT_INTAKE} WHERE intake_time BETWEEN ?1 AND ?2 {NEWEST_FIRST}"
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// The `limit` most recent records.
    pub async fn recent(&self, limit: u32) -> DbResult<Vec<IntakeRecord>> {
        let records = sqlx::query_as::<_, IntakeRecord>(&format!(
            "{SELECT_INTAKE} {NEWEST_FIRST} LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medication_intake_record")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    pub async fn count_by_medication_name(&self, name: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM medication_intake_record WHERE medication_name = ?1",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
