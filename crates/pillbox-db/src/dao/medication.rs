//! # Medication DAO
//!
//! SQL for the `medications` table.
//!
//! ## Key Operations
//! - CRUD by id
//! - Exact-name count (backs the duplicate-name policy)
//! - Filtered lists: color, dosage form, name search, refill, out of stock
//! - Atomic stock changes and the take-dose transaction
//!
//! ## Take Dose Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    UPDATE medications SET updated_at = now WHERE id = ?                 │
//! │      0 rows ──► ROLLBACK, Missing                                       │
//! │      (this write takes the lock before anything is read)                │
//! │    SELECT * FROM medications WHERE id = ?                               │
//! │      remaining == 0 ──► ROLLBACK, OutOfStock                            │
//! │    UPDATE remaining_quantity = MAX(0, remaining - dosage)               │
//! │    INSERT INTO medication_intake_record (name, now, deducted)           │
//! │  COMMIT ──► Taken                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::SqlitePool;
use tracing::debug;

use pillbox_core::MedicationRecord;

use crate::dao::contains_pattern;
use crate::error::DbResult;

const SELECT_MEDICATION: &str = r#"
    SELECT
        id, name, color, dosage_form, photo_path,
        created_at, updated_at,
        total_quantity, remaining_quantity, unit,
        dosage_per_intake, low_stock_threshold
    FROM medications
"#;

/// Result of the take-dose transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoseDeduction {
    /// The dose was deducted and an intake record written.
    Taken {
        record_id: i64,
        deducted: u32,
        medication: MedicationRecord,
    },
    /// Nothing was left; nothing was written.
    OutOfStock(MedicationRecord),
    /// No medication with that id.
    Missing,
}

/// Data access for medications.
///
/// ## Usage
/// ```rust,ignore
/// let dao = MedicationDao::new(pool);
///
/// let id = dao.insert(&record).await?;
/// let found = dao.get_by_id(id).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MedicationDao {
    pool: SqlitePool,
}

impl MedicationDao {
    /// Creates a new MedicationDao.
    pub fn new(pool: SqlitePool) -> Self {
        MedicationDao { pool }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Inserts a medication.
    ///
    /// ## Arguments
    /// * `record` - Medication to insert; its `id` is ignored
    ///
    /// ## Returns
    /// * `Ok(i64)` - The generated row id
    pub async fn insert(&self, record: &MedicationRecord) -> DbResult<i64> {
        debug!(name = %record.name, "Inserting medication");

        let result = sqlx::query(
            r#"
            INSERT INTO medications (
                name, color, dosage_form, photo_path,
                created_at, updated_at,
                total_quantity, remaining_quantity, unit,
                dosage_per_intake, low_stock_threshold
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&record.name)
        .bind(&record.color)
        .bind(&record.dosage_form)
        .bind(&record.photo_path)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.total_quantity)
        .bind(record.remaining_quantity)
        .bind(&record.unit)
        .bind(record.dosage_per_intake)
        .bind(record.low_stock_threshold)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Overwrites every column except `id` and `created_at`.
    ///
    /// ## Returns
    /// * `Ok(u64)` - Rows affected; 0 when the id does not exist
    pub async fn update(&self, record: &MedicationRecord) -> DbResult<u64> {
        debug!(id = %record.id, "Updating medication");

        let result = sqlx::query(
            r#"
            UPDATE medications SET
                name = ?2,
                color = ?3,
                dosage_form = ?4,
                photo_path = ?5,
                updated_at = ?6,
                total_quantity = ?7,
                remaining_quantity = ?8,
                unit = ?9,
                dosage_per_intake = ?10,
                low_stock_threshold = ?11
            WHERE id = ?1
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.color)
        .bind(&record.dosage_form)
        .bind(&record.photo_path)
        .bind(record.updated_at)
        .bind(record.total_quantity)
        .bind(record.remaining_quantity)
        .bind(&record.unit)
        .bind(record.dosage_per_intake)
        .bind(record.low_stock_threshold)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes by id. Returns rows affected.
    pub async fn delete_by_id(&self, id: i64) -> DbResult<u64> {
        debug!(id = %id, "Deleting medication");

        let result = sqlx::query("DELETE FROM medications WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Sets the remaining quantity outright (restock or correction).
    pub async fn set_remaining_quantity(&self, id: i64, remaining: u32, now: i64) -> DbResult<u64> {
        debug!(id = %id, remaining = %remaining, "Setting remaining quantity");

        let result = sqlx::query(
            "UPDATE medications SET remaining_quantity = ?2, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(remaining)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Subtracts `amount`, clamping at zero, in a single statement.
    pub async fn reduce_quantity(&self, id: i64, amount: u32, now: i64) -> DbResult<u64> {
        debug!(id = %id, amount = %amount, "Reducing quantity");

        let result = sqlx::query(
            r#"
            UPDATE medications
            SET remaining_quantity = MAX(0, remaining_quantity - ?2),
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(amount)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deducts one dose and logs the intake, atomically.
    ///
    /// ## Arguments
    /// * `id` - Medication id
    /// * `now` - Epoch millis used for `updated_at` and `intake_time`
    pub async fn take_dose(&self, id: i64, now: i64) -> DbResult<DoseDeduction> {
        debug!(id = %id, "Taking dose");

        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE medications SET updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Ok(DoseDeduction::Missing);
        }

        let mut medication: MedicationRecord =
            sqlx::query_as::<_, MedicationRecord>(&format!("{SELECT_MEDICATION} WHERE id = ?1"))
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;

        let Ok(deducted) = medication.try_take_dose() else {
            // Dropping `tx` rolls back the updated_at touch
            return Ok(DoseDeduction::OutOfStock(medication));
        };

        sqlx::query("UPDATE medications SET remaining_quantity = ?2 WHERE id = ?1")
            .bind(id)
            .bind(medication.remaining_quantity)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO medication_intake_record (medication_name, intake_time, dosage_taken)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(&medication.name)
        .bind(now)
        .bind(deducted)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            id = %id,
            deducted = %deducted,
            remaining = %medication.remaining_quantity,
            "Dose taken"
        );

        Ok(DoseDeduction::Taken {
            record_id: inserted.last_insert_rowid(),
            deducted,
            medication,
        })
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a medication by id.
    ///
    /// ## Returns
    /// * `Ok(Some(MedicationRecord))` - Found
    /// * `Ok(None)` - No such id
    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<MedicationRecord>> {
        let record = sqlx::query_as::<_, MedicationRecord>(&format!("{SELECT_MEDICATION} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    /// Counts medications whose name equals `name` exactly.
    pub async fn count_by_name(&self, name: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medications WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// All medications, newest first.
    pub async fn all(&self) -> DbResult<Vec<MedicationRecord>> {
        let records = sqlx::query_as::<_, MedicationRecord>(&format!(
            "{SELECT_MEDICATION} ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Medications with the given color tag, newest first.
    pub async fn by_color(&self, color: &str) -> DbResult<Vec<MedicationRecord>> {
        let records = sqlx::query_as::<_, MedicationRecord>(&format!(
            "{SELECT_MEDICATION} WHERE color = ?1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(color)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Medications with the given dosage form tag, newest first.
    pub async fn by_dosage_form(&self, dosage_form: &str) -> DbResult<Vec<MedicationRecord>> {
        let records = sqlx::query_as::<_, MedicationRecord>(&format!(
            "{SELECT_MEDICATION} WHERE dosage_form = ?1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(dosage_form)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Medications whose name contains `query`, newest first.
    ///
    /// `%` and `_` in the query match literally.
    pub async fn search(&self, query: &str) -> DbResult<Vec<MedicationRecord>> {
        let records = sqlx::query_as::<_, MedicationRecord>(&format!(
            r"{SELECT_MEDICATION} WHERE name LIKE ?1 ESCAPE '\' ORDER BY created_at DESC, id DESC"
        ))
        .bind(contains_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Total number of medications.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM medications")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Medications at or below `threshold_percent` of their total, emptiest
    /// first. Medications without a total are never included.
    pub async fn needing_refill(&self, threshold_percent: u32) -> DbResult<Vec<MedicationRecord>> {
        let records = sqlx::query_as::<_, MedicationRecord>(&format!(
            r#"{SELECT_MEDICATION}
            WHERE total_quantity > 0
              AND ROUND(remaining_quantity * 100.0 / total_quantity) <= ?1
            ORDER BY (remaining_quantity * 100.0 / total_quantity) ASC, id ASC"#
        ))
        .bind(threshold_percent)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Medications with nothing left, most recently changed first.
    pub async fn out_of_stock(&self) -> DbResult<Vec<MedicationRecord>> {
        let records = sqlx::query_as::<_, MedicationRecord>(&format!(
            "{SELECT_MEDICATION} WHERE remaining_quantity = 0 ORDER BY updated_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
