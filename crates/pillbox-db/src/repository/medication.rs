//! # Medication Repository
//!
//! Asynchronous medication writes, the duplicate-name policy, and live
//! medication lists.
//!
//! ## Duplicate-Name Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 insert(record, allow_duplicate)                         │
//! │                                                                         │
//! │  validate ── invalid ──────────────────────────► Error(Validation)      │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  allow_duplicate?                                                       │
//! │     │ yes                          │ no                                 │
//! │     │                              ▼                                    │
//! │     │                  COUNT(*) WHERE name = ?   (exact, trimmed)       │
//! │     │                     │ 0              │ ≥ 1                        │
//! │     ▼                     ▼                ▼                            │
//! │  stamp created/updated, INSERT        DuplicateFound(name)              │
//! │     │                                 (no write; caller may retry       │
//! │     ▼                                  with allow_duplicate = true)     │
//! │  Success(id) / Error(Store { Save })                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the write are separate statements and the name column has
//! no UNIQUE constraint, so two concurrent inserts of the same name can both
//! succeed. That race is accepted; the name is a soft key.

use tracing::{debug, info, warn};

use pillbox_core::validation::validate_medication;
use pillbox_core::{DosageForm, MedicationColor, MedicationRecord, StockLevel};

use crate::changes::Table;
use crate::dao::{DoseDeduction, MedicationDao};
use crate::error::{RepositoryError, StoreOp};
use crate::live::LiveQuery;
use crate::repository::{now_millis, RepoContext};
use crate::worker::{Terminal, Ticket};

const WATCHES: &[Table] = &[Table::Medications];

// =============================================================================
// Outcomes
// =============================================================================

/// The three ways an insert can end.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    /// Stored under this id.
    Success(i64),
    /// Another medication already has this (trimmed) name; nothing was
    /// written.
    DuplicateFound(String),
    /// Validation or the store rejected the record.
    Error(RepositoryError),
}

impl InsertOutcome {
    /// The new id, if the insert succeeded.
    pub fn id(&self) -> Option<i64> {
        match self {
            InsertOutcome::Success(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InsertOutcome::Success(_))
    }
}

impl Terminal for InsertOutcome {
    fn from_failure(err: RepositoryError) -> Self {
        InsertOutcome::Error(err)
    }
}

/// What a successful [`MedicationRepository::take_dose`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoseTaken {
    /// The intake record written for this dose.
    pub record_id: i64,
    pub medication_name: String,
    /// Units deducted; less than a full dose when the supply ran out.
    pub deducted: u32,
    pub remaining: u32,
    pub stock_level: StockLevel,
}

// =============================================================================
// Repository
// =============================================================================

/// Medication access for screens.
///
/// Obtained from [`Database::medications`](crate::Database::medications).
/// All instances share one worker pool; [`cleanup`](Self::cleanup) shuts it
/// down for every instance.
#[derive(Debug, Clone)]
pub struct MedicationRepository {
    dao: MedicationDao,
    ctx: RepoContext,
}

impl MedicationRepository {
    pub(crate) fn new(ctx: RepoContext) -> Self {
        MedicationRepository {
            dao: MedicationDao::new(ctx.pool.clone()),
            ctx,
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Validates and stores a new medication.
    ///
    /// ## Arguments
    /// * `record` - Candidate; `id`, `created_at` and `updated_at` are set here
    /// * `allow_duplicate` - Skip the name check entirely
    ///
    /// ## Returns
    /// A ticket resolving to [`InsertOutcome`].
    ///
    /// ## Example
    /// ```rust,ignore
    /// match db.medications().insert(record.clone(), false).await {
    ///     InsertOutcome::Success(id) => show_saved(id),
    ///     InsertOutcome::DuplicateFound(name) => {
    ///         if confirm_duplicate(&name) {
    ///             db.medications().insert(record, true).await;
    ///         }
    ///     }
    ///     InsertOutcome::Error(err) => show_error(&err.to_string()),
    /// }
    /// ```
    pub fn insert(&self, mut record: MedicationRecord, allow_duplicate: bool) -> Ticket<InsertOutcome> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("medications.insert", async move {
            if let Err(err) = validate_medication(&record).into_result() {
                debug!(error = %err, "Medication rejected by validation");
                return InsertOutcome::Error(err.into());
            }
            record.name = record.name.trim().to_string();

            if !allow_duplicate {
                match dao.count_by_name(&record.name).await {
                    Ok(0) => {}
                    Ok(existing) => {
                        info!(name = %record.name, existing, "Duplicate medication name");
                        return InsertOutcome::DuplicateFound(record.name);
                    }
                    Err(e) => {
                        warn!(error = %e, "Duplicate check failed");
                        return InsertOutcome::Error(RepositoryError::store(StoreOp::Save, e));
                    }
                }
            }

            let now = now_millis();
            record.created_at = now;
            record.updated_at = now;

            match dao.insert(&record).await {
                Ok(id) => {
                    info!(id = %id, name = %record.name, "Medication saved");
                    feed.notify(Table::Medications);
                    InsertOutcome::Success(id)
                }
                Err(e) => {
                    warn!(name = %record.name, error = %e, "Medication save failed");
                    InsertOutcome::Error(RepositoryError::store(StoreOp::Save, e))
                }
            }
        })
    }

    /// Validates and overwrites an existing medication.
    ///
    /// ## Returns
    /// * `Ok(())` - Stored; `updated_at` refreshed
    /// * `Err(RepositoryError::NotFound)` - No row with `record.id`
    pub fn update(&self, mut record: MedicationRecord) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("medications.update", async move {
            validate_medication(&record).into_result()?;
            record.name = record.name.trim().to_string();
            record.updated_at = now_millis();

            let affected = dao
                .update(&record)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Update, e))?;
            if affected == 0 {
                warn!(id = %record.id, "Medication to update not found");
                return Err(RepositoryError::NotFound {
                    entity: "medication",
                    id: record.id,
                });
            }

            info!(id = %record.id, "Medication updated");
            feed.notify(Table::Medications);
            Ok(())
        })
    }

    /// Deletes the given medication; a missing row is an error.
    pub fn delete(&self, record: &MedicationRecord) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();
        let id = record.id;

        self.ctx.workers.submit("medications.delete", async move {
            let affected = dao
                .delete_by_id(id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Delete, e))?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "medication",
                    id,
                });
            }

            info!(id = %id, "Medication deleted");
            feed.notify(Table::Medications);
            Ok(())
        })
    }

    /// Deletes by id. Idempotent: a missing row resolves `Ok(0)`.
    pub fn delete_by_id(&self, id: i64) -> Ticket<Result<u64, RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("medications.delete_by_id", async move {
            let affected = dao
                .delete_by_id(id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Delete, e))?;
            if affected > 0 {
                info!(id = %id, "Medication deleted");
                feed.notify(Table::Medications);
            }
            Ok(affected)
        })
    }

    /// Sets the remaining quantity after a refill.
    pub fn restock(&self, id: i64, remaining: u32) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("medications.restock", async move {
            let affected = dao
                .set_remaining_quantity(id, remaining, now_millis())
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Update, e))?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "medication",
                    id,
                });
            }

            info!(id = %id, remaining = %remaining, "Medication restocked");
            feed.notify(Table::Medications);
            Ok(())
        })
    }

    /// Subtracts `amount` from the remaining quantity, stopping at zero.
    pub fn reduce_quantity(&self, id: i64, amount: u32) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("medications.reduce_quantity", async move {
            let affected = dao
                .reduce_quantity(id, amount, now_millis())
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Update, e))?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "medication",
                    id,
                });
            }

            debug!(id = %id, amount = %amount, "Medication quantity reduced");
            feed.notify(Table::Medications);
            Ok(())
        })
    }

    /// Deducts one dose and records the intake in a single transaction.
    ///
    /// ## Returns
    /// * `Ok(DoseTaken)` - Deducted and logged
    /// * `Err(RepositoryError::OutOfStock)` - Nothing left; nothing written
    /// * `Err(RepositoryError::NotFound)` - No such medication
    pub fn take_dose(&self, id: i64) -> Ticket<Result<DoseTaken, RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("medications.take_dose", async move {
            let deduction = dao
                .take_dose(id, now_millis())
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Update, e))?;

            match deduction {
                DoseDeduction::Taken {
                    record_id,
                    deducted,
                    medication,
                } => {
                    let stock_level = medication.stock_level();
                    info!(
                        id = %id,
                        deducted = %deducted,
                        remaining = %medication.remaining_quantity,
                        ?stock_level,
                        "Dose taken"
                    );
                    feed.notify(Table::Medications);
                    feed.notify(Table::IntakeRecords);
                    Ok(DoseTaken {
                        record_id,
                        medication_name: medication.name,
                        deducted,
                        remaining: medication.remaining_quantity,
                        stock_level,
                    })
                }
                DoseDeduction::OutOfStock(medication) => {
                    warn!(id = %id, "Dose refused, medication is out of stock");
                    Err(RepositoryError::OutOfStock {
                        name: medication.name,
                    })
                }
                DoseDeduction::Missing => Err(RepositoryError::NotFound {
                    entity: "medication",
                    id,
                }),
            }
        })
    }

    /// Returns true if a medication with exactly this (trimmed) name exists.
    ///
    /// Never fails: empty input and store errors both yield `false`. Meant
    /// for non-critical hints such as a warning under the name field.
    pub async fn exists_by_name(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }

        match self.dao.count_by_name(name).await {
            Ok(count) => count > 0,
            Err(e) => {
                warn!(name = %name, error = %e, "Name lookup failed");
                false
            }
        }
    }

    /// Shuts down the medication worker pool for every repository instance.
    /// Terminal: later writes resolve with [`RepositoryError::ShutDown`].
    pub fn cleanup(&self) {
        self.ctx.workers.cleanup();
    }

    // =========================================================================
    // Live Reads
    // =========================================================================

    /// All medications, newest first.
    pub fn all(&self) -> LiveQuery<Vec<MedicationRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "medications.all", move || {
            let dao = dao.clone();
            async move { dao.all().await }
        })
    }

    /// One medication; `None` while it does not exist.
    pub fn by_id(&self, id: i64) -> LiveQuery<Option<MedicationRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "medications.by_id", move || {
            let dao = dao.clone();
            async move { dao.get_by_id(id).await }
        })
    }

    pub fn by_color(&self, color: MedicationColor) -> LiveQuery<Vec<MedicationRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "medications.by_color", move || {
            let dao = dao.clone();
            async move { dao.by_color(color.as_str()).await }
        })
    }

    pub fn by_dosage_form(&self, dosage_form: DosageForm) -> LiveQuery<Vec<MedicationRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "medications.by_dosage_form", move || {
            let dao = dao.clone();
            async move { dao.by_dosage_form(dosage_form.as_str()).await }
        })
    }

    /// Medications whose name contains `query`.
    pub fn search(&self, query: &str) -> LiveQuery<Vec<MedicationRecord>> {
        let dao = self.dao.clone();
        let query = query.trim().to_string();
        self.ctx.live(WATCHES, "medications.search", move || {
            let dao = dao.clone();
            let query = query.clone();
            async move { dao.search(&query).await }
        })
    }

    pub fn count(&self) -> LiveQuery<i64> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "medications.count", move || {
            let dao = dao.clone();
            async move { dao.count().await }
        })
    }

    /// Medications at or below `threshold_percent` remaining, emptiest first.
    pub fn needing_refill(&self, threshold_percent: u32) -> LiveQuery<Vec<MedicationRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "medications.needing_refill", move || {
            let dao = dao.clone();
            async move { dao.needing_refill(threshold_percent).await }
        })
    }

    pub fn out_of_stock(&self) -> LiveQuery<Vec<MedicationRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "medications.out_of_stock", move || {
            let dao = dao.clone();
            async move { dao.out_of_stock().await }
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::time::Duration;

    async fn repo() -> (Database, MedicationRepository) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.medications();
        (db, repo)
    }

    fn aspirin() -> MedicationRecord {
        let mut record = MedicationRecord::new("Aspirin", MedicationColor::White, DosageForm::Tablet);
        record.total_quantity = 10;
        record.remaining_quantity = 10;
        record
    }

    #[tokio::test]
    async fn test_insert_stamps_and_trims() {
        let (_db, repo) = repo().await;
        let mut record = aspirin();
        record.name = "  Aspirin  ".to_string();

        let id = repo.insert(record, false).await.id().unwrap();
        let stored = repo.dao.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(stored.name, "Aspirin");
        assert!(stored.created_at > 0);
        assert_eq!(stored.created_at, stored.updated_at);
    }

    #[tokio::test]
    async fn test_duplicate_name_policy() {
        let (_db, repo) = repo().await;
        assert!(repo.insert(aspirin(), false).await.is_success());

        let outcome = repo.insert(aspirin(), false).await;
        assert!(matches!(outcome, InsertOutcome::DuplicateFound(ref name) if name == "Aspirin"));
        assert_eq!(repo.dao.count().await.unwrap(), 1);

        assert!(repo.insert(aspirin(), true).await.is_success());
        assert_eq!(repo.dao.count().await.unwrap(), 2);

        // Name comparison is exact
        let mut lower = aspirin();
        lower.name = "aspirin".to_string();
        assert!(repo.insert(lower, false).await.is_success());
    }

    #[tokio::test]
    async fn test_invalid_insert_never_reaches_store() {
        let (_db, repo) = repo().await;
        let mut record = aspirin();
        record.name = "   ".to_string();

        let outcome = repo.insert(record, false).await;
        let InsertOutcome::Error(err) = outcome else {
            panic!("expected a validation error");
        };
        assert_eq!(err.to_string(), "name is required");
        assert_eq!(repo.dao.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_refreshes_timestamp_and_reports_missing_rows() {
        let (_db, repo) = repo().await;
        let id = repo.insert(aspirin(), false).await.id().unwrap();
        let mut stored = repo.dao.get_by_id(id).await.unwrap().unwrap();
        let created_at = stored.created_at;

        tokio::time::sleep(Duration::from_millis(5)).await;
        stored.remaining_quantity = 3;
        repo.update(stored.clone()).await.unwrap();

        let updated = repo.dao.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(updated.remaining_quantity, 3);
        assert_eq!(updated.created_at, created_at);
        assert!(updated.updated_at > created_at);

        stored.id = 9_999;
        let err = repo.update(stored).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "medication not found: 9999");
    }

    #[tokio::test]
    async fn test_delete_variants() {
        let (_db, repo) = repo().await;
        let id = repo.insert(aspirin(), false).await.id().unwrap();
        let stored = repo.dao.get_by_id(id).await.unwrap().unwrap();

        repo.delete(&stored).await.unwrap();
        assert!(repo.delete(&stored).await.unwrap_err().is_not_found());

        assert_eq!(repo.delete_by_id(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exists_by_name_never_fails() {
        let (db, repo) = repo().await;
        repo.insert(aspirin(), false).await.id().unwrap();

        assert!(repo.exists_by_name(" Aspirin ").await);
        assert!(!repo.exists_by_name("Ibuprofen").await);
        assert!(!repo.exists_by_name("").await);

        db.pool().close().await;
        assert!(!repo.exists_by_name("Aspirin").await);
    }

    #[tokio::test]
    async fn test_take_dose_until_empty() {
        let (_db, repo) = repo().await;
        let mut record = aspirin();
        record.dosage_per_intake = 3;
        let id = repo.insert(record, false).await.id().unwrap();

        let levels: Vec<(u32, StockLevel)> = [
            repo.take_dose(id).await.unwrap(),
            repo.take_dose(id).await.unwrap(),
            repo.take_dose(id).await.unwrap(),
            repo.take_dose(id).await.unwrap(),
        ]
        .iter()
        .map(|dose| (dose.remaining, dose.stock_level))
        .collect();

        assert_eq!(
            levels,
            vec![
                (7, StockLevel::Sufficient),
                (4, StockLevel::Low),
                (1, StockLevel::Low),
                (0, StockLevel::OutOfStock),
            ]
        );

        let err = repo.take_dose(id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::OutOfStock { ref name } if name == "Aspirin"));
        assert!(repo.take_dose(404).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_restock_and_reduce() {
        let (_db, repo) = repo().await;
        let id = repo.insert(aspirin(), false).await.id().unwrap();

        repo.reduce_quantity(id, 25).await.unwrap();
        assert_eq!(repo.dao.get_by_id(id).await.unwrap().unwrap().remaining_quantity, 0);

        repo.restock(id, 10).await.unwrap();
        assert_eq!(repo.dao.get_by_id(id).await.unwrap().unwrap().remaining_quantity, 10);

        assert!(repo.restock(404, 1).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_live_list_follows_writes() {
        let (_db, repo) = repo().await;
        let mut all = repo.all();
        let mut count = repo.count();
        assert_eq!(all.next().await, Some(vec![]));
        assert_eq!(count.next().await, Some(0));

        let id = repo.insert(aspirin(), false).await.id().unwrap();
        let list = all.wait_for(|list| list.len() == 1).await.unwrap();
        assert_eq!(list[0].id, id);
        assert_eq!(count.wait_for(|n| *n == 1).await, Some(1));

        repo.delete_by_id(id).await.unwrap();
        assert_eq!(all.wait_for(|list| list.is_empty()).await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_writes_after_cleanup_are_refused() {
        let (db, repo) = repo().await;
        db.medications().cleanup();

        let outcome = repo.insert(aspirin(), false).await;
        assert!(matches!(outcome, InsertOutcome::Error(RepositoryError::ShutDown)));
        assert!(matches!(
            repo.delete_by_id(1).await,
            Err(RepositoryError::ShutDown)
        ));
    }
}
