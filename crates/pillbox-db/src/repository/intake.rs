//! # Intake Record Repository
//!
//! Asynchronous writes and live lists for the intake history. Most intake
//! records are written by [`MedicationRepository::take_dose`]; `add` covers
//! manual entries.
//!
//! [`MedicationRepository::take_dose`]: crate::repository::MedicationRepository::take_dose

use tracing::{debug, info, warn};

use pillbox_core::validation::validate_intake_record;
use pillbox_core::IntakeRecord;

use crate::changes::Table;
use crate::dao::IntakeRecordDao;
use crate::error::{RepositoryError, StoreOp};
use crate::live::LiveQuery;
use crate::repository::{now_millis, RepoContext};
use crate::worker::Ticket;

const WATCHES: &[Table] = &[Table::IntakeRecords];

/// Intake history access for screens.
#[derive(Debug, Clone)]
pub struct IntakeRecordRepository {
    dao: IntakeRecordDao,
    ctx: RepoContext,
}

impl IntakeRecordRepository {
    pub(crate) fn new(ctx: RepoContext) -> Self {
        IntakeRecordRepository {
            dao: IntakeRecordDao::new(ctx.pool.clone()),
            ctx,
        }
    }

    /// Stores a new intake record.
    ///
    /// An `intake_time` of 0 is replaced with the current time.
    ///
    /// ## Returns
    /// A ticket resolving to the new record's id.
    pub fn add(&self, mut record: IntakeRecord) -> Ticket<Result<i64, RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("intake_records.add", async move {
            stamp_missing_time(&mut record);
            validate_intake_record(&record).into_result()?;
            record.medication_name = record.medication_name.trim().to_string();

            let id = dao.insert(&record).await.map_err(|e| {
                warn!(medication = %record.medication_name, error = %e, "Intake record save failed");
                RepositoryError::store(StoreOp::Save, e)
            })?;

            info!(id = %id, medication = %record.medication_name, "Intake recorded");
            feed.notify(Table::IntakeRecords);
            Ok(id)
        })
    }

    /// Overwrites an existing record; a missing row is an error.
    ///
    /// As with [`add`](Self::add), an `intake_time` of 0 becomes "now".
    pub fn update(&self, mut record: IntakeRecord) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("intake_records.update", async move {
            stamp_missing_time(&mut record);
            validate_intake_record(&record).into_result()?;
            record.medication_name = record.medication_name.trim().to_string();

            let affected = dao
                .update(&record)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Update, e))?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "intake record",
                    id: record.id,
                });
            }

            debug!(id = %record.id, "Intake record updated");
            feed.notify(Table::IntakeRecords);
            Ok(())
        })
    }

    /// Deletes by id. Idempotent: a missing row resolves `Ok(0)`.
    pub fn delete_by_id(&self, id: i64) -> Ticket<Result<u64, RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("intake_records.delete_by_id", async move {
            let affected = dao
                .delete_by_id(id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Delete, e))?;
            if affected > 0 {
                debug!(id = %id, "Intake record deleted");
                feed.notify(Table::IntakeRecords);
            }
            Ok(affected)
        })
    }

    /// Deletes every record for one medication name (exact match after
    /// trimming).
    ///
    /// ## Returns
    /// A ticket resolving to the number of records removed.
    pub fn delete_by_medication_name(&self, name: &str) -> Ticket<Result<u64, RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();
        let name = name.trim().to_string();

        self.ctx.workers.submit("intake_records.delete_by_medication_name", async move {
            let affected = dao
                .delete_by_medication_name(&name)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Delete, e))?;
            if affected > 0 {
                info!(medication = %name, removed = affected, "Intake history cleared");
                feed.notify(Table::IntakeRecords);
            }
            Ok(affected)
        })
    }

    /// One-shot lookup.
    pub fn get(&self, id: i64) -> Ticket<Result<Option<IntakeRecord>, RepositoryError>> {
        let dao = self.dao.clone();

        self.ctx.workers.submit("intake_records.get", async move {
            dao.get_by_id(id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Read, e))
        })
    }

    /// Shuts down the intake worker pool. Terminal.
    pub fn cleanup(&self) {
        self.ctx.workers.cleanup();
    }

    // =========================================================================
    // Live Reads
    // =========================================================================

    /// Every record, most recent first.
    pub fn all(&self) -> LiveQuery<Vec<IntakeRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "intake_records.all", move || {
            let dao = dao.clone();
            async move { dao.all().await }
        })
    }

    pub fn by_medication_name(&self, name: &str) -> LiveQuery<Vec<IntakeRecord>> {
        let dao = self.dao.clone();
        let name = name.trim().to_string();
        self.ctx.live(WATCHES, "intake_records.by_medication_name", move || {
            let dao = dao.clone();
            let name = name.clone();
            async move { dao.by_medication_name(&name).await }
        })
    }

    /// The `limit` most recent records.
    pub fn recent(&self, limit: u32) -> LiveQuery<Vec<IntakeRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "intake_records.recent", move || {
            let dao = dao.clone();
            async move { dao.recent(limit).await }
        })
    }

    /// Records taken between `start` and `end` (epoch millis, inclusive).
    pub fn by_time_range(&self, start: i64, end: i64) -> LiveQuery<Vec<IntakeRecord>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "intake_records.by_time_range", move || {
            let dao = dao.clone();
            async move { dao.by_time_range(start, end).await }
        })
    }

    pub fn count(&self) -> LiveQuery<i64> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "intake_records.count", move || {
            let dao = dao.clone();
            async move { dao.count().await }
        })
    }

    pub fn count_by_medication_name(&self, name: &str) -> LiveQuery<i64> {
        let dao = self.dao.clone();
        let name = name.trim().to_string();
        self.ctx.live(WATCHES, "intake_records.count_by_medication_name", move || {
            let dao = dao.clone();
            let name = name.clone();
            async move { dao.count_by_medication_name(&name).await }
        })
    }
}

fn stamp_missing_time(record: &mut IntakeRecord) {
    if record.intake_time == 0 {
        record.intake_time = now_millis();
    }
}
