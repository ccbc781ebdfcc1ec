//! # Health Diary DAO
//!
//! SQL for the `health_diary` table. Every list is scoped to one user and
//! ordered newest first.

use sqlx::SqlitePool;
use tracing::debug;

use pillbox_core::HealthDiaryEntry;

use crate::dao::contains_pattern;
use crate::error::DbResult;

const SELECT_DIARY: &str =
    "SELECT id, user_id, content, created_at, updated_at FROM health_diary";

const NEWEST_FIRST: &str = "ORDER BY created_at DESC, id DESC";

/// Data access for diary entries.
#[derive(Debug, Clone)]
pub struct HealthDiaryDao {
    pool: SqlitePool,
}

impl HealthDiaryDao {
    /// Creates a new HealthDiaryDao.
    pub fn new(pool: SqlitePool) -> Self {
        HealthDiaryDao { pool }
    }

    /// Inserts an entry and returns its id.
    ///
    /// ## Returns
    /// * `Err(DbError::ForeignKeyViolation)` - `user_id` does not exist
    pub async fn insert(&self, entry: &HealthDiaryEntry) -> DbResult<i64> {
        debug!(user_id = %entry.user_id, "Inserting diary entry");

        let result = sqlx::query(
            r#"
            INSERT INTO health_diary (user_id, content, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.content)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Replaces the content. `user_id` and `created_at` are never changed.
    pub async fn update_content(&self, id: i64, content: &str, now: i64) -> DbResult<u64> {
        debug!(id = %id, "Updating diary entry");

        let result = sqlx::query("UPDATE health_diary SET content = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(content)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes by id. Returns rows affected.
    pub async fn delete_by_id(&self, id: i64) -> DbResult<u64> {
        debug!(id = %id, "Deleting diary entry");

        let result = sqlx::query("DELETE FROM health_diary WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<HealthDiaryEntry>> {
        let entry = sqlx::query_as::<_, HealthDiaryEntry>(&format!("{SELECT_DIARY} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(entry)
    }

    pub async fn by_user(&self, user_id: i64) -> DbResult<Vec<HealthDiaryEntry>> {
        let entries = sqlx::query_as::<_, HealthDiaryEntry>(&format!(
            "{SELECT_DIARY} WHERE user_id = ?1 {NEWEST_FIRST}"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// A user's entries with `start <= created_at <= end`.
    pub async fn by_user_and_time_range(
        &self,
        user_id: i64,
        start: i64,
        end: i64,
    ) -> DbResult<Vec<HealthDiaryEntry>> {
        let entries = sqlx::query_as::<_, HealthDiaryEntry>(&format!(
            "{SELECT_DIARY} WHERE user_id = ?1 AND created_at BETWEEN ?2 AND ?3 {NEWEST_FIRST}"
        ))
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// A user's most recently written entry.
    pub async fn latest_by_user(&self, user_id: i64) -> DbResult<Option<HealthDiaryEntry>> {
        let entry = sqlx::query_as::<_, HealthDiaryEntry>(&format!(
            "{SELECT_DIARY} WHERE user_id = ?1 {NEWEST_FIRST} LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Entries whose content contains `keyword` (case-insensitive for ASCII,
    /// as SQLite's LIKE is).
    pub async fn search(&self, user_id: i64, keyword: &str) -> DbResult<Vec<HealthDiaryEntry>> {
        let entries = sqlx::query_as::<_, HealthDiaryEntry>(&format!(
            r"{SELECT_DIARY} WHERE user_id = ?1 AND content LIKE ?2 ESCAPE '\' {NEWEST_FIRST}"
        ))
        .bind(user_id)
        .bind(contains_pattern(keyword))
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// One page of a user's entries.
    ///
    /// ## Arguments
    /// * `limit` - Page size
    /// * `offset` - Entries to skip
    pub async fn page(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<HealthDiaryEntry>> {
        let entries = sqlx::query_as::<_, HealthDiaryEntry>(&format!(
            "{SELECT_DIARY} WHERE user_id = ?1 {NEWEST_FIRST} LIMIT ?2 OFFSET ?3"
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    pub async fn count_by_user(&self, user_id: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM health_diary WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
