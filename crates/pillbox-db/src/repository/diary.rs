//! # Health Diary Repository
//!
//! Per-user diary entries with ownership checks.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  add(user_id, content)        user must exist        else NotFound     │
//! │  update(acting_user, entry)   entry.owner == acting  else PermissionDenied│
//! │  delete(acting_user, id)      entry.owner == acting  else PermissionDenied│
//! │                                                                         │
//! │  Deleting the user removes every entry (ON DELETE CASCADE).            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, info, warn};

use pillbox_core::validation::validate_diary_content;
use pillbox_core::HealthDiaryEntry;

use crate::changes::Table;
use crate::dao::{HealthDiaryDao, UserDao};
use crate::error::{RepositoryError, StoreOp};
use crate::live::LiveQuery;
use crate::repository::{now_millis, RepoContext};
use crate::worker::Ticket;

const WATCHES: &[Table] = &[Table::HealthDiary];

/// Diary access for screens.
#[derive(Debug, Clone)]
pub struct HealthDiaryRepository {
    dao: HealthDiaryDao,
    users: UserDao,
    ctx: RepoContext,
}

impl HealthDiaryRepository {
    pub(crate) fn new(ctx: RepoContext) -> Self {
        HealthDiaryRepository {
            dao: HealthDiaryDao::new(ctx.pool.clone()),
            users: UserDao::new(ctx.pool.clone()),
            ctx,
        }
    }

    /// Writes a new entry for `user_id`.
    ///
    /// ## Returns
    /// * `Ok(id)` - Stored with trimmed content
    /// * `Err(RepositoryError::NotFound)` - No such user
    /// * `Err(RepositoryError::Validation)` - Empty or over-long content
    pub fn add(&self, user_id: i64, content: &str) -> Ticket<Result<i64, RepositoryError>> {
        let dao = self.dao.clone();
        let users = self.users.clone();
        let feed = self.ctx.feed.clone();
        let content = content.to_string();

        self.ctx.workers.submit("health_diary.add", async move {
            validate_diary_content(&content)?;

            let owner = users
                .get_by_id(user_id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Read, e))?;
            if owner.is_none() {
                return Err(RepositoryError::NotFound {
                    entity: "user",
                    id: user_id,
                });
            }

            let now = now_millis();
            let entry = HealthDiaryEntry {
                created_at: now,
                updated_at: now,
                ..HealthDiaryEntry::new(user_id, content.trim())
            };

            let id = dao.insert(&entry).await.map_err(|e| {
                warn!(user_id = %user_id, error = %e, "Diary entry save failed");
                RepositoryError::store(StoreOp::Save, e)
            })?;

            info!(id = %id, user_id = %user_id, "Diary entry saved");
            feed.notify(Table::HealthDiary);
            Ok(id)
        })
    }

    /// Replaces the content of an entry owned by `acting_user`.
    ///
    /// Only `content` is taken from `entry`; the owner and `created_at`
    /// stay as stored.
    pub fn update(
        &self,
        acting_user: i64,
        entry: HealthDiaryEntry,
    ) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("health_diary.update", async move {
            validate_diary_content(&entry.content)?;
            ensure_owner(&dao, acting_user, entry.id).await?;

            let affected = dao
                .update_content(entry.id, entry.content.trim(), now_millis())
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Update, e))?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "diary entry",
                    id: entry.id,
                });
            }

            debug!(id = %entry.id, "Diary entry updated");
            feed.notify(Table::HealthDiary);
            Ok(())
        })
    }

    /// Deletes an entry owned by `acting_user`.
    pub fn delete(&self, acting_user: i64, id: i64) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("health_diary.delete", async move {
            ensure_owner(&dao, acting_user, id).await?;

            let affected = dao
                .delete_by_id(id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Delete, e))?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "diary entry",
                    id,
                });
            }

            info!(id = %id, "Diary entry deleted");
            feed.notify(Table::HealthDiary);
            Ok(())
        })
    }

    /// One-shot lookup.
    pub fn get(&self, id: i64) -> Ticket<Result<Option<HealthDiaryEntry>, RepositoryError>> {
        let dao = self.dao.clone();

        self.ctx.workers.submit("health_diary.get", async move {
            dao.get_by_id(id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Read, e))
        })
    }

    /// Shuts down the diary worker pool. Terminal.
    pub fn cleanup(&self) {
        self.ctx.workers.cleanup();
    }

    // =========================================================================
    // Live Reads
    // =========================================================================

    /// A user's entries, newest first.
    pub fn by_user(&self, user_id: i64) -> LiveQuery<Vec<HealthDiaryEntry>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "health_diary.by_user", move || {
            let dao = dao.clone();
            async move { dao.by_user(user_id).await }
        })
    }

    pub fn search(&self, user_id: i64, keyword: &str) -> LiveQuery<Vec<HealthDiaryEntry>> {
        let dao = self.dao.clone();
        let keyword = keyword.trim().to_string();
        self.ctx.live(WATCHES, "health_diary.search", move || {
            let dao = dao.clone();
            let keyword = keyword.clone();
            async move { dao.search(user_id, &keyword).await }
        })
    }

    /// One page of a user's entries, newest first.
    pub fn recent_page(
        &self,
        user_id: i64,
        limit: u32,
        offset: u32,
    ) -> LiveQuery<Vec<HealthDiaryEntry>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "health_diary.recent_page", move || {
            let dao = dao.clone();
            async move { dao.page(user_id, limit, offset).await }
        })
    }

    /// A user's entries written between `start` and `end` (epoch millis,
    /// inclusive), newest first.
    pub fn by_user_and_time_range(
        &self,
        user_id: i64,
        start: i64,
        end: i64,
    ) -> LiveQuery<Vec<HealthDiaryEntry>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "health_diary.by_user_and_time_range", move || {
            let dao = dao.clone();
            async move { dao.by_user_and_time_range(user_id, start, end).await }
        })
    }

    /// A user's newest entry; `None` while they have none.
    pub fn latest_by_user(&self, user_id: i64) -> LiveQuery<Option<HealthDiaryEntry>> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "health_diary.latest_by_user", move || {
            let dao = dao.clone();
            async move { dao.latest_by_user(user_id).await }
        })
    }

    pub fn count_by_user(&self, user_id: i64) -> LiveQuery<i64> {
        let dao = self.dao.clone();
        self.ctx.live(WATCHES, "health_diary.count_by_user", move || {
            let dao = dao.clone();
            async move { dao.count_by_user(user_id).await }
        })
    }
}

async fn ensure_owner(
    dao: &HealthDiaryDao,
    acting_user: i64,
    id: i64,
) -> Result<(), RepositoryError> {
    let stored = dao
        .get_by_id(id)
        .await
        .map_err(|e| RepositoryError::store(StoreOp::Read, e))?
        .ok_or(RepositoryError::NotFound {
            entity: "diary entry",
            id,
        })?;

    if stored.user_id != acting_user {
        warn!(id = %id, owner = %stored.user_id, acting_user = %acting_user, "Diary access denied");
        return Err(RepositoryError::PermissionDenied {
            entity: "diary entry",
            id,
            user_id: acting_user,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use std::time::Duration;

    async fn setup() -> (Database, HealthDiaryRepository, i64, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let alice = db.users().create("alice", None).await.unwrap();
        let bob = db.users().create("bob", Some("Bob B.".to_string())).await.unwrap();
        let repo = db.health_diary();
        (db, repo, alice, bob)
    }

    #[tokio::test]
    async fn test_add_requires_user_and_content() {
        let (_db, repo, alice, _bob) = setup().await;

        let id = repo.add(alice, "  Felt dizzy after lunch  ").await.unwrap();
        let stored = repo.get(id).await.unwrap().unwrap();
        assert_eq!(stored.content, "Felt dizzy after lunch");
        assert!(!stored.is_modified());

        let err = repo.add(9_999, "orphan").await.unwrap_err();
        assert_eq!(err.to_string(), "user not found: 9999");

        let err = repo.add(alice, "   ").await.unwrap_err();
        assert_eq!(err.to_string(), "content is required");

        let err = repo.add(alice, &"x".repeat(5_001)).await.unwrap_err();
        assert_eq!(err.to_string(), "content must be at most 5000 characters");
    }

    #[tokio::test]
    async fn test_only_owner_may_change_entries() {
        let (_db, repo, alice, bob) = setup().await;
        let id = repo.add(alice, "first").await.unwrap();
        let mut entry = repo.get(id).await.unwrap().unwrap();

        entry.content = "edited by bob".to_string();
        let err = repo.update(bob, entry.clone()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::PermissionDenied { user_id, .. } if user_id == bob));
        assert!(matches!(
            repo.delete(bob, id).await,
            Err(RepositoryError::PermissionDenied { .. })
        ));

        tokio::time::sleep(Duration::from_millis(5)).await;
        entry.content = "edited".to_string();
        repo.update(alice, entry.clone()).await.unwrap();
        let stored = repo.get(id).await.unwrap().unwrap();
        assert_eq!(stored.content, "edited");
        assert_eq!(stored.created_at, entry.created_at);
        assert!(stored.is_modified());

        repo.delete(alice, id).await.unwrap();
        assert!(repo.delete(alice, id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_live_views_are_scoped_to_user() {
        let (_db, repo, alice, bob) = setup().await;
        let mut alice_entries = repo.by_user(alice);
        let mut bob_count = repo.count_by_user(bob);
        assert_eq!(alice_entries.next().await, Some(vec![]));
        assert_eq!(bob_count.next().await, Some(0));

        repo.add(alice, "Blood pressure normal").await.unwrap();
        repo.add(bob, "Blood sugar high").await.unwrap();

        let entries = alice_entries.wait_for(|list| list.len() == 1).await.unwrap();
        assert_eq!(entries[0].content, "Blood pressure normal");
        assert_eq!(bob_count.wait_for(|n| *n == 1).await, Some(1));

        let mut found = repo.search(bob, "blood");
        assert_eq!(found.next().await.map(|list| list.len()), Some(1));

        let mut page = repo.recent_page(alice, 10, 1);
        assert_eq!(page.next().await, Some(vec![]));
    }

    #[tokio::test]
    async fn test_latest_and_range_follow_writes() {
        let (_db, repo, alice, bob) = setup().await;
        let mut latest = repo.latest_by_user(alice);
        let mut bob_latest = repo.latest_by_user(bob);
        let mut window = repo.by_user_and_time_range(alice, 0, i64::MAX);
        assert_eq!(latest.next().await, Some(None));
        assert_eq!(bob_latest.next().await, Some(None));
        assert_eq!(window.next().await, Some(vec![]));

        let first = repo.add(alice, "morning").await.unwrap();
        let second = repo.add(alice, "evening").await.unwrap();

        let newest = latest
            .wait_for(|entry| entry.as_ref().map(|e| e.id) == Some(second))
            .await
            .unwrap();
        assert_eq!(newest.map(|e| e.content), Some("evening".to_string()));

        let list = window.wait_for(|list| list.len() == 2).await.unwrap();
        assert_eq!(list.iter().map(|e| e.id).collect::<Vec<_>>(), vec![second, first]);
        assert_eq!(bob_latest.current(), Some(None));

        let stored = repo.get(first).await.unwrap().unwrap();
        let mut exact = repo.by_user_and_time_range(alice, stored.created_at, stored.created_at);
        let hits = exact.next().await.unwrap();
        assert!(hits.iter().any(|e| e.id == first));
    }
}
