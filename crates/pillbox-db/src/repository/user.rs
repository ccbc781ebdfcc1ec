//! # User Repository
//!
//! Accounts that diary entries belong to, with an optional health profile.
//! Requests run on the user worker pool.

use tracing::{debug, info, warn};

use pillbox_core::validation::{validate_user_profile, validate_username};
use pillbox_core::UserAccount;

use crate::changes::Table;
use crate::dao::UserDao;
use crate::error::{RepositoryError, StoreOp};
use crate::repository::{now_millis, RepoContext};
use crate::worker::Ticket;

/// Account access for screens.
#[derive(Debug, Clone)]
pub struct UserRepository {
    dao: UserDao,
    ctx: RepoContext,
}

impl UserRepository {
    pub(crate) fn new(ctx: RepoContext) -> Self {
        UserRepository {
            dao: UserDao::new(ctx.pool.clone()),
            ctx,
        }
    }

    /// Creates an account.
    ///
    /// ## Returns
    /// * `Ok(id)` - Created
    /// * `Err(RepositoryError::Validation)` - Bad username
    /// * `Err(RepositoryError::Store)` - Username already taken
    pub fn create(
        &self,
        username: &str,
        full_name: Option<String>,
    ) -> Ticket<Result<i64, RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();
        let username = username.trim().to_string();

        self.ctx.workers.submit("users.create", async move {
            validate_username(&username)?;

            let now = now_millis();
            let user = UserAccount {
                full_name: full_name
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty()),
                created_at: now,
                updated_at: now,
                ..UserAccount::new(username)
            };

            let id = dao.insert(&user).await.map_err(|e| {
                warn!(username = %user.username, error = %e, "User save failed");
                RepositoryError::store(StoreOp::Save, e)
            })?;

            info!(id = %id, username = %user.username, "User created");
            feed.notify(Table::Users);
            Ok(id)
        })
    }

    pub fn get(&self, id: i64) -> Ticket<Result<Option<UserAccount>, RepositoryError>> {
        let dao = self.dao.clone();

        self.ctx.workers.submit("users.get", async move {
            dao.get_by_id(id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Read, e))
        })
    }

    pub fn get_by_username(
        &self,
        username: &str,
    ) -> Ticket<Result<Option<UserAccount>, RepositoryError>> {
        let dao = self.dao.clone();
        let username = username.trim().to_string();

        self.ctx.workers.submit("users.get_by_username", async move {
            dao.get_by_username(&username)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Read, e))
        })
    }

    /// Replaces the profile fields of an existing account.
    ///
    /// Fields are trimmed and blank ones cleared before validation. The
    /// username and `created_at` stay as stored; `updated_at` is refreshed.
    ///
    /// ## Returns
    /// * `Ok(())` - Updated
    /// * `Err(RepositoryError::Validation)` - A set field has a bad format
    /// * `Err(RepositoryError::NotFound)` - No account with `user.id`
    pub fn update_profile(&self, mut user: UserAccount) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("users.update_profile", async move {
            user.normalize_profile();
            validate_user_profile(&user).into_result()?;
            user.updated_at = now_millis();

            let affected = dao
                .update_profile(&user)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Update, e))?;
            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "user",
                    id: user.id,
                });
            }

            debug!(id = %user.id, "User profile updated");
            feed.notify(Table::Users);
            Ok(())
        })
    }

    /// Shuts down the user worker pool. Terminal.
    pub fn cleanup(&self) {
        self.ctx.workers.cleanup();
    }

    /// Deletes an account and, through the cascade, its diary entries.
    pub fn delete(&self, id: i64) -> Ticket<Result<(), RepositoryError>> {
        let dao = self.dao.clone();
        let feed = self.ctx.feed.clone();

        self.ctx.workers.submit("users.delete", async move {
            let affected = dao
                .delete_by_id(id)
                .await
                .map_err(|e| RepositoryError::store(StoreOp::Delete, e))?;
            if affected == 0 {
                return Err(RepositoryError::NotFound { entity: "user", id });
            }

            info!(id = %id, "User deleted");
            feed.notify(Table::Users);
            feed.notify(Table::HealthDiary);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let users = db.users();

        let id = users.create(" grandma ", Some("  ".to_string())).await.unwrap();
        let user = users.get_by_username("grandma").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.full_name, None);
        assert!(user.created_at > 0);

        let err = users.create("grandma", None).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Store { op: StoreOp::Save, .. }));
        assert_eq!(
            err.to_string(),
            "database save failed: users.username already exists"
        );

        assert!(matches!(
            users.create("no spaces allowed", None).await,
            Err(RepositoryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_diary() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let users = db.users();
        let id = users.create("grandpa", None).await.unwrap();

        let diary = db.health_diary();
        let mut count = diary.count_by_user(id);
        diary.add(id, "walked 2km").await.unwrap();
        assert_eq!(count.wait_for(|n| *n == 1).await, Some(1));

        users.delete(id).await.unwrap();
        assert_eq!(count.wait_for(|n| *n == 0).await, Some(0));
        assert!(users.get(id).await.unwrap().is_none());
        assert!(users.delete(id).await.unwrap_err().is_not_found());
    }
}
