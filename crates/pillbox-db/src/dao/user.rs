//! # User DAO
//!
//! SQL for the `users` table. Deleting a user cascades to their diary
//! entries through the foreign key.

use sqlx::SqlitePool;
use tracing::debug;

use pillbox_core::UserAccount;

use crate::error::DbResult;

const SELECT_USER: &str = r#"
    SELECT id, username, full_name, email, phone, gender, birth_date,
           emergency_contact_name, emergency_contact_phone, blood_type,
           allergies, medical_conditions, doctor_name, doctor_phone,
           hospital_name, created_at, updated_at
    FROM users"#;

/// Data access for user accounts.
#[derive(Debug, Clone)]
pub struct UserDao {
    pool: SqlitePool,
}

impl UserDao {
    /// Creates a new UserDao.
    pub fn new(pool: SqlitePool) -> Self {
        UserDao { pool }
    }

    /// Inserts an account and returns its id.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Username already taken
    pub async fn insert(&self, user: &UserAccount) -> DbResult<i64> {
        debug!(username = %user.username, "Inserting user");

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, full_name, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(&format!("{SELECT_USER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>(&format!("{SELECT_USER} WHERE username = ?1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Overwrites the profile fields and `updated_at`. The username and
    /// `created_at` are never changed. Returns rows affected.
    pub async fn update_profile(&self, user: &UserAccount) -> DbResult<u64> {
        debug!(id = %user.id, "Updating user profile");

        let result = sqlx::query(
            r#"
            UPDATE users
            SET full_name = ?2, email = ?3, phone = ?4, gender = ?5, birth_date = ?6,
                emergency_contact_name = ?7, emergency_contact_phone = ?8,
                blood_type = ?9, allergies = ?10, medical_conditions = ?11,
                doctor_name = ?12, doctor_phone = ?13, hospital_name = ?14,
                updated_at = ?15
            WHERE id = ?1
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.gender)
        .bind(&user.birth_date)
        .bind(&user.emergency_contact_name)
        .bind(&user.emergency_contact_phone)
        .bind(&user.blood_type)
        .bind(&user.allergies)
        .bind(&user.medical_conditions)
        .bind(&user.doctor_name)
        .bind(&user.doctor_phone)
        .bind(&user.hospital_name)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes by id, together with the user's diary entries.
    pub async fn delete_by_id(&self, id: i64) -> DbResult<u64> {
        debug!(id = %id, "Deleting user");

        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_username_is_unique() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dao = UserDao::new(db.pool().clone());

        let id = dao.insert(&UserAccount::new("grandma")).await.unwrap();
        let err = dao.insert(&UserAccount::new("grandma")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let found = dao.get_by_username("grandma").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(dao.get_by_username("grandpa").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_keeps_identity() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let dao = UserDao::new(db.pool().clone());
        let id = dao
            .insert(&UserAccount {
                created_at: 1_000,
                updated_at: 1_000,
                ..UserAccount::new("grandma")
            })
            .await
            .unwrap();

        let mut user = dao.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.blood_type, None);
        user.username = "renamed".to_string();
        user.blood_type = Some("O+".to_string());
        user.hospital_name = Some("City General".to_string());
        user.updated_at = 2_000;
        assert_eq!(dao.update_profile(&user).await.unwrap(), 1);

        let stored = dao.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.username, "grandma");
        assert_eq!(stored.blood_type.as_deref(), Some("O+"));
        assert_eq!(stored.hospital_name.as_deref(), Some("City General"));
        assert_eq!((stored.created_at, stored.updated_at), (1_000, 2_000));

        user.id = id + 1;
        assert_eq!(dao.update_profile(&user).await.unwrap(), 0);
    }
}
