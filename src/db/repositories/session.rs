//! Session repository
//!
//! Database operations for user sessions. Every operation is a point read or
//! write keyed by the hashed session id.
//!
//! This module provides:
//! - `SessionRepository` trait defining the interface for session data access
//! - `SqlxSessionRepository` implementing the trait for SQLite and MySQL

use super::user::{row_to_user_mysql, row_to_user_sqlite};
use crate::db::{Backend, DynDatabasePool, StoreResult};
use crate::models::{Session, User};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const SELECT_SESSION_WITH_USER: &str = r#"
    SELECT s.id AS session_id, s.user_id AS session_user_id, s.expires_at AS session_expires_at,
           u.id, u.username, u.email, u.password_hash, u.created_at, u.updated_at
    FROM sessions s
    INNER JOIN users u ON u.id = s.user_id
    WHERE s.id = ?
"#;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session. Fails with `StoreError::Conflict` if the id is taken.
    async fn insert(&self, session: &Session) -> StoreResult<()>;

    /// Look up a session together with its owning user
    async fn find_by_id_with_user(&self, id: &str) -> StoreResult<Option<(Session, User)>>;

    /// Set a new expiry. Succeeds without effect if the session is gone.
    async fn update_expiry(&self, id: &str, expires_at: DateTime<Utc>) -> StoreResult<()>;

    /// Delete a session. Deleting a missing id is not an error.
    async fn delete_by_id(&self, id: &str) -> StoreResult<()>;

    /// Delete every session expired at `now`, returning how many were removed
    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

/// SQLx-based session repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    /// Create a new SQLx session repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn insert(&self, session: &Session) -> StoreResult<()> {
        let sql = "INSERT INTO sessions (id, user_id, expires_at) VALUES (?, ?, ?)";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .execute(pool)
                    .await?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(&session.id)
                    .bind(session.user_id)
                    .bind(session.expires_at)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    async fn find_by_id_with_user(&self, id: &str) -> StoreResult<Option<(Session, User)>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => find_session_with_user_sqlite(pool, id).await,
            Backend::Mysql(pool) => find_session_with_user_mysql(pool, id).await,
        }
    }

    async fn update_expiry(&self, id: &str, expires_at: DateTime<Utc>) -> StoreResult<()> {
        let sql = "UPDATE sessions SET expires_at = ? WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql).bind(expires_at).bind(id).execute(pool).await?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql).bind(expires_at).bind(id).execute(pool).await?;
            }
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        let sql = "DELETE FROM sessions WHERE id = ?";
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql).bind(id).execute(pool).await?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql).bind(id).execute(pool).await?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let sql = "DELETE FROM sessions WHERE expires_at <= ?";
        let result = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(now).execute(pool).await?.rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(now).execute(pool).await?.rows_affected(),
        };
        Ok(result)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn find_session_with_user_sqlite(
    pool: &SqlitePool,
    id: &str,
) -> StoreResult<Option<(Session, User)>> {
    let row = sqlx::query(SELECT_SESSION_WITH_USER)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let session = Session {
                id: row.try_get("session_id")?,
                user_id: row.try_get("session_user_id")?,
                expires_at: row.try_get("session_expires_at")?,
            };
            Ok(Some((session, row_to_user_sqlite(&row)?)))
        }
        None => Ok(None),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn find_session_with_user_mysql(
    pool: &MySqlPool,
    id: &str,
) -> StoreResult<Option<(Session, User)>> {
    let row = sqlx::query(SELECT_SESSION_WITH_USER)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let session = Session {
                id: row.try_get("session_id")?,
                user_id: row.try_get("session_user_id")?,
                expires_at: row.try_get("session_expires_at")?,
            };
            Ok(Some((session, row_to_user_mysql(&row)?)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations, StoreError};
    use chrono::{Duration, TimeZone};

    async fn setup_test_repo() -> (SqlxSessionRepository, User) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let user = users
            .create(&User::new(
                "agent".to_string(),
                "agent@example.com".to_string(),
                "$argon2id$hash".to_string(),
            ))
            .await
            .expect("Failed to create user");

        (SqlxSessionRepository::new(pool), user)
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap()
    }

    fn test_session(id: &str, user_id: i64, expires_at: DateTime<Utc>) -> Session {
        Session {
            id: id.to_string(),
            user_id,
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_with_user() {
        let (repo, user) = setup_test_repo().await;
        let session = test_session("a1", user.id, base_time());

        repo.insert(&session).await.expect("Failed to insert session");

        let (found, owner) = repo
            .find_by_id_with_user("a1")
            .await
            .expect("Failed to find session")
            .expect("Session not found");

        assert_eq!(found, session);
        assert_eq!(owner.id, user.id);
        assert_eq!(owner.username, "agent");
    }

    #[tokio::test]
    async fn test_find_missing_session_is_none() {
        let (repo, _user) = setup_test_repo().await;

        let found = repo.find_by_id_with_user("missing").await.expect("lookup");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_conflict() {
        let (repo, user) = setup_test_repo().await;
        let session = test_session("dup", user.id, base_time());
        repo.insert(&session).await.unwrap();

        let later = test_session("dup", user.id, base_time() + Duration::days(1));
        let result = repo.insert(&later).await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));

        // The original row is untouched
        let (found, _) = repo.find_by_id_with_user("dup").await.unwrap().unwrap();
        assert_eq!(found.expires_at, base_time());
    }

    #[tokio::test]
    async fn test_update_expiry() {
        let (repo, user) = setup_test_repo().await;
        repo.insert(&test_session("s", user.id, base_time())).await.unwrap();

        let renewed = base_time() + Duration::days(30);
        repo.update_expiry("s", renewed).await.expect("Failed to update");

        let (found, _) = repo.find_by_id_with_user("s").await.unwrap().unwrap();
        assert_eq!(found.expires_at, renewed);
    }

    #[tokio::test]
    async fn test_update_expiry_of_missing_session_succeeds() {
        let (repo, _user) = setup_test_repo().await;

        repo.update_expiry("gone", base_time())
            .await
            .expect("Updating a vanished session should not fail");

        assert!(repo.find_by_id_with_user("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (repo, user) = setup_test_repo().await;
        repo.insert(&test_session("s", user.id, base_time())).await.unwrap();

        repo.delete_by_id("s").await.expect("first delete");
        repo.delete_by_id("s").await.expect("second delete");

        assert!(repo.find_by_id_with_user("s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (repo, user) = setup_test_repo().await;
        let now = base_time();
        repo.insert(&test_session("old", user.id, now - Duration::days(1)))
            .await
            .unwrap();
        repo.insert(&test_session("edge", user.id, now)).await.unwrap();
        repo.insert(&test_session("live", user.id, now + Duration::days(1)))
            .await
            .unwrap();

        let removed = repo.delete_expired(now).await.expect("Failed to purge");

        assert_eq!(removed, 2);
        assert!(repo.find_by_id_with_user("old").await.unwrap().is_none());
        assert!(repo.find_by_id_with_user("edge").await.unwrap().is_none());
        assert!(repo.find_by_id_with_user("live").await.unwrap().is_some());
    }
}
