use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::roles::RoleSet;
use crate::users::repo_types::{User, UserRow};

/// Returned (inside `anyhow::Error`) when a write would give two users the
/// same email.
#[derive(Debug, thiserror::Error)]
#[error("email {0} is already taken")]
pub struct EmailTaken(pub String);

fn unique_email(err: sqlx::Error, email: &str, action: &'static str) -> anyhow::Error {
    if err
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        EmailTaken(email.to_string()).into()
    } else {
        anyhow::Error::new(err).context(action)
    }
}

/// Storage contract the auth core depends on.
///
/// Lookups ignore the case of the stored email. Mutations return the number
/// of affected rows; `create` and `update_email` fail with [`EmailTaken`]
/// when the email belongs to another user.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Active (not soft-deleted) user with this email.
    async fn find_one_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// User with this email, banned or not.
    async fn find_any_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, email: &str, password_hash: &str, roles: &RoleSet) -> anyhow::Result<u64>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<u64>;
    async fn update_email(&self, old_email: &str, new_email: &str) -> anyhow::Result<u64>;
    async fn soft_delete(&self, email: &str) -> anyhow::Result<u64>;
    async fn remove_soft_delete(&self, email: &str) -> anyhow::Result<u64>;
    async fn hard_delete(&self, id: Uuid) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_one_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, roles, deleted_at, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1) AND deleted_at IS NULL
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find active user by email")?;
        Ok(row.map(User::from))
    }

    async fn find_any_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, password_hash, roles, deleted_at, created_at, updated_at
            FROM users
            WHERE lower(email) = lower($1)
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(row.map(User::from))
    }

    async fn create(&self, email: &str, password_hash: &str, roles: &RoleSet) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, roles)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(roles.to_strings())
        .execute(&self.db)
        .await
        .map_err(|e| unique_email(e, email, "insert user"))?;
        Ok(res.rows_affected())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.db)
        .await
        .context("update password")?;
        Ok(res.rows_affected())
    }

    async fn update_email(&self, old_email: &str, new_email: &str) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET email = $1, updated_at = NOW()
            WHERE email = $2
            "#,
        )
        .bind(new_email)
        .bind(old_email)
        .execute(&self.db)
        .await
        .map_err(|e| unique_email(e, new_email, "update email"))?;
        Ok(res.rows_affected())
    }

    async fn soft_delete(&self, email: &str) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE email = $1
            "#,
        )
        .bind(email)
        .execute(&self.db)
        .await
        .context("soft delete user")?;
        Ok(res.rows_affected())
    }

    async fn remove_soft_delete(&self, email: &str) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = NULL, updated_at = NOW()
            WHERE email = $1
            "#,
        )
        .bind(email)
        .execute(&self.db)
        .await
        .context("restore soft deleted user")?;
        Ok(res.rows_affected())
    }

    async fn hard_delete(&self, id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete user")?;
        Ok(res.rows_affected())
    }
}
