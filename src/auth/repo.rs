use async_trait::async_trait;
use sqlx::PgPool;
#[cfg(test)]
use time::OffsetDateTime;
#[cfg(test)]
use tokio::sync::RwLock;

use crate::auth::repo_types::{Credential, NewCredential};
use crate::db::{is_unique_violation, StoreError};

/// Persistence for user records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// `StoreError::NotFound` when no user has this email.
    async fn find_by_email(&self, email: &str) -> Result<Credential, StoreError>;
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;
    /// `StoreError::UniqueViolation` when the email is already taken.
    async fn insert(&self, new: NewCredential) -> Result<Credential, StoreError>;
    async fn update_email(&self, user_id: i64, new_email: &str) -> Result<u64, StoreError>;
    async fn update_username(&self, user_id: i64, new_username: &str) -> Result<u64, StoreError>;
}

pub struct PgCredentialStore {
    db: PgPool,
}

impl PgCredentialStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Credential, StoreError> {
        sqlx::query_as::<_, Credential>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)"#)
                .bind(email)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    async fn insert(&self, new: NewCredential) -> Result<Credential, StoreError> {
        sqlx::query_as::<_, Credential>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(into_store_error)
    }

    async fn update_email(&self, user_id: i64, new_email: &str) -> Result<u64, StoreError> {
        let res = sqlx::query(r#"UPDATE users SET email = $1 WHERE id = $2"#)
            .bind(new_email)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(into_store_error)?;
        Ok(res.rows_affected())
    }

    async fn update_username(&self, user_id: i64, new_username: &str) -> Result<u64, StoreError> {
        let res = sqlx::query(r#"UPDATE users SET username = $1 WHERE id = $2"#)
            .bind(new_username)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(into_store_error)?;
        Ok(res.rows_affected())
    }
}

fn into_store_error(e: sqlx::Error) -> StoreError {
    if is_unique_violation(&e) {
        StoreError::UniqueViolation
    } else {
        StoreError::Database(e)
    }
}

/// In-process store used by tests and `AppState::fake`.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<Vec<Credential>>,
}

#[cfg(test)]
#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Credential, StoreError> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.users.read().await.iter().any(|u| u.email == email))
    }

    async fn insert(&self, new: NewCredential) -> Result<Credential, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::UniqueViolation);
        }
        let user = Credential {
            id: users.len() as i64 + 1,
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn update_email(&self, user_id: i64, new_email: &str) -> Result<u64, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == new_email && u.id != user_id) {
            return Err(StoreError::UniqueViolation);
        }
        Ok(match users.iter_mut().find(|u| u.id == user_id) {
            Some(u) => {
                u.email = new_email.to_string();
                1
            }
            None => 0,
        })
    }

    async fn update_username(&self, user_id: i64, new_username: &str) -> Result<u64, StoreError> {
        let mut users = self.users.write().await;
        Ok(match users.iter_mut().find(|u| u.id == user_id) {
            Some(u) => {
                u.username = new_username.to_string();
                1
            }
            None => 0,
        })
    }
}
