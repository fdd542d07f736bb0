use std::sync::Arc;

use anyhow::Context;
use subtle::ConstantTimeEq;
use tracing::{error, info, warn};

use super::{
    extractors::AuthContext,
    jwt::JwtKeys,
    password::PasswordHasher,
    repo::CredentialStore,
    repo_types::{Credential, NewCredential},
};
use crate::{
    db::StoreError,
    error::{AppError, AppResult},
};

/// Registration, login and self-service account updates.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(users: Arc<dyn CredentialStore>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        Self { users, hasher, keys }
    }

    /// Creates the account. Does not log the user in.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AppResult<Credential> {
        let username = username.trim();
        let email = normalize_email(email);
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email, username and password are required".into(),
            ));
        }

        let taken = self
            .users
            .exists_by_email(&email)
            .await
            .context("check existing email")?;
        if taken {
            warn!(%email, "email already registered");
            return Err(AppError::Conflict);
        }

        let password_hash = self
            .hasher
            .hash_blocking(password.to_string())
            .await
            .context("hash password")?;

        let user = self
            .users
            .insert(NewCredential {
                username: username.to_string(),
                email,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation => AppError::Conflict,
                other => AppError::Internal(anyhow::Error::new(other).context("insert user")),
            })?;

        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Returns a signed bearer token. Every credential failure maps to the same
    /// `InvalidCredentials`; only the log line tells them apart.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<String> {
        let email = normalize_email(email);

        let user = match self.users.find_by_email(&email).await {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                warn!(%email, reason = "unknown_email", "login rejected");
                return Err(AppError::InvalidCredentials);
            }
            Err(e) => {
                return Err(AppError::Internal(
                    anyhow::Error::new(e).context("find user by email"),
                ))
            }
        };

        let ok = self
            .hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await
            .context("verify password")?;
        if !ok {
            warn!(%email, user_id = user.id, reason = "bad_password", "login rejected");
            return Err(AppError::InvalidCredentials);
        }

        if !bool::from(user.email.as_bytes().ct_eq(email.as_bytes())) {
            warn!(user_id = user.id, reason = "email_mismatch", "login rejected");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.issue(user.id, &user.username).map_err(|e| {
            error!(error = %e, user_id = user.id, "jwt sign failed");
            AppError::Internal(anyhow::Error::new(e))
        })?;

        info!(user_id = user.id, "user logged in");
        Ok(token)
    }

    pub async fn update_email(&self, ctx: AuthContext, new_email: &str) -> AppResult<()> {
        let new_email = normalize_email(new_email);
        if new_email.is_empty() {
            return Err(AppError::Validation("email is required".into()));
        }
        let rows = self
            .users
            .update_email(ctx.user_id, &new_email)
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation => AppError::Conflict,
                other => AppError::Internal(anyhow::Error::new(other).context("update email")),
            })?;
        if rows == 0 {
            return Err(AppError::NotFoundOrNotOwned);
        }
        info!(user_id = ctx.user_id, "email updated");
        Ok(())
    }

    pub async fn update_username(&self, ctx: AuthContext, new_username: &str) -> AppResult<()> {
        let new_username = new_username.trim();
        if new_username.is_empty() {
            return Err(AppError::Validation("username is required".into()));
        }
        let rows = self
            .users
            .update_username(ctx.user_id, new_username)
            .await
            .context("update username")?;
        if rows == 0 {
            return Err(AppError::NotFoundOrNotOwned);
        }
        info!(user_id = ctx.user_id, "username updated");
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
pub(crate) fn test_service(keys: JwtKeys) -> AuthService {
    use super::{password::test_hasher, repo::MemoryCredentialStore};

    AuthService::new(
        Arc::new(MemoryCredentialStore::default()),
        test_hasher(),
        keys,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::test_keys;
    use async_trait::async_trait;
    use jsonwebtoken::Algorithm;

    fn service() -> (AuthService, JwtKeys) {
        let keys = test_keys("service-secret", Algorithm::HS256);
        (test_service(keys.clone()), keys)
    }

    #[tokio::test]
    async fn register_then_login_yields_token_for_new_user() {
        let (svc, keys) = service();
        let user = svc.register("alice", "alice@example.com", "pw1").await.unwrap();

        let token = svc.login("alice@example.com", "pw1").await.unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.user_id(), Some(user.id));
        assert_eq!(claims.name, "alice");
        assert!(!claims.admin);
    }

    #[tokio::test]
    async fn register_rejects_empty_fields() {
        let (svc, _) = service();
        for (u, e, p) in [
            ("", "a@example.com", "pw"),
            ("a", "", "pw"),
            ("a", "a@example.com", ""),
            ("   ", "a@example.com", "pw"),
        ] {
            let err = svc.register(u, e, p).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{u:?} {e:?} {p:?}");
        }
    }

    #[tokio::test]
    async fn register_duplicate_email_is_conflict() {
        let (svc, _) = service();
        svc.register("alice", "alice@example.com", "pw1").await.unwrap();

        let err = svc.register("alice2", "alice@example.com", "pw2").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict));

        let err = svc.register("alice", "ALICE@example.com ", "other").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict));
    }

    #[tokio::test]
    async fn login_wrong_password_is_invalid_credentials() {
        let (svc, _) = service();
        svc.register("alice", "alice@example.com", "pw1").await.unwrap();
        for wrong in ["pw2", "", "PW1", "pw1 "] {
            let err = svc.login("alice@example.com", wrong).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn login_unknown_email_is_invalid_credentials() {
        let (svc, _) = service();
        let err = svc.login("ghost@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
        assert_eq!(err.to_string(), AppError::InvalidCredentials.to_string());
    }

    /// Store whose lookup returns a record for a different email.
    struct InconsistentStore(Credential);

    #[async_trait]
    impl CredentialStore for InconsistentStore {
        async fn find_by_email(&self, _email: &str) -> Result<Credential, StoreError> {
            Ok(self.0.clone())
        }
        async fn exists_by_email(&self, _email: &str) -> Result<bool, StoreError> {
            Ok(true)
        }
        async fn insert(&self, _new: NewCredential) -> Result<Credential, StoreError> {
            Err(StoreError::UniqueViolation)
        }
        async fn update_email(&self, _id: i64, _e: &str) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn update_username(&self, _id: i64, _u: &str) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn login_rejects_email_mismatch_from_store() {
        let hasher = crate::auth::password::test_hasher();
        let record = Credential {
            id: 1,
            username: "bob".into(),
            email: "bob@example.com".into(),
            password_hash: hasher.hash("pw").unwrap(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        let svc = AuthService::new(
            Arc::new(InconsistentStore(record)),
            hasher,
            test_keys("s", Algorithm::HS256),
        );
        let err = svc.login("alice@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    /// Another request inserted the same email between the existence check
    /// and the insert.
    struct RacingStore;

    #[async_trait]
    impl CredentialStore for RacingStore {
        async fn find_by_email(&self, _email: &str) -> Result<Credential, StoreError> {
            Err(StoreError::NotFound)
        }
        async fn exists_by_email(&self, _email: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn insert(&self, _new: NewCredential) -> Result<Credential, StoreError> {
            Err(StoreError::UniqueViolation)
        }
        async fn update_email(&self, _id: i64, _e: &str) -> Result<u64, StoreError> {
            Ok(0)
        }
        async fn update_username(&self, _id: i64, _u: &str) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn register_race_on_insert_is_conflict() {
        let svc = AuthService::new(
            Arc::new(RacingStore),
            crate::auth::password::test_hasher(),
            test_keys("s", Algorithm::HS256),
        );
        let err = svc.register("alice", "alice@example.com", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict));
    }

    #[tokio::test]
    async fn login_with_unrepresentable_expiry_is_internal() {
        let keys = crate::auth::jwt::test_keys_with_ttl("s", Algorithm::HS256, i64::MAX);
        let svc = test_service(keys);
        svc.register("alice", "alice@example.com", "pw1").await.unwrap();
        assert!(matches!(
            svc.login("alice@example.com", "pw1").await.unwrap_err(),
            AppError::Internal(_)
        ));
    }

    struct BrokenStore;

    #[async_trait]
    impl CredentialStore for BrokenStore {
        async fn find_by_email(&self, _email: &str) -> Result<Credential, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn exists_by_email(&self, _email: &str) -> Result<bool, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn insert(&self, _new: NewCredential) -> Result<Credential, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn update_email(&self, _id: i64, _e: &str) -> Result<u64, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
        async fn update_username(&self, _id: i64, _u: &str) -> Result<u64, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn store_outage_is_internal_not_credentials() {
        let svc = AuthService::new(
            Arc::new(BrokenStore),
            crate::auth::password::test_hasher(),
            test_keys("s", Algorithm::HS256),
        );
        assert!(matches!(
            svc.login("a@example.com", "pw").await.unwrap_err(),
            AppError::Internal(_)
        ));
        assert!(matches!(
            svc.register("a", "a@example.com", "pw").await.unwrap_err(),
            AppError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn account_updates_apply_to_token_identity() {
        let (svc, _) = service();
        let alice = svc.register("alice", "alice@example.com", "pw1").await.unwrap();
        svc.register("bob", "bob@example.com", "pw2").await.unwrap();
        let ctx = AuthContext { user_id: alice.id };

        let err = svc.update_email(ctx, "bob@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict));

        svc.update_email(ctx, "alice@new.example.com").await.unwrap();
        svc.update_username(ctx, "alice-renamed").await.unwrap();
        assert!(svc.login("alice@example.com", "pw1").await.is_err());
        assert!(svc.login("alice@new.example.com", "pw1").await.is_ok());

        let ghost = AuthContext { user_id: 999 };
        assert!(matches!(
            svc.update_username(ghost, "ghost").await.unwrap_err(),
            AppError::NotFoundOrNotOwned
        ));
        assert!(matches!(
            svc.update_username(ctx, " ").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }
}
