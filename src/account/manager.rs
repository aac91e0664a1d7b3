/// User manager implementation using runtime queries
use crate::{
    account::{UserProfile, ValidatedSession},
    config::ServerConfig,
    db::models::{Role, Session, User},
    error::{HostError, HostResult},
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// User account service
pub struct UserManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl UserManager {
    /// Create a new user manager
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Create a new user with the free-tier defaults and an INACTIVE/FREE
    /// subscription row
    pub async fn signup(&self, name: &str, email: &str, password: &str) -> HostResult<User> {
        if self.email_exists(email).await? {
            return Err(HostError::Conflict("Email already registered".to_string()));
        }

        let password_hash = Self::hash_password(password)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let storage_limit = self.config.limits.free_storage_limit;

        let mut tx = self.db.begin().await.map_err(HostError::Database)?;

        sqlx::query(
            "INSERT INTO user (id, name, email, password_hash, role, is_banned, storage_used, storage_limit, created_at)
             VALUES (?1, ?2, ?3, ?4, 'USER', 0, 0, ?5, ?6)",
        )
        .bind(&id)
        .bind(name)
        .bind(email)
        .bind(&password_hash)
        .bind(storage_limit)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(HostError::Database)?;

        sqlx::query(
            "INSERT INTO subscription (id, user_id, plan, status, created_at)
             VALUES (?1, ?2, 'FREE', 'INACTIVE', ?3)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(HostError::Database)?;

        tx.commit().await.map_err(HostError::Database)?;

        Ok(User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role: Role::User,
            is_banned: false,
            storage_used: 0,
            storage_limit,
            created_at: now,
        })
    }

    /// Authenticate user and create a session
    pub async fn login(&self, email: &str, password: &str) -> HostResult<(User, Session)> {
        let user = self.get_user_by_email(email).await.map_err(|_| {
            // Don't reveal whether the email exists
            HostError::Authentication("Invalid credentials".to_string())
        })?;

        if user.is_banned {
            return Err(HostError::Authorization("Account is banned".to_string()));
        }

        if !Self::verify_password(password, &user.password_hash)? {
            return Err(HostError::Authentication("Invalid credentials".to_string()));
        }

        let session = self.create_session(&user.id).await?;

        Ok((user, session))
    }

    /// Create a session for a user
    pub async fn create_session(&self, user_id: &str) -> HostResult<Session> {
        let session_id = Uuid::new_v4().to_string();

        let access_token = self.generate_token(user_id, &session_id, "access")?;
        let refresh_token_str = self.generate_token(user_id, &session_id, "refresh")?;

        let now = Utc::now();
        let expires_at = now + Duration::hours(1); // Access token expires in 1 hour

        sqlx::query(
            "INSERT INTO session (id, user_id, access_token, refresh_token, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(&access_token)
        .bind(&refresh_token_str)
        .bind(now)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(HostError::Database)?;

        let refresh_expires = now + Duration::days(30);

        sqlx::query(
            "INSERT INTO refresh_token (id, user_id, token, created_at, expires_at, used)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&refresh_token_str)
        .bind(now)
        .bind(refresh_expires)
        .execute(&self.db)
        .await
        .map_err(HostError::Database)?;

        Ok(Session {
            id: session_id,
            user_id: user_id.to_string(),
            access_token,
            refresh_token: refresh_token_str,
            created_at: now,
            expires_at,
        })
    }

    /// Validate access token and return session info
    pub async fn validate_access_token(&self, token: &str) -> HostResult<ValidatedSession> {
        let row: Option<(String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT id, user_id, expires_at FROM session WHERE access_token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .map_err(HostError::Database)?;

        let (session_id, user_id, expires_at) = row
            .ok_or_else(|| HostError::Authentication("Invalid or expired session".to_string()))?;

        if Utc::now() > expires_at {
            return Err(HostError::Authentication("Session expired".to_string()));
        }

        Ok(ValidatedSession {
            user_id,
            session_id,
        })
    }

    /// Delete a session (logout)
    pub async fn delete_session(&self, session_id: &str) -> HostResult<()> {
        sqlx::query("DELETE FROM session WHERE id = ?1")
            .bind(session_id)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?;

        Ok(())
    }

    /// Refresh session tokens, rotating the old refresh token
    pub async fn refresh_session(&self, refresh_token: &str) -> HostResult<Session> {
        let row: Option<(String, String, DateTime<Utc>, bool)> = sqlx::query_as(
            "SELECT id, user_id, expires_at, used FROM refresh_token WHERE token = ?1",
        )
        .bind(refresh_token)
        .fetch_optional(&self.db)
        .await
        .map_err(HostError::Database)?;

        let (token_id, user_id, expires_at, used) = row
            .ok_or_else(|| HostError::Authentication("Invalid refresh token".to_string()))?;

        if used {
            return Err(HostError::Authentication(
                "Refresh token already used".to_string(),
            ));
        }

        if Utc::now() > expires_at {
            return Err(HostError::Authentication("Refresh token expired".to_string()));
        }

        sqlx::query("UPDATE refresh_token SET used = 1, used_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(&token_id)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?;

        self.create_session(&user_id).await
    }

    /// Get user by id
    pub async fn get_user(&self, id: &str) -> HostResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, is_banned, storage_used, storage_limit, created_at
             FROM user WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(HostError::Database)?
        .ok_or_else(|| HostError::NotFound("User not found".to_string()))
    }

    /// Get user by email
    pub async fn get_user_by_email(&self, email: &str) -> HostResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, is_banned, storage_used, storage_limit, created_at
             FROM user WHERE email = ?1",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(HostError::Database)?
        .ok_or_else(|| HostError::NotFound("User not found".to_string()))
    }

    /// Caller's profile with usage, owned-asset count, and plan flag
    pub async fn get_profile(&self, user_id: &str) -> HostResult<UserProfile> {
        let user = self.get_user(user_id).await?;

        let image_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM asset WHERE user_id = ?1")
                .bind(user_id)
                .fetch_one(&self.db)
                .await
                .map_err(HostError::Database)?;

        let is_premium: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM subscription WHERE user_id = ?1 AND status = 'ACTIVE'",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await
        .map_err(HostError::Database)?;

        Ok(UserProfile {
            name: user.name,
            email: user.email,
            storage_used: user.storage_used,
            storage_limit: user.storage_limit,
            image_count,
            is_premium,
        })
    }

    /// Set or clear the ban flag
    pub async fn set_banned(&self, user_id: &str, banned: bool) -> HostResult<()> {
        let result = sqlx::query("UPDATE user SET is_banned = ?1 WHERE id = ?2")
            .bind(banned)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?;

        if result.rows_affected() == 0 {
            return Err(HostError::NotFound("User not found".to_string()));
        }

        Ok(())
    }

    /// Delete a user row. Owned asset rows, sessions, and the subscription
    /// cascade via foreign keys; the caller is responsible for removing
    /// stored bytes first.
    pub async fn delete_user(&self, user_id: &str) -> HostResult<()> {
        let result = sqlx::query("DELETE FROM user WHERE id = ?1")
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?;

        if result.rows_affected() == 0 {
            return Err(HostError::NotFound("User not found".to_string()));
        }

        Ok(())
    }

    /// Delete expired sessions and spent or expired refresh tokens.
    /// Returns (sessions deleted, refresh tokens deleted).
    pub async fn cleanup_expired_sessions(&self) -> HostResult<(u64, u64)> {
        let now = Utc::now();

        let sessions = sqlx::query("DELETE FROM session WHERE expires_at < ?1")
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?
            .rows_affected();

        let tokens = sqlx::query("DELETE FROM refresh_token WHERE expires_at < ?1 OR used = 1")
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(HostError::Database)?
            .rows_affected();

        Ok((sessions, tokens))
    }

    /// Hash a password with Argon2id
    fn hash_password(password: &str) -> HostResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| HostError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a stored hash
    fn verify_password(password: &str, hash: &str) -> HostResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| HostError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Generate a signed JWT carrying the user and session ids
    fn generate_token(&self, user_id: &str, session_id: &str, scope: &str) -> HostResult<String> {
        use jsonwebtoken::{encode, EncodingKey, Header};

        let exp = if scope == "refresh" {
            Utc::now() + Duration::days(30)
        } else {
            Utc::now() + Duration::hours(1)
        };

        let claims = serde_json::json!({
            "sub": user_id,
            "sid": session_id,
            "scope": scope,
            "iat": Utc::now().timestamp(),
            "exp": exp.timestamp(),
        });

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.authentication.jwt_secret.as_bytes()),
        )
        .map_err(|e| HostError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Check if email exists
    async fn email_exists(&self, email: &str) -> HostResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user WHERE email = ?1")
            .bind(email)
            .fetch_one(&self.db)
            .await
            .map_err(HostError::Database)?;

        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AuthConfig, BillingConfig, LimitConfig, LoggingConfig, NotifierConfig, RateLimitConfig,
        ServerConfig, ServiceConfig, StorageBackendConfig, StorageConfig,
    };

    fn test_config() -> Arc<ServerConfig> {
        Arc::new(ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                version: "test".to_string(),
                public_url: "http://localhost".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: ":memory:".into(),
                backend: StorageBackendConfig::Disk {
                    location: "./data/uploads".into(),
                },
            },
            authentication: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            },
            limits: LimitConfig {
                free_storage_limit: 500 * 1024 * 1024,
                premium_storage_limit: 25600 * 1024 * 1024,
                free_max_file_size: 5 * 1024 * 1024,
                premium_max_file_size: 100 * 1024 * 1024,
            },
            billing: BillingConfig {
                secret_key: None,
                webhook_secret: None,
                price_id: None,
            },
            notifier: NotifierConfig { webhook_url: None },
            rate_limit: RateLimitConfig { enabled: false },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        })
    }

    async fn test_manager() -> UserManager {
        let pool = crate::db::test_pool().await;
        UserManager::new(pool, test_config())
    }

    #[tokio::test]
    async fn test_signup_creates_user_with_free_defaults() {
        let mgr = test_manager().await;

        let user = mgr.signup("Ann", "ann@x.com", "password1").await.unwrap();
        assert_eq!(user.storage_used, 0);
        assert_eq!(user.storage_limit, 500 * 1024 * 1024);
        assert_eq!(user.role, Role::User);
        assert!(!user.is_banned);

        // Subscription row starts INACTIVE/FREE
        let profile = mgr.get_profile(&user.id).await.unwrap();
        assert!(!profile.is_premium);
    }

    #[tokio::test]
    async fn test_signup_rejects_duplicate_email() {
        let mgr = test_manager().await;

        mgr.signup("Ann", "ann@x.com", "password1").await.unwrap();
        let err = mgr.signup("Ann2", "ann@x.com", "password2").await.unwrap_err();
        assert!(matches!(err, HostError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_login_and_validate_token() {
        let mgr = test_manager().await;

        let user = mgr.signup("Ann", "ann@x.com", "password1").await.unwrap();
        let (logged_in, session) = mgr.login("ann@x.com", "password1").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let validated = mgr.validate_access_token(&session.access_token).await.unwrap();
        assert_eq!(validated.user_id, user.id);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let mgr = test_manager().await;

        mgr.signup("Ann", "ann@x.com", "password1").await.unwrap();
        let err = mgr.login("ann@x.com", "wrong-password").await.unwrap_err();
        assert!(matches!(err, HostError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_banned_user_cannot_login() {
        let mgr = test_manager().await;

        let user = mgr.signup("Ann", "ann@x.com", "password1").await.unwrap();
        mgr.set_banned(&user.id, true).await.unwrap();

        let err = mgr.login("ann@x.com", "password1").await.unwrap_err();
        assert!(matches!(err, HostError::Authorization(_)));
    }

    #[tokio::test]
    async fn test_refresh_token_single_use() {
        let mgr = test_manager().await;

        let user = mgr.signup("Ann", "ann@x.com", "password1").await.unwrap();
        let session = mgr.create_session(&user.id).await.unwrap();

        let new_session = mgr.refresh_session(&session.refresh_token).await.unwrap();
        assert_ne!(new_session.access_token, session.access_token);

        // Second use of the same refresh token is rejected
        let err = mgr.refresh_session(&session.refresh_token).await.unwrap_err();
        assert!(matches!(err, HostError::Authentication(_)));
    }
}
