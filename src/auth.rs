//! Back-office credentials and cookie sessions.
//!
//! Passwords are stored as `sha256$<salt>$<digest>` with base64 encoded
//! parts. Session cookies carry a random token; only its SHA-256 is
//! persisted, so a leaked database cannot be replayed as a cookie.

use std::sync::Arc;

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use rand::RngCore;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{
    AdminBootstrapConfig, MAX_SESSION_AGE_SECS, MIN_PASSWORD_LEN, SessionConfig,
};
use crate::db::{AdminStore, AdminUser, DatabaseError, NewAdminSession, NewAdminUser};

const HASH_SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;
const TOKEN_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("admin {0} already exists")]
    AdminExists(String),
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rng().fill_bytes(&mut bytes);
    bytes
}

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

pub fn hash_password(password: &str) -> String {
    let salt = random_bytes::<SALT_LEN>();
    format!(
        "{HASH_SCHEME}${}${}",
        BASE64_URL_SAFE_NO_PAD.encode(salt),
        BASE64_URL_SAFE_NO_PAD.encode(digest(&salt, password))
    )
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(scheme), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }

    let (Ok(salt), Ok(expected)) = (
        BASE64_URL_SAFE_NO_PAD.decode(salt),
        BASE64_URL_SAFE_NO_PAD.decode(expected),
    ) else {
        return false;
    };

    constant_time_eq(&digest(&salt, password), &expected)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn generate_session_token() -> String {
    BASE64_URL_SAFE_NO_PAD.encode(random_bytes::<TOKEN_LEN>())
}

pub fn hash_token(token: &str) -> String {
    BASE64_URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AdminStore>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(store: Arc<dyn AdminStore>, session: &SessionConfig) -> Self {
        Self {
            store,
            session_ttl: Duration::seconds(session.max_age_secs.clamp(1, MAX_SESSION_AGE_SECS)),
        }
    }

    pub async fn admin_count(&self) -> Result<i64, AuthError> {
        Ok(self.store.count_admins().await?)
    }

    /// Checks the credentials and opens a session, returning the raw token
    /// for the cookie.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(AdminUser, String), AuthError> {
        let admin = self.store.get_admin_by_username(username.trim()).await?;

        let Some(admin) = admin.filter(|a| a.is_active) else {
            // Same hashing cost whether or not the account exists.
            let _ = verify_password(password, &hash_password("placeholder"));
            warn!("login rejected for unknown or inactive admin {}", username);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &admin.password_hash) {
            warn!("login rejected for admin {}: wrong password", admin.username);
            return Err(AuthError::InvalidCredentials);
        }

        let token = generate_session_token();
        self.store
            .create_session(&NewAdminSession {
                token_hash: hash_token(&token),
                admin_user_id: admin.id,
                expires_at: Utc::now() + self.session_ttl,
            })
            .await?;

        info!("admin {} logged in", admin.username);
        Ok((admin, token))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        self.store.delete_session(&hash_token(token)).await?;
        Ok(())
    }

    pub async fn authenticate(&self, token: &str) -> Result<Option<AdminUser>, AuthError> {
        if token.is_empty() {
            return Ok(None);
        }
        let admin = self
            .store
            .get_admin_by_session(&hash_token(token), Utc::now())
            .await?;
        Ok(admin)
    }

    pub async fn create_admin(
        &self,
        username: &str,
        password: &str,
        email: Option<&str>,
    ) -> Result<i64, AuthError> {
        let username = username.trim();
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        if self.store.get_admin_by_username(username).await?.is_some() {
            return Err(AuthError::AdminExists(username.to_string()));
        }

        let id = self
            .store
            .create_admin(&NewAdminUser {
                username: username.to_string(),
                email: email.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string),
                password_hash: hash_password(password),
            })
            .await?;

        info!("created admin {} (id {})", username, id);
        Ok(id)
    }

    /// Creates the configured admin account unless one with that username
    /// already exists. Returns whether an account was created.
    pub async fn ensure_bootstrap_admin(
        &self,
        bootstrap: &AdminBootstrapConfig,
    ) -> Result<bool, AuthError> {
        match self
            .create_admin(
                &bootstrap.username,
                bootstrap.password.expose_secret(),
                bootstrap.email.as_deref(),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(AuthError::AdminExists(_)) => {
                debug!("bootstrap admin {} already present", bootstrap.username);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub async fn purge_expired(&self) -> Result<usize, AuthError> {
        let removed = self.store.purge_expired_sessions(Utc::now()).await?;
        if removed > 0 {
            debug!("purged {} expired admin sessions", removed);
        }
        Ok(removed)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use chrono::Utc;
    use secrecy::SecretString;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::{DatabaseConfig, SessionConfig};
    use crate::db::DatabaseManager;

    #[test]
    fn password_hash_verifies_only_original_password() {
        let stored = hash_password("correct horse");

        assert!(stored.starts_with("sha256$"));
        assert!(verify_password("correct horse", &stored));
        assert!(!verify_password("correct horse ", &stored));
        assert!(!verify_password("correct horse", "plain-text"));
    }

    #[test]
    fn password_hash_is_salted() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn session_tokens_are_unique_and_hashed() {
        let a = generate_session_token();
        let b = generate_session_token();

        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert_eq!(hash_token(&a), hash_token(&a));
        assert_ne!(hash_token(&a), a);
    }

    async fn service(file: &NamedTempFile, max_age_secs: i64) -> AuthService {
        let config = DatabaseConfig::sqlite_file(file.path().to_string_lossy());
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        let session = SessionConfig {
            max_age_secs,
            ..SessionConfig::default()
        };
        AuthService::new(manager.admin_store(), &session)
    }

    #[tokio::test]
    async fn login_authenticate_logout_cycle() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let auth = service(&file, 3600).await;
        auth.create_admin("owner", "s3cret-pass", Some("owner@example.com"))
            .await
            .expect("create admin");

        let (admin, token) = auth.login("owner", "s3cret-pass").await.expect("login");
        assert_eq!(admin.email.as_deref(), Some("owner@example.com"));

        let resolved = auth.authenticate(&token).await.expect("authenticate");
        assert_eq!(resolved.map(|a| a.username), Some("owner".to_string()));

        auth.logout(&token).await.expect("logout");
        assert!(auth.authenticate(&token).await.expect("after logout").is_none());
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_unknown_user() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let auth = service(&file, 3600).await;
        auth.create_admin("owner", "s3cret-pass", None).await.unwrap();

        assert!(matches!(
            auth.login("owner", "nope-nope").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("ghost", "s3cret-pass").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn create_admin_rejects_duplicates_and_short_passwords() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let auth = service(&file, 3600).await;

        assert!(matches!(
            auth.create_admin("owner", "short", None).await,
            Err(AuthError::WeakPassword)
        ));
        auth.create_admin("owner", "long-enough", None).await.unwrap();
        assert!(matches!(
            auth.create_admin("owner", "long-enough", None).await,
            Err(AuthError::AdminExists(_))
        ));
    }

    #[tokio::test]
    async fn bootstrap_admin_is_created_once() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let auth = service(&file, 3600).await;
        let bootstrap = AdminBootstrapConfig {
            username: "owner".to_string(),
            password: SecretString::from("bootstrap-pass".to_string()),
            email: None,
        };

        assert_eq!(auth.admin_count().await.unwrap(), 0);
        assert!(auth.ensure_bootstrap_admin(&bootstrap).await.unwrap());
        assert!(!auth.ensure_bootstrap_admin(&bootstrap).await.unwrap());
        assert_eq!(auth.admin_count().await.unwrap(), 1);
        assert!(auth.login("owner", "bootstrap-pass").await.is_ok());
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_purged() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let auth = service(&file, 3600).await;
        auth.create_admin("owner", "s3cret-pass", None).await.unwrap();
        let admin = auth.store.get_admin_by_username("owner").await.unwrap().unwrap();

        let token = generate_session_token();
        auth.store
            .create_session(&NewAdminSession {
                token_hash: hash_token(&token),
                admin_user_id: admin.id,
                expires_at: Utc::now() - Duration::seconds(5),
            })
            .await
            .unwrap();

        assert!(auth.authenticate(&token).await.unwrap().is_none());
        assert_eq!(auth.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn session_lifetime_is_capped_at_a_year() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let auth = service(&file, i64::MAX).await;
        assert_eq!(auth.session_ttl, Duration::days(365));

        auth.create_admin("owner", "s3cret-pass", None).await.unwrap();
        let (_, token) = auth.login("owner", "s3cret-pass").await.expect("login");
        assert!(auth.authenticate(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn empty_token_is_not_a_session() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let auth = service(&file, 3600).await;
        assert!(auth.authenticate("").await.unwrap().is_none());
    }
}
