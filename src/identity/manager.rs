//! The companion manager that owns every creation path of the account
//! model.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::model::{Account, UnsavedAccount};
use super::password::hash_password_blocking;
use super::shape::IdentityShape;
use crate::config::SecurityConfig;
use crate::db::{AccountChanges, Store, is_unique_violation};
use crate::forms::FormErrors;
use crate::forms::fields::{clean_email, clean_username};

#[derive(Debug, Error)]
pub enum ManagerError {
    /// The storage layer refused the write because the username is taken.
    #[error("An account with username '{0}' already exists")]
    Integrity(String),

    #[error("Account {0} does not exist")]
    NotFound(i32),

    /// Field values the model's shape does not accept.
    #[error("Invalid account fields: {}", .0.summary())]
    Invalid(FormErrors),

    #[error("Failed to hash password: {0}")]
    Hashing(String),

    #[error("Database error: {0}")]
    Database(String),
}

#[async_trait]
pub trait AccountManager: Send + Sync {
    fn normalize_username(&self, username: &str) -> String {
        username.trim().to_string()
    }

    /// Lower-cases the domain part only; the local part may be case
    /// sensitive.
    fn normalize_email(&self, email: &str) -> String {
        let email = email.trim();
        match email.rsplit_once('@') {
            Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
            None => email.to_string(),
        }
    }

    /// Normalizes the identifying fields of a record created outside the
    /// forms. Implementations bound to a shape also check them against it.
    fn clean_identity(
        &self,
        username: &str,
        email: &str,
    ) -> Result<(String, String), ManagerError> {
        Ok((self.normalize_username(username), self.normalize_email(email)))
    }

    async fn hash_password(&self, password: &str) -> Result<String, ManagerError>;

    /// Persists exactly one new record, or nothing.
    async fn save_new(&self, account: UnsavedAccount) -> Result<Account, ManagerError>;

    /// Rewrites one existing record by id; never inserts.
    async fn save_existing(
        &self,
        id: i32,
        changes: AccountChanges,
    ) -> Result<Account, ManagerError>;

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, ManagerError> {
        let (username, email) = self.clean_identity(username, email)?;
        let password_hash = self.hash_password(password).await?;
        let account = UnsavedAccount::ordinary(username, email, password_hash);
        self.save_new(account).await
    }

    async fn create_superuser(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, ManagerError> {
        let (username, email) = self.clean_identity(username, email)?;
        let password_hash = self.hash_password(password).await?;
        let mut account = UnsavedAccount::ordinary(username, email, password_hash);
        account.is_staff = true;
        account.is_superuser = true;
        self.save_new(account).await
    }
}

pub struct SeaOrmAccountManager {
    store: Store,
    security: SecurityConfig,
    shape: &'static IdentityShape,
}

impl SeaOrmAccountManager {
    #[must_use]
    pub const fn new(
        store: Store,
        security: SecurityConfig,
        shape: &'static IdentityShape,
    ) -> Self {
        Self {
            store,
            security,
            shape,
        }
    }
}

#[async_trait]
impl AccountManager for SeaOrmAccountManager {
    fn clean_identity(
        &self,
        username: &str,
        email: &str,
    ) -> Result<(String, String), ManagerError> {
        let mut errors = FormErrors::new();

        let username = clean_username(self.shape, &self.normalize_username(username))
            .map_err(|e| errors.extend("username", e))
            .ok();
        let email = clean_email(self.shape, &self.normalize_email(email))
            .map_err(|e| errors.extend("email", e))
            .ok();

        match (username, email) {
            (Some(username), Some(email)) if errors.is_empty() => Ok((username, email)),
            _ => Err(ManagerError::Invalid(errors)),
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, ManagerError> {
        hash_password_blocking(password, &self.security)
            .await
            .map_err(|e| ManagerError::Hashing(e.to_string()))
    }

    async fn save_new(&self, account: UnsavedAccount) -> Result<Account, ManagerError> {
        let username = account.username.clone();
        let privileged = account.is_staff;

        let created = self.store.insert_account(account).await.map_err(|e| {
            if is_unique_violation(&e) {
                ManagerError::Integrity(username.clone())
            } else {
                ManagerError::Database(e.to_string())
            }
        })?;

        info!(
            account_id = created.id,
            privileged, "Created account '{}'", created.username
        );
        Ok(created)
    }

    async fn save_existing(
        &self,
        id: i32,
        changes: AccountChanges,
    ) -> Result<Account, ManagerError> {
        let username = changes.username.clone();

        self.store
            .update_account(id, changes)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ManagerError::Integrity(username.clone())
                } else {
                    ManagerError::Database(e.to_string())
                }
            })?
            .ok_or(ManagerError::NotFound(id))
    }
}
