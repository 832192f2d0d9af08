//! Domain service for account holders: signup, login, profile edits and
//! the password flows.

use thiserror::Error;

use crate::forms::{
    ChangeInput, CreationInput, FormError, FormErrors, PasswordChangeInput, SetPasswordInput,
};
use crate::identity::Account;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username, wrong password or inactive account.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {}", .0.summary())]
    Invalid(FormErrors),

    #[error("A user with that username already exists.")]
    Integrity(String),

    #[error("Account not found")]
    AccountNotFound,

    /// Unknown, expired or already used password reset token.
    #[error("The password reset link is invalid or has expired")]
    InvalidToken,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<FormError> for AuthError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Invalid(errors) => Self::Invalid(errors),
            FormError::Integrity(username) => Self::Integrity(username),
            FormError::Missing(_) => Self::AccountNotFound,
            FormError::Storage(msg) => Self::Database(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates one ordinary account through the creation form.
    ///
    /// # Errors
    ///
    /// [`AuthError::Invalid`] for field errors, [`AuthError::Integrity`]
    /// when storage rejects a taken username.
    async fn signup(&self, input: CreationInput) -> Result<Account, AuthError>;

    /// Verifies credentials and records the login time.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AuthError>;

    /// Loads an active account by id; `None` if missing or deactivated.
    async fn active_account(&self, id: i32) -> Result<Option<Account>, AuthError>;

    /// Self-service profile edit. Privilege flags are out of reach.
    async fn update_profile(&self, account_id: i32, input: ChangeInput)
    -> Result<Account, AuthError>;

    async fn change_password(
        &self,
        account_id: i32,
        input: PasswordChangeInput,
    ) -> Result<(), AuthError>;

    /// Sets a password without knowing the old one (operator command).
    async fn set_password(&self, username: &str, input: SetPasswordInput)
    -> Result<(), AuthError>;

    /// Mails a reset link to every active account with this address.
    /// Succeeds whether or not any account matched.
    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError>;

    async fn confirm_password_reset(
        &self,
        token: &str,
        input: SetPasswordInput,
    ) -> Result<(), AuthError>;
}
