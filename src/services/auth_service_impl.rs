//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::{EmailConfig, SecurityConfig};
use crate::db::Store;
use crate::forms::{
    AccountChangeForm, AccountCreationForm, ChangeInput, ChangeScope, CreationInput,
    PasswordChangeForm, PasswordChangeInput, SetPasswordForm, SetPasswordInput,
};
use crate::identity::password::{hash_password_blocking, verify_password_blocking};
use crate::identity::{Account, IdentityModel, PasswordPolicy};
use crate::services::auth_service::{AuthError, AuthService};
use crate::services::mailer::{Mailer, OutgoingEmail};

const DUMMY_PASSWORD: &str = "quill-unknown-account";

pub struct SeaOrmAuthService {
    store: Store,
    identity: Arc<IdentityModel>,
    security: SecurityConfig,
    email: EmailConfig,
    mailer: Arc<dyn Mailer>,
    dummy_hash: OnceCell<String>,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        identity: Arc<IdentityModel>,
        security: SecurityConfig,
        email: EmailConfig,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            identity,
            security,
            email,
            mailer,
            dummy_hash: OnceCell::new(),
        }
    }

    /// One verification against a fixed hash with the configured cost, for
    /// logins that match no account.
    async fn verify_against_dummy(&self, password: &str) -> Result<(), AuthError> {
        let hash = self
            .dummy_hash
            .get_or_try_init(|| hash_password_blocking(DUMMY_PASSWORD, &self.security))
            .await?;
        verify_password_blocking(hash, password).await?;
        Ok(())
    }

    fn policy(&self) -> PasswordPolicy {
        PasswordPolicy::new(self.security.password_policy.clone())
    }

    async fn require_account(&self, id: i32) -> Result<Account, AuthError> {
        self.store
            .get_account(id)
            .await?
            .ok_or(AuthError::AccountNotFound)
    }

    /// Stores the new hash and voids any outstanding reset links.
    async fn replace_password(&self, account: &Account, password: &str) -> Result<(), AuthError> {
        let password_hash = self
            .identity
            .manager()
            .hash_password(password)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        self.store
            .set_account_password_hash(account.id, password_hash)
            .await?;
        let voided = self.store.invalidate_password_resets(account.id).await?;

        info!(
            account_id = account.id,
            voided_reset_links = voided,
            "Password changed"
        );
        Ok(())
    }

    async fn send_reset_link(&self, account: &Account) -> Result<(), AuthError> {
        let selector = uuid::Uuid::new_v4().simple().to_string();
        let verifier_bytes: [u8; 32] = rand::random();
        let verifier = to_hex(&verifier_bytes);

        let verifier_hash = hash_password_blocking(&verifier, &self.security).await?;
        let expires_at = Utc::now()
            + chrono::Duration::minutes(self.security.password_reset_timeout_minutes);

        self.store
            .create_password_reset(account.id, &selector, verifier_hash, expires_at.to_rfc3339())
            .await?;

        let body = format!(
            "You're receiving this e-mail because a password reset was requested for your account.\n\n\
             Your username, in case you've forgotten: {username}\n\n\
             Use this token to choose a new password:\n\n    {selector}.{verifier}\n\n\
             The token expires at {expires}. If you did not ask for a reset you can ignore this message.",
            username = account.username,
            expires = expires_at.to_rfc3339(),
        );

        self.mailer
            .send(OutgoingEmail {
                from: self.email.default_from.clone(),
                to: account.email.clone(),
                subject: "Password reset".to_string(),
                body,
            })
            .await?;

        info!(account_id = account.id, "Password reset link issued");
        Ok(())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn is_expired(expires_at: &str) -> bool {
    DateTime::parse_from_rfc3339(expires_at)
        .map_or(true, |at| at.with_timezone(&Utc) <= Utc::now())
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn signup(&self, input: CreationInput) -> Result<Account, AuthError> {
        let form = AccountCreationForm::bind(Arc::clone(&self.identity), self.policy(), input)?;

        match form.save().await {
            Ok(account) => Ok(account),
            Err(e) => {
                let err = AuthError::from(e);
                if let AuthError::Integrity(username) = &err {
                    warn!(username = %username, "Signup rejected by storage: username taken");
                }
                Err(err)
            }
        }
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AuthError> {
        let username = self.identity.manager().normalize_username(username);

        let Some((account, password_hash)) =
            self.store.get_account_with_password(&username).await?
        else {
            debug!("Login for unknown username");
            self.verify_against_dummy(password).await?;
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password_blocking(&password_hash, password).await? {
            debug!(account_id = account.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !account.is_active {
            debug!(account_id = account.id, "Login for inactive account");
            return Err(AuthError::InvalidCredentials);
        }

        self.store.touch_last_login(account.id).await?;
        self.require_account(account.id).await
    }

    async fn active_account(&self, id: i32) -> Result<Option<Account>, AuthError> {
        Ok(self
            .store
            .get_account(id)
            .await?
            .filter(|account| account.is_active))
    }

    async fn update_profile(
        &self,
        account_id: i32,
        input: ChangeInput,
    ) -> Result<Account, AuthError> {
        let account = self.require_account(account_id).await?;
        let form = AccountChangeForm::bind(
            Arc::clone(&self.identity),
            account,
            input,
            ChangeScope::SelfService,
        )?;
        Ok(form.save().await?)
    }

    async fn change_password(
        &self,
        account_id: i32,
        input: PasswordChangeInput,
    ) -> Result<(), AuthError> {
        let account = self.require_account(account_id).await?;
        let current_hash = self
            .store
            .get_account_password_hash(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let policy = self.policy();
        let form = PasswordChangeForm::new(&policy, &account.username, input);
        let old_password_ok = verify_password_blocking(&current_hash, form.old_password()).await?;
        let new_password = form.clean(old_password_ok).map_err(AuthError::Invalid)?;

        self.replace_password(&account, &new_password).await
    }

    async fn set_password(
        &self,
        username: &str,
        input: SetPasswordInput,
    ) -> Result<(), AuthError> {
        let username = self.identity.manager().normalize_username(username);
        let account = self
            .store
            .get_account_by_username(&username)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        let policy = self.policy();
        let new_password = SetPasswordForm::new(&policy, &account.username, input)
            .clean()
            .map_err(AuthError::Invalid)?;

        self.replace_password(&account, &new_password).await
    }

    async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = self.identity.manager().normalize_email(email);
        if email.is_empty() {
            return Ok(());
        }

        let accounts = self.store.list_active_accounts_by_email(&email).await?;
        if accounts.is_empty() {
            debug!("Password reset requested for an address with no active account");
        }

        for account in &accounts {
            if let Err(e) = self.send_reset_link(account).await {
                warn!(account_id = account.id, "Failed to issue password reset: {e}");
            }
        }

        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        token: &str,
        input: SetPasswordInput,
    ) -> Result<(), AuthError> {
        let (selector, verifier) = token
            .trim()
            .split_once('.')
            .ok_or(AuthError::InvalidToken)?;

        let entry = self
            .store
            .get_password_reset(selector)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        if entry.used || is_expired(&entry.expires_at) {
            return Err(AuthError::InvalidToken);
        }

        if !verify_password_blocking(&entry.verifier_hash, verifier).await? {
            return Err(AuthError::InvalidToken);
        }

        let account = self
            .store
            .get_account(entry.account_id)
            .await?
            .filter(|account| account.is_active)
            .ok_or(AuthError::InvalidToken)?;

        let policy = self.policy();
        let new_password = SetPasswordForm::new(&policy, &account.username, input)
            .clean()
            .map_err(AuthError::Invalid)?;

        if !self.store.mark_password_reset_used(entry.id).await? {
            return Err(AuthError::InvalidToken);
        }

        self.replace_password(&account, &new_password).await
    }
}
