use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::fields::{clean_email, clean_username};
use super::{FormError, FormErrors, FormMeta, REQUIRED};
use crate::identity::{Account, IdentityModel, PasswordPolicy, UnsavedAccount};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreationInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

struct Cleaned {
    username: String,
    email: String,
    password: String,
}

/// Sign-up form: a handle, an optional email, and the password typed
/// twice.
///
/// Handle uniqueness is left to the storage constraint; a taken handle
/// surfaces from [`AccountCreationForm::save`] as
/// [`FormError::Integrity`].
pub struct AccountCreationForm {
    model: Arc<IdentityModel>,
    meta: FormMeta,
    policy: PasswordPolicy,
    data: CreationInput,
    outcome: Option<Result<Cleaned, FormErrors>>,
}

impl AccountCreationForm {
    pub const FIELDS: &'static [&'static str] = &["username", "email"];

    pub fn meta_for(model: &IdentityModel) -> Result<FormMeta, FormError> {
        FormMeta::for_model(model.shape(), Self::FIELDS)
    }

    pub fn bind(
        model: Arc<IdentityModel>,
        policy: PasswordPolicy,
        data: CreationInput,
    ) -> Result<Self, FormError> {
        let meta = Self::meta_for(&model)?;
        Self::with_meta(model, meta, policy, data)
    }

    /// Binds against a registered field set, which must include the
    /// handle. A submitted email is dropped when `meta` leaves it out.
    pub fn with_meta(
        model: Arc<IdentityModel>,
        meta: FormMeta,
        policy: PasswordPolicy,
        data: CreationInput,
    ) -> Result<Self, FormError> {
        meta.ensure_bound_to(&model)?;
        meta.ensure_exposes("username")?;
        Ok(Self {
            model,
            meta,
            policy,
            data,
            outcome: None,
        })
    }

    #[must_use]
    pub const fn meta(&self) -> &FormMeta {
        &self.meta
    }

    /// Runs validation on first call and caches the result.
    pub fn is_valid(&mut self) -> bool {
        if self.outcome.is_none() {
            self.outcome = Some(self.clean());
        }
        matches!(self.outcome, Some(Ok(_)))
    }

    /// Empty until [`Self::is_valid`] has run or when the form is valid.
    #[must_use]
    pub fn errors(&self) -> FormErrors {
        match &self.outcome {
            Some(Err(errors)) => errors.clone(),
            _ => FormErrors::new(),
        }
    }

    fn clean(&self) -> Result<Cleaned, FormErrors> {
        let shape = self.model.shape();
        let manager = self.model.manager();
        let mut errors = FormErrors::new();

        let username = manager.normalize_username(&self.data.username);
        let username = clean_username(shape, &username)
            .map_err(|e| errors.extend("username", e))
            .ok();

        let email = if self.meta.exposes("email") {
            clean_email(shape, &manager.normalize_email(&self.data.email))
                .map_err(|e| errors.extend("email", e))
                .ok()
        } else {
            Some(String::new())
        };

        if self.data.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.data.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }

        if !self.data.password1.is_empty() && !self.data.password2.is_empty() {
            if self.data.password1 == self.data.password2 {
                let policy_errors = self.policy.validate(
                    &self.data.password2,
                    username.as_deref().unwrap_or_default(),
                );
                errors.extend("password2", policy_errors);
            } else {
                errors.add("password2", "The two password fields didn't match.");
            }
        }

        match (username, email) {
            (Some(username), Some(email)) if errors.is_empty() => Ok(Cleaned {
                username,
                email,
                password: self.data.password1.clone(),
            }),
            _ => {
                debug!(model = self.meta.model_label(), "Creation form rejected input");
                Err(errors)
            }
        }
    }

    /// Validates and returns the record without writing it.
    pub async fn build(mut self) -> Result<UnsavedAccount, FormError> {
        let cleaned = self
            .outcome
            .take()
            .unwrap_or_else(|| self.clean())
            .map_err(FormError::Invalid)?;

        let password_hash = self.model.manager().hash_password(&cleaned.password).await?;
        Ok(UnsavedAccount::ordinary(
            cleaned.username,
            cleaned.email,
            password_hash,
        ))
    }

    /// Validates and persists one ordinary account through the model's
    /// manager.
    pub async fn save(self) -> Result<Account, FormError> {
        let model = Arc::clone(&self.model);
        let unsaved = self.build().await?;
        Ok(model.manager().save_new(unsaved).await?)
    }
}
