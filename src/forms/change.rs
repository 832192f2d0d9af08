use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::fields::{clean_email, clean_name, clean_username};
use super::{FormError, FormErrors, FormMeta};
use crate::db::AccountChanges;
use crate::identity::{Account, IdentityModel};

/// Which fields an edit may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeScope {
    /// A holder editing their own profile.
    SelfService,
    /// An operator editing through the admin surface.
    Operator,
}

impl ChangeScope {
    #[must_use]
    pub const fn fields(self) -> &'static [&'static str] {
        match self {
            Self::SelfService => &["username", "email", "first_name", "last_name"],
            Self::Operator => &[
                "username",
                "email",
                "first_name",
                "last_name",
                "is_active",
                "is_staff",
                "is_superuser",
            ],
        }
    }
}

/// Submitted values; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_staff: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
}

/// Edits one stored account. Values for fields outside the scope are
/// ignored.
pub struct AccountChangeForm {
    model: Arc<IdentityModel>,
    meta: FormMeta,
    instance: Account,
    data: ChangeInput,
    outcome: Option<Result<AccountChanges, FormErrors>>,
}

impl AccountChangeForm {
    pub fn meta_for(model: &IdentityModel, scope: ChangeScope) -> Result<FormMeta, FormError> {
        FormMeta::for_model(model.shape(), scope.fields())
    }

    /// The instance's current values for every field in scope.
    #[must_use]
    pub fn initial(account: &Account, scope: ChangeScope) -> ChangeInput {
        let operator = scope == ChangeScope::Operator;
        ChangeInput {
            username: Some(account.username.clone()),
            email: Some(account.email.clone()),
            first_name: Some(account.first_name.clone()),
            last_name: Some(account.last_name.clone()),
            is_active: operator.then_some(account.is_active),
            is_staff: operator.then_some(account.is_staff),
            is_superuser: operator.then_some(account.is_superuser),
        }
    }

    pub fn bind(
        model: Arc<IdentityModel>,
        instance: Account,
        data: ChangeInput,
        scope: ChangeScope,
    ) -> Result<Self, FormError> {
        let meta = Self::meta_for(&model, scope)?;
        Self::with_meta(model, meta, instance, data)
    }

    /// Binds against a field set registered elsewhere, e.g. on the admin.
    /// Only the fields `meta` exposes are written.
    pub fn with_meta(
        model: Arc<IdentityModel>,
        meta: FormMeta,
        instance: Account,
        data: ChangeInput,
    ) -> Result<Self, FormError> {
        meta.ensure_bound_to(&model)?;
        Ok(Self {
            model,
            meta,
            instance,
            data,
            outcome: None,
        })
    }

    #[must_use]
    pub const fn meta(&self) -> &FormMeta {
        &self.meta
    }

    pub fn is_valid(&mut self) -> bool {
        if self.outcome.is_none() {
            self.outcome = Some(self.clean());
        }
        matches!(self.outcome, Some(Ok(_)))
    }

    #[must_use]
    pub fn errors(&self) -> FormErrors {
        match &self.outcome {
            Some(Err(errors)) => errors.clone(),
            _ => FormErrors::new(),
        }
    }

    /// Fields whose cleaned value differs from the stored one.
    pub fn changed_fields(&mut self) -> Vec<&'static str> {
        if !self.is_valid() {
            return Vec::new();
        }
        let Some(Ok(changes)) = &self.outcome else {
            return Vec::new();
        };
        let current = &self.instance;

        let mut changed = Vec::new();
        if changes.username != current.username {
            changed.push("username");
        }
        if changes.email != current.email {
            changed.push("email");
        }
        if changes.first_name != current.first_name {
            changed.push("first_name");
        }
        if changes.last_name != current.last_name {
            changed.push("last_name");
        }
        if changes.is_active != current.is_active {
            changed.push("is_active");
        }
        if changes.is_staff != current.is_staff {
            changed.push("is_staff");
        }
        if changes.is_superuser != current.is_superuser {
            changed.push("is_superuser");
        }
        changed
    }

    fn submitted<'a, T>(&self, field: &str, value: &'a Option<T>) -> Option<&'a T> {
        if self.meta.exposes(field) {
            value.as_ref()
        } else {
            if value.is_some() {
                debug!(field, "Ignoring field outside form scope");
            }
            None
        }
    }

    fn clean(&self) -> Result<AccountChanges, FormErrors> {
        let shape = self.model.shape();
        let manager = self.model.manager();
        let current = &self.instance;
        let mut errors = FormErrors::new();

        let username = self
            .submitted("username", &self.data.username)
            .map_or_else(
                || Ok(current.username.clone()),
                |raw| clean_username(shape, &manager.normalize_username(raw)),
            )
            .map_err(|e| errors.extend("username", e))
            .ok();

        let email = self
            .submitted("email", &self.data.email)
            .map_or_else(
                || Ok(current.email.clone()),
                |raw| clean_email(shape, &manager.normalize_email(raw)),
            )
            .map_err(|e| errors.extend("email", e))
            .ok();

        let first_name = self
            .submitted("first_name", &self.data.first_name)
            .map_or_else(
                || Ok(current.first_name.clone()),
                |raw| clean_name(shape, "first_name", raw),
            )
            .map_err(|e| errors.extend("first_name", e))
            .ok();

        let last_name = self
            .submitted("last_name", &self.data.last_name)
            .map_or_else(
                || Ok(current.last_name.clone()),
                |raw| clean_name(shape, "last_name", raw),
            )
            .map_err(|e| errors.extend("last_name", e))
            .ok();

        let flag = |field: &str, value: &Option<bool>, current: bool| {
            self.submitted(field, value).copied().unwrap_or(current)
        };
        let is_active = flag("is_active", &self.data.is_active, current.is_active);
        let is_staff = flag("is_staff", &self.data.is_staff, current.is_staff);
        let is_superuser = flag("is_superuser", &self.data.is_superuser, current.is_superuser);

        match (username, email, first_name, last_name) {
            (Some(username), Some(email), Some(first_name), Some(last_name))
                if errors.is_empty() =>
            {
                Ok(AccountChanges {
                    username,
                    first_name,
                    last_name,
                    email,
                    is_staff,
                    is_superuser,
                    is_active,
                })
            }
            _ => {
                debug!(
                    model = self.meta.model_label(),
                    account_id = current.id,
                    "Change form rejected input"
                );
                Err(errors)
            }
        }
    }

    /// Writes the cleaned values over the bound instance.
    pub async fn save(mut self) -> Result<Account, FormError> {
        let changes = self
            .outcome
            .take()
            .unwrap_or_else(|| self.clean())
            .map_err(FormError::Invalid)?;

        Ok(self
            .model
            .manager()
            .save_existing(self.instance.id, changes)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ACCOUNT, AccountManager, ManagerError, UnsavedAccount};
    use async_trait::async_trait;

    struct EchoManager;

    #[async_trait]
    impl AccountManager for EchoManager {
        async fn hash_password(&self, _password: &str) -> Result<String, ManagerError> {
            Ok(String::new())
        }

        async fn save_new(&self, _account: UnsavedAccount) -> Result<Account, ManagerError> {
            Err(ManagerError::Database("unused".to_string()))
        }

        async fn save_existing(
            &self,
            id: i32,
            changes: AccountChanges,
        ) -> Result<Account, ManagerError> {
            Ok(Account {
                id,
                username: changes.username,
                first_name: changes.first_name,
                last_name: changes.last_name,
                email: changes.email,
                is_staff: changes.is_staff,
                is_superuser: changes.is_superuser,
                is_active: changes.is_active,
                date_joined: "2026-01-01T00:00:00+00:00".to_string(),
                last_login: None,
            })
        }
    }

    fn alice() -> Account {
        Account {
            id: 7,
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Liddell".to_string(),
            email: "alice@example.com".to_string(),
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: "2026-01-01T00:00:00+00:00".to_string(),
            last_login: None,
        }
    }

    fn model() -> Arc<IdentityModel> {
        Arc::new(IdentityModel::new(&ACCOUNT, Arc::new(EchoManager)))
    }

    #[tokio::test]
    async fn unchanged_initial_values_round_trip() {
        let initial = AccountChangeForm::initial(&alice(), ChangeScope::Operator);
        let mut form =
            AccountChangeForm::bind(model(), alice(), initial, ChangeScope::Operator).unwrap();
        assert!(form.changed_fields().is_empty());
        assert_eq!(form.save().await.unwrap(), alice());
    }

    #[tokio::test]
    async fn self_service_cannot_grant_staff() {
        let input = ChangeInput {
            first_name: Some("Al".to_string()),
            is_staff: Some(true),
            is_superuser: Some(true),
            ..ChangeInput::default()
        };
        let saved = AccountChangeForm::bind(model(), alice(), input, ChangeScope::SelfService)
            .unwrap()
            .save()
            .await
            .unwrap();
        assert_eq!(saved.first_name, "Al");
        assert!(!saved.is_staff);
        assert!(!saved.is_superuser);
    }

    #[tokio::test]
    async fn operator_can_grant_staff() {
        let input = ChangeInput {
            is_staff: Some(true),
            ..ChangeInput::default()
        };
        let mut form =
            AccountChangeForm::bind(model(), alice(), input, ChangeScope::Operator).unwrap();
        assert_eq!(form.changed_fields(), vec!["is_staff"]);
        assert!(form.save().await.unwrap().is_staff);
    }

    #[tokio::test]
    async fn narrowed_meta_limits_what_is_written() {
        let meta = FormMeta::for_model(&ACCOUNT, &["first_name"]).unwrap();
        let input = ChangeInput {
            first_name: Some("Al".to_string()),
            email: Some("al@example.com".to_string()),
            is_staff: Some(true),
            ..ChangeInput::default()
        };
        let mut form = AccountChangeForm::with_meta(model(), meta, alice(), input).unwrap();
        assert_eq!(form.changed_fields(), vec!["first_name"]);

        let saved = form.save().await.unwrap();
        assert_eq!(saved.first_name, "Al");
        assert_eq!(saved.email, "alice@example.com");
        assert!(!saved.is_staff);
    }

    #[test]
    fn with_meta_rejects_foreign_model() {
        let meta = FormMeta::for_model(&crate::identity::BUILTIN_USER, &["username"]).unwrap();
        let err = AccountChangeForm::with_meta(model(), meta, alice(), ChangeInput::default())
            .err()
            .unwrap();
        assert!(matches!(err, FormError::WrongModel { .. }));
    }

    #[test]
    fn rejects_blank_username_and_bad_email() {
        let input = ChangeInput {
            username: Some("   ".to_string()),
            email: Some("nope".to_string()),
            ..ChangeInput::default()
        };
        let mut form =
            AccountChangeForm::bind(model(), alice(), input, ChangeScope::SelfService).unwrap();
        assert!(!form.is_valid());
        let errors = form.errors();
        assert!(errors.has("username"));
        assert!(errors.has("email"));
    }

    #[test]
    fn self_service_initial_omits_flags() {
        let initial = AccountChangeForm::initial(&alice(), ChangeScope::SelfService);
        assert_eq!(initial.username.as_deref(), Some("alice"));
        assert!(initial.is_staff.is_none());
    }
}
