use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::AdminError;
use crate::db::Store;
use crate::forms::{
    AccountChangeForm, AccountCreationForm, ChangeInput, ChangeScope, CreationInput, FormMeta,
};
use crate::identity::{Account, FieldKind, IdentityModel, PasswordPolicy};

/// Default columns shown on the change list.
pub const LIST_DISPLAY: &[&str] = &["username", "email", "first_name", "last_name", "is_staff"];

/// Admin registration for the account model.
///
/// The model, the "add" form and the "change" form are all required and
/// must describe the same record shape.
pub struct AccountAdmin {
    model: Arc<IdentityModel>,
    add_form: FormMeta,
    change_form: FormMeta,
    list_display: &'static [&'static str],
}

impl AccountAdmin {
    pub fn new(
        model: Arc<IdentityModel>,
        add_form: FormMeta,
        change_form: FormMeta,
    ) -> Result<Self, AdminError> {
        let label = model.label();

        if model.shape().builtin {
            return Err(AdminError::Binding {
                model: label,
                reason: "the built-in account model cannot be administered here; bind the project model"
                    .to_string(),
            });
        }

        for (role, meta) in [("add", &add_form), ("change", &change_form)] {
            if meta.model_label() != label {
                return Err(AdminError::Binding {
                    model: label,
                    reason: format!(
                        "{role} form is bound to '{}', not '{label}'",
                        meta.model_label()
                    ),
                });
            }
        }
        add_form.ensure_exposes("username")?;

        check_list_display(&model, LIST_DISPLAY)?;

        Ok(Self {
            model,
            add_form,
            change_form,
            list_display: LIST_DISPLAY,
        })
    }

    /// Binds the standard account forms to `model`.
    pub fn with_default_forms(model: Arc<IdentityModel>) -> Result<Self, AdminError> {
        let add_form = AccountCreationForm::meta_for(&model)?;
        let change_form = AccountChangeForm::meta_for(&model, ChangeScope::Operator)?;
        Self::new(model, add_form, change_form)
    }

    /// Replaces the change-list columns.
    pub fn with_list_display(
        mut self,
        columns: &'static [&'static str],
    ) -> Result<Self, AdminError> {
        check_list_display(&self.model, columns)?;
        self.list_display = columns;
        Ok(self)
    }

    #[must_use]
    pub const fn model(&self) -> &Arc<IdentityModel> {
        &self.model
    }

    #[must_use]
    pub const fn add_form(&self) -> &FormMeta {
        &self.add_form
    }

    #[must_use]
    pub const fn change_form(&self) -> &FormMeta {
        &self.change_form
    }

    #[must_use]
    pub const fn list_display(&self) -> &'static [&'static str] {
        self.list_display
    }

    fn row(&self, account: &Account) -> ChangeListRow {
        let columns = self
            .list_display
            .iter()
            .filter_map(|field| ListCell::of(account, field).map(|cell| (*field, cell)))
            .collect();
        ChangeListRow {
            id: account.id,
            columns,
        }
    }
}

fn check_list_display(model: &IdentityModel, columns: &[&'static str]) -> Result<(), AdminError> {
    for field in columns {
        let declared = model
            .shape()
            .field(field)
            .is_some_and(|spec| spec.kind != FieldKind::Secret);
        if !declared {
            return Err(AdminError::Binding {
                model: model.label(),
                reason: format!("list column '{field}' is not a displayable field of the model"),
            });
        }
    }
    Ok(())
}

/// One change-list value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ListCell {
    Text(String),
    Flag(bool),
    Empty,
}

impl ListCell {
    fn of(account: &Account, field: &str) -> Option<Self> {
        let cell = match field {
            "id" => Self::Text(account.id.to_string()),
            "username" => Self::Text(account.username.clone()),
            "email" => Self::Text(account.email.clone()),
            "first_name" => Self::Text(account.first_name.clone()),
            "last_name" => Self::Text(account.last_name.clone()),
            "is_staff" => Self::Flag(account.is_staff),
            "is_superuser" => Self::Flag(account.is_superuser),
            "is_active" => Self::Flag(account.is_active),
            "date_joined" => Self::Text(account.date_joined.clone()),
            "last_login" => account.last_login.clone().map_or(Self::Empty, Self::Text),
            _ => return None,
        };
        Some(cell)
    }
}

/// A row of the change list: the id plus the registered columns.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeListRow {
    pub id: i32,
    #[serde(flatten)]
    pub columns: BTreeMap<&'static str, ListCell>,
}

#[derive(Default)]
pub struct AdminSite {
    registry: BTreeMap<String, AccountAdmin>,
}

impl AdminSite {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, admin: AccountAdmin) -> Result<(), AdminError> {
        let label = admin.model.label();
        let key = label.to_ascii_lowercase();
        if self.registry.contains_key(&key) {
            return Err(AdminError::AlreadyRegistered(label));
        }

        info!(model = label, "Registered admin");
        self.registry.insert(key, admin);
        Ok(())
    }

    #[must_use]
    pub fn is_registered(&self, label: &str) -> bool {
        self.registry.contains_key(&label.to_ascii_lowercase())
    }

    /// Looks up a registration by `app.model`, ignoring case.
    pub fn get(&self, label: &str) -> Result<&AccountAdmin, AdminError> {
        self.registry
            .get(&label.to_ascii_lowercase())
            .ok_or_else(|| AdminError::NotRegistered(label.to_string()))
    }

    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.registry.values().map(|a| a.model.label())
    }

    fn authorize(requester: &Account) -> Result<(), AdminError> {
        if requester.is_privileged() {
            Ok(())
        } else {
            warn!(
                account_id = requester.id,
                "Unprivileged account denied admin access"
            );
            Err(AdminError::PermissionDenied)
        }
    }

    /// Labels of every registered model.
    pub fn index(&self, requester: &Account) -> Result<Vec<&'static str>, AdminError> {
        Self::authorize(requester)?;
        Ok(self.labels().collect())
    }

    pub async fn changelist(
        &self,
        store: &Store,
        requester: &Account,
        label: &str,
    ) -> Result<Vec<ChangeListRow>, AdminError> {
        Self::authorize(requester)?;
        let admin = self.get(label)?;

        let accounts = store
            .list_accounts()
            .await
            .map_err(|e| AdminError::Storage(e.to_string()))?;
        Ok(accounts.iter().map(|account| admin.row(account)).collect())
    }

    pub async fn detail(
        &self,
        store: &Store,
        requester: &Account,
        label: &str,
        id: i32,
    ) -> Result<Account, AdminError> {
        Self::authorize(requester)?;
        self.get(label)?;

        store
            .get_account(id)
            .await
            .map_err(|e| AdminError::Storage(e.to_string()))?
            .ok_or(AdminError::NotFound(id))
    }

    /// Creates an ordinary account through the registered "add" form.
    pub async fn add(
        &self,
        requester: &Account,
        label: &str,
        policy: PasswordPolicy,
        input: CreationInput,
    ) -> Result<Account, AdminError> {
        Self::authorize(requester)?;
        let admin = self.get(label)?;

        let form = AccountCreationForm::with_meta(
            Arc::clone(&admin.model),
            admin.add_form.clone(),
            policy,
            input,
        )?;
        let account = form.save().await?;

        info!(
            operator_id = requester.id,
            account_id = account.id,
            "Account added through admin"
        );
        Ok(account)
    }

    /// Edits an account through the registered "change" form.
    pub async fn change(
        &self,
        store: &Store,
        requester: &Account,
        label: &str,
        id: i32,
        input: ChangeInput,
    ) -> Result<Account, AdminError> {
        Self::authorize(requester)?;
        let admin = self.get(label)?;

        let instance = store
            .get_account(id)
            .await
            .map_err(|e| AdminError::Storage(e.to_string()))?
            .ok_or(AdminError::NotFound(id))?;

        let mut form = AccountChangeForm::with_meta(
            Arc::clone(&admin.model),
            admin.change_form.clone(),
            instance,
            input,
        )?;
        let changed = form.changed_fields();
        let account = form.save().await?;

        info!(
            operator_id = requester.id,
            account_id = account.id,
            ?changed,
            "Account changed through admin"
        );
        Ok(account)
    }
}
