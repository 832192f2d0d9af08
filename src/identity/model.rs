use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use super::manager::AccountManager;
use super::shape::IdentityShape;
use crate::entities::accounts;

/// The record type standing in for account holders, bound to the manager
/// that performs every creation path for it.
///
/// Built once at startup from the configured `auth.user_model` and handed
/// to each collaborator as `Arc<IdentityModel>`.
pub struct IdentityModel {
    shape: &'static IdentityShape,
    manager: Arc<dyn AccountManager>,
}

impl IdentityModel {
    #[must_use]
    pub fn new(shape: &'static IdentityShape, manager: Arc<dyn AccountManager>) -> Self {
        Self { shape, manager }
    }

    #[must_use]
    pub const fn shape(&self) -> &'static IdentityShape {
        self.shape
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.shape.label
    }

    #[must_use]
    pub fn manager(&self) -> &dyn AccountManager {
        self.manager.as_ref()
    }
}

impl fmt::Debug for IdentityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityModel")
            .field("label", &self.shape.label)
            .finish_non_exhaustive()
    }
}

/// Account data returned from storage (without the password hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
    pub date_joined: String,
    pub last_login: Option<String>,
}

impl Account {
    /// Whether the holder may use the administration surface.
    #[must_use]
    pub const fn is_privileged(&self) -> bool {
        self.is_active && self.is_staff
    }
}

impl From<accounts::Model> for Account {
    fn from(model: accounts::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            is_staff: model.is_staff,
            is_superuser: model.is_superuser,
            is_active: model.is_active,
            date_joined: model.date_joined,
            last_login: model.last_login,
        }
    }
}

/// A validated record that has not been written yet. The password is
/// already hashed.
#[derive(Clone, PartialEq, Eq)]
pub struct UnsavedAccount {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

impl UnsavedAccount {
    #[must_use]
    pub fn ordinary(username: String, email: String, password_hash: String) -> Self {
        Self {
            username,
            password_hash,
            first_name: String::new(),
            last_name: String::new(),
            email,
            is_staff: false,
            is_superuser: false,
            is_active: true,
        }
    }
}

impl fmt::Debug for UnsavedAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsavedAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("is_staff", &self.is_staff)
            .field("is_superuser", &self.is_superuser)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(is_active: bool, is_staff: bool) -> Account {
        Account {
            id: 1,
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: String::new(),
            email: String::new(),
            is_staff,
            is_superuser: false,
            is_active,
            date_joined: "2026-01-01T00:00:00+00:00".to_string(),
            last_login: None,
        }
    }

    #[test]
    fn privilege_requires_active_staff() {
        assert!(account(true, true).is_privileged());
        assert!(!account(false, true).is_privileged());
        assert!(!account(true, false).is_privileged());
    }

    #[test]
    fn unsaved_debug_hides_hash() {
        let unsaved = UnsavedAccount::ordinary(
            "alice".to_string(),
            String::new(),
            "$argon2id$secret".to_string(),
        );
        assert!(!format!("{unsaved:?}").contains("argon2id"));
    }
}
