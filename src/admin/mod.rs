//! Operator-facing registry bound to the account model and its two forms.

mod site;

pub use site::{AccountAdmin, AdminSite, ChangeListRow, ListCell, LIST_DISPLAY};

use thiserror::Error;

use crate::forms::{FormError, FormErrors};

#[derive(Debug, Error)]
pub enum AdminError {
    /// The requester lacks the privileged flag.
    #[error("You do not have permission to access the administration site")]
    PermissionDenied,

    /// A binding points at a different model than the one registered.
    #[error("Admin binding for '{model}' is inconsistent: {reason}")]
    Binding { model: &'static str, reason: String },

    #[error("'{0}' is already registered")]
    AlreadyRegistered(&'static str),

    #[error("No admin registered for '{0}'")]
    NotRegistered(String),

    #[error("Account {0} not found")]
    NotFound(i32),

    #[error("Invalid input: {}", .0.summary())]
    Invalid(FormErrors),

    #[error("A user with that username already exists.")]
    Integrity(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<FormError> for AdminError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Invalid(errors) => Self::Invalid(errors),
            FormError::Integrity(username) => Self::Integrity(username),
            FormError::Missing(id) => Self::NotFound(id),
            FormError::UnknownField { model, field } => Self::Binding {
                model,
                reason: format!("form field '{field}' is not declared on the model"),
            },
            FormError::NotEditable { model, field } => Self::Binding {
                model,
                reason: format!("form field '{field}' is not editable"),
            },
            FormError::WrongModel { expected, found } => Self::Binding {
                model: expected,
                reason: format!("form is bound to '{found}'"),
            },
            FormError::MissingField { model, field } => Self::Binding {
                model,
                reason: format!("form must expose '{field}'"),
            },
            FormError::Storage(msg) => Self::Storage(msg),
        }
    }
}
