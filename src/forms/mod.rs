//! Validation wrappers that bind untrusted input to the account model.
//!
//! Each form carries a [`FormMeta`] derived from the shape of the model it
//! was bound to, so its field set can never silently point at another
//! record shape.

mod change;
mod creation;
pub(crate) mod fields;
mod password;

pub use change::{AccountChangeForm, ChangeInput, ChangeScope};
pub use creation::{AccountCreationForm, CreationInput};
pub use password::{PasswordChangeForm, PasswordChangeInput, SetPasswordForm, SetPasswordInput};

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::identity::{IdentityModel, IdentityShape, ManagerError};

/// Key for errors that belong to the form as a whole.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub const REQUIRED: &str = "This field is required.";

pub const DUPLICATE_USERNAME: &str = "A user with that username already exists.";

/// Field name → messages, keyed in field-name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn extend(&mut self, field: &str, messages: impl IntoIterator<Item = String>) {
        for message in messages {
            self.add(field, message);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// One-line summary, used as the top-level error message.
    #[must_use]
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |m| {
                    if field == NON_FIELD_ERRORS {
                        m.clone()
                    } else {
                        format!("{field}: {m}")
                    }
                })
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Field '{field}' is not declared on '{model}'")]
    UnknownField {
        model: &'static str,
        field: String,
    },

    #[error("Field '{field}' on '{model}' cannot be edited through a form")]
    NotEditable {
        model: &'static str,
        field: &'static str,
    },

    #[error("Form is bound to '{found}', not '{expected}'")]
    WrongModel {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Form for '{model}' must expose '{field}'")]
    MissingField {
        model: &'static str,
        field: &'static str,
    },

    #[error("Invalid input: {}", .0.summary())]
    Invalid(FormErrors),

    /// Storage rejected the write; the username is taken.
    #[error("A user with that username already exists.")]
    Integrity(String),

    #[error("Account {0} does not exist")]
    Missing(i32),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ManagerError> for FormError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Integrity(username) => Self::Integrity(username),
            ManagerError::NotFound(id) => Self::Missing(id),
            ManagerError::Invalid(errors) => Self::Invalid(errors),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// The model a form is bound to and the model fields it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMeta {
    model_label: &'static str,
    fields: Vec<&'static str>,
}

impl FormMeta {
    /// Every listed field must be declared on `shape` and editable.
    pub fn for_model(
        shape: &'static IdentityShape,
        fields: &[&'static str],
    ) -> Result<Self, FormError> {
        for field in fields {
            let spec = shape.field(field).ok_or_else(|| FormError::UnknownField {
                model: shape.label,
                field: (*field).to_string(),
            })?;
            if !spec.editable {
                return Err(FormError::NotEditable {
                    model: shape.label,
                    field: spec.name,
                });
            }
        }

        Ok(Self {
            model_label: shape.label,
            fields: fields.to_vec(),
        })
    }

    #[must_use]
    pub const fn model_label(&self) -> &'static str {
        self.model_label
    }

    #[must_use]
    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    #[must_use]
    pub fn exposes(&self, field: &str) -> bool {
        self.fields.iter().any(|f| *f == field)
    }

    pub fn ensure_bound_to(&self, model: &IdentityModel) -> Result<(), FormError> {
        if self.model_label == model.label() {
            Ok(())
        } else {
            Err(FormError::WrongModel {
                expected: model.label(),
                found: self.model_label,
            })
        }
    }

    pub fn ensure_exposes(&self, field: &'static str) -> Result<(), FormError> {
        if self.exposes(field) {
            Ok(())
        } else {
            Err(FormError::MissingField {
                model: self.model_label,
                field,
            })
        }
    }
}
