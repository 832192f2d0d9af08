//! Declared shapes of account-holder records.
//!
//! A shape lists the fields a record type carries together with their
//! constraints. Forms and the admin surface consult the shape of the bound
//! model instead of assuming one, so the two stay in step with it.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Flag,
    Timestamp,
    /// Only ever stored hashed.
    Secret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub max_length: Option<usize>,
    pub required: bool,
    pub unique: bool,
    /// Whether forms may expose the field for direct input.
    pub editable: bool,
}

impl FieldSpec {
    const fn text(name: &'static str, max_length: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            max_length: Some(max_length),
            required: false,
            unique: false,
            editable: true,
        }
    }

    const fn flag(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Flag,
            max_length: None,
            required: false,
            unique: false,
            editable: true,
        }
    }

    const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Timestamp,
            max_length: None,
            required: false,
            unique: false,
            editable: false,
        }
    }
}

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const NAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;

/// Fields supplied by the base identity abstraction.
pub const BASE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "id",
        kind: FieldKind::Text,
        max_length: None,
        required: true,
        unique: true,
        editable: false,
    },
    FieldSpec {
        name: "username",
        kind: FieldKind::Text,
        max_length: Some(USERNAME_MAX_LENGTH),
        required: true,
        unique: true,
        editable: true,
    },
    FieldSpec {
        name: "password",
        kind: FieldKind::Secret,
        max_length: Some(128),
        required: true,
        unique: false,
        editable: false,
    },
    FieldSpec::text("first_name", NAME_MAX_LENGTH),
    FieldSpec::text("last_name", NAME_MAX_LENGTH),
    FieldSpec {
        name: "email",
        kind: FieldKind::Email,
        max_length: Some(EMAIL_MAX_LENGTH),
        required: false,
        unique: false,
        editable: true,
    },
    FieldSpec::flag("is_staff"),
    FieldSpec::flag("is_superuser"),
    FieldSpec::flag("is_active"),
    FieldSpec::timestamp("date_joined"),
    FieldSpec::timestamp("last_login"),
];

#[derive(Debug, PartialEq, Eq)]
pub struct IdentityShape {
    /// `app.Model`
    pub label: &'static str,
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
    /// The framework's own default shape.
    pub builtin: bool,
}

impl IdentityShape {
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}

pub static BUILTIN_USER: IdentityShape = IdentityShape {
    label: "auth.User",
    table: "auth_user",
    fields: BASE_FIELDS,
    builtin: true,
};

/// The project's account model. It declares no fields beyond the base so
/// later additions do not require rebuilding the schema from scratch.
pub static ACCOUNT: IdentityShape = IdentityShape {
    label: "accounts.Account",
    table: "accounts",
    fields: BASE_FIELDS,
    builtin: false,
};

static KNOWN_SHAPES: &[&IdentityShape] = &[&BUILTIN_USER, &ACCOUNT];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("No account model configured (auth.user_model is empty)")]
    Unset,

    #[error("auth.user_model must be of the form 'app.Model', got '{0}'")]
    Malformed(String),

    #[error("auth.user_model refers to '{0}', which is not a known model")]
    Unknown(String),
}

/// Resolves a configured model label to its shape. Labels compare
/// case-insensitively, as in `accounts.account`.
pub fn resolve(label: &str) -> Result<&'static IdentityShape, ShapeError> {
    let label = label.trim();
    if label.is_empty() {
        return Err(ShapeError::Unset);
    }

    let Some((app, model)) = label.split_once('.') else {
        return Err(ShapeError::Malformed(label.to_string()));
    };
    if app.is_empty() || model.is_empty() || model.contains('.') {
        return Err(ShapeError::Malformed(label.to_string()));
    }

    KNOWN_SHAPES
        .iter()
        .copied()
        .find(|shape| shape.label.eq_ignore_ascii_case(label))
        .ok_or_else(|| ShapeError::Unknown(label.to_string()))
}
