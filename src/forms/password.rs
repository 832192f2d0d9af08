//! Forms for the dedicated credential flows: changing a known password and
//! setting a new one after a reset.

use serde::Deserialize;

use super::{FormErrors, REQUIRED};
use crate::identity::PasswordPolicy;

const MISMATCH: &str = "The two password fields didn't match.";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetPasswordInput {
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

/// New password typed twice, checked against the policy.
pub struct SetPasswordForm<'a> {
    policy: &'a PasswordPolicy,
    username: &'a str,
    data: SetPasswordInput,
}

impl<'a> SetPasswordForm<'a> {
    #[must_use]
    pub const fn new(policy: &'a PasswordPolicy, username: &'a str, data: SetPasswordInput) -> Self {
        Self {
            policy,
            username,
            data,
        }
    }

    /// The accepted plaintext, to be hashed by the caller.
    pub fn clean(self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        clean_new_pair(
            self.policy,
            self.username,
            &self.data.new_password1,
            &self.data.new_password2,
            &mut errors,
        );

        if errors.is_empty() {
            Ok(self.data.new_password1)
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PasswordChangeInput {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

/// Like [`SetPasswordForm`] but the current password must be supplied and
/// verified first.
pub struct PasswordChangeForm<'a> {
    policy: &'a PasswordPolicy,
    username: &'a str,
    data: PasswordChangeInput,
}

impl<'a> PasswordChangeForm<'a> {
    #[must_use]
    pub const fn new(
        policy: &'a PasswordPolicy,
        username: &'a str,
        data: PasswordChangeInput,
    ) -> Self {
        Self {
            policy,
            username,
            data,
        }
    }

    #[must_use]
    pub fn old_password(&self) -> &str {
        &self.data.old_password
    }

    /// `old_password_ok` is the result of verifying `old_password` against
    /// the stored hash.
    pub fn clean(self, old_password_ok: bool) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();

        if self.data.old_password.is_empty() {
            errors.add("old_password", REQUIRED);
        } else if !old_password_ok {
            errors.add(
                "old_password",
                "Your old password was entered incorrectly. Please enter it again.",
            );
        }

        clean_new_pair(
            self.policy,
            self.username,
            &self.data.new_password1,
            &self.data.new_password2,
            &mut errors,
        );

        if !self.data.old_password.is_empty()
            && self.data.old_password == self.data.new_password1
        {
            errors.add(
                "new_password1",
                "New password must be different from current password.",
            );
        }

        if errors.is_empty() {
            Ok(self.data.new_password1)
        } else {
            Err(errors)
        }
    }
}

fn clean_new_pair(
    policy: &PasswordPolicy,
    username: &str,
    password1: &str,
    password2: &str,
    errors: &mut FormErrors,
) {
    if password1.is_empty() {
        errors.add("new_password1", REQUIRED);
    }
    if password2.is_empty() {
        errors.add("new_password2", REQUIRED);
    }
    if password1.is_empty() || password2.is_empty() {
        return;
    }

    if password1 == password2 {
        errors.extend("new_password2", policy.validate(password2, username));
    } else {
        errors.add("new_password2", MISMATCH);
    }
}
