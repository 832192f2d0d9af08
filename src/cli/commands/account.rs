use anyhow::{Context, bail};
use std::sync::Arc;

use super::prompt;
use crate::bootstrap;
use crate::config::Config;
use crate::forms::{FormErrors, SetPasswordForm, SetPasswordInput};
use crate::identity::{ManagerError, PasswordPolicy};
use crate::services::{AuthError, AuthService, ConsoleMailer, SeaOrmAuthService};

pub const SUPERUSER_PASSWORD_ENV: &str = "QUILL_SUPERUSER_PASSWORD";

fn print_errors(errors: &FormErrors) {
    for (field, messages) in errors.iter() {
        for message in messages {
            println!("  {field}: {message}");
        }
    }
}

pub async fn cmd_create_superuser(
    config: Config,
    username: &str,
    email: &str,
    no_input: bool,
) -> anyhow::Result<()> {
    let app = bootstrap::bootstrap(config, Arc::new(ConsoleMailer)).await?;
    let policy = PasswordPolicy::new(app.config.security.password_policy.clone());

    let input = if no_input {
        let password = std::env::var(SUPERUSER_PASSWORD_ENV)
            .with_context(|| format!("{SUPERUSER_PASSWORD_ENV} must be set with --no-input"))?;
        SetPasswordInput {
            new_password1: password.clone(),
            new_password2: password,
        }
    } else {
        SetPasswordInput {
            new_password1: prompt("Password: ")?,
            new_password2: prompt("Password (again): ")?,
        }
    };

    let password = match SetPasswordForm::new(&policy, username, input).clean() {
        Ok(password) => password,
        Err(errors) => {
            println!("Superuser not created:");
            print_errors(&errors);
            bail!("password rejected");
        }
    };

    match app
        .identity
        .manager()
        .create_superuser(username, email, &password)
        .await
    {
        Ok(account) => {
            println!("✓ Superuser '{}' created (ID: {})", account.username, account.id);
            Ok(())
        }
        Err(ManagerError::Integrity(username)) => {
            bail!("An account with username '{username}' already exists")
        }
        Err(ManagerError::Invalid(errors)) => {
            println!("Superuser not created:");
            print_errors(&errors);
            bail!("account fields rejected")
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn cmd_change_password(config: Config, username: &str) -> anyhow::Result<()> {
    let app = bootstrap::bootstrap(config, Arc::new(ConsoleMailer)).await?;
    let auth = SeaOrmAuthService::new(
        app.store.clone(),
        Arc::clone(&app.identity),
        app.config.security.clone(),
        app.config.email.clone(),
        Arc::clone(&app.mailer),
    );

    println!("Changing password for account '{username}'");
    let input = SetPasswordInput {
        new_password1: prompt("Password: ")?,
        new_password2: prompt("Password (again): ")?,
    };

    match auth.set_password(username, input).await {
        Ok(()) => {
            println!("✓ Password changed for '{username}'");
            Ok(())
        }
        Err(AuthError::Invalid(errors)) => {
            println!("Password not changed:");
            print_errors(&errors);
            bail!("password rejected")
        }
        Err(AuthError::AccountNotFound) => bail!("Account '{username}' does not exist"),
        Err(e) => Err(e.into()),
    }
}
