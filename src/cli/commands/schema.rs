use tracing::warn;

use crate::bootstrap;
use crate::config::Config;
use crate::services::ConsoleMailer;
use std::sync::Arc;

pub async fn cmd_migrate(config: Config) -> anyhow::Result<()> {
    let app = bootstrap::bootstrap(config, Arc::new(ConsoleMailer)).await?;

    println!(
        "✓ Schema is up to date for '{}' ({})",
        app.identity.label(),
        app.config.general.database_path
    );
    Ok(())
}

pub async fn cmd_reset_db(config: Config, confirmed: bool) -> anyhow::Result<()> {
    if !confirmed {
        println!("This drops every table in {} and rebuilds the schema.", config.general.database_path);
        println!("All accounts and posts will be lost. Re-run with --yes to proceed.");
        return Ok(());
    }

    let app = bootstrap::assemble(config, Arc::new(ConsoleMailer)).await?;

    warn!(model = app.identity.label(), "Resetting database");
    app.store.reset_schema(&app.identity, &app.admin).await?;

    println!(
        "✓ Database rebuilt for '{}'. Create an operator with `quill createsuperuser`.",
        app.identity.label()
    );
    Ok(())
}
