pub mod admin;
pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod db;
pub mod entities;
pub mod forms;
pub mod identity;
pub mod services;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
pub use config::Config;

/// `RUST_LOG` takes precedence over `general.log_level`.
fn init_tracing(config: &Config) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.general.log_format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Init) = cli.command {
        if Config::create_default_if_missing()? {
            println!("✓ Config file created. Edit config.toml and run again.");
        } else {
            println!("config.toml already exists; left untouched.");
        }
        return Ok(());
    }

    config.validate()?;
    init_tracing(&config);

    match cli.command {
        None | Some(Commands::Serve) => cli::cmd_serve(config).await,
        Some(Commands::Migrate) => cli::cmd_migrate(config).await,
        Some(Commands::CreateSuperuser {
            username,
            email,
            no_input,
        }) => cli::cmd_create_superuser(config, &username, &email, no_input).await,
        Some(Commands::ChangePassword { username }) => {
            cli::cmd_change_password(config, &username).await
        }
        Some(Commands::ResetDb { yes }) => cli::cmd_reset_db(config, yes).await,
        Some(Commands::Init) => Ok(()),
    }
}
