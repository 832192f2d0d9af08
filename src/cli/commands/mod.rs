mod account;
mod schema;
mod serve;

pub use account::{cmd_change_password, cmd_create_superuser};
pub use schema::{cmd_migrate, cmd_reset_db};
pub use serve::cmd_serve;

use std::io::Write;

/// Reads one line from stdin after printing `label`. Input is echoed.
fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
