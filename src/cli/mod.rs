//! CLI module - operator commands for Quill
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Quill - message board service
#[derive(Parser)]
#[command(name = "quill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    #[command(alias = "runserver")]
    Serve,

    /// Build or update the database schema for the configured account model
    Migrate,

    /// Create an account with staff and superuser rights
    #[command(name = "createsuperuser")]
    CreateSuperuser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Read the password from QUILL_SUPERUSER_PASSWORD instead of prompting
        #[arg(long)]
        no_input: bool,
    },

    /// Set a new password for an existing account
    #[command(name = "changepassword")]
    ChangePassword {
        username: String,
    },

    /// Drop every table and rebuild the schema (destroys all data)
    #[command(name = "reset-db")]
    ResetDb {
        /// Confirm the destructive reset
        #[arg(long)]
        yes: bool,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
