//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::kind::MasterKind;

/// Schema command arguments.
#[derive(Debug, Args)]
pub struct SchemaCommand {
    /// Master kind
    #[arg(value_enum)]
    pub kind: MasterKind,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Master kind
    #[arg(value_enum)]
    pub kind: MasterKind,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Master kind
    #[arg(value_enum)]
    pub kind: MasterKind,

    /// Field value, repeatable (e.g. --set name=India --set code=IN)
    #[arg(short, long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,
}

/// Edit command arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Master kind
    #[arg(value_enum)]
    pub kind: MasterKind,

    /// Id of the record to edit
    pub id: String,

    /// Field value to change, repeatable
    #[arg(short, long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(String, String)>,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Master kind
    #[arg(value_enum)]
    pub kind: MasterKind,

    /// Id of the record to delete
    pub id: String,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Options command arguments.
#[derive(Debug, Args)]
pub struct OptionsCommand {
    /// Master kind whose form options to show
    #[arg(value_enum)]
    pub kind: MasterKind,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration (secrets masked)
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Tab-separated rows, id first
    Plain,
    /// Aligned table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Parse a `FIELD=VALUE` pair. The value may be empty or contain `=`.
///
/// # Errors
///
/// Returns a message if there is no `=` or the field name is empty.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }
    Ok((field.to_string(), value.to_string()))
}
