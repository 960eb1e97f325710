//! Command-line interface for freightdesk.
//!
//! This module provides the CLI structure for the `fdesk` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    parse_assignment, AddCommand, ConfigCommand, DeleteCommand, EditCommand, ListCommand,
    OptionsCommand, OutputFormat, SchemaCommand,
};

use crate::logging::Verbosity;

/// fdesk - Maintain transport master data
///
/// Lists, adds, edits and deletes countries, states, cities and transporters
/// in a hosted PostgREST backend or a local `SQLite` database.
#[derive(Debug, Parser)]
#[command(name = "fdesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List master kinds
    Kinds,

    /// Show the columns and form fields of a kind
    Schema(SchemaCommand),

    /// List records of a kind
    List(ListCommand),

    /// Create a record
    Add(AddCommand),

    /// Update a record
    Edit(EditCommand),

    /// Delete a record
    Delete(DeleteCommand),

    /// Show the select options available on a kind's form
    Options(OptionsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
