//! `fdesk` - CLI for freightdesk
//!
//! This binary lists and edits transport master data through the same
//! controller an interactive front end would drive.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::Parser;

use freightdesk::cli::{
    AddCommand, Cli, Command, ConfigCommand, DeleteCommand, EditCommand, ListCommand,
    OptionsCommand, OutputFormat, SchemaCommand,
};
use freightdesk::controller::{Confirm, DeleteStatus, MasterController};
use freightdesk::form::FormData;
use freightdesk::schema::{InputKind, SchemaRegistry};
use freightdesk::{gateway, init_logging, Config, Error, MasterKind};

const UNSET: &str = "(unset)";

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug)]
struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{prompt} [y/N] ");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match cli.command {
        Command::Kinds => {
            handle_kinds();
            Ok(())
        }
        Command::Schema(cmd) => handle_schema(&cmd),
        Command::Config(cmd) => handle_config(cli.config, cmd),
        command => {
            let config = Config::load_from(cli.config).context("loading configuration")?;
            let gateway = gateway::connect(&config).context("connecting to backend")?;
            let mut controller = MasterController::new(gateway);
            match command {
                Command::List(cmd) => handle_list(&mut controller, &cmd).await,
                Command::Add(cmd) => handle_add(&mut controller, cmd).await,
                Command::Edit(cmd) => handle_edit(&mut controller, cmd).await,
                Command::Delete(cmd) => handle_delete(&mut controller, &cmd).await,
                Command::Options(cmd) => handle_options(&mut controller, &cmd).await,
                Command::Kinds | Command::Schema(_) | Command::Config(_) => Ok(()),
            }
        }
    }
}

fn handle_kinds() {
    for &kind in SchemaRegistry::kinds() {
        let schema = SchemaRegistry::get(kind);
        println!("{:<14}{:<14}{}", kind.slug(), schema.label, kind.collection());
    }
}

fn handle_schema(cmd: &SchemaCommand) -> Result<()> {
    let schema = SchemaRegistry::get(cmd.kind);
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    println!("{} ({})", schema.label, schema.kind.collection());
    println!();
    println!("Columns:");
    for column in &schema.columns {
        println!("  {:<22}{}", column.key, column.label);
    }
    println!();
    println!("Fields:");
    for field in &schema.fields {
        let input = serde_json::to_value(field.input)?;
        println!(
            "  {:<16}{:<8}{:<10}{}",
            field.name,
            input.as_str().unwrap_or_default(),
            if field.required { "required" } else { "" },
            field.label
        );
    }
    Ok(())
}

async fn load(controller: &mut MasterController, kind: MasterKind) -> Result<()> {
    controller
        .select(kind)
        .await
        .with_context(|| format!("loading {kind}"))?;
    Ok(())
}

async fn handle_list(controller: &mut MasterController, cmd: &ListCommand) -> Result<()> {
    load(controller, cmd.kind).await?;
    match cmd.format {
        OutputFormat::Plain => print!("{}", controller.list_view().to_plain()),
        OutputFormat::Table => print!("{}", controller.list_view()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(controller.records())?),
    }
    Ok(())
}

fn apply_assignments(
    controller: &MasterController,
    data: &mut FormData,
    assignments: Vec<(String, String)>,
) -> Result<()> {
    for (field, value) in assignments {
        if controller.schema().field(&field).is_none() {
            bail!(
                "unknown field '{field}' for {} (see `fdesk schema {}`)",
                controller.kind(),
                controller.kind()
            );
        }
        data.set(field, value);
    }
    Ok(())
}

async fn submit(controller: &mut MasterController, data: FormData) -> Result<String> {
    match controller.save(data).await {
        Ok(record) => Ok(record.id),
        Err(Error::Validation { errors }) => {
            for error in &errors {
                eprintln!("  {} ({}): {}", error.label, error.field, error.problem);
            }
            bail!("{} field(s) failed validation", errors.len())
        }
        Err(err) => Err(err.into()),
    }
}

async fn handle_add(controller: &mut MasterController, cmd: AddCommand) -> Result<()> {
    let kind = cmd.kind;
    load(controller, kind).await?;
    controller.begin_create()?;
    let mut data = controller
        .form()
        .context("form did not open")?
        .into_data();
    apply_assignments(controller, &mut data, cmd.set)?;

    let id = submit(controller, data).await?;
    println!("Created {} {id}", kind.singular());
    Ok(())
}

async fn handle_edit(controller: &mut MasterController, cmd: EditCommand) -> Result<()> {
    let kind = cmd.kind;
    load(controller, kind).await?;
    controller.begin_edit_id(&cmd.id)?;
    let mut data = controller
        .form()
        .context("form did not open")?
        .into_data();
    apply_assignments(controller, &mut data, cmd.set)?;

    let id = submit(controller, data).await?;
    println!("Updated {} {id}", kind.singular());
    Ok(())
}

async fn handle_delete(controller: &mut MasterController, cmd: &DeleteCommand) -> Result<()> {
    let kind = cmd.kind;
    load(controller, kind).await?;

    let status = if cmd.yes {
        controller.delete(&cmd.id, &|_: &str| true).await?
    } else {
        controller.delete(&cmd.id, &StdinConfirm).await?
    };
    match status {
        DeleteStatus::Deleted => println!("Deleted {} {}", kind.singular(), cmd.id),
        DeleteStatus::Declined => println!("Cancelled."),
    }
    Ok(())
}

async fn handle_options(controller: &mut MasterController, cmd: &OptionsCommand) -> Result<()> {
    load(controller, cmd.kind).await?;
    let fields: Vec<_> = controller
        .resolved_fields()
        .into_iter()
        .filter(|field| field.input == InputKind::Select)
        .collect();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
        return Ok(());
    }
    if fields.is_empty() {
        println!("{} has no select fields.", controller.schema().label);
    }
    for field in &fields {
        println!("{} ({}):", field.label, field.name);
        if field.options.is_empty() {
            println!("  (none)");
        }
        for option in &field.options {
            println!("  {}  {}", option.value, option.label);
        }
    }
    Ok(())
}

fn handle_config(path: Option<std::path::PathBuf>, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::extract(path)?.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                let backend = &config.backend;
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Backend]");
                println!("  Kind:          {}", backend.kind.name());
                println!("  URL:           {}", backend.url.as_deref().unwrap_or(UNSET));
                println!("  API key:       {}", backend.api_key.as_deref().unwrap_or(UNSET));
                println!(
                    "  Access token:  {}",
                    backend.access_token.as_deref().unwrap_or(UNSET)
                );
                println!("  Timeout (s):   {}", backend.timeout_secs);
                println!("  Database path: {}", config.database_path().display());
            }
        }
        ConfigCommand::Path => {
            println!(
                "{}",
                path.unwrap_or_else(Config::default_config_path).display()
            );
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
