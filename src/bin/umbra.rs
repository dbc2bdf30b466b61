//! Command-line front end: validates entity manifests and shows how each
//! field will be mapped.
#![forbid(unsafe_code)]

#[path = "umbra/ui.rs"]
mod ui;

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use umbra::logging::{init_logging, level_for_verbosity};
use umbra::{EntityKind, GraphContext, Manifest, MappingConfig, MemoryGraph};

use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "umbra",
    version,
    about = "Inspect object-graph mappings",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "UMBRA_CONFIG",
        value_name = "FILE",
        help = "Mapping configuration file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, value_enum, default_value_t = Theme::Auto, help = "Color theme")]
    theme: Theme,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "More log output (repeatable)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Register a manifest and print the mapping of every field")]
    Check {
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,
    },
    #[command(about = "Print the effective mapping configuration")]
    Config,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    manifest: String,
    entity_types: Vec<TypeReport>,
}

#[derive(Debug, Serialize)]
struct TypeReport {
    name: String,
    kind: EntityKind,
    parent: Option<String>,
    fields: Vec<FieldReport>,
}

#[derive(Debug, Serialize)]
struct FieldReport {
    name: String,
    declared_by: String,
    capability: &'static str,
    store_name: String,
    index: Option<String>,
    accessor: Option<&'static str>,
    listeners: Vec<&'static str>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let level = std::env::var("RUST_LOG")
        .ok()
        .filter(|_| cli.verbose == 0)
        .unwrap_or_else(|| level_for_verbosity(cli.verbose).to_string());
    init_logging(&level)?;

    let config = MappingConfig::load(cli.config.clone())?;
    let ui = Ui::new(cli.theme);

    match &cli.command {
        Command::Check { manifest } => {
            let report = check(config, manifest)?;
            emit(&cli.format, &report, |_| print_check_text(&ui, &report))?;
        }
        Command::Config => match cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
            OutputFormat::Text => print!("{}", config.to_toml()?),
        },
    }
    Ok(())
}

fn check(config: MappingConfig, path: &Path) -> Result<CheckReport, Box<dyn Error>> {
    let manifest = Manifest::from_file(path)?;
    let ctx = GraphContext::new(Arc::new(MemoryGraph::new()), config);
    let registered = manifest.apply(&ctx)?;

    let entity_types = registered
        .iter()
        .map(|entity_type| TypeReport {
            name: entity_type.name().to_string(),
            kind: entity_type.kind(),
            parent: entity_type.parent().map(str::to_string),
            fields: ctx
                .field_plan(entity_type)
                .into_iter()
                .map(|plan| FieldReport {
                    name: plan.field.name.clone(),
                    declared_by: plan.field.declaring_type.clone(),
                    capability: plan.field.kind.label(),
                    store_name: plan.field.key().to_string(),
                    index: plan.field.index().map(str::to_string),
                    accessor: plan.accessor,
                    listeners: plan.listeners,
                })
                .collect(),
        })
        .collect();

    Ok(CheckReport {
        manifest: path.display().to_string(),
        entity_types,
    })
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}

fn print_check_text(ui: &Ui, report: &CheckReport) {
    for entity_type in &report.entity_types {
        let title = match &entity_type.parent {
            Some(parent) => format!(
                "{} ({}, extends {parent})",
                entity_type.name, entity_type.kind
            ),
            None => format!("{} ({})", entity_type.name, entity_type.kind),
        };
        ui.heading(&title);
        let rows: Vec<Vec<String>> = entity_type
            .fields
            .iter()
            .map(|field| {
                let store = match &field.index {
                    Some(index) => format!("{} [{index}]", field.store_name),
                    None => field.store_name.clone(),
                };
                vec![
                    field.name.clone(),
                    field.capability.to_string(),
                    store,
                    field.accessor.unwrap_or("in-memory").to_string(),
                    field.listeners.join(","),
                ]
            })
            .collect();
        ui.table(&rows);
        println!();
    }
    ui.success(&format!(
        "{}: {} entity types registered",
        report.manifest,
        report.entity_types.len()
    ));
}
