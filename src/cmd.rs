use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;
use crate::db::{OnError, DB};
use crate::import::{import_establishments, ImportReport};
use crate::logger::info;
use crate::lookup::{copy_instructions, generate_lookup_files, read_lookup_file, LookupKind};
use crate::record::SourceTable;
use crate::resolver::ResolveMode;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write the category and neighborhood files from the source CSV
    Generate {
        /// Source CSV (overrides files.source)
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Bulk-load the generated files into the barrio and categoria tables
    LoadLookups,
    /// Resolve ids and insert every establishment in one transaction
    Import {
        /// Source CSV (overrides files.source)
        #[arg(long)]
        source: Option<PathBuf>,
        /// What to do when a row fails to insert
        #[arg(long, value_enum)]
        on_error: Option<OnError>,
        /// How names are resolved to ids
        #[arg(long, value_enum)]
        resolve: Option<ResolveMode>,
    },
}

impl Command {
    pub fn run(self, mut config: Config) -> Result<()> {
        match self {
            Command::Generate { source } => {
                if let Some(source) = source {
                    config.files.source = source;
                }
                generate(&config)
            }
            Command::LoadLookups => load_lookups(&config),
            Command::Import {
                source,
                on_error,
                resolve,
            } => {
                if let Some(source) = source {
                    config.files.source = source;
                }
                if let Some(on_error) = on_error {
                    config.import.on_error = on_error;
                }
                if let Some(resolve) = resolve {
                    config.import.resolve = resolve;
                }
                import(&config)
            }
        }
    }
}

fn generate(config: &Config) -> Result<()> {
    let generated = generate_lookup_files(&config.files)?;
    for file in &generated {
        println!(
            "Generated {} ({} {} values)",
            file.path.display(),
            file.count,
            file.kind.table()
        );
    }
    println!("Now load them into the database with:");
    for line in copy_instructions(&config.files) {
        println!("{}", line);
    }
    println!("or run `alojamientos-import load-lookups`, then `alojamientos-import import`.");
    Ok(())
}

fn load_lookups(config: &Config) -> Result<()> {
    let mut store = DB::connect(&config.connection)?;
    info(&format!("loading lookups into {}", config.connection.label()));

    for kind in [LookupKind::Neighborhood, LookupKind::Category] {
        let path = kind.file(&config.files);
        let names = read_lookup_file(path, config.files.delimiter)
            .with_context(|| format!("run `generate` before loading {}", kind.table()))?;
        let loaded = store.bulk_load(kind, &names)?;
        info(&format!("loaded {} rows into {}", loaded, kind.table()));
        println!("Loaded {} rows into {} from {}", loaded, kind.table(), path.display());
    }
    Ok(())
}

fn import(config: &Config) -> Result<()> {
    let table = SourceTable::read(&config.files.source, config.files.delimiter)?;
    let mut store = DB::connect(&config.connection)?;
    info(&format!(
        "importing {} into {} (resolve={:?}, on_error={:?})",
        config.files.source.display(),
        config.connection.label(),
        config.import.resolve,
        config.import.on_error
    ));

    let report = import_establishments(store.as_mut(), &table, &config.import)?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &ImportReport) {
    for kind in &report.empty_lookups {
        println!(
            "Warning: {} is empty; run the COPY step (or `load-lookups`) before importing",
            kind.table()
        );
    }
    println!(
        "Inserted {} of {} establishments",
        report.summary.inserted, report.rows
    );
    if report.unresolved_categories > 0 {
        println!(
            "{} rows have no matching categoria (stored as NULL)",
            report.unresolved_categories
        );
    }
    if report.unresolved_neighborhoods > 0 {
        println!(
            "{} rows have no matching barrio (stored as NULL)",
            report.unresolved_neighborhoods
        );
    }
    for skipped in &report.summary.skipped {
        println!("Skipped {}: {}", skipped.nro_registro, skipped.reason);
    }
}
