mod cmd;
mod config;
mod connection;
mod csv_file;
mod db;
mod import;
mod logger;
mod lookup;
mod record;
mod resolver;

use clap::Parser;
use std::path::PathBuf;

use crate::{
    cmd::Command,
    config::Config,
    logger::{error, init, LogLevel},
};

const LOG_FILE: &str = "alojamientos-import.log";

/// Import lodging establishments from alojamientos.csv.
///
/// Run `generate`, load the lookup tables (by hand with COPY or with
/// `load-lookups`), then `import`.
#[derive(Debug, Parser)]
#[command(name = "alojamientos-import", version)]
struct Cli {
    /// YAML config file [default: <config dir>/alojamientos-import/config.yaml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimum level written to the log file (overrides ALOJAMIENTOS_LOG)
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize file logging under the app config directory
    if let Ok(dir) = config::get_app_config_path() {
        let _ = init(dir.join(LOG_FILE), cli.log_level);
    }

    let result = Config::load(cli.config.as_deref()).and_then(|config| cli.command.run(config));

    if let Err(err) = &result {
        error(&format!("fatal error: {:?}", err));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::OnError;
    use crate::resolver::ResolveMode;

    #[test]
    fn cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_import_flags() {
        let cli = Cli::try_parse_from([
            "alojamientos-import",
            "--config",
            "dev/config.yaml",
            "import",
            "--on-error",
            "skip",
            "--resolve",
            "per-row",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("dev/config.yaml")));
        match cli.command {
            Command::Import {
                source,
                on_error,
                resolve,
            } => {
                assert_eq!(source, None);
                assert_eq!(on_error, Some(OnError::Skip));
                assert_eq!(resolve, Some(ResolveMode::PerRow));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "alojamientos-import",
            "generate",
            "--source",
            "other.csv",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        assert!(matches!(cli.command, Command::Generate { source: Some(_) }));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["alojamientos-import"]).is_err());
    }
}
