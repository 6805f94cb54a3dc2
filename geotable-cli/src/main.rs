mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use error::{exit_with_error, CliError};
use geotable_storage::config::MIN_BUFFER_CAPACITY;
use geotable_storage::TableConfig;

fn init_tracing(cli: &Cli) {
    // --quiet   → "off", whatever RUST_LOG says
    // --verbose → RUST_LOG if set, otherwise "info"
    // default   → RUST_LOG if set, otherwise "off"
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "off".into())
    };

    let ansi = !(cli.no_color || std::env::var_os("NO_COLOR").is_some());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    init_tracing(&cli);

    if let Err(e) = run(cli) {
        exit_with_error(e);
    }
}

fn run(cli: Cli) -> error::CliResult<()> {
    let mut config = TableConfig::default();
    if let Some(capacity) = cli.buffer_capacity {
        if capacity < MIN_BUFFER_CAPACITY {
            return Err(CliError::Usage(format!(
                "--buffer-capacity must be at least {MIN_BUFFER_CAPACITY} bytes"
            )));
        }
        config = config.with_buffer_capacity(capacity);
    }

    match cli.command {
        Commands::Info { file } => commands::info::run(&file, config),
        Commands::Dump { file, limit } => commands::dump::run(&file, config, limit),
        Commands::Search { file, bbox, rows } => commands::search::run(&file, config, bbox, rows),
    }
}
