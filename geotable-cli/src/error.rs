use colored::Colorize;
use std::fmt;
use std::process;

/// Exit codes for the CLI.
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Unified error type for CLI operations.
pub enum CliError {
    /// Error from the storage layer.
    Store(geotable_storage::StoreError),
    /// Unreadable input or unwritable output.
    Input(String),
    /// The table has no populated spatial index.
    NoIndex(String),
    /// Argument / usage errors.
    Usage(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Store(e) if e.is_format() => write!(
                f,
                "{} {e}\n  {} the file is not a readable geotable \
                 (or needs a larger --buffer-capacity)",
                "error:".red().bold(),
                "help:".cyan().bold(),
            ),
            CliError::Store(e) => write!(f, "{} {e}", "error:".red().bold()),
            CliError::Input(msg) => write!(f, "{} {msg}", "error:".red().bold()),
            CliError::NoIndex(path) => write!(
                f,
                "{} {path} has no populated spatial index\n  \
                 {} rewrite the table with index building enabled",
                "error:".red().bold(),
                "help:".cyan().bold(),
            ),
            CliError::Usage(msg) => write!(f, "{} {msg}", "error:".red().bold()),
        }
    }
}

impl fmt::Debug for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<geotable_storage::StoreError> for CliError {
    fn from(e: geotable_storage::StoreError) -> Self {
        match e {
            geotable_storage::StoreError::Io(io) => CliError::Input(io.to_string()),
            other => CliError::Store(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Input(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Input(format!("JSON error: {e}"))
    }
}

/// Print error and exit with the appropriate code.
pub fn exit_with_error(err: CliError) -> ! {
    eprintln!("{err}");
    let code = match &err {
        CliError::Usage(_) => EXIT_USAGE,
        _ => EXIT_ERROR,
    };
    process::exit(code)
}

pub type CliResult<T> = std::result::Result<T, CliError>;
