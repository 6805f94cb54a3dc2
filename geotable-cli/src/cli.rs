use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::search::BBox;

#[derive(Parser)]
#[command(name = "geotable", about = "Inspect geotable feature files", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Disable log output, even when RUST_LOG is set
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output (also respects NO_COLOR env var)
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Working buffer size in bytes (largest readable header or feature)
    #[arg(long, global = true)]
    pub buffer_capacity: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show header metadata, columns and index summary
    Info {
        /// Table file
        file: PathBuf,
    },

    /// Print rows as JSON lines
    Dump {
        /// Table file
        file: PathBuf,

        /// Stop after this many rows
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Find features whose envelope intersects a bounding box
    Search {
        /// Table file
        file: PathBuf,

        /// Query box as minx,miny,maxx,maxy
        #[arg(long, allow_hyphen_values = true)]
        bbox: BBox,

        /// Print the matching rows instead of ordinals and offsets
        #[arg(long)]
        rows: bool,
    },
}
