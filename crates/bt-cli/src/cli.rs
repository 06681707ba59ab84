//! Command-line argument definitions.

use std::path::PathBuf;

use bt_core::CompilerLanguage;
use clap::{Parser, Subcommand};

/// Build event replay tool.
///
/// Reconstructs per-project, per-target-framework compiler inputs from
/// recorded build events.
#[derive(Debug, Parser)]
#[command(name = "bt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a JSON Lines dump of build events and print the results.
    Replay {
        /// File with one serialized build event per line.
        events: PathBuf,

        /// Only track this project instead of the first one seen.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Tokenize a compiler command line and print its arguments.
    Parse {
        /// Compiler family (csharp, visualbasic, fsharp).
        language: CompilerLanguage,

        /// The command line; quote it as a single argument to keep its quoting.
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command_line: Vec<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
