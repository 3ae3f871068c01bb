//! Command-line interface for the gossamer inspection tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gossamer")]
#[command(about = "Inspect gossamer runtime type descriptors and conversions", long_about = None)]
pub struct Cli {
    /// JSON runtime configuration; `GOSSAMER_*` variables apply otherwise
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the descriptor built for a type expression
    Describe {
        /// Type expression, e.g. `map[string][]int`
        #[arg(value_name = "TYPE")]
        ty: String,

        /// Report whether the type implements this interface
        #[arg(long, value_name = "IFACE")]
        against: Option<String>,

        /// Print the description as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a literal value from one type to another
    Convert {
        #[arg(long, value_name = "TYPE")]
        from: String,

        #[arg(long, value_name = "TYPE")]
        to: String,

        #[arg(allow_hyphen_values = true)]
        literal: String,
    },
}
