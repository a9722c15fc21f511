/// CLI argument parsing
///
/// Running without a subcommand performs one refresh cycle.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// Build timestamp injected at compile time by build.rs
pub const VERSION_WITH_BUILD: &str = concat!(env!("CARGO_PKG_VERSION"), " (built: ", env!("BUILD_TIMESTAMP"), ")");

#[derive(Parser, Debug)]
#[command(name = "inkystat")]
#[command(author, version = VERSION_WITH_BUILD, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/inkystat/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Redraw the display if any metric changed (default)
    Refresh {
        /// Redraw even if nothing changed
        #[arg(short, long)]
        force: bool,
    },

    /// Print the current metrics without touching the display
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Render the current metrics to a PNG file
    Preview {
        /// Output file (default: inky-preview.png next to the executable)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Forget the persisted snapshot so the next run redraws
    Reset,
}

impl Cli {
    /// Subcommand to run, defaulting to a plain refresh
    pub fn resolved_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Refresh { force: false })
    }
}
