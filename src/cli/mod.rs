//! CLI module for Logbook.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Logbook - voice-driven construction site logbook
///
/// Record a spoken status report, answer follow-up questions until the entry
/// is complete, and append it to the site logbook.
#[derive(Parser, Debug)]
#[command(name = "logbook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log a recorded report interactively
    Record {
        /// Audio file with the spoken report (wav, mp3, ogg, flac, m4a, webm)
        audio: String,

        /// Trade the report belongs to (asked interactively if omitted)
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Start the HTTP backend for the capture form
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// List the available trades
    Domains,

    /// Show the most recent logbook entries (CSV store)
    Entries {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_record() {
        let cli = Cli::parse_from(["logbook", "-vv", "record", "bericht.wav", "--domain", "Elektro"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Record { audio, domain } => {
                assert_eq!(audio, "bericht.wav");
                assert_eq!(domain.as_deref(), Some("Elektro"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::parse_from(["logbook", "serve"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 3000);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
