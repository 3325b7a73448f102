//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Run native HTTP bridge calls from the command line.
///
/// Each call is a method name (request, downloadFile, setCookie, ...) with a
/// JSON parameter object. Results are printed to stdout as JSON; logs go to
/// stderr.
#[derive(Parser, Debug)]
#[command(name = "http-bridge")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/http-bridge/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server origin used for cookie calls
    #[arg(short = 's', long, global = true)]
    pub server_url: Option<String>,

    /// Base directory holding the symbolic storage directories
    #[arg(short = 'b', long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// JSON file persisting cookies between runs
    #[arg(long, global = true)]
    pub cookie_store: Option<PathBuf>,

    /// Connect timeout in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: Option<u64>,

    /// Read timeout in seconds (1-3600)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout: Option<u64>,

    /// Maximum redirects to follow (0 disables, max 50)
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(0..=50))]
    pub max_redirects: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Execution modes.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a single call and print its result
    Call {
        /// Bridge method, e.g. request or downloadFile
        method: String,
        /// Parameters as a JSON object
        params: Option<String>,
    },
    /// Read `{"id", "method", "params"}` lines from stdin and answer each
    Stdin,
}
