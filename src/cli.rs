use clap::{Parser, Subcommand};

use crate::config::Config;

/// Command-line front end: replays page visits and popup queries against a
/// session file.
/// Exit codes: 0=success, 2=invalid arguments, 3=I/O or storage error, 4=lookup error
#[derive(Parser, Debug)]
#[command(name = "vendor_disclosure")]
#[command(about = "Detect the consent-management vendors a site discloses")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = "./session.json",
        help = "Session file shared between runs"
    )]
    pub session_file: String,

    #[arg(long, global = true, help = "Write rotating log files to this directory")]
    pub log_dir: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Visit pages as if the user navigated to them, recording vendors on first sight.
    Visit {
        #[arg(required = true, help = "Page URLs to visit")]
        urls: Vec<String>,

        #[arg(
            short,
            long,
            default_value = Config::USER_AGENT,
            help = "User agent string for requests"
        )]
        user_agent: String,

        #[arg(short, long, help = "Request timeout in seconds (none by default)")]
        timeout: Option<u64>,
    },

    /// Print what the session knows about a page, or null.
    Query {
        #[arg(help = "Page URL to look up")]
        url: String,
    },

    /// Empty the session, as on a fresh install.
    Reset,
}

impl Cli {
    /// Parse CLI arguments; clap prints help and exits with code 2 on error.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
