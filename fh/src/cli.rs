//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// FanHub - real-time fan-out message hub
#[derive(Parser)]
#[command(
    name = "fh",
    about = "Real-time fan-out message hub over WebSocket",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the hub and accept WebSocket peers
    Serve {
        /// Address to listen on (overrides server.listen)
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Join a hub interactively: stdin lines are sent, messages are printed
    Connect {
        /// Hub URL (overrides client.url)
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fanhub")
        .join("logs")
        .join("fanhub.log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_with_listen() {
        let cli = Cli::parse_from(["fh", "serve", "--listen", "0.0.0.0:9000"]);
        match cli.command {
            Command::Serve { listen } => assert_eq!(listen.as_deref(), Some("0.0.0.0:9000")),
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["fh", "connect", "-l", "debug", "--url", "ws://h/ws"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Connect { url } => assert_eq!(url.as_deref(), Some("ws://h/ws")),
            _ => panic!("Wrong command"),
        }
    }

    #[test]
    fn test_log_path_ends_with_log_file() {
        assert!(get_log_path().ends_with("fanhub/logs/fanhub.log"));
    }
}
