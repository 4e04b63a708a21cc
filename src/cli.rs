//! Command-line interface for n3tp.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// N3TP - two-player tic-tac-toe over a line protocol
#[derive(Parser, Debug)]
#[command(name = "n3tp")]
#[command(about = "Two-player tic-tac-toe server and client", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Optional TOML config file with [server] and [client] tables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server
    Serve {
        /// Port to bind to (default 4999)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (default 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Seconds to let running games finish after the listener closes
        #[arg(long)]
        drain_timeout: Option<u64>,
    },

    /// Join a game from the terminal
    Play {
        /// Server host (default 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Server port (default 4999)
        #[arg(short, long)]
        port: Option<u16>,

        /// Display name; prompted for if omitted
        #[arg(short, long)]
        name: Option<String>,

        /// Milliseconds between turn polls (never below 1000)
        #[arg(long)]
        poll_interval: Option<u64>,
    },
}
