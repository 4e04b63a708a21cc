//! N3TP - two-player tic-tac-toe over a line-oriented text protocol.
//!
//! A server holds one authoritative game session. Each connected
//! participant gets its own command handler that translates protocol lines
//! into session operations.
//!
//! # Architecture
//!
//! - **Board**: 3x3 grid, win/draw evaluation, textual rendering
//! - **Session**: registration, turn pointer, and the shared access gate
//! - **Handler**: per-connection N3TP state machine
//! - **Server**: listener plus connection supervisor
//! - **Client**: interactive terminal player
//!
//! # Example
//!
//! ```no_run
//! use n3tp::{ServerConfig, start_server};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::default().with_port(0u16);
//! let (handle, address) = start_server(&config).await?;
//! println!("listening on {address}");
//! handle.wait().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod config;
mod games;
mod handler;
mod protocol;
mod server;
mod session;

// Crate-level exports - Game types (tic-tac-toe)
pub use games::tictactoe::{
    BOARD_SIZE, Board, BoardError, BoardParseError, Cell, Mark, Outcome, rules,
};

// Crate-level exports - Session management
pub use session::{PlayerNumber, Session, SessionError, SharedSession};

// Crate-level exports - Protocol
pub use protocol::{ChooseArgs, Command, Keyword, ProtocolError, Reply, capitalize, signals_game_over};

// Crate-level exports - Handler
pub use handler::{
    CommandHandler, HandlerExit, HandlerReport, HandlerState, MAX_LINE_BYTES, Step,
};

// Crate-level exports - Server
pub use server::{ServerError, ServerHandle, ShutdownReason, serve, start_server};

// Crate-level exports - Client
pub use client::{ClientError, Connection, Turn, play};

// Crate-level exports - Configuration
pub use config::{ClientConfig, ConfigError, ConfigFile, DEFAULT_PORT, MIN_POLL_INTERVAL, ServerConfig};
