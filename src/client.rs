//! Interactive terminal client for N3TP.
//!
//! Joins once, then polls `PLAYERTURN` until it is this player's turn,
//! shows the board, and asks for a move. The game ends for the client when
//! a reply mentions a winner or a full board.

use crate::config::ClientConfig;
use crate::protocol::{Reply, signals_game_over};
use derive_more::{Display, Error, From};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, info, instrument, warn};

/// How long to keep collecting lines after the first line of a reply.
const SETTLE_WINDOW: Duration = Duration::from_millis(150);

/// Client failures.
#[derive(Debug, Display, Error, From)]
pub enum ClientError {
    /// Could not reach the server.
    #[display("Could not connect to {}: {}", address, source)]
    #[from(ignore)]
    Connect {
        /// Address tried.
        address: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Stream failed mid-game.
    #[display("Connection error: {}", _0)]
    Io(std::io::Error),
    /// Server closed the connection.
    #[display("Connection closed by server")]
    #[from(ignore)]
    Closed,
    /// Reply did not have the expected shape.
    #[display("Unexpected reply: {}", reply)]
    #[from(ignore)]
    UnexpectedReply {
        /// What the server sent.
        reply: String,
    },
}

/// Line-oriented connection to an N3TP server.
#[derive(Debug)]
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    /// Connects to the configured server.
    #[instrument(skip(config), fields(address = %config.server_address()))]
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let address = config.server_address();
        let stream = TcpStream::connect(&address)
            .await
            .map_err(|source| ClientError::Connect {
                address: address.clone(),
                source,
            })?;
        info!("Connected");
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer: write,
        })
    }

    /// Sends one command and collects the reply.
    ///
    /// Replies have no length prefix, so after the first line any further
    /// lines that arrive within a short window are treated as part of the
    /// same reply (boards span three lines, and a deciding move is followed
    /// by the terminal status).
    #[instrument(skip(self))]
    pub async fn request(&mut self, command: &str) -> Result<String, ClientError> {
        self.writer
            .write_all(format!("{command}\n").as_bytes())
            .await?;
        self.writer.flush().await?;

        let mut reply = String::new();
        if self.reader.read_line(&mut reply).await? == 0 {
            return Err(ClientError::Closed);
        }

        let mut next = String::new();
        loop {
            match tokio::time::timeout(SETTLE_WINDOW, self.reader.read_line(&mut next)).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(_)) => {
                    reply.push_str(&next);
                    next.clear();
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
        reply.push_str(&next);

        let reply = reply.trim_end().to_string();
        debug!(%reply, "Reply received");
        Ok(reply)
    }

    /// Asks whose turn it is. Returns `(active, mine)`, or the raw reply if
    /// the game ended instead.
    pub async fn player_turn(&mut self) -> Result<Turn, ClientError> {
        let reply = self.request("PLAYERTURN").await?;
        if signals_game_over(&reply) {
            return Ok(Turn::GameOver(reply));
        }
        parse_turn(&reply).ok_or(ClientError::UnexpectedReply { reply })
    }

    /// Closes the write side.
    pub async fn close(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!(error = %e, "Shutdown failed");
        }
    }
}

/// Answer to a PLAYERTURN poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Active seat and this connection's seat (0 when unassigned).
    Seats {
        /// Seat to move.
        active: u8,
        /// Seat held by this connection.
        mine: u8,
    },
    /// Game ended; holds the terminal message.
    GameOver(String),
}

fn parse_turn(reply: &str) -> Option<Turn> {
    let (active, mine) = reply.trim().split_once(',')?;
    Some(Turn::Seats {
        active: active.trim().parse().ok()?,
        mine: mine.trim().parse().ok()?,
    })
}

/// Plays one game interactively on stdin/stdout.
pub async fn play(config: &ClientConfig, name: Option<String>) -> Result<(), ClientError> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut conn = Connection::connect(config).await?;

    let name = match name {
        Some(name) => name,
        None => match prompt(&mut stdin, "Enter your name: ").await? {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => {
                conn.close().await;
                return Ok(());
            }
        },
    };

    let reply = conn.request(&format!("JOIN {name}")).await?;
    if reply.starts_with(&Reply::SessionFull.to_string()) {
        println!("Sorry, all available spots are taken. Try again later");
        conn.close().await;
        return Ok(());
    }
    println!("{reply}");

    loop {
        if let Some(message) = wait_for_turn(&mut conn, config.poll_interval()).await? {
            println!("{message}");
            break;
        }

        let board = conn.request("BOARDSTATE").await?;
        println!("{board}");
        if signals_game_over(&board) {
            break;
        }

        let input = prompt(
            &mut stdin,
            "Please enter the row and column to place your mark.\n\
             All indexes are 0 based. Example: 1 1 for the center point.\n\
             Separate them with a space, or type quit: ",
        )
        .await?;

        let Some(input) = input else {
            println!("{}", conn.request("QUIT").await?);
            break;
        };
        let tokens: Vec<&str> = input.split_whitespace().collect();
        if tokens.first().is_some_and(|t| t.eq_ignore_ascii_case("quit")) {
            println!("{}", conn.request("QUIT").await?);
            break;
        }
        let [row, col, ..] = tokens.as_slice() else {
            println!("Illegal input.");
            continue;
        };

        let reply = conn.request(&format!("CHOOSE {row} {col}")).await?;
        println!("{reply}");
        if signals_game_over(&reply) {
            println!("Terminating connection.");
            break;
        }
    }

    conn.close().await;
    Ok(())
}

/// Polls until it is this player's turn. Returns the terminal message if
/// the game ends first.
async fn wait_for_turn(
    conn: &mut Connection,
    interval: Duration,
) -> Result<Option<String>, ClientError> {
    loop {
        match conn.player_turn().await? {
            Turn::GameOver(message) => return Ok(Some(message)),
            Turn::Seats { active, mine } if active == mine => return Ok(None),
            Turn::Seats { active, mine } => {
                debug!(active, mine, "Waiting for turn");
            }
        }
        tokio::time::sleep(interval).await;
    }
}

async fn prompt(
    stdin: &mut Lines<BufReader<Stdin>>,
    text: &str,
) -> Result<Option<String>, ClientError> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    let line = stdin.next_line().await?;
    if line.is_none() {
        warn!("Standard input closed");
    }
    Ok(line)
}
