//! Per-connection N3TP command handler.
//!
//! One [`CommandHandler`] runs per connected participant. It reads one line
//! at a time, applies it to the [`SharedSession`], and writes one reply.
//! The handler owns turn enforcement: the session will accept any move, so
//! the turn check and the submission run together under the session gate.

use crate::games::tictactoe::Outcome;
use crate::protocol::{ChooseArgs, Command, ProtocolError, Reply};
use crate::session::{PlayerNumber, SessionError, SharedSession};
use derive_getters::Getters;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

/// Longest accepted line, newline included.
pub const MAX_LINE_BYTES: usize = 1024;

/// Protocol state of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerState {
    /// No JOIN accepted yet.
    Unregistered,
    /// Holds a seat.
    Registered {
        /// Seat assigned at JOIN.
        seat: PlayerNumber,
        /// Capitalized display name.
        name: String,
    },
    /// Loop has ended.
    Terminated,
}

/// Why a handler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerExit {
    /// Participant sent QUIT.
    Quit,
    /// JOIN refused because both seats were taken.
    SessionFull,
    /// Terminal status was delivered.
    GameOver(Outcome),
    /// Remote side closed the stream.
    Disconnected,
    /// Read or write failed.
    Transport,
    /// Peer sent a line longer than [`MAX_LINE_BYTES`].
    LineTooLong,
}

/// Final state of a handler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Getters)]
pub struct HandlerReport {
    /// Why the loop ended.
    exit: HandlerExit,
    /// Seat held when it ended, if any.
    seat: Option<PlayerNumber>,
}

/// Whether the loop keeps going after a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Read the next line.
    Continue,
    /// Stop after sending the reply.
    Stop(HandlerExit),
}

/// Translates one participant's commands into session operations.
#[derive(Debug)]
pub struct CommandHandler {
    session: SharedSession,
    state: HandlerState,
    peer: String,
}

impl CommandHandler {
    /// Creates a handler for the connection labelled `peer` (used in logs).
    pub fn new(session: SharedSession, peer: impl Into<String>) -> Self {
        Self {
            session,
            state: HandlerState::Unregistered,
            peer: peer.into(),
        }
    }

    /// Current protocol state.
    pub fn state(&self) -> &HandlerState {
        &self.state
    }

    /// Seat held by this connection.
    pub fn seat(&self) -> Option<PlayerNumber> {
        match self.state {
            HandlerState::Registered { seat, .. } => Some(seat),
            _ => None,
        }
    }

    /// Serves a TCP connection until it ends.
    pub async fn serve(self, stream: TcpStream) -> HandlerReport {
        let (read, write) = stream.into_split();
        self.run(BufReader::new(read), write).await
    }

    /// Main loop.
    ///
    /// The decided-game check runs before every read and again before a
    /// line that was already pending is processed, so a finished game halts
    /// both handlers at their next opportunity. Any I/O failure, or a line
    /// longer than [`MAX_LINE_BYTES`], ends this handler only.
    #[instrument(skip_all, fields(peer = %self.peer))]
    pub async fn run<R, W>(mut self, mut reader: R, mut writer: W) -> HandlerReport
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Handler started");
        let mut line = String::new();

        let exit = loop {
            if let Some(exit) = self.deliver_outcome(&mut writer).await {
                break exit;
            }

            line.clear();
            let limit = MAX_LINE_BYTES as u64;
            match (&mut reader).take(limit).read_line(&mut line).await {
                Ok(0) => {
                    info!("Connection closed by peer");
                    break HandlerExit::Disconnected;
                }
                Ok(n) if n == MAX_LINE_BYTES && !line.ends_with('\n') => {
                    warn!(bytes = n, "Line too long, closing connection");
                    let reply = Reply::Protocol(ProtocolError::LineTooLong {
                        limit: MAX_LINE_BYTES,
                    });
                    if let Err(e) = write_reply(&mut writer, &reply).await {
                        debug!(error = %e, "Write failed");
                    }
                    break HandlerExit::LineTooLong;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Read failed");
                    break HandlerExit::Transport;
                }
            }

            if let Some(exit) = self.deliver_outcome(&mut writer).await {
                break exit;
            }

            let (reply, step) = self.handle_line(line.trim_end_matches(['\r', '\n']));
            if let Err(e) = write_reply(&mut writer, &reply).await {
                warn!(error = %e, "Write failed");
                break HandlerExit::Transport;
            }
            if let Step::Stop(exit) = step {
                break exit;
            }
        };

        let report = HandlerReport {
            exit,
            seat: self.seat(),
        };
        self.state = HandlerState::Terminated;
        if let Err(e) = writer.shutdown().await {
            debug!(error = %e, "Shutdown after exit failed");
        }
        info!(?report, "Handler finished");
        report
    }

    /// Sends the terminal status if the game is decided.
    async fn deliver_outcome<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> Option<HandlerExit> {
        let status = self.session.winner_status();
        if !status.is_decided() {
            return None;
        }
        debug!(?status, "Game decided, sending terminal status");
        match write_reply(writer, &Reply::GameOver(status)).await {
            Ok(()) => Some(HandlerExit::GameOver(status)),
            Err(e) => {
                warn!(error = %e, "Write failed");
                Some(HandlerExit::Transport)
            }
        }
    }

    /// Applies one protocol line and returns the reply to send.
    ///
    /// A connection that has not joined by the time both seats are taken
    /// gets the session-full reply to whatever it sends, and is closed.
    #[instrument(skip(self), fields(peer = %self.peer))]
    pub fn handle_line(&mut self, line: &str) -> (Reply, Step) {
        if self.state == HandlerState::Unregistered
            && self.session.read(|s| s.player_count() >= 2)
        {
            warn!("Unjoined connection while session is full, closing");
            self.state = HandlerState::Terminated;
            return (Reply::SessionFull, Step::Stop(HandlerExit::SessionFull));
        }

        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(e) => {
                debug!(error = %e, "Malformed command");
                return (Reply::Protocol(e), Step::Continue);
            }
        };

        match command {
            Command::Join { name } => self.join(name),
            Command::PlayerTurn => (
                Reply::Turn {
                    active: self.session.active_player(),
                    mine: self.seat(),
                },
                Step::Continue,
            ),
            Command::BoardState => (Reply::Board(self.session.render_board()), Step::Continue),
            Command::Choose(args) => self.choose(&args),
            Command::Quit => {
                info!(seat = ?self.seat(), "Participant quit");
                (Reply::Aborting, Step::Stop(HandlerExit::Quit))
            }
        }
    }

    fn join(&mut self, name: String) -> (Reply, Step) {
        if let HandlerState::Registered { seat, .. } = self.state {
            return (Reply::AlreadyJoined { seat }, Step::Continue);
        }

        match self.session.register_player(&name) {
            Ok(seat) => {
                info!(%name, %seat, "Player joined");
                self.state = HandlerState::Registered {
                    seat,
                    name: name.clone(),
                };
                (Reply::Welcome { name, seat }, Step::Continue)
            }
            Err(SessionError::SessionFull) => {
                warn!(%name, "Join refused, session full");
                self.state = HandlerState::Terminated;
                (Reply::SessionFull, Step::Stop(HandlerExit::SessionFull))
            }
        }
    }

    fn choose(&self, args: &ChooseArgs) -> (Reply, Step) {
        let HandlerState::Registered { seat, .. } = self.state else {
            return (Reply::NotJoined, Step::Continue);
        };

        self.session.with(|session| {
            if let Some(outcome) = session.outcome() {
                return (Reply::GameOver(outcome), Step::Stop(HandlerExit::GameOver(outcome)));
            }
            if !session.started() {
                return (Reply::NotStarted, Step::Continue);
            }
            if session.active_player() != Some(seat) {
                debug!(%seat, "Move out of turn");
                let name = session.player_name(seat).to_string();
                return (Reply::NotYourTurn { name }, Step::Continue);
            }
            let (row, col) = match args.coordinates() {
                Ok(coordinates) => coordinates,
                Err(e) => return (Reply::Protocol(e), Step::Continue),
            };
            match session.submit_move(seat, row, col) {
                Ok(()) => {
                    info!(%seat, row, col, "Move accepted");
                    (Reply::Board(session.render_board()), Step::Continue)
                }
                Err(e) => (Reply::MoveRejected(e), Step::Continue),
            }
        })
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &Reply) -> std::io::Result<()> {
    let mut text = reply.to_string();
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}
