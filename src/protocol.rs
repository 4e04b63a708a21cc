//! N3TP command grammar and reply texts.
//!
//! Every message is one line of UTF-8 text. Commands are a keyword followed
//! by space-separated arguments; the keyword is matched without regard to
//! case. Replies are plain text, newline-terminated on the wire.

use crate::games::tictactoe::{BoardError, Outcome};
use crate::session::PlayerNumber;
use derive_more::{Display, Error};
use std::str::FromStr;
use tracing::instrument;

/// Command keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Keyword {
    /// `JOIN <name>`
    Join,
    /// `PLAYERTURN`
    PlayerTurn,
    /// `BOARDSTATE`
    BoardState,
    /// `CHOOSE <row> <col>`
    Choose,
    /// `QUIT`
    Quit,
}

/// Malformed input. Reported to the sender; the connection stays open.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ProtocolError {
    /// First token is not a known keyword.
    #[display("Unknown command: {}", line)]
    UnknownCommand {
        /// The offending line, trimmed.
        line: String,
    },
    /// Keyword given without its required arguments.
    #[display("Missing argument for {}.", keyword)]
    MissingArgument {
        /// Command that was short.
        keyword: Keyword,
    },
    /// CHOOSE coordinates are not integers.
    #[display("Non-numerical input for the positions. Try again")]
    NonNumeric,
    /// Line ran past the size limit without a newline.
    #[display("Line exceeds {} bytes.", limit)]
    LineTooLong {
        /// Maximum line size, newline included.
        limit: usize,
    },
}

/// Raw CHOOSE arguments.
///
/// Kept unparsed so the handler can report game-state problems (not
/// started, not your turn) before complaining about the coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChooseArgs {
    row: Option<String>,
    col: Option<String>,
}

impl ChooseArgs {
    /// Builds arguments from optional tokens.
    pub fn new(row: Option<String>, col: Option<String>) -> Self {
        Self { row, col }
    }

    /// Parses `(row, col)`.
    ///
    /// Signed so that negative coordinates reach the board and come back as
    /// out-of-bounds rather than non-numeric.
    pub fn coordinates(&self) -> Result<(isize, isize), ProtocolError> {
        let (Some(row), Some(col)) = (&self.row, &self.col) else {
            return Err(ProtocolError::MissingArgument {
                keyword: Keyword::Choose,
            });
        };
        match (row.parse::<isize>(), col.parse::<isize>()) {
            (Ok(r), Ok(c)) => Ok((r, c)),
            _ => Err(ProtocolError::NonNumeric),
        }
    }
}

/// A parsed inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Claim a seat under `name` (already capitalized).
    Join {
        /// Display name.
        name: String,
    },
    /// Ask whose turn it is.
    PlayerTurn,
    /// Ask for the rendered board.
    BoardState,
    /// Place a mark.
    Choose(ChooseArgs),
    /// Leave.
    Quit,
}

impl FromStr for Command {
    type Err = ProtocolError;

    #[instrument(level = "trace")]
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let keyword = tokens
            .next()
            .and_then(|t| Keyword::from_str(t).ok())
            .ok_or_else(|| ProtocolError::UnknownCommand {
                line: line.trim().to_string(),
            })?;

        let command = match keyword {
            Keyword::Join => {
                let name = tokens
                    .next()
                    .ok_or(ProtocolError::MissingArgument { keyword })?;
                Command::Join {
                    name: capitalize(name),
                }
            }
            Keyword::PlayerTurn => Command::PlayerTurn,
            Keyword::BoardState => Command::BoardState,
            Keyword::Choose => Command::Choose(ChooseArgs::new(
                tokens.next().map(str::to_string),
                tokens.next().map(str::to_string),
            )),
            Keyword::Quit => Command::Quit,
        };
        Ok(command)
    }
}

/// Uppercases the first letter of `name` and lowercases the rest.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Text the server sends back.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Reply {
    /// Registration succeeded.
    #[display("Hello {}! You are player number {}", name, seat)]
    Welcome {
        /// Capitalized name.
        name: String,
        /// Assigned seat.
        seat: PlayerNumber,
    },
    /// No seat left; the connection will close.
    #[display("Sorry, all player spaces are taken.")]
    SessionFull,
    /// JOIN sent twice on one connection.
    #[display("You have already joined as player number {}.", seat)]
    AlreadyJoined {
        /// Seat held by this connection.
        seat: PlayerNumber,
    },
    /// CHOOSE sent before JOIN.
    #[display("You must JOIN before choosing a move.")]
    NotJoined,
    /// CHOOSE before the second player registered.
    #[display("There are not two players yet. Please wait and try again.")]
    NotStarted,
    /// CHOOSE out of turn.
    #[display("Sorry {}. It is not your turn.", name)]
    NotYourTurn {
        /// Name of the caller.
        name: String,
    },
    /// PLAYERTURN answer: `<active>,<mine>`.
    #[display(
        "{},{}",
        PlayerNumber::wire_value(*active),
        PlayerNumber::wire_value(*mine)
    )]
    Turn {
        /// Seat to move.
        active: Option<PlayerNumber>,
        /// Seat held by this connection.
        mine: Option<PlayerNumber>,
    },
    /// Rendered board.
    #[display("{}", _0)]
    Board(String),
    /// Board refused the move.
    #[display("{}", _0)]
    MoveRejected(BoardError),
    /// Malformed command.
    #[display("{}", _0)]
    Protocol(ProtocolError),
    /// QUIT acknowledgement.
    #[display("Aborting game")]
    Aborting,
    /// Game over.
    #[display("{}", terminal_message(*_0))]
    GameOver(Outcome),
}

fn terminal_message(outcome: Outcome) -> String {
    match (outcome.winner(), outcome) {
        (Some(mark), _) => format!("{mark} is the winner!"),
        (None, Outcome::Full) => "The board is full, it is a draw.".to_string(),
        (None, _) => "The game is still in progress.".to_string(),
    }
}

/// True if `response` tells a client the game has ended.
pub fn signals_game_over(response: &str) -> bool {
    response.contains("full,") || response.contains("winner!")
}
