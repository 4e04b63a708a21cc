//! Tic-tac-toe board and rules.

pub mod rules;
mod types;

pub use types::{BOARD_SIZE, Board, BoardError, BoardParseError, Cell, Mark, Outcome};
