//! Core domain types for tic-tac-toe.

use super::rules::{draw, win};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Width and height of the board.
pub const BOARD_SIZE: usize = 3;

/// A placed symbol.
///
/// Parsing is case-insensitive, so `"x"` and `"X"` both yield [`Mark::X`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum Mark {
    /// Player one's mark.
    X,
    /// Player two's mark.
    O,
}

impl Mark {
    /// Signed weight used when summing a line: X counts +1, O counts -1.
    pub fn weight(self) -> i8 {
        match self {
            Mark::X => 1,
            Mark::O => -1,
        }
    }
}

/// A single cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    /// Nothing placed yet.
    #[default]
    Empty,
    /// Cell holds a mark.
    Occupied(Mark),
}

impl Cell {
    /// Line weight of this cell (empty counts zero).
    pub fn weight(self) -> i8 {
        match self {
            Cell::Empty => 0,
            Cell::Occupied(mark) => mark.weight(),
        }
    }

    /// Symbol used in the textual rendering.
    pub fn symbol(self) -> char {
        match self {
            Cell::Empty => '_',
            Cell::Occupied(Mark::X) => 'X',
            Cell::Occupied(Mark::O) => 'O',
        }
    }
}

/// Result of evaluating a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    /// A line is all X.
    XWins,
    /// A line is all O.
    OWins,
    /// No decisive line and no empty cell.
    Full,
    /// Play continues.
    Undecided,
}

impl Outcome {
    /// True once the game can no longer continue.
    pub fn is_decided(self) -> bool {
        self != Outcome::Undecided
    }

    /// The winning mark, if any.
    pub fn winner(self) -> Option<Mark> {
        match self {
            Outcome::XWins => Some(Mark::X),
            Outcome::OWins => Some(Mark::O),
            Outcome::Full | Outcome::Undecided => None,
        }
    }
}

/// Reasons a mark cannot be placed.
///
/// The display text is what a player sees when a move is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum BoardError {
    /// Row or column outside `0..3`.
    #[display("Invalid move at position.")]
    OutOfBounds {
        /// Requested row.
        row: isize,
        /// Requested column.
        col: isize,
    },
    /// Target cell already holds a mark.
    #[display("There is already a move at this position")]
    CellOccupied {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },
}

/// Failure to read a board back from its rendering.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Cannot parse board: {}", message)]
pub struct BoardParseError {
    /// What went wrong.
    pub message: String,
}

impl BoardParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// 3x3 tic-tac-toe board, row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cell at `(row, col)`, or `None` outside the grid.
    pub fn cell(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// All rows, top to bottom.
    pub fn rows(&self) -> &[[Cell; BOARD_SIZE]; BOARD_SIZE] {
        &self.cells
    }

    /// Places `mark` at `(row, col)`.
    ///
    /// Bounds are checked before occupancy. A rejected placement leaves the
    /// board untouched.
    #[instrument(skip(self), level = "debug")]
    pub fn place_mark(&mut self, row: isize, col: isize, mark: Mark) -> Result<(), BoardError> {
        let (r, c) = match (usize::try_from(row), usize::try_from(col)) {
            (Ok(r), Ok(c)) if r < BOARD_SIZE && c < BOARD_SIZE => (r, c),
            _ => {
                debug!("Coordinates outside the board");
                return Err(BoardError::OutOfBounds { row, col });
            }
        };

        if self.cells[r][c] != Cell::Empty {
            debug!(existing = ?self.cells[r][c], "Cell already occupied");
            return Err(BoardError::CellOccupied { row: r, col: c });
        }

        self.cells[r][c] = Cell::Occupied(mark);
        Ok(())
    }

    /// Evaluates the position.
    ///
    /// Decisive lines win over fullness, so a ninth move that completes a
    /// line is a win rather than a draw.
    #[instrument(skip(self), level = "trace")]
    pub fn evaluate(&self) -> Outcome {
        match win::check_winner(self) {
            Some(Mark::X) => Outcome::XWins,
            Some(Mark::O) => Outcome::OWins,
            None if self.is_full() => Outcome::Full,
            None => Outcome::Undecided,
        }
    }

    /// True when no cell is empty.
    pub fn is_full(&self) -> bool {
        draw::is_full(self)
    }

    /// Coordinates of every empty cell, row-major.
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        (0..BOARD_SIZE)
            .flat_map(|row| (0..BOARD_SIZE).map(move |col| (row, col)))
            .filter(|&(row, col)| self.cells[row][col] == Cell::Empty)
            .collect()
    }

    /// Renders the grid as three lines of space-separated symbols.
    ///
    /// ```text
    /// X _ O
    /// _ X _
    /// _ _ _
    /// ```
    pub fn render(&self) -> String {
        self.cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.symbol().to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for Board {
    type Err = BoardParseError;

    /// Reads the [`Board::render`] format back. Symbols are case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lines: Vec<&str> = s.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() != BOARD_SIZE {
            return Err(BoardParseError::new(format!(
                "expected {} rows, found {}",
                BOARD_SIZE,
                lines.len()
            )));
        }

        let mut board = Board::new();
        for (row, line) in lines.iter().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != BOARD_SIZE {
                return Err(BoardParseError::new(format!(
                    "row {} has {} cells",
                    row,
                    tokens.len()
                )));
            }
            for (col, token) in tokens.iter().enumerate() {
                board.cells[row][col] = match *token {
                    "_" => Cell::Empty,
                    other => Cell::Occupied(Mark::from_str(other).map_err(|_| {
                        BoardParseError::new(format!("unknown symbol {:?}", other))
                    })?),
                };
            }
        }
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new();
        assert_eq!(board.empty_cells().len(), 9);
        assert!(!board.is_full());
        assert_eq!(board.evaluate(), Outcome::Undecided);
        assert_eq!(board.evaluate().winner(), None);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(Board::new().render(), "_ _ _\n_ _ _\n_ _ _");
    }

    #[test]
    fn test_render_has_no_trailing_separator() {
        let mut board = Board::new();
        board.place_mark(2, 2, Mark::O).unwrap();
        let rendered = board.render();
        assert!(rendered.ends_with("_ _ O"));
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn test_out_of_bounds_leaves_board_unchanged() {
        let mut board = Board::new();
        let before = board.clone();
        assert_eq!(
            board.place_mark(5, 0, Mark::X),
            Err(BoardError::OutOfBounds { row: 5, col: 0 })
        );
        assert_eq!(
            board.place_mark(0, -1, Mark::X),
            Err(BoardError::OutOfBounds { row: 0, col: -1 })
        );
        assert_eq!(board, before);
    }

    #[test]
    fn test_occupied_rejection_is_stable() {
        let mut board = Board::new();
        board.place_mark(1, 1, Mark::X).unwrap();
        let before = board.clone();

        for mark in [Mark::X, Mark::O, Mark::X] {
            assert_eq!(
                board.place_mark(1, 1, mark),
                Err(BoardError::CellOccupied { row: 1, col: 1 })
            );
            assert_eq!(board, before);
        }
    }

    #[test]
    fn test_mark_parse_ignores_case() {
        assert_eq!("x".parse::<Mark>().unwrap(), Mark::X);
        assert_eq!("O".parse::<Mark>().unwrap(), Mark::O);
        assert!("z".parse::<Mark>().is_err());
    }

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(
            BoardError::OutOfBounds { row: 3, col: 0 }.to_string(),
            "Invalid move at position."
        );
        assert_eq!(
            BoardError::CellOccupied { row: 0, col: 0 }.to_string(),
            "There is already a move at this position"
        );
    }

    #[test]
    fn test_parse_rejects_short_board() {
        assert!("X O X\n_ _ _".parse::<Board>().is_err());
        assert!("X O\n_ _ _\n_ _ _".parse::<Board>().is_err());
        assert!("X O Q\n_ _ _\n_ _ _".parse::<Board>().is_err());
    }
}
