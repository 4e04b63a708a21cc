//! Fullness detection for tic-tac-toe.

use super::super::{Board, Cell};
use tracing::instrument;

/// Checks if the board is full (all cells occupied).
///
/// A full board with no decisive line is a draw.
#[instrument(skip(board), level = "trace")]
pub fn is_full(board: &Board) -> bool {
    board.rows().iter().flatten().all(|c| *c != Cell::Empty)
}
