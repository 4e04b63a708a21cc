//! Win detection logic for tic-tac-toe.

use super::super::{BOARD_SIZE, Board, Cell, Mark};
use tracing::instrument;

/// Line sum that means three X marks.
const X_LINE: i8 = 3;
/// Line sum that means three O marks.
const O_LINE: i8 = -3;

/// Checks if there is a decisive line on the board.
///
/// Each line is scored by summing signed cell weights (X = +1, O = -1).
/// Rows are scanned first, then columns, then the main diagonal
/// `(0,0),(1,1),(2,2)` and finally the anti-diagonal `(2,0),(1,1),(0,2)`.
/// The first decisive line found wins.
#[instrument(skip(board), level = "trace")]
pub fn check_winner(board: &Board) -> Option<Mark> {
    let at = |row: usize, col: usize| board.cell(row, col).map_or(0, Cell::weight);

    let rows = (0..BOARD_SIZE).map(|r| (0..BOARD_SIZE).map(|c| at(r, c)).sum::<i8>());
    let cols = (0..BOARD_SIZE).map(|c| (0..BOARD_SIZE).map(|r| at(r, c)).sum::<i8>());
    let main_diagonal = (0..BOARD_SIZE).map(|k| at(k, k)).sum::<i8>();
    let anti_diagonal = (0..BOARD_SIZE)
        .map(|k| at(BOARD_SIZE - 1 - k, k))
        .sum::<i8>();

    rows.chain(cols)
        .chain([main_diagonal, anti_diagonal])
        .find_map(|sum| match sum {
            X_LINE => Some(Mark::X),
            O_LINE => Some(Mark::O),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(marks: &[(isize, isize, Mark)]) -> Board {
        let mut board = Board::new();
        for &(row, col, mark) in marks {
            board.place_mark(row, col, mark).unwrap();
        }
        board
    }

    #[test]
    fn test_no_winner_empty_board() {
        assert_eq!(check_winner(&Board::new()), None);
    }

    #[test]
    fn test_winner_top_row() {
        let b = board(&[(0, 0, Mark::X), (0, 1, Mark::X), (0, 2, Mark::X)]);
        assert_eq!(check_winner(&b), Some(Mark::X));
    }

    #[test]
    fn test_winner_column() {
        let b = board(&[(0, 1, Mark::O), (1, 1, Mark::O), (2, 1, Mark::O)]);
        assert_eq!(check_winner(&b), Some(Mark::O));
    }

    #[test]
    fn test_winner_main_diagonal() {
        let b = board(&[(0, 0, Mark::X), (1, 1, Mark::X), (2, 2, Mark::X)]);
        assert_eq!(check_winner(&b), Some(Mark::X));
    }

    #[test]
    fn test_winner_anti_diagonal() {
        let b = board(&[(2, 0, Mark::O), (1, 1, Mark::O), (0, 2, Mark::O)]);
        assert_eq!(check_winner(&b), Some(Mark::O));
    }

    #[test]
    fn test_mixed_line_is_not_decisive() {
        let b = board(&[(0, 0, Mark::X), (0, 1, Mark::O), (0, 2, Mark::X)]);
        assert_eq!(check_winner(&b), None);
    }

    #[test]
    fn test_first_decisive_line_wins() {
        // Impossible in play, but pins the scan order.
        let b = board(&[
            (2, 0, Mark::O),
            (2, 1, Mark::O),
            (2, 2, Mark::O),
            (0, 0, Mark::X),
            (0, 1, Mark::X),
            (0, 2, Mark::X),
        ]);
        assert_eq!(check_winner(&b), Some(Mark::X));
    }
}
