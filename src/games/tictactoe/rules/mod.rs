//! Game rules for tic-tac-toe.
//!
//! Pure functions over a [`Board`](super::Board). Rules are separated from
//! board storage so the evaluation order stays in one place.

pub mod draw;
pub mod win;

pub use draw::is_full;
pub use win::check_winner;
