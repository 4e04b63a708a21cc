//! Game session shared by the two connection handlers.
//!
//! [`Session`] is the plain rules state: board, registration, and turn
//! pointer. It does not enforce turn order; that is the handler's job.
//! [`SharedSession`] is the single exclusive-access gate both handlers go
//! through, and it publishes a revision counter so waiters can sleep until
//! something changes instead of polling.

use crate::games::tictactoe::{Board, BoardError, Mark, Outcome};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Seat a participant occupies in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum PlayerNumber {
    /// First to register; plays X and moves first.
    #[display("1")]
    One,
    /// Second to register; plays O.
    #[display("2")]
    Two,
}

impl PlayerNumber {
    /// Mark placed by this seat.
    pub fn mark(self) -> Mark {
        match self {
            PlayerNumber::One => Mark::X,
            PlayerNumber::Two => Mark::O,
        }
    }

    /// The other seat.
    pub fn other(self) -> Self {
        match self {
            PlayerNumber::One => PlayerNumber::Two,
            PlayerNumber::Two => PlayerNumber::One,
        }
    }

    /// Wire value of an optional seat; unassigned is `0`.
    pub fn wire_value(seat: Option<PlayerNumber>) -> u8 {
        match seat {
            None => 0,
            Some(PlayerNumber::One) => 1,
            Some(PlayerNumber::Two) => 2,
        }
    }
}

/// Registration failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum SessionError {
    /// Both seats are taken.
    #[display("Session already has two players")]
    SessionFull,
}

/// Authoritative state of one two-player game.
#[derive(Debug, Clone, Default)]
pub struct Session {
    player_one_name: String,
    player_two_name: String,
    player_count: u8,
    started: bool,
    active_player: Option<PlayerNumber>,
    board: Board,
    outcome: Option<Outcome>,
    revision: u64,
}

impl Session {
    /// Creates an empty session with no players.
    #[instrument]
    pub fn new() -> Self {
        debug!("Creating game session");
        Self::default()
    }

    /// Registers a player and returns the seat they were given.
    ///
    /// The first caller becomes player one and gets the first move; the
    /// second becomes player two and starts the game.
    #[instrument(skip(self, name), fields(name = %name.as_ref()))]
    pub fn register_player(&mut self, name: impl AsRef<str>) -> Result<PlayerNumber, SessionError> {
        let seat = match self.player_count {
            0 => {
                self.player_one_name = name.as_ref().to_string();
                self.active_player = Some(PlayerNumber::One);
                PlayerNumber::One
            }
            1 => {
                self.player_two_name = name.as_ref().to_string();
                self.started = true;
                PlayerNumber::Two
            }
            _ => {
                warn!("Session already has 2 players");
                return Err(SessionError::SessionFull);
            }
        };

        self.player_count += 1;
        self.revision += 1;
        info!(seat = %seat, started = self.started, "Registered player");
        Ok(seat)
    }

    /// Places `player`'s mark and hands the turn over.
    ///
    /// Turn order is not checked here. A rejected move leaves both the
    /// board and the active player untouched.
    #[instrument(skip(self))]
    pub fn submit_move(
        &mut self,
        player: PlayerNumber,
        row: isize,
        col: isize,
    ) -> Result<(), BoardError> {
        self.board.place_mark(row, col, player.mark()).map_err(|e| {
            debug!(error = %e, "Move rejected");
            e
        })?;

        self.active_player = Some(match self.active_player {
            Some(PlayerNumber::One) => PlayerNumber::Two,
            _ => PlayerNumber::One,
        });

        let status = self.board.evaluate();
        if status.is_decided() {
            info!(?status, "Game decided");
            self.outcome = Some(status);
        }
        self.revision += 1;
        Ok(())
    }

    /// Current board evaluation.
    pub fn winner_status(&self) -> Outcome {
        self.board.evaluate()
    }

    /// Terminal outcome, set once by the move that decided the game.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Seat whose turn it is, once anyone has registered.
    pub fn active_player(&self) -> Option<PlayerNumber> {
        self.active_player
    }

    /// True once both seats are filled.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Number of registered players.
    pub fn player_count(&self) -> u8 {
        self.player_count
    }

    /// Player one's name, empty until registered.
    pub fn player_one_name(&self) -> &str {
        &self.player_one_name
    }

    /// Player two's name, empty until registered.
    pub fn player_two_name(&self) -> &str {
        &self.player_two_name
    }

    /// Name registered for `seat`.
    pub fn player_name(&self, seat: PlayerNumber) -> &str {
        match seat {
            PlayerNumber::One => &self.player_one_name,
            PlayerNumber::Two => &self.player_two_name,
        }
    }

    /// The board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Rendered board.
    pub fn render_board(&self) -> String {
        self.board.render()
    }

    /// Counter bumped by every accepted mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

#[derive(Debug)]
struct Shared {
    session: Mutex<Session>,
    changes: watch::Sender<u64>,
}

/// Cloneable handle to the one session both handlers share.
///
/// Every operation runs under one mutex, so registration and move
/// submission are atomic with respect to each other and readers never see
/// a half-applied move. The lock is never held across an `.await`.
#[derive(Debug, Clone)]
pub struct SharedSession {
    shared: Arc<Shared>,
}

impl SharedSession {
    /// Wraps a fresh session.
    #[instrument]
    pub fn new() -> Self {
        Self::from_session(Session::new())
    }

    /// Wraps an existing session.
    pub fn from_session(session: Session) -> Self {
        let (changes, _) = watch::channel(session.revision());
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                changes,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.shared
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with exclusive access to the session.
    ///
    /// Use this when a check and a mutation must happen together, such as
    /// verifying the turn before submitting a move. Watchers are notified
    /// if `f` changed anything.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.lock();
        let before = session.revision();
        let result = f(&mut session);
        let after = session.revision();
        drop(session);

        if after != before {
            self.shared.changes.send_replace(after);
        }
        result
    }

    /// Runs `f` with shared read access to a consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        f(&self.lock())
    }

    /// Atomically registers a player.
    pub fn register_player(&self, name: impl AsRef<str>) -> Result<PlayerNumber, SessionError> {
        self.with(|s| s.register_player(name))
    }

    /// Atomically submits a move without any turn check.
    pub fn submit_move(
        &self,
        player: PlayerNumber,
        row: isize,
        col: isize,
    ) -> Result<(), BoardError> {
        self.with(|s| s.submit_move(player, row, col))
    }

    /// Current board evaluation.
    pub fn winner_status(&self) -> Outcome {
        self.read(Session::winner_status)
    }

    /// Seat whose turn it is.
    pub fn active_player(&self) -> Option<PlayerNumber> {
        self.read(Session::active_player)
    }

    /// True once both seats are filled.
    pub fn started(&self) -> bool {
        self.read(Session::started)
    }

    /// Rendered board.
    pub fn render_board(&self) -> String {
        self.read(Session::render_board)
    }

    /// Copy of the board.
    pub fn board(&self) -> Board {
        self.read(|s| s.board().clone())
    }

    /// Receiver that observes every accepted mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    /// Waits until `predicate` holds for the session.
    ///
    /// Returns immediately if it already holds. Wakes only when the session
    /// changes.
    pub async fn wait_until(&self, mut predicate: impl FnMut(&Session) -> bool) {
        let mut changes = self.subscribe();
        loop {
            if self.read(&mut predicate) {
                return;
            }
            // The sender lives as long as `self`, so this cannot fail here.
            if changes.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_sets_active_player() {
        let mut session = Session::new();
        assert_eq!(session.active_player(), None);
        assert_eq!(session.register_player("Alice"), Ok(PlayerNumber::One));
        assert_eq!(session.active_player(), Some(PlayerNumber::One));
        assert!(!session.started());
    }

    #[test]
    fn test_second_registration_starts_game() {
        let mut session = Session::new();
        session.register_player("alice").unwrap();
        assert_eq!(session.register_player("bob"), Ok(PlayerNumber::Two));
        assert!(session.started());
        assert_eq!(session.active_player(), Some(PlayerNumber::One));
        assert_eq!(session.player_one_name(), "alice");
        assert_eq!(session.player_two_name(), "bob");
    }

    #[test]
    fn test_third_registration_is_rejected() {
        let mut session = Session::new();
        session.register_player("a").unwrap();
        session.register_player("b").unwrap();
        assert_eq!(session.register_player("c"), Err(SessionError::SessionFull));
        assert_eq!(session.player_count(), 2);
        assert_eq!(session.player_two_name(), "b");
    }

    #[test]
    fn test_rejected_move_keeps_turn() {
        let mut session = Session::new();
        session.register_player("a").unwrap();
        session.register_player("b").unwrap();
        session.submit_move(PlayerNumber::One, 0, 0).unwrap();
        assert_eq!(session.active_player(), Some(PlayerNumber::Two));

        let revision = session.revision();
        assert_eq!(
            session.submit_move(PlayerNumber::Two, 0, 0),
            Err(BoardError::CellOccupied { row: 0, col: 0 })
        );
        assert_eq!(session.active_player(), Some(PlayerNumber::Two));
        assert_eq!(session.revision(), revision);
    }

    #[test]
    fn test_session_does_not_enforce_turn_order() {
        let mut session = Session::new();
        session.register_player("a").unwrap();
        session.register_player("b").unwrap();
        session.submit_move(PlayerNumber::Two, 1, 1).unwrap();
        assert_eq!(
            session.board().cell(1, 1),
            Some(crate::games::tictactoe::Cell::Occupied(Mark::O))
        );
    }

    #[test]
    fn test_outcome_latched_on_deciding_move() {
        let mut session = Session::new();
        session.register_player("a").unwrap();
        session.register_player("b").unwrap();
        for (seat, row, col) in [
            (PlayerNumber::One, 0, 0),
            (PlayerNumber::Two, 1, 0),
            (PlayerNumber::One, 0, 1),
            (PlayerNumber::Two, 1, 1),
        ] {
            session.submit_move(seat, row, col).unwrap();
            assert_eq!(session.outcome(), None);
        }
        session.submit_move(PlayerNumber::One, 0, 2).unwrap();
        assert_eq!(session.outcome(), Some(Outcome::XWins));
        assert_eq!(session.winner_status(), Outcome::XWins);
    }

    #[test]
    fn test_wire_value() {
        assert_eq!(PlayerNumber::wire_value(None), 0);
        assert_eq!(PlayerNumber::wire_value(Some(PlayerNumber::Two)), 2);
        assert_eq!(PlayerNumber::One.to_string(), "1");
    }

    #[tokio::test]
    async fn test_wait_until_wakes_on_change() {
        let shared = SharedSession::new();
        let waiter = {
            let shared = shared.clone();
            tokio::spawn(async move { shared.wait_until(Session::started).await })
        };
        shared.register_player("a").unwrap();
        shared.register_player("b").unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter task panicked");
    }

    #[test]
    fn test_concurrent_registration_admits_two() {
        let shared = SharedSession::new();
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || shared.register_player(format!("p{i}")))
            })
            .collect();

        let seats: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap().ok())
            .collect();

        assert_eq!(seats.len(), 2);
        assert!(seats.contains(&PlayerNumber::One));
        assert!(seats.contains(&PlayerNumber::Two));
        assert!(shared.started());
    }
}
