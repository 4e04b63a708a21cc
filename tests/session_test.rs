//! Tests for session registration and turn alternation.

use n3tp::{PlayerNumber, Session, SessionError, SharedSession};

fn started_session() -> Session {
    let mut session = Session::new();
    session.register_player("alice").expect("first seat");
    session.register_player("bob").expect("second seat");
    session
}

#[test]
fn test_two_registrations_start_the_game() {
    let session = started_session();
    assert!(session.started());
    assert_eq!(session.active_player(), Some(PlayerNumber::One));
}

#[test]
fn test_third_registration_always_fails() {
    for name in ["carol", "alice", "", "BOB"] {
        let mut session = started_session();
        assert_eq!(session.register_player(name), Err(SessionError::SessionFull));
        assert!(session.started());
    }
}

#[test]
fn test_active_player_alternates_and_ignores_rejections() {
    let mut session = started_session();
    let cells = [(0, 0), (0, 1), (0, 2), (1, 1), (1, 0), (1, 2), (2, 1), (2, 0), (2, 2)];
    let mut accepted = 0;

    for (i, &(row, col)) in cells.iter().enumerate() {
        let seat = session.active_player().expect("game started");

        // A rejected move first: occupied or off the board.
        let bad = if i == 0 { (3, 3) } else { cells[0] };
        assert!(session.submit_move(seat, bad.0, bad.1).is_err());
        assert_eq!(session.active_player(), Some(seat));

        session.submit_move(seat, row, col).expect("free cell");
        accepted += 1;

        let expected = if accepted % 2 == 0 {
            PlayerNumber::One
        } else {
            PlayerNumber::Two
        };
        assert_eq!(session.active_player(), Some(expected));
    }
}

#[test]
fn test_shared_session_snapshot_is_consistent() {
    let shared = SharedSession::new();
    shared.register_player("a").expect("first seat");
    shared.register_player("b").expect("second seat");

    let writer = {
        let shared = shared.clone();
        std::thread::spawn(move || {
            let mut seat = PlayerNumber::One;
            for (row, col) in [(0, 0), (1, 1), (0, 1), (2, 2), (2, 0)] {
                shared.submit_move(seat, row, col).expect("free cell");
                seat = seat.other();
            }
        })
    };

    for _ in 0..200 {
        let (board, active) = shared.read(|s| (s.board().clone(), s.active_player()));
        let marks = 9 - board.empty_cells().len();
        let expected = if marks % 2 == 0 {
            PlayerNumber::One
        } else {
            PlayerNumber::Two
        };
        assert_eq!(active, Some(expected));
    }

    writer.join().expect("writer thread");
}
