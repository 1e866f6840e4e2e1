//! Whole-game checks of the board rules.
//!
//! Tic-tac-toe is small enough to walk every legal game, so the rule
//! properties are checked on every reachable position instead of a sample.

use duet_game::{Cell, GRID, GameState, MoveError, Snapshot};
use duet_protocol::{Coord, Outcome, Role};

fn all_coords() -> impl Iterator<Item = Coord> {
    (0..GRID as i32).flat_map(|r| (0..GRID as i32).map(move |c| Coord::new(r, c)))
}

fn has_line(state: &GameState) -> bool {
    matches!(state.check_winner(), Some(Outcome::Winner(_)))
}

/// Visits every position reachable by legal alternating play, calling
/// `visit` on each before expanding it. Returns the number of finished
/// games.
fn walk(state: &GameState, visit: &mut impl FnMut(&GameState)) -> usize {
    visit(state);
    if state.check_winner().is_some() {
        return 1;
    }
    let mut finished = 0;
    for coord in all_coords() {
        let role = state.turn();
        if state.validate(role, coord).is_ok() {
            let mut next = state.clone();
            next.apply(role, coord);
            finished += walk(&next, visit);
        }
    }
    finished
}

#[test]
fn test_every_legal_game_is_counted() {
    // The well-known number of distinct tic-tac-toe games.
    let games = walk(&GameState::new(), &mut |_| {});
    assert_eq!(games, 255_168);
}

#[test]
fn test_validate_never_accepts_illegal_moves() {
    walk(&GameState::new(), &mut |state| {
        let turn = state.turn();
        for coord in all_coords() {
            let waiting = state.validate(turn.other(), coord);
            assert!(matches!(waiting, Err(MoveError::OutOfTurn { .. })));

            let occupied = !state.cell(coord).unwrap().is_empty();
            assert_eq!(state.validate(turn, coord).is_err(), occupied);
        }
        for coord in [Coord::new(-1, 0), Coord::new(0, GRID as i32)] {
            assert!(matches!(
                state.validate(turn, coord),
                Err(MoveError::OutOfBounds { .. })
            ));
        }
    });
}

#[test]
fn test_apply_flips_turn_and_touches_one_cell() {
    walk(&GameState::new(), &mut |state| {
        if state.check_winner().is_some() {
            return;
        }
        let role = state.turn();
        for coord in all_coords().filter(|c| state.validate(role, *c).is_ok()) {
            let mut next = state.clone();
            next.apply(role, coord);

            assert_eq!(next.turn(), role.other());
            assert_eq!(next.mark_count(), state.mark_count() + 1);
            for other in all_coords() {
                let expected = if other == coord {
                    Cell::Marked(role)
                } else {
                    state.cell(other).unwrap()
                };
                assert_eq!(next.cell(other), Some(expected));
            }
        }
    });
}

#[test]
fn test_no_result_until_line_or_full_board() {
    walk(&GameState::new(), &mut |state| {
        let full = state.mark_count() == GRID * GRID;
        match state.check_winner() {
            None => assert!(!full && !has_line(state)),
            Some(Outcome::Draw) => assert!(full),
            Some(Outcome::Winner(role)) => {
                // Only the player who just moved can own the line.
                assert_eq!(role, state.turn().other());
            }
        }
    });
}

#[test]
fn test_snapshot_restore_round_trip_everywhere() {
    walk(&GameState::new(), &mut |state| {
        let mut copy = GameState::new();
        copy.restore(state.snapshot()).unwrap();
        assert_eq!(&copy, state);
    });
}

#[test]
fn test_snapshot_json_shape() {
    let mut state = GameState::new();
    state.apply(Role::X, Coord::new(0, 0));
    state.apply(Role::O, Coord::new(1, 1));

    let json = serde_json::to_string(&state.snapshot()).unwrap();
    assert_eq!(
        json,
        r#"{"board":[["X","",""],["","O",""],["","",""]],"turn":"X"}"#
    );

    let back: Snapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, state.snapshot());
}

#[test]
fn test_snapshot_rejects_unknown_cell_value() {
    let json = r#"{"board":[["Z","",""],["","",""],["","",""]],"turn":"X"}"#;
    assert!(serde_json::from_str::<Snapshot>(json).is_err());
}
