//! Connect Four engine
//!
//! Moves are column indices `0..=6`. Discs stack from the bottom; four in
//! a row horizontally, vertically, or diagonally wins.

use crate::error::ArcadeError;
use crate::game::adapter::{
    GameEngine, InitialState, MoveOutcome, MoveResult, TerminalStatus,
};
use crate::types::{GameType, PlayerId};
use serde::{Deserialize, Serialize};

const COLS: usize = 7;
const ROWS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConnectFourState {
    players: [PlayerId; 2],
    /// Per-column stacks of player indices, bottom first
    columns: Vec<Vec<u8>>,
    next: u8,
}

impl ConnectFourState {
    fn disc_at(&self, col: usize, row: usize) -> Option<u8> {
        self.columns.get(col).and_then(|c| c.get(row)).copied()
    }

    fn has_four_through(&self, col: usize, row: usize) -> bool {
        let owner = match self.disc_at(col, row) {
            Some(o) => o,
            None => return false,
        };

        for (dc, dr) in [(1i64, 0i64), (0, 1), (1, 1), (1, -1)] {
            let mut run = 1;
            for dir in [1i64, -1] {
                let (mut c, mut r) = (col as i64, row as i64);
                loop {
                    c += dc * dir;
                    r += dr * dir;
                    if c < 0 || r < 0 || c >= COLS as i64 || r >= ROWS as i64 {
                        break;
                    }
                    if self.disc_at(c as usize, r as usize) != Some(owner) {
                        break;
                    }
                    run += 1;
                }
            }
            if run >= 4 {
                return true;
            }
        }
        false
    }

    fn full(&self) -> bool {
        self.columns.iter().all(|c| c.len() >= ROWS)
    }
}

fn parse_state(state: &serde_json::Value) -> crate::error::Result<ConnectFourState> {
    serde_json::from_value(state.clone()).map_err(|e| {
        ArcadeError::InternalError {
            message: format!("Corrupt connect4 state: {}", e),
        }
        .into()
    })
}

fn to_value(state: ConnectFourState) -> crate::error::Result<serde_json::Value> {
    serde_json::to_value(state).map_err(|e| {
        ArcadeError::InternalError {
            message: format!("Failed to serialize connect4 state: {}", e),
        }
        .into()
    })
}

pub struct ConnectFourEngine;

impl ConnectFourEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConnectFourEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine for ConnectFourEngine {
    fn game_type(&self) -> GameType {
        GameType::ConnectFour
    }

    fn create_state(&self, players: &[PlayerId]) -> crate::error::Result<InitialState> {
        if players.len() != 2 {
            return Err(ArcadeError::InternalError {
                message: format!("connect4 needs 2 players, got {}", players.len()),
            }
            .into());
        }
        let state = ConnectFourState {
            players: [players[0].clone(), players[1].clone()],
            columns: vec![Vec::new(); COLS],
            next: 0,
        };
        Ok(InitialState {
            first_turn: Some(players[0].clone()),
            state: to_value(state)?,
        })
    }

    fn apply_move(
        &self,
        state: &serde_json::Value,
        player: &str,
        input: &str,
    ) -> crate::error::Result<MoveResult> {
        let mut game = parse_state(state)?;

        let illegal = |reason: &str| MoveResult {
            state: state.clone(),
            outcome: MoveOutcome::Illegal(reason.to_string()),
            next_turn: Some(game.players[game.next as usize].clone()),
        };

        let col: usize = match input.trim().parse() {
            Ok(c) if c < COLS => c,
            _ => return Ok(illegal("Pick a column from 0 to 6")),
        };
        if game.columns[col].len() >= ROWS {
            return Ok(illegal("That column is full"));
        }

        let mover = game.next;
        if game.players[mover as usize] != player {
            return Ok(illegal("Not this player's turn"));
        }

        game.columns[col].push(mover);
        game.next = 1 - mover;
        let next_turn = Some(game.players[game.next as usize].clone());

        Ok(MoveResult {
            state: to_value(game)?,
            outcome: MoveOutcome::Accepted,
            next_turn,
        })
    }

    fn terminal_status(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<TerminalStatus> {
        let game = parse_state(state)?;

        for col in 0..COLS {
            for row in 0..game.columns[col].len() {
                if game.has_four_through(col, row) {
                    let owner = game.columns[col][row] as usize;
                    return Ok(TerminalStatus::Won(game.players[owner].clone()));
                }
            }
        }
        if game.full() {
            return Ok(TerminalStatus::Draw);
        }
        Ok(TerminalStatus::Ongoing)
    }

    fn current_turn(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<Option<PlayerId>> {
        let game = parse_state(state)?;
        match self.terminal_status(state)? {
            TerminalStatus::Ongoing => Ok(Some(game.players[game.next as usize].clone())),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (ConnectFourEngine, serde_json::Value) {
        let engine = ConnectFourEngine::new();
        let initial = engine
            .create_state(&["alice".to_string(), "bob".to_string()])
            .unwrap();
        (engine, initial.state)
    }

    fn play(engine: &ConnectFourEngine, state: serde_json::Value, moves: &[(&str, &str)]) -> serde_json::Value {
        let mut state = state;
        for (player, col) in moves {
            let result = engine.apply_move(&state, player, col).unwrap();
            assert_eq!(result.outcome, MoveOutcome::Accepted);
            state = result.state;
        }
        state
    }

    #[test]
    fn test_vertical_win() {
        let (engine, state) = setup();
        let state = play(
            &engine,
            state,
            &[
                ("alice", "0"),
                ("bob", "1"),
                ("alice", "0"),
                ("bob", "1"),
                ("alice", "0"),
                ("bob", "1"),
                ("alice", "0"),
            ],
        );
        assert_eq!(
            engine.terminal_status(&state).unwrap(),
            TerminalStatus::Won("alice".to_string())
        );
    }

    #[test]
    fn test_horizontal_win() {
        let (engine, state) = setup();
        let state = play(
            &engine,
            state,
            &[
                ("alice", "0"),
                ("bob", "0"),
                ("alice", "1"),
                ("bob", "1"),
                ("alice", "2"),
                ("bob", "2"),
                ("alice", "3"),
            ],
        );
        assert_eq!(
            engine.terminal_status(&state).unwrap(),
            TerminalStatus::Won("alice".to_string())
        );
    }

    #[test]
    fn test_diagonal_win() {
        let (engine, state) = setup();
        // Staircase for alice on (0,0) (1,1) (2,2) (3,3)
        let state = play(
            &engine,
            state,
            &[
                ("alice", "0"),
                ("bob", "1"),
                ("alice", "1"),
                ("bob", "2"),
                ("alice", "2"),
                ("bob", "3"),
                ("alice", "2"),
                ("bob", "3"),
                ("alice", "3"),
                ("bob", "0"),
                ("alice", "3"),
            ],
        );
        assert_eq!(
            engine.terminal_status(&state).unwrap(),
            TerminalStatus::Won("alice".to_string())
        );
    }

    #[test]
    fn test_full_column_rejected() {
        let (engine, mut state) = setup();
        for i in 0..6 {
            let player = if i % 2 == 0 { "alice" } else { "bob" };
            let result = engine.apply_move(&state, player, "0").unwrap();
            state = result.state;
        }
        let result = engine.apply_move(&state, "alice", "0").unwrap();
        assert!(matches!(result.outcome, MoveOutcome::Illegal(_)));
        assert_eq!(result.state, state);
    }

    #[test]
    fn test_bad_column_rejected() {
        let (engine, state) = setup();
        let result = engine.apply_move(&state, "alice", "7").unwrap();
        assert!(matches!(result.outcome, MoveOutcome::Illegal(_)));
    }

    #[test]
    fn test_ongoing_game_not_terminal() {
        let (engine, state) = setup();
        let state = play(&engine, state, &[("alice", "3"), ("bob", "3")]);
        assert_eq!(
            engine.terminal_status(&state).unwrap(),
            TerminalStatus::Ongoing
        );
    }
}
