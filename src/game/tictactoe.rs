//! Tic-tac-toe engine
//!
//! Moves are cell indices `0..=8`, row-major from the top left.

use crate::error::ArcadeError;
use crate::game::adapter::{
    GameEngine, InitialState, MoveOutcome, MoveResult, TerminalStatus,
};
use crate::types::{GameType, PlayerId};
use serde::{Deserialize, Serialize};

const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TicTacToeState {
    players: [PlayerId; 2],
    /// Cell owner as player index; None while empty
    board: [Option<u8>; 9],
    /// Index into `players` of whoever moves next
    next: u8,
}

impl TicTacToeState {
    fn winner(&self) -> Option<&PlayerId> {
        for line in WIN_LINES {
            if let Some(owner) = self.board[line[0]] {
                if self.board[line[1]] == Some(owner) && self.board[line[2]] == Some(owner) {
                    return Some(&self.players[owner as usize]);
                }
            }
        }
        None
    }

    fn full(&self) -> bool {
        self.board.iter().all(|c| c.is_some())
    }
}

fn parse_state(state: &serde_json::Value) -> crate::error::Result<TicTacToeState> {
    serde_json::from_value(state.clone()).map_err(|e| {
        ArcadeError::InternalError {
            message: format!("Corrupt tictactoe state: {}", e),
        }
        .into()
    })
}

pub struct TicTacToeEngine;

impl TicTacToeEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TicTacToeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine for TicTacToeEngine {
    fn game_type(&self) -> GameType {
        GameType::TicTacToe
    }

    fn create_state(&self, players: &[PlayerId]) -> crate::error::Result<InitialState> {
        if players.len() != 2 {
            return Err(ArcadeError::InternalError {
                message: format!("tictactoe needs 2 players, got {}", players.len()),
            }
            .into());
        }
        let state = TicTacToeState {
            players: [players[0].clone(), players[1].clone()],
            board: [None; 9],
            next: 0,
        };
        Ok(InitialState {
            first_turn: Some(players[0].clone()),
            state: serde_json::to_value(state).map_err(|e| ArcadeError::InternalError {
                message: format!("Failed to serialize tictactoe state: {}", e),
            })?,
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

        let cell: usize = match input.trim().parse() {
            Ok(c) if c < 9 => c,
            _ => return Ok(illegal("Pick a cell from 0 to 8")),
        };
        if game.board[cell].is_some() {
            return Ok(illegal("That cell is already taken"));
        }

        let mover = game.next;
        if game.players[mover as usize] != player {
            return Ok(illegal("Not this player's turn"));
        }

        game.board[cell] = Some(mover);
        game.next = 1 - mover;
        let next_turn = Some(game.players[game.next as usize].clone());

        Ok(MoveResult {
            state: serde_json::to_value(game).map_err(|e| ArcadeError::InternalError {
                message: format!("Failed to serialize tictactoe state: {}", e),
            })?,
            outcome: MoveOutcome::Accepted,
            next_turn,
        })
    }

    fn terminal_status(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<TerminalStatus> {
        let game = parse_state(state)?;
        if let Some(winner) = game.winner() {
            return Ok(TerminalStatus::Won(winner.clone()));
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
        if game.winner().is_some() || game.full() {
            return Ok(None);
        }
        Ok(Some(game.players[game.next as usize].clone()))
    }
}
