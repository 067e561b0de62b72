//! Number guess engine (solo)
//!
//! The player has a fixed number of attempts to find a secret number in
//! 1..=100, with higher/lower feedback after each guess.

use crate::error::ArcadeError;
use crate::game::adapter::{
    GameEngine, InitialState, MoveOutcome, MoveResult, TerminalStatus,
};
use crate::types::{GameType, PlayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_ATTEMPTS: u32 = 7;
const RANGE_MAX: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Hint {
    Higher,
    Lower,
    Correct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NumberGuessState {
    player: PlayerId,
    secret: u32,
    attempts_used: u32,
    last_hint: Option<Hint>,
}

impl NumberGuessState {
    fn won(&self) -> bool {
        self.last_hint == Some(Hint::Correct)
    }

    fn out_of_attempts(&self) -> bool {
        self.attempts_used >= MAX_ATTEMPTS
    }
}

fn parse_state(state: &serde_json::Value) -> crate::error::Result<NumberGuessState> {
    serde_json::from_value(state.clone()).map_err(|e| {
        ArcadeError::InternalError {
            message: format!("Corrupt numberguess state: {}", e),
        }
        .into()
    })
}

pub struct NumberGuessEngine;

impl NumberGuessEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NumberGuessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine for NumberGuessEngine {
    fn game_type(&self) -> GameType {
        GameType::NumberGuess
    }

    fn create_state(&self, players: &[PlayerId]) -> crate::error::Result<InitialState> {
        if players.len() != 1 {
            return Err(ArcadeError::InternalError {
                message: format!("numberguess needs 1 player, got {}", players.len()),
            }
            .into());
        }

        let secret = (Uuid::new_v4().as_u128() % u128::from(RANGE_MAX)) as u32 + 1;
        let state = NumberGuessState {
            player: players[0].clone(),
            secret,
            attempts_used: 0,
            last_hint: None,
        };
        Ok(InitialState {
            first_turn: Some(players[0].clone()),
            state: serde_json::to_value(state).map_err(|e| ArcadeError::InternalError {
                message: format!("Failed to serialize numberguess state: {}", e),
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

        let illegal = |reason: &str, next: Option<PlayerId>| MoveResult {
            state: state.clone(),
            outcome: MoveOutcome::Illegal(reason.to_string()),
            next_turn: next,
        };

        if game.player != player {
            return Ok(illegal("Not your game", Some(game.player.clone())));
        }
        if game.won() || game.out_of_attempts() {
            return Ok(illegal("The game is already over", None));
        }

        let guess: u32 = match input.trim().parse() {
            Ok(g) if (1..=RANGE_MAX).contains(&g) => g,
            _ => {
                return Ok(illegal(
                    "Guess a number from 1 to 100",
                    Some(game.player.clone()),
                ))
            }
        };

        game.attempts_used += 1;
        game.last_hint = Some(match guess.cmp(&game.secret) {
            std::cmp::Ordering::Less => Hint::Higher,
            std::cmp::Ordering::Greater => Hint::Lower,
            std::cmp::Ordering::Equal => Hint::Correct,
        });

        let next_turn = if game.won() || game.out_of_attempts() {
            None
        } else {
            Some(game.player.clone())
        };

        Ok(MoveResult {
            state: serde_json::to_value(game).map_err(|e| ArcadeError::InternalError {
                message: format!("Failed to serialize numberguess state: {}", e),
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
        if game.won() {
            Ok(TerminalStatus::Won(game.player))
        } else if game.out_of_attempts() {
            Ok(TerminalStatus::Lost(game.player))
        } else {
            Ok(TerminalStatus::Ongoing)
        }
    }

    fn current_turn(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<Option<PlayerId>> {
        let game = parse_state(state)?;
        if game.won() || game.out_of_attempts() {
            return Ok(None);
        }
        Ok(Some(game.player))
    }
}
