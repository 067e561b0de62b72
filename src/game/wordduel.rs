//! Word duel engine
//!
//! Players alternate unscrambling words over a fixed number of rounds. A
//! correct guess scores a point; right or wrong, play moves on. Letting
//! the clock run out skips the round instead of forfeiting, which is why
//! this engine carries the `SkipRound` timeout policy.

use crate::error::ArcadeError;
use crate::game::adapter::{
    GameEngine, InitialState, MoveOutcome, MoveResult, TerminalStatus, TimeoutPolicy,
};
use crate::types::{GameType, PlayerId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const TOTAL_ROUNDS: usize = 6;

const WORDS: &[&str] = &[
    "planet", "guitar", "rocket", "jungle", "marble", "puzzle", "branch", "copper",
    "dragon", "faucet", "healer", "island", "jacket", "lantern", "meadow", "needle",
    "orange", "pirate", "quartz", "ribbon", "saddle", "temple", "umpire", "violet",
    "walnut", "yonder", "zephyr", "anchor", "bucket", "candle",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WordDuelState {
    players: [PlayerId; 2],
    next: u8,
    round: usize,
    scores: [u32; 2],
    /// One answer per round, chosen at session start
    words: Vec<String>,
}

impl WordDuelState {
    fn finished(&self) -> bool {
        self.round >= self.words.len()
    }

    fn advance(&mut self) {
        self.round += 1;
        self.next = 1 - self.next;
    }

    fn next_turn(&self) -> Option<PlayerId> {
        if self.finished() {
            None
        } else {
            Some(self.players[self.next as usize].clone())
        }
    }
}

/// Alphabetized letters of the round's answer, shown to the guesser
fn scramble(word: &str) -> String {
    let mut letters: Vec<char> = word.chars().collect();
    letters.sort_unstable();
    letters.into_iter().collect()
}

fn parse_state(state: &serde_json::Value) -> crate::error::Result<WordDuelState> {
    serde_json::from_value(state.clone()).map_err(|e| {
        ArcadeError::InternalError {
            message: format!("Corrupt wordduel state: {}", e),
        }
        .into()
    })
}

fn to_value(state: WordDuelState) -> crate::error::Result<serde_json::Value> {
    serde_json::to_value(state).map_err(|e| {
        ArcadeError::InternalError {
            message: format!("Failed to serialize wordduel state: {}", e),
        }
        .into()
    })
}

pub struct WordDuelEngine;

impl WordDuelEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WordDuelEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GameEngine for WordDuelEngine {
    fn game_type(&self) -> GameType {
        GameType::WordDuel
    }

    fn create_state(&self, players: &[PlayerId]) -> crate::error::Result<InitialState> {
        if players.len() != 2 {
            return Err(ArcadeError::InternalError {
                message: format!("wordduel needs 2 players, got {}", players.len()),
            }
            .into());
        }

        let seed = Uuid::new_v4().as_u128() as usize;
        let words = (0..TOTAL_ROUNDS)
            .map(|i| WORDS[(seed.wrapping_add(i * 7)) % WORDS.len()].to_string())
            .collect();

        let state = WordDuelState {
            players: [players[0].clone(), players[1].clone()],
            next: 0,
            round: 0,
            scores: [0, 0],
            words,
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

        if game.finished() {
            return Ok(MoveResult {
                state: state.clone(),
                outcome: MoveOutcome::Illegal("The duel is already over".to_string()),
                next_turn: None,
            });
        }

        let mover = game.next;
        if game.players[mover as usize] != player {
            return Ok(MoveResult {
                state: state.clone(),
                outcome: MoveOutcome::Illegal("Not this player's turn".to_string()),
                next_turn: game.next_turn(),
            });
        }

        let guess = input.trim().to_lowercase();
        if guess.is_empty() {
            return Ok(MoveResult {
                state: state.clone(),
                outcome: MoveOutcome::Illegal(format!(
                    "Unscramble: {}",
                    scramble(&game.words[game.round])
                )),
                next_turn: game.next_turn(),
            });
        }

        // Wrong guesses burn the round; only a correct one scores
        if guess == game.words[game.round] {
            game.scores[mover as usize] += 1;
        }
        game.advance();
        let next_turn = game.next_turn();

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
        if !game.finished() {
            return Ok(TerminalStatus::Ongoing);
        }
        match game.scores[0].cmp(&game.scores[1]) {
            std::cmp::Ordering::Greater => Ok(TerminalStatus::Won(game.players[0].clone())),
            std::cmp::Ordering::Less => Ok(TerminalStatus::Won(game.players[1].clone())),
            std::cmp::Ordering::Equal => Ok(TerminalStatus::Draw),
        }
    }

    fn current_turn(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<Option<PlayerId>> {
        Ok(parse_state(state)?.next_turn())
    }

    fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy::SkipRound
    }

    fn skip_round(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<MoveResult> {
        let mut game = parse_state(state)?;
        if !game.finished() {
            game.advance();
        }
        let next_turn = game.next_turn();
        Ok(MoveResult {
            state: to_value(game)?,
            outcome: MoveOutcome::Accepted,
            next_turn,
        })
    }
}
