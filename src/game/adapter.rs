//! Game engine interface and registry

use crate::error::ArcadeError;
use crate::types::{GameType, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// What a session should do when its inactivity timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPolicy {
    /// The player on turn forfeits the match
    ForfeitOnTurn,
    /// The current round is skipped and play continues
    SkipRound,
}

/// Whether a proposed move was accepted by the rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveOutcome {
    Accepted,
    /// Rejected with a player-facing reason; state is unchanged
    Illegal(String),
}

/// Terminal status read off a state blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalStatus {
    Ongoing,
    Won(PlayerId),
    /// Solo games end in a plain loss with nobody to credit
    Lost(PlayerId),
    Draw,
}

/// Fresh state for a new session
#[derive(Debug, Clone)]
pub struct InitialState {
    pub state: serde_json::Value,
    pub first_turn: Option<PlayerId>,
}

/// Result of applying a move
#[derive(Debug, Clone)]
pub struct MoveResult {
    pub state: serde_json::Value,
    pub outcome: MoveOutcome,
    pub next_turn: Option<PlayerId>,
}

/// Trait implemented by each mini-game
pub trait GameEngine: Send + Sync {
    fn game_type(&self) -> GameType;

    /// Build the initial state for the given players. Solo games receive
    /// a single player.
    fn create_state(&self, players: &[PlayerId]) -> crate::error::Result<InitialState>;

    /// Apply one move. An illegal move returns `MoveOutcome::Illegal` with
    /// the original state; rule engines never error on bad player input.
    fn apply_move(
        &self,
        state: &serde_json::Value,
        player: &str,
        input: &str,
    ) -> crate::error::Result<MoveResult>;

    /// Terminal status of a state blob
    fn terminal_status(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<TerminalStatus>;

    /// Whoever the state says moves next; None once the game is over
    fn current_turn(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<Option<PlayerId>>;

    fn timeout_policy(&self) -> TimeoutPolicy {
        TimeoutPolicy::ForfeitOnTurn
    }

    /// Advance past the current round without a move. Only meaningful for
    /// engines with the `SkipRound` timeout policy.
    fn skip_round(
        &self,
        state: &serde_json::Value,
    ) -> crate::error::Result<MoveResult> {
        Ok(MoveResult {
            state: state.clone(),
            outcome: MoveOutcome::Accepted,
            next_turn: None,
        })
    }
}

/// Lookup table from game type to engine
pub struct GameRegistry {
    engines: HashMap<GameType, Arc<dyn GameEngine>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            engines: HashMap::new(),
        }
    }

    /// Registry with all built-in engines
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::game::TicTacToeEngine::new()));
        registry.register(Arc::new(crate::game::ConnectFourEngine::new()));
        registry.register(Arc::new(crate::game::WordDuelEngine::new()));
        registry.register(Arc::new(crate::game::NumberGuessEngine::new()));
        registry
    }

    pub fn register(&mut self, engine: Arc<dyn GameEngine>) {
        self.engines.insert(engine.game_type(), engine);
    }

    pub fn get(&self, game_type: GameType) -> crate::error::Result<Arc<dyn GameEngine>> {
        self.engines
            .get(&game_type)
            .cloned()
            .ok_or_else(|| ArcadeError::EngineUnavailable { game_type }.into())
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_covers_all_game_types() {
        let registry = GameRegistry::with_defaults();
        for gt in [
            GameType::TicTacToe,
            GameType::ConnectFour,
            GameType::WordDuel,
            GameType::NumberGuess,
        ] {
            let engine = registry.get(gt).unwrap();
            assert_eq!(engine.game_type(), gt);
        }
    }

    #[test]
    fn test_missing_engine_is_an_error() {
        let registry = GameRegistry::new();
        let err = registry.get(GameType::TicTacToe).map(|_| ()).unwrap_err();
        assert!(matches!(
            crate::error::as_arcade_error(&err),
            Some(ArcadeError::EngineUnavailable { .. })
        ));
    }

    #[test]
    fn test_timeout_policies() {
        let registry = GameRegistry::with_defaults();
        assert_eq!(
            registry.get(GameType::TicTacToe).unwrap().timeout_policy(),
            TimeoutPolicy::ForfeitOnTurn
        );
        assert_eq!(
            registry.get(GameType::WordDuel).unwrap().timeout_policy(),
            TimeoutPolicy::SkipRound
        );
    }
}
