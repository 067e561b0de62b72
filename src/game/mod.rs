//! Game engines
//!
//! Each mini-game implements [`GameEngine`] over an opaque JSON state blob.
//! The session layer never inspects the blob; it only routes moves, turns,
//! and terminal results through the trait.

pub mod adapter;
pub mod connect4;
pub mod numberguess;
pub mod tictactoe;
pub mod wordduel;

pub use adapter::{
    GameEngine, GameRegistry, InitialState, MoveOutcome, MoveResult, TerminalStatus,
    TimeoutPolicy,
};
pub use connect4::ConnectFourEngine;
pub use numberguess::NumberGuessEngine;
pub use tictactoe::TicTacToeEngine;
pub use wordduel::WordDuelEngine;
