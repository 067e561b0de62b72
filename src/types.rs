//! Common types used throughout the arcade core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players (chat-platform user id)
pub type PlayerId = String;

/// Unique identifier for sessions
pub type SessionId = Uuid;

/// Unique identifier for challenges
pub type ChallengeId = Uuid;

/// Opaque reference to the channel/contact a player is reachable at
pub type ContactRef = String;

/// Synthetic opponent used when matchmaking falls back to the house bot
pub const BOT_PLAYER_ID: &str = "arcade-bot";

/// Whether a player id refers to the synthetic bot opponent
pub fn is_bot(player_id: &str) -> bool {
    player_id == BOT_PLAYER_ID
}

/// Supported mini-game types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    TicTacToe,
    ConnectFour,
    WordDuel,
    NumberGuess,
}

impl GameType {
    /// Solo games have no opponent; results feed rank score, not Elo.
    pub fn is_solo(&self) -> bool {
        matches!(self, GameType::NumberGuess)
    }

    /// Games whose pvp results move the Elo rating.
    pub fn is_rated(&self) -> bool {
        matches!(
            self,
            GameType::TicTacToe | GameType::ConnectFour | GameType::WordDuel
        )
    }

    /// Games the house bot can stand in for when no human is found.
    pub fn supports_bot(&self) -> bool {
        matches!(self, GameType::TicTacToe | GameType::ConnectFour)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::TicTacToe => "tictactoe",
            GameType::ConnectFour => "connect4",
            GameType::WordDuel => "wordduel",
            GameType::NumberGuess => "numberguess",
        }
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GameType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "tictactoe" => Ok(GameType::TicTacToe),
            "connect4" => Ok(GameType::ConnectFour),
            "wordduel" => Ok(GameType::WordDuel),
            "numberguess" => Ok(GameType::NumberGuess),
            other => Err(format!("unknown game type: {}", other)),
        }
    }
}

/// Persistent per-player record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub total_wins: u32,
    pub total_losses: u32,
    /// Consecutive calendar days (server UTC) with at least one completed game
    pub daily_streak: u32,
    /// `YYYY-MM-DD` of the last completed game, server UTC
    pub last_played_date: Option<String>,
    pub forfeit_count: u32,
    pub last_forfeit_at: Option<DateTime<Utc>>,
    pub queue_locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Player {
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            total_wins: 0,
            total_losses: 0,
            daily_streak: 0,
            last_played_date: None,
            forfeit_count: 0,
            last_forfeit_at: None,
            queue_locked_until: None,
            created_at: crate::utils::current_timestamp(),
        }
    }

    /// Whether the player is currently locked out of matchmaking
    pub fn is_queue_locked(&self, now: DateTime<Utc>) -> bool {
        self.queue_locked_until.map(|t| t > now).unwrap_or(false)
    }
}

/// Per (player, game type) statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStat {
    pub player_id: PlayerId,
    pub game_type: GameType,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub win_streak: u32,
    pub best_streak: u32,
    /// Percentage in 0..=100, draws excluded
    pub win_rate: f64,
    /// Elo rating for pvp games
    pub rating: i32,
    /// Ranking metric used by matchmaking tolerance checks
    pub rank_score: f64,
}

impl GameStat {
    pub const DEFAULT_RATING: i32 = 1000;

    pub fn new(player_id: PlayerId, game_type: GameType) -> Self {
        let rank_score = if game_type.is_rated() {
            f64::from(Self::DEFAULT_RATING)
        } else {
            0.0
        };
        Self {
            player_id,
            game_type,
            wins: 0,
            losses: 0,
            draws: 0,
            win_streak: 0,
            best_streak: 0,
            win_rate: 0.0,
            rating: Self::DEFAULT_RATING,
            rank_score,
        }
    }

    /// Recompute the derived win rate from the current counters.
    pub fn recompute_win_rate(&mut self) {
        let total = self.wins + self.losses;
        self.win_rate = if total > 0 {
            f64::from(self.wins) / f64::from(total) * 100.0
        } else {
            0.0
        };
    }

    /// Recompute the ranking metric. Rated pvp games rank by Elo rating;
    /// everything else ranks by `wins * 10 + win_rate`.
    pub fn recompute_rank_score(&mut self) {
        self.rank_score = if self.game_type.is_rated() {
            f64::from(self.rating)
        } else {
            f64::from(self.wins) * 10.0 + self.win_rate
        };
    }
}

/// A player's standing request to be matched for a game type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub player_id: PlayerId,
    pub game_type: GameType,
    pub contact: ContactRef,
    /// Rank score snapshot taken at enqueue time
    pub rank_score: f64,
    pub queued_at: DateTime<Utc>,
}

/// A direct invitation between two specific players
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub challenger_id: PlayerId,
    pub challenged_id: PlayerId,
    pub game_type: GameType,
    pub contact: ContactRef,
    /// Origin context so a player active in several guilds accepts the right one
    pub guild_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Pair recently matched through the queue; suppresses instant rematches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentOpponentRecord {
    pub player_a: PlayerId,
    pub player_b: PlayerId,
    pub game_type: GameType,
    pub matched_at: DateTime<Utc>,
}

/// One in-progress match instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub game_type: GameType,
    pub player1_id: PlayerId,
    /// None for solo game types
    pub player2_id: Option<PlayerId>,
    pub player1_contact: ContactRef,
    pub player2_contact: Option<ContactRef>,
    pub current_turn: Option<PlayerId>,
    /// Opaque engine state blob; the core never looks inside
    pub state: serde_json::Value,
    /// False for bot matches; unrated outcomes never touch Elo
    pub rated: bool,
    /// Bumped on every accepted move; timers carry the value they were
    /// armed against and must no-op when it has advanced
    pub move_seq: u64,
    pub last_action: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    /// All human participants (the bot is filtered out)
    pub fn participants(&self) -> Vec<&PlayerId> {
        std::iter::once(&self.player1_id)
            .chain(self.player2_id.iter())
            .filter(|p| !is_bot(p))
            .collect()
    }

    pub fn involves(&self, player_id: &str) -> bool {
        self.player1_id == player_id || self.player2_id.as_deref() == Some(player_id)
    }

    pub fn opponent_of(&self, player_id: &str) -> Option<&PlayerId> {
        if self.player1_id == player_id {
            self.player2_id.as_ref()
        } else if self.player2_id.as_deref() == Some(player_id) {
            Some(&self.player1_id)
        } else {
            None
        }
    }
}

/// How a terminal match was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    Played,
    Forfeit,
    Timeout,
}

/// Terminal outcome of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOutcome {
    Decisive {
        winner: PlayerId,
        loser: PlayerId,
        reason: OutcomeReason,
    },
    Draw {
        players: Vec<PlayerId>,
    },
    Solo {
        player: PlayerId,
        won: bool,
    },
    /// Solo quit/timeout: session discarded with no stat impact
    Abandoned {
        player: PlayerId,
    },
}

/// Why/how a pairing came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingOrigin {
    Queue,
    Challenge,
    Rematch,
    BotFallback,
    Solo,
}

/// A resolved pairing handed to the session manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pairing {
    pub game_type: GameType,
    /// First mover: the player who initiated matchmaking (or the solo player)
    pub initiator: PlayerId,
    pub initiator_contact: ContactRef,
    pub opponent: Option<PlayerId>,
    pub opponent_contact: Option<ContactRef>,
    pub rated: bool,
    pub origin: PairingOrigin,
}

/// Rating movement applied after a rated pvp match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingSummary {
    pub winner_change: i32,
    pub loser_change: i32,
    /// True when the daily same-pair limit zeroed the delta
    pub suppressed: bool,
    /// Games this exact pair has now completed today (this game type)
    pub daily_pair_games: usize,
}

/// Historical record of a completed match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub game_type: GameType,
    pub player1_id: PlayerId,
    pub player2_id: Option<PlayerId>,
    pub winner_id: Option<PlayerId>,
    pub outcome: MatchOutcome,
    pub rating_delta: i32,
    pub rated: bool,
    pub duration_seconds: Option<i64>,
    pub completed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notification events consumed by the presentation layer
// ---------------------------------------------------------------------------

/// Queue search status updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Searching,
    Matched,
    Cancelled,
    Expired,
    NoOpponent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: SessionId,
    pub game_type: GameType,
    pub player1_id: PlayerId,
    pub player2_id: Option<PlayerId>,
    pub first_turn: Option<PlayerId>,
    pub rated: bool,
    pub origin: PairingOrigin,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveApplied {
    pub session_id: SessionId,
    pub game_type: GameType,
    pub by: PlayerId,
    /// Engine state after the move; rendered by the presentation layer
    pub state: serde_json::Value,
    pub next_turn: Option<PlayerId>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEnded {
    pub session_id: SessionId,
    pub game_type: GameType,
    pub outcome: MatchOutcome,
    pub rating: Option<RatingSummary>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueUpdate {
    pub player_id: PlayerId,
    pub game_type: GameType,
    pub status: QueueStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeIssued {
    pub challenge_id: ChallengeId,
    pub challenger_id: PlayerId,
    pub challenged_id: PlayerId,
    pub game_type: GameType,
    pub is_rematch: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeAccepted {
    pub challenge_id: ChallengeId,
    pub challenger_id: PlayerId,
    pub challenged_id: PlayerId,
    pub game_type: GameType,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound AMQP event payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ArcadeEvent {
    SessionCreated(SessionCreated),
    MoveApplied(MoveApplied),
    SessionEnded(SessionEnded),
    QueueUpdate(QueueUpdate),
    ChallengeIssued(ChallengeIssued),
    ChallengeAccepted(ChallengeAccepted),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_type_roundtrip() {
        for gt in [
            GameType::TicTacToe,
            GameType::ConnectFour,
            GameType::WordDuel,
            GameType::NumberGuess,
        ] {
            let parsed: GameType = gt.as_str().parse().unwrap();
            assert_eq!(parsed, gt);
        }
        assert!("checkers".parse::<GameType>().is_err());
    }

    #[test]
    fn test_game_type_classification() {
        assert!(GameType::NumberGuess.is_solo());
        assert!(!GameType::NumberGuess.is_rated());
        assert!(GameType::TicTacToe.is_rated());
        assert!(GameType::TicTacToe.supports_bot());
        assert!(!GameType::WordDuel.supports_bot());
    }

    #[test]
    fn test_win_rate_invariant() {
        let mut stat = GameStat::new("p1".to_string(), GameType::TicTacToe);
        assert_eq!(stat.win_rate, 0.0);

        stat.wins = 3;
        stat.losses = 1;
        stat.draws = 2; // draws excluded from the rate
        stat.recompute_win_rate();
        assert!((stat.win_rate - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_session_participants_filter_bot() {
        let session = Session {
            id: Uuid::new_v4(),
            game_type: GameType::TicTacToe,
            player1_id: "alice".to_string(),
            player2_id: Some(BOT_PLAYER_ID.to_string()),
            player1_contact: "ch1".to_string(),
            player2_contact: Some("ch1".to_string()),
            current_turn: Some("alice".to_string()),
            state: serde_json::json!({}),
            rated: false,
            move_seq: 0,
            last_action: Utc::now(),
            started_at: Utc::now(),
        };

        assert_eq!(session.participants(), vec!["alice"]);
        assert!(session.involves("alice"));
        assert!(session.involves(BOT_PLAYER_ID));
        assert_eq!(session.opponent_of("alice").unwrap(), BOT_PLAYER_ID);
    }

    #[test]
    fn test_queue_lock_check() {
        let mut player = Player::new("p1".to_string(), "P1");
        let now = Utc::now();
        assert!(!player.is_queue_locked(now));

        player.queue_locked_until = Some(now + chrono::Duration::minutes(5));
        assert!(player.is_queue_locked(now));
        assert!(!player.is_queue_locked(now + chrono::Duration::minutes(6)));
    }
}
