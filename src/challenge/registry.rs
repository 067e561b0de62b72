//! Challenge registry
//!
//! Pending challenges live here until accepted or expired. Expired entries
//! are purged lazily on every mutating call, so the registry never needs
//! its own sweeper task.

use crate::error::{ArcadeError, Result};
use crate::types::{Challenge, ContactRef, GameType, PlayerId};
use crate::utils::{current_timestamp, generate_challenge_id};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::RwLock;
use tracing::{debug, info};

/// Thread-safe registry of pending challenges
pub struct ChallengeRegistry {
    pending: RwLock<Vec<Challenge>>,
    ttl: ChronoDuration,
}

impl ChallengeRegistry {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            pending: RwLock::new(Vec::new()),
            ttl: ChronoDuration::seconds(ttl_seconds as i64),
        }
    }

    /// Issue a challenge. A newer challenge from the same challenger to the
    /// same player for the same game replaces the older one.
    pub fn issue(
        &self,
        challenger_id: &str,
        challenged_id: &str,
        game_type: GameType,
        contact: ContactRef,
        guild_id: Option<String>,
    ) -> Result<Challenge> {
        if challenger_id == challenged_id {
            return Err(ArcadeError::SelfChallenge {
                player_id: challenger_id.to_string(),
            }
            .into());
        }

        let now = current_timestamp();
        let challenge = Challenge {
            id: generate_challenge_id(),
            challenger_id: challenger_id.to_string(),
            challenged_id: challenged_id.to_string(),
            game_type,
            contact,
            guild_id,
            created_at: now,
        };

        let mut pending = self.pending.write().map_err(|_| lock_error())?;
        Self::purge(&mut pending, now - self.ttl);
        pending.retain(|c| {
            !(c.challenger_id == challenger_id
                && c.challenged_id == challenged_id
                && c.game_type == game_type)
        });
        pending.push(challenge.clone());

        info!(
            challenge_id = %challenge.id,
            challenger = %challenger_id,
            challenged = %challenged_id,
            game_type = %game_type,
            "Challenge issued"
        );
        Ok(challenge)
    }

    /// Accept the newest live challenge aimed at a player. When a guild is
    /// given, challenges from that guild win over guild-less ones.
    pub fn accept(&self, challenged_id: &str, guild_id: Option<&str>) -> Result<Challenge> {
        let now = current_timestamp();
        let mut pending = self.pending.write().map_err(|_| lock_error())?;
        Self::purge(&mut pending, now - self.ttl);

        let eligible = |c: &Challenge| {
            c.challenged_id == challenged_id
                && match (guild_id, c.guild_id.as_deref()) {
                    (Some(g), Some(cg)) => g == cg,
                    (Some(_), None) | (None, _) => true,
                }
        };

        let pick = pending
            .iter()
            .enumerate()
            .filter(|(_, c)| eligible(c))
            .max_by_key(|(_, c)| {
                // Guild-scoped challenges outrank guild-less ones, then recency
                (guild_id.is_some() && c.guild_id.as_deref() == guild_id, c.created_at)
            })
            .map(|(i, _)| i);

        match pick {
            Some(i) => {
                let challenge = pending.remove(i);
                debug!(challenge_id = %challenge.id, "Challenge accepted");
                Ok(challenge)
            }
            None => Err(ArcadeError::NoChallenge {
                player_id: challenged_id.to_string(),
            }
            .into()),
        }
    }

    /// Withdraw every pending challenge issued by a player
    pub fn withdraw_from(&self, challenger_id: &str) -> Result<usize> {
        let mut pending = self.pending.write().map_err(|_| lock_error())?;
        let before = pending.len();
        pending.retain(|c| c.challenger_id != challenger_id);
        Ok(before - pending.len())
    }

    /// Live challenges aimed at a player
    pub fn pending_for(&self, challenged_id: &str) -> Result<Vec<Challenge>> {
        let cutoff = current_timestamp() - self.ttl;
        let pending = self.pending.read().map_err(|_| lock_error())?;
        Ok(pending
            .iter()
            .filter(|c| c.challenged_id == challenged_id && c.created_at >= cutoff)
            .cloned()
            .collect())
    }

    /// Whether a matching live challenge already exists
    pub fn has_pending(
        &self,
        challenger_id: &str,
        challenged_id: &str,
        game_type: GameType,
    ) -> Result<bool> {
        let cutoff = current_timestamp() - self.ttl;
        let pending = self.pending.read().map_err(|_| lock_error())?;
        Ok(pending.iter().any(|c| {
            c.challenger_id == challenger_id
                && c.challenged_id == challenged_id
                && c.game_type == game_type
                && c.created_at >= cutoff
        }))
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().map(|p| p.len()).unwrap_or(0)
    }

    fn purge(pending: &mut Vec<Challenge>, cutoff: DateTime<Utc>) {
        pending.retain(|c| c.created_at >= cutoff);
    }
}

fn lock_error() -> ArcadeError {
    ArcadeError::InternalError {
        message: "Failed to acquire challenge lock".to_string(),
    }
}
