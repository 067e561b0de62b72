//! Elo rating math
//!
//! Classic Elo with a fixed K-factor and a hard rating floor. The loser
//! never drops below the floor; against a vastly weaker opponent the
//! rounded delta can be zero.

use skillratings::elo::{expected_score, EloRating};

/// Outcome of one Elo exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EloChange {
    pub winner_new: i32,
    pub loser_new: i32,
    /// Points transferred; the winner gains this, the loser gives up at most
    /// this (the floor may absorb part of it)
    pub delta: i32,
}

/// Calculate the rating movement for a decisive pvp result.
///
/// `delta = round(k * (1 - E_winner))` where `E_winner` is the winner's
/// expected score against the loser. An upset win moves more points than
/// a favored win.
pub fn calculate_elo_change(
    winner_rating: i32,
    loser_rating: i32,
    k_factor: f64,
    rating_floor: i32,
) -> EloChange {
    let winner = EloRating {
        rating: f64::from(winner_rating),
    };
    let loser = EloRating {
        rating: f64::from(loser_rating),
    };

    let (expected_winner, _) = expected_score(&winner, &loser);
    let delta = (k_factor * (1.0 - expected_winner)).round() as i32;

    EloChange {
        winner_new: winner_rating + delta,
        loser_new: (loser_rating - delta).max(rating_floor),
        delta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K: f64 = 32.0;
    const FLOOR: i32 = 100;

    #[test]
    fn test_even_match_moves_half_k() {
        let change = calculate_elo_change(1000, 1000, K, FLOOR);
        assert_eq!(change.delta, 16);
        assert_eq!(change.winner_new, 1016);
        assert_eq!(change.loser_new, 984);
    }

    #[test]
    fn test_upset_win_moves_more_points() {
        // 1000 beats 1200: expected score ~0.24, delta = round(32 * 0.76)
        let change = calculate_elo_change(1000, 1200, K, FLOOR);
        assert_eq!(change.delta, 24);
        assert_eq!(change.winner_new, 1024);
        assert_eq!(change.loser_new, 1176);
    }

    #[test]
    fn test_favored_win_moves_fewer_points() {
        let change = calculate_elo_change(1200, 1000, K, FLOOR);
        assert_eq!(change.delta, 8);
        assert_eq!(change.winner_new, 1208);
        assert_eq!(change.loser_new, 992);
    }

    #[test]
    fn test_loser_never_drops_below_floor() {
        let change = calculate_elo_change(1000, 105, K, FLOOR);
        assert_eq!(change.loser_new, FLOOR);
        // Winner still gains the full delta
        assert_eq!(change.winner_new, 1000 + change.delta);
    }

    #[test]
    fn test_delta_symmetry_between_mirror_matchups() {
        // The underdog winning transfers the complement of the favorite winning
        let upset = calculate_elo_change(1000, 1200, K, FLOOR);
        let favored = calculate_elo_change(1200, 1000, K, FLOOR);
        assert_eq!(upset.delta + favored.delta, K as i32);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn delta_bounded_by_k(winner in FLOOR..4000, loser in FLOOR..4000) {
                let change = calculate_elo_change(winner, loser, K, FLOOR);
                prop_assert!(change.delta >= 0);
                prop_assert!(change.delta <= K as i32);
            }

            #[test]
            fn loser_respects_the_floor(winner in FLOOR..4000, loser in FLOOR..4000) {
                let change = calculate_elo_change(winner, loser, K, FLOOR);
                prop_assert!(change.loser_new >= FLOOR);
                prop_assert!(change.winner_new >= winner);
            }
        }
    }
}
