//! ELO delta calculations for two-side matches
//!
//! Expected scores come from the `skillratings` ELO implementation (the
//! standard 400-point logistic curve); this module applies the K factor,
//! rounding, dodge scaling, and the escalating dodge penalty on top.

use crate::config::RatingConfig;
use crate::error::Result;
use skillratings::elo::{expected_score, EloRating};

/// Calculator for per-player rating deltas against an opposing side average
#[derive(Debug, Clone)]
pub struct EloCalculator {
    config: RatingConfig,
}

impl EloCalculator {
    pub fn new(config: RatingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RatingConfig {
        &self.config
    }

    /// Probability that a player at `player_rating` beats an opponent pool
    /// averaging `opponent_avg`
    pub fn expected_score(&self, player_rating: i32, opponent_avg: f64) -> f64 {
        let (expected, _) = expected_score(
            &EloRating {
                rating: player_rating as f64,
            },
            &EloRating {
                rating: opponent_avg,
            },
        );
        expected
    }

    /// Rounded K-scaled delta for one player against the opposing average
    pub fn delta(&self, player_rating: i32, opponent_avg: f64, won: bool) -> i32 {
        let expected = self.expected_score(player_rating, opponent_avg);
        let actual = if won { 1.0 } else { 0.0 };
        (self.config.k_factor * (actual - expected)).round() as i32
    }

    /// Scale a delta for a dodge-tainted match, truncating toward zero
    pub fn scale_for_dodge(&self, delta: i32, scale: f64) -> i32 {
        (delta as f64 * scale).trunc() as i32
    }

    /// Escalating dodge penalty given the dodger's prior confirmed count
    pub fn dodge_penalty(&self, prior_dodges: u32) -> i32 {
        let raw = self.config.dodge_penalty_base as f64
            * self.config.dodge_penalty_growth.powi(prior_dodges as i32);
        raw.min(self.config.dodge_penalty_cap as f64).round() as i32
    }
}

impl Default for EloCalculator {
    fn default() -> Self {
        Self {
            config: RatingConfig::default(),
        }
    }
}
