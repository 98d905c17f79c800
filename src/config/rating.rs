//! Rating system configuration

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Tunable parameters of the rating update and dodge penalty policy
///
/// The penalty magnitude and its growth with repeat offenses are product
/// knobs, not core invariants; only monotonic escalation is relied upon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// K factor of the logistic rating update
    pub k_factor: f64,
    /// Delta scale applied to winners of a dodge-tainted match
    pub winner_dodge_scale: f64,
    /// Delta scale applied to non-dodging losers of a dodge-tainted match
    pub loser_dodge_scale: f64,
    /// Penalty subtracted from a first-time dodger's delta
    pub dodge_penalty_base: i32,
    /// Per-prior-offense growth factor of the penalty
    pub dodge_penalty_growth: f64,
    /// Upper bound on the escalating penalty
    pub dodge_penalty_cap: i32,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            k_factor: 30.0,
            winner_dodge_scale: 0.8,
            loser_dodge_scale: 0.3,
            dodge_penalty_base: 15,
            dodge_penalty_growth: 2.0,
            dodge_penalty_cap: 240,
        }
    }
}

impl RatingConfig {
    /// Validate the configuration values
    pub fn validate(&self) -> Result<()> {
        if self.k_factor <= 0.0 {
            return Err(anyhow!("K factor must be positive"));
        }
        if !(0.0..=1.0).contains(&self.winner_dodge_scale) {
            return Err(anyhow!("Winner dodge scale must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.loser_dodge_scale) {
            return Err(anyhow!("Loser dodge scale must be within [0, 1]"));
        }
        if self.dodge_penalty_base <= 0 {
            return Err(anyhow!("Dodge penalty base must be positive"));
        }
        if self.dodge_penalty_growth < 1.0 {
            return Err(anyhow!("Dodge penalty growth must be at least 1.0"));
        }
        if self.dodge_penalty_cap < self.dodge_penalty_base {
            return Err(anyhow!("Dodge penalty cap must be at least the base"));
        }
        Ok(())
    }
}
