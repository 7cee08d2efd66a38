use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};

use crate::error::{ConfigParseSnafu, InvalidConfigSnafu, Result};

/// Bounds, in milliseconds, of the artificial delay drawn before each run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

impl DelayRange {
    pub const DISABLED: DelayRange = DelayRange { min: 0, max: 0 };

    pub(crate) fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.random_range(self.min..=self.max))
    }
}

impl Default for DelayRange {
    fn default() -> Self {
        Self { min: 1, max: 30 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearningConfig {
    /// Learning rate of the Q-table update.
    pub alpha: f64,
    /// Discount applied to the best next-state value.
    pub gamma: f64,
    /// Exploration probability used when selecting questions.
    pub epsilon: f64,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            gamma: 0.9,
            epsilon: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlgorithmConfig {
    pub delay_ms: DelayRange,
    /// Seed for the internal generator. `None` seeds from OS entropy.
    pub seed: Option<u64>,
    pub ucb_exploration: f64,
    pub q_learning: QLearningConfig,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            delay_ms: DelayRange::default(),
            seed: None,
            ucb_exploration: 2.0,
            q_learning: QLearningConfig::default(),
        }
    }
}

impl AlgorithmConfig {
    /// Config with no artificial delay and a fixed seed.
    pub fn deterministic(seed: u64) -> Self {
        Self {
            delay_ms: DelayRange::DISABLED,
            seed: Some(seed),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: AlgorithmConfig = serde_json::from_str(json).context(ConfigParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.delay_ms.min <= self.delay_ms.max,
            InvalidConfigSnafu {
                reason: format!(
                    "delay_ms.min ({}) exceeds delay_ms.max ({})",
                    self.delay_ms.min, self.delay_ms.max
                ),
            }
        );
        ensure!(
            self.ucb_exploration.is_finite() && self.ucb_exploration >= 0.0,
            InvalidConfigSnafu {
                reason: "ucb_exploration must be a non-negative number",
            }
        );
        let QLearningConfig {
            alpha,
            gamma,
            epsilon,
        } = self.q_learning;
        for (name, value) in [("alpha", alpha), ("gamma", gamma), ("epsilon", epsilon)] {
            ensure!(
                (0.0..=1.0).contains(&value),
                InvalidConfigSnafu {
                    reason: format!("q_learning.{name} must be within [0, 1], got {value}"),
                }
            );
        }
        Ok(())
    }
}
