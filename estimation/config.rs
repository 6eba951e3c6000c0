use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::combine::CombinationStyle;

/// Evaluator configuration, loadable from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Evaluation iterations to run.
    pub iterations: usize,
    /// Episodes rolled out per iteration.
    pub episodes_per_iteration: usize,
    /// Per-episode step cap (soft; truncates with a warning).
    pub max_steps: usize,
    /// Rule for combining pairwise-subproblem estimates.
    pub combination: CombinationStyle,
    /// Reward applied by scene adapters when an episode ends terminal but
    /// collision-free (agent exits the scene). Kept configurable rather than
    /// baked into the reward function.
    pub exit_penalty: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            iterations: 10,
            episodes_per_iteration: 100,
            max_steps: 100,
            combination: CombinationStyle::default(),
            exit_penalty: -10_000.0,
        }
    }
}

impl EvaluatorConfig {
    /// Loads and validates a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the evaluation loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::Invalid("iterations must be positive"));
        }
        if self.episodes_per_iteration == 0 {
            return Err(ConfigError::Invalid(
                "episodes_per_iteration must be positive",
            ));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Invalid("max_steps must be positive"));
        }
        Ok(())
    }
}

/// Errors raised while loading the evaluator configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error (filesystem).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Structurally valid JSON carrying unusable values.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}
