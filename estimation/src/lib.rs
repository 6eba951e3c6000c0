#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Adaptive importance-sampling evaluator for rare-event failure probabilities.
//!
//! Wraps an external decision process with a sampling policy that steers
//! rollouts toward failure, corrects the steering with suffix-product
//! importance weights, and refits an incremental linear model on the
//! weighted residuals after every batch of episodes.

/// Incremental least-squares correction model.
#[path = "../linear.rs"]
pub mod linear;

/// Decision-process oracle contract and baseline-estimate strategy.
#[path = "../process.rs"]
pub mod process;

/// Importance-sampled failure-probability policy.
#[path = "../policy.rs"]
pub mod policy;

/// Monte Carlo rollout engine and batch flattening.
#[path = "../rollout.rs"]
pub mod rollout;

/// Policy-evaluation loop.
#[path = "../evaluate.rs"]
pub mod evaluate;

/// Subproblem estimate combination rules.
#[path = "../combine.rs"]
pub mod combine;

/// Evaluator configuration loading and validation.
#[path = "../config.rs"]
pub mod config;

/// Telemetry helpers for logging/event emission.
#[path = "../telemetry.rs"]
pub mod telemetry;

pub use combine::{combine, CombinationStyle, CombineError};
pub use config::{ConfigError, EvaluatorConfig};
pub use evaluate::{EvaluationReport, IterationStats, PolicyEvaluator};
pub use linear::{LinearModel, ModelError};
pub use policy::{FailurePolicy, PolicyError};
pub use process::{BaselineEstimate, DecisionProcess};
pub use rollout::{EpisodeTrace, RolloutBatch, RolloutEngine};
pub use telemetry::{EvaluationTelemetry, EvaluationTelemetryBuilder};
