use rand::{Rng, RngCore};
use serde_json::json;
use shared_telemetry::LogLevel;
use thiserror::Error;

use crate::{
    linear::{LinearModel, ModelError},
    process::{BaselineEstimate, DecisionProcess},
    telemetry::EvaluationTelemetry,
};

/// Importance-sampled failure-probability policy.
///
/// Steers rollouts toward action sequences more likely to reach the failure
/// region: each action is weighted by its native probability times the
/// estimated failure probability of the state it leads to, instead of
/// following the process's native action distribution.
pub struct FailurePolicy<P, E> {
    process: P,
    model: LinearModel,
    baseline: E,
    telemetry: Option<EvaluationTelemetry>,
}

impl<P, E> FailurePolicy<P, E>
where
    P: DecisionProcess,
    E: BaselineEstimate<P>,
{
    /// Creates a policy around a process, a correction model, and a baseline
    /// estimate strategy.
    #[must_use]
    pub fn new(process: P, model: LinearModel, baseline: E) -> Self {
        Self {
            process,
            model,
            baseline,
            telemetry: None,
        }
    }

    /// Attaches telemetry sinks for structured logging/events.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: EvaluationTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Returns the wrapped decision process.
    pub fn process(&self) -> &P {
        &self.process
    }

    /// Read access to the correction model (theta diagnostics).
    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Mutable access to the correction model (refitting between batches).
    pub fn model_mut(&mut self) -> &mut LinearModel {
        &mut self.model
    }

    /// Baseline failure-probability estimate at a state.
    pub fn baseline(&self, state: &P::State) -> f64 {
        self.baseline.estimate(&self.process, state)
    }

    /// Estimated failure probability: baseline plus learned correction,
    /// clamped into `[0, 1]`.
    pub fn value(&self, state: &P::State) -> Result<f64, ModelError> {
        let baseline = self.baseline(state);
        let correction = self.model.predict(&self.process.feature(state))?;
        Ok((baseline + correction).clamp(0.0, 1.0))
    }

    /// Samples one action from the failure-weighted categorical distribution.
    ///
    /// Returns the action together with its probability under this sampling
    /// distribution (not under the native process), which the rollout engine
    /// needs to compute the importance-sampling ratio. All-zero weights fall
    /// back to a uniform draw and surface a `policy.degenerate_weights`
    /// diagnostic: the model currently assigns zero value to every
    /// continuation, which is worth noticing even though it is not fatal.
    pub fn action(
        &self,
        state: &P::State,
        rng: &mut dyn RngCore,
    ) -> Result<(P::Action, f64), PolicyError> {
        let actions = self.process.actions(state);
        if actions.is_empty() {
            return Err(PolicyError::NoActions);
        }
        let mut weights = Vec::with_capacity(actions.len());
        for action in &actions {
            let (next_state, _reward) = self.process.generative_step(state, action, rng);
            let native = self.process.action_probability(state, action);
            weights.push(native * self.value(&next_state)?);
        }
        let total: f64 = weights.iter().sum();
        if total > 0.0 {
            for weight in &mut weights {
                *weight /= total;
            }
        } else {
            if let Some(telemetry) = &self.telemetry {
                let _ = telemetry.log(
                    LogLevel::Warn,
                    "policy.degenerate_weights",
                    json!({ "actions": actions.len() }),
                );
                let _ = telemetry.event(
                    "policy.degenerate_weights",
                    json!({ "actions": actions.len() }),
                );
            }
            let uniform = 1.0 / actions.len() as f64;
            for weight in &mut weights {
                *weight = uniform;
            }
        }

        let draw: f64 = rng.gen_range(0.0..1.0);
        let mut selected = 0;
        let mut cumulative = 0.0;
        for (idx, weight) in weights.iter().enumerate() {
            if *weight > 0.0 {
                selected = idx;
                cumulative += weight;
                if draw < cumulative {
                    break;
                }
            }
        }
        Ok((actions[selected].clone(), weights[selected]))
    }
}

/// Errors raised while sampling from the policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The queried state offers no legal actions.
    #[error("state offers no legal actions")]
    NoActions,
    /// Correction model rejected the state features.
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}
