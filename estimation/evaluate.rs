use nalgebra::DVector;
use rand::RngCore;
use serde::Serialize;
use serde_json::json;
use shared_telemetry::LogLevel;

use crate::{
    config::EvaluatorConfig,
    policy::FailurePolicy,
    process::{BaselineEstimate, DecisionProcess},
    rollout::RolloutEngine,
    telemetry::EvaluationTelemetry,
};

/// Per-iteration statistics recorded during evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct IterationStats {
    /// Iteration index, starting at zero.
    pub iteration: usize,
    /// Flattened samples the correction model was fitted on.
    pub samples: usize,
    /// Episodes cut short by the step cap.
    pub truncated_episodes: usize,
    /// Mean absolute regression target, a rough residual magnitude.
    pub mean_target: f64,
    /// Parameter snapshot after the fit.
    pub theta: Vec<f64>,
}

/// Report accumulated across all evaluation iterations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationReport {
    /// One entry per iteration, in order.
    pub iterations: Vec<IterationStats>,
}

/// Repeatedly rolls out episodes and refits the correction model on the
/// importance-weighted residuals.
///
/// No convergence check is performed; the caller controls the iteration
/// count and tracks convergence externally, e.g. against a ground truth.
#[derive(Debug)]
pub struct PolicyEvaluator {
    config: EvaluatorConfig,
    engine: RolloutEngine,
    telemetry: Option<EvaluationTelemetry>,
}

impl PolicyEvaluator {
    /// Creates an evaluator from a validated configuration.
    #[must_use]
    pub fn new(config: EvaluatorConfig) -> Self {
        let engine = RolloutEngine::new(config.max_steps);
        Self {
            config,
            engine,
            telemetry: None,
        }
    }

    /// Attaches telemetry sinks; the rollout engine shares them.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: EvaluationTelemetry) -> Self {
        self.engine = self.engine.with_telemetry(telemetry.clone());
        self.telemetry = Some(telemetry);
        self
    }

    /// Runs the evaluation loop against the policy's correction model.
    ///
    /// Each iteration rolls out the configured number of episodes, computes
    /// the residual targets `y = W * G - baseline` elementwise, and fits the
    /// model on the flattened batch. Iterations whose episodes all terminate
    /// in zero steps skip the fit.
    pub fn evaluate<P, E>(
        &self,
        policy: &mut FailurePolicy<P, E>,
        rng: &mut dyn RngCore,
    ) -> anyhow::Result<EvaluationReport>
    where
        P: DecisionProcess,
        E: BaselineEstimate<P>,
    {
        let mut report = EvaluationReport {
            iterations: Vec::with_capacity(self.config.iterations),
        };
        for iteration in 0..self.config.iterations {
            let batch = self
                .engine
                .run(policy, self.config.episodes_per_iteration, rng)?;
            if batch.is_empty() {
                self.log(
                    LogLevel::Warn,
                    "evaluate.empty_batch",
                    json!({ "iteration": iteration, "episodes": batch.episodes }),
                );
                report.iterations.push(IterationStats {
                    iteration,
                    samples: 0,
                    truncated_episodes: batch.truncated,
                    mean_target: 0.0,
                    theta: theta_snapshot(policy),
                });
                continue;
            }

            let targets = DVector::from_iterator(
                batch.len(),
                batch
                    .weights
                    .iter()
                    .zip(&batch.returns)
                    .zip(&batch.baselines)
                    .map(|((weight, ret), baseline)| weight * ret - baseline),
            );
            let mean_target = targets.iter().map(|target| target.abs()).sum::<f64>()
                / targets.len() as f64;
            policy.model_mut().fit(&batch.features, &targets)?;

            self.log(
                LogLevel::Info,
                "evaluate.iteration",
                json!({
                    "iteration": iteration,
                    "samples": batch.len(),
                    "truncated": batch.truncated,
                    "theta_norm": policy.model().theta().norm(),
                }),
            );
            report.iterations.push(IterationStats {
                iteration,
                samples: batch.len(),
                truncated_episodes: batch.truncated,
                mean_target,
                theta: theta_snapshot(policy),
            });
        }
        Ok(report)
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Some(telemetry) = &self.telemetry {
            let _ = telemetry.log(level, message, metadata);
        }
    }
}

fn theta_snapshot<P, E>(policy: &FailurePolicy<P, E>) -> Vec<f64>
where
    P: DecisionProcess,
    E: BaselineEstimate<P>,
{
    policy.model().theta().iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        linear::LinearModel,
        process::testing::{crash_indicator, ChainState, CrashChain, Parked},
    };
    use rand::{rngs::SmallRng, SeedableRng};

    fn config(iterations: usize, episodes: usize) -> EvaluatorConfig {
        EvaluatorConfig {
            iterations,
            episodes_per_iteration: episodes,
            max_steps: 10,
            ..EvaluatorConfig::default()
        }
    }

    #[test]
    fn learned_value_converges_to_ground_truth() {
        // Failure probability of the chain is the native Hold probability.
        let ground_truth = 0.3;
        let mut policy = FailurePolicy::new(
            CrashChain::new(ground_truth, 0.0),
            LinearModel::new(1),
            crash_indicator,
        );
        let evaluator = PolicyEvaluator::new(config(5, 50));
        let mut rng = SmallRng::seed_from_u64(17);
        let report = evaluator.evaluate(&mut policy, &mut rng).unwrap();

        assert_eq!(report.iterations.len(), 5);
        let value = policy.value(&ChainState::Approach).unwrap();
        assert!((value - ground_truth).abs() < 1e-3, "{value}");
    }

    #[test]
    fn report_tracks_samples_and_theta() {
        let mut policy = FailurePolicy::new(
            CrashChain::new(0.3, 0.0),
            LinearModel::new(1),
            crash_indicator,
        );
        let evaluator = PolicyEvaluator::new(config(2, 10));
        let mut rng = SmallRng::seed_from_u64(23);
        let report = evaluator.evaluate(&mut policy, &mut rng).unwrap();

        for (idx, stats) in report.iterations.iter().enumerate() {
            assert_eq!(stats.iteration, idx);
            assert_eq!(stats.samples, 10);
            assert_eq!(stats.theta.len(), 1);
        }
        let encoded = serde_json::to_value(&report).unwrap();
        assert_eq!(encoded["iterations"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn empty_batches_skip_the_fit() {
        let mut policy =
            FailurePolicy::new(Parked, LinearModel::new(1), |_: &Parked, _: &bool| 0.0);
        let evaluator = PolicyEvaluator::new(config(3, 4));
        let mut rng = SmallRng::seed_from_u64(29);
        let report = evaluator.evaluate(&mut policy, &mut rng).unwrap();

        assert_eq!(report.iterations.len(), 3);
        for stats in &report.iterations {
            assert_eq!(stats.samples, 0);
            assert_eq!(stats.theta, vec![0.0]);
        }
    }
}
