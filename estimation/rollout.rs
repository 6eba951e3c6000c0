use nalgebra::{DMatrix, DVector, RowDVector};
use rand::RngCore;
use serde_json::json;
use shared_telemetry::LogLevel;
use uuid::Uuid;

use crate::{
    policy::{FailurePolicy, PolicyError},
    process::{BaselineEstimate, DecisionProcess},
    telemetry::EvaluationTelemetry,
};

/// Per-episode trace. Entries are positionally aligned by timestep; each row
/// covers one visited non-terminal state (the episode's final state is never
/// recorded, no action was taken there).
#[derive(Debug, Clone)]
pub struct EpisodeTrace<A> {
    /// Episode identifier for log correlation.
    pub id: Uuid,
    /// Feature vector per visited state.
    pub features: Vec<DVector<f64>>,
    /// Sampled action per step.
    pub actions: Vec<A>,
    /// Reward per step.
    pub rewards: Vec<f64>,
    /// Per-step importance-sampling ratio (native probability over sampling
    /// probability).
    pub ratios: Vec<f64>,
    /// Baseline failure-probability estimate per visited state.
    pub baselines: Vec<f64>,
    /// Whether the step cap cut the episode short.
    pub truncated: bool,
}

impl<A> EpisodeTrace<A> {
    /// Creates an empty trace.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            features: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            ratios: Vec::new(),
            baselines: Vec::new(),
            truncated: false,
        }
    }

    /// Number of recorded steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the episode recorded no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    fn push(&mut self, features: DVector<f64>, action: A, reward: f64, ratio: f64, baseline: f64) {
        self.features.push(features);
        self.actions.push(action);
        self.rewards.push(reward);
        self.ratios.push(ratio);
        self.baselines.push(baseline);
    }

    /// Monte Carlo returns: suffix-sums of the rewards.
    #[must_use]
    pub fn returns(&self) -> Vec<f64> {
        let mut returns = vec![0.0; self.len()];
        let mut acc = 0.0;
        for step in (0..self.len()).rev() {
            acc += self.rewards[step];
            returns[step] = acc;
        }
        returns
    }

    /// Cumulative importance weights: suffix-products of the ratios.
    #[must_use]
    pub fn weights(&self) -> Vec<f64> {
        let mut weights = vec![0.0; self.len()];
        let mut acc = 1.0;
        for step in (0..self.len()).rev() {
            acc *= self.ratios[step];
            weights[step] = acc;
        }
        weights
    }
}

impl<A> Default for EpisodeTrace<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Flattened training batch across all episodes of one rollout call. All
/// vectors are positionally aligned with the feature matrix rows.
#[derive(Debug, Clone)]
pub struct RolloutBatch<A> {
    /// One feature row per visited non-terminal state.
    pub features: DMatrix<f64>,
    /// Sampled actions.
    pub actions: Vec<A>,
    /// Per-step rewards.
    pub rewards: Vec<f64>,
    /// Monte Carlo returns G (suffix-sums of rewards).
    pub returns: Vec<f64>,
    /// Per-step importance-sampling ratios.
    pub ratios: Vec<f64>,
    /// Cumulative importance weights W (suffix-products of ratios).
    pub weights: Vec<f64>,
    /// Baseline estimates at each visited state.
    pub baselines: Vec<f64>,
    /// Episodes rolled out.
    pub episodes: usize,
    /// Episodes cut short by the step cap.
    pub truncated: usize,
}

impl<A> RolloutBatch<A> {
    fn from_traces(traces: Vec<EpisodeTrace<A>>, dimension: usize) -> Self {
        let episodes = traces.len();
        let truncated = traces.iter().filter(|trace| trace.truncated).count();
        let total: usize = traces.iter().map(EpisodeTrace::len).sum();

        let mut rows: Vec<RowDVector<f64>> = Vec::with_capacity(total);
        let mut actions = Vec::with_capacity(total);
        let mut rewards = Vec::with_capacity(total);
        let mut returns = Vec::with_capacity(total);
        let mut ratios = Vec::with_capacity(total);
        let mut weights = Vec::with_capacity(total);
        let mut baselines = Vec::with_capacity(total);

        for trace in traces {
            returns.extend(trace.returns());
            weights.extend(trace.weights());
            for features in &trace.features {
                rows.push(features.transpose());
            }
            actions.extend(trace.actions);
            rewards.extend(trace.rewards);
            ratios.extend(trace.ratios);
            baselines.extend(trace.baselines);
        }

        let features = if rows.is_empty() {
            DMatrix::zeros(0, dimension)
        } else {
            DMatrix::from_rows(&rows)
        };
        Self {
            features,
            actions,
            rewards,
            returns,
            ratios,
            weights,
            baselines,
            episodes,
            truncated,
        }
    }

    /// Number of flattened samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether every episode terminated in zero steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Executes episodes under the importance-sampled policy and flattens them
/// into a training batch at the episode-batch boundary.
#[derive(Debug)]
pub struct RolloutEngine {
    max_steps: usize,
    telemetry: Option<EvaluationTelemetry>,
}

impl RolloutEngine {
    /// Creates an engine with a per-episode step cap.
    #[must_use]
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps,
            telemetry: None,
        }
    }

    /// Attaches telemetry sinks for structured logging/events.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: EvaluationTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Rolls out `episodes` independent episodes from the process's initial
    /// state. Hitting the step cap truncates the episode with a warning; it
    /// is a soft condition, never an error.
    pub fn run<P, E>(
        &self,
        policy: &FailurePolicy<P, E>,
        episodes: usize,
        rng: &mut dyn RngCore,
    ) -> Result<RolloutBatch<P::Action>, PolicyError>
    where
        P: DecisionProcess,
        E: BaselineEstimate<P>,
    {
        let process = policy.process();
        let mut traces = Vec::with_capacity(episodes);
        for _ in 0..episodes {
            let mut trace = EpisodeTrace::new();
            let mut state = process.initial_state();
            while !process.is_terminal(&state) {
                if trace.len() == self.max_steps {
                    trace.truncated = true;
                    if let Some(telemetry) = &self.telemetry {
                        let _ = telemetry.log(
                            LogLevel::Warn,
                            "rollout.episode.truncated",
                            json!({ "episode": trace.id, "steps": trace.len() }),
                        );
                    }
                    break;
                }
                let baseline = policy.baseline(&state);
                let (action, sampling_probability) = policy.action(&state, rng)?;
                let native = process.action_probability(&state, &action);
                let ratio = native / sampling_probability;
                let (next_state, reward) = process.generative_step(&state, &action, rng);
                trace.push(process.feature(&state), action, reward, ratio, baseline);
                state = next_state;
            }
            traces.push(trace);
        }
        Ok(RolloutBatch::from_traces(traces, policy.model().dimension()))
    }
}
