use nalgebra::DVector;
use rand::RngCore;

/// Contract the external decision-process collaborator must satisfy.
///
/// The evaluator never constructs scenes, vehicles, or gridworlds itself; it
/// only enumerates actions, draws generative transitions, and reads the
/// native action distribution through this trait.
pub trait DecisionProcess {
    /// Process state.
    type State: Clone;
    /// Process action.
    type Action: Clone;

    /// Enumerates the legal actions at a state. Must be finite; may be empty
    /// at terminal states.
    fn actions(&self, state: &Self::State) -> Vec<Self::Action>;

    /// Draws one stochastic transition, returning the next state and reward.
    fn generative_step(
        &self,
        state: &Self::State,
        action: &Self::Action,
        rng: &mut dyn RngCore,
    ) -> (Self::State, f64);

    /// Probability in `[0, 1]` that the native (non-adversarial) policy takes
    /// this action at this state.
    fn action_probability(&self, state: &Self::State, action: &Self::Action) -> f64;

    /// Initial-state distribution sample.
    fn initial_state(&self) -> Self::State;

    /// Whether the state is absorbing.
    fn is_terminal(&self, state: &Self::State) -> bool;

    /// Maps a state to the fixed-length feature vector consumed by the
    /// correction model. The length must match the model's dimension.
    fn feature(&self, state: &Self::State) -> DVector<f64>;
}

/// Injected strategy supplying the baseline failure-probability estimate for
/// a state, e.g. a pairwise-subproblem lookup or a precomputed table.
pub trait BaselineEstimate<P: DecisionProcess> {
    /// Returns the baseline estimate at `state`.
    fn estimate(&self, process: &P, state: &P::State) -> f64;
}

impl<P, F> BaselineEstimate<P> for F
where
    P: DecisionProcess,
    F: Fn(&P, &P::State) -> f64,
{
    fn estimate(&self, process: &P, state: &P::State) -> f64 {
        self(process, state)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// State of the two-branch crash chain used across the test suite.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ChainState {
        /// Non-terminal approach state.
        Approach,
        /// Absorbing collision state.
        Crashed,
        /// Absorbing exit state.
        Cleared,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ChainAction {
        Hold,
        Swerve,
    }

    /// Deterministic absorbing chain with a known failure probability equal
    /// to the native probability of `Hold`.
    pub struct CrashChain {
        pub hold_probability: f64,
        pub exit_penalty: f64,
    }

    impl CrashChain {
        pub fn new(hold_probability: f64, exit_penalty: f64) -> Self {
            Self {
                hold_probability,
                exit_penalty,
            }
        }
    }

    impl DecisionProcess for CrashChain {
        type State = ChainState;
        type Action = ChainAction;

        fn actions(&self, state: &ChainState) -> Vec<ChainAction> {
            match state {
                ChainState::Approach => vec![ChainAction::Hold, ChainAction::Swerve],
                _ => Vec::new(),
            }
        }

        fn generative_step(
            &self,
            _state: &ChainState,
            action: &ChainAction,
            _rng: &mut dyn RngCore,
        ) -> (ChainState, f64) {
            match action {
                ChainAction::Hold => (ChainState::Crashed, 1.0),
                ChainAction::Swerve => (ChainState::Cleared, self.exit_penalty),
            }
        }

        fn action_probability(&self, _state: &ChainState, action: &ChainAction) -> f64 {
            match action {
                ChainAction::Hold => self.hold_probability,
                ChainAction::Swerve => 1.0 - self.hold_probability,
            }
        }

        fn initial_state(&self) -> ChainState {
            ChainState::Approach
        }

        fn is_terminal(&self, state: &ChainState) -> bool {
            !matches!(state, ChainState::Approach)
        }

        fn feature(&self, state: &ChainState) -> DVector<f64> {
            match state {
                ChainState::Approach => DVector::from_vec(vec![1.0]),
                _ => DVector::from_vec(vec![0.0]),
            }
        }
    }

    /// Baseline that knows the crash state is a certain failure and claims
    /// ignorance everywhere else.
    pub fn crash_indicator(_: &CrashChain, state: &ChainState) -> f64 {
        match state {
            ChainState::Crashed => 1.0,
            _ => 0.0,
        }
    }

    /// Process whose initial state is already absorbing; episodes terminate
    /// in zero steps.
    pub struct Parked;

    impl DecisionProcess for Parked {
        type State = bool;
        type Action = ();

        fn actions(&self, _state: &bool) -> Vec<()> {
            Vec::new()
        }

        fn generative_step(&self, state: &bool, _action: &(), _rng: &mut dyn RngCore) -> (bool, f64) {
            (*state, 0.0)
        }

        fn action_probability(&self, _state: &bool, _action: &()) -> f64 {
            1.0
        }

        fn initial_state(&self) -> bool {
            true
        }

        fn is_terminal(&self, state: &bool) -> bool {
            *state
        }

        fn feature(&self, _state: &bool) -> DVector<f64> {
            DVector::from_vec(vec![0.0])
        }
    }

    /// Single-action track that never terminates; exercises the step cap.
    pub struct LoopTrack;

    impl DecisionProcess for LoopTrack {
        type State = u32;
        type Action = ();

        fn actions(&self, _state: &u32) -> Vec<()> {
            vec![()]
        }

        fn generative_step(&self, state: &u32, _action: &(), _rng: &mut dyn RngCore) -> (u32, f64) {
            (state + 1, 0.0)
        }

        fn action_probability(&self, _state: &u32, _action: &()) -> f64 {
            1.0
        }

        fn initial_state(&self) -> u32 {
            0
        }

        fn is_terminal(&self, _state: &u32) -> bool {
            false
        }

        fn feature(&self, state: &u32) -> DVector<f64> {
            DVector::from_vec(vec![f64::from(*state)])
        }
    }
}
