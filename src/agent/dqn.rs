use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::checkpoint::CheckpointStore;
use crate::config::AgentConfig;
use crate::engine::{ModelParameters, NumericEngine};
use crate::error::{EmberError, Result};
use crate::memory::{ReplayMemory, Transition};

/// Deep Q-Network learner over an injected numeric backend.
///
/// Owns the epsilon-greedy policy, the replay memory, the TD-target
/// construction, the epsilon decay schedule, and the target-network sync
/// cadence. The engine is received at construction and never built here, so
/// the learner trains against any backend that implements
/// [`NumericEngine`], including a fake one in tests.
///
/// # Example
///
/// ```rust
/// use ember::agent::DqnLearner;
/// use ember::config::AgentConfig;
/// use ember::engine::{ModelParameters, NumericEngine, ParameterDescriptor, TensorSpec};
/// use ember::error::Result;
/// use ember::memory::Transition;
/// use ndarray::{array, Array2, ArrayView2};
///
/// struct ZeroEngine;
///
/// impl NumericEngine for ZeroEngine {
///     fn predict_online(&mut self, states: ArrayView2<f64>) -> Result<Array2<f64>> {
///         Ok(Array2::zeros((states.nrows(), 2)))
///     }
///     fn predict_target(&mut self, states: ArrayView2<f64>) -> Result<Array2<f64>> {
///         Ok(Array2::zeros((states.nrows(), 2)))
///     }
///     fn fit(&mut self, _: ArrayView2<f64>, _: ArrayView2<f64>) -> Result<f64> {
///         Ok(0.0)
///     }
///     fn sync_target(&mut self) -> Result<()> {
///         Ok(())
///     }
///     fn parameters(&self) -> Result<ModelParameters> {
///         Ok(ModelParameters {
///             descriptor: ParameterDescriptor { tensors: vec![TensorSpec::new("w", vec![0])] },
///             values: vec![],
///         })
///     }
///     fn set_parameters(&mut self, _: &ModelParameters) -> Result<()> {
///         Ok(())
///     }
/// }
///
/// let config = AgentConfig::new(4, 2);
/// let mut learner = DqnLearner::new(ZeroEngine, config).unwrap();
///
/// let state = array![0.1, -0.2, 0.3, -0.1];
/// let action = learner.select_action(state.view()).unwrap();
///
/// learner.remember(Transition {
///     state: state.clone(),
///     action,
///     reward: 1.0,
///     next_state: array![0.15, -0.25, 0.35, -0.05],
///     done: false,
/// });
/// let loss = learner.learn(); // None until the memory holds a full batch
/// assert!(loss.is_none());
/// ```
pub struct DqnLearner<N: NumericEngine> {
    engine: N,
    config: AgentConfig,
    memory: ReplayMemory,
    epsilon: f64,
    train_steps: u64,
    best_reward: f64,
    rng: StdRng,
}

impl<N: NumericEngine> DqnLearner<N> {
    /// Create a learner around an injected engine.
    ///
    /// Validates the configuration (fail fast, before any stepping) and syncs
    /// the target network once so both parameter sets start identical.
    pub fn new(mut engine: N, config: AgentConfig) -> Result<Self> {
        config.validate()?;
        engine.sync_target()?;
        let memory = ReplayMemory::new(config.memory_size);
        let epsilon = config.epsilon;
        Ok(DqnLearner {
            engine,
            config,
            memory,
            epsilon,
            train_steps: 0,
            best_reward: f64::NEG_INFINITY,
            rng: StdRng::from_entropy(),
        })
    }

    /// Select an action for `state` with the epsilon-greedy policy.
    ///
    /// The explore/exploit choice is a fresh coin flip on every call: with
    /// probability `epsilon` a uniform-random action, otherwise the argmax of
    /// the online network's Q-values, ties broken by the first (lowest-index)
    /// maximum.
    pub fn select_action(&mut self, state: ArrayView1<f64>) -> Result<usize> {
        if self.rng.gen::<f64>() < self.epsilon {
            let action = self.rng.gen_range(0..self.config.action_size);
            debug!("exploring with random action {} (epsilon {:.3})", action, self.epsilon);
            return Ok(action);
        }

        let q_values = self.q_values(state)?;
        let mut best = 0;
        for (index, &value) in q_values.iter().enumerate() {
            if value > q_values[best] {
                best = index;
            }
        }
        Ok(best)
    }

    /// Online-network Q-values for a single state.
    pub fn q_values(&mut self, state: ArrayView1<f64>) -> Result<Array1<f64>> {
        if state.len() != self.config.input_size {
            return Err(EmberError::dimension_mismatch(
                format!("state of length {}", self.config.input_size),
                format!("length {}", state.len()),
            ));
        }
        let batch = state
            .to_owned()
            .into_shape((1, self.config.input_size))
            .map_err(|err| EmberError::NumericError(err.to_string()))?;
        let q_values = self.engine.predict_online(batch.view())?;
        Ok(q_values.row(0).to_owned())
    }

    /// Store a transition in the replay memory. No side effects beyond
    /// storage.
    pub fn remember(&mut self, transition: Transition) {
        self.memory.add(transition);
    }

    /// Run one training step if the memory holds at least a full batch.
    ///
    /// Returns the fit loss, or `None` when the step was skipped: an
    /// under-filled memory is a documented no-op, and engine failures are
    /// caught and logged so they never abort the caller's step loop. A
    /// skipped step leaves `epsilon` and the train-step counter untouched.
    pub fn learn(&mut self) -> Option<f64> {
        match self.train_batch() {
            Ok(loss) => loss,
            Err(err) => {
                warn!("training step skipped: {}", err);
                None
            }
        }
    }

    fn train_batch(&mut self) -> Result<Option<f64>> {
        let batch_size = self.config.batch_size;
        if self.memory.len() < batch_size {
            debug!(
                "not enough experience to train ({}/{})",
                self.memory.len(),
                batch_size
            );
            return Ok(None);
        }

        let batch = self.memory.sample(batch_size);
        let input_size = self.config.input_size;

        let mut states = Array2::zeros((batch.len(), input_size));
        let mut next_states = Array2::zeros((batch.len(), input_size));
        for (i, transition) in batch.iter().enumerate() {
            if transition.state.len() != input_size || transition.next_state.len() != input_size {
                return Err(EmberError::dimension_mismatch(
                    format!("states of length {}", input_size),
                    format!(
                        "lengths {} and {}",
                        transition.state.len(),
                        transition.next_state.len()
                    ),
                ));
            }
            states.row_mut(i).assign(&transition.state);
            next_states.row_mut(i).assign(&transition.next_state);
        }

        // Bootstrap targets come from the target network; the online network
        // supplies the rows so the loss gradient only flows through the taken
        // action's component.
        let mut targets = self.engine.predict_online(states.view())?;
        let next_q_target = self.engine.predict_target(next_states.view())?;

        for (i, transition) in batch.iter().enumerate() {
            let td_target = if transition.done {
                transition.reward
            } else {
                let max_next = next_q_target
                    .row(i)
                    .iter()
                    .fold(f64::NEG_INFINITY, |max, &v| max.max(v));
                transition.reward + self.config.gamma * max_next
            };
            match targets.get_mut((i, transition.action)) {
                Some(slot) => *slot = td_target,
                None => {
                    return Err(EmberError::InvalidAction {
                        action: transition.action,
                        action_size: self.config.action_size,
                    })
                }
            }
        }

        // Release the batch intermediates before the fit allocates its own
        // buffers; nothing numeric may outlive this invocation.
        drop(next_q_target);
        drop(next_states);

        let loss = self.engine.fit(states.view(), targets.view())?;

        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
        self.train_steps += 1;
        if self.train_steps % self.config.target_sync_period == 0 {
            self.engine.sync_target()?;
            debug!("target network synchronised at train step {}", self.train_steps);
        }

        Ok(Some(loss))
    }

    /// Copy the online-network parameters into the target network.
    pub fn sync_target_network(&mut self) -> Result<()> {
        self.engine.sync_target()
    }

    /// Restore the initial exploration rate, discard all stored experience,
    /// and zero the train-step counter. The best-reward watermark is kept so
    /// best-checkpoint tracking survives resets.
    pub fn reset(&mut self) {
        self.epsilon = self.config.epsilon;
        self.memory = ReplayMemory::new(self.config.memory_size);
        self.train_steps = 0;
    }

    /// Save a checkpoint if `reward` strictly improves on the best reward
    /// seen so far. Equal rewards never trigger a save.
    ///
    /// The checkpoint name is `best-<label>`, or the literal `best` when no
    /// label is given. Returns whether a save was performed.
    pub fn maybe_save_best_checkpoint(
        &mut self,
        store: &CheckpointStore,
        repository: &str,
        token: Option<&str>,
        reward: f64,
        label: Option<&str>,
    ) -> Result<bool> {
        if reward <= self.best_reward {
            return Ok(false);
        }
        self.best_reward = reward;
        let name = match label {
            Some(label) => format!("best-{}", label),
            None => "best".to_string(),
        };
        store.save(repository, token, &name, &self.engine)?;
        Ok(true)
    }

    /// Load the checkpoint stored under `(repository, name)` and install it.
    ///
    /// The target network is synced afterwards so both parameter sets match
    /// the restored snapshot.
    pub fn restore_checkpoint(
        &mut self,
        store: &CheckpointStore,
        repository: &str,
        name: &str,
    ) -> Result<()> {
        let parameters = store.load(repository, name)?;
        self.set_parameters(&parameters)
    }

    /// Install online parameters and sync the target network.
    pub fn set_parameters(&mut self, parameters: &ModelParameters) -> Result<()> {
        parameters.validate()?;
        self.engine.set_parameters(parameters)?;
        self.engine.sync_target()
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Training steps performed since construction or the last `reset`.
    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    /// Highest reward passed to `maybe_save_best_checkpoint` so far.
    pub fn best_reward(&self) -> f64 {
        self.best_reward
    }

    /// Number of transitions currently in the replay memory.
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn engine(&self) -> &N {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut N {
        &mut self.engine
    }
}

impl<N: NumericEngine> Drop for DqnLearner<N> {
    fn drop(&mut self) {
        self.engine.dispose();
    }
}

/// Builder pattern for [`DqnLearner`].
pub struct DqnLearnerBuilder<N: NumericEngine> {
    engine: Option<N>,
    config: Option<AgentConfig>,
}

impl<N: NumericEngine> DqnLearnerBuilder<N> {
    pub fn new() -> Self {
        DqnLearnerBuilder {
            engine: None,
            config: None,
        }
    }

    pub fn engine(mut self, engine: N) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<DqnLearner<N>> {
        let engine = self.engine.ok_or_else(|| EmberError::InvalidParameter {
            name: "engine".to_string(),
            reason: "Numeric engine must be specified".to_string(),
        })?;
        let config = self.config.ok_or_else(|| EmberError::InvalidParameter {
            name: "config".to_string(),
            reason: "Agent configuration must be specified".to_string(),
        })?;
        DqnLearner::new(engine, config)
    }
}

impl<N: NumericEngine> Default for DqnLearnerBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}
