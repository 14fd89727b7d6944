use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};

/// Hyperparameters for a [`DqnLearner`](crate::agent::DqnLearner).
///
/// Immutable once the learner is constructed. Every field except
/// `input_size` and `action_size` has a documented default; start from
/// [`AgentConfig::new`] and override what you need.
///
/// `hidden_layers` and `learning_rate` are advisory: the engine is injected
/// fully built, so these fields exist for the caller's engine factory and are
/// never read by the core itself.
///
/// # Example
///
/// ```rust
/// use ember::config::AgentConfig;
///
/// let config = AgentConfig {
///     gamma: 0.95,
///     batch_size: 64,
///     ..AgentConfig::new(4, 2)
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Dimension of the observation vector
    pub input_size: usize,

    /// Number of discrete actions
    pub action_size: usize,

    /// Hidden-layer widths, advisory to the engine factory. Default: `[24, 24]`
    pub hidden_layers: Vec<usize>,

    /// Discount factor, in `[0, 1]`. Default: `0.99`
    pub gamma: f64,

    /// Initial exploration rate, in `[0, 1]`. Default: `1.0`
    pub epsilon: f64,

    /// Multiplicative epsilon decay per training step, in `(0, 1]`. Default: `0.995`
    pub epsilon_decay: f64,

    /// Exploration floor. Default: `0.01`
    pub min_epsilon: f64,

    /// Learning rate, advisory to the engine factory. Default: `0.001`
    pub learning_rate: f64,

    /// Number of transitions per training batch. Default: `32`
    pub batch_size: usize,

    /// Replay memory capacity. Default: `10_000`
    pub memory_size: usize,

    /// Target-network sync period, in training steps. Default: `1000`
    pub target_sync_period: u64,
}

impl AgentConfig {
    /// Create a configuration with the documented defaults for the given
    /// observation dimension and action-space size.
    pub fn new(input_size: usize, action_size: usize) -> Self {
        AgentConfig {
            input_size,
            action_size,
            hidden_layers: vec![24, 24],
            gamma: 0.99,
            epsilon: 1.0,
            epsilon_decay: 0.995,
            min_epsilon: 0.01,
            learning_rate: 0.001,
            batch_size: 32,
            memory_size: 10_000,
            target_sync_period: 1000,
        }
    }

    /// Fail-fast validation, run before any stepping begins.
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(EmberError::invalid_parameter(
                "input_size",
                "must be greater than 0",
            ));
        }
        if self.action_size == 0 {
            return Err(EmberError::invalid_parameter(
                "action_size",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(EmberError::invalid_parameter(
                "gamma",
                "must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(EmberError::invalid_parameter(
                "epsilon",
                "must be within [0, 1]",
            ));
        }
        if self.epsilon_decay <= 0.0 || self.epsilon_decay > 1.0 {
            return Err(EmberError::invalid_parameter(
                "epsilon_decay",
                "must be within (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_epsilon) {
            return Err(EmberError::invalid_parameter(
                "min_epsilon",
                "must be within [0, 1]",
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(EmberError::invalid_parameter(
                "learning_rate",
                "must be positive",
            ));
        }
        if self.batch_size == 0 {
            return Err(EmberError::invalid_parameter(
                "batch_size",
                "must be greater than 0",
            ));
        }
        if self.memory_size == 0 {
            return Err(EmberError::invalid_parameter(
                "memory_size",
                "must be greater than 0",
            ));
        }
        if self.target_sync_period == 0 {
            return Err(EmberError::invalid_parameter(
                "target_sync_period",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Scheduling and checkpointing knobs for an
/// [`EpisodeDriver`](crate::driver::EpisodeDriver).
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Period of the automatic tick when started. Default: 100 ms
    pub step_interval: Duration,

    /// Save a `step-<N>` checkpoint every this many steps; `0` disables
    /// periodic checkpoints. Default: `0`
    pub checkpoint_every: u64,

    /// Repository id for checkpoints; checkpointing is inactive without one
    pub repository: Option<String>,

    /// Access token forwarded to the blob store
    pub token: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            step_interval: Duration::from_millis(100),
            checkpoint_every: 0,
            repository: None,
            token: None,
        }
    }
}
