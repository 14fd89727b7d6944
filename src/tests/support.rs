//! Shared fakes: a linear numeric backend, a fixed-output backend, and a
//! scripted environment.

use ndarray::{array, Array1, Array2, ArrayView2};

use crate::driver::Environment;
use crate::engine::{ModelParameters, NumericEngine, ParameterDescriptor, TensorSpec};
use crate::error::{EmberError, Result};

/// Linear Q-model `q = W s` with separate online and target weight matrices
/// (`action_size` rows, `input_size` columns). Counts fits and target syncs.
pub struct LinearEngine {
    pub online: Array2<f64>,
    pub target: Array2<f64>,
    pub fit_count: usize,
    pub sync_count: usize,
    pub last_fit_states: Option<Array2<f64>>,
    pub last_fit_targets: Option<Array2<f64>>,
    pub fail_fit: bool,
}

impl LinearEngine {
    pub fn new(input_size: usize, action_size: usize) -> Self {
        let online = Array2::from_shape_fn((action_size, input_size), |(a, i)| {
            0.1 * (a as f64 + 1.0) + 0.01 * i as f64
        });
        LinearEngine {
            target: online.clone(),
            online,
            fit_count: 0,
            sync_count: 0,
            last_fit_states: None,
            last_fit_targets: None,
            fail_fit: false,
        }
    }

    fn predict_with(weights: &Array2<f64>, states: ArrayView2<f64>) -> Result<Array2<f64>> {
        if states.ncols() != weights.ncols() {
            return Err(EmberError::dimension_mismatch(
                format!("states with {} columns", weights.ncols()),
                format!("{} columns", states.ncols()),
            ));
        }
        Ok(states.dot(&weights.t()))
    }
}

impl NumericEngine for LinearEngine {
    fn predict_online(&mut self, states: ArrayView2<f64>) -> Result<Array2<f64>> {
        Self::predict_with(&self.online, states)
    }

    fn predict_target(&mut self, states: ArrayView2<f64>) -> Result<Array2<f64>> {
        Self::predict_with(&self.target, states)
    }

    fn fit(&mut self, states: ArrayView2<f64>, targets: ArrayView2<f64>) -> Result<f64> {
        if self.fail_fit {
            return Err(EmberError::NumericError("injected fit failure".to_string()));
        }
        let predictions = Self::predict_with(&self.online, states)?;
        let loss = (&predictions - &targets)
            .mapv(|x| x * x)
            .mean()
            .unwrap_or(f64::INFINITY);
        self.fit_count += 1;
        self.last_fit_states = Some(states.to_owned());
        self.last_fit_targets = Some(targets.to_owned());
        Ok(loss)
    }

    fn sync_target(&mut self) -> Result<()> {
        self.target = self.online.clone();
        self.sync_count += 1;
        Ok(())
    }

    fn parameters(&self) -> Result<ModelParameters> {
        Ok(ModelParameters {
            descriptor: ParameterDescriptor {
                tensors: vec![TensorSpec::new(
                    "q/kernel",
                    vec![self.online.nrows(), self.online.ncols()],
                )],
            },
            values: self.online.iter().copied().collect(),
        })
    }

    fn set_parameters(&mut self, parameters: &ModelParameters) -> Result<()> {
        let shape = (self.online.nrows(), self.online.ncols());
        self.online = Array2::from_shape_vec(shape, parameters.values.clone())
            .map_err(|err| EmberError::SerializationError(err.to_string()))?;
        Ok(())
    }
}

/// Backend with constant Q-rows: `online_q` from the online network and
/// `target_q` from the target network, regardless of the input state.
pub struct FixedEngine {
    pub online_q: Vec<f64>,
    pub target_q: Vec<f64>,
    pub fit_count: usize,
    pub sync_count: usize,
    pub last_fit_targets: Option<Array2<f64>>,
}

impl FixedEngine {
    pub fn new(online_q: Vec<f64>, target_q: Vec<f64>) -> Self {
        FixedEngine {
            online_q,
            target_q,
            fit_count: 0,
            sync_count: 0,
            last_fit_targets: None,
        }
    }

    fn rows(q: &[f64], n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, q.len()), |(_, j)| q[j])
    }
}

impl NumericEngine for FixedEngine {
    fn predict_online(&mut self, states: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(Self::rows(&self.online_q, states.nrows()))
    }

    fn predict_target(&mut self, states: ArrayView2<f64>) -> Result<Array2<f64>> {
        Ok(Self::rows(&self.target_q, states.nrows()))
    }

    fn fit(&mut self, _states: ArrayView2<f64>, targets: ArrayView2<f64>) -> Result<f64> {
        self.fit_count += 1;
        self.last_fit_targets = Some(targets.to_owned());
        Ok(0.0)
    }

    fn sync_target(&mut self) -> Result<()> {
        self.sync_count += 1;
        Ok(())
    }

    fn parameters(&self) -> Result<ModelParameters> {
        Ok(ModelParameters {
            descriptor: ParameterDescriptor {
                tensors: vec![TensorSpec::new("q/bias", vec![self.online_q.len()])],
            },
            values: self.online_q.clone(),
        })
    }

    fn set_parameters(&mut self, parameters: &ModelParameters) -> Result<()> {
        self.online_q = parameters.values.clone();
        Ok(())
    }
}

/// Environment whose observation is a pure function of its counters and that
/// reports `done` every `done_every`-th action.
pub struct ScriptedEnv {
    pub done_every: u64,
    pub act_count: u64,
    pub reset_count: u64,
    pub last_action: Option<usize>,
}

impl ScriptedEnv {
    pub fn new(done_every: u64) -> Self {
        ScriptedEnv {
            done_every,
            act_count: 0,
            reset_count: 0,
            last_action: None,
        }
    }

    pub fn expected_observation(&self) -> Array1<f64> {
        array![self.act_count as f64, self.reset_count as f64]
    }
}

impl Environment for ScriptedEnv {
    fn observe(&mut self) -> Array1<f64> {
        self.expected_observation()
    }

    fn act(&mut self, action: usize) {
        self.act_count += 1;
        self.last_action = Some(action);
    }

    fn reward(&mut self) -> f64 {
        1.0
    }

    fn is_done(&mut self) -> bool {
        self.done_every > 0 && self.act_count % self.done_every == 0
    }

    fn reset(&mut self) {
        self.reset_count += 1;
    }
}
