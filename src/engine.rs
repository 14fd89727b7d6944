//! The numeric-backend boundary.
//!
//! The engine owns the online and target Q-network parameters and everything
//! tensor-shaped: inference, the supervised fit, and parameter import/export.
//! The core never constructs one: a learner receives its engine at
//! construction, which keeps the training logic testable against a fake
//! backend.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{EmberError, Result};

/// Shape record for one parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name: String,
    pub shape: Vec<usize>,
}

impl TensorSpec {
    pub fn new<S: Into<String>>(name: S, shape: Vec<usize>) -> Self {
        TensorSpec {
            name: name.into(),
            shape,
        }
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Structural description of a parameter snapshot: the ordered list of
/// tensors whose flattened values make up [`ModelParameters::values`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub tensors: Vec<TensorSpec>,
}

impl ParameterDescriptor {
    pub fn element_count(&self) -> usize {
        self.tensors.iter().map(TensorSpec::element_count).sum()
    }
}

/// An opaque, serializable snapshot of a [`NumericEngine`]'s online
/// parameters. The descriptor and the flat value buffer are checkpointed as
/// separate artifacts; [`validate`](ModelParameters::validate) checks they
/// agree before a snapshot is installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub descriptor: ParameterDescriptor,
    pub values: Vec<f64>,
}

impl ModelParameters {
    pub fn validate(&self) -> Result<()> {
        let expected = self.descriptor.element_count();
        if expected != self.values.len() {
            return Err(EmberError::dimension_mismatch(
                format!("{} parameter values", expected),
                format!("{}", self.values.len()),
            ));
        }
        Ok(())
    }
}

/// The consumed numeric collaborator: Q-network inference and training.
///
/// Implementations hold two parameter sets, online and target, and are
/// mutated only through this trait. `fit` mutates the online parameters;
/// `sync_target` overwrites the target parameters with the online ones.
/// All batch arguments are row-major: one state (or Q-value row) per row.
pub trait NumericEngine {
    /// Q-values for a batch of states under the online network.
    fn predict_online(&mut self, states: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Q-values for a batch of states under the target network.
    fn predict_target(&mut self, states: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Run exactly one epoch of supervised training of the online network
    /// towards `targets` and return the loss.
    fn fit(&mut self, states: ArrayView2<f64>, targets: ArrayView2<f64>) -> Result<f64>;

    /// Copy the online parameters into the target network.
    fn sync_target(&mut self) -> Result<()>;

    /// Export the online parameters.
    fn parameters(&self) -> Result<ModelParameters>;

    /// Install online parameters from a snapshot.
    fn set_parameters(&mut self, parameters: &ModelParameters) -> Result<()>;

    /// Release backend resources (GPU tensors, FFI handles). Called when the
    /// owning learner is dropped.
    fn dispose(&mut self) {}
}
