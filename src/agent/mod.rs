//! Value-based learning agents.

mod dqn;

pub use dqn::{DqnLearner, DqnLearnerBuilder};
