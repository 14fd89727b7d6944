//! # Ember - Online Deep Q-Network Training Engine
//!
//! Ember is a Rust library for training a value-based reinforcement-learning
//! agent online against a pluggable simulated environment, with durable
//! checkpointing to a named-blob store. It owns the decision/learning state
//! machine (epsilon-greedy action selection, experience replay, TD-target
//! construction, target-network sync cadence) while the environment and the
//! neural-network numerics stay behind traits.
//!
//! ## Key Features
//!
//! - **Pluggable environment**: anything implementing [`driver::Environment`]
//!   (observe/act/reward/done/reset) can drive training
//! - **Pluggable numerics**: the Q-networks live behind
//!   [`engine::NumericEngine`]; the core never constructs a network itself
//! - **Experience replay**: fixed-capacity FIFO memory with uniform
//!   with-replacement sampling
//! - **Stable targets**: bootstrap targets come from a periodically-synced
//!   target network
//! - **Durable checkpoints**: descriptor + weight-blob artifacts in a
//!   [`checkpoint::BlobStore`], with bounded exponential-backoff retry on load
//! - **Cooperative scheduling**: interval-driven stepping with an in-flight
//!   guard, so overlapping ticks are dropped rather than interleaved
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember::agent::DqnLearner;
//! use ember::config::{AgentConfig, DriverConfig};
//! use ember::driver::{Environment, EpisodeDriver};
//! use ember::engine::NumericEngine;
//!
//! fn build(env: impl Environment + Send + 'static,
//!          engine: impl NumericEngine + Send + 'static) {
//!     let config = AgentConfig::new(4, 2);
//!     let learner = DqnLearner::new(engine, config).unwrap();
//!
//!     let mut driver = EpisodeDriver::new(env, learner, DriverConfig::default());
//!     driver.start(std::time::Duration::from_millis(100));
//!     // ... later
//!     driver.stop();
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`agent`] - The DQN learner (policy, TD targets, sync cadence)
//! - [`checkpoint`] - Blob-store protocol and checkpoint save/load
//! - [`config`] - Hyperparameters and driver settings with defaults
//! - [`driver`] - Environment boundary and the episode step loop
//! - [`engine`] - Numeric-backend boundary and parameter snapshots
//! - [`error`] - Error types and result handling
//! - [`memory`] - Experience replay memory

pub mod agent;
pub mod checkpoint;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod memory;

#[cfg(test)]
mod tests;
