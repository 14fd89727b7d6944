//! The environment-driving step loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, error, info, warn};
use ndarray::Array1;

use crate::agent::DqnLearner;
use crate::checkpoint::CheckpointStore;
use crate::config::DriverConfig;
use crate::engine::NumericEngine;
use crate::error::Result;
use crate::memory::Transition;

/// The consumed simulation boundary.
///
/// `observe` must be callable at any time and reflects the most recent `act`;
/// `reward` and `is_done` are evaluated against the post-action state.
pub trait Environment {
    fn observe(&mut self) -> Array1<f64>;
    fn act(&mut self, action: usize);
    fn reward(&mut self) -> f64;
    fn is_done(&mut self) -> bool;
    fn reset(&mut self);
}

/// What one completed `step()` produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Lifetime step count after this step (1-based, survives episode resets)
    pub step: u64,
    pub action: usize,
    pub reward: f64,
    pub done: bool,
    /// Fit loss, when a training step ran this tick
    pub loss: Option<f64>,
}

/// Observer invoked after every completed step.
pub type StepObserver = Box<dyn FnMut(&StepOutcome) + Send>;

struct DriverCore<E, N>
where
    E: Environment,
    N: NumericEngine,
{
    env: E,
    learner: DqnLearner<N>,
    config: DriverConfig,
    checkpoints: Option<CheckpointStore>,
    current_state: Array1<f64>,
    step_count: u64,
    on_step: Option<StepObserver>,
}

struct Ticker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Sequences observation, action, reward collection, learning, checkpointing
/// and episode resets across discrete time steps.
///
/// Supports manual stepping and an interval-driven automatic mode. At most
/// one step is logically in flight at a time: a tick that fires while a step
/// is still running is dropped, never interleaved, so `current_state` and the
/// replay memory keep their temporal order.
pub struct EpisodeDriver<E, N>
where
    E: Environment,
    N: NumericEngine,
{
    core: Arc<Mutex<DriverCore<E, N>>>,
    in_flight: Arc<AtomicBool>,
    ticker: Option<Ticker>,
}

impl<E, N> EpisodeDriver<E, N>
where
    E: Environment,
    N: NumericEngine,
{
    /// Create a driver; the initial state is taken from
    /// `Environment::observe()`.
    pub fn new(mut env: E, learner: DqnLearner<N>, config: DriverConfig) -> Self {
        let current_state = env.observe();
        EpisodeDriver {
            core: Arc::new(Mutex::new(DriverCore {
                env,
                learner,
                config,
                checkpoints: None,
                current_state,
                step_count: 0,
                on_step: None,
            })),
            in_flight: Arc::new(AtomicBool::new(false)),
            ticker: None,
        }
    }

    /// Attach a checkpoint store. Saves only happen when the driver config
    /// also names a repository.
    pub fn with_checkpoints(self, store: CheckpointStore) -> Self {
        self.lock().checkpoints = Some(store);
        self
    }

    /// Register an observer invoked after every completed step.
    pub fn on_step<F>(&self, observer: F)
    where
        F: FnMut(&StepOutcome) + Send + 'static,
    {
        self.lock().on_step = Some(Box::new(observer));
    }

    /// Advance the loop by exactly one step.
    ///
    /// Returns `None` when the tick was dropped: either a previous step is
    /// still in flight, or action selection failed (logged; the state does
    /// not advance).
    pub fn step(&self) -> Option<StepOutcome> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            debug!("tick dropped: previous step still in flight");
            return None;
        }
        let outcome = self.lock().step_once();
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }

    /// Begin automatic stepping at `interval`. Does nothing if already
    /// started.
    pub fn start(&mut self, interval: Duration)
    where
        E: Send + 'static,
        N: Send + 'static,
    {
        if self.ticker.is_some() {
            debug!("driver already started");
            return;
        }
        info!("starting automatic stepping every {:?}", interval);
        let stop = Arc::new(AtomicBool::new(false));
        let core = Arc::clone(&self.core);
        let in_flight = Arc::clone(&self.in_flight);
        let tick_stop = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !tick_stop.load(Ordering::SeqCst) {
                if in_flight.swap(true, Ordering::SeqCst) {
                    debug!("tick dropped: previous step still in flight");
                } else {
                    core.lock().unwrap_or_else(|e| e.into_inner()).step_once();
                    in_flight.store(false, Ordering::SeqCst);
                }
                std::thread::sleep(interval);
            }
        });
        self.ticker = Some(Ticker { stop, handle });
    }

    /// Begin automatic stepping at the configured `step_interval`.
    pub fn start_default(&mut self)
    where
        E: Send + 'static,
        N: Send + 'static,
    {
        let interval = self.lock().config.step_interval;
        self.start(interval);
    }

    /// Cancel the tick timer. Safe to call when not started. An in-flight
    /// step runs to completion; only the timer is cancelled.
    pub fn stop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop.store(true, Ordering::SeqCst);
            if ticker.handle.join().is_err() {
                warn!("tick thread panicked");
            }
            info!("automatic stepping stopped");
        }
    }

    /// Reset the environment, refresh the current state, and zero the
    /// lifetime step counter.
    ///
    /// This does not touch learner state; callers wanting a full reset must
    /// also call [`DqnLearner::reset`].
    pub fn reset(&self) {
        let mut core = self.lock();
        core.env.reset();
        core.current_state = core.env.observe();
        core.step_count = 0;
    }

    /// Lifetime step count, across episode boundaries.
    pub fn step_count(&self) -> u64 {
        self.lock().step_count
    }

    /// The observation the next step will act on.
    pub fn current_state(&self) -> Array1<f64> {
        self.lock().current_state.clone()
    }

    /// Inspect the learner under the driver lock.
    pub fn with_learner<R>(&self, f: impl FnOnce(&mut DqnLearner<N>) -> R) -> R {
        f(&mut self.lock().learner)
    }

    /// Inspect the environment under the driver lock.
    pub fn with_env<R>(&self, f: impl FnOnce(&mut E) -> R) -> R {
        f(&mut self.lock().env)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DriverCore<E, N>> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<E, N> Drop for EpisodeDriver<E, N>
where
    E: Environment,
    N: NumericEngine,
{
    fn drop(&mut self) {
        self.stop();
    }
}

impl<E, N> DriverCore<E, N>
where
    E: Environment,
    N: NumericEngine,
{
    fn step_once(&mut self) -> Option<StepOutcome> {
        self.step_count += 1;

        let action = match self.learner.select_action(self.current_state.view()) {
            Ok(action) => action,
            Err(err) => {
                error!("action selection failed, dropping tick: {}", err);
                return None;
            }
        };

        self.env.act(action);
        let next_state = self.env.observe();
        let reward = self.env.reward();
        let done = self.env.is_done();

        self.learner.remember(Transition {
            state: self.current_state.clone(),
            action,
            reward,
            next_state: next_state.clone(),
            done,
        });

        let loss = self.learner.learn();

        if let Err(err) = self.save_checkpoints(reward) {
            warn!("no checkpoint this tick: {}", err);
        }

        if done {
            debug!("episode finished at step {}", self.step_count);
            self.env.reset();
            self.current_state = self.env.observe();
        } else {
            self.current_state = next_state;
        }

        let outcome = StepOutcome {
            step: self.step_count,
            action,
            reward,
            done,
            loss,
        };
        if let Some(observer) = self.on_step.as_mut() {
            observer(&outcome);
        }
        Some(outcome)
    }

    fn save_checkpoints(&mut self, reward: f64) -> Result<()> {
        let (store, repository) = match (&self.checkpoints, &self.config.repository) {
            (Some(store), Some(repository)) => (store, repository.as_str()),
            _ => return Ok(()),
        };
        let token = self.config.token.as_deref();

        let every = self.config.checkpoint_every;
        if every > 0 && self.step_count % every == 0 {
            store.save(
                repository,
                token,
                &format!("step-{}", self.step_count),
                self.learner.engine(),
            )?;
        }

        let label = self.step_count.to_string();
        self.learner
            .maybe_save_best_checkpoint(store, repository, token, reward, Some(&label))?;
        Ok(())
    }
}
