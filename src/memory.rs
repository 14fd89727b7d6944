use ndarray::Array1;
use rand::{thread_rng, Rng};
use std::collections::VecDeque;

/// One environment transition, immutable once stored.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Array1<f64>,
    pub action: usize,
    pub reward: f64,
    pub next_state: Array1<f64>,
    pub done: bool,
}

/// Fixed-capacity experience replay memory.
///
/// A FIFO ring: insertion beyond capacity evicts the oldest transition, so the
/// memory is recency-biased. Sampling draws indices independently and uniformly
/// **with replacement**: `sample(n)` on a non-empty memory always returns
/// exactly `n` clones, repeating entries when the memory holds fewer than `n`.
#[derive(Clone, Debug)]
pub struct ReplayMemory {
    buffer: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        ReplayMemory {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Store a transition, evicting the oldest when full. O(1) amortized.
    pub fn add(&mut self, transition: Transition) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `n` transitions uniformly with replacement. Empty memory yields an
    /// empty vector. No ordering guarantee on the result.
    pub fn sample(&self, n: usize) -> Vec<Transition> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let mut rng = thread_rng();
        (0..n)
            .map(|_| self.buffer[rng.gen_range(0..self.buffer.len())].clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Transitions in storage order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }
}
