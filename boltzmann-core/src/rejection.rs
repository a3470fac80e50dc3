//! Ceiled rejection: repeat attempts until one lands in a size window.

use crate::data::Size;
use crate::error::{BoltzmannError, Result};
use crate::sampler::{GenerationState, Step};
use tracing::{debug, trace};

/// Closed interval of accepted sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    lower: usize,
    upper: usize,
}

impl Window {
    /// Window accepting sizes in `[lower, upper]`.
    pub fn new(lower: usize, upper: usize) -> Self {
        Window { lower, upper }
    }

    /// `[⌈t(1 - ε)⌉, ⌊t(1 + ε)⌋]` for target `t` and tolerance `ε`.
    pub fn around(target: Size, tolerance: f64) -> Self {
        let t = target.get() as f64;
        // Nudge so exact products like 100 * 0.9 are not lost to rounding.
        let lower = (t * (1.0 - tolerance) - 1e-9).ceil().max(0.0) as usize;
        let upper = (t * (1.0 + tolerance) + 1e-9).floor() as usize;
        Window { lower, upper }
    }

    /// Smallest accepted size.
    pub fn lower(&self) -> usize {
        self.lower
    }

    /// Largest accepted size, also the generation ceiling.
    pub fn upper(&self) -> usize {
        self.upper
    }

    /// Whether `size` is accepted.
    pub fn contains(&self, size: usize) -> bool {
        self.lower <= size && size <= self.upper
    }

    /// A fresh budget whose ceiling is the upper bound.
    pub fn state(&self) -> GenerationState {
        GenerationState::with_ceiling(self.upper)
    }
}

/// A value accepted by the rejection loop.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampled<T> {
    pub value: T,
    pub size: Size,
    pub attempts: usize,
}

/// Rejection loop over a [`Window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    window: Window,
    max_retries: Option<usize>,
}

impl Rejection {
    /// Loop accepting sizes in `window`, unbounded when `max_retries` is `None`.
    pub fn new(window: Window, max_retries: Option<usize>) -> Self {
        Rejection {
            window,
            max_retries,
        }
    }

    /// The acceptance window.
    pub fn window(&self) -> Window {
        self.window
    }

    /// Run `attempt` with a fresh budget until it yields a value whose size is
    /// inside the window.
    pub fn run<T>(
        &self,
        mut attempt: impl FnMut(&mut GenerationState) -> Result<Step<T>>,
    ) -> Result<Sampled<T>> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut state = self.window.state();
            match attempt(&mut state)? {
                Step::Accepted(value) if self.window.contains(state.atoms()) => {
                    debug!(
                        attempts,
                        size = state.atoms(),
                        lower = self.window.lower,
                        upper = self.window.upper,
                        "accepted sample"
                    );
                    return Ok(Sampled {
                        value,
                        size: Size(state.atoms()),
                        attempts,
                    });
                }
                Step::Accepted(_) => trace!(attempts, size = state.atoms(), "rejected undersized"),
                Step::Aborted => trace!(attempts, "aborted past ceiling"),
            }
            if self.max_retries.is_some_and(|limit| attempts >= limit) {
                return Err(BoltzmannError::RetryLimitExceeded {
                    attempts,
                    lower: self.window.lower,
                    upper: self.window.upper,
                });
            }
        }
    }
}
