//! Parallel ceiled rejection.
//!
//! Rejection attempts are independent: they share the oracle tables
//! read-only and each owns its generation state. Racing them on several
//! threads therefore returns as soon as any thread lands in the window.
//! Each thread draws from its own stream split from one root [`Seed`].

use crate::alias::Ceiled;
use crate::data::{Seed, Size};
use crate::error::{BoltzmannError, Result};
use crate::generator::{Generator, Tuning};
use crate::random::SeedSource;
use crate::rejection::Sampled;
use crate::sampler::Step;
use crate::structure::Structure;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use tracing::debug;

/// Configuration for parallel sampling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelConfig {
    /// Number of threads racing attempts.
    pub thread_count: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig {
            thread_count: num_cpus::get(),
        }
    }
}

impl ParallelConfig {
    /// Set the number of threads.
    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }
}

/// Runs the rejection loop of a ceiled generator on several threads.
#[derive(Debug, Clone, Default)]
pub struct ParallelSampler {
    config: ParallelConfig,
}

impl ParallelSampler {
    /// Create a sampler with the given thread configuration.
    pub fn new(config: ParallelConfig) -> Self {
        ParallelSampler { config }
    }

    /// Thread configuration.
    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// Race rejection attempts around `target` until one is accepted.
    ///
    /// The generator's retry limit bounds the attempts of all threads
    /// together. `attempts` in the result counts every attempt started
    /// before the accepted one finished.
    pub fn sample<T: Structure + Send>(
        &self,
        generator: &Generator<T, Ceiled>,
        tuning: Tuning,
        target: Size,
        seed: Seed,
    ) -> Result<Sampled<T>> {
        if self.config.thread_count == 0 {
            return Err(BoltzmannError::invalid_config("thread_count must be positive"));
        }
        let plan = generator.plan(tuning)?;
        let window = generator.window(tuning, target)?;
        let max_retries = generator.config().max_retries;

        let done = AtomicBool::new(false);
        let started = AtomicUsize::new(0);
        let winner: Mutex<Option<Result<Sampled<T>>>> = Mutex::new(None);

        let mut root = SeedSource::new(seed);
        let sources: Vec<SeedSource> = (0..self.config.thread_count).map(|_| root.split()).collect();
        debug!(
            threads = sources.len(),
            target = target.get(),
            lower = window.lower(),
            upper = window.upper(),
            "parallel rejection sampling"
        );

        thread::scope(|scope| {
            for mut source in sources {
                let (plan, done, started, winner) = (&plan, &done, &started, &winner);
                scope.spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        let attempt = started.fetch_add(1, Ordering::AcqRel) + 1;
                        if max_retries.is_some_and(|limit| attempt > limit) {
                            break;
                        }
                        let mut state = window.state();
                        let outcome = match plan.attempt::<T>(&mut source, &mut state) {
                            Ok(Step::Accepted(value)) if window.contains(state.atoms()) => {
                                Ok(Sampled {
                                    value,
                                    size: Size(state.atoms()),
                                    attempts: started.load(Ordering::Acquire),
                                })
                            }
                            Ok(_) => continue,
                            Err(error) => Err(error),
                        };
                        if !done.swap(true, Ordering::AcqRel) {
                            *winner.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
                        }
                        break;
                    }
                });
            }
        });

        match winner.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Some(outcome) => outcome,
            None => Err(BoltzmannError::RetryLimitExceeded {
                attempts: max_retries.unwrap_or_else(|| started.load(Ordering::Acquire)),
                lower: window.lower(),
                upper: window.upper(),
            }),
        }
    }
}
