//! Core data types: target sizes, seeds and configuration.

use crate::error::{BoltzmannError, Result};
use std::fmt;

/// Target size of a generated structure, measured in atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Size(pub usize);

impl Size {
    /// Create a new size value.
    pub fn new(value: usize) -> Self {
        Size(value)
    }

    /// Get the inner size value.
    pub fn get(&self) -> usize {
        self.0
    }

    /// Exponent of the smallest power of two that is at least this size.
    pub fn dyadic_exponent(&self) -> u32 {
        self.0.max(1).next_power_of_two().trailing_zeros()
    }
}

impl From<usize> for Size {
    fn from(value: usize) -> Self {
        Size(value)
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Size({})", self.0)
    }
}

/// SplitMix64 state and gamma.
///
/// A seed is a value: every draw returns the advanced seed alongside the
/// output. `split` yields two streams that never share state, one per
/// worker in parallel rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed(pub u64, pub u64);

impl Seed {
    /// Seed derived from one integer, e.g. a test case number.
    pub fn from_u64(value: u64) -> Self {
        let state = splitmix64_mix(value);
        Seed(state, mix_gamma(state))
    }

    /// The left half continues this stream, the right half starts a new
    /// one with its own gamma.
    pub fn split(self) -> (Self, Self) {
        let (output, left) = self.next_u64();
        (left, Seed(output, mix_gamma(output)))
    }

    /// One 64-bit output.
    pub fn next_u64(self) -> (u64, Self) {
        let Seed(state, gamma) = self;
        let advanced = state.wrapping_add(gamma);
        (splitmix64_mix(advanced), Seed(advanced, gamma))
    }

    /// Output in `[0, bound)` by multiply-shift.
    pub fn next_bounded(self, bound: u64) -> (u64, Self) {
        let (value, next) = self.next_u64();
        (((u128::from(value) * u128::from(bound)) >> 64) as u64, next)
    }

    /// Output in `[0, 1)` from the top 53 bits.
    pub fn next_f64(self) -> (f64, Self) {
        let (value, next) = self.next_u64();
        ((value >> 11) as f64 * (1.0 / (1u64 << 53) as f64), next)
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed({}, {})", self.0, self.1)
    }
}

/// Iteration used by the oracle solver to reach the least fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationScheme {
    /// Newton steps on `y - F(x, y)`, each solving the linearised system.
    Newton,
    /// Plain substitution `y <- F(x, y)`.
    Substitution,
}

/// How a target size is mapped onto the dyadic ladder of pointed oracles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RungSelection {
    /// Smallest rung at least as large as the target.
    Ceiling,
    /// Rung closest to the target on a logarithmic scale.
    Nearest,
}

/// Numeric settings for the oracle solver.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Relative change below which an iteration has converged.
    pub precision: f64,
    /// Iterations allowed before the system is declared divergent.
    pub max_iterations: usize,
    /// Relative precision of radius and mean-size searches.
    pub search_epsilon: f64,
    /// Fixed-point iteration scheme.
    pub scheme: IterationScheme,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            precision: 1e-12,
            max_iterations: 200,
            search_epsilon: 1e-6,
            scheme: IterationScheme::Newton,
        }
    }
}

impl SolverConfig {
    /// Use the given iteration scheme.
    pub fn with_scheme(mut self, scheme: IterationScheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the search precision.
    pub fn with_search_epsilon(mut self, epsilon: f64) -> Self {
        self.search_epsilon = epsilon;
        self
    }
}

/// Configuration for a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Relative width of the rejection window around a target size.
    pub tolerance: f64,

    /// Maximum number of rejection attempts, unbounded when `None`.
    pub max_retries: Option<usize>,

    /// Largest size on the pointed oracle ladder, unbounded when `None`.
    pub pointed_max_size: Option<usize>,

    /// Rung selection policy for pointed sampling.
    pub rung_selection: RungSelection,

    /// Oracle solver settings.
    pub solver: SolverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tolerance: 0.1,
            max_retries: None,
            pointed_max_size: None,
            rung_selection: RungSelection::Ceiling,
            solver: SolverConfig::default(),
        }
    }
}

impl Config {
    /// Set the rejection tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Bound the number of rejection attempts.
    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Cap the pointed oracle ladder.
    pub fn with_pointed_max_size(mut self, size: usize) -> Self {
        self.pointed_max_size = Some(size);
        self
    }

    /// Set the rung selection policy.
    pub fn with_rung_selection(mut self, selection: RungSelection) -> Self {
        self.rung_selection = selection;
        self
    }

    /// Replace the solver settings.
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Check that every numeric setting is usable.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.tolerance) {
            return Err(BoltzmannError::invalid_config(format!(
                "tolerance must lie in [0, 1), got {}",
                self.tolerance
            )));
        }
        if self.max_retries == Some(0) {
            return Err(BoltzmannError::invalid_config("max_retries must be positive"));
        }
        if !(self.solver.precision > 0.0 && self.solver.search_epsilon > 0.0) {
            return Err(BoltzmannError::invalid_config(
                "solver precision and search epsilon must be positive",
            ));
        }
        if self.solver.max_iterations == 0 {
            return Err(BoltzmannError::invalid_config("max_iterations must be positive"));
        }
        Ok(())
    }
}

/// SplitMix64 finaliser.
fn splitmix64_mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

// Gammas must be odd.
fn mix_gamma(z: u64) -> u64 {
    (splitmix64_mix(z) | 1).wrapping_mul(0x9e3779b97f4a7c15)
}
