//! Random sources consumed by the sampler.
//!
//! The sampler only ever needs three operations: a real in `[0, upper)`,
//! an integer in `[0, upper - 1]`, and a default draw for a primitive leaf.
//! Two adapters implement them: [`SeedSource`], which threads a splittable
//! [`Seed`] explicitly, and [`RngSource`], which wraps any [`rand::RngCore`].

use crate::data::Seed;
use rand::{Rng, RngCore};

/// Kinds of primitive leaves with a default distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Signed,
    Unsigned,
    Real,
    Char,
}

/// A primitive value drawn from its default distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue {
    Bool(bool),
    Signed(i64),
    Unsigned(u64),
    Real(f64),
    Char(char),
}

/// Magnitude bound for default integer and real draws.
pub const PRIMITIVE_RANGE: u64 = 1000;

/// Capability interface for drawing randomness during sampling.
pub trait RandomSource {
    /// Draw a real uniformly from `[0, upper)`.
    fn next_real(&mut self, upper: f64) -> f64;

    /// Draw an integer uniformly from `[0, upper - 1]`. `upper` must be positive.
    fn next_integer(&mut self, upper: u64) -> u64;

    /// Draw a primitive value from its default distribution.
    fn primitive(&mut self, kind: PrimitiveKind) -> PrimitiveValue {
        match kind {
            PrimitiveKind::Bool => PrimitiveValue::Bool(self.next_integer(2) == 1),
            PrimitiveKind::Signed => {
                let offset = self.next_integer(2 * PRIMITIVE_RANGE + 1) as i64;
                PrimitiveValue::Signed(offset - PRIMITIVE_RANGE as i64)
            }
            PrimitiveKind::Unsigned => {
                PrimitiveValue::Unsigned(self.next_integer(PRIMITIVE_RANGE + 1))
            }
            PrimitiveKind::Real => {
                let magnitude = PRIMITIVE_RANGE as f64;
                PrimitiveValue::Real(self.next_real(2.0 * magnitude) - magnitude)
            }
            PrimitiveKind::Char => {
                // Printable ASCII.
                let code = 0x20 + self.next_integer(0x7f - 0x20) as u8;
                PrimitiveValue::Char(code as char)
            }
        }
    }
}

impl<S: RandomSource + ?Sized> RandomSource for &mut S {
    fn next_real(&mut self, upper: f64) -> f64 {
        (**self).next_real(upper)
    }

    fn next_integer(&mut self, upper: u64) -> u64 {
        (**self).next_integer(upper)
    }

    fn primitive(&mut self, kind: PrimitiveKind) -> PrimitiveValue {
        (**self).primitive(kind)
    }
}

/// Pure random source that threads a [`Seed`] through every draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSource {
    seed: Seed,
}

impl SeedSource {
    /// Source drawing from `seed`.
    pub fn new(seed: Seed) -> Self {
        SeedSource { seed }
    }

    /// Source seeded from one integer.
    pub fn from_u64(value: u64) -> Self {
        SeedSource::new(Seed::from_u64(value))
    }

    /// The seed the next draw will consume.
    pub fn seed(&self) -> Seed {
        self.seed
    }

    /// Split off an independent source, advancing this one.
    pub fn split(&mut self) -> SeedSource {
        let (keep, give) = self.seed.split();
        self.seed = keep;
        SeedSource::new(give)
    }
}

impl RandomSource for SeedSource {
    fn next_real(&mut self, upper: f64) -> f64 {
        let (unit, next) = self.seed.next_f64();
        self.seed = next;
        unit * upper
    }

    fn next_integer(&mut self, upper: u64) -> u64 {
        let (value, next) = self.seed.next_bounded(upper);
        self.seed = next;
        value
    }
}

/// Random source backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: RngCore> RngSource<R> {
    /// Wrap a `rand` generator.
    pub fn new(rng: R) -> Self {
        RngSource { rng }
    }

    /// Recover the wrapped generator.
    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: RngCore> RandomSource for RngSource<R> {
    fn next_real(&mut self, upper: f64) -> f64 {
        self.rng.gen::<f64>() * upper
    }

    fn next_integer(&mut self, upper: u64) -> u64 {
        self.rng.gen_range(0..upper)
    }
}
