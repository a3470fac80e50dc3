//! Rejection properties
//!
//! Accepted samples respect their window, retry limits surface as errors,
//! and mismatched builders are reported rather than coerced.

use crate::{failure, seeded, Tree};
use boltzmann::*;
use proptest::prelude::*;
use std::result::Result;

/// Property: every accepted size lies in `[t(1 - tol), t(1 + tol)]`.
pub fn test_accepted_sizes_stay_in_window(
    seed: u64,
    target: usize,
    tolerance: f64,
) -> Result<(), TestCaseError> {
    let config = Config::default().with_tolerance(tolerance);
    let generator = Generator::<Tree>::ceiled().with_config(config);
    let window = Window::around(Size(target), tolerance);
    let mut rng = SeedSource::from_u64(seed);
    for _ in 0..5 {
        let sampled = generator
            .sample_rejection(Size(target), &mut rng)
            .map_err(failure)?;
        prop_assert!(
            window.contains(sampled.size.get()),
            "size {} outside [{}, {}]",
            sampled.size.get(),
            window.lower(),
            window.upper()
        );
        prop_assert_eq!(sampled.value.leaves(), sampled.size.get());
        prop_assert!(sampled.attempts >= 1);
    }
    Ok(())
}

/// Property: any `rand` generator drives the sampler just as well.
pub fn test_rand_backed_source() {
    let generator = Generator::<Vec<bool>>::ceiled();
    let mut rng = seeded(5);
    for _ in 0..50 {
        let sampled = generator.sample_rejection(Size(40), &mut rng).unwrap();
        assert!((36..=44).contains(&sampled.value.len()));
    }
}

/// Property: a bounded retry count ends in `RetryLimitExceeded`.
pub fn test_retry_limit_is_reported() {
    let config = Config::default().with_tolerance(0.0).with_max_retries(3);
    let generator = Generator::<Tree>::ceiled().with_config(config);
    let mut rng = SeedSource::from_u64(3);
    // Mean 2 essentially never produces 100000 leaves.
    let error = generator
        .sample_ceiled(Some(Size(2)), Size(100_000), &mut rng)
        .unwrap_err();
    assert_eq!(
        error,
        BoltzmannError::RetryLimitExceeded {
            attempts: 3,
            lower: 100_000,
            upper: 100_000,
        }
    );
}

struct Mislabelled(u32);

impl Structure for Mislabelled {
    fn constructors() -> Vec<Constructor<Self>> {
        // Declares a `u8` field but reads a `u32`.
        vec![Constructor::new("Mislabelled", |f| Ok(Mislabelled(f.field()?))).field::<u8>()]
    }
}

/// Property: a builder reading a field at the wrong type fails with `TypeMismatch`.
pub fn test_builder_type_mismatch_is_reported() {
    let generator = Generator::<Mislabelled>::new();
    let mut rng = SeedSource::from_u64(0);
    match generator.sample(None, &mut rng) {
        Err(BoltzmannError::TypeMismatch { expected, actual }) => {
            assert_eq!(expected, "u32");
            assert_eq!(actual, "u8");
        }
        Err(other) => panic!("expected a type mismatch, got {other:?}"),
        Ok(sampled) => panic!("mislabelled field produced {}", sampled.value.0),
    }
}
