//! Pointing properties
//!
//! Unpointing maps every pointed sample to a valid structure of the same
//! size, and the dyadic ladder tunes each rung to its power of two.

use crate::{failure, well_formed, Tree};
use boltzmann::*;
use proptest::prelude::*;
use std::result::Result;

/// Property: unpointed shapes are well formed, size-preserving, and point at an atom.
pub fn test_unpointing_preserves_structure_and_size(
    seed: u64,
    target: usize,
) -> Result<(), TestCaseError> {
    let generator = Generator::<Tree>::new();
    let system = generator.system().map_err(failure)?.clone();
    let mut rng = SeedSource::from_u64(seed);

    for _ in 0..10 {
        let unpointed = generator
            .sample_pointed_shape(Some(Size(target)), &mut rng)
            .map_err(failure)?;
        prop_assert!(well_formed(&system, &unpointed.shape));

        let atoms: usize = unpointed
            .shape
            .choices
            .iter()
            .map(|c| system.equation(c.ty).terms[c.term].atoms as usize)
            .sum();
        prop_assert_eq!(atoms, unpointed.shape.atoms);

        let point = unpointed.point;
        prop_assert!(point.is_some(), "every pointed tree carries a point");
        let marked = unpointed.shape.choices[point.unwrap_or_default()];
        prop_assert!(system.equation(marked.ty).terms[marked.term].atoms > 0);

        let sampled = generator
            .sample_pointed(Some(Size(target)), &mut rng)
            .map_err(failure)?;
        prop_assert_eq!(sampled.value.leaves(), sampled.size.get());
    }
    Ok(())
}

/// Property: pointed rejection lands in the window like the plain path.
pub fn test_pointed_rejection_window() {
    let generator = Generator::<Vec<i64>>::ceiled();
    let mut rng = SeedSource::from_u64(8);
    for _ in 0..100 {
        let sampled = generator.sample_pointed_rejection(Size(50), &mut rng).unwrap();
        assert!((45..=55).contains(&sampled.value.len()));
        assert!(sampled
            .value
            .iter()
            .all(|v| (-(PRIMITIVE_RANGE as i64)..=PRIMITIVE_RANGE as i64).contains(v)));
    }
}

/// Property: rung `e` is tuned to mean size `2^e`, capped by the configured maximum.
pub fn test_ladder_rungs_track_powers_of_two() {
    let config = Config::default().with_pointed_max_size(256);
    let generator = Generator::<Vec<u8>>::new().with_config(config);
    assert_eq!(generator.precompute_ladder(Size(100)).unwrap(), 8);

    let root = generator.pointed_system().unwrap().root().unwrap();
    let mut previous = 0.0;
    for exponent in 0..=8u32 {
        let size = 1usize << exponent;
        let oracle = generator.pointed_oracle(Some(Size(size))).unwrap();
        let expected = oracle.expected_size(root);
        assert!((expected - size as f64).abs() <= 1e-3 * size as f64);
        assert!(oracle.point() > previous);
        previous = oracle.point();
    }

    // Beyond the cap every target shares the top rung.
    let top = generator.pointed_oracle(Some(Size(100_000))).unwrap();
    let capped = generator.pointed_oracle(None).unwrap();
    assert_eq!(top.point(), capped.point());
    assert!((top.expected_size(root) - 256.0).abs() <= 0.256);

    let nearest = Generator::<Vec<u8>>::new()
        .with_config(Config::default().with_rung_selection(RungSelection::Nearest));
    let low = nearest.pointed_oracle(Some(Size(40))).unwrap();
    assert!((low.expected_size(root) - 32.0).abs() <= 0.032);
}
