//! Reference scenarios
//!
//! Binary trees under ceiled rejection, an alias that never fires, pointed
//! versus unpointed lists, and a type with no finite base case.

use crate::{mean_and_cv, Endless, Tree};
use boltzmann::*;

/// Scenario: 1000 singular rejection samples at target 100 all land in [90, 110].
pub fn test_binary_tree_window() {
    let generator = Generator::<Tree>::ceiled();
    let mut rng = SeedSource::from_u64(2024);

    for trial in 0..1000 {
        let sampled = generator
            .sample_singular_rejection(Size(100), &mut rng)
            .expect("binary trees have a singularity");
        let size = sampled.size.get();
        if !(90..=110).contains(&size) || sampled.value.leaves() != size {
            panic!(
                "trial {}: size {} with {} leaves outside [90, 110]",
                trial,
                size,
                sampled.value.leaves()
            );
        }
    }
}

/// Scenario: installing an alias for a type the root never reaches changes nothing.
pub fn test_untriggered_alias_leaves_distribution() {
    let plain = Generator::<Tree>::new();
    let aliased = Generator::<Tree>::with_aliases(
        AliasSet::new().with(Alias::replace(|rng: &mut dyn RandomSource| rng.next_integer(10) as u8)),
    );

    assert_eq!(plain.system().unwrap(), aliased.system().unwrap());
    assert!(!aliased.schema().unwrap().has_aliases());

    let mut a = SeedSource::from_u64(7);
    let mut b = SeedSource::from_u64(7);
    for _ in 0..200 {
        let left = plain.sample(Some(Size(30)), &mut a).unwrap();
        let right = aliased.sample(Some(Size(30)), &mut b).unwrap();
        assert_eq!(left.value, right.value);
        assert_eq!(left.size, right.size);
    }

    let plain = plain.into_ceiled();
    let aliased = aliased.into_ceiled();
    for _ in 0..50 {
        let left = plain.sample_rejection(Size(30), &mut a).unwrap();
        let right = aliased.sample_rejection(Size(30), &mut b).unwrap();
        assert_eq!(left, right);
    }
}

/// Scenario: pointed lists concentrate around the rung size; plain lists are geometric.
pub fn test_pointed_list_has_smaller_variance() {
    let generator = Generator::<Vec<i64>>::new();
    let mut rng = SeedSource::from_u64(50);
    let trials = 2000;

    let pointed: Vec<usize> = (0..trials)
        .map(|_| generator.sample_pointed(Some(Size(64)), &mut rng).unwrap())
        .map(|sampled| {
            assert_eq!(sampled.value.len(), sampled.size.get());
            sampled.size.get()
        })
        .collect();
    let unpointed: Vec<usize> = (0..trials)
        .map(|_| generator.sample(Some(Size(64)), &mut rng).unwrap().size.get())
        .collect();

    let (pointed_mean, pointed_cv) = mean_and_cv(&pointed);
    let (unpointed_mean, unpointed_cv) = mean_and_cv(&unpointed);

    assert!((pointed_mean - 64.0).abs() < 6.4, "pointed mean {pointed_mean}");
    assert!((unpointed_mean - 64.0).abs() < 8.0, "unpointed mean {unpointed_mean}");
    // Negative binomial of order 2 against geometric: 1/sqrt(2) against 1.
    assert!(pointed_cv < 0.8, "pointed cv {pointed_cv}");
    assert!(unpointed_cv > 0.9, "unpointed cv {unpointed_cv}");
    assert!(pointed_cv < unpointed_cv);

    // The ladder rung for 50 rounds up to 64.
    let rung = generator.pointed_oracle(Some(Size(50))).unwrap();
    let root = generator.pointed_system().unwrap().root().unwrap();
    assert!((rung.expected_size(root) - 64.0).abs() < 0.01);
}

/// Scenario: at target 50, pointed rejection accepts lists in the window
/// more often than rejection from the oracle tuned to 50.
pub fn test_pointed_rejection_accepts_more_often() {
    let generator = Generator::<Vec<i64>>::ceiled();
    let trials = 1000;
    let collect = |pointed: bool, seed: u64| {
        let mut rng = SeedSource::from_u64(seed);
        let mut sizes = Vec::with_capacity(trials);
        let mut attempts = 0;
        for _ in 0..trials {
            let sampled = if pointed {
                generator.sample_pointed_rejection(Size(50), &mut rng)
            } else {
                generator.sample_rejection(Size(50), &mut rng)
            }
            .unwrap();
            assert_eq!(sampled.value.len(), sampled.size.get());
            assert!((45..=55).contains(&sampled.size.get()));
            sizes.push(sampled.size.get());
            attempts += sampled.attempts;
        }
        (sizes, attempts as f64 / trials as f64)
    };

    let (pointed, pointed_attempts) = collect(true, 51);
    let (unpointed, unpointed_attempts) = collect(false, 52);
    let (pointed_mean, _) = mean_and_cv(&pointed);
    let (unpointed_mean, _) = mean_and_cv(&unpointed);
    assert!((pointed_mean - 50.0).abs() < 1.5, "pointed mean {pointed_mean}");
    assert!((unpointed_mean - 50.0).abs() < 1.5, "unpointed mean {unpointed_mean}");

    // Roughly 1 in 9 pointed attempts land in [45, 55] against 1 in 12.5.
    assert!(
        pointed_attempts < unpointed_attempts,
        "pointed {pointed_attempts} against unpointed {unpointed_attempts} attempts"
    );
}

/// Scenario: `data I = C I` without an alias is a divergent system.
pub fn test_type_without_base_case_diverges() {
    let generator = Generator::<Endless>::new();
    let mut rng = SeedSource::from_u64(1);

    for outcome in [
        generator.sample(None, &mut rng).map(|_| ()),
        generator.sample(Some(Size(10)), &mut rng).map(|_| ()),
        generator.sample_at(0.1, &mut rng).map(|_| ()),
        generator.singularity().map(|_| ()),
    ] {
        match outcome {
            Err(BoltzmannError::DivergentSystem { type_name, .. }) => {
                assert!(type_name.contains("Endless"), "unexpected type {type_name}");
            }
            other => panic!("expected a divergent system, got {other:?}"),
        }
    }

    let ceiled = generator.into_ceiled();
    assert!(ceiled
        .sample_singular_rejection(Size(5), &mut rng)
        .unwrap_err()
        .is_divergent());
}
