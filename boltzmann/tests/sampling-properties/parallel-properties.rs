//! Parallel properties
//!
//! Racing rejection attempts on several threads keeps every guarantee of the
//! sequential loop.

use crate::Tree;
use boltzmann::*;

/// Property: parallel pointed sampling of lists lands in the window.
pub fn test_parallel_pointed_sampling() {
    let generator = Generator::<Vec<i64>>::ceiled();
    let sampler = ParallelSampler::new(ParallelConfig::default().with_thread_count(4));
    for seed in 0..20 {
        let sampled = sampler
            .sample(
                &generator,
                Tuning::Pointed(Some(Size(50))),
                Size(50),
                Seed::from_u64(seed),
            )
            .unwrap();
        assert!((45..=55).contains(&sampled.value.len()));
    }
}

/// Property: a single-threaded race behaves like the sequential loop.
pub fn test_parallel_matches_window() {
    let generator = Generator::<Tree>::ceiled();
    let single = ParallelSampler::new(ParallelConfig::default().with_thread_count(1));
    let many = ParallelSampler::default();
    for seed in 0..10 {
        for sampler in [&single, &many] {
            let sampled = sampler
                .sample(&generator, Tuning::Mean(Size(30)), Size(30), Seed::from_u64(seed))
                .unwrap();
            assert!((27..=33).contains(&sampled.size.get()));
            assert_eq!(sampled.value.leaves(), sampled.size.get());
        }
    }

    // One thread with one seed is fully deterministic.
    let a = single
        .sample(&generator, Tuning::Singular, Size(20), Seed::from_u64(77))
        .unwrap();
    let b = single
        .sample(&generator, Tuning::Singular, Size(20), Seed::from_u64(77))
        .unwrap();
    assert_eq!(a, b);
}
