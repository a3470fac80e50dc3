//! Alias properties
//!
//! Aliases cut off recursion that has no base case, ceiled aliases draw
//! from the shared size budget, and the first alias for a type wins.

use crate::Endless;
use boltzmann::*;

/// Property: an alias on the recursive field makes `data I = C I` samplable.
pub fn test_plain_alias_breaks_recursion() {
    let aliases = AliasSet::new().with(Alias::new(|n: u8, _rng: &mut dyn RandomSource| {
        Box::new(Endless::chain(usize::from(n % 4)))
    }));
    let generator = Generator::<Endless>::with_aliases(aliases);
    assert!(generator.schema().unwrap().has_aliases());
    assert_eq!(generator.singularity().unwrap(), Radius::Unbounded);

    let mut rng = SeedSource::from_u64(12);
    for _ in 0..100 {
        let sampled = generator.sample(None, &mut rng).unwrap();
        // The stand-in `u8` is the only atom.
        assert_eq!(sampled.size, Size(1));
        assert!((1..=4).contains(&sampled.value.depth()));
    }
}

/// Property: atoms consumed by a ceiled substitute count towards the window.
pub fn test_ceiled_alias_shares_budget() {
    let aliases = AliasSet::new().with(Alias::ceiled(|n: u8, budget: &mut Budgeted<'_>| {
        let extra = usize::from(n % 10);
        budget
            .consume(extra)
            .map(|()| Box::new(Endless::chain(extra)))
    }));
    let config = Config::default().with_tolerance(0.0);
    let generator = Generator::<Endless, Ceiled>::with_aliases(aliases).with_config(config);
    let mut rng = SeedSource::from_u64(4);
    for _ in 0..50 {
        let sampled = generator.sample_singular_rejection(Size(5), &mut rng).unwrap();
        assert_eq!(sampled.size, Size(5));
        assert_eq!(sampled.value.depth(), 5);
    }
}

/// Property: when two aliases target the same type, the first one is used.
pub fn test_first_alias_wins() {
    let aliases: AliasSet = [
        Alias::replace(|_| Box::new(Endless::chain(2))),
        Alias::replace(|_| Box::new(Endless::chain(7))),
    ]
    .into_iter()
    .collect();
    assert_eq!(aliases.len(), 2);
    let generator = Generator::<Endless>::with_aliases(aliases);
    let mut rng = SeedSource::from_u64(0);
    let sampled = generator.sample(None, &mut rng).unwrap();
    assert_eq!(sampled.value.depth(), 3);
    assert_eq!(sampled.size, Size(0));
}
