//! Oracle properties
//!
//! Repeated solves agree exactly, tuned oracles meet their mean sizes, and
//! hand-built systems behave like extracted ones.

use crate::{failure, Tree};
use boltzmann::*;
use proptest::prelude::*;
use std::result::Result;

/// Property: solving the same system at the same point twice gives identical tables.
pub fn test_repeated_solves_are_identical(x: f64) -> Result<(), TestCaseError> {
    let first = Generator::<Tree>::new();
    let second = Generator::<Tree>::new();
    let a = first.oracle_at(x).map_err(failure)?;
    let b = second.oracle_at(x).map_err(failure)?;
    prop_assert_eq!(&*a, &*b);

    let solver = Solver::default();
    let system = first.system().map_err(failure)?;
    let again = solver.solve(system, x).map_err(failure)?;
    prop_assert_eq!(&again, &*a);
    prop_assert!(again.values().iter().all(|&y| y >= 0.0));
    prop_assert!(again.derivatives().iter().all(|&d| d > 0.0));
    Ok(())
}

/// Property: the tuned oracle's expected root size equals the requested mean.
pub fn test_tuned_means_are_met(mean: usize) -> Result<(), TestCaseError> {
    let generator = Generator::<Vec<u8>>::new();
    let oracle = generator.oracle_for(Some(Size(mean))).map_err(failure)?;
    let expected = oracle.expected_size(0);
    prop_assert!(
        (expected - mean as f64).abs() <= 1e-4 * mean as f64,
        "mean {} tuned to {}",
        mean,
        expected
    );
    let radius = generator.singularity().map_err(failure)?;
    prop_assert!(oracle.point() < radius.singular_point() + 1e-12);
    Ok(())
}

/// Property: a hand-built system solves exactly like the extracted one.
pub fn test_explicit_system_matches_extracted() {
    let explicit = System::builder()
        .constructor("Tree", "Leaf", 1, &[])
        .constructor("Tree", "Node", 0, &["Box", "Box"])
        .constructor("Box", "Box", 0, &["Tree"])
        .build()
        .unwrap();
    let generator = Generator::<Tree>::new();
    let extracted = generator.system().unwrap();
    assert_eq!(explicit.len(), extracted.len());

    let solver = Solver::default();
    let a = solver.solve(&explicit, 0.2).unwrap();
    let b = solver.solve(extracted, 0.2).unwrap();
    assert_eq!(a.values(), b.values());
    assert_eq!(a.derivatives(), b.derivatives());

    // y = (1 - sqrt(1 - 4x)) / 2 at the radius 1/4.
    let (radius, oracle) = solver.singularity(&explicit).unwrap();
    assert!((radius.singular_point() - 0.25).abs() < 1e-6);
    assert!((oracle.value(0) - 0.5).abs() < 1e-2);
}

/// Property: references to undefined types are rejected with their context.
pub fn test_unknown_reference_is_rejected() {
    let result = System::builder()
        .constructor("Expr", "Lit", 1, &[])
        .constructor("Expr", "Add", 0, &["Expr", "Term"])
        .build();
    match result {
        Err(BoltzmannError::UndefinedType { name, referenced_by }) => {
            assert_eq!(name, "Term");
            assert_eq!(referenced_by, "Expr::Add");
        }
        other => panic!("expected an undefined type, got {other:?}"),
    }
}
