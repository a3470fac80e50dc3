//! The pointing transform.
//!
//! Pointing a structure marks one of its atoms. The pointed system has the
//! generating function `x y'(x)` for each type, so a pointed sample of size
//! `n` is drawn with probability proportional to `n` times its unpointed
//! weight. That extra factor flattens the size distribution, and since the
//! pointed system still has a proper mean for every `x`, it can be tuned to
//! sizes the plain system only reaches near its singularity.
//!
//! Each constructor `C` with `a` atoms and fields `f1..fn` becomes
//!
//! * `C@root` with coefficient `a`, the point being one of `C`'s own atoms,
//! * `C@i` for each field `i`, the point lying inside field `i`,
//!
//! and variants that cannot carry a point (no atoms, or a field type that
//! never contains atoms) are dropped. Every pointed constructor keeps the
//! arity and field order of its origin, so unpointing a shape is a
//! choice-by-choice relabelling.

use crate::data::{RungSelection, Size};
use crate::error::{BoltzmannError, Result};
use crate::sampler::{Choice, Shape};
use crate::system::{Equation, System, Term, TypeIndex};

/// Where a pointed constructor places the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mark {
    /// A copy of an unpointed constructor.
    Unpointed,
    /// The point is an atom of this node.
    Root,
    /// The point lies inside the field at this position.
    Within(usize),
}

/// The unpointed constructor a pointed one was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Origin {
    pub ty: TypeIndex,
    pub term: usize,
    pub mark: Mark,
}

/// An unpointed shape, with the pre-order position of the pointed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpointed {
    pub shape: Shape,
    pub point: Option<usize>,
}

/// A system extended with pointed copies of its types.
///
/// Indices `0..n` are the original types, unchanged; pointed copies follow.
#[derive(Debug, Clone, PartialEq)]
pub struct PointedSystem {
    system: System,
    origins: Vec<Vec<Origin>>,
    pointed: Vec<Option<TypeIndex>>,
}

impl PointedSystem {
    /// Extend `base` with pointed copies of every type that can hold an atom.
    pub fn new(base: &System) -> Result<Self> {
        let n = base.len();
        let pointable = pointable(base);

        let mut pointed = vec![None; n];
        let mut next = n;
        for (index, slot) in pointed.iter_mut().enumerate() {
            if pointable[index] {
                *slot = Some(next);
                next += 1;
            }
        }

        let mut equations: Vec<Equation> = base.equations().to_vec();
        let mut origins: Vec<Vec<Origin>> = base
            .equations()
            .iter()
            .enumerate()
            .map(|(ty, equation)| {
                (0..equation.terms.len())
                    .map(|term| Origin {
                        ty,
                        term,
                        mark: Mark::Unpointed,
                    })
                    .collect()
            })
            .collect();

        for (ty, equation) in base.equations().iter().enumerate() {
            if pointed[ty].is_none() {
                continue;
            }
            let mut terms = Vec::new();
            let mut marks = Vec::new();
            for (index, term) in equation.terms.iter().enumerate() {
                if term.atoms > 0 {
                    terms.push(Term {
                        name: format!("{}@root", term.name),
                        atoms: term.atoms,
                        coefficient: term.coefficient * f64::from(term.atoms),
                        refs: term.refs.clone(),
                    });
                    marks.push(Origin {
                        ty,
                        term: index,
                        mark: Mark::Root,
                    });
                }
                for (position, &field) in term.refs.iter().enumerate() {
                    let Some(copy) = pointed[field] else {
                        continue;
                    };
                    let mut refs = term.refs.clone();
                    refs[position] = copy;
                    terms.push(Term {
                        name: format!("{}@{}", term.name, position),
                        atoms: term.atoms,
                        coefficient: term.coefficient,
                        refs,
                    });
                    marks.push(Origin {
                        ty,
                        term: index,
                        mark: Mark::Within(position),
                    });
                }
            }
            equations.push(Equation {
                name: format!("{}*", equation.name),
                terms,
            });
            origins.push(marks);
        }

        Ok(PointedSystem {
            system: System::from_equations(equations)?,
            origins,
            pointed,
        })
    }

    /// The combined system of original and pointed types.
    pub fn system(&self) -> &System {
        &self.system
    }

    /// Number of original types.
    pub fn base_len(&self) -> usize {
        self.pointed.len()
    }

    /// Index of the pointed copy of `ty`, if `ty` can contain atoms.
    pub fn pointed(&self, ty: TypeIndex) -> Option<TypeIndex> {
        self.pointed.get(ty).copied().flatten()
    }

    /// Index of the pointed copy of the original root.
    pub fn root(&self) -> Result<TypeIndex> {
        self.pointed(0).ok_or_else(|| {
            BoltzmannError::invalid_config(format!(
                "`{}` never contains atoms, so it cannot be pointed",
                self.system.name(0)
            ))
        })
    }

    /// The original constructor behind constructor `term` of `ty`.
    pub fn origin(&self, ty: TypeIndex, term: usize) -> Option<Origin> {
        self.origins.get(ty)?.get(term).copied()
    }

    /// Map a shape sampled from this system back onto the original system.
    pub fn unpoint(&self, shape: &Shape) -> Result<Unpointed> {
        let mut point = None;
        let mut choices = Vec::with_capacity(shape.choices.len());
        for (position, choice) in shape.choices.iter().enumerate() {
            let origin = self.origin(choice.ty, choice.term).ok_or_else(|| {
                BoltzmannError::invalid_config(format!(
                    "choice {}:{} is not part of the pointed system",
                    choice.ty, choice.term
                ))
            })?;
            if origin.mark == Mark::Root {
                point = Some(position);
            }
            choices.push(Choice {
                ty: origin.ty,
                term: origin.term,
            });
        }
        Ok(Unpointed {
            shape: Shape {
                choices,
                atoms: shape.atoms,
            },
            point,
        })
    }
}

/// Types that can contain at least one atom.
fn pointable(system: &System) -> Vec<bool> {
    let mut pointable = vec![false; system.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (index, equation) in system.equations().iter().enumerate() {
            if pointable[index] {
                continue;
            }
            if equation
                .terms
                .iter()
                .any(|t| t.coefficient > 0.0 && (t.atoms > 0 || t.refs.iter().any(|&r| pointable[r])))
            {
                pointable[index] = true;
                changed = true;
            }
        }
    }
    pointable
}

/// Rungs of pointed oracles, rung `e` tuned to mean size `2^e`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ladder {
    selection: RungSelection,
    top: Option<u32>,
}

impl Ladder {
    /// A ladder whose rungs stop at the first one covering `max_size`.
    pub fn new(selection: RungSelection, max_size: Option<usize>) -> Self {
        Ladder {
            selection,
            top: max_size.map(|max| Size(max).dyadic_exponent()),
        }
    }

    /// Highest rung, if the ladder is capped.
    pub fn top(&self) -> Option<u32> {
        self.top
    }

    /// Rung serving `target`.
    pub fn rung(&self, target: Size) -> u32 {
        let rung = match self.selection {
            RungSelection::Ceiling => target.dyadic_exponent(),
            RungSelection::Nearest => (target.get().max(1) as f64).log2().round() as u32,
        };
        self.top.map_or(rung, |top| rung.min(top))
    }

    /// Mean size a rung is tuned to.
    pub fn size(rung: u32) -> Size {
        Size(1usize << rung.min(usize::BITS - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Solver;
    use crate::random::SeedSource;
    use crate::sampler::{sample_shape, GenerationState, Step};
    use crate::system::tests::{binary_tree, int_list};

    fn well_formed(system: &System, shape: &Shape) -> bool {
        let mut open = 1usize;
        for choice in &shape.choices {
            if open == 0 {
                return false;
            }
            open = open - 1 + system.equation(choice.ty).terms[choice.term].refs.len();
        }
        open == 0
    }

    #[test]
    fn test_pointed_layout_of_binary_tree() {
        let pointed = PointedSystem::new(&binary_tree()).unwrap();
        assert_eq!(pointed.system().len(), 2);
        assert_eq!(pointed.root().unwrap(), 1);

        let terms = &pointed.system().equation(1).terms;
        let names: Vec<&str> = terms.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Leaf@root", "Node@0", "Node@1"]);
        assert_eq!(terms[1].refs, vec![1, 0]);
        assert_eq!(terms[2].refs, vec![0, 1]);
        assert_eq!(pointed.origin(1, 2).unwrap().mark, Mark::Within(1));
    }

    #[test]
    fn test_pointed_value_is_x_times_derivative() {
        let base = binary_tree();
        let pointed = PointedSystem::new(&base).unwrap();
        let solver = Solver::default();
        let plain = solver.solve(&base, 0.2).unwrap();
        let both = solver.solve(pointed.system(), 0.2).unwrap();
        let expected = 0.2 * plain.derivative(0);
        assert!((both.value(1) - expected).abs() < 1e-9 * expected);
        assert!((both.value(0) - plain.value(0)).abs() < 1e-12);
    }

    #[test]
    fn test_list_points_only_into_atoms() {
        let pointed = PointedSystem::new(&int_list()).unwrap();
        // List, Int, List*, Int*
        assert_eq!(pointed.system().len(), 4);
        assert_eq!(pointed.root().unwrap(), 2);
        let list = &pointed.system().equation(2).terms;
        assert!(list.iter().all(|t| !t.name.starts_with("Nil")));
        let int = &pointed.system().equation(3).terms;
        assert_eq!(int.len(), 1);
        assert_eq!(int[0].coefficient, 1.0);
    }

    #[test]
    fn test_atomless_root_cannot_be_pointed() {
        let system = System::builder()
            .constructor("Unit", "Unit", 0, &[])
            .build()
            .unwrap();
        let pointed = PointedSystem::new(&system).unwrap();
        assert!(matches!(
            pointed.root(),
            Err(BoltzmannError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_unpoint_preserves_structure_and_size() {
        let base = binary_tree();
        let pointed = PointedSystem::new(&base).unwrap();
        let oracle = Solver::default().solve(pointed.system(), 0.24).unwrap();
        let root = pointed.root().unwrap();
        let mut rng = SeedSource::from_u64(13);
        for _ in 0..200 {
            let mut state = GenerationState::unbounded();
            let Step::Accepted(shape) =
                sample_shape(pointed.system(), &oracle, root, &mut rng, &mut state)
            else {
                panic!("unbounded sampling cannot abort");
            };
            let unpointed = pointed.unpoint(&shape).unwrap();
            assert!(well_formed(&base, &unpointed.shape));
            assert_eq!(unpointed.shape.atoms, shape.atoms);
            let leaves = unpointed.shape.choices.iter().filter(|c| c.term == 0).count();
            assert_eq!(leaves, shape.atoms);
            let point = unpointed.point.expect("a pointed tree has a point");
            assert_eq!(unpointed.shape.choices[point].term, 0);
        }
    }

    #[test]
    fn test_ladder_rungs() {
        let ceiling = Ladder::new(RungSelection::Ceiling, None);
        assert_eq!(ceiling.rung(Size(50)), 6);
        assert_eq!(ceiling.rung(Size(64)), 6);
        assert_eq!(ceiling.rung(Size(0)), 0);

        let nearest = Ladder::new(RungSelection::Nearest, None);
        assert_eq!(nearest.rung(Size(50)), 6);
        assert_eq!(nearest.rung(Size(40)), 5);

        let capped = Ladder::new(RungSelection::Ceiling, Some(100));
        assert_eq!(capped.top(), Some(7));
        assert_eq!(capped.rung(Size(5000)), 7);
        assert_eq!(Ladder::size(7), Size(128));
    }
}
