//! Size-weighted sampling against a solved oracle.
//!
//! Sampling runs in two phases. The shape phase walks the system with an
//! explicit stack, choosing one constructor per node in proportion to its
//! term and charging its atoms to a [`GenerationState`]. The result is a
//! pre-order list of choices, abandoned as soon as the ceiling is crossed.
//! The assembly phase folds that list back into a value, children first,
//! running each constructor's builder or the alias installed for its type.
//!
//! Neither phase recurses, so very large structures cannot exhaust the
//! call stack.

use crate::dynamic::Dynamic;
use crate::error::{BoltzmannError, Result};
use crate::oracle::Oracle;
use crate::random::RandomSource;
use crate::schema::{Node, Schema};
use crate::structure::Fields;
use crate::system::{System, TypeIndex};

/// Outcome of a sampling step that may run past its size ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    Accepted(T),
    /// The atom ceiling was exceeded; the partial structure is discarded.
    Aborted,
}

impl<T> Step<T> {
    /// Transform an accepted value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Step<U> {
        match self {
            Step::Accepted(value) => Step::Accepted(f(value)),
            Step::Aborted => Step::Aborted,
        }
    }

    /// Whether the attempt passed its ceiling.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Step::Aborted)
    }

    /// The value, if the attempt finished.
    pub fn accepted(self) -> Option<T> {
        match self {
            Step::Accepted(value) => Some(value),
            Step::Aborted => None,
        }
    }
}

/// Atoms consumed so far by one attempt, and the ceiling it may not exceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerationState {
    atoms: usize,
    ceiling: Option<usize>,
}

impl GenerationState {
    /// State without a ceiling.
    pub fn unbounded() -> Self {
        GenerationState::default()
    }

    /// State aborting once more than `ceiling` atoms are consumed.
    pub fn with_ceiling(ceiling: usize) -> Self {
        GenerationState {
            atoms: 0,
            ceiling: Some(ceiling),
        }
    }

    /// Charge `atoms` to the budget, aborting once the ceiling is passed.
    pub fn consume(&mut self, atoms: usize) -> Step<()> {
        self.atoms = self.atoms.saturating_add(atoms);
        match self.ceiling {
            Some(ceiling) if self.atoms > ceiling => Step::Aborted,
            _ => Step::Accepted(()),
        }
    }

    /// Atoms consumed so far.
    pub fn atoms(&self) -> usize {
        self.atoms
    }

    /// The ceiling, if any.
    pub fn ceiling(&self) -> Option<usize> {
        self.ceiling
    }

    /// Atoms left before the ceiling, `None` when unbounded.
    pub fn remaining(&self) -> Option<usize> {
        self.ceiling.map(|c| c.saturating_sub(self.atoms))
    }
}

/// Random source and size budget handed to ceiled alias substitutes.
pub struct Budgeted<'a> {
    rng: &'a mut dyn RandomSource,
    state: &'a mut GenerationState,
}

impl<'a> Budgeted<'a> {
    /// Pair a random source with the state of the current attempt.
    pub fn new(rng: &'a mut dyn RandomSource, state: &'a mut GenerationState) -> Self {
        Budgeted { rng, state }
    }

    /// The random source.
    pub fn rng(&mut self) -> &mut dyn RandomSource {
        &mut *self.rng
    }

    /// Charge `atoms` to the shared budget, aborting past the ceiling.
    pub fn consume(&mut self, atoms: usize) -> Step<()> {
        self.state.consume(atoms)
    }

    pub fn atoms(&self) -> usize {
        self.state.atoms()
    }

    pub fn remaining(&self) -> Option<usize> {
        self.state.remaining()
    }
}

/// Constructor `term` chosen for a node of type `ty`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Choice {
    pub ty: TypeIndex,
    pub term: usize,
}

/// Pre-order list of constructor choices describing one structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    pub choices: Vec<Choice>,
    pub atoms: usize,
}

/// Sample the shape of a `root` structure from `oracle`.
pub fn sample_shape(
    system: &System,
    oracle: &Oracle,
    root: TypeIndex,
    rng: &mut dyn RandomSource,
    state: &mut GenerationState,
) -> Step<Shape> {
    let start = state.atoms();
    let mut choices = Vec::new();
    let mut pending = vec![root];
    while let Some(ty) = pending.pop() {
        let term = oracle.choose(ty, rng);
        let constructor = &system.equation(ty).terms[term];
        if state.consume(constructor.atoms as usize).is_aborted() {
            return Step::Aborted;
        }
        choices.push(Choice { ty, term });
        pending.extend(constructor.refs.iter().rev());
    }
    Step::Accepted(Shape {
        choices,
        atoms: state.atoms() - start,
    })
}

/// Build the value described by `shape`, whose choices index `schema`.
pub fn assemble(
    schema: &Schema,
    shape: &Shape,
    rng: &mut dyn RandomSource,
    state: &mut GenerationState,
) -> Result<Step<Dynamic>> {
    let system = schema.system();
    let mut built: Vec<Dynamic> = Vec::new();
    for choice in shape.choices.iter().rev() {
        let arity = system.equation(choice.ty).terms[choice.term].refs.len();
        let split = built
            .len()
            .checked_sub(arity)
            .ok_or_else(|| BoltzmannError::invalid_config("shape is missing children"))?;
        // Children sit on top of the stack, first child uppermost.
        let children: Vec<Dynamic> = built.drain(split..).rev().collect();
        let value = match schema.node(choice.ty) {
            Node::Structure { builders, .. } => {
                builders[choice.term](&mut Fields::new(children, &mut *rng))?
            }
            Node::Alias { substitute, .. } => {
                let mut children = children.into_iter();
                let stand_in = children.next().ok_or_else(|| {
                    BoltzmannError::invalid_config("alias node without a stand-in")
                })?;
                match substitute(stand_in, &mut Budgeted::new(&mut *rng, &mut *state))? {
                    Step::Accepted(value) => value,
                    Step::Aborted => return Ok(Step::Aborted),
                }
            }
        };
        built.push(value);
    }
    match built.pop() {
        Some(value) if built.is_empty() => Ok(Step::Accepted(value)),
        _ => Err(BoltzmannError::invalid_config(
            "shape does not describe a single structure",
        )),
    }
}
