//! Algebraic systems: one equation per type, one term per constructor.
//!
//! A term `c * x^a * y_1 * ... * y_n` stands for a constructor carrying `a`
//! atoms and referencing the types `1..n`. The coefficient `c` is `1` for
//! ordinary constructors; the pointing transform introduces others.

use crate::error::{BoltzmannError, Result};
use std::collections::HashMap;

/// Dense index of a type inside a [`System`].
pub type TypeIndex = usize;

/// One constructor of an equation.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub name: String,
    pub atoms: u32,
    pub coefficient: f64,
    pub refs: Vec<TypeIndex>,
}

impl Term {
    /// A term `x^atoms` times the referenced types.
    pub fn new(name: impl Into<String>, atoms: u32, refs: Vec<TypeIndex>) -> Self {
        Term {
            name: name.into(),
            atoms,
            coefficient: 1.0,
            refs,
        }
    }

    /// Value of the term at `x` given the current type values.
    pub fn evaluate(&self, x: f64, values: &[f64]) -> f64 {
        self.refs
            .iter()
            .fold(self.coefficient * x.powi(self.atoms as i32), |acc, &r| acc * values[r])
    }

    /// Partial derivative of the term with respect to `x`.
    pub fn derivative_x(&self, x: f64, values: &[f64]) -> f64 {
        if self.atoms == 0 {
            return 0.0;
        }
        let head = self.coefficient * self.atoms as f64 * x.powi(self.atoms as i32 - 1);
        self.refs.iter().fold(head, |acc, &r| acc * values[r])
    }

    /// Add the partial derivatives with respect to each referenced type to `row`.
    pub fn accumulate_jacobian(&self, x: f64, values: &[f64], row: &mut [f64]) {
        let head = self.coefficient * x.powi(self.atoms as i32);
        for (i, &target) in self.refs.iter().enumerate() {
            let others = self
                .refs
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .fold(head, |acc, (_, &r)| acc * values[r]);
            row[target] += others;
        }
    }

    /// Whether the term references no types.
    pub fn is_leaf(&self) -> bool {
        self.refs.is_empty()
    }
}

/// The constructors of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub name: String,
    pub terms: Vec<Term>,
}

impl Equation {
    pub fn evaluate(&self, x: f64, values: &[f64]) -> f64 {
        self.terms.iter().map(|t| t.evaluate(x, values)).sum()
    }
}

/// A closed system of equations. Index 0 is the root type.
#[derive(Debug, Clone, PartialEq)]
pub struct System {
    equations: Vec<Equation>,
}

impl System {
    /// Start building a system by hand.
    pub fn builder() -> SystemBuilder {
        SystemBuilder::default()
    }

    /// Build a system from equations, checking that every reference resolves.
    pub fn from_equations(equations: Vec<Equation>) -> Result<Self> {
        if equations.is_empty() {
            return Err(BoltzmannError::EmptySystem);
        }
        for equation in &equations {
            for term in &equation.terms {
                if let Some(&bad) = term.refs.iter().find(|&&r| r >= equations.len()) {
                    return Err(BoltzmannError::UndefinedType {
                        name: format!("#{bad}"),
                        referenced_by: format!("{}::{}", equation.name, term.name),
                    });
                }
            }
        }
        Ok(System { equations })
    }

    /// Number of types.
    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Equation of the type at `index`.
    pub fn equation(&self, index: TypeIndex) -> &Equation {
        &self.equations[index]
    }

    pub fn equations(&self) -> &[Equation] {
        &self.equations
    }

    /// Name of the type at `index`.
    pub fn name(&self, index: TypeIndex) -> &str {
        &self.equations[index].name
    }

    /// Index of the type called `name`.
    pub fn index_of(&self, name: &str) -> Option<TypeIndex> {
        self.equations.iter().position(|e| e.name == name)
    }

    /// Evaluate every equation at `x` for the given type values.
    pub fn evaluate(&self, x: f64, values: &[f64]) -> Vec<f64> {
        self.equations.iter().map(|e| e.evaluate(x, values)).collect()
    }

    /// Types that admit at least one finite structure.
    pub fn productive(&self) -> Vec<bool> {
        let mut productive = vec![false; self.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (index, equation) in self.equations.iter().enumerate() {
                if productive[index] {
                    continue;
                }
                if equation
                    .terms
                    .iter()
                    .any(|t| t.coefficient > 0.0 && t.refs.iter().all(|&r| productive[r]))
                {
                    productive[index] = true;
                    changed = true;
                }
            }
        }
        productive
    }

    /// Fail with `DivergentSystem` if some type has no finite structure.
    pub fn check_productive(&self) -> Result<()> {
        match self.productive().iter().position(|&p| !p) {
            Some(index) => Err(BoltzmannError::divergent(
                self.name(index),
                0.0,
                "no constructor reaches a finite base case",
            )),
            None => Ok(()),
        }
    }
}

/// Builds a [`System`] from constructors referencing types by name.
///
/// Types are numbered in order of first definition; the first one is the root.
#[derive(Debug, Default)]
pub struct SystemBuilder {
    names: Vec<String>,
    index: HashMap<String, TypeIndex>,
    constructors: Vec<Vec<(String, u32, Vec<String>)>>,
}

impl SystemBuilder {
    /// Declare a type, possibly without constructors.
    pub fn define(mut self, type_name: &str) -> Self {
        self.declare(type_name);
        self
    }

    /// Add a constructor with `atoms` atoms and the given field types.
    pub fn constructor(mut self, type_name: &str, name: &str, atoms: u32, fields: &[&str]) -> Self {
        let index = self.declare(type_name);
        self.constructors[index].push((
            name.to_string(),
            atoms,
            fields.iter().map(|f| f.to_string()).collect(),
        ));
        self
    }

    fn declare(&mut self, type_name: &str) -> TypeIndex {
        if let Some(&index) = self.index.get(type_name) {
            return index;
        }
        let index = self.names.len();
        self.names.push(type_name.to_string());
        self.index.insert(type_name.to_string(), index);
        self.constructors.push(Vec::new());
        index
    }

    /// Resolve references, failing on unknown names or an empty system.
    pub fn build(self) -> Result<System> {
        let mut equations = Vec::with_capacity(self.names.len());
        for (name, constructors) in self.names.iter().zip(self.constructors) {
            let mut terms = Vec::with_capacity(constructors.len());
            for (constructor, atoms, fields) in constructors {
                let refs = fields
                    .iter()
                    .map(|field| {
                        self.index.get(field).copied().ok_or_else(|| BoltzmannError::UndefinedType {
                            name: field.clone(),
                            referenced_by: format!("{name}::{constructor}"),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                terms.push(Term::new(constructor, atoms, refs));
            }
            equations.push(Equation {
                name: name.clone(),
                terms,
            });
        }
        System::from_equations(equations)
    }
}
