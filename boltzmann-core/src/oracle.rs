//! Oracle solver: generating-function values and derivatives of a system.
//!
//! For a point `x` the solver finds the least non-negative solution of
//! `y = F(x, y)` by iterating from `y = 0`, then obtains `y'` from the
//! differentiated system `(I - J) y' = dF/dx`, which is linear once `y` is
//! fixed. Past the radius of convergence no such solution exists; the
//! iteration then blows up, stalls, or leaves the monotone region, and the
//! solver reports `DivergentSystem`.

use crate::data::{IterationScheme, SolverConfig};
use crate::error::{BoltzmannError, Result};
use crate::random::RandomSource;
use crate::system::{System, TypeIndex};
use tracing::{debug, warn};

/// Values beyond this are treated as divergence.
const BLOW_UP: f64 = 1e150;

/// Pivots below this fraction of their row make the linearised system singular.
const SINGULAR_PIVOT: f64 = 1e-13;

/// Largest point tried when tuning finite systems to a mean size.
const MAX_PROBE: f64 = (1u64 << 20) as f64;

/// Generating-function values and derivatives of every type at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Oracle {
    point: f64,
    values: Vec<f64>,
    derivatives: Vec<f64>,
    branching: Vec<Vec<f64>>,
    iterations: usize,
}

impl Oracle {
    /// Evaluation point `x`.
    pub fn point(&self) -> f64 {
        self.point
    }

    /// `y_T(x)`.
    pub fn value(&self, index: TypeIndex) -> f64 {
        self.values[index]
    }

    /// `y'_T(x)`.
    pub fn derivative(&self, index: TypeIndex) -> f64 {
        self.derivatives[index]
    }

    /// All values, indexed by type.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// All derivatives, indexed by type.
    pub fn derivatives(&self) -> &[f64] {
        &self.derivatives
    }

    /// Iterations the solver needed to converge.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Mean atom count of the Boltzmann distribution of `index` at this point.
    pub fn expected_size(&self, index: TypeIndex) -> f64 {
        let value = self.values[index];
        if value > 0.0 {
            self.point * self.derivatives[index] / value
        } else {
            0.0
        }
    }

    /// Cumulative constructor weights of `index`.
    pub fn weights(&self, index: TypeIndex) -> &[f64] {
        &self.branching[index]
    }

    /// Draw a constructor of `index` with probability proportional to its term.
    pub fn choose(&self, index: TypeIndex, rng: &mut dyn RandomSource) -> usize {
        let cumulative = &self.branching[index];
        let total = cumulative.last().copied().unwrap_or(0.0);
        let draw = rng.next_real(total);
        cumulative
            .partition_point(|&c| c <= draw)
            .min(cumulative.len().saturating_sub(1))
    }
}

/// Location of the dominant singularity of a system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Radius {
    /// The iteration converges at `point` and diverges at `upper`.
    Finite { point: f64, upper: f64 },
    /// The system converges at `x = 1`, so it describes finitely many structures.
    Unbounded,
}

impl Radius {
    /// Largest point known to converge.
    pub fn singular_point(&self) -> f64 {
        match self {
            Radius::Finite { point, .. } => *point,
            Radius::Unbounded => 1.0,
        }
    }
}

/// Numerical solver for systems of generating-function equations.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    /// Create a solver with the given tolerances and scheme.
    pub fn new(config: SolverConfig) -> Self {
        Solver { config }
    }

    /// Solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve `system` at the point `x`.
    pub fn solve(&self, system: &System, x: f64) -> Result<Oracle> {
        if !(x.is_finite() && x >= 0.0) {
            return Err(BoltzmannError::invalid_config(format!(
                "evaluation point must be finite and non-negative, got {x}"
            )));
        }
        system.check_productive().map_err(|error| match error {
            BoltzmannError::DivergentSystem {
                type_name, reason, ..
            } => BoltzmannError::DivergentSystem {
                type_name,
                point: x,
                reason,
            },
            other => other,
        })?;

        let (values, iterations) = match self.config.scheme {
            IterationScheme::Newton => self.newton(system, x)?,
            IterationScheme::Substitution => self.substitution(system, x)?,
        };
        let derivatives = derivatives(system, x, &values)?;
        let branching = system
            .equations()
            .iter()
            .map(|equation| {
                let mut running = 0.0;
                equation
                    .terms
                    .iter()
                    .map(|term| {
                        running += term.evaluate(x, &values);
                        running
                    })
                    .collect()
            })
            .collect();

        debug!(point = x, iterations, types = system.len(), "solved oracle");
        Ok(Oracle {
            point: x,
            values,
            derivatives,
            branching,
            iterations,
        })
    }

    fn newton(&self, system: &System, x: f64) -> Result<(Vec<f64>, usize)> {
        let n = system.len();
        let mut values = vec![0.0; n];
        for iteration in 1..=self.config.max_iterations {
            let image = system.evaluate(x, &values);
            let residual: Vec<f64> = image.iter().zip(&values).map(|(f, y)| f - y).collect();
            if residual
                .iter()
                .zip(&values)
                .all(|(r, y)| r.abs() <= self.config.precision * y.abs())
            {
                return Ok((values, iteration));
            }
            let matrix = identity_minus_jacobian(system, x, &values);
            let delta = solve_linear(matrix, residual)
                .ok_or_else(|| BoltzmannError::divergent(system.name(0), x, "singular Jacobian"))?;

            let mut converged = true;
            for (index, step) in delta.iter().enumerate() {
                if *step < -1e-8 * values[index].abs() {
                    return Err(BoltzmannError::divergent(
                        system.name(index),
                        x,
                        "iteration left the convergent region",
                    ));
                }
                values[index] += step;
                check_finite(system, index, x, values[index])?;
                converged &= step.abs() <= self.config.precision * values[index].abs();
            }
            if converged {
                return Ok((values, iteration));
            }
        }
        Err(self.exhausted(system, x))
    }

    fn substitution(&self, system: &System, x: f64) -> Result<(Vec<f64>, usize)> {
        let mut values = vec![0.0; system.len()];
        for iteration in 1..=self.config.max_iterations {
            let image = system.evaluate(x, &values);
            let mut converged = true;
            for (index, next) in image.iter().enumerate() {
                check_finite(system, index, x, *next)?;
                converged &= (next - values[index]).abs() <= self.config.precision * next.abs();
            }
            values = image;
            if converged {
                return Ok((values, iteration));
            }
        }
        Err(self.exhausted(system, x))
    }

    fn exhausted(&self, system: &System, x: f64) -> BoltzmannError {
        BoltzmannError::divergent(
            system.name(0),
            x,
            format!("no convergence after {} iterations", self.config.max_iterations),
        )
    }

    /// Locate the radius of convergence by bisection.
    ///
    /// The returned oracle sits strictly inside the radius, within
    /// `search_epsilon` of it relative to its size.
    pub fn singularity(&self, system: &System) -> Result<(Radius, Oracle)> {
        let mut best = self.solve(system, 0.0)?;
        // Infinitely many structures with integer counts diverge at x = 1.
        let mut upper = 1.0;
        if let Some(oracle) = self.try_solve(system, upper)? {
            debug!("system converges at x = 1, radius unbounded");
            return Ok((Radius::Unbounded, oracle));
        }

        // The last converging point may be the singular point itself, so part
        // of the budget is kept for stepping back inside the radius.
        let bracket = 0.5 * self.config.search_epsilon;
        let step_back = 0.4 * self.config.search_epsilon;
        let mut lower = 0.0;
        for _ in 0..self.config.max_iterations {
            if upper - lower <= bracket * upper {
                break;
            }
            let middle = 0.5 * (lower + upper);
            match self.try_solve(system, middle)? {
                Some(oracle) => {
                    lower = middle;
                    best = oracle;
                }
                None => upper = middle,
            }
        }
        let inside = lower * (1.0 - step_back);
        if inside > 0.0 {
            if let Some(oracle) = self.try_solve(system, inside)? {
                best = oracle;
            }
        }
        let point = best.point();
        debug!(point, upper, "located singularity");
        Ok((Radius::Finite { point, upper }, best))
    }

    /// Find the point where the expected size of `root` equals `mean`.
    pub fn tune(&self, system: &System, root: TypeIndex, mean: f64) -> Result<Oracle> {
        let (radius, singular) = self.singularity(system)?;
        self.tune_from(system, root, mean, radius, &singular)
    }

    /// Like [`Solver::tune`], starting from an already located singularity.
    pub fn tune_from(
        &self,
        system: &System,
        root: TypeIndex,
        mean: f64,
        radius: Radius,
        singular: &Oracle,
    ) -> Result<Oracle> {
        if mean <= 0.0 {
            return self.solve(system, 0.0);
        }

        let mut upper = singular.clone();
        if let Radius::Unbounded = radius {
            while upper.expected_size(root) < mean && upper.point() < MAX_PROBE {
                upper = self.solve(system, upper.point() * 2.0)?;
            }
        }
        if upper.expected_size(root) <= mean {
            warn!(
                mean,
                reachable = upper.expected_size(root),
                "target mean size unreachable, using the largest convergent point"
            );
            return Ok(upper);
        }

        let mut lower_point = 0.0;
        let mut best = upper.clone();
        for _ in 0..self.config.max_iterations {
            let expected = best.expected_size(root);
            if (expected - mean).abs() <= self.config.search_epsilon * mean {
                break;
            }
            let middle = 0.5 * (lower_point + upper.point());
            if upper.point() - lower_point <= f64::EPSILON * upper.point() {
                break;
            }
            let oracle = self.solve(system, middle)?;
            if oracle.expected_size(root) < mean {
                lower_point = middle;
            } else {
                upper = oracle.clone();
            }
            best = oracle;
        }
        debug!(
            mean,
            point = best.point(),
            expected = best.expected_size(root),
            "tuned oracle"
        );
        Ok(best)
    }

    fn try_solve(&self, system: &System, x: f64) -> Result<Option<Oracle>> {
        match self.solve(system, x) {
            Ok(oracle) => Ok(Some(oracle)),
            Err(error) if error.is_divergent() => Ok(None),
            Err(error) => Err(error),
        }
    }
}

fn check_finite(system: &System, index: TypeIndex, x: f64, value: f64) -> Result<()> {
    if value.is_finite() && value.abs() < BLOW_UP {
        Ok(())
    } else {
        Err(BoltzmannError::divergent(system.name(index), x, "values blow up"))
    }
}

fn identity_minus_jacobian(system: &System, x: f64, values: &[f64]) -> Vec<Vec<f64>> {
    let n = system.len();
    system
        .equations()
        .iter()
        .enumerate()
        .map(|(index, equation)| {
            let mut row = vec![0.0; n];
            for term in &equation.terms {
                term.accumulate_jacobian(x, values, &mut row);
            }
            for entry in row.iter_mut() {
                *entry = -*entry;
            }
            row[index] += 1.0;
            row
        })
        .collect()
}

fn derivatives(system: &System, x: f64, values: &[f64]) -> Result<Vec<f64>> {
    let rhs: Vec<f64> = system
        .equations()
        .iter()
        .map(|e| e.terms.iter().map(|t| t.derivative_x(x, values)).sum())
        .collect();
    let matrix = identity_minus_jacobian(system, x, values);
    let derivatives = solve_linear(matrix, rhs)
        .ok_or_else(|| BoltzmannError::divergent(system.name(0), x, "derivative system is singular"))?;
    for (index, d) in derivatives.iter().enumerate() {
        check_finite(system, index, x, *d)?;
        if *d < 0.0 {
            return Err(BoltzmannError::divergent(
                system.name(index),
                x,
                "negative derivative past the singularity",
            ));
        }
    }
    Ok(derivatives)
}

/// Gaussian elimination with scaled partial pivoting.
///
/// Pointed systems mix values near 1 with values in the millions, so pivots
/// are compared against the rest of their row rather than absolutely.
fn solve_linear(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    for column in 0..n {
        let scaled = |row: &[f64]| {
            let scale = row[column..].iter().fold(0.0f64, |max, v| max.max(v.abs()));
            if scale > 0.0 {
                row[column].abs() / scale
            } else {
                0.0
            }
        };
        let pivot = (column..n).max_by(|&a, &b| {
            scaled(&matrix[a])
                .partial_cmp(&scaled(&matrix[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;
        if !(scaled(&matrix[pivot]) > SINGULAR_PIVOT) {
            return None;
        }
        matrix.swap(column, pivot);
        rhs.swap(column, pivot);

        for row in column + 1..n {
            let factor = matrix[row][column] / matrix[column][column];
            if factor == 0.0 {
                continue;
            }
            for k in column..n {
                matrix[row][k] -= factor * matrix[column][k];
            }
            rhs[row] -= factor * rhs[column];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Some(solution)
}
