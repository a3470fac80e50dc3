//! Boltzmann generators for [`Structure`] types.
//!
//! A [`Generator`] owns the configuration and aliases for one root type.
//! Everything derived from them is built lazily on first use and then
//! shared by every clone of the generator: the extracted schema, the oracle
//! at the singularity, oracles tuned to mean sizes, and the pointed system
//! with its ladder of oracles. Each cache entry is computed at most once,
//! even when several threads ask for it together.
//!
//! ```rust,ignore
//! let generator = Generator::<Tree>::new().into_ceiled();
//! let mut rng = SeedSource::from_u64(7);
//! let tree = generator.sample_singular_rejection(Size(100), &mut rng)?;
//! assert!((90..=110).contains(&tree.size.get()));
//! ```

use crate::alias::{AliasSet, Ceiled, Flavor, Plain};
use crate::cache::Memo;
use crate::data::{Config, Size};
use crate::error::{BoltzmannError, Result};
use crate::oracle::{Oracle, Radius, Solver};
use crate::pointed::{Ladder, PointedSystem, Unpointed};
use crate::random::RandomSource;
use crate::rejection::{Rejection, Sampled, Window};
use crate::sampler::{assemble, sample_shape, GenerationState, Shape, Step};
use crate::schema::Schema;
use crate::structure::Structure;
use crate::system::{System, TypeIndex};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Which oracle a sampling call draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tuning {
    /// The oracle at the dominant singularity.
    Singular,
    /// The oracle whose expected root size is the given mean.
    Mean(Size),
    /// The pointed oracle on the ladder rung serving the given size, or the
    /// top rung (pointed singular oracle when uncapped) for `None`.
    Pointed(Option<Size>),
}

type Singular = (Radius, Arc<Oracle>);

struct Engine {
    schema: Schema,
    solver: Solver,
    ladder: Ladder,
    singular: OnceLock<Result<Singular>>,
    points: Memo<u64, Arc<Oracle>>,
    means: Memo<usize, Arc<Oracle>>,
    pointed: OnceLock<Result<PointedEngine>>,
}

struct PointedEngine {
    system: PointedSystem,
    root: TypeIndex,
    singular: OnceLock<Result<Singular>>,
    rungs: Memo<u32, Arc<Oracle>>,
}

fn cached<V: Clone>(cell: &OnceLock<Result<V>>, init: impl FnOnce() -> Result<V>) -> Result<V> {
    cell.get_or_init(init).clone()
}

impl Engine {
    fn build<T: Structure, F: Flavor>(config: &Config, aliases: &AliasSet<F>) -> Result<Self> {
        config.validate()?;
        Ok(Engine {
            schema: Schema::extract::<T>(aliases.hooks())?,
            solver: Solver::new(config.solver.clone()),
            ladder: Ladder::new(config.rung_selection, config.pointed_max_size),
            singular: OnceLock::new(),
            points: Memo::new(),
            means: Memo::new(),
            pointed: OnceLock::new(),
        })
    }

    fn system(&self) -> &System {
        self.schema.system()
    }

    fn singular(&self) -> Result<Singular> {
        cached(&self.singular, || {
            let (radius, oracle) = self.solver.singularity(self.system())?;
            Ok((radius, Arc::new(oracle)))
        })
    }

    fn oracle_at(&self, x: f64) -> Result<Arc<Oracle>> {
        self.points.get_or_try_init(x.to_bits(), || {
            self.solver.solve(self.system(), x).map(Arc::new)
        })
    }

    fn oracle_for(&self, mean: Option<Size>) -> Result<Arc<Oracle>> {
        let Some(mean) = mean else {
            return Ok(self.singular()?.1);
        };
        self.means.get_or_try_init(mean.get(), || {
            let (radius, singular) = self.singular()?;
            let oracle = self
                .solver
                .tune_from(self.system(), 0, mean.get() as f64, radius, &singular)?;
            debug!(mean = mean.get(), point = oracle.point(), "cached mean-size oracle");
            Ok(Arc::new(oracle))
        })
    }

    fn pointed(&self) -> Result<&PointedEngine> {
        self.pointed
            .get_or_init(|| {
                let system = PointedSystem::new(self.system())?;
                let root = system.root()?;
                debug!(types = system.system().len(), "built pointed system");
                Ok(PointedEngine {
                    system,
                    root,
                    singular: OnceLock::new(),
                    rungs: Memo::new(),
                })
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    fn pointed_singular(&self, pointed: &PointedEngine) -> Result<Singular> {
        cached(&pointed.singular, || {
            let (radius, oracle) = self.solver.singularity(pointed.system.system())?;
            Ok((radius, Arc::new(oracle)))
        })
    }

    fn rung(&self, pointed: &PointedEngine, rung: u32) -> Result<Arc<Oracle>> {
        pointed.rungs.get_or_try_init(rung, || {
            let (radius, singular) = self.pointed_singular(pointed)?;
            let size = Ladder::size(rung);
            let oracle = self.solver.tune_from(
                pointed.system.system(),
                pointed.root,
                size.get() as f64,
                radius,
                &singular,
            )?;
            debug!(rung, size = size.get(), point = oracle.point(), "cached ladder rung");
            Ok(Arc::new(oracle))
        })
    }

    fn pointed_oracle(&self, target: Option<Size>) -> Result<Arc<Oracle>> {
        let pointed = self.pointed()?;
        match (target, self.ladder.top()) {
            (Some(target), _) => self.rung(pointed, self.ladder.rung(target)),
            (None, Some(top)) => self.rung(pointed, top),
            (None, None) => Ok(self.pointed_singular(pointed)?.1),
        }
    }

    fn plan(&self, tuning: Tuning) -> Result<Plan<'_>> {
        let plan = match tuning {
            Tuning::Singular => Plan::plain(self, self.oracle_for(None)?),
            Tuning::Mean(mean) => Plan::plain(self, self.oracle_for(Some(mean))?),
            Tuning::Pointed(target) => {
                let pointed = self.pointed()?;
                Plan {
                    schema: &self.schema,
                    system: pointed.system.system(),
                    oracle: self.pointed_oracle(target)?,
                    root: pointed.root,
                    pointed: Some(&pointed.system),
                }
            }
        };
        plan.check_root()?;
        Ok(plan)
    }
}

/// Everything one sampling attempt needs, borrowed from the engine.
pub(crate) struct Plan<'a> {
    schema: &'a Schema,
    system: &'a System,
    oracle: Arc<Oracle>,
    root: TypeIndex,
    pointed: Option<&'a PointedSystem>,
}

impl<'a> Plan<'a> {
    fn plain(engine: &'a Engine, oracle: Arc<Oracle>) -> Self {
        Plan {
            schema: &engine.schema,
            system: engine.system(),
            oracle,
            root: 0,
            pointed: None,
        }
    }

    fn check_root(&self) -> Result<()> {
        if self.oracle.value(self.root) > 0.0 {
            Ok(())
        } else {
            Err(BoltzmannError::invalid_config(format!(
                "`{}` has no structures of positive weight at x = {}",
                self.system.name(self.root),
                self.oracle.point()
            )))
        }
    }

    pub(crate) fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    /// Shape of one attempt, on the original system.
    fn shape(&self, rng: &mut dyn RandomSource, state: &mut GenerationState) -> Result<Step<Unpointed>> {
        let shape = match sample_shape(self.system, &self.oracle, self.root, rng, state) {
            Step::Accepted(shape) => shape,
            Step::Aborted => return Ok(Step::Aborted),
        };
        let unpointed = match self.pointed {
            Some(pointed) => pointed.unpoint(&shape)?,
            None => Unpointed { shape, point: None },
        };
        Ok(Step::Accepted(unpointed))
    }

    pub(crate) fn attempt<T: 'static>(
        &self,
        rng: &mut dyn RandomSource,
        state: &mut GenerationState,
    ) -> Result<Step<T>> {
        let shape = match self.shape(rng, state)? {
            Step::Accepted(unpointed) => unpointed.shape,
            Step::Aborted => return Ok(Step::Aborted),
        };
        match assemble(self.schema, &shape, rng, state)? {
            Step::Accepted(value) => value.downcast::<T>().map(Step::Accepted),
            Step::Aborted => Ok(Step::Aborted),
        }
    }

    fn unbounded<T: 'static>(&self, rng: &mut dyn RandomSource) -> Result<Sampled<T>> {
        let mut state = GenerationState::unbounded();
        match self.attempt(rng, &mut state)? {
            Step::Accepted(value) => Ok(Sampled {
                value,
                size: Size(state.atoms()),
                attempts: 1,
            }),
            Step::Aborted => Err(BoltzmannError::invalid_config(
                "an attempt without a ceiling was aborted",
            )),
        }
    }
}

/// Boltzmann generator for values of `T`, with aliases of flavor `F`.
pub struct Generator<T, F: Flavor = Plain> {
    config: Config,
    aliases: AliasSet<F>,
    engine: Arc<OnceLock<Result<Engine>>>,
    marker: PhantomData<fn() -> T>,
}

impl<T, F: Flavor> Clone for Generator<T, F> {
    fn clone(&self) -> Self {
        Generator {
            config: self.config.clone(),
            aliases: self.aliases.clone(),
            engine: Arc::clone(&self.engine),
            marker: PhantomData,
        }
    }
}

impl<T, F: Flavor> fmt::Debug for Generator<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("type", &std::any::type_name::<T>())
            .field("config", &self.config)
            .field("aliases", &self.aliases)
            .finish()
    }
}

impl<T: Structure> Default for Generator<T, Plain> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Structure> Generator<T, Plain> {
    /// A plain generator without aliases.
    pub fn new() -> Self {
        Self::with_aliases(AliasSet::new())
    }

    /// A ceiled generator without aliases.
    pub fn ceiled() -> Generator<T, Ceiled> {
        Self::new().into_ceiled()
    }

    /// Switch to ceiled aliases, enabling rejection sampling. Plain aliases
    /// carry over unchanged.
    pub fn into_ceiled(self) -> Generator<T, Ceiled> {
        Generator {
            config: self.config,
            aliases: self.aliases.into_ceiled(),
            engine: Arc::new(OnceLock::new()),
            marker: PhantomData,
        }
    }
}

impl<T: Structure> Generator<T, Ceiled> {

    /// Sample with the oracle tuned to `oracle_size` (the singular one for
    /// `None`) until the size lies within the tolerance window of `target`.
    pub fn sample_ceiled(
        &self,
        oracle_size: Option<Size>,
        target: Size,
        rng: &mut dyn RandomSource,
    ) -> Result<Sampled<T>> {
        let tuning = oracle_size.map_or(Tuning::Singular, Tuning::Mean);
        self.sample_tuned(tuning, target, rng)
    }

    /// Rejection sampling around `target`, drawing from the oracle tuned to it.
    pub fn sample_rejection(&self, target: Size, rng: &mut dyn RandomSource) -> Result<Sampled<T>> {
        self.sample_ceiled(Some(target), target, rng)
    }

    /// Rejection sampling around `target`, drawing at the singularity.
    pub fn sample_singular_rejection(
        &self,
        target: Size,
        rng: &mut dyn RandomSource,
    ) -> Result<Sampled<T>> {
        self.sample_ceiled(None, target, rng)
    }

    /// Rejection sampling around `target` from the pointed ladder.
    pub fn sample_pointed_rejection(
        &self,
        target: Size,
        rng: &mut dyn RandomSource,
    ) -> Result<Sampled<T>> {
        self.sample_tuned(Tuning::Pointed(Some(target)), target, rng)
    }

    /// Rejection sampling around `target` from an explicitly chosen oracle.
    pub fn sample_tuned(
        &self,
        tuning: Tuning,
        target: Size,
        rng: &mut dyn RandomSource,
    ) -> Result<Sampled<T>> {
        let plan = self.plan(tuning)?;
        let rejection = Rejection::new(self.window(tuning, target)?, self.config.max_retries);
        debug!(
            target = target.get(),
            lower = rejection.window().lower(),
            upper = rejection.window().upper(),
            point = plan.oracle().point(),
            "rejection sampling"
        );
        rejection.run(|state| plan.attempt::<T>(&mut *rng, state))
    }

    /// The acceptance window around `target`.
    ///
    /// Every pointed structure holds its point, so a pointed window must
    /// admit at least one atom or no attempt could ever land in it.
    pub(crate) fn window(&self, tuning: Tuning, target: Size) -> Result<Window> {
        let window = Window::around(target, self.config.tolerance);
        if matches!(tuning, Tuning::Pointed(_)) && window.upper() == 0 {
            return Err(BoltzmannError::invalid_config(format!(
                "pointed sampling cannot reach size {}, pointed structures hold at least one atom",
                target.get()
            )));
        }
        Ok(window)
    }
}

impl<T: Structure, F: Flavor> Generator<T, F> {
    /// A generator using `aliases` and the default configuration.
    pub fn with_aliases(aliases: AliasSet<F>) -> Self {
        Generator {
            config: Config::default(),
            aliases,
            engine: Arc::new(OnceLock::new()),
            marker: PhantomData,
        }
    }

    /// Replace the configuration. Cached oracles are discarded.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self.engine = Arc::new(OnceLock::new());
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Aliases installed on this generator.
    pub fn aliases(&self) -> &AliasSet<F> {
        &self.aliases
    }

    fn engine(&self) -> Result<&Engine> {
        self.engine
            .get_or_init(|| Engine::build::<T, F>(&self.config, &self.aliases))
            .as_ref()
            .map_err(Clone::clone)
    }

    pub(crate) fn plan(&self, tuning: Tuning) -> Result<Plan<'_>> {
        self.engine()?.plan(tuning)
    }

    /// The algebraic system extracted from `T`.
    pub fn system(&self) -> Result<&System> {
        Ok(self.engine()?.system())
    }

    /// Builders and alias substitutes for every type of the system.
    pub fn schema(&self) -> Result<&Schema> {
        Ok(&self.engine()?.schema)
    }

    /// The system extended with pointed copies of its types.
    pub fn pointed_system(&self) -> Result<&PointedSystem> {
        Ok(&self.engine()?.pointed()?.system)
    }

    /// Radius of convergence of the extracted system.
    pub fn singularity(&self) -> Result<Radius> {
        Ok(self.engine()?.singular()?.0)
    }

    /// Oracle at an explicit evaluation point.
    pub fn oracle_at(&self, x: f64) -> Result<Arc<Oracle>> {
        self.engine()?.oracle_at(x)
    }

    /// Oracle tuned to a mean size, or at the singularity for `None`.
    pub fn oracle_for(&self, mean: Option<Size>) -> Result<Arc<Oracle>> {
        self.engine()?.oracle_for(mean)
    }

    /// Pointed oracle serving `target`.
    pub fn pointed_oracle(&self, target: Option<Size>) -> Result<Arc<Oracle>> {
        self.engine()?.pointed_oracle(target)
    }

    /// Fill the ladder up to the rung serving `max`, returning the rung count.
    pub fn precompute_ladder(&self, max: Size) -> Result<usize> {
        let engine = self.engine()?;
        let pointed = engine.pointed()?;
        let top = engine.ladder.rung(max);
        for rung in 0..=top {
            engine.rung(pointed, rung)?;
        }
        Ok(top as usize + 1)
    }

    /// One unbounded sample at an explicit evaluation point.
    pub fn sample_at(&self, x: f64, rng: &mut dyn RandomSource) -> Result<Sampled<T>> {
        let engine = self.engine()?;
        let plan = Plan::plain(engine, engine.oracle_at(x)?);
        plan.check_root()?;
        plan.unbounded(rng)
    }

    /// One unbounded sample, tuned to `mean` or at the singularity.
    pub fn sample(&self, mean: Option<Size>, rng: &mut dyn RandomSource) -> Result<Sampled<T>> {
        let tuning = mean.map_or(Tuning::Singular, Tuning::Mean);
        self.plan(tuning)?.unbounded(rng)
    }

    /// One unbounded pointed sample, drawn from the ladder rung serving
    /// `target` and then unpointed.
    pub fn sample_pointed(
        &self,
        target: Option<Size>,
        rng: &mut dyn RandomSource,
    ) -> Result<Sampled<T>> {
        self.plan(Tuning::Pointed(target))?.unbounded(rng)
    }

    /// The shape of one unbounded sample, without assembling a value.
    pub fn sample_shape(&self, mean: Option<Size>, rng: &mut dyn RandomSource) -> Result<Shape> {
        let tuning = mean.map_or(Tuning::Singular, Tuning::Mean);
        Ok(self.unbounded_shape(tuning, rng)?.shape)
    }

    /// The unpointed shape of one pointed sample, with the position of its point.
    pub fn sample_pointed_shape(
        &self,
        target: Option<Size>,
        rng: &mut dyn RandomSource,
    ) -> Result<Unpointed> {
        self.unbounded_shape(Tuning::Pointed(target), rng)
    }

    fn unbounded_shape(&self, tuning: Tuning, rng: &mut dyn RandomSource) -> Result<Unpointed> {
        let plan = self.plan(tuning)?;
        match plan.shape(rng, &mut GenerationState::unbounded())? {
            Step::Accepted(unpointed) => Ok(unpointed),
            Step::Aborted => Err(BoltzmannError::invalid_config(
                "an attempt without a ceiling was aborted",
            )),
        }
    }
}
