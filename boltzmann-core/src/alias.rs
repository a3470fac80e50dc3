//! Aliases: substitute generators that stop structural expansion of a type.
//!
//! An alias for target type `T` names a stand-in type `A` that is sampled
//! structurally in its place, and a function turning the stand-in into a `T`.
//! Types without a finite base case (`struct I(Box<I>)`) become samplable
//! once an alias cuts the recursion.
//!
//! Aliases come in two flavors, tracked in the type system. [`Plain`]
//! substitutes only see a random source. [`Ceiled`] substitutes also see the
//! shared size budget of a rejection attempt and may abort it. A generator
//! accepts only an [`AliasSet`] of its own flavor; a plain set can be
//! converted with [`AliasSet::into_ceiled`], never the other way round.

use crate::dynamic::{Dynamic, TypeTag};
use crate::error::Result;
use crate::random::RandomSource;
use crate::sampler::{Budgeted, Step};
use crate::schema::Extractor;
use crate::structure::Structure;
use crate::system::TypeIndex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

mod sealed {
    pub trait Sealed {}
}

/// Marker for the two alias flavors.
pub trait Flavor: sealed::Sealed + Send + Sync + 'static {}

/// Substitutes that ignore the size budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plain {}

/// Substitutes that share the size budget of a rejection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ceiled {}

impl sealed::Sealed for Plain {}
impl sealed::Sealed for Ceiled {}
impl Flavor for Plain {}
impl Flavor for Ceiled {}

/// Type-erased substitute: consumes the stand-in, produces the target.
pub type Substitute =
    Arc<dyn Fn(Dynamic, &mut Budgeted<'_>) -> Result<Step<Dynamic>> + Send + Sync>;

#[derive(Clone)]
pub(crate) struct AliasHook {
    pub(crate) target: TypeTag,
    pub(crate) stand_in: fn(&mut Extractor) -> TypeIndex,
    pub(crate) substitute: Substitute,
}

/// A substitute generator for one target type.
pub struct Alias<F: Flavor = Plain> {
    hook: AliasHook,
    stand_in: TypeTag,
    flavor: PhantomData<F>,
}

impl<F: Flavor> Clone for Alias<F> {
    fn clone(&self) -> Self {
        Alias {
            hook: self.hook.clone(),
            stand_in: self.stand_in,
            flavor: PhantomData,
        }
    }
}

fn erase<G>(substitute: G) -> Substitute
where
    G: Fn(Dynamic, &mut Budgeted<'_>) -> Result<Step<Dynamic>> + Send + Sync + 'static,
{
    Arc::new(substitute)
}

impl<F: Flavor> Alias<F> {
    fn from_parts<A: Structure, T: 'static>(substitute: Substitute) -> Self {
        Alias {
            hook: AliasHook {
                target: TypeTag::of::<T>(),
                stand_in: Extractor::visit::<A>,
                substitute,
            },
            stand_in: TypeTag::of::<A>(),
            flavor: PhantomData,
        }
    }

    /// Type whose expansion this alias replaces.
    pub fn target(&self) -> TypeTag {
        self.hook.target
    }

    /// Type sampled structurally in place of the target.
    pub fn stand_in(&self) -> TypeTag {
        self.stand_in
    }
}

impl Alias<Plain> {
    /// Replace `T` by `substitute` applied to a structurally sampled `A`.
    pub fn new<A, T, G>(substitute: G) -> Self
    where
        A: Structure,
        T: 'static,
        G: Fn(A, &mut dyn RandomSource) -> T + Send + Sync + 'static,
    {
        Self::from_parts::<A, T>(erase(move |value, budget| {
            let stand_in = value.downcast::<A>()?;
            Ok(Step::Accepted(Dynamic::new(substitute(stand_in, budget.rng()))))
        }))
    }

    /// Replace `T` by a generator that needs no stand-in.
    pub fn replace<T, G>(generate: G) -> Self
    where
        T: 'static,
        G: Fn(&mut dyn RandomSource) -> T + Send + Sync + 'static,
    {
        Self::new::<(), T, _>(move |(), rng| generate(rng))
    }

    /// Use this alias where ceiled aliases are expected. It never aborts.
    pub fn into_ceiled(self) -> Alias<Ceiled> {
        Alias {
            hook: self.hook,
            stand_in: self.stand_in,
            flavor: PhantomData,
        }
    }
}

impl Alias<Ceiled> {
    /// Replace `T` by a budget-aware substitute applied to a sampled `A`.
    pub fn ceiled<A, T, G>(substitute: G) -> Self
    where
        A: Structure,
        T: 'static,
        G: Fn(A, &mut Budgeted<'_>) -> Step<T> + Send + Sync + 'static,
    {
        Self::from_parts::<A, T>(erase(move |value, budget| {
            let stand_in = value.downcast::<A>()?;
            Ok(substitute(stand_in, budget).map(Dynamic::new))
        }))
    }
}

impl<F: Flavor> fmt::Debug for Alias<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alias")
            .field("target", &self.hook.target)
            .field("stand_in", &self.stand_in)
            .finish()
    }
}

/// Aliases installed into one generator. The first alias for a target wins.
pub struct AliasSet<F: Flavor = Plain> {
    aliases: Vec<Alias<F>>,
}

impl<F: Flavor> Default for AliasSet<F> {
    fn default() -> Self {
        AliasSet {
            aliases: Vec::new(),
        }
    }
}

impl<F: Flavor> Clone for AliasSet<F> {
    fn clone(&self) -> Self {
        AliasSet {
            aliases: self.aliases.clone(),
        }
    }
}

impl<F: Flavor> fmt::Debug for AliasSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.aliases).finish()
    }
}

impl<F: Flavor> AliasSet<F> {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an alias, builder style.
    pub fn with(mut self, alias: Alias<F>) -> Self {
        self.push(alias);
        self
    }

    /// Append an alias; earlier aliases take precedence.
    pub fn push(&mut self, alias: Alias<F>) {
        self.aliases.push(alias);
    }

    /// Number of registered aliases.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Aliases in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Alias<F>> {
        self.aliases.iter()
    }

    pub(crate) fn hooks(&self) -> Vec<AliasHook> {
        self.aliases.iter().map(|alias| alias.hook.clone()).collect()
    }
}

impl AliasSet<Plain> {
    /// Lift every alias to the ceiled flavor.
    pub fn into_ceiled(self) -> AliasSet<Ceiled> {
        AliasSet {
            aliases: self.aliases.into_iter().map(Alias::into_ceiled).collect(),
        }
    }
}

impl<F: Flavor> FromIterator<Alias<F>> for AliasSet<F> {
    fn from_iter<I: IntoIterator<Item = Alias<F>>>(iter: I) -> Self {
        AliasSet {
            aliases: iter.into_iter().collect(),
        }
    }
}
