//! Extraction of an algebraic system from [`Structure`] implementations.

use crate::alias::{AliasHook, Substitute};
use crate::dynamic::TypeTag;
use crate::error::Result;
use crate::structure::{ErasedBuilder, Structure};
use crate::system::{Equation, System, Term, TypeIndex};
use std::collections::HashMap;
use tracing::debug;

/// How values of one type in a [`Schema`] are assembled.
pub enum Node {
    /// Built structurally, one builder per constructor.
    Structure {
        tag: TypeTag,
        builders: Vec<ErasedBuilder>,
    },
    /// Replaced by an alias: a stand-in is sampled and then substituted.
    Alias { tag: TypeTag, substitute: Substitute },
}

impl Node {
    /// Tag of the type this node builds.
    pub fn tag(&self) -> TypeTag {
        match self {
            Node::Structure { tag, .. } | Node::Alias { tag, .. } => *tag,
        }
    }

    /// Whether an alias substitute stands in for this type.
    pub fn is_alias(&self) -> bool {
        matches!(self, Node::Alias { .. })
    }
}

/// An algebraic system together with the assembly recipe of every type.
pub struct Schema {
    system: System,
    nodes: Vec<Node>,
    index: HashMap<TypeTag, TypeIndex>,
}

impl Schema {
    /// Extract the system reachable from `T`, with no aliases.
    pub fn of<T: Structure>() -> Result<Self> {
        Self::extract::<T>(Vec::new())
    }

    pub(crate) fn extract<T: Structure>(aliases: Vec<AliasHook>) -> Result<Self> {
        let mut extractor = Extractor {
            aliases,
            equations: Vec::new(),
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        extractor.visit::<T>();
        let Extractor {
            equations,
            nodes,
            index,
            ..
        } = extractor;
        let system = System::from_equations(equations)?;
        debug!(
            root = system.name(0),
            types = system.len(),
            aliased = nodes.iter().filter(|n| n.is_alias()).count(),
            "extracted system"
        );
        Ok(Schema {
            system,
            nodes,
            index,
        })
    }

    /// The extracted system.
    pub fn system(&self) -> &System {
        &self.system
    }

    /// Node of the type at `index`.
    pub fn node(&self, index: TypeIndex) -> &Node {
        &self.nodes[index]
    }

    /// Index of the type with the given tag, if it is part of the system.
    pub fn index_of(&self, tag: TypeTag) -> Option<TypeIndex> {
        self.index.get(&tag).copied()
    }

    /// Whether any alias fired during extraction.
    pub fn has_aliases(&self) -> bool {
        self.nodes.iter().any(Node::is_alias)
    }
}

/// Walks `Structure` implementations, numbering each reachable type once.
pub struct Extractor {
    aliases: Vec<AliasHook>,
    equations: Vec<Equation>,
    nodes: Vec<Node>,
    index: HashMap<TypeTag, TypeIndex>,
}

impl Extractor {
    /// Index of `T`, extracting it and everything it references on first sight.
    pub fn visit<T: Structure>(&mut self) -> TypeIndex {
        let tag = TypeTag::of::<T>();
        if let Some(&index) = self.index.get(&tag) {
            return index;
        }

        // Reserve the slot first so recursive references resolve to it.
        let index = self.equations.len();
        self.index.insert(tag, index);
        self.equations.push(Equation {
            name: tag.name().to_string(),
            terms: Vec::new(),
        });
        self.nodes.push(Node::Structure {
            tag,
            builders: Vec::new(),
        });

        if let Some(hook) = self.aliases.iter().find(|h| h.target == tag).cloned() {
            let stand_in = (hook.stand_in)(self);
            self.equations[index].terms = vec![Term::new("alias", 0, vec![stand_in])];
            self.nodes[index] = Node::Alias {
                tag,
                substitute: hook.substitute,
            };
            return index;
        }

        let constructors = T::constructors();
        let mut terms = Vec::with_capacity(constructors.len());
        let mut builders = Vec::with_capacity(constructors.len());
        for constructor in constructors {
            let refs = constructor
                .fields()
                .iter()
                .map(|field| field.visit(self))
                .collect();
            terms.push(Term::new(constructor.name(), constructor.atom_count(), refs));
            builders.push(constructor.into_erased());
        }
        self.equations[index].terms = terms;
        self.nodes[index] = Node::Structure { tag, builders };
        index
    }
}
