//! Taxonomy Registry — the closed set of component kinds and their
//! structural contracts.
//!
//! The registry is populated once at process start from static configuration
//! and is read-only thereafter: the public API takes `&self` only and there
//! is no interior mutability, so a shared reference is safe to use from any
//! number of threads without synchronization.
//!
//! Registry misuse (duplicate or unknown kinds) is fatal at startup — the
//! gate adapter refuses to run with a malformed taxonomy.

use std::collections::BTreeMap;

use thiserror::Error;
use trellis_types::{
    ArityBounds, ArityContract, ComponentKind, KindDefinition, Mutability,
};

/// Errors from registry construction and lookup.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    #[error("kind already registered: {kind}")]
    DuplicateKind { kind: ComponentKind },

    #[error("kind not registered: {kind}")]
    UnknownKind { kind: ComponentKind },
}

/// The registry of kind definitions. Built once, read forever.
#[derive(Clone, Debug, Default)]
pub struct TaxonomyRegistry {
    kinds: BTreeMap<ComponentKind, KindDefinition>,
}

impl TaxonomyRegistry {
    /// An empty registry. Useful only as a base for `register`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in seven-kind taxonomy.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for def in standard_definitions() {
            // The standard set has no duplicates.
            registry
                .register(def)
                .expect("standard taxonomy is duplicate-free");
        }
        registry
    }

    /// Build a registry from configuration-supplied definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = KindDefinition>,
    ) -> Result<Self, TaxonomyError> {
        let mut registry = Self::new();
        for def in definitions {
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// Register a kind. Fails on a duplicate tag; contracts are immutable
    /// once registered, so re-registration is never an update.
    pub fn register(&mut self, def: KindDefinition) -> Result<(), TaxonomyError> {
        if self.kinds.contains_key(&def.kind) {
            return Err(TaxonomyError::DuplicateKind { kind: def.kind });
        }
        self.kinds.insert(def.kind, def);
        Ok(())
    }

    /// Resolve a kind's definition.
    pub fn lookup(&self, kind: ComponentKind) -> Result<&KindDefinition, TaxonomyError> {
        self.kinds
            .get(&kind)
            .ok_or(TaxonomyError::UnknownKind { kind })
    }

    /// All registered definitions, in kind order.
    pub fn definitions(&self) -> impl Iterator<Item = &KindDefinition> {
        self.kinds.values()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Contracts for the built-in taxonomy.
fn standard_definitions() -> Vec<KindDefinition> {
    let unbounded = ArityBounds::new(0, None);
    vec![
        KindDefinition {
            kind: ComponentKind::StateHolder,
            arity: ArityContract::new(ArityBounds::new(0, Some(1)), unbounded),
            mutability: Mutability::Stateful,
        },
        KindDefinition {
            kind: ComponentKind::PureTransform,
            arity: ArityContract::new(unbounded, unbounded),
            mutability: Mutability::Stateless,
        },
        KindDefinition {
            kind: ComponentKind::BoundaryAdapter,
            arity: ArityContract::new(unbounded, ArityBounds::new(0, Some(1))),
            mutability: Mutability::Stateless,
        },
        KindDefinition {
            kind: ComponentKind::ImmutableFact,
            arity: ArityContract::new(unbounded, ArityBounds::new(0, Some(0))),
            mutability: Mutability::Stateless,
        },
        KindDefinition {
            kind: ComponentKind::ProcessCoordinator,
            arity: ArityContract::new(unbounded, unbounded),
            mutability: Mutability::Stateful,
        },
        KindDefinition {
            kind: ComponentKind::Router,
            arity: ArityContract::new(unbounded, unbounded),
            mutability: Mutability::Stateless,
        },
        KindDefinition {
            kind: ComponentKind::Observer,
            arity: ArityContract::new(ArityBounds::new(0, Some(0)), unbounded),
            mutability: Mutability::Stateless,
        },
    ]
}
