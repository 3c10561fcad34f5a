//! Compatibility Validator — decides whether a relationship between two
//! component declarations is legal.
//!
//! The rule table is an allow-list, never a deny-list: a (source kind,
//! relation, target kind) combination with no entry is rejected outright,
//! because an unenumerated combination is assumed unsafe until explicitly
//! reviewed.
//!
//! Every function here is a pure decision over its inputs. Nothing is
//! mutated, so validation of independent bonds can run in any order and
//! still merge into the same deterministic report.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use trellis_taxonomy::TaxonomyRegistry;
use trellis_types::{Bond, ComponentId, ComponentKind, GraphSnapshot, RelationKind};

/// One allow-list entry: this relation may exist between these two kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompatibilityRule {
    pub source: ComponentKind,
    pub relation: RelationKind,
    pub target: ComponentKind,
}

/// The allow-list of legal (source kind, relation, target kind) triples.
#[derive(Clone, Debug, Default)]
pub struct CompatibilityTable {
    allowed: BTreeSet<(ComponentKind, RelationKind, ComponentKind)>,
}

impl CompatibilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in rule set for the standard taxonomy.
    pub fn standard() -> Self {
        use ComponentKind::*;
        use RelationKind::*;
        let mut table = Self::new();
        for (source, relation, target) in [
            (BoundaryAdapter, Adapts, StateHolder),
            (BoundaryAdapter, Produces, ImmutableFact),
            (StateHolder, Produces, ImmutableFact),
            (PureTransform, Produces, ImmutableFact),
            (PureTransform, Triggers, PureTransform),
            (ProcessCoordinator, Triggers, PureTransform),
            (ProcessCoordinator, Triggers, BoundaryAdapter),
            (ProcessCoordinator, Triggers, Router),
            (Router, Triggers, PureTransform),
            (Router, Triggers, BoundaryAdapter),
            (Observer, Observes, StateHolder),
            (Observer, Observes, Router),
            (Observer, Observes, ProcessCoordinator),
        ] {
            table.allow(source, relation, target);
        }
        table
    }

    pub fn from_rules(rules: impl IntoIterator<Item = CompatibilityRule>) -> Self {
        let mut table = Self::new();
        for rule in rules {
            table.allow(rule.source, rule.relation, rule.target);
        }
        table
    }

    pub fn allow(&mut self, source: ComponentKind, relation: RelationKind, target: ComponentKind) {
        self.allowed.insert((source, relation, target));
    }

    pub fn permits(
        &self,
        source: ComponentKind,
        relation: RelationKind,
        target: ComponentKind,
    ) -> bool {
        self.allowed.contains(&(source, relation, target))
    }

    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    /// The allow-list as rules, in table order.
    pub fn rules(&self) -> impl Iterator<Item = CompatibilityRule> + '_ {
        self.allowed
            .iter()
            .map(|&(source, relation, target)| CompatibilityRule {
                source,
                relation,
                target,
            })
    }
}

/// Which side of a contract a bond count is measured against.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        })
    }
}

/// Structural violations surfaced by validation.
///
/// Each variant carries enough context to reproduce the decision: which
/// component, which bound, which realized count. Violations are never
/// downgraded; the pipeline rejects on any of them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Error, Serialize, Deserialize)]
#[serde(tag = "violation", rename_all = "kebab-case")]
pub enum BondViolation {
    #[error("unknown component: {id}")]
    UnknownComponent { id: ComponentId },

    #[error("kind {kind} of component {component} is not registered")]
    UnregisteredKind {
        component: ComponentId,
        kind: ComponentKind,
    },

    #[error("no compatibility rule for ({source_kind}, {relation}, {target_kind}): {source} -> {target}")]
    IncompatibleBond {
        source: ComponentId,
        source_kind: ComponentKind,
        relation: RelationKind,
        target: ComponentId,
        target_kind: ComponentKind,
    },

    #[error("{component}: {direction} arity {realized} exceeds contract max {limit}")]
    ArityExceeded {
        component: ComponentId,
        direction: Direction,
        limit: u32,
        realized: u32,
    },

    #[error("{component}: {direction} arity {realized} below required minimum {required}")]
    ArityUnderflow {
        component: ComponentId,
        direction: Direction,
        required: u32,
        realized: u32,
    },
}

/// Validate a single bond against a snapshot.
///
/// If the bond is not yet part of the snapshot it is counted as proposed:
/// arity is recomputed as existing plus one on each endpoint's relevant
/// direction. Returns the first violation in check order (existence, rule
/// table, arity); use [`validate_graph`] for an exhaustive report.
pub fn validate_bond(
    bond: &Bond,
    graph: &GraphSnapshot,
    registry: &TaxonomyRegistry,
    table: &CompatibilityTable,
) -> Result<(), BondViolation> {
    let source = graph
        .get(&bond.source)
        .ok_or_else(|| BondViolation::UnknownComponent {
            id: bond.source.clone(),
        })?;
    let target = graph
        .get(&bond.target)
        .ok_or_else(|| BondViolation::UnknownComponent {
            id: bond.target.clone(),
        })?;

    let source_def =
        registry
            .lookup(source.kind)
            .map_err(|_| BondViolation::UnregisteredKind {
                component: source.id.clone(),
                kind: source.kind,
            })?;
    let target_def =
        registry
            .lookup(target.kind)
            .map_err(|_| BondViolation::UnregisteredKind {
                component: target.id.clone(),
                kind: target.kind,
            })?;

    if !table.permits(source.kind, bond.relation, target.kind) {
        return Err(BondViolation::IncompatibleBond {
            source: bond.source.clone(),
            source_kind: source.kind,
            relation: bond.relation,
            target: bond.target.clone(),
            target_kind: target.kind,
        });
    }

    let proposed = if source.bonds.contains(&bond.spec()) { 0 } else { 1 };
    let outbound = graph.outbound_count(&bond.source) + proposed;
    if source_def.arity.outbound.exceeded_by(outbound) {
        return Err(BondViolation::ArityExceeded {
            component: bond.source.clone(),
            direction: Direction::Outbound,
            limit: source_def.arity.outbound.max.unwrap_or(u32::MAX),
            realized: outbound,
        });
    }

    let inbound = graph.inbound_count(&bond.target) + proposed;
    if target_def.arity.inbound.exceeded_by(inbound) {
        return Err(BondViolation::ArityExceeded {
            component: bond.target.clone(),
            direction: Direction::Inbound,
            limit: target_def.arity.inbound.max.unwrap_or(u32::MAX),
            realized: inbound,
        });
    }

    Ok(())
}

/// Validate a whole snapshot: every bond against the rule table, every
/// component against both sides of its arity contract (including required
/// minimums).
///
/// Never short-circuits. The returned list is sorted and de-duplicated so
/// identical graphs always produce identical reports.
pub fn validate_graph(
    graph: &GraphSnapshot,
    registry: &TaxonomyRegistry,
    table: &CompatibilityTable,
) -> Vec<BondViolation> {
    let mut violations = Vec::new();

    for decl in graph.components.values() {
        let def = match registry.lookup(decl.kind) {
            Ok(def) => def,
            Err(_) => {
                violations.push(BondViolation::UnregisteredKind {
                    component: decl.id.clone(),
                    kind: decl.kind,
                });
                continue;
            }
        };

        let outbound = graph.outbound_count(&decl.id);
        if def.arity.outbound.exceeded_by(outbound) {
            violations.push(BondViolation::ArityExceeded {
                component: decl.id.clone(),
                direction: Direction::Outbound,
                limit: def.arity.outbound.max.unwrap_or(u32::MAX),
                realized: outbound,
            });
        }
        if outbound < def.arity.outbound.min {
            violations.push(BondViolation::ArityUnderflow {
                component: decl.id.clone(),
                direction: Direction::Outbound,
                required: def.arity.outbound.min,
                realized: outbound,
            });
        }

        let inbound = graph.inbound_count(&decl.id);
        if def.arity.inbound.exceeded_by(inbound) {
            violations.push(BondViolation::ArityExceeded {
                component: decl.id.clone(),
                direction: Direction::Inbound,
                limit: def.arity.inbound.max.unwrap_or(u32::MAX),
                realized: inbound,
            });
        }
        if inbound < def.arity.inbound.min {
            violations.push(BondViolation::ArityUnderflow {
                component: decl.id.clone(),
                direction: Direction::Inbound,
                required: def.arity.inbound.min,
                realized: inbound,
            });
        }
    }

    for bond in graph.bonds() {
        let Some(target) = graph.get(&bond.target) else {
            violations.push(BondViolation::UnknownComponent {
                id: bond.target.clone(),
            });
            continue;
        };
        // Source always exists: bonds are declared on their source.
        let source = graph.get(&bond.source).expect("bond source declared");

        if registry.lookup(source.kind).is_err() || registry.lookup(target.kind).is_err() {
            // Already reported as UnregisteredKind above.
            continue;
        }

        if !table.permits(source.kind, bond.relation, target.kind) {
            violations.push(BondViolation::IncompatibleBond {
                source: bond.source.clone(),
                source_kind: source.kind,
                relation: bond.relation,
                target: bond.target.clone(),
                target_kind: target.kind,
            });
        }
    }

    violations.sort();
    violations.dedup();
    violations
}
