use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bond::Bond;
use crate::component::ComponentId;
use crate::graph::{ComponentDeclaration, GraphSnapshot};

/// Monotonically increasing version counter over the accepted mutation log.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    pub const ZERO: Generation = Generation(0);

    pub fn next(&self) -> Generation {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One operation inside a proposed mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum MutationOp {
    AddComponent { component: ComponentDeclaration },
    ModifyComponent { component: ComponentDeclaration },
    RemoveComponent { id: ComponentId },
    AddBond { bond: Bond },
    RemoveBond { bond: Bond },
}

/// A proposed transition of the governed graph from one generation to the
/// next. Submitted against a base generation; the pipeline rejects the whole
/// submission if the base is stale.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub base_generation: Generation,
    pub ops: Vec<MutationOp>,
}

impl Mutation {
    pub fn new(base_generation: Generation, ops: Vec<MutationOp>) -> Self {
        Self {
            base_generation,
            ops,
        }
    }
}

/// Structural failures while applying a mutation to a snapshot.
///
/// These are input errors, distinct from compatibility violations: the
/// mutation refers to components or bonds that do not line up with the
/// snapshot it claims to modify.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ApplyError {
    #[error("component already declared: {id}")]
    DuplicateComponent { id: ComponentId },

    #[error("component not declared: {id}")]
    MissingComponent { id: ComponentId },

    #[error("bond already present: {bond}")]
    DuplicateBond { bond: Bond },

    #[error("bond not present: {bond}")]
    MissingBond { bond: Bond },
}

impl GraphSnapshot {
    /// Apply a mutation to a copy of this snapshot.
    ///
    /// Pure: the receiver is untouched. Bond *targets* introduced by
    /// add/modify operations are not resolved here; dangling targets are the
    /// validator's concern, so that a single report can name all of them.
    pub fn apply(&self, mutation: &Mutation) -> Result<GraphSnapshot, ApplyError> {
        let mut next = self.clone();
        for op in &mutation.ops {
            match op {
                MutationOp::AddComponent { component } => {
                    if next.components.contains_key(&component.id) {
                        return Err(ApplyError::DuplicateComponent {
                            id: component.id.clone(),
                        });
                    }
                    next.components.insert(component.id.clone(), component.clone());
                }
                MutationOp::ModifyComponent { component } => {
                    if !next.components.contains_key(&component.id) {
                        return Err(ApplyError::MissingComponent {
                            id: component.id.clone(),
                        });
                    }
                    next.components.insert(component.id.clone(), component.clone());
                }
                MutationOp::RemoveComponent { id } => {
                    if next.components.remove(id).is_none() {
                        return Err(ApplyError::MissingComponent { id: id.clone() });
                    }
                }
                MutationOp::AddBond { bond } => {
                    let decl = next.components.get_mut(&bond.source).ok_or_else(|| {
                        ApplyError::MissingComponent {
                            id: bond.source.clone(),
                        }
                    })?;
                    let spec = bond.spec();
                    if decl.bonds.contains(&spec) {
                        return Err(ApplyError::DuplicateBond { bond: bond.clone() });
                    }
                    decl.bonds.push(spec);
                }
                MutationOp::RemoveBond { bond } => {
                    let decl = next.components.get_mut(&bond.source).ok_or_else(|| {
                        ApplyError::MissingComponent {
                            id: bond.source.clone(),
                        }
                    })?;
                    let spec = bond.spec();
                    let position = decl
                        .bonds
                        .iter()
                        .position(|existing| *existing == spec)
                        .ok_or_else(|| ApplyError::MissingBond { bond: bond.clone() })?;
                    decl.bonds.remove(position);
                }
            }
        }
        Ok(next)
    }
}
