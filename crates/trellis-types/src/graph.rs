use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bond::{Bond, BondSpec};
use crate::component::{ComponentId, ComponentKind};
use crate::mutation::ApplyError;

/// A named component instance inside a governed graph.
///
/// The `bonds` list holds the declaration's outbound edges; inbound edges are
/// derived by scanning the other declarations in the snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDeclaration {
    pub id: ComponentId,
    pub kind: ComponentKind,
    #[serde(default)]
    pub bonds: Vec<BondSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl ComponentDeclaration {
    pub fn new(id: impl Into<ComponentId>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            kind,
            bonds: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_bond(mut self, target: impl Into<ComponentId>, relation: crate::RelationKind) -> Self {
        self.bonds.push(BondSpec {
            target: target.into(),
            relation,
        });
        self
    }

    /// Fully-qualified outbound bonds of this declaration.
    pub fn outbound(&self) -> impl Iterator<Item = Bond> + '_ {
        self.bonds.iter().map(|spec| Bond {
            source: self.id.clone(),
            relation: spec.relation,
            target: spec.target.clone(),
        })
    }
}

/// An immutable snapshot of a governed component graph.
///
/// The authoritative graph is always derived by folding accepted mutations in
/// generation order; a snapshot is never mutated in place by the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub components: BTreeMap<ComponentId, ComponentDeclaration>,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a declaration list, rejecting duplicate ids.
    pub fn from_declarations(
        declarations: Vec<ComponentDeclaration>,
    ) -> Result<Self, ApplyError> {
        let mut components = BTreeMap::new();
        for decl in declarations {
            if components.contains_key(&decl.id) {
                return Err(ApplyError::DuplicateComponent { id: decl.id });
            }
            components.insert(decl.id.clone(), decl);
        }
        Ok(Self { components })
    }

    pub fn get(&self, id: &ComponentId) -> Option<&ComponentDeclaration> {
        self.components.get(id)
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.components.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// All bonds in the snapshot, in (source, relation, target) order.
    pub fn bonds(&self) -> impl Iterator<Item = Bond> + '_ {
        self.components.values().flat_map(|decl| decl.outbound())
    }

    /// Realized outbound bond count for a component.
    pub fn outbound_count(&self, id: &ComponentId) -> u32 {
        self.get(id).map_or(0, |decl| decl.bonds.len() as u32)
    }

    /// Realized inbound bond count for a component.
    pub fn inbound_count(&self, id: &ComponentId) -> u32 {
        self.components
            .values()
            .flat_map(|decl| decl.bonds.iter())
            .filter(|spec| spec.target == *id)
            .count() as u32
    }
}
