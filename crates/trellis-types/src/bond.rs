use std::fmt;

use serde::{Deserialize, Serialize};

use crate::component::ComponentId;

/// The closed vocabulary of relationship types between components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Source causes target to run.
    Triggers,
    /// Source watches target without affecting it.
    Observes,
    /// Source translates for target across a boundary.
    Adapts,
    /// Source emits target as output.
    Produces,
}

impl RelationKind {
    /// The complete closed set, for exhaustive iteration.
    pub const ALL: [RelationKind; 4] = [
        RelationKind::Triggers,
        RelationKind::Observes,
        RelationKind::Adapts,
        RelationKind::Produces,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            RelationKind::Triggers => "triggers",
            RelationKind::Observes => "observes",
            RelationKind::Adapts => "adapts",
            RelationKind::Produces => "produces",
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An outbound edge as written inside a component declaration.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BondSpec {
    pub target: ComponentId,
    pub relation: RelationKind,
}

impl BondSpec {
    pub fn new(target: impl Into<ComponentId>, relation: RelationKind) -> Self {
        Self {
            target: target.into(),
            relation,
        }
    }
}

/// A fully-qualified directed, typed relationship between two declarations.
///
/// Legal only if the compatibility table carries an entry for
/// (source kind, relation, target kind) and neither endpoint's arity
/// contract is violated by the resulting bond counts.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bond {
    pub source: ComponentId,
    pub relation: RelationKind,
    pub target: ComponentId,
}

impl Bond {
    pub fn new(
        source: impl Into<ComponentId>,
        relation: RelationKind,
        target: impl Into<ComponentId>,
    ) -> Self {
        Self {
            source: source.into(),
            relation,
            target: target.into(),
        }
    }

    pub fn spec(&self) -> BondSpec {
        BondSpec {
            target: self.target.clone(),
            relation: self.relation,
        }
    }
}

impl fmt::Display for Bond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.source, self.relation, self.target)
    }
}
