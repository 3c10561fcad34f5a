use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a component declaration, unique within a governed graph.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ComponentId {}

impl From<&str> for ComponentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The closed taxonomy of structural roles a component can play.
///
/// Every declared component resolves to exactly one kind. The set is closed:
/// new roles require a new engine release, not configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// Owns mutable state; other components read through or write into it.
    StateHolder,
    /// Stateless input-to-output computation.
    PureTransform,
    /// Edge of the governed system; translates between inside and outside.
    BoundaryAdapter,
    /// A produced value that never changes after creation.
    ImmutableFact,
    /// Drives multi-step flows across other components.
    ProcessCoordinator,
    /// Directs traffic between components without transforming it.
    Router,
    /// Watches other components without participating in their flow.
    Observer,
}

impl ComponentKind {
    /// The complete closed set, for exhaustive iteration.
    pub const ALL: [ComponentKind; 7] = [
        ComponentKind::StateHolder,
        ComponentKind::PureTransform,
        ComponentKind::BoundaryAdapter,
        ComponentKind::ImmutableFact,
        ComponentKind::ProcessCoordinator,
        ComponentKind::Router,
        ComponentKind::Observer,
    ];

    /// The kebab-case tag used in declaration files and reports.
    pub fn tag(&self) -> &'static str {
        match self {
            ComponentKind::StateHolder => "state-holder",
            ComponentKind::PureTransform => "pure-transform",
            ComponentKind::BoundaryAdapter => "boundary-adapter",
            ComponentKind::ImmutableFact => "immutable-fact",
            ComponentKind::ProcessCoordinator => "process-coordinator",
            ComponentKind::Router => "router",
            ComponentKind::Observer => "observer",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Whether instances of a kind hold mutable state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mutability {
    Stateful,
    Stateless,
}

/// Inclusive bound on how many bonds a component may carry in one direction.
///
/// `max: None` means unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArityBounds {
    pub min: u32,
    pub max: Option<u32>,
}

impl ArityBounds {
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Does a realized bond count satisfy both bounds?
    pub fn admits(&self, count: u32) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    /// Would one more bond overflow the max bound?
    pub fn exceeded_by(&self, count: u32) -> bool {
        self.max.is_some_and(|max| count > max)
    }
}

impl fmt::Display for ArityBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}

/// Structural contract of a kind: how many inbound and outbound bonds an
/// instance may carry. Immutable once the kind is registered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArityContract {
    pub inbound: ArityBounds,
    pub outbound: ArityBounds,
}

impl ArityContract {
    pub const fn new(inbound: ArityBounds, outbound: ArityBounds) -> Self {
        Self { inbound, outbound }
    }
}

/// A registered kind with its structural contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDefinition {
    pub kind: ComponentKind,
    pub arity: ArityContract,
    pub mutability: Mutability,
}

/// Severity of an anti-pattern finding.
///
/// Ordered ascending so `Reverse(severity)` sorts reports severity-first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(tag)
    }
}
