//! Anti-Pattern Scanner — matches component declarations and the bond graph
//! against a catalog of known-bad shapes.
//!
//! Rules are static configuration: loaded once at startup, immutable during
//! a run. Predicates are a closed serde-tagged enum rather than trait
//! objects, so a catalog can be written as plain JSON and checked
//! exhaustively.
//!
//! The scanner never short-circuits. Every rule is evaluated against the
//! full graph (some shapes, like "zero outbound bonds", only exist at whole-
//! graph scope) and the complete finding set is returned so the scorer can
//! weigh cumulative risk. Findings sort by severity descending, then
//! component id, then rule id — reports are reproducible by construction.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use trellis_types::{ComponentId, ComponentKind, GraphSnapshot, RelationKind, Severity};

/// A structural predicate over the candidate graph.
///
/// Each variant matches individual components; a finding is emitted per
/// matching component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "kebab-case")]
pub enum ShapePredicate {
    /// Component (optionally restricted to one kind) with zero outbound bonds.
    NoOutboundBonds { kind: Option<ComponentKind> },
    /// Component (optionally restricted to one kind) with zero inbound bonds.
    NoInboundBonds { kind: Option<ComponentKind> },
    /// Component with no bonds in either direction.
    Isolated,
    /// Component bonded to itself.
    SelfBond,
    /// Component (optionally restricted to one kind) with at least
    /// `threshold` inbound bonds.
    FanInAtLeast {
        kind: Option<ComponentKind>,
        threshold: u32,
    },
    /// Component participating in a directed cycle of one relation type.
    RelationCycle { relation: RelationKind },
}

impl ShapePredicate {
    /// Ids of all components matching this predicate, in id order.
    fn matches(&self, graph: &GraphSnapshot) -> Vec<ComponentId> {
        match self {
            ShapePredicate::NoOutboundBonds { kind } => graph
                .components
                .values()
                .filter(|decl| kind.map_or(true, |k| decl.kind == k))
                .filter(|decl| decl.bonds.is_empty())
                .map(|decl| decl.id.clone())
                .collect(),
            ShapePredicate::NoInboundBonds { kind } => graph
                .components
                .values()
                .filter(|decl| kind.map_or(true, |k| decl.kind == k))
                .filter(|decl| graph.inbound_count(&decl.id) == 0)
                .map(|decl| decl.id.clone())
                .collect(),
            ShapePredicate::Isolated => graph
                .components
                .values()
                .filter(|decl| decl.bonds.is_empty() && graph.inbound_count(&decl.id) == 0)
                .map(|decl| decl.id.clone())
                .collect(),
            ShapePredicate::SelfBond => graph
                .components
                .values()
                .filter(|decl| decl.bonds.iter().any(|spec| spec.target == decl.id))
                .map(|decl| decl.id.clone())
                .collect(),
            ShapePredicate::FanInAtLeast { kind, threshold } => graph
                .components
                .values()
                .filter(|decl| kind.map_or(true, |k| decl.kind == k))
                .filter(|decl| graph.inbound_count(&decl.id) >= *threshold)
                .map(|decl| decl.id.clone())
                .collect(),
            ShapePredicate::RelationCycle { relation } => {
                cycle_members(graph, *relation).into_iter().collect()
            }
        }
    }
}

/// All components sitting on a directed cycle restricted to one relation.
///
/// Classic color-marking DFS; a component is reported once however many
/// cycles it sits on.
fn cycle_members(graph: &GraphSnapshot, relation: RelationKind) -> BTreeSet<ComponentId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Grey,
        Black,
    }

    fn visit(
        graph: &GraphSnapshot,
        relation: RelationKind,
        id: &ComponentId,
        colors: &mut std::collections::BTreeMap<ComponentId, Color>,
        stack: &mut Vec<ComponentId>,
        members: &mut BTreeSet<ComponentId>,
    ) {
        colors.insert(id.clone(), Color::Grey);
        stack.push(id.clone());

        if let Some(decl) = graph.get(id) {
            for spec in decl.bonds.iter().filter(|s| s.relation == relation) {
                match colors.get(&spec.target).copied().unwrap_or(Color::White) {
                    Color::White if graph.contains(&spec.target) => {
                        visit(graph, relation, &spec.target, colors, stack, members);
                    }
                    Color::Grey => {
                        // Back edge: everything from the target up the stack
                        // is on the cycle.
                        let start = stack
                            .iter()
                            .position(|x| x == &spec.target)
                            .unwrap_or(0);
                        members.extend(stack[start..].iter().cloned());
                    }
                    _ => {}
                }
            }
        }

        stack.pop();
        colors.insert(id.clone(), Color::Black);
    }

    let mut colors = std::collections::BTreeMap::new();
    let mut members = BTreeSet::new();
    for id in graph.components.keys() {
        if colors.get(id).copied().unwrap_or(Color::White) == Color::White {
            visit(graph, relation, id, &mut colors, &mut Vec::new(), &mut members);
        }
    }
    members
}

/// A named anti-pattern: a predicate, a severity, and a remediation hint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiPatternRule {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub hint: String,
    pub predicate: ShapePredicate,
}

/// The rule catalog. Loaded once at startup, read-only during a run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RuleCatalog {
    pub rules: Vec<AntiPatternRule>,
}

impl RuleCatalog {
    pub fn new(rules: Vec<AntiPatternRule>) -> Self {
        Self { rules }
    }

    /// The built-in catalog.
    pub fn standard() -> Self {
        Self::new(vec![
            AntiPatternRule {
                id: "APR-001".into(),
                name: "orphaned-state-holder".into(),
                severity: Severity::Medium,
                hint: "a state holder nothing reads from is dead weight; bond a consumer or decommission it".into(),
                predicate: ShapePredicate::NoOutboundBonds {
                    kind: Some(ComponentKind::StateHolder),
                },
            },
            AntiPatternRule {
                id: "APR-002".into(),
                name: "isolated-component".into(),
                severity: Severity::Low,
                hint: "component has no bonds in either direction; wire it in or remove it".into(),
                predicate: ShapePredicate::Isolated,
            },
            AntiPatternRule {
                id: "APR-003".into(),
                name: "self-bond".into(),
                severity: Severity::Medium,
                hint: "a component bonded to itself hides a feedback loop; split the roles".into(),
                predicate: ShapePredicate::SelfBond,
            },
            AntiPatternRule {
                id: "APR-004".into(),
                name: "trigger-cycle".into(),
                severity: Severity::High,
                hint: "components triggering each other in a cycle will not terminate; break the cycle with a coordinator".into(),
                predicate: ShapePredicate::RelationCycle {
                    relation: RelationKind::Triggers,
                },
            },
            AntiPatternRule {
                id: "APR-005".into(),
                name: "overloaded-adapter".into(),
                severity: Severity::High,
                hint: "a boundary adapter with heavy fan-in is accreting state-holder duties; split it per boundary".into(),
                predicate: ShapePredicate::FanInAtLeast {
                    kind: Some(ComponentKind::BoundaryAdapter),
                    threshold: 3,
                },
            },
        ])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// One matched anti-pattern on one component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule: String,
    pub name: String,
    pub severity: Severity,
    pub component: ComponentId,
    pub hint: String,
}

/// Evaluate every catalog rule against the full graph.
///
/// Returns the complete finding set — severity descending, then component
/// id, then rule id.
pub fn scan(graph: &GraphSnapshot, catalog: &RuleCatalog) -> Vec<Finding> {
    let mut findings = Vec::new();
    for rule in &catalog.rules {
        for component in rule.predicate.matches(graph) {
            findings.push(Finding {
                rule: rule.id.clone(),
                name: rule.name.clone(),
                severity: rule.severity,
                component,
                hint: rule.hint.clone(),
            });
        }
    }
    findings.sort_by(|a, b| {
        (Reverse(a.severity), &a.component, &a.rule)
            .cmp(&(Reverse(b.severity), &b.component, &b.rule))
    });
    findings
}
