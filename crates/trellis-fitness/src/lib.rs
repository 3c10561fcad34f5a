//! Fitness Scorer — folds validator violations and scanner findings into a
//! single 0–100 stability score with a full penalty breakdown.
//!
//! `score` is pure and deterministic: identical inputs yield byte-identical
//! serialized output. The breakdown is retained alongside the scalar so a
//! gate rejection can always be explained, not just asserted.
//!
//! Penalty classes are capped individually (`class_cap`) so no single class
//! can drive the score below zero from the baseline on its own; the [0, 100]
//! floor and ceiling are enforced on the aggregate.

use serde::{Deserialize, Serialize};
use trellis_scanner::Finding;
use trellis_types::Severity;
use trellis_validator::BondViolation;

/// The score baseline for an empty, violation-free graph.
pub const BASELINE: u32 = 100;

/// Per-class penalty weights. Static configuration; illegal bonds weigh
/// heavier than arity overflows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub incompatible_bond: u32,
    pub arity: u32,
    pub unknown_component: u32,
    pub severity_low: u32,
    pub severity_medium: u32,
    pub severity_high: u32,
    /// Cumulative cap per penalty class.
    pub class_cap: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            incompatible_bond: 15,
            arity: 8,
            unknown_component: 15,
            severity_low: 2,
            severity_medium: 10,
            severity_high: 25,
            class_cap: 80,
        }
    }
}

impl ScoreWeights {
    fn for_violation(&self, violation: &BondViolation) -> (PenaltyClass, u32) {
        match violation {
            BondViolation::UnknownComponent { .. } | BondViolation::UnregisteredKind { .. } => {
                (PenaltyClass::UnknownComponent, self.unknown_component)
            }
            BondViolation::IncompatibleBond { .. } => {
                (PenaltyClass::IncompatibleBond, self.incompatible_bond)
            }
            BondViolation::ArityExceeded { .. } | BondViolation::ArityUnderflow { .. } => {
                (PenaltyClass::Arity, self.arity)
            }
        }
    }

    fn for_severity(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Low => self.severity_low,
            Severity::Medium => self.severity_medium,
            Severity::High => self.severity_high,
        }
    }
}

/// Classes of penalty, in breakdown order: structural classes first, then
/// anti-pattern findings.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum PenaltyClass {
    UnknownComponent,
    IncompatibleBond,
    Arity,
    AntiPattern,
}

/// One line of the score breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenaltyLine {
    pub class: PenaltyClass,
    pub detail: String,
    /// Points actually subtracted (after the class cap).
    pub points: u32,
    /// True if the class cap truncated this line.
    pub capped: bool,
}

/// A derived 0–100 stability score plus the penalties that produced it.
///
/// Never persisted as authoritative state — always recomputed from the
/// current declarations, bonds, and findings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitnessScore {
    pub value: u32,
    pub breakdown: Vec<PenaltyLine>,
}

impl FitnessScore {
    pub fn perfect() -> Self {
        Self {
            value: BASELINE,
            breakdown: Vec::new(),
        }
    }

    /// Total points subtracted across the breakdown.
    pub fn total_penalty(&self) -> u32 {
        self.breakdown.iter().map(|line| line.points).sum()
    }
}

/// Compute the fitness score for a candidate graph evaluation.
///
/// Starts at [`BASELINE`], subtracts a weighted penalty per violation and
/// per finding, caps each class at `weights.class_cap`, and clamps the
/// aggregate to `[0, 100]`.
pub fn score(
    violations: &[BondViolation],
    findings: &[Finding],
    weights: &ScoreWeights,
) -> FitnessScore {
    let mut breakdown: Vec<PenaltyLine> = Vec::new();
    let mut spent_per_class = std::collections::BTreeMap::<PenaltyClass, u32>::new();

    let mut charge = |class: PenaltyClass, detail: String, requested: u32| {
        let spent = spent_per_class.entry(class).or_insert(0);
        let available = weights.class_cap.saturating_sub(*spent);
        let points = requested.min(available);
        *spent += points;
        breakdown.push(PenaltyLine {
            class,
            detail,
            points,
            capped: points < requested,
        });
    };

    for violation in violations {
        let (class, requested) = weights.for_violation(violation);
        charge(class, violation.to_string(), requested);
    }

    for finding in findings {
        charge(
            PenaltyClass::AntiPattern,
            format!(
                "{} [{}] on {}: {}",
                finding.name, finding.severity, finding.component, finding.hint
            ),
            weights.for_severity(finding.severity),
        );
    }

    let total: u32 = breakdown.iter().map(|line| line.points).sum();
    FitnessScore {
        value: BASELINE.saturating_sub(total).min(BASELINE),
        breakdown,
    }
}
