use std::fmt;

use serde::{Deserialize, Serialize};
use trellis_fitness::FitnessScore;
use trellis_scanner::Finding;
use trellis_types::{Generation, Severity};
use trellis_validator::BondViolation;

/// The gate's verdict on one submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GateDecision {
    Accepted,
    Rejected,
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GateDecision::Accepted => "Accepted",
            GateDecision::Rejected => "Rejected",
        })
    }
}

/// Why a mutation was rejected. Carried verbatim into the audit record and
/// the report — every rejection is reproducible from its reason alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "kebab-case")]
pub enum RejectionReason {
    /// The candidate graph is structurally illegal. No score was computed.
    Structural { violations: Vec<BondViolation> },
    /// A finding breached the configured severity ceiling.
    SeverityCeiling {
        ceiling: Severity,
        findings: Vec<Finding>,
    },
    /// The score fell below the absolute floor.
    BelowFloor { score: u32, floor: u32 },
    /// The score regressed beyond tolerance against the accepted generation.
    Regression {
        score: u32,
        previous: u32,
        tolerance: u32,
    },
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Structural { violations } => {
                write!(f, "structural violations ({})", violations.len())?;
                for violation in violations {
                    write!(f, "\n  - {violation}")?;
                }
                Ok(())
            }
            RejectionReason::SeverityCeiling { ceiling, findings } => {
                write!(f, "findings at or above the {ceiling} severity ceiling")?;
                for finding in findings {
                    write!(f, "\n  - {} [{}] on {}", finding.name, finding.severity, finding.component)?;
                }
                Ok(())
            }
            RejectionReason::BelowFloor { score, floor } => {
                write!(f, "fitness {score} below acceptance floor {floor}")
            }
            RejectionReason::Regression {
                score,
                previous,
                tolerance,
            } => write!(
                f,
                "fitness {score} regresses more than {tolerance} from accepted score {previous}"
            ),
        }
    }
}

/// Machine-readable evaluation report, rendered for CI by the gate adapter.
///
/// `score` is absent (not null-with-zero) when the mutation was rejected
/// structurally: a score computed on an illegal graph would be meaningless.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReport {
    pub decision: GateDecision,
    pub base_generation: Generation,
    /// Set only when the mutation was accepted.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resulting_generation: Option<Generation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<FitnessScore>,
    pub violations: Vec<BondViolation>,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<RejectionReason>,
}

impl GateReport {
    pub fn accepted(&self) -> bool {
        self.decision == GateDecision::Accepted
    }

    /// Human-readable rendering for CI logs.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("decision: {}\n", self.decision));
        out.push_str(&format!("base generation: {}\n", self.base_generation));
        if let Some(generation) = self.resulting_generation {
            out.push_str(&format!("new generation: {generation}\n"));
        }
        match &self.score {
            Some(score) => {
                out.push_str(&format!("fitness: {}/100\n", score.value));
                for line in &score.breakdown {
                    let capped = if line.capped { " (capped)" } else { "" };
                    out.push_str(&format!("  -{}{} {}\n", line.points, capped, line.detail));
                }
            }
            None => out.push_str("fitness: not computed (structurally illegal graph)\n"),
        }
        if !self.violations.is_empty() {
            out.push_str("violations:\n");
            for violation in &self.violations {
                out.push_str(&format!("  - {violation}\n"));
            }
        }
        if !self.findings.is_empty() {
            out.push_str("findings:\n");
            for finding in &self.findings {
                out.push_str(&format!(
                    "  - [{}] {} on {}: {}\n",
                    finding.severity, finding.name, finding.component, finding.hint
                ));
            }
        }
        if let Some(reason) = &self.reason {
            out.push_str(&format!("reason: {reason}\n"));
        }
        out
    }
}
