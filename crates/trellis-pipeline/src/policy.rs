use serde::{Deserialize, Serialize};
use trellis_types::Severity;

/// Acceptance thresholds for the gate.
///
/// Static configuration: loaded once, never adapted at runtime. A candidate
/// is accepted only if its score clears `floor`, does not fall more than
/// `tolerance` below the current accepted generation's score, and carries no
/// finding at or above `severity_ceiling`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptancePolicy {
    /// Absolute minimum score.
    pub floor: u32,
    /// Largest allowed drop relative to the current generation's score.
    pub tolerance: u32,
    /// Findings at or above this severity reject outright. `None` disables
    /// the ceiling; severity then only weighs into the score.
    pub severity_ceiling: Option<Severity>,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            floor: 60,
            tolerance: 15,
            severity_ceiling: Some(Severity::High),
        }
    }
}
