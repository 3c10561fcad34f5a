use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;
use trellis_fitness::{score, FitnessScore};
use trellis_pipeline::{
    AuditLog, GateReport, MutationPipeline, MutationRecord, PipelineError, RejectionReason,
};
use trellis_scanner::{scan, Finding};
use trellis_types::{ComponentDeclaration, Generation, GraphSnapshot, Mutation, MutationOp};
use trellis_validator::{validate_graph, BondViolation};

use crate::config::Engine;

/// Exit codes consumed by external build systems.
pub const EXIT_OK: u8 = 0;
pub const EXIT_STRUCTURAL: u8 = 1;
pub const EXIT_SEVERITY: u8 = 2;
pub const EXIT_FITNESS: u8 = 3;
pub const EXIT_INPUT: u8 = 4;

/// A governed graph as produced by the scaffolding tool. Consumed, never
/// mutated in place.
#[derive(Debug, Serialize, Deserialize)]
pub struct GraphFile {
    pub components: Vec<ComponentDeclaration>,
}

/// A proposed change as submitted to `propose`. The base generation in the
/// file, when present, must agree with the command-line argument.
#[derive(Debug, Serialize, Deserialize)]
pub struct MutationFile {
    #[serde(default)]
    pub base_generation: Option<Generation>,
    pub ops: Vec<MutationOp>,
}

pub fn load_graph(path: &Path) -> Result<GraphSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading graph file {}", path.display()))?;
    let file: GraphFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing graph file {}", path.display()))?;
    let graph = GraphSnapshot::from_declarations(file.components)
        .with_context(|| format!("building graph from {}", path.display()))?;
    debug!(components = graph.len(), "graph loaded");
    Ok(graph)
}

pub fn load_mutation(path: &Path, base: Generation) -> Result<Mutation> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading mutation file {}", path.display()))?;
    let file: MutationFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing mutation file {}", path.display()))?;
    if let Some(declared) = file.base_generation {
        if declared != base {
            bail!(
                "mutation file declares base generation {declared}, command line says {base}"
            );
        }
    }
    Ok(Mutation::new(base, file.ops))
}

/// Structural validation report for `validate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<BondViolation>,
}

pub fn run_validate(engine: &Engine, graph: &GraphSnapshot, json: bool) -> u8 {
    let violations = validate_graph(graph, &engine.registry, &engine.table);
    let report = ValidationReport {
        valid: violations.is_empty(),
        violations,
    };
    if json {
        println!("{}", to_json(&report));
    } else if report.valid {
        println!("valid: {} components, no violations", graph.len());
    } else {
        println!("invalid: {} violation(s)", report.violations.len());
        for violation in &report.violations {
            println!("  - {violation}");
        }
    }
    if report.valid {
        EXIT_OK
    } else {
        EXIT_STRUCTURAL
    }
}

/// Score report for `score`: structural violations feed the score here so a
/// standalone evaluation still reflects them.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: FitnessScore,
    pub violations: Vec<BondViolation>,
    pub findings: Vec<Finding>,
}

pub fn run_score(engine: &Engine, graph: &GraphSnapshot, json: bool) -> u8 {
    let violations = validate_graph(graph, &engine.registry, &engine.table);
    let findings = scan(graph, &engine.catalog);
    let fitness = score(&violations, &findings, &engine.weights);
    let report = ScoreReport {
        score: fitness,
        violations,
        findings,
    };
    if json {
        println!("{}", to_json(&report));
    } else {
        println!("fitness: {}/100", report.score.value);
        for line in &report.score.breakdown {
            let capped = if line.capped { " (capped)" } else { "" };
            println!("  -{}{} {}", line.points, capped, line.detail);
        }
        if report.score.breakdown.is_empty() {
            println!("  no penalties");
        }
    }
    EXIT_OK
}

pub fn run_propose(
    engine: Engine,
    log: AuditLog,
    mutation: Mutation,
    json: bool,
) -> Result<u8, PipelineError> {
    let mut pipeline = MutationPipeline::from_log(
        engine.registry,
        engine.table,
        engine.catalog,
        engine.weights,
        engine.policy,
        log,
    )?;
    let report = pipeline.submit(mutation)?;
    if json {
        println!("{}", to_json(&report));
    } else {
        print!("{}", report.render());
    }
    Ok(exit_code_for(&report))
}

pub fn run_history(log: &AuditLog, since: Option<Generation>, json: bool) -> u8 {
    let records: Vec<&MutationRecord> = match since {
        Some(generation) => log.since(generation).collect(),
        None => log.records().iter().collect(),
    };
    if json {
        println!("{}", to_json(&records));
    } else if records.is_empty() {
        println!("no recorded mutations");
    } else {
        for record in records {
            let generation = match record.resulting_generation {
                Some(generation) => format!("-> {generation}"),
                None => "   ".into(),
            };
            let fitness = match &record.score {
                Some(score) => format!("fitness {}", score.value),
                None => "no score".into(),
            };
            let reason = match &record.reason {
                Some(reason) => format!(" ({reason})"),
                None => String::new(),
            };
            println!(
                "{} base {} {} {:?} {}{}",
                record.decided_at.format("%Y-%m-%dT%H:%M:%SZ"),
                record.base_generation,
                generation,
                record.outcome,
                fitness,
                reason
            );
        }
    }
    EXIT_OK
}

/// Map a pipeline verdict to the gate's exit-code contract.
pub fn exit_code_for(report: &GateReport) -> u8 {
    match &report.reason {
        None => EXIT_OK,
        Some(RejectionReason::Structural { .. }) => EXIT_STRUCTURAL,
        Some(RejectionReason::SeverityCeiling { .. }) => EXIT_SEVERITY,
        Some(RejectionReason::BelowFloor { .. }) | Some(RejectionReason::Regression { .. }) => {
            EXIT_FITNESS
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).expect("reports always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GovernanceConfig;
    use trellis_pipeline::GateDecision;
    use trellis_types::{ComponentKind, RelationKind};

    fn engine() -> Engine {
        GovernanceConfig::default().build().unwrap()
    }

    fn write_graph(dir: &Path, body: &str) -> std::path::PathBuf {
        let path = dir.join("graph.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn validate_maps_clean_graph_to_exit_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_graph(
            dir.path(),
            r#"{"components": [
                {"id": "adapter", "kind": "boundary-adapter",
                 "bonds": [{"target": "store", "relation": "adapts"}]},
                {"id": "store", "kind": "state-holder",
                 "bonds": [{"target": "snap", "relation": "produces"}]},
                {"id": "snap", "kind": "immutable-fact", "bonds": []}
            ]}"#,
        );
        let graph = load_graph(&path).unwrap();
        assert_eq!(run_validate(&engine(), &graph, false), EXIT_OK);
    }

    #[test]
    fn validate_maps_violations_to_exit_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_graph(
            dir.path(),
            r#"{"components": [
                {"id": "obs", "kind": "observer",
                 "bonds": [{"target": "gone", "relation": "observes"}]}
            ]}"#,
        );
        let graph = load_graph(&path).unwrap();
        assert_eq!(run_validate(&engine(), &graph, true), EXIT_STRUCTURAL);
    }

    #[test]
    fn malformed_graph_file_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_graph(dir.path(), "not json at all");
        assert!(load_graph(&path).is_err());
    }

    #[test]
    fn score_includes_structural_penalties() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_graph(
            dir.path(),
            r#"{"components": [
                {"id": "obs", "kind": "observer",
                 "bonds": [{"target": "fact", "relation": "observes"}]},
                {"id": "fact", "kind": "immutable-fact", "bonds": []}
            ]}"#,
        );
        let graph = load_graph(&path).unwrap();
        let e = engine();
        let violations = validate_graph(&graph, &e.registry, &e.table);
        assert!(!violations.is_empty());
        assert_eq!(run_score(&e, &graph, false), EXIT_OK);
    }

    #[test]
    fn mutation_file_base_generation_must_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mutation.json");
        fs::write(&path, r#"{"base_generation": 2, "ops": []}"#).unwrap();
        assert!(load_mutation(&path, Generation(1)).is_err());
        assert!(load_mutation(&path, Generation(2)).is_ok());
    }

    #[test]
    fn propose_accept_and_stale_paths() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("audit.jsonl");

        let mutation = Mutation::new(
            Generation::ZERO,
            vec![MutationOp::AddComponent {
                component: ComponentDeclaration::new("adapter", ComponentKind::BoundaryAdapter)
                    .with_bond("store", RelationKind::Adapts),
            },
            MutationOp::AddComponent {
                component: ComponentDeclaration::new("store", ComponentKind::StateHolder)
                    .with_bond("snap", RelationKind::Produces),
            },
            MutationOp::AddComponent {
                component: ComponentDeclaration::new("snap", ComponentKind::ImmutableFact),
            }],
        );

        let code = run_propose(
            engine(),
            AuditLog::open(&log_path).unwrap(),
            mutation.clone(),
            false,
        )
        .unwrap();
        assert_eq!(code, EXIT_OK);

        // Same base generation again: the log now carries generation 1.
        let result = run_propose(engine(), AuditLog::open(&log_path).unwrap(), mutation, true);
        assert!(matches!(result, Err(PipelineError::StaleGeneration { .. })));
    }

    #[test]
    fn exit_codes_cover_every_rejection_category() {
        let base = GateReport {
            decision: GateDecision::Rejected,
            base_generation: Generation::ZERO,
            resulting_generation: None,
            score: None,
            violations: vec![],
            findings: vec![],
            reason: None,
        };
        assert_eq!(exit_code_for(&base), EXIT_OK);

        let structural = GateReport {
            reason: Some(RejectionReason::Structural { violations: vec![] }),
            ..base.clone()
        };
        assert_eq!(exit_code_for(&structural), EXIT_STRUCTURAL);

        let severity = GateReport {
            reason: Some(RejectionReason::SeverityCeiling {
                ceiling: trellis_types::Severity::High,
                findings: vec![],
            }),
            ..base.clone()
        };
        assert_eq!(exit_code_for(&severity), EXIT_SEVERITY);

        let floor = GateReport {
            reason: Some(RejectionReason::BelowFloor {
                score: 10,
                floor: 60,
            }),
            ..base.clone()
        };
        assert_eq!(exit_code_for(&floor), EXIT_FITNESS);

        let regression = GateReport {
            reason: Some(RejectionReason::Regression {
                score: 80,
                previous: 100,
                tolerance: 5,
            }),
            ..base
        };
        assert_eq!(exit_code_for(&regression), EXIT_FITNESS);
    }

    #[test]
    fn history_renders_empty_log() {
        let log = AuditLog::in_memory();
        assert_eq!(run_history(&log, None, false), EXIT_OK);
        assert_eq!(run_history(&log, Some(Generation(3)), true), EXIT_OK);
    }
}
