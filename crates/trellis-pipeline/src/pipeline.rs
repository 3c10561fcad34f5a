use chrono::Utc;
use tracing::{debug, info, warn};
use trellis_fitness::{score, FitnessScore, ScoreWeights};
use trellis_scanner::{scan, Finding, RuleCatalog};
use trellis_taxonomy::TaxonomyRegistry;
use trellis_types::{Generation, GraphSnapshot, Mutation};
use trellis_validator::{validate_graph, CompatibilityTable};
use uuid::Uuid;

use crate::audit::{AuditLog, MutationRecord};
use crate::error::PipelineError;
use crate::policy::AcceptancePolicy;
use crate::report::{GateDecision, GateReport, RejectionReason};

/// The change-control pipeline for one governed graph.
///
/// Owns the authoritative sequence of accepted mutations; the current graph
/// is a derived view over that sequence. Single-writer semantics are
/// enforced by the base-generation check in [`submit`](Self::submit): of two
/// submissions against the same base, exactly one wins and the other gets
/// `StaleGeneration` with a clear resubmit contract.
pub struct MutationPipeline {
    registry: TaxonomyRegistry,
    table: CompatibilityTable,
    catalog: RuleCatalog,
    weights: ScoreWeights,
    policy: AcceptancePolicy,
    log: AuditLog,
    current: GraphSnapshot,
    generation: Generation,
    current_score: FitnessScore,
}

impl MutationPipeline {
    /// A pipeline at generation zero over an empty graph, with an in-memory
    /// audit log.
    pub fn new(
        registry: TaxonomyRegistry,
        table: CompatibilityTable,
        catalog: RuleCatalog,
        weights: ScoreWeights,
        policy: AcceptancePolicy,
    ) -> Self {
        Self {
            registry,
            table,
            catalog,
            weights,
            policy,
            log: AuditLog::in_memory(),
            current: GraphSnapshot::empty(),
            generation: Generation::ZERO,
            current_score: FitnessScore::perfect(),
        }
    }

    /// Reconstruct a pipeline from an existing audit log by folding its
    /// accepted records in generation order.
    pub fn from_log(
        registry: TaxonomyRegistry,
        table: CompatibilityTable,
        catalog: RuleCatalog,
        weights: ScoreWeights,
        policy: AcceptancePolicy,
        log: AuditLog,
    ) -> Result<Self, PipelineError> {
        let mut current = GraphSnapshot::empty();
        let mut generation = Generation::ZERO;

        for record in log.accepted() {
            current =
                current
                    .apply(&record.mutation)
                    .map_err(|source| PipelineError::Replay {
                        generation: record.base_generation,
                        source,
                    })?;
            generation = record
                .resulting_generation
                .unwrap_or_else(|| generation.next());
        }

        let findings = scan(&current, &catalog);
        let current_score = score(&[], &findings, &weights);

        info!(
            generation = %generation,
            components = current.len(),
            records = log.len(),
            "pipeline reconstructed from audit log"
        );

        Ok(Self {
            registry,
            table,
            catalog,
            weights,
            policy,
            log,
            current,
            generation,
            current_score,
        })
    }

    pub fn current_graph(&self) -> &GraphSnapshot {
        &self.current
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn current_score(&self) -> &FitnessScore {
        &self.current_score
    }

    pub fn history(&self) -> &[MutationRecord] {
        self.log.records()
    }

    pub fn history_since(&self, generation: Generation) -> Vec<&MutationRecord> {
        self.log.since(generation).collect()
    }

    /// Submit a mutation for adjudication.
    ///
    /// Proposed → Validating → Scored → Accepted | Rejected. A stale base
    /// generation or a malformed mutation errors out before anything is
    /// recorded; every decided mutation — accepted or rejected — lands in
    /// the audit log.
    pub fn submit(&mut self, mutation: Mutation) -> Result<GateReport, PipelineError> {
        info!(
            base = %mutation.base_generation,
            ops = mutation.ops.len(),
            "mutation proposed"
        );

        if mutation.base_generation != self.generation {
            warn!(
                submitted = %mutation.base_generation,
                current = %self.generation,
                "stale base generation"
            );
            return Err(PipelineError::StaleGeneration {
                submitted: mutation.base_generation,
                current: self.generation,
            });
        }

        // Validating: apply to a copy, never to the live graph.
        let candidate = self.current.apply(&mutation)?;
        let violations = validate_graph(&candidate, &self.registry, &self.table);
        if !violations.is_empty() {
            warn!(
                violations = violations.len(),
                "structurally illegal candidate; rejected without scoring"
            );
            let reason = RejectionReason::Structural {
                violations: violations.clone(),
            };
            return self.record_rejection(mutation, violations, Vec::new(), None, reason);
        }

        // Scored: scanner and scorer run on the structurally valid candidate.
        let findings = scan(&candidate, &self.catalog);
        let candidate_score = score(&violations, &findings, &self.weights);
        debug!(
            fitness = candidate_score.value,
            findings = findings.len(),
            "candidate scored"
        );

        if let Some(ceiling) = self.policy.severity_ceiling {
            let breaching: Vec<Finding> = findings
                .iter()
                .filter(|finding| finding.severity >= ceiling)
                .cloned()
                .collect();
            if !breaching.is_empty() {
                let reason = RejectionReason::SeverityCeiling {
                    ceiling,
                    findings: breaching,
                };
                return self.record_rejection(
                    mutation,
                    Vec::new(),
                    findings,
                    Some(candidate_score),
                    reason,
                );
            }
        }

        if candidate_score.value < self.policy.floor {
            let reason = RejectionReason::BelowFloor {
                score: candidate_score.value,
                floor: self.policy.floor,
            };
            return self.record_rejection(
                mutation,
                Vec::new(),
                findings,
                Some(candidate_score),
                reason,
            );
        }

        if candidate_score.value + self.policy.tolerance < self.current_score.value {
            let reason = RejectionReason::Regression {
                score: candidate_score.value,
                previous: self.current_score.value,
                tolerance: self.policy.tolerance,
            };
            return self.record_rejection(
                mutation,
                Vec::new(),
                findings,
                Some(candidate_score),
                reason,
            );
        }

        // Accepted: the candidate becomes the new current generation.
        let resulting = self.generation.next();
        let record = MutationRecord {
            record_id: Uuid::new_v4(),
            base_generation: mutation.base_generation,
            resulting_generation: Some(resulting),
            mutation,
            outcome: GateDecision::Accepted,
            reason: None,
            score: Some(candidate_score.clone()),
            decided_at: Utc::now(),
        };
        let base_generation = record.base_generation;
        self.log.append(record)?;

        self.current = candidate;
        self.generation = resulting;
        self.current_score = candidate_score.clone();

        info!(
            generation = %resulting,
            fitness = candidate_score.value,
            "mutation accepted"
        );

        Ok(GateReport {
            decision: GateDecision::Accepted,
            base_generation,
            resulting_generation: Some(resulting),
            score: Some(candidate_score),
            violations: Vec::new(),
            findings,
            reason: None,
        })
    }

    fn record_rejection(
        &mut self,
        mutation: Mutation,
        violations: Vec<trellis_validator::BondViolation>,
        findings: Vec<Finding>,
        candidate_score: Option<FitnessScore>,
        reason: RejectionReason,
    ) -> Result<GateReport, PipelineError> {
        let base_generation = mutation.base_generation;
        let record = MutationRecord {
            record_id: Uuid::new_v4(),
            base_generation,
            resulting_generation: None,
            mutation,
            outcome: GateDecision::Rejected,
            reason: Some(reason.clone()),
            score: candidate_score.clone(),
            decided_at: Utc::now(),
        };
        self.log.append(record)?;

        info!(base = %base_generation, %reason, "mutation rejected");

        Ok(GateReport {
            decision: GateDecision::Rejected,
            base_generation,
            resulting_generation: None,
            score: candidate_score,
            violations,
            findings,
            reason: Some(reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::{
        Bond, ComponentDeclaration, ComponentKind, MutationOp, RelationKind, Severity,
    };

    fn pipeline() -> MutationPipeline {
        MutationPipeline::new(
            TaxonomyRegistry::standard(),
            CompatibilityTable::standard(),
            RuleCatalog::standard(),
            ScoreWeights::default(),
            AcceptancePolicy::default(),
        )
    }

    fn adapter_store_mutation(base: Generation) -> Mutation {
        Mutation::new(
            base,
            vec![
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("adapter", ComponentKind::BoundaryAdapter)
                        .with_bond("store", RelationKind::Adapts),
                },
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("store", ComponentKind::StateHolder)
                        .with_bond("snapshot", RelationKind::Produces),
                },
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("snapshot", ComponentKind::ImmutableFact),
                },
            ],
        )
    }

    #[test]
    fn adapter_bonded_to_store_is_accepted_at_full_fitness() {
        let mut pipeline = pipeline();
        let report = pipeline
            .submit(adapter_store_mutation(Generation::ZERO))
            .unwrap();

        assert!(report.accepted());
        assert_eq!(report.score.as_ref().unwrap().value, 100);
        assert_eq!(pipeline.generation(), Generation(1));
        assert_eq!(pipeline.current_graph().len(), 3);
    }

    #[test]
    fn incompatible_bond_rejects_without_a_score() {
        let mut pipeline = pipeline();
        // observer observing an immutable fact has no rule-table entry.
        let mutation = Mutation::new(
            Generation::ZERO,
            vec![
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("obs", ComponentKind::Observer)
                        .with_bond("fact", RelationKind::Observes),
                },
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("fact", ComponentKind::ImmutableFact),
                },
            ],
        );
        let report = pipeline.submit(mutation).unwrap();

        assert!(!report.accepted());
        assert_eq!(report.score, None);
        assert!(matches!(
            report.reason,
            Some(RejectionReason::Structural { .. })
        ));
        // Rejection recorded, graph unchanged.
        assert_eq!(pipeline.history().len(), 1);
        assert_eq!(pipeline.generation(), Generation::ZERO);
        assert!(pipeline.current_graph().is_empty());
    }

    #[test]
    fn arity_overflow_rejects_regardless_of_score() {
        let mut pipeline = pipeline();
        pipeline
            .submit(adapter_store_mutation(Generation::ZERO))
            .unwrap();

        // A second adapter adapting the same store overflows inbound 0..1.
        let mutation = Mutation::new(
            Generation(1),
            vec![
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("adapter2", ComponentKind::BoundaryAdapter),
                },
                MutationOp::AddBond {
                    bond: Bond::new("adapter2", RelationKind::Adapts, "store"),
                },
            ],
        );
        let report = pipeline.submit(mutation).unwrap();

        assert!(!report.accepted());
        assert_eq!(report.score, None);
        let Some(RejectionReason::Structural { violations }) = &report.reason else {
            panic!("expected structural rejection");
        };
        assert!(violations
            .iter()
            .any(|v| matches!(v, trellis_validator::BondViolation::ArityExceeded { .. })));
    }

    #[test]
    fn stale_base_generation_is_an_error_not_a_record() {
        let mut pipeline = pipeline();
        pipeline
            .submit(adapter_store_mutation(Generation::ZERO))
            .unwrap();
        let records_before = pipeline.history().len();

        // Second submission against the already-consumed base.
        let result = pipeline.submit(adapter_store_mutation(Generation::ZERO));
        match result {
            Err(PipelineError::StaleGeneration { submitted, current }) => {
                assert_eq!(submitted, Generation::ZERO);
                assert_eq!(current, Generation(1));
            }
            other => panic!("expected stale generation, got {other:?}"),
        }
        assert_eq!(pipeline.history().len(), records_before);
    }

    #[test]
    fn exactly_one_of_two_same_base_submissions_wins() {
        let mut pipeline = pipeline();
        let first = pipeline.submit(adapter_store_mutation(Generation::ZERO));
        let second = pipeline.submit(adapter_store_mutation(Generation::ZERO));

        assert!(first.unwrap().accepted());
        assert!(matches!(
            second,
            Err(PipelineError::StaleGeneration { .. })
        ));
        assert_eq!(pipeline.generation(), Generation(1));
    }

    #[test]
    fn orphaned_state_holder_costs_ten_but_clears_default_floor() {
        let mut pipeline = pipeline();
        // A store that produces nothing: orphaned-state-holder (medium).
        let mutation = Mutation::new(
            Generation::ZERO,
            vec![
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("adapter", ComponentKind::BoundaryAdapter)
                        .with_bond("store", RelationKind::Adapts),
                },
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("store", ComponentKind::StateHolder),
                },
            ],
        );
        let report = pipeline.submit(mutation).unwrap();

        assert!(report.accepted());
        assert_eq!(report.score.as_ref().unwrap().value, 90);
        assert!(report
            .findings
            .iter()
            .any(|f| f.name == "orphaned-state-holder"));
    }

    #[test]
    fn orphaned_state_holder_rejected_under_a_strict_floor() {
        let mut pipeline = MutationPipeline::new(
            TaxonomyRegistry::standard(),
            CompatibilityTable::standard(),
            RuleCatalog::standard(),
            ScoreWeights::default(),
            AcceptancePolicy {
                floor: 95,
                tolerance: 100,
                severity_ceiling: None,
            },
        );
        let mutation = Mutation::new(
            Generation::ZERO,
            vec![
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("adapter", ComponentKind::BoundaryAdapter)
                        .with_bond("store", RelationKind::Adapts),
                },
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("store", ComponentKind::StateHolder),
                },
            ],
        );
        let report = pipeline.submit(mutation).unwrap();

        assert!(!report.accepted());
        let Some(RejectionReason::BelowFloor { score, floor }) = report.reason else {
            panic!("expected below-floor rejection");
        };
        assert_eq!(score, 90);
        assert_eq!(floor, 95);
        // The finding is named in the report.
        assert!(report
            .findings
            .iter()
            .any(|f| f.name == "orphaned-state-holder"));
    }

    #[test]
    fn high_severity_finding_breaches_the_ceiling() {
        let mut pipeline = pipeline();
        // A trigger cycle: structurally legal, but APR-004 is high severity.
        let mutation = Mutation::new(
            Generation::ZERO,
            vec![
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("a", ComponentKind::PureTransform)
                        .with_bond("b", RelationKind::Triggers),
                },
                MutationOp::AddComponent {
                    component: ComponentDeclaration::new("b", ComponentKind::PureTransform)
                        .with_bond("a", RelationKind::Triggers),
                },
            ],
        );
        let report = pipeline.submit(mutation).unwrap();

        assert!(!report.accepted());
        let Some(RejectionReason::SeverityCeiling { ceiling, findings }) = &report.reason else {
            panic!("expected severity-ceiling rejection");
        };
        assert_eq!(*ceiling, Severity::High);
        assert!(findings.iter().all(|f| f.severity >= Severity::High));
        // Score was computed (the graph is legal) and retained for context.
        assert!(report.score.is_some());
    }

    #[test]
    fn regression_beyond_tolerance_is_rejected() {
        let mut pipeline = MutationPipeline::new(
            TaxonomyRegistry::standard(),
            CompatibilityTable::standard(),
            RuleCatalog::standard(),
            ScoreWeights::default(),
            AcceptancePolicy {
                floor: 0,
                tolerance: 5,
                severity_ceiling: None,
            },
        );
        pipeline
            .submit(adapter_store_mutation(Generation::ZERO))
            .unwrap();
        assert_eq!(pipeline.current_score().value, 100);

        // Stranding the store (removing its produced fact and the bond)
        // drops the score by 10 — more than the tolerance of 5.
        let mutation = Mutation::new(
            Generation(1),
            vec![
                MutationOp::RemoveBond {
                    bond: Bond::new("store", RelationKind::Produces, "snapshot"),
                },
                MutationOp::RemoveComponent {
                    id: "snapshot".into(),
                },
            ],
        );
        let report = pipeline.submit(mutation).unwrap();

        assert!(!report.accepted());
        assert!(matches!(
            report.reason,
            Some(RejectionReason::Regression {
                score: 90,
                previous: 100,
                tolerance: 5,
            })
        ));
        assert_eq!(pipeline.generation(), Generation(1));
    }

    #[test]
    fn replaying_the_log_reconstructs_the_live_graph() {
        let mut pipeline = pipeline();
        pipeline
            .submit(adapter_store_mutation(Generation::ZERO))
            .unwrap();
        pipeline
            .submit(Mutation::new(
                Generation(1),
                vec![MutationOp::AddComponent {
                    component: ComponentDeclaration::new("obs", ComponentKind::Observer)
                        .with_bond("store", RelationKind::Observes),
                }],
            ))
            .unwrap();
        // One rejected mutation in between must not affect replay.
        let _ = pipeline
            .submit(Mutation::new(
                Generation(2),
                vec![MutationOp::AddComponent {
                    component: ComponentDeclaration::new("bad", ComponentKind::Observer)
                        .with_bond("snapshot", RelationKind::Observes),
                }],
            ))
            .unwrap();

        let mut replayed = GraphSnapshot::empty();
        for record in pipeline.history().iter().filter(|r| r.accepted()) {
            replayed = replayed.apply(&record.mutation).unwrap();
        }
        assert_eq!(&replayed, pipeline.current_graph());
        assert_eq!(pipeline.generation(), Generation(2));
    }

    #[test]
    fn malformed_mutation_is_an_input_error() {
        let mut pipeline = pipeline();
        let mutation = Mutation::new(
            Generation::ZERO,
            vec![MutationOp::RemoveComponent { id: "ghost".into() }],
        );
        assert!(matches!(
            pipeline.submit(mutation),
            Err(PipelineError::Apply(_))
        ));
        assert!(pipeline.history().is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn lenient_pipeline() -> MutationPipeline {
            MutationPipeline::new(
                TaxonomyRegistry::standard(),
                CompatibilityTable::standard(),
                RuleCatalog::standard(),
                ScoreWeights::default(),
                AcceptancePolicy {
                    floor: 0,
                    tolerance: 100,
                    severity_ceiling: None,
                },
            )
        }

        proptest! {
            /// Folding the accepted records from generation zero always
            /// reproduces the live graph, whatever the submission history.
            #[test]
            fn log_and_state_stay_equivalent(
                steps in proptest::collection::vec((any::<bool>(), 0usize..5), 0..20)
            ) {
                let names = ["alpha", "beta", "gamma", "delta", "epsilon"];
                let mut pipeline = lenient_pipeline();

                for (is_add, index) in steps {
                    let op = if is_add {
                        MutationOp::AddComponent {
                            component: ComponentDeclaration::new(
                                names[index],
                                ComponentKind::Router,
                            ),
                        }
                    } else {
                        MutationOp::RemoveComponent {
                            id: names[index].into(),
                        }
                    };
                    let mutation = Mutation::new(pipeline.generation(), vec![op]);
                    // Duplicate adds and missing removes error out before
                    // anything is recorded; that is part of the property.
                    let _ = pipeline.submit(mutation);
                }

                let mut replayed = GraphSnapshot::empty();
                let mut accepted = 0u64;
                for record in pipeline.history().iter().filter(|r| r.accepted()) {
                    replayed = replayed.apply(&record.mutation).unwrap();
                    accepted += 1;
                }
                prop_assert_eq!(&replayed, pipeline.current_graph());
                prop_assert_eq!(pipeline.generation(), Generation(accepted));
            }
        }
    }
}
