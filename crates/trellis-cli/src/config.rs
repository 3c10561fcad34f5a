use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use trellis_fitness::ScoreWeights;
use trellis_pipeline::AcceptancePolicy;
use trellis_scanner::{AntiPatternRule, RuleCatalog};
use trellis_taxonomy::TaxonomyRegistry;
use trellis_types::KindDefinition;
use trellis_validator::{CompatibilityRule, CompatibilityTable};

/// On-disk configuration for one governed graph. Every section is optional;
/// missing sections fall back to the built-in defaults, so an empty file (or
/// no file at all) yields the standard taxonomy, rule table, and thresholds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub kinds: Option<Vec<KindDefinition>>,
    pub compatibility: Option<Vec<CompatibilityRule>>,
    pub anti_patterns: Option<Vec<AntiPatternRule>>,
    pub weights: Option<ScoreWeights>,
    pub policy: Option<AcceptancePolicy>,
}

/// The assembled, immutable engine configuration.
pub struct Engine {
    pub registry: TaxonomyRegistry,
    pub table: CompatibilityTable,
    pub catalog: RuleCatalog,
    pub weights: ScoreWeights,
    pub policy: AcceptancePolicy,
}

impl GovernanceConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Assemble the engine. A malformed taxonomy (duplicate kind tags) is
    /// fatal here — the gate refuses to start.
    pub fn build(self) -> Result<Engine> {
        let registry = match self.kinds {
            Some(kinds) => TaxonomyRegistry::from_definitions(kinds)
                .context("invalid taxonomy configuration")?,
            None => TaxonomyRegistry::standard(),
        };
        let table = match self.compatibility {
            Some(rules) => CompatibilityTable::from_rules(rules),
            None => CompatibilityTable::standard(),
        };
        let catalog = match self.anti_patterns {
            Some(rules) => RuleCatalog::new(rules),
            None => RuleCatalog::standard(),
        };
        Ok(Engine {
            registry,
            table,
            catalog,
            weights: self.weights.unwrap_or_default(),
            policy: self.policy.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_types::{ComponentKind, Severity};

    #[test]
    fn empty_config_builds_the_standard_engine() {
        let engine = GovernanceConfig::default().build().unwrap();
        assert_eq!(engine.registry.len(), ComponentKind::ALL.len());
        assert!(!engine.table.is_empty());
        assert!(!engine.catalog.is_empty());
        assert_eq!(engine.policy, AcceptancePolicy::default());
    }

    #[test]
    fn sections_override_independently() {
        let config: GovernanceConfig = serde_json::from_str(
            r#"{"policy": {"floor": 90, "tolerance": 2, "severity_ceiling": "medium"}}"#,
        )
        .unwrap();
        let engine = config.build().unwrap();
        assert_eq!(engine.policy.floor, 90);
        assert_eq!(engine.policy.severity_ceiling, Some(Severity::Medium));
        // Untouched sections keep their defaults.
        assert_eq!(engine.registry.len(), ComponentKind::ALL.len());
    }

    #[test]
    fn duplicate_kind_in_config_is_fatal() {
        let config: GovernanceConfig = serde_json::from_str(
            r#"{"kinds": [
                {"kind": "router", "arity": {"inbound": {"min": 0, "max": null}, "outbound": {"min": 0, "max": null}}, "mutability": "stateless"},
                {"kind": "router", "arity": {"inbound": {"min": 0, "max": null}, "outbound": {"min": 0, "max": null}}, "mutability": "stateless"}
            ]}"#,
        )
        .unwrap();
        assert!(config.build().is_err());
    }
}
