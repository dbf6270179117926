//! スナップショット (JSON fixture)
//!
//! A snapshot carries everything one realization run needs: the vocabulary,
//! the classified subsumptions, the completed model the consistency check left
//! behind, and the facts the reference oracle entails.

use anyhow::{Context, Result};
use fukurow_core::{AtomicConcept, AtomicRole, DependencySet, Individual, Role};
use fukurow_dl::{InstanceManager, RealizationConfig, ToldAxioms};
use fukurow_tableau::{CompletionModel, EntailmentOracle, Fact, MarkerConcepts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub individuals: Vec<String>,
    pub concepts: Vec<String>,
    pub roles: Vec<String>,
    /// `[sub, sup]`
    pub concept_subsumptions: Vec<(String, String)>,
    /// `[sub, sup]`
    pub role_subsumptions: Vec<(String, String)>,
    pub concept_facts: Vec<ConceptFact>,
    pub role_facts: Vec<RoleFact>,
    pub merges: Vec<Merge>,
    pub entailed: Vec<EntailedFact>,
    pub inconsistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptFact {
    pub individual: String,
    pub concept: String,
    #[serde(default = "deterministic_by_default")]
    pub deterministic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleFact {
    pub subject: String,
    pub role: String,
    pub object: String,
    #[serde(default = "deterministic_by_default")]
    pub deterministic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Merge {
    pub from: String,
    pub into: String,
    #[serde(default = "deterministic_by_default")]
    pub deterministic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntailedFact {
    Concept { concept: String, individual: String },
    Role { role: String, subject: String, object: String },
    Same { first: String, second: String },
}

fn deterministic_by_default() -> bool {
    true
}

/// `_:id` is a blank node, anything else an IRI
pub fn parse_individual(value: &str) -> Individual {
    match value.strip_prefix("_:") {
        Some(id) => Individual::anonymous(id),
        None => Individual::named(value),
    }
}

fn dependencies(deterministic: bool, branch: usize) -> DependencySet {
    if deterministic {
        DependencySet::empty()
    } else {
        DependencySet::from_branches([branch as u32])
    }
}

impl Snapshot {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid snapshot")
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_str(&contents)
    }

    pub fn individual_set(&self) -> Vec<Individual> {
        let mut seen = BTreeSet::new();
        self.individuals
            .iter()
            .map(|value| parse_individual(value))
            .filter(|individual| seen.insert(individual.clone()))
            .collect()
    }

    pub fn told_axioms(&self) -> ToldAxioms {
        ToldAxioms {
            concepts: self.concepts.iter().map(AtomicConcept::new).collect(),
            roles: self.roles.iter().map(AtomicRole::new).collect(),
            concept_subsumptions: self
                .concept_subsumptions
                .iter()
                .map(|(sub, sup)| (AtomicConcept::new(sub), AtomicConcept::new(sup)))
                .collect(),
            role_subsumptions: self
                .role_subsumptions
                .iter()
                .map(|(sub, sup)| (Role::atomic(sub), Role::atomic(sup)))
                .collect(),
        }
    }

    /// Completed model: one named node per individual, then facts, then merges
    pub fn completion_model(&self) -> Result<CompletionModel> {
        let mut model = CompletionModel::new();
        for individual in self.individual_set() {
            model.add_individual(individual);
        }
        let node_of = |model: &CompletionModel, value: &str| {
            model
                .node_for_individual(&parse_individual(value))
                .with_context(|| format!("{} is not listed under individuals", value))
        };

        let mut branch = 0;
        for fact in &self.concept_facts {
            branch += 1;
            let node = node_of(&model, &fact.individual)?;
            model.add_concept_fact(AtomicConcept::new(&fact.concept), node, dependencies(fact.deterministic, branch))?;
        }
        for fact in &self.role_facts {
            branch += 1;
            let (from, to) = (node_of(&model, &fact.subject)?, node_of(&model, &fact.object)?);
            model.add_role_fact(AtomicRole::new(&fact.role), from, to, dependencies(fact.deterministic, branch))?;
        }
        for merge in &self.merges {
            branch += 1;
            let (from, into) = (node_of(&model, &merge.from)?, node_of(&model, &merge.into)?);
            model.merge(from, into, dependencies(merge.deterministic, branch))?;
        }
        Ok(model)
    }

    pub fn oracle(&self) -> EntailmentOracle {
        let mut oracle = EntailmentOracle::with_facts(self.entailed.iter().map(|fact| match fact {
            EntailedFact::Concept { concept, individual } => {
                Fact::Concept(AtomicConcept::new(concept), parse_individual(individual))
            }
            EntailedFact::Role { role, subject, object } => {
                Fact::Role(AtomicRole::new(role), parse_individual(subject), parse_individual(object))
            }
            EntailedFact::Same { first, second } => Fact::Equality(parse_individual(first), parse_individual(second)),
        }));
        oracle.set_inconsistent(self.inconsistent);
        oracle
    }

    /// Seeded manager over the snapshot's subsumptions, treated as classified
    pub fn load_manager(&self, config: RealizationConfig) -> Result<InstanceManager<EntailmentOracle>> {
        let told = self.told_axioms();
        let concepts = fukurow_dl::build_told_concept_hierarchy(&told);
        let roles = fukurow_dl::build_told_role_hierarchy(&told, config.uses_inverse_roles);
        let mut manager =
            InstanceManager::with_classified_hierarchies(self.oracle(), self.individual_set(), &concepts, &roles, config)?;

        if self.inconsistent {
            manager.set_inconsistent();
        } else {
            let model = self.completion_model()?;
            manager.initialize_known_and_possible_instances(&model, &MarkerConcepts::new(), &[])?;
        }
        info!(
            "Loaded snapshot: {} individuals, {} concepts, {} roles",
            self.individuals.len(),
            self.concepts.len(),
            self.roles.len()
        );
        Ok(manager)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "individuals": ["http://example.org/alice", "_:b0"],
        "concepts": ["http://example.org/Person"],
        "concept_facts": [
            {"individual": "http://example.org/alice", "concept": "http://example.org/Person", "deterministic": false}
        ],
        "entailed": [
            {"kind": "concept", "concept": "http://example.org/Person", "individual": "http://example.org/alice"}
        ]
    }"#;

    #[test]
    fn test_parse_individual() {
        assert!(parse_individual("_:b0").is_anonymous());
        assert_eq!(parse_individual("http://example.org/alice"), Individual::named("http://example.org/alice"));
    }

    #[test]
    fn test_defaults_and_model() {
        let snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        assert!(snapshot.merges.is_empty());
        assert!(!snapshot.inconsistent);

        let model = snapshot.completion_model().unwrap();
        assert_eq!(model.node_count(), 2);
        assert_eq!(model.binary_table().len(), 1);
    }

    #[test]
    fn test_unlisted_individual_rejected() {
        let snapshot = Snapshot::from_json_str(
            r#"{"concept_facts": [{"individual": "http://example.org/ghost", "concept": "http://example.org/A"}]}"#,
        )
        .unwrap();
        assert!(snapshot.completion_model().is_err());
    }

    #[test]
    fn test_load_manager_resolves_lazily() {
        let snapshot = Snapshot::from_json_str(SNAPSHOT).unwrap();
        let mut manager = snapshot.load_manager(RealizationConfig::default()).unwrap();
        let person = AtomicConcept::new("http://example.org/Person");
        let instances = manager.instances(&person, false).unwrap();
        assert_eq!(instances, BTreeSet::from([Individual::named("http://example.org/alice")]));
        assert_eq!(manager.oracle().call_count(), 1);
    }
}
