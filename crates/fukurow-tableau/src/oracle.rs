//! 充足可能性オラクル
//!
//! The realization layer never decides satisfiability itself. It phrases each
//! question as a [`SatisfiabilityQuery`] and hands it to an [`Oracle`].

use crate::OracleError;
use fukurow_core::{AtomicConcept, AtomicRole, Individual, Role};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

/// Ground fact used in oracle queries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fact {
    Concept(AtomicConcept, Individual),
    Role(AtomicRole, Individual, Individual),
    Equality(Individual, Individual),
    Inequality(Individual, Individual),
}

/// Human-readable label of a reasoning task, used for progress reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskDescription {
    IsInstanceOf { concept: AtomicConcept, individual: Individual },
    IsRelationInstance { role: AtomicRole, subject: Individual, object: Individual },
    IsSameAs { first: Individual, second: Individual },
    Other(String),
}

impl std::fmt::Display for TaskDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskDescription::IsInstanceOf { concept, individual } => {
                write!(f, "is {} an instance of {}", individual, concept)
            }
            TaskDescription::IsRelationInstance { role, subject, object } => {
                write!(f, "is {} connected to {} via {}", subject, object, role)
            }
            TaskDescription::IsSameAs { first, second } => {
                write!(f, "is {} same as {}", first, second)
            }
            TaskDescription::Other(message) => write!(f, "{}", message),
        }
    }
}

/// Facts assumed true (`positive_facts`) and asserted false (`negative_facts`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatisfiabilityQuery {
    pub positive_facts: Vec<Fact>,
    pub negative_facts: Vec<Fact>,
    pub task: TaskDescription,
}

impl SatisfiabilityQuery {
    pub fn new(task: TaskDescription) -> Self {
        Self {
            positive_facts: Vec::new(),
            negative_facts: Vec::new(),
            task,
        }
    }

    pub fn with_positive(mut self, fact: Fact) -> Self {
        self.positive_facts.push(fact);
        self
    }

    pub fn with_negative(mut self, fact: Fact) -> Self {
        self.negative_facts.push(fact);
        self
    }
}

/// Decision procedure. A call may take worst-case exponential time.
pub trait Oracle {
    fn is_satisfiable(&mut self, query: &SatisfiabilityQuery) -> Result<bool, OracleError>;
}

impl<O: Oracle + ?Sized> Oracle for &mut O {
    fn is_satisfiable(&mut self, query: &SatisfiabilityQuery) -> Result<bool, OracleError> {
        (**self).is_satisfiable(query)
    }
}

impl<O: Oracle + ?Sized> Oracle for Box<O> {
    fn is_satisfiable(&mut self, query: &SatisfiabilityQuery) -> Result<bool, OracleError> {
        (**self).is_satisfiable(query)
    }
}

/// Entailment checks derived from satisfiability
pub trait OracleExt: Oracle {
    /// C(a) is entailed iff asserting ¬C(a) is unsatisfiable
    fn is_instance(&mut self, individual: &Individual, concept: &AtomicConcept) -> Result<bool, OracleError> {
        let query = SatisfiabilityQuery::new(TaskDescription::IsInstanceOf {
            concept: concept.clone(),
            individual: individual.clone(),
        })
        .with_negative(Fact::Concept(concept.clone(), individual.clone()));
        Ok(!self.is_satisfiable(&query)?)
    }

    /// r(a, b) is entailed iff asserting ¬r(a, b) is unsatisfiable.
    /// Inverse roles are swapped to their atomic form.
    fn is_relation_instance(&mut self, role: &Role, subject: &Individual, object: &Individual) -> Result<bool, OracleError> {
        let (atomic, subject, object) = match role {
            Role::Atomic(atomic) => (atomic, subject, object),
            Role::Inverse(atomic) => (atomic, object, subject),
        };
        let query = SatisfiabilityQuery::new(TaskDescription::IsRelationInstance {
            role: atomic.clone(),
            subject: subject.clone(),
            object: object.clone(),
        })
        .with_negative(Fact::Role(atomic.clone(), subject.clone(), object.clone()));
        Ok(!self.is_satisfiable(&query)?)
    }

    /// a = b is entailed iff assuming a ≠ b is unsatisfiable
    fn is_same(&mut self, first: &Individual, second: &Individual) -> Result<bool, OracleError> {
        let query = SatisfiabilityQuery::new(TaskDescription::IsSameAs {
            first: first.clone(),
            second: second.clone(),
        })
        .with_positive(Fact::Inequality(first.clone(), second.clone()));
        Ok(!self.is_satisfiable(&query)?)
    }
}

impl<O: Oracle + ?Sized> OracleExt for O {}

/// Reference oracle over an explicit set of entailed facts.
///
/// A query is unsatisfiable iff one of its negative facts is entailed, one of
/// its positive inequalities contradicts an entailed equality (or the other way
/// round), or the oracle has been put into the inconsistent state.
#[derive(Debug, Default)]
pub struct EntailmentOracle {
    entailed: HashSet<Fact>,
    failing: HashSet<Fact>,
    inconsistent: bool,
    calls: usize,
}

impl EntailmentOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facts<I: IntoIterator<Item = Fact>>(facts: I) -> Self {
        Self {
            entailed: facts.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn entail(&mut self, fact: Fact) {
        self.entailed.insert(fact);
    }

    /// Every query becomes unsatisfiable
    pub fn set_inconsistent(&mut self, inconsistent: bool) {
        self.inconsistent = inconsistent;
    }

    /// Queries mentioning `fact` fail with [`OracleError::DecisionFailed`]
    pub fn fail_on(&mut self, fact: Fact) {
        self.failing.insert(fact);
    }

    /// Number of `is_satisfiable` calls so far
    pub fn call_count(&self) -> usize {
        self.calls
    }

    pub fn reset_calls(&mut self) {
        self.calls = 0;
    }

    /// Whether `fact` follows from the entailed set
    pub fn entails(&self, fact: &Fact) -> bool {
        match fact {
            Fact::Equality(first, second) => self.equal(first, second),
            Fact::Inequality(first, second) => {
                self.entailed.contains(&Fact::Inequality(first.clone(), second.clone()))
                    || self.entailed.contains(&Fact::Inequality(second.clone(), first.clone()))
            }
            other => self.entailed.contains(other),
        }
    }

    /// Equality closed under reflexivity, symmetry and transitivity
    fn equal(&self, first: &Individual, second: &Individual) -> bool {
        if first == second {
            return true;
        }
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(first);
        queue.push_back(first);
        while let Some(current) = queue.pop_front() {
            for fact in &self.entailed {
                let next = match fact {
                    Fact::Equality(a, b) if a == current => b,
                    Fact::Equality(a, b) if b == current => a,
                    _ => continue,
                };
                if next == second {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }
}

impl Oracle for EntailmentOracle {
    fn is_satisfiable(&mut self, query: &SatisfiabilityQuery) -> Result<bool, OracleError> {
        self.calls += 1;
        debug!("oracle call #{}: {}", self.calls, query.task);

        if let Some(fact) = query
            .positive_facts
            .iter()
            .chain(query.negative_facts.iter())
            .find(|fact| self.failing.contains(*fact))
        {
            return Err(OracleError::DecisionFailed(format!("{:?}", fact)));
        }

        if self.inconsistent {
            return Ok(false);
        }
        if query.negative_facts.iter().any(|fact| self.entails(fact)) {
            return Ok(false);
        }
        for fact in &query.positive_facts {
            let contradicted = match fact {
                Fact::Inequality(first, second) => self.equal(first, second),
                Fact::Equality(first, second) => self.entails(&Fact::Inequality(first.clone(), second.clone())),
                _ => false,
            };
            if contradicted {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Individual {
        Individual::named("http://example.org/alice")
    }

    fn bob() -> Individual {
        Individual::named("http://example.org/bob")
    }

    #[test]
    fn test_is_instance() {
        let student = AtomicConcept::new("http://example.org/Student");
        let mut oracle = EntailmentOracle::with_facts([Fact::Concept(student.clone(), alice())]);

        assert!(oracle.is_instance(&alice(), &student).unwrap());
        assert!(!oracle.is_instance(&bob(), &student).unwrap());
        assert_eq!(oracle.call_count(), 2);
    }

    #[test]
    fn test_inverse_relation_is_swapped() {
        let parent = AtomicRole::new("http://example.org/hasParent");
        let mut oracle = EntailmentOracle::with_facts([Fact::Role(parent.clone(), alice(), bob())]);

        assert!(oracle.is_relation_instance(&Role::Atomic(parent.clone()), &alice(), &bob()).unwrap());
        assert!(oracle.is_relation_instance(&Role::Inverse(parent.clone()), &bob(), &alice()).unwrap());
        assert!(!oracle.is_relation_instance(&Role::Inverse(parent), &alice(), &bob()).unwrap());
    }

    #[test]
    fn test_same_as_uses_equality_closure() {
        let carol = Individual::named("http://example.org/carol");
        let mut oracle = EntailmentOracle::with_facts([
            Fact::Equality(alice(), bob()),
            Fact::Equality(carol.clone(), bob()),
        ]);

        assert!(oracle.is_same(&alice(), &carol).unwrap());
        assert!(!oracle.is_same(&alice(), &Individual::named("http://example.org/dave")).unwrap());
    }

    #[test]
    fn test_inconsistent_oracle() {
        let mut oracle = EntailmentOracle::new();
        oracle.set_inconsistent(true);
        assert!(oracle.is_instance(&alice(), &AtomicConcept::new("http://example.org/Any")).unwrap());
    }

    #[test]
    fn test_failure_is_reported() {
        let student = AtomicConcept::new("http://example.org/Student");
        let mut oracle = EntailmentOracle::new();
        oracle.fail_on(Fact::Concept(student.clone(), alice()));

        let result = oracle.is_instance(&alice(), &student);
        assert!(matches!(result, Err(OracleError::DecisionFailed(_))));
    }

    #[test]
    fn test_task_description_display() {
        let task = TaskDescription::IsSameAs { first: alice(), second: bob() };
        assert_eq!(task.to_string(), "is http://example.org/alice same as http://example.org/bob");
    }
}
