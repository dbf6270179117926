//! sameAs 同値類 (identity partition)
//!
//! Individuals merged deterministically in the completed model share a class
//! from the start. Merges that depended on a branch only leave a "possible"
//! edge between two classes; each edge is settled by one oracle call the
//! first time a query touches one of its endpoints.

use crate::instance_manager::InstanceManager;
use crate::RealizationError;
use fukurow_core::Individual;
use fukurow_tableau::{Oracle, OracleExt};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Handle of an equivalence class inside an [`IdentityPartition`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u32);

/// Partition of individuals into sameAs classes, plus unresolved
/// "possibly the same" edges between classes
#[derive(Debug, Clone, Default)]
pub struct IdentityPartition {
    members: HashMap<ClassId, BTreeSet<Individual>>,
    class_of: HashMap<Individual, ClassId>,
    possible: HashMap<ClassId, BTreeSet<ClassId>>,
    next_id: u32,
}

impl IdentityPartition {
    /// Every individual starts in its own singleton class
    pub fn new<I: IntoIterator<Item = Individual>>(individuals: I) -> Self {
        let mut partition = Self::default();
        for individual in individuals {
            partition.insert(individual);
        }
        partition
    }

    /// Class of `individual`, creating a singleton if it is new
    pub fn insert(&mut self, individual: Individual) -> ClassId {
        if let Some(class) = self.class_of.get(&individual) {
            return *class;
        }
        let class = ClassId(self.next_id);
        self.next_id += 1;
        self.class_of.insert(individual.clone(), class);
        self.members.insert(class, BTreeSet::from([individual]));
        class
    }

    pub fn class_of(&self, individual: &Individual) -> Option<ClassId> {
        self.class_of.get(individual).copied()
    }

    pub fn members(&self, class: ClassId) -> Option<&BTreeSet<Individual>> {
        self.members.get(&class)
    }

    /// Smallest member, used when asking the oracle about the class
    pub fn representative(&self, class: ClassId) -> Option<&Individual> {
        self.members.get(&class).and_then(|members| members.iter().next())
    }

    pub fn class_count(&self) -> usize {
        self.members.len()
    }

    pub fn classes(&self) -> impl Iterator<Item = &BTreeSet<Individual>> {
        self.members.values()
    }

    /// Merge `other` into `survivor`. Possible edges of `other` are
    /// redirected to `survivor`; an edge between the two disappears.
    pub fn union(&mut self, survivor: ClassId, other: ClassId) -> ClassId {
        if survivor == other {
            return survivor;
        }
        let moved = self.members.remove(&other).unwrap_or_default();
        for individual in &moved {
            self.class_of.insert(individual.clone(), survivor);
        }
        self.members.entry(survivor).or_default().extend(moved);

        let redirected = self.possible.remove(&other).unwrap_or_default();
        for neighbour in redirected {
            self.detach(neighbour, other);
            if neighbour != survivor {
                self.possible.entry(neighbour).or_default().insert(survivor);
                self.possible.entry(survivor).or_default().insert(neighbour);
            }
        }
        self.detach(survivor, other);
        survivor
    }

    /// Record that two classes might denote the same individual
    pub fn add_possible(&mut self, first: ClassId, second: ClassId) {
        if first == second {
            return;
        }
        self.possible.entry(first).or_default().insert(second);
        self.possible.entry(second).or_default().insert(first);
    }

    pub fn remove_possible(&mut self, first: ClassId, second: ClassId) {
        self.detach(first, second);
        self.detach(second, first);
    }

    pub fn is_possibly_same(&self, first: ClassId, second: ClassId) -> bool {
        self.possible
            .get(&first)
            .map_or(false, |neighbours| neighbours.contains(&second))
    }

    /// Some unresolved neighbour of `class`
    pub fn next_pending(&self, class: ClassId) -> Option<ClassId> {
        self.possible
            .get(&class)
            .and_then(|neighbours| neighbours.iter().next().copied())
    }

    /// Some class that still has an unresolved edge
    pub fn any_pending(&self) -> Option<ClassId> {
        self.possible
            .iter()
            .filter(|(_, neighbours)| !neighbours.is_empty())
            .map(|(class, _)| *class)
            .min()
    }

    pub fn has_pending(&self) -> bool {
        self.any_pending().is_some()
    }

    fn detach(&mut self, class: ClassId, neighbour: ClassId) {
        if let Some(neighbours) = self.possible.get_mut(&class) {
            neighbours.remove(&neighbour);
            if neighbours.is_empty() {
                self.possible.remove(&class);
            }
        }
    }
}

impl<O: Oracle> InstanceManager<O> {
    /// Every relevant individual known to denote the same element as `individual`
    pub fn same_as_individuals(&mut self, individual: &Individual) -> Result<BTreeSet<Individual>, RealizationError> {
        if self.flags.inconsistent {
            return Ok(self.relevant_individuals());
        }
        self.ensure_seeded("same_as_individuals")?;

        let Some(class) = self.resolve_identity(individual)? else {
            let mut alone = BTreeSet::new();
            if self.is_result_relevant(individual) {
                alone.insert(individual.clone());
            }
            return Ok(alone);
        };
        Ok(self
            .identities
            .members(class)
            .map(|members| {
                members
                    .iter()
                    .filter(|member| self.is_result_relevant(member))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Whether `first` and `second` are entailed to be the same individual
    pub fn is_same_individual(&mut self, first: &Individual, second: &Individual) -> Result<bool, RealizationError> {
        if first == second || self.flags.inconsistent {
            return Ok(true);
        }
        self.ensure_seeded("is_same_individual")?;

        let Some(class) = self.resolve_identity(first)? else {
            return Ok(false);
        };
        Ok(self.identities.class_of(second) == Some(class))
    }

    /// Settle every remaining possible edge
    pub fn compute_same_as_equivalence_classes(&mut self) -> Result<(), RealizationError> {
        if self.flags.inconsistent {
            return Ok(());
        }
        self.ensure_seeded("compute_same_as_equivalence_classes")?;

        self.progress.task_started("Computing sameAs equivalence classes");
        let mut resolved = 0;
        while let Some(class) = self.identities.any_pending() {
            let Some(representative) = self.identities.representative(class).cloned() else {
                break;
            };
            self.resolve_identity(&representative)?;
            resolved += 1;
            self.progress.progress_changed(resolved, self.identities.class_count());
        }
        self.progress.task_stopped();
        Ok(())
    }

    pub fn identity_partition(&self) -> &IdentityPartition {
        &self.identities
    }

    /// Drain the pending edges of `individual`'s class. `None` if the
    /// individual is unknown to the partition.
    pub(crate) fn resolve_identity(&mut self, individual: &Individual) -> Result<Option<ClassId>, RealizationError> {
        loop {
            let Some(class) = self.identities.class_of(individual) else {
                return Ok(None);
            };
            let Some(candidate) = self.identities.next_pending(class) else {
                return Ok(Some(class));
            };
            let representatives = (
                self.identities.representative(class).cloned(),
                self.identities.representative(candidate).cloned(),
            );
            let (Some(first), Some(second)) = representatives else {
                self.identities.remove_possible(class, candidate);
                continue;
            };
            if self.oracle.is_same(&first, &second)? {
                debug!("{} is the same individual as {}", first, second);
                self.identities.union(class, candidate);
            } else {
                debug!("{} differs from {}", first, second);
                self.identities.remove_possible(class, candidate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ind(name: &str) -> Individual {
        Individual::named(format!("http://example.org/{}", name))
    }

    fn create_test_partition() -> IdentityPartition {
        IdentityPartition::new(vec![ind("a"), ind("b"), ind("c"), ind("d")])
    }

    #[test]
    fn test_singletons() {
        let partition = create_test_partition();
        assert_eq!(partition.class_count(), 4);
        let a = partition.class_of(&ind("a")).unwrap();
        assert_eq!(partition.members(a), Some(&BTreeSet::from([ind("a")])));
        assert!(!partition.has_pending());
    }

    #[test]
    fn test_union_moves_members() {
        let mut partition = create_test_partition();
        let a = partition.class_of(&ind("a")).unwrap();
        let b = partition.class_of(&ind("b")).unwrap();

        let survivor = partition.union(a, b);
        assert_eq!(survivor, a);
        assert_eq!(partition.class_of(&ind("b")), Some(a));
        assert_eq!(partition.members(a).unwrap().len(), 2);
        assert!(partition.members(b).is_none());
        assert_eq!(partition.representative(a), Some(&ind("a")));
    }

    #[test]
    fn test_union_redirects_possible_edges() {
        let mut partition = create_test_partition();
        let [a, b, c, d] = [ind("a"), ind("b"), ind("c"), ind("d")].map(|i| partition.class_of(&i).unwrap());
        partition.add_possible(b, c);
        partition.add_possible(a, b);
        partition.add_possible(b, d);

        partition.union(a, b);
        assert!(partition.is_possibly_same(a, c));
        assert!(partition.is_possibly_same(c, a));
        assert!(partition.is_possibly_same(a, d));
        // the a-b edge became a self-edge and is gone
        assert!(!partition.is_possibly_same(a, a));
        assert!(!partition.is_possibly_same(c, b));
    }

    #[test]
    fn test_remove_possible_is_symmetric() {
        let mut partition = create_test_partition();
        let a = partition.class_of(&ind("a")).unwrap();
        let b = partition.class_of(&ind("b")).unwrap();
        partition.add_possible(a, b);
        assert_eq!(partition.next_pending(b), Some(a));

        partition.remove_possible(b, a);
        assert!(partition.next_pending(a).is_none());
        assert!(partition.any_pending().is_none());
    }

    #[test]
    fn test_self_edge_ignored() {
        let mut partition = create_test_partition();
        let a = partition.class_of(&ind("a")).unwrap();
        partition.add_possible(a, a);
        assert!(!partition.has_pending());
    }
}
