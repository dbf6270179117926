//! 遅延問い合わせ (lazy queries)
//!
//! Each query resolves only the possible facts it needs. Answers already
//! settled by seeding or an earlier query cost no oracle call.

use crate::hierarchy::NodeIndex;
use crate::instance_manager::InstanceManager;
use crate::realization::{bottom_up_subtree, contains_fact, resolve_possibles};
use crate::RealizationError;
use fukurow_core::{AtomicConcept, AtomicRole, Individual, Role};
use fukurow_tableau::{Oracle, OracleExt};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

impl<O: Oracle> InstanceManager<O> {
    /// Hierarchy nodes of the concepts `individual` is an instance of.
    /// With `direct`, only the most specific ones.
    pub fn types(&mut self, individual: &Individual, direct: bool) -> Result<BTreeSet<NodeIndex>, RealizationError> {
        if self.flags.inconsistent {
            return Ok(BTreeSet::from([self.concepts.hierarchy().bottom_node()]));
        }
        self.ensure_seeded("types")?;
        self.ensure_classified_for_direct("types", direct)?;

        for node in self.concepts.hierarchy().bottom_up_order() {
            if !self.concepts.is_possible(node, individual) {
                continue;
            }
            let oracle = &mut self.oracle;
            resolve_possibles(
                &mut self.concepts,
                node,
                |candidate| candidate == individual,
                |concept, candidate| oracle.is_instance(candidate, concept),
            )?;
        }

        let hierarchy = self.concepts.hierarchy();
        let mut closure = BTreeSet::from([hierarchy.top_node()]);
        for node in hierarchy.all_nodes() {
            if self.concepts.is_known(node, individual) {
                closure.extend(hierarchy.ancestors(node));
            }
        }
        closure.remove(&hierarchy.bottom_node());
        closure.retain(|node| !hierarchy.representative(*node).is_internal());

        if !direct {
            return Ok(closure);
        }
        Ok(closure
            .iter()
            .copied()
            .filter(|node| hierarchy.children(*node).iter().all(|child| !closure.contains(child)))
            .collect())
    }

    /// Like [`InstanceManager::types`], as sets of equivalent concepts
    pub fn type_concepts(&mut self, individual: &Individual, direct: bool) -> Result<Vec<BTreeSet<AtomicConcept>>, RealizationError> {
        let nodes = self.types(individual, direct)?;
        let hierarchy = self.concepts.hierarchy();
        Ok(nodes
            .into_iter()
            .map(|node| hierarchy.node(node).equivalents().clone())
            .collect())
    }

    /// Whether `individual` is an instance of `concept`. With `direct`, also
    /// that it is an instance of no strict subconcept.
    pub fn has_type(&mut self, individual: &Individual, concept: &AtomicConcept, direct: bool) -> Result<bool, RealizationError> {
        if self.flags.inconsistent {
            return Ok(true);
        }
        self.ensure_seeded("has_type")?;
        self.ensure_classified_for_direct("has_type", direct)?;

        let Some(node) = self.concepts.hierarchy().node_for_element(concept) else {
            debug!("{} is not in the concept hierarchy", concept);
            return Ok(false);
        };
        if !self.concept_contains(node, individual)? {
            return Ok(false);
        }
        if !direct {
            return Ok(true);
        }
        let children: Vec<NodeIndex> = self.concepts.hierarchy().children(node).iter().copied().collect();
        for child in children {
            if self.concept_contains(child, individual)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Instances of `concept`. With `direct`, only those that are not
    /// instances of a strict subconcept.
    pub fn instances(&mut self, concept: &AtomicConcept, direct: bool) -> Result<BTreeSet<Individual>, RealizationError> {
        if self.flags.inconsistent {
            return Ok(self.relevant_individuals());
        }
        self.ensure_seeded("instances")?;
        self.ensure_classified_for_direct("instances", direct)?;

        let Some(node) = self.concepts.hierarchy().node_for_element(concept) else {
            debug!("{} is not in the concept hierarchy", concept);
            return Ok(BTreeSet::new());
        };
        if !direct && node == self.concepts.hierarchy().top_node() {
            return Ok(self.relevant_individuals());
        }

        for current in bottom_up_subtree(&self.concepts, node) {
            let oracle = &mut self.oracle;
            resolve_possibles(&mut self.concepts, current, |_| true, |concept, individual| {
                oracle.is_instance(individual, concept)
            })?;
        }

        let known_at = |current: NodeIndex| -> BTreeSet<Individual> {
            self.concepts
                .record(current)
                .map(|record| record.known().clone())
                .unwrap_or_default()
        };
        let hierarchy = self.concepts.hierarchy();
        let result: BTreeSet<Individual> = if direct {
            let below: BTreeSet<Individual> = hierarchy
                .strict_descendants(node)
                .into_iter()
                .flat_map(&known_at)
                .collect();
            known_at(node).into_iter().filter(|individual| !below.contains(individual)).collect()
        } else {
            hierarchy.descendants(node).into_iter().flat_map(&known_at).collect()
        };
        Ok(result.into_iter().filter(|individual| self.is_result_relevant(individual)).collect())
    }

    /// Objects related to `subject` through `role`. For an inverse role the
    /// subjects of `subject` through the underlying role are returned.
    pub fn relation_values(&mut self, role: &Role, subject: &Individual) -> Result<BTreeSet<Individual>, RealizationError> {
        let atomic = match role {
            Role::Inverse(atomic) => return self.related_subjects(atomic, subject),
            Role::Atomic(atomic) => atomic,
        };
        self.related_objects(atomic, subject)
    }

    /// Subjects related to `object` through `role`. For an inverse role the
    /// objects of `object` through the underlying role are returned.
    pub fn relation_subjects(&mut self, role: &Role, object: &Individual) -> Result<BTreeSet<Individual>, RealizationError> {
        let atomic = match role {
            Role::Inverse(atomic) => return self.related_objects(atomic, object),
            Role::Atomic(atomic) => atomic,
        };
        self.related_subjects(atomic, object)
    }

    /// Whether `role(subject, object)` is entailed
    pub fn has_relation(&mut self, role: &Role, subject: &Individual, object: &Individual) -> Result<bool, RealizationError> {
        if self.flags.inconsistent {
            return Ok(true);
        }
        self.ensure_seeded("has_relation")?;

        let (atomic, subject, object) = match role {
            Role::Atomic(atomic) => (atomic, subject, object),
            Role::Inverse(atomic) => (atomic, object, subject),
        };
        let Some(node) = self.roles.hierarchy().node_for_element(atomic) else {
            debug!("{} is not in the role hierarchy", atomic);
            return Ok(false);
        };
        if node == self.roles.hierarchy().top_node() {
            return Ok(true);
        }
        if !self.individuals.contains(subject) || !self.individuals.contains(object) {
            // not tracked: ask directly, nothing to record
            return Ok(self
                .oracle
                .is_relation_instance(&Role::Atomic(atomic.clone()), subject, object)?);
        }

        let pair = (subject.clone(), object.clone());
        let oracle = &mut self.oracle;
        contains_fact(&mut self.roles, node, &pair, |role, (subject, object)| {
            oracle.is_relation_instance(&Role::Atomic(role.clone()), subject, object)
        })
    }

    /// Every entailed pair of `role`, grouped by subject
    pub fn relation_instances(&mut self, role: &Role) -> Result<BTreeMap<Individual, BTreeSet<Individual>>, RealizationError> {
        let (atomic, inverse) = match role {
            Role::Atomic(atomic) => (atomic, false),
            Role::Inverse(atomic) => (atomic, true),
        };
        let pairs = self.atomic_relation_pairs(atomic)?;
        let mut grouped: BTreeMap<Individual, BTreeSet<Individual>> = BTreeMap::new();
        for (subject, object) in pairs {
            let (subject, object) = if inverse { (object, subject) } else { (subject, object) };
            grouped.entry(subject).or_default().insert(object);
        }
        Ok(grouped)
    }

    fn concept_contains(&mut self, node: NodeIndex, individual: &Individual) -> Result<bool, RealizationError> {
        let oracle = &mut self.oracle;
        contains_fact(&mut self.concepts, node, individual, |concept, individual| {
            oracle.is_instance(individual, concept)
        })
    }

    fn related_objects(&mut self, role: &AtomicRole, subject: &Individual) -> Result<BTreeSet<Individual>, RealizationError> {
        let pairs = self.resolve_relation(role, "relation_values", |(candidate, _)| candidate == subject)?;
        Ok(pairs.map(|pairs| pairs.into_iter().map(|(_, object)| object).collect())
            .unwrap_or_else(|| self.relevant_individuals()))
    }

    fn related_subjects(&mut self, role: &AtomicRole, object: &Individual) -> Result<BTreeSet<Individual>, RealizationError> {
        let pairs = self.resolve_relation(role, "relation_subjects", |(_, candidate)| candidate == object)?;
        Ok(pairs.map(|pairs| pairs.into_iter().map(|(subject, _)| subject).collect())
            .unwrap_or_else(|| self.relevant_individuals()))
    }

    fn atomic_relation_pairs(&mut self, role: &AtomicRole) -> Result<BTreeSet<(Individual, Individual)>, RealizationError> {
        let pairs = self.resolve_relation(role, "relation_instances", |_| true)?;
        Ok(pairs.unwrap_or_else(|| {
            let everyone = self.relevant_individuals();
            everyone
                .iter()
                .flat_map(|subject| everyone.iter().map(move |object| (subject.clone(), object.clone())))
                .collect()
        }))
    }

    /// Resolve the pairs accepted by `relevant` over the subtree of `role`
    /// and collect the known ones. `None` stands for "every pair" (inconsistent
    /// knowledge base or the universal role).
    fn resolve_relation<P>(
        &mut self,
        role: &AtomicRole,
        operation: &str,
        relevant: P,
    ) -> Result<Option<BTreeSet<(Individual, Individual)>>, RealizationError>
    where
        P: Fn(&(Individual, Individual)) -> bool,
    {
        if self.flags.inconsistent {
            return Ok(None);
        }
        self.ensure_seeded(operation)?;

        let Some(node) = self.roles.hierarchy().node_for_element(role) else {
            debug!("{} is not in the role hierarchy", role);
            return Ok(Some(BTreeSet::new()));
        };
        if node == self.roles.hierarchy().top_node() {
            return Ok(None);
        }

        for current in bottom_up_subtree(&self.roles, node) {
            let oracle = &mut self.oracle;
            resolve_possibles(&mut self.roles, current, &relevant, |role, (subject, object)| {
                oracle.is_relation_instance(&Role::Atomic(role.clone()), subject, object)
            })?;
        }

        let mut pairs = BTreeSet::new();
        for current in self.roles.hierarchy().descendants(node) {
            if let Some(record) = self.roles.record(current) {
                for (subject, objects) in record.known() {
                    for object in objects {
                        let pair = (subject.clone(), object.clone());
                        if relevant(&pair) && self.is_result_relevant(subject) && self.is_result_relevant(object) {
                            pairs.insert(pair);
                        }
                    }
                }
            }
        }
        Ok(Some(pairs))
    }
}
