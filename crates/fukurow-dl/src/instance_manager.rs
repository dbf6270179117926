//! インスタンスマネージャ
//!
//! Owns the concept and role layers, the identity partition and the oracle.
//! Seeding lives in [`crate::seeding`], bulk realization in
//! [`crate::realization`], lazy queries in [`crate::queries`] and sameAs
//! resolution in [`crate::same_as`].

use crate::builder::HierarchyBuilder;
use crate::config::RealizationConfig;
use crate::element::{ConceptElement, ElementLayer, RoleElement};
use crate::hierarchy::{Hierarchy, NodeIndex};
use crate::progress::{ProgressMonitor, TracingProgressMonitor};
use crate::same_as::IdentityPartition;
use crate::{HierarchyError, RealizationError};
use fukurow_core::{AtomicConcept, AtomicRole, Individual, Role};
use fukurow_tableau::Oracle;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Told vocabulary and subsumptions used before a classified hierarchy exists
#[derive(Debug, Clone, Default)]
pub struct ToldAxioms {
    pub concepts: BTreeSet<AtomicConcept>,
    pub roles: BTreeSet<AtomicRole>,
    /// `(sub, sup)`
    pub concept_subsumptions: Vec<(AtomicConcept, AtomicConcept)>,
    /// `(sub, sup)`; either side may be an inverse role
    pub role_subsumptions: Vec<(Role, Role)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RealizationFlags {
    pub(crate) inconsistent: bool,
    pub(crate) realization_completed: bool,
    pub(crate) role_realization_completed: bool,
    pub(crate) classified_concepts: bool,
    pub(crate) classified_roles: bool,
    pub(crate) seeded: bool,
}

/// Realization state for one knowledge base
pub struct InstanceManager<O> {
    pub(crate) oracle: O,
    pub(crate) config: RealizationConfig,
    pub(crate) individuals: BTreeSet<Individual>,
    pub(crate) concepts: ElementLayer<AtomicConcept, ConceptElement>,
    pub(crate) roles: ElementLayer<AtomicRole, RoleElement>,
    pub(crate) identities: IdentityPartition,
    pub(crate) flags: RealizationFlags,
    pub(crate) progress: Box<dyn ProgressMonitor>,
}

impl<O: Oracle> InstanceManager<O> {
    /// Start from told hierarchies. Install classified ones later with
    /// [`InstanceManager::set_classified_concept_hierarchy`] and
    /// [`InstanceManager::set_classified_role_hierarchy`].
    pub fn new<I>(oracle: O, individuals: I, told: &ToldAxioms, config: RealizationConfig) -> Result<Self, RealizationError>
    where
        I: IntoIterator<Item = Individual>,
    {
        let individuals: BTreeSet<Individual> = individuals.into_iter().collect();
        info!(
            "Creating instance manager for {} individuals, {} concepts, {} roles",
            individuals.len(),
            told.concepts.len(),
            told.roles.len()
        );

        let concepts = ElementLayer::new(build_told_concept_hierarchy(told));

        let told_roles = build_told_role_hierarchy(told, config.uses_inverse_roles);
        let mut roles = ElementLayer::new(Hierarchy::trivial(AtomicRole::top(), AtomicRole::bottom()));
        roles.reinstall(&remove_inverses(&told_roles)?, |role: &Role| role.underlying().clone())?;

        let progress: Box<dyn ProgressMonitor> = Box::new(TracingProgressMonitor::new(config.progress.log_every));
        let identities = IdentityPartition::new(individuals.iter().cloned());

        Ok(Self {
            oracle,
            config,
            individuals,
            concepts,
            roles,
            identities,
            flags: RealizationFlags::default(),
            progress,
        })
    }

    /// Start directly from classified hierarchies
    pub fn with_classified_hierarchies<I>(
        oracle: O,
        individuals: I,
        concept_hierarchy: &Hierarchy<AtomicConcept>,
        role_hierarchy: &Hierarchy<Role>,
        config: RealizationConfig,
    ) -> Result<Self, RealizationError>
    where
        I: IntoIterator<Item = Individual>,
    {
        let mut manager = Self::new(oracle, individuals, &ToldAxioms::default(), config)?;
        manager.set_classified_concept_hierarchy(concept_hierarchy)?;
        manager.set_classified_role_hierarchy(role_hierarchy)?;
        Ok(manager)
    }

    pub fn set_progress_monitor(&mut self, monitor: Box<dyn ProgressMonitor>) {
        self.progress = monitor;
    }

    /// Install a classified concept hierarchy. Records of newly equivalent
    /// concepts are merged; seeded facts are re-checked for dominance.
    pub fn set_classified_concept_hierarchy(&mut self, hierarchy: &Hierarchy<AtomicConcept>) -> Result<(), RealizationError> {
        info!("Installing classified concept hierarchy with {} nodes", hierarchy.len());
        self.concepts.reinstall(hierarchy, |concept: &AtomicConcept| concept.clone())?;
        if self.flags.seeded {
            self.concepts.clean_up_dominance();
        }
        self.flags.classified_concepts = true;
        self.flags.realization_completed =
            self.flags.inconsistent || (self.flags.seeded && !self.concepts.any_possibles());
        Ok(())
    }

    /// Install a classified role hierarchy. Inverse roles are eliminated first.
    pub fn set_classified_role_hierarchy(&mut self, hierarchy: &Hierarchy<Role>) -> Result<(), RealizationError> {
        info!("Installing classified role hierarchy with {} nodes", hierarchy.len());
        let atomic_only = remove_inverses(hierarchy)?;
        self.roles.reinstall(&atomic_only, |role: &Role| role.underlying().clone())?;
        if self.flags.seeded {
            self.roles.clean_up_dominance();
        }
        self.flags.classified_roles = true;
        self.flags.role_realization_completed =
            self.flags.inconsistent || (self.flags.seeded && !self.roles.any_possibles());
        Ok(())
    }

    /// The knowledge base is inconsistent: every class and relation collapses
    /// to bottom and no further oracle calls are made.
    pub fn set_inconsistent(&mut self) {
        warn!("Knowledge base is inconsistent; realization answers degenerate");
        self.flags.inconsistent = true;
        self.flags.realization_completed = true;
        self.flags.role_realization_completed = true;
        self.flags.classified_concepts = true;
        self.flags.classified_roles = true;
    }

    // Dominance-preserving mutators

    pub fn mark_known_concept(&mut self, concept: &AtomicConcept, individual: Individual) -> Result<bool, RealizationError> {
        let node = self.concepts.hierarchy().require_node(concept)?;
        Ok(self.concepts.mark_known(node, individual))
    }

    pub fn mark_possible_concept(&mut self, concept: &AtomicConcept, individual: Individual) -> Result<bool, RealizationError> {
        let node = self.concepts.hierarchy().require_node(concept)?;
        Ok(self.concepts.mark_possible(node, individual))
    }

    pub fn mark_known_relation(&mut self, role: &AtomicRole, subject: Individual, object: Individual) -> Result<bool, RealizationError> {
        let node = self.roles.hierarchy().require_node(role)?;
        Ok(self.roles.mark_known(node, (subject, object)))
    }

    pub fn mark_possible_relation(&mut self, role: &AtomicRole, subject: Individual, object: Individual) -> Result<bool, RealizationError> {
        let node = self.roles.hierarchy().require_node(role)?;
        Ok(self.roles.mark_possible(node, (subject, object)))
    }

    // Accessors

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    pub fn config(&self) -> &RealizationConfig {
        &self.config
    }

    pub fn individuals(&self) -> &BTreeSet<Individual> {
        &self.individuals
    }

    pub fn concept_hierarchy(&self) -> &Hierarchy<AtomicConcept> {
        self.concepts.hierarchy()
    }

    pub fn role_hierarchy(&self) -> &Hierarchy<AtomicRole> {
        self.roles.hierarchy()
    }

    /// Record held by the representative of `concept`'s node
    pub fn concept_record(&self, concept: &AtomicConcept) -> Option<&ConceptElement> {
        let node = self.concepts.hierarchy().node_for_element(concept)?;
        self.concepts.record(node)
    }

    /// Record held by the representative of `role`'s node
    pub fn role_record(&self, role: &AtomicRole) -> Option<&RoleElement> {
        let node = self.roles.hierarchy().node_for_element(role)?;
        self.roles.record(node)
    }

    pub fn is_inconsistent(&self) -> bool {
        self.flags.inconsistent
    }

    pub fn realization_completed(&self) -> bool {
        self.flags.realization_completed
    }

    pub fn role_realization_completed(&self) -> bool {
        self.flags.role_realization_completed
    }

    pub fn uses_classified_concept_hierarchy(&self) -> bool {
        self.flags.classified_concepts
    }

    pub fn uses_classified_role_hierarchy(&self) -> bool {
        self.flags.classified_roles
    }

    pub fn is_seeded(&self) -> bool {
        self.flags.seeded
    }

    // Shared helpers

    pub(crate) fn ensure_seeded(&self, operation: &str) -> Result<(), RealizationError> {
        if self.flags.seeded || self.flags.inconsistent {
            Ok(())
        } else {
            Err(RealizationError::Precondition(format!(
                "{} called before known and possible instances were read off the model",
                operation
            )))
        }
    }

    pub(crate) fn ensure_classified_for_direct(&self, operation: &str, direct: bool) -> Result<(), RealizationError> {
        if direct && !self.flags.classified_concepts {
            return Err(RealizationError::Precondition(format!(
                "{} with direct=true requires a classified concept hierarchy",
                operation
            )));
        }
        Ok(())
    }

    pub(crate) fn is_result_relevant(&self, individual: &Individual) -> bool {
        !self.config.filter_internal_individuals || individual.is_result_relevant()
    }

    pub(crate) fn relevant_individuals(&self) -> BTreeSet<Individual> {
        self.individuals
            .iter()
            .filter(|individual| self.is_result_relevant(individual))
            .cloned()
            .collect()
    }
}

/// Told concept hierarchy: C ⊑ C, C ⊑ ⊤, ⊥ ⊑ C for every non-internal concept,
/// plus every told subsumption.
pub fn build_told_concept_hierarchy(told: &ToldAxioms) -> Hierarchy<AtomicConcept> {
    let mut builder = HierarchyBuilder::new(AtomicConcept::thing(), AtomicConcept::nothing());
    for concept in told.concepts.iter().filter(|concept| !concept.is_internal()) {
        builder.add_element(concept.clone());
    }
    for (sub, sup) in &told.concept_subsumptions {
        if sub.is_internal() || sup.is_internal() {
            continue;
        }
        builder.add_subsumption(sub.clone(), sup.clone());
    }
    builder.build()
}

/// Told role hierarchy. With inverse roles in use every `r ⊑ s` is mirrored
/// as `r⁻ ⊑ s⁻`.
pub fn build_told_role_hierarchy(told: &ToldAxioms, uses_inverse_roles: bool) -> Hierarchy<Role> {
    let mut builder = HierarchyBuilder::new(Role::Atomic(AtomicRole::top()), Role::Atomic(AtomicRole::bottom()));
    for role in told.roles.iter().filter(|role| !role.is_internal()) {
        builder.add_element(Role::Atomic(role.clone()));
        if uses_inverse_roles {
            builder.add_element(normalize_role(Role::Inverse(role.clone())));
        }
    }
    for (sub, sup) in &told.role_subsumptions {
        if sub.underlying().is_internal() || sup.underlying().is_internal() {
            continue;
        }
        builder.add_subsumption(normalize_role(sub.clone()), normalize_role(sup.clone()));
        if uses_inverse_roles {
            builder.add_subsumption(normalize_role(sub.inverse()), normalize_role(sup.inverse()));
        }
    }
    builder.build()
}

/// The universal and empty roles are their own inverses
fn normalize_role(role: Role) -> Role {
    match role {
        Role::Inverse(atomic) if atomic.is_top() || atomic.is_bottom() => Role::Atomic(atomic),
        other => other,
    }
}

/// Collapse a hierarchy that mixes roles and inverse roles into one over
/// atomic roles only. From each node the walk goes up until it meets a node
/// holding an atomic role; the resulting nodes keep every atomic equivalent.
pub fn remove_inverses(hierarchy: &Hierarchy<Role>) -> Result<Hierarchy<Role>, HierarchyError> {
    let top = Role::Atomic(AtomicRole::top());
    let bottom = Role::Atomic(AtomicRole::bottom());
    hierarchy.node_for_element(&top).ok_or(HierarchyError::MissingSentinel)?;
    let bottom_node = hierarchy
        .node_for_element(&bottom)
        .ok_or(HierarchyError::MissingSentinel)?;

    let mut builder = HierarchyBuilder::new(top, bottom.clone());
    let mut visited = BTreeSet::new();
    let mut to_process = vec![(bottom, bottom_node)];
    while let Some((current, node)) = to_process.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        builder.add_element(current.clone());
        for (atomic, atomic_node) in next_nodes_with_atomic(hierarchy, node) {
            builder.add_subsumption(current.clone(), atomic.clone());
            if !visited.contains(&atomic) {
                to_process.push((atomic, atomic_node));
            }
        }
    }

    let mut reduced = builder.build();
    let nodes: Vec<NodeIndex> = reduced.all_nodes().collect();
    for node in nodes {
        let representative = reduced.representative(node).clone();
        if let Some(old) = hierarchy.node_for_element(&representative) {
            let atomic_equivalents: Vec<Role> = hierarchy
                .node(old)
                .equivalents()
                .iter()
                .filter(|role| !role.is_inverse())
                .cloned()
                .collect();
            reduced.add_equivalents(node, atomic_equivalents)?;
        }
    }
    Ok(reduced)
}

fn atomic_member(hierarchy: &Hierarchy<Role>, node: NodeIndex) -> Option<Role> {
    let representative = hierarchy.representative(node);
    if !representative.is_inverse() {
        return Some(representative.clone());
    }
    hierarchy
        .node(node)
        .equivalents()
        .iter()
        .find(|role| !role.is_inverse())
        .cloned()
}

/// Nearest nodes above `start` that hold an atomic role
fn next_nodes_with_atomic(hierarchy: &Hierarchy<Role>, start: NodeIndex) -> Vec<(Role, NodeIndex)> {
    let mut found = Vec::new();
    let mut visited = BTreeSet::new();
    let mut stack: Vec<NodeIndex> = hierarchy.parents(start).iter().copied().collect();
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        match atomic_member(hierarchy, current) {
            Some(role) => found.push((role, current)),
            None => stack.extend(hierarchy.parents(current).iter().copied()),
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use fukurow_tableau::EntailmentOracle;

    fn role(name: &str) -> AtomicRole {
        AtomicRole::new(format!("http://example.org/{}", name))
    }

    fn concept(name: &str) -> AtomicConcept {
        AtomicConcept::new(format!("http://example.org/{}", name))
    }

    #[test]
    fn test_told_concept_hierarchy() {
        let told = ToldAxioms {
            concepts: BTreeSet::from([concept("Person"), concept("Student"), AtomicConcept::new("internal:aux")]),
            concept_subsumptions: vec![(concept("Student"), concept("Person"))],
            ..ToldAxioms::default()
        };
        let hierarchy = build_told_concept_hierarchy(&told);

        let student = hierarchy.node_for_element(&concept("Student")).unwrap();
        let person = hierarchy.node_for_element(&concept("Person")).unwrap();
        assert_eq!(hierarchy.parents(student), &BTreeSet::from([person]));
        assert!(hierarchy.node_for_element(&AtomicConcept::new("internal:aux")).is_none());
    }

    #[test]
    fn test_inverse_mirrors() {
        let told = ToldAxioms {
            roles: BTreeSet::from([role("hasMother"), role("hasParent")]),
            role_subsumptions: vec![(Role::Atomic(role("hasMother")), Role::Atomic(role("hasParent")))],
            ..ToldAxioms::default()
        };
        let hierarchy = build_told_role_hierarchy(&told, true);

        let mother_inv = hierarchy.node_for_element(&Role::Inverse(role("hasMother"))).unwrap();
        let parent_inv = hierarchy.node_for_element(&Role::Inverse(role("hasParent"))).unwrap();
        assert!(hierarchy.parents(mother_inv).contains(&parent_inv));
    }

    #[test]
    fn test_remove_inverses_skips_inverse_only_nodes() {
        // r ⊑ s⁻ ⊑ t : the inverse-only node between r and t disappears
        let mut builder = HierarchyBuilder::new(Role::Atomic(AtomicRole::top()), Role::Atomic(AtomicRole::bottom()));
        builder.add_subsumption(Role::Atomic(role("r")), Role::Inverse(role("s")));
        builder.add_subsumption(Role::Inverse(role("s")), Role::Atomic(role("t")));
        let mixed = builder.build();

        let reduced = remove_inverses(&mixed).unwrap();
        let r = reduced.node_for_element(&Role::Atomic(role("r"))).unwrap();
        let t = reduced.node_for_element(&Role::Atomic(role("t"))).unwrap();
        assert_eq!(reduced.parents(r), &BTreeSet::from([t]));
        assert!(reduced.node_for_element(&Role::Inverse(role("s"))).is_none());
        for node in reduced.all_nodes() {
            assert!(reduced.node(node).equivalents().iter().all(|role| !role.is_inverse()));
        }
    }

    #[test]
    fn test_remove_inverses_keeps_atomic_equivalents() {
        let mut builder = HierarchyBuilder::new(Role::Atomic(AtomicRole::top()), Role::Atomic(AtomicRole::bottom()));
        builder.add_subsumption(Role::Atomic(role("a")), Role::Atomic(role("b")));
        builder.add_subsumption(Role::Atomic(role("b")), Role::Atomic(role("a")));
        builder.add_subsumption(Role::Inverse(role("c")), Role::Atomic(role("a")));
        builder.add_subsumption(Role::Atomic(role("a")), Role::Inverse(role("c")));
        let mixed = builder.build();

        let reduced = remove_inverses(&mixed).unwrap();
        let a = reduced.node_for_element(&Role::Atomic(role("a"))).unwrap();
        assert_eq!(reduced.node_for_element(&Role::Atomic(role("b"))), Some(a));
        assert_eq!(reduced.node(a).equivalents().len(), 2);
    }

    #[test]
    fn test_remove_inverses_requires_sentinels() {
        let hierarchy = Hierarchy::trivial(Role::atomic("http://example.org/x"), Role::atomic("http://example.org/y"));
        assert_eq!(remove_inverses(&hierarchy).unwrap_err(), HierarchyError::MissingSentinel);
    }

    #[test]
    fn test_unknown_element_in_mutator() {
        let mut manager = InstanceManager::new(
            EntailmentOracle::new(),
            vec![Individual::named("http://example.org/x")],
            &ToldAxioms::default(),
            RealizationConfig::default(),
        )
        .unwrap();
        let result = manager.mark_known_concept(&concept("Unknown"), Individual::named("http://example.org/x"));
        assert!(matches!(result, Err(RealizationError::Hierarchy(HierarchyError::UnknownElement(_)))));
    }

    #[test]
    fn test_set_inconsistent_forces_completion() {
        let mut manager = InstanceManager::new(
            EntailmentOracle::new(),
            Vec::<Individual>::new(),
            &ToldAxioms::default(),
            RealizationConfig::default(),
        )
        .unwrap();
        assert!(!manager.realization_completed());
        manager.set_inconsistent();
        assert!(manager.is_inconsistent());
        assert!(manager.realization_completed());
        assert!(manager.role_realization_completed());
    }
}
