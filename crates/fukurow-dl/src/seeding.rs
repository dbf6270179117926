//! 完成モデルからの読み出し (seeding)
//!
//! One pass over the completed model of the consistency check. A fact with an
//! empty dependency set is known, any other fact is possible. Facts about
//! nodes that were merged away are read off the node they were merged into.

use crate::instance_manager::InstanceManager;
use crate::RealizationError;
use fukurow_core::{AtomicConcept, AtomicRole, Individual, Role};
use fukurow_tableau::{CompletionModel, MarkerConcepts, NodeId, NodeType, Oracle, Predicate};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeedOutcome {
    Known,
    Possible,
    Ignored,
}

impl<O: Oracle> InstanceManager<O> {
    /// Read known and possible instances off `model`.
    ///
    /// `complex_roles` are the roles whose edges only appear through marker
    /// propagation; their successors are read from the marker extensions in
    /// `markers`.
    pub fn initialize_known_and_possible_instances(
        &mut self,
        model: &CompletionModel,
        markers: &MarkerConcepts,
        complex_roles: &[Role],
    ) -> Result<(), RealizationError> {
        let mut bound = Vec::with_capacity(self.individuals.len());
        for individual in &self.individuals {
            let node = model.node_for_individual(individual).ok_or_else(|| {
                RealizationError::Precondition(format!("individual {} is not bound to a model node", individual))
            })?;
            bound.push((individual.clone(), node));
        }
        info!(
            "Reading known and possible instances of {} individuals off a model with {} nodes",
            bound.len(),
            model.node_count()
        );

        let mut concept_cursor = model.binary_table().create_retrieval(&[false, true])?;
        let mut role_cursor = model.ternary_table().create_retrieval(&[false, true, false])?;
        let mut marker_cursor = model.binary_table().create_retrieval(&[true, false])?;

        let total = bound.len() * (2 + complex_roles.len());
        let mut step = 0;
        let mut concept_possibles = false;
        let mut role_possibles = false;
        self.progress.task_started("Initializing known and possible instances");

        for (individual, node) in &bound {
            let canonical = model.canonical_node(*node);

            // concept memberships
            let mut recorded = false;
            concept_cursor.bind(1, canonical)?;
            concept_cursor.open()?;
            while !concept_cursor.after_last() {
                let tuple = concept_cursor.tuple()?;
                if let Some(Predicate::Concept(concept)) = tuple[0].as_predicate() {
                    let deterministic = concept_cursor.dependency_set()?.is_empty();
                    match self.seed_concept_fact(concept, individual, deterministic) {
                        SeedOutcome::Known => recorded = true,
                        SeedOutcome::Possible => {
                            recorded = true;
                            concept_possibles = true;
                        }
                        SeedOutcome::Ignored => {}
                    }
                }
                concept_cursor.next();
            }
            if !recorded {
                let top = self.concepts.hierarchy().top_node();
                self.concepts.mark_known(top, individual.clone());
            }
            step += 1;
            self.progress.progress_changed(step, total);

            // role assertions
            role_cursor.bind(1, canonical)?;
            role_cursor.open()?;
            while !role_cursor.after_last() {
                let tuple = role_cursor.tuple()?;
                if let (Some(Predicate::Role(role)), Some(successor)) = (tuple[0].as_predicate(), tuple[2].as_node()) {
                    if let Some(object) = self.named_individual_at(model, model.canonical_node(successor)) {
                        let deterministic = role_cursor.dependency_set()?.is_empty();
                        if self.seed_role_fact(role, individual.clone(), object, deterministic) == SeedOutcome::Possible {
                            role_possibles = true;
                        }
                    }
                }
                role_cursor.next();
            }
            step += 1;
            self.progress.progress_changed(step, total);

            // complex roles through marker extensions
            for role in complex_roles {
                if let Some(marker) = markers.role_marker(role, individual) {
                    marker_cursor.bind(0, marker)?;
                    marker_cursor.open()?;
                    while !marker_cursor.after_last() {
                        let tuple = marker_cursor.tuple()?;
                        let successor = tuple[1]
                            .as_node()
                            .and_then(|node| self.named_individual_at(model, model.canonical_node(node)));
                        if let Some(successor) = successor {
                            let deterministic = marker_cursor.dependency_set()?.is_empty();
                            let (subject, object) = if role.is_inverse() {
                                (successor, individual.clone())
                            } else {
                                (individual.clone(), successor)
                            };
                            if self.seed_role_fact(role.underlying(), subject, object, deterministic) == SeedOutcome::Possible {
                                role_possibles = true;
                            }
                        }
                        marker_cursor.next();
                    }
                } else {
                    debug!("no marker concept for {} at {}", role, individual);
                }
                step += 1;
                self.progress.progress_changed(step, total);
            }
        }
        self.progress.task_stopped();

        self.seed_identities(model);

        self.flags.seeded = true;
        self.flags.realization_completed =
            self.flags.inconsistent || (self.flags.classified_concepts && !concept_possibles);
        self.flags.role_realization_completed = self.flags.inconsistent || !role_possibles;

        if self.config.eager_same_as {
            self.compute_same_as_equivalence_classes()?;
        }
        Ok(())
    }

    fn seed_concept_fact(&mut self, concept: &AtomicConcept, individual: &Individual, deterministic: bool) -> SeedOutcome {
        if concept.is_thing() || concept.is_nothing() || concept.is_internal() {
            return SeedOutcome::Ignored;
        }
        let Some(node) = self.concepts.hierarchy().node_for_element(concept) else {
            warn!("ignoring {}({}): concept is not in the hierarchy", concept, individual);
            return SeedOutcome::Ignored;
        };
        if node == self.concepts.hierarchy().top_node() {
            return SeedOutcome::Ignored;
        }
        if deterministic {
            self.concepts.mark_known(node, individual.clone());
            SeedOutcome::Known
        } else {
            self.concepts.mark_possible(node, individual.clone());
            SeedOutcome::Possible
        }
    }

    fn seed_role_fact(&mut self, role: &AtomicRole, subject: Individual, object: Individual, deterministic: bool) -> SeedOutcome {
        if role.is_top() || role.is_internal() {
            return SeedOutcome::Ignored;
        }
        let Some(node) = self.roles.hierarchy().node_for_element(role) else {
            warn!("ignoring {}({}, {}): role is not in the hierarchy", role, subject, object);
            return SeedOutcome::Ignored;
        };
        if node == self.roles.hierarchy().top_node() {
            return SeedOutcome::Ignored;
        }
        if deterministic {
            self.roles.mark_known(node, (subject, object));
            SeedOutcome::Known
        } else {
            self.roles.mark_possible(node, (subject, object));
            SeedOutcome::Possible
        }
    }

    /// Individual bound to an active named node
    fn named_individual_at(&self, model: &CompletionModel, node: NodeId) -> Option<Individual> {
        if !model.is_active(node) || model.node_type(node) != Some(NodeType::Named) {
            return None;
        }
        model
            .individual_for_node(node)
            .filter(|individual| self.individuals.contains(individual))
            .cloned()
    }

    /// Deterministic merges join classes, branch-dependent merges leave a
    /// possible edge
    fn seed_identities(&mut self, model: &CompletionModel) {
        let mut merges = Vec::new();
        for individual in &self.individuals {
            let Some(node) = model.node_for_individual(individual) else {
                continue;
            };
            let Some((target, dependencies)) = model.merged_into(node) else {
                continue;
            };
            let Some(other) = model.individual_for_node(target) else {
                continue;
            };
            if self.individuals.contains(other) {
                merges.push((individual.clone(), other.clone(), dependencies.is_empty()));
            }
        }

        for (individual, other, deterministic) in merges {
            let first = self.identities.insert(individual);
            let second = self.identities.insert(other);
            if deterministic {
                self.identities.union(first, second);
            } else {
                self.identities.add_possible(first, second);
            }
        }
        debug!("{} sameAs classes after seeding", self.identities.class_count());
    }
}
