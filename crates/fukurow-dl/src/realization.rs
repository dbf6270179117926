//! 一括実現化 (realize / realize_relations)
//!
//! Nodes are processed bottom-up so that a fact refuted at a node reaches its
//! parents before they are processed themselves.

use crate::element::{ElementLayer, ElementRecord};
use crate::hierarchy::NodeIndex;
use crate::instance_manager::InstanceManager;
use crate::{OracleError, RealizationError};
use fukurow_core::Role;
use fukurow_tableau::{Oracle, OracleExt};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{debug, info};

impl<O: Oracle> InstanceManager<O> {
    /// Resolve every possible concept instance. A no-op once completed, until
    /// a new concept hierarchy is installed.
    pub fn realize(&mut self) -> Result<(), RealizationError> {
        if self.flags.inconsistent || self.flags.realization_completed {
            return Ok(());
        }
        if !self.flags.classified_concepts {
            return Err(RealizationError::Precondition(
                "realize requires a classified concept hierarchy".to_string(),
            ));
        }
        self.ensure_seeded("realize")?;

        let order = self.concepts.hierarchy().bottom_up_order();
        let total = order.len();
        self.progress.task_started("Computing instances for all classes");
        for (step, node) in order.into_iter().enumerate() {
            let oracle = &mut self.oracle;
            resolve_possibles(&mut self.concepts, node, |_| true, |concept, individual| {
                oracle.is_instance(individual, concept)
            })?;
            self.progress.progress_changed(step + 1, total);
        }
        self.progress.task_stopped();

        self.flags.realization_completed = true;
        info!("Concept realization completed");
        Ok(())
    }

    /// Resolve every possible relation instance
    pub fn realize_relations(&mut self) -> Result<(), RealizationError> {
        if self.flags.inconsistent || self.flags.role_realization_completed {
            return Ok(());
        }
        if !self.flags.classified_roles {
            return Err(RealizationError::Precondition(
                "realize_relations requires a classified role hierarchy".to_string(),
            ));
        }
        self.ensure_seeded("realize_relations")?;

        let order = self.roles.hierarchy().bottom_up_order();
        let total = order.len();
        self.progress.task_started("Computing instances for all object properties");
        for (step, node) in order.into_iter().enumerate() {
            let oracle = &mut self.oracle;
            resolve_possibles(&mut self.roles, node, |_| true, |role, (subject, object)| {
                oracle.is_relation_instance(&Role::Atomic(role.clone()), subject, object)
            })?;
            self.progress.progress_changed(step + 1, total);
        }
        self.progress.task_stopped();

        self.flags.role_realization_completed = true;
        info!("Relation realization completed");
        Ok(())
    }
}

/// Settle the possible facts at `node` accepted by `relevant`: confirmed facts
/// become known here, refuted ones move to the parents. Returns the parents
/// whose state changed.
pub(crate) fn resolve_possibles<E, R, P, F>(
    layer: &mut ElementLayer<E, R>,
    node: NodeIndex,
    relevant: P,
    mut confirm: F,
) -> Result<Vec<NodeIndex>, RealizationError>
where
    E: Clone + Eq + Hash + Ord + Debug,
    R: ElementRecord,
    P: Fn(&R::Fact) -> bool,
    F: FnMut(&E, &R::Fact) -> Result<bool, OracleError>,
{
    let candidates: Vec<R::Fact> = match layer.record(node) {
        Some(record) => record
            .possible_facts()
            .into_iter()
            .filter(|fact| relevant(fact))
            .collect(),
        None => return Ok(Vec::new()),
    };
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let element = layer.hierarchy().representative(node).clone();
    let mut changed = Vec::new();
    for fact in candidates {
        if !layer.is_possible(node, &fact) {
            continue;
        }
        if confirm(&element, &fact)? {
            debug!("confirmed {:?} at {:?}", fact, element);
            layer.promote(node, fact);
        } else {
            debug!("refuted {:?} at {:?}", fact, element);
            changed.extend(layer.push_to_parents(node, &fact));
        }
    }
    Ok(changed)
}

/// Whether `fact` holds for some node in the subtree below `start`. Explores
/// downward, asking the oracle at each node where the fact is possible. A
/// parent that gains the fact after a refutation is visited again.
pub(crate) fn contains_fact<E, R, F>(
    layer: &mut ElementLayer<E, R>,
    start: NodeIndex,
    fact: &R::Fact,
    mut confirm: F,
) -> Result<bool, RealizationError>
where
    E: Clone + Eq + Hash + Ord + Debug,
    R: ElementRecord,
    F: FnMut(&E, &R::Fact) -> Result<bool, OracleError>,
{
    if start == layer.hierarchy().top_node() {
        return Ok(true);
    }
    let mut visited = BTreeSet::new();
    let mut stack = vec![start];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        if layer.is_known(current, fact) {
            return Ok(true);
        }
        if layer.is_possible(current, fact) {
            let element = layer.hierarchy().representative(current).clone();
            if confirm(&element, fact)? {
                layer.promote(current, fact.clone());
                return Ok(true);
            }
            for parent in layer.push_to_parents(current, fact) {
                if visited.remove(&parent) {
                    stack.push(parent);
                }
            }
            // nothing below a possible fact can hold it
            continue;
        }
        for child in layer.hierarchy().children(current) {
            if !visited.contains(child) {
                stack.push(*child);
            }
        }
    }
    Ok(false)
}

/// Nodes of the subtree below `start`, children before parents
pub(crate) fn bottom_up_subtree<E, R>(layer: &ElementLayer<E, R>, start: NodeIndex) -> Vec<NodeIndex>
where
    E: Clone + Eq + Hash + Ord + Debug,
    R: ElementRecord,
{
    let subtree = layer.hierarchy().descendants(start);
    layer
        .hierarchy()
        .bottom_up_order()
        .into_iter()
        .filter(|node| subtree.contains(node))
        .collect()
}
