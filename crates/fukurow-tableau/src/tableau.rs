//! テーブルロー完成モデル
//!
//! Snapshot of a clash-free completion graph as the decision procedure left
//! it: nodes (some merged into others), a binary table of concept and marker
//! facts `(predicate, node)` and a ternary table of role facts
//! `(role, from, to)`. Every fact carries the dependency set it was derived under.

use crate::markers::MarkerId;
use crate::model::{NodeId, NodeType, Predicate, Term};
use crate::retrieval::ExtensionTable;
use crate::TableauError;
use fukurow_core::{AtomicConcept, AtomicRole, DependencySet, Individual};
use std::collections::HashMap;
use tracing::debug;

/// Tableau node
#[derive(Debug, Clone)]
struct Node {
    node_type: NodeType,
    /// Inactive once merged into another node
    active: bool,
    merged_into: Option<(NodeId, DependencySet)>,
}

/// Completed model for the realization pass
#[derive(Debug)]
pub struct CompletionModel {
    nodes: Vec<Node>,
    binary: ExtensionTable,
    ternary: ExtensionTable,
    node_for_individual: HashMap<Individual, NodeId>,
    individual_for_node: HashMap<NodeId, Individual>,
}

impl Default for CompletionModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionModel {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            binary: ExtensionTable::new(2),
            ternary: ExtensionTable::new(3),
            node_for_individual: HashMap::new(),
            individual_for_node: HashMap::new(),
        }
    }

    /// Add a fresh node
    pub fn add_node(&mut self, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            node_type,
            active: true,
            merged_into: None,
        });
        id
    }

    /// Bind an individual to a new named node. Rebinding returns the existing node.
    pub fn add_individual(&mut self, individual: Individual) -> NodeId {
        if let Some(node) = self.node_for_individual.get(&individual) {
            return *node;
        }
        let node = self.add_node(NodeType::Named);
        self.individual_for_node.insert(node, individual.clone());
        self.node_for_individual.insert(individual, node);
        node
    }

    pub fn node_for_individual(&self, individual: &Individual) -> Option<NodeId> {
        self.node_for_individual.get(individual).copied()
    }

    pub fn individual_for_node(&self, node: NodeId) -> Option<&Individual> {
        self.individual_for_node.get(&node)
    }

    /// All individual bindings
    pub fn individuals(&self) -> impl Iterator<Item = (&Individual, NodeId)> {
        self.node_for_individual.iter().map(|(individual, node)| (individual, *node))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_active(&self, node: NodeId) -> bool {
        self.node(node).map(|n| n.active).unwrap_or(false)
    }

    pub fn node_type(&self, node: NodeId) -> Option<NodeType> {
        self.node(node).map(|n| n.node_type)
    }

    /// Node this one was merged into, with the merge's dependency set
    pub fn merged_into(&self, node: NodeId) -> Option<(NodeId, &DependencySet)> {
        self.node(node)
            .and_then(|n| n.merged_into.as_ref())
            .map(|(target, dependencies)| (*target, dependencies))
    }

    /// Follow the merge chain to the node that currently carries the facts
    pub fn canonical_node(&self, node: NodeId) -> NodeId {
        let mut current = node;
        let mut steps = 0;
        while let Some((target, _)) = self.merged_into(current) {
            current = target;
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
        }
        current
    }

    /// Merge `from` into `into`. Facts at `from` are re-derived at `into` under
    /// the union of their dependency set and the merge's.
    pub fn merge(&mut self, from: NodeId, into: NodeId, dependencies: DependencySet) -> Result<(), TableauError> {
        self.node(from).ok_or(TableauError::UnknownNode(from))?;
        self.node(into).ok_or(TableauError::UnknownNode(into))?;
        if from == into {
            return Ok(());
        }
        debug!("merging {} into {} (deterministic: {})", from, into, dependencies.is_empty());

        let mut moved_binary = Vec::new();
        {
            let mut retrieval = self.binary.create_retrieval(&[false, true])?;
            retrieval.bind(1, from)?;
            retrieval.open()?;
            while !retrieval.after_last() {
                let tuple = retrieval.tuple()?;
                moved_binary.push((tuple[0].clone(), retrieval.dependency_set()?.union(&dependencies)));
                retrieval.next();
            }
        }

        let mut moved_ternary = Vec::new();
        for column in [1usize, 2] {
            let mut bound = [false; 3];
            bound[column] = true;
            let mut retrieval = self.ternary.create_retrieval(&bound)?;
            retrieval.bind(column, from)?;
            retrieval.open()?;
            while !retrieval.after_last() {
                let mut tuple = retrieval.tuple()?.to_vec();
                tuple[column] = Term::Node(into);
                moved_ternary.push((tuple, retrieval.dependency_set()?.union(&dependencies)));
                retrieval.next();
            }
        }

        for (predicate, deps) in moved_binary {
            self.binary.add_tuple(vec![predicate, Term::Node(into)], deps)?;
        }
        for (tuple, deps) in moved_ternary {
            self.ternary.add_tuple(tuple, deps)?;
        }

        let node = &mut self.nodes[from.0 as usize];
        node.active = false;
        node.merged_into = Some((into, dependencies));
        Ok(())
    }

    /// Record `concept(node)`
    pub fn add_concept_fact(&mut self, concept: AtomicConcept, node: NodeId, dependencies: DependencySet) -> Result<bool, TableauError> {
        self.node(node).ok_or(TableauError::UnknownNode(node))?;
        Ok(self
            .binary
            .add_tuple(vec![Term::Predicate(Predicate::Concept(concept)), Term::Node(node)], dependencies)?)
    }

    /// Record `marker(node)`
    pub fn add_marker_fact(&mut self, marker: MarkerId, node: NodeId, dependencies: DependencySet) -> Result<bool, TableauError> {
        self.node(node).ok_or(TableauError::UnknownNode(node))?;
        Ok(self
            .binary
            .add_tuple(vec![Term::Predicate(Predicate::Marker(marker)), Term::Node(node)], dependencies)?)
    }

    /// Record `role(from, to)`
    pub fn add_role_fact(&mut self, role: AtomicRole, from: NodeId, to: NodeId, dependencies: DependencySet) -> Result<bool, TableauError> {
        self.node(from).ok_or(TableauError::UnknownNode(from))?;
        self.node(to).ok_or(TableauError::UnknownNode(to))?;
        Ok(self.ternary.add_tuple(
            vec![Term::Predicate(Predicate::Role(role)), Term::Node(from), Term::Node(to)],
            dependencies,
        )?)
    }

    /// Binary table: `(concept | marker, node)`
    pub fn binary_table(&self) -> &ExtensionTable {
        &self.binary
    }

    /// Ternary table: `(role, from, to)`
    pub fn ternary_table(&self) -> &ExtensionTable {
        &self.ternary
    }

    fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node.0 as usize)
    }
}
