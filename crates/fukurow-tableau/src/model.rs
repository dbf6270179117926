//! 完成モデルの項 (terms stored in extension tables)

use crate::markers::MarkerId;
use fukurow_core::{AtomicConcept, AtomicRole};
use serde::{Deserialize, Serialize};

/// Node of the completed model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Whether a node stands for a named individual or was introduced by expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Named,
    Anonymous,
}

/// Predicate in column 0 of a binary or ternary tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    Concept(AtomicConcept),
    Role(AtomicRole),
    /// Synthesized marker concept, see [`crate::markers`]
    Marker(MarkerId),
}

/// A single column value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Predicate(Predicate),
    Node(NodeId),
}

impl Term {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Term::Node(node) => Some(*node),
            Term::Predicate(_) => None,
        }
    }

    pub fn as_predicate(&self) -> Option<&Predicate> {
        match self {
            Term::Predicate(predicate) => Some(predicate),
            Term::Node(_) => None,
        }
    }
}

impl From<NodeId> for Term {
    fn from(node: NodeId) -> Self {
        Term::Node(node)
    }
}

impl From<Predicate> for Term {
    fn from(predicate: Predicate) -> Self {
        Term::Predicate(predicate)
    }
}

impl From<AtomicConcept> for Term {
    fn from(concept: AtomicConcept) -> Self {
        Term::Predicate(Predicate::Concept(concept))
    }
}

impl From<AtomicRole> for Term {
    fn from(role: AtomicRole) -> Self {
        Term::Predicate(Predicate::Role(role))
    }
}

impl From<MarkerId> for Term {
    fn from(marker: MarkerId) -> Self {
        Term::Predicate(Predicate::Marker(marker))
    }
}
