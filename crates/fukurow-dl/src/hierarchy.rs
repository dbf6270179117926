//! 包摂階層 (subsumption hierarchy)
//!
//! Arena-backed DAG of equivalence nodes with top and bottom sentinels.
//! Nodes are addressed by [`NodeIndex`]; every node is reachable from top and
//! reaches bottom, and the edge set is transitively reduced. A [`NodeIndex`]
//! is only meaningful for the hierarchy that issued it.

use crate::HierarchyError;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

/// Position of a node in its hierarchy's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Set of mutually equivalent elements
#[derive(Debug, Clone)]
pub struct HierarchyNode<E> {
    pub(crate) representative: E,
    pub(crate) equivalents: BTreeSet<E>,
    pub(crate) parents: BTreeSet<NodeIndex>,
    pub(crate) children: BTreeSet<NodeIndex>,
}

impl<E> HierarchyNode<E> {
    pub fn representative(&self) -> &E {
        &self.representative
    }

    pub fn equivalents(&self) -> &BTreeSet<E> {
        &self.equivalents
    }

    pub fn parents(&self) -> &BTreeSet<NodeIndex> {
        &self.parents
    }

    pub fn children(&self) -> &BTreeSet<NodeIndex> {
        &self.children
    }
}

/// Maps source elements into a target hierarchy
pub trait Transformer<E, F> {
    fn transform(&mut self, element: &E) -> F;

    /// Pick the representative for a node whose equivalents map onto `new_equivalents`
    fn determine_representative(&mut self, old_representative: &E, new_equivalents: &BTreeSet<F>) -> F;
}

/// Subsumption DAG over element type `E`
#[derive(Debug, Clone)]
pub struct Hierarchy<E> {
    nodes: Vec<HierarchyNode<E>>,
    by_element: HashMap<E, NodeIndex>,
    top: NodeIndex,
    bottom: NodeIndex,
}

impl<E> Hierarchy<E>
where
    E: Clone + Eq + Hash + Ord + Debug,
{
    /// Assemble from nodes whose parent/child links are already consistent
    pub(crate) fn from_nodes(nodes: Vec<HierarchyNode<E>>, top: NodeIndex, bottom: NodeIndex) -> Result<Self, HierarchyError> {
        if top.0 >= nodes.len() || bottom.0 >= nodes.len() {
            return Err(HierarchyError::MissingSentinel);
        }
        let mut by_element = HashMap::new();
        for (index, node) in nodes.iter().enumerate() {
            for element in &node.equivalents {
                if by_element.insert(element.clone(), NodeIndex(index)).is_some() {
                    return Err(HierarchyError::ElementCollision(format!("{:?}", element)));
                }
            }
        }
        Ok(Self {
            nodes,
            by_element,
            top,
            bottom,
        })
    }

    /// Two-node hierarchy: top directly above bottom
    pub fn trivial(top: E, bottom: E) -> Self {
        let top_node = HierarchyNode {
            representative: top.clone(),
            equivalents: BTreeSet::from([top.clone()]),
            parents: BTreeSet::new(),
            children: BTreeSet::from([NodeIndex(1)]),
        };
        let bottom_node = HierarchyNode {
            representative: bottom.clone(),
            equivalents: BTreeSet::from([bottom.clone()]),
            parents: BTreeSet::from([NodeIndex(0)]),
            children: BTreeSet::new(),
        };
        let by_element = HashMap::from([(top, NodeIndex(0)), (bottom, NodeIndex(1))]);
        Self {
            nodes: vec![top_node, bottom_node],
            by_element,
            top: NodeIndex(0),
            bottom: NodeIndex(1),
        }
    }

    pub fn node_for_element(&self, element: &E) -> Option<NodeIndex> {
        self.by_element.get(element).copied()
    }

    /// Like [`Hierarchy::node_for_element`], failing on unknown elements
    pub fn require_node(&self, element: &E) -> Result<NodeIndex, HierarchyError> {
        self.node_for_element(element)
            .ok_or_else(|| HierarchyError::UnknownElement(format!("{:?}", element)))
    }

    /// Node at `index`, or `None` if `index` does not belong to this hierarchy
    pub fn get(&self, index: NodeIndex) -> Option<&HierarchyNode<E>> {
        self.nodes.get(index.0)
    }

    /// # Panics
    ///
    /// If `index` was not issued by this hierarchy. Indices are invalidated
    /// whenever the owning layer installs a new hierarchy; use
    /// [`Hierarchy::get`] for indices of unknown provenance.
    pub fn node(&self, index: NodeIndex) -> &HierarchyNode<E> {
        &self.nodes[index.0]
    }

    /// # Panics
    ///
    /// Same as [`Hierarchy::node`].
    pub fn representative(&self, index: NodeIndex) -> &E {
        &self.nodes[index.0].representative
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(NodeIndex)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn top_node(&self) -> NodeIndex {
        self.top
    }

    pub fn bottom_node(&self) -> NodeIndex {
        self.bottom
    }

    pub fn parents(&self, index: NodeIndex) -> &BTreeSet<NodeIndex> {
        &self.nodes[index.0].parents
    }

    pub fn children(&self, index: NodeIndex) -> &BTreeSet<NodeIndex> {
        &self.nodes[index.0].children
    }

    /// Reflexive upward closure
    pub fn ancestors(&self, index: NodeIndex) -> BTreeSet<NodeIndex> {
        self.closure(index, true)
    }

    /// Reflexive downward closure
    pub fn descendants(&self, index: NodeIndex) -> BTreeSet<NodeIndex> {
        self.closure(index, false)
    }

    pub fn strict_ancestors(&self, index: NodeIndex) -> BTreeSet<NodeIndex> {
        let mut ancestors = self.ancestors(index);
        ancestors.remove(&index);
        ancestors
    }

    pub fn strict_descendants(&self, index: NodeIndex) -> BTreeSet<NodeIndex> {
        let mut descendants = self.descendants(index);
        descendants.remove(&index);
        descendants
    }

    fn closure(&self, start: NodeIndex, upward: bool) -> BTreeSet<NodeIndex> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let node = &self.nodes[current.0];
            let adjacent_nodes = if upward { &node.parents } else { &node.children };
            for adjacent in adjacent_nodes {
                if !visited.contains(adjacent) {
                    stack.push(*adjacent);
                }
            }
        }
        visited
    }

    /// Every node appears after all of its children (Kahn's algorithm from bottom)
    pub fn bottom_up_order(&self) -> Vec<NodeIndex> {
        let mut pending: Vec<usize> = self.nodes.iter().map(|node| node.children.len()).collect();
        let mut queue: VecDeque<NodeIndex> = self
            .all_nodes()
            .filter(|index| pending[index.0] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(current) = queue.pop_front() {
            order.push(current);
            for parent in &self.nodes[current.0].parents {
                pending[parent.0] -= 1;
                if pending[parent.0] == 0 {
                    queue.push_back(*parent);
                }
            }
        }
        order
    }

    /// Map every element through `transformer`, keeping the node structure.
    /// Equivalents that map onto the same target element collapse; two
    /// different nodes mapping onto one target element is a collision.
    pub fn transform<F, T>(&self, transformer: &mut T) -> Result<Hierarchy<F>, HierarchyError>
    where
        F: Clone + Eq + Hash + Ord + Debug,
        T: Transformer<E, F>,
    {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut seen: HashSet<F> = HashSet::new();
        for node in &self.nodes {
            let equivalents: BTreeSet<F> = node
                .equivalents
                .iter()
                .map(|element| transformer.transform(element))
                .collect();
            for element in &equivalents {
                if !seen.insert(element.clone()) {
                    return Err(HierarchyError::ElementCollision(format!("{:?}", element)));
                }
            }
            let representative = transformer.determine_representative(&node.representative, &equivalents);
            nodes.push(HierarchyNode {
                representative,
                equivalents,
                parents: node.parents.clone(),
                children: node.children.clone(),
            });
        }
        Hierarchy::from_nodes(nodes, self.top, self.bottom)
    }

    /// Add elements to an existing node
    pub(crate) fn add_equivalents<I: IntoIterator<Item = E>>(&mut self, index: NodeIndex, elements: I) -> Result<(), HierarchyError> {
        for element in elements {
            match self.by_element.get(&element) {
                Some(existing) if *existing == index => continue,
                Some(_) => return Err(HierarchyError::ElementCollision(format!("{:?}", element))),
                None => {
                    self.by_element.insert(element.clone(), index);
                    self.nodes[index.0].equivalents.insert(element);
                }
            }
        }
        Ok(())
    }
}
