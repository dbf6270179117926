//! 推移的簡約階層の構築
//!
//! Builds a transitively reduced [`Hierarchy`] from (not necessarily direct)
//! subsumptions. Cycles collapse into equivalence nodes via Tarjan's SCC.

use crate::hierarchy::{Hierarchy, HierarchyNode, NodeIndex};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex as GraphIndex};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

/// Collects subsumptions `sub ⊑ sup` and builds the reduced DAG
#[derive(Debug, Clone)]
pub struct HierarchyBuilder<E> {
    top: E,
    bottom: E,
    subsumers: BTreeMap<E, BTreeSet<E>>,
}

impl<E> HierarchyBuilder<E>
where
    E: Clone + Eq + Hash + Ord + Debug,
{
    pub fn new(top: E, bottom: E) -> Self {
        let mut subsumers = BTreeMap::new();
        subsumers.insert(top.clone(), BTreeSet::new());
        subsumers.insert(bottom.clone(), BTreeSet::new());
        Self { top, bottom, subsumers }
    }

    /// Register an element with no told subsumers
    pub fn add_element(&mut self, element: E) {
        self.subsumers.entry(element).or_default();
    }

    pub fn add_subsumption(&mut self, sub: E, sup: E) {
        self.subsumers.entry(sup.clone()).or_default();
        if sub != sup {
            self.subsumers.entry(sub).or_default().insert(sup);
        } else {
            self.subsumers.entry(sub).or_default();
        }
    }

    pub fn contains(&self, element: &E) -> bool {
        self.subsumers.contains_key(element)
    }

    /// Every element ends up below top and above bottom
    pub fn build(&self) -> Hierarchy<E> {
        let mut graph: DiGraph<E, ()> = DiGraph::new();
        let mut index_of: HashMap<E, GraphIndex> = HashMap::new();
        for element in self.subsumers.keys() {
            index_of.insert(element.clone(), graph.add_node(element.clone()));
        }
        let top = index_of[&self.top];
        let bottom = index_of[&self.bottom];
        for (sub, sups) in &self.subsumers {
            let sub_index = index_of[sub];
            for sup in sups {
                graph.add_edge(sub_index, index_of[sup], ());
            }
            if sub_index != top {
                graph.add_edge(sub_index, top, ());
            }
            if sub_index != bottom {
                graph.add_edge(bottom, sub_index, ());
            }
        }

        // Components come out in reverse topological order: subsumers first.
        let components = tarjan_scc(&graph);
        let mut component_of: HashMap<GraphIndex, usize> = HashMap::new();
        for (component, members) in components.iter().enumerate() {
            for member in members {
                component_of.insert(*member, component);
            }
        }

        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
        for edge in graph.raw_edges() {
            let from = component_of[&edge.source()];
            let to = component_of[&edge.target()];
            if from != to {
                successors[from].insert(to);
            }
        }

        // Strict subsumers of each component
        let mut reachable: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
        for component in 0..components.len() {
            let mut closure = BTreeSet::new();
            for successor in &successors[component] {
                closure.insert(*successor);
                closure.extend(reachable[*successor].iter().copied());
            }
            reachable[component] = closure;
        }

        let mut nodes: Vec<HierarchyNode<E>> = components
            .iter()
            .map(|members| {
                let equivalents: BTreeSet<E> = members.iter().map(|index| graph[*index].clone()).collect();
                let representative = if equivalents.contains(&self.top) {
                    self.top.clone()
                } else if equivalents.contains(&self.bottom) {
                    self.bottom.clone()
                } else {
                    equivalents.iter().next().cloned().unwrap_or_else(|| self.top.clone())
                };
                HierarchyNode {
                    representative,
                    equivalents,
                    parents: BTreeSet::new(),
                    children: BTreeSet::new(),
                }
            })
            .collect();

        for component in 0..components.len() {
            let direct: Vec<usize> = reachable[component]
                .iter()
                .copied()
                .filter(|candidate| {
                    !reachable[component]
                        .iter()
                        .any(|other| other != candidate && reachable[*other].contains(candidate))
                })
                .collect();
            for parent in direct {
                nodes[component].parents.insert(NodeIndex(parent));
                nodes[parent].children.insert(NodeIndex(component));
            }
        }

        let top_node = NodeIndex(component_of[&top]);
        let bottom_node = NodeIndex(component_of[&bottom]);
        match Hierarchy::from_nodes(nodes, top_node, bottom_node) {
            Ok(hierarchy) => hierarchy,
            // Components partition the elements, so neither check in from_nodes can fail.
            Err(_) => Hierarchy::trivial(self.top.clone(), self.bottom.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redundant_edges_are_removed() {
        let mut builder = HierarchyBuilder::new("top", "bottom");
        builder.add_subsumption("C", "B");
        builder.add_subsumption("B", "A");
        builder.add_subsumption("C", "A");
        let hierarchy = builder.build();

        let c = hierarchy.node_for_element(&"C").unwrap();
        let b = hierarchy.node_for_element(&"B").unwrap();
        let a = hierarchy.node_for_element(&"A").unwrap();
        assert_eq!(hierarchy.parents(c), &BTreeSet::from([b]));
        assert_eq!(hierarchy.parents(b), &BTreeSet::from([a]));
        assert_eq!(hierarchy.parents(a), &BTreeSet::from([hierarchy.top_node()]));
        assert_eq!(hierarchy.children(c), &BTreeSet::from([hierarchy.bottom_node()]));
    }

    #[test]
    fn test_cycles_become_equivalences() {
        let mut builder = HierarchyBuilder::new("top", "bottom");
        builder.add_subsumption("A", "B");
        builder.add_subsumption("B", "A");
        builder.add_subsumption("C", "A");
        let hierarchy = builder.build();

        let a = hierarchy.node_for_element(&"A").unwrap();
        assert_eq!(hierarchy.node_for_element(&"B"), Some(a));
        assert_eq!(hierarchy.representative(a), &"A");
        assert_eq!(hierarchy.node(a).equivalents().len(), 2);
        assert_eq!(hierarchy.len(), 4);
    }

    #[test]
    fn test_equivalent_to_top_uses_top_as_representative() {
        let mut builder = HierarchyBuilder::new("top", "bottom");
        builder.add_subsumption("top", "Everything");
        let hierarchy = builder.build();

        let top = hierarchy.top_node();
        assert_eq!(hierarchy.node_for_element(&"Everything"), Some(top));
        assert_eq!(hierarchy.representative(top), &"top");
    }

    #[test]
    fn test_isolated_element_sits_between_sentinels() {
        let mut builder = HierarchyBuilder::new("top", "bottom");
        builder.add_element("Lonely");
        let hierarchy = builder.build();

        let lonely = hierarchy.node_for_element(&"Lonely").unwrap();
        assert_eq!(hierarchy.parents(lonely), &BTreeSet::from([hierarchy.top_node()]));
        assert_eq!(hierarchy.children(lonely), &BTreeSet::from([hierarchy.bottom_node()]));
        assert_eq!(hierarchy.children(hierarchy.top_node()).len(), 1);
    }
}
