//! 要素レコード (known / possible instances)
//!
//! Every atomic concept and atomic role gets a record of confirmed ("known")
//! and tentative ("possible") facts. Records live on the representative of
//! their hierarchy node. [`ElementLayer`] pairs a hierarchy with its records
//! and owns the dominance-preserving mutators.

use crate::hierarchy::{Hierarchy, NodeIndex, Transformer};
use crate::HierarchyError;
use fukurow_core::Individual;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use tracing::warn;

/// Known/possible bookkeeping for one element
pub trait ElementRecord: Default + Debug {
    /// An individual for concepts, a (subject, object) pair for roles
    type Fact: Clone + Eq + Ord + Hash + Debug;

    /// Whether a fact refuted directly below top becomes known at top.
    /// Concepts: yes (everything is an instance of ⊤). Roles: the pair is
    /// dropped, the top role holds for every pair anyway.
    const KNOWN_AT_TOP: bool;

    fn is_known(&self, fact: &Self::Fact) -> bool;
    fn is_possible(&self, fact: &Self::Fact) -> bool;
    /// Add as known, removing any possible entry for the same fact
    fn add_known(&mut self, fact: Self::Fact) -> bool;
    /// Add as possible unless already known
    fn add_possible(&mut self, fact: Self::Fact) -> bool;
    fn remove_known(&mut self, fact: &Self::Fact) -> bool;
    fn remove_possible(&mut self, fact: &Self::Fact) -> bool;
    fn has_possibles(&self) -> bool;
    fn known_facts(&self) -> Vec<Self::Fact>;
    fn possible_facts(&self) -> Vec<Self::Fact>;
    fn is_empty(&self) -> bool;

    /// Merge an equivalent record into this one: known facts are united,
    /// possible facts intersected. `other` is left empty.
    fn absorb_equivalent(&mut self, other: &mut Self) {
        let others_possible: BTreeSet<Self::Fact> = other.possible_facts().into_iter().collect();
        for fact in self.possible_facts() {
            if !others_possible.contains(&fact) {
                self.remove_possible(&fact);
            }
        }
        for fact in other.known_facts() {
            self.add_known(fact);
        }
        *other = Self::default();
    }
}

/// Record of an atomic concept
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConceptElement {
    known: BTreeSet<Individual>,
    possible: BTreeSet<Individual>,
}

impl ConceptElement {
    pub fn known(&self) -> &BTreeSet<Individual> {
        &self.known
    }

    pub fn possible(&self) -> &BTreeSet<Individual> {
        &self.possible
    }
}

impl ElementRecord for ConceptElement {
    type Fact = Individual;
    const KNOWN_AT_TOP: bool = true;

    fn is_known(&self, individual: &Individual) -> bool {
        self.known.contains(individual)
    }

    fn is_possible(&self, individual: &Individual) -> bool {
        self.possible.contains(individual)
    }

    fn add_known(&mut self, individual: Individual) -> bool {
        self.possible.remove(&individual);
        self.known.insert(individual)
    }

    fn add_possible(&mut self, individual: Individual) -> bool {
        if self.known.contains(&individual) {
            return false;
        }
        self.possible.insert(individual)
    }

    fn remove_known(&mut self, individual: &Individual) -> bool {
        self.known.remove(individual)
    }

    fn remove_possible(&mut self, individual: &Individual) -> bool {
        self.possible.remove(individual)
    }

    fn has_possibles(&self) -> bool {
        !self.possible.is_empty()
    }

    fn known_facts(&self) -> Vec<Individual> {
        self.known.iter().cloned().collect()
    }

    fn possible_facts(&self) -> Vec<Individual> {
        self.possible.iter().cloned().collect()
    }

    fn is_empty(&self) -> bool {
        self.known.is_empty() && self.possible.is_empty()
    }
}

/// Record of an atomic role: subject -> objects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleElement {
    known: BTreeMap<Individual, BTreeSet<Individual>>,
    possible: BTreeMap<Individual, BTreeSet<Individual>>,
}

impl RoleElement {
    pub fn known(&self) -> &BTreeMap<Individual, BTreeSet<Individual>> {
        &self.known
    }

    pub fn possible(&self) -> &BTreeMap<Individual, BTreeSet<Individual>> {
        &self.possible
    }

    pub fn known_successors(&self, subject: &Individual) -> Option<&BTreeSet<Individual>> {
        self.known.get(subject)
    }

    pub fn possible_successors(&self, subject: &Individual) -> Option<&BTreeSet<Individual>> {
        self.possible.get(subject)
    }

    fn insert(map: &mut BTreeMap<Individual, BTreeSet<Individual>>, (subject, object): (Individual, Individual)) -> bool {
        map.entry(subject).or_default().insert(object)
    }

    fn remove(map: &mut BTreeMap<Individual, BTreeSet<Individual>>, (subject, object): &(Individual, Individual)) -> bool {
        let Some(objects) = map.get_mut(subject) else {
            return false;
        };
        let removed = objects.remove(object);
        if objects.is_empty() {
            map.remove(subject);
        }
        removed
    }

    fn contains(map: &BTreeMap<Individual, BTreeSet<Individual>>, (subject, object): &(Individual, Individual)) -> bool {
        map.get(subject).map_or(false, |objects| objects.contains(object))
    }

    fn pairs(map: &BTreeMap<Individual, BTreeSet<Individual>>) -> Vec<(Individual, Individual)> {
        map.iter()
            .flat_map(|(subject, objects)| objects.iter().map(move |object| (subject.clone(), object.clone())))
            .collect()
    }
}

impl ElementRecord for RoleElement {
    type Fact = (Individual, Individual);
    const KNOWN_AT_TOP: bool = false;

    fn is_known(&self, pair: &Self::Fact) -> bool {
        Self::contains(&self.known, pair)
    }

    fn is_possible(&self, pair: &Self::Fact) -> bool {
        Self::contains(&self.possible, pair)
    }

    fn add_known(&mut self, pair: Self::Fact) -> bool {
        Self::remove(&mut self.possible, &pair);
        Self::insert(&mut self.known, pair)
    }

    fn add_possible(&mut self, pair: Self::Fact) -> bool {
        if Self::contains(&self.known, &pair) {
            return false;
        }
        Self::insert(&mut self.possible, pair)
    }

    fn remove_known(&mut self, pair: &Self::Fact) -> bool {
        Self::remove(&mut self.known, pair)
    }

    fn remove_possible(&mut self, pair: &Self::Fact) -> bool {
        Self::remove(&mut self.possible, pair)
    }

    fn has_possibles(&self) -> bool {
        !self.possible.is_empty()
    }

    fn known_facts(&self) -> Vec<Self::Fact> {
        Self::pairs(&self.known)
    }

    fn possible_facts(&self) -> Vec<Self::Fact> {
        Self::pairs(&self.possible)
    }

    fn is_empty(&self) -> bool {
        self.known.is_empty() && self.possible.is_empty()
    }
}

/// A hierarchy snapshot together with the records of its representatives
#[derive(Debug, Clone)]
pub struct ElementLayer<E, R> {
    hierarchy: Hierarchy<E>,
    records: HashMap<E, R>,
}

impl<E, R> ElementLayer<E, R>
where
    E: Clone + Eq + Hash + Ord + Debug,
    R: ElementRecord,
{
    pub fn new(hierarchy: Hierarchy<E>) -> Self {
        Self {
            hierarchy,
            records: HashMap::new(),
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy<E> {
        &self.hierarchy
    }

    /// Record of a node's representative, if one has been created
    pub fn record(&self, node: NodeIndex) -> Option<&R> {
        self.records.get(self.hierarchy.representative(node))
    }

    /// Record of a node's representative, created on first use
    pub fn record_mut(&mut self, node: NodeIndex) -> &mut R {
        let representative = self.hierarchy.representative(node).clone();
        self.records.entry(representative).or_default()
    }

    pub fn records(&self) -> impl Iterator<Item = (&E, &R)> {
        self.records.iter()
    }

    pub fn is_known(&self, node: NodeIndex, fact: &R::Fact) -> bool {
        self.record(node).map_or(false, |record| record.is_known(fact))
    }

    pub fn is_possible(&self, node: NodeIndex, fact: &R::Fact) -> bool {
        self.record(node).map_or(false, |record| record.is_possible(fact))
    }

    pub fn has_possibles(&self, node: NodeIndex) -> bool {
        self.record(node).map_or(false, |record| record.has_possibles())
    }

    /// Whether any record still holds a possible fact
    pub fn any_possibles(&self) -> bool {
        self.records.values().any(|record| record.has_possibles())
    }

    /// Record `fact` as known at `node`: no-op if it is already known at a
    /// strict descendant, otherwise strip it from every strict ancestor.
    pub fn mark_known(&mut self, node: NodeIndex, fact: R::Fact) -> bool {
        if self
            .hierarchy
            .strict_descendants(node)
            .into_iter()
            .any(|descendant| self.is_known(descendant, &fact))
        {
            return false;
        }
        let changed = self.record_mut(node).add_known(fact.clone());
        for ancestor in self.hierarchy.strict_ancestors(node) {
            if let Some(record) = self.records.get_mut(self.hierarchy.representative(ancestor)) {
                record.remove_known(&fact);
                record.remove_possible(&fact);
            }
        }
        changed
    }

    /// Record `fact` as possible at `node`: no-op if it is known here, or known
    /// or possible at a strict descendant. Otherwise strip it from the
    /// possible sets of every strict ancestor.
    pub fn mark_possible(&mut self, node: NodeIndex, fact: R::Fact) -> bool {
        if self.is_known(node, &fact) {
            return false;
        }
        if self
            .hierarchy
            .strict_descendants(node)
            .into_iter()
            .any(|descendant| self.is_known(descendant, &fact) || self.is_possible(descendant, &fact))
        {
            return false;
        }
        let changed = self.record_mut(node).add_possible(fact.clone());
        for ancestor in self.hierarchy.strict_ancestors(node) {
            if let Some(record) = self.records.get_mut(self.hierarchy.representative(ancestor)) {
                record.remove_possible(&fact);
            }
        }
        changed
    }

    /// Possible → known at the same node
    pub fn promote(&mut self, node: NodeIndex, fact: R::Fact) -> bool {
        if let Some(record) = self.records.get_mut(self.hierarchy.representative(node)) {
            record.remove_possible(&fact);
        }
        self.mark_known(node, fact)
    }

    /// A refuted fact moves up one level. Returns the parents whose state changed.
    pub fn push_to_parents(&mut self, node: NodeIndex, fact: &R::Fact) -> Vec<NodeIndex> {
        if let Some(record) = self.records.get_mut(self.hierarchy.representative(node)) {
            record.remove_possible(fact);
        }
        let top = self.hierarchy.top_node();
        let parents: Vec<NodeIndex> = self.hierarchy.parents(node).iter().copied().collect();
        let mut changed = Vec::new();
        for parent in parents {
            let updated = if parent == top {
                R::KNOWN_AT_TOP && self.mark_known(parent, fact.clone())
            } else {
                self.mark_possible(parent, fact.clone())
            };
            if updated {
                changed.push(parent);
            }
        }
        changed
    }

    /// Install a new hierarchy snapshot. Records of elements that became
    /// equivalent are merged onto the new representative.
    pub fn reinstall<S, T>(&mut self, source: &Hierarchy<S>, transformer: T) -> Result<(), HierarchyError>
    where
        S: Clone + Eq + Hash + Ord + Debug,
        T: FnMut(&S) -> E,
    {
        let mut merger = RecordMerger {
            transform: transformer,
            records: &mut self.records,
        };
        let hierarchy = source.transform(&mut merger)?;

        let mut orphans = Vec::new();
        for (element, record) in &self.records {
            let kept = hierarchy
                .node_for_element(element)
                .map_or(false, |node| hierarchy.representative(node) == element);
            if !kept && !record.is_empty() {
                orphans.push(element.clone());
            }
        }
        for element in orphans {
            warn!("dropping record of {:?}: not a representative in the new hierarchy", element);
            self.records.remove(&element);
        }
        self.hierarchy = hierarchy;
        Ok(())
    }

    /// Re-establish dominance after a hierarchy change: walking bottom-up, a
    /// node's known facts are removed from every strict ancestor's known and
    /// possible sets, its possible facts from every strict ancestor's possible set.
    pub fn clean_up_dominance(&mut self) {
        for node in self.hierarchy.bottom_up_order() {
            let Some(record) = self.record(node) else {
                continue;
            };
            let known = record.known_facts();
            let possible = record.possible_facts();
            if known.is_empty() && possible.is_empty() {
                continue;
            }
            for ancestor in self.hierarchy.strict_ancestors(node) {
                if let Some(ancestor_record) = self.records.get_mut(self.hierarchy.representative(ancestor)) {
                    for fact in &known {
                        ancestor_record.remove_known(fact);
                        ancestor_record.remove_possible(fact);
                    }
                    for fact in &possible {
                        ancestor_record.remove_possible(fact);
                    }
                }
            }
        }
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Transformer that merges records of equivalent elements onto the representative
struct RecordMerger<'a, E, R, T> {
    transform: T,
    records: &'a mut HashMap<E, R>,
}

impl<'a, S, E, R, T> Transformer<S, E> for RecordMerger<'a, E, R, T>
where
    E: Clone + Eq + Hash + Ord,
    R: ElementRecord,
    T: FnMut(&S) -> E,
{
    fn transform(&mut self, element: &S) -> E {
        (self.transform)(element)
    }

    fn determine_representative(&mut self, old_representative: &S, new_equivalents: &BTreeSet<E>) -> E {
        let representative = (self.transform)(old_representative);
        let mut merged = self.records.remove(&representative).unwrap_or_default();
        for equivalent in new_equivalents {
            if *equivalent == representative {
                continue;
            }
            if let Some(mut other) = self.records.remove(equivalent) {
                merged.absorb_equivalent(&mut other);
            }
        }
        if !merged.is_empty() {
            self.records.insert(representative.clone(), merged);
        }
        representative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::HierarchyBuilder;

    fn ind(name: &str) -> Individual {
        Individual::named(format!("http://example.org/{}", name))
    }

    /// top > A > B > bottom, top > C > bottom
    fn create_test_layer() -> ElementLayer<&'static str, ConceptElement> {
        let mut builder = HierarchyBuilder::new("top", "bottom");
        builder.add_subsumption("B", "A");
        builder.add_element("C");
        ElementLayer::new(builder.build())
    }

    fn node(layer: &ElementLayer<&'static str, ConceptElement>, name: &'static str) -> NodeIndex {
        layer.hierarchy().node_for_element(&name).unwrap()
    }

    #[test]
    fn test_concept_record_disjointness() {
        let mut record = ConceptElement::default();
        assert!(record.add_possible(ind("x")));
        assert!(record.add_known(ind("x")));
        assert!(!record.is_possible(&ind("x")));
        assert!(!record.add_possible(ind("x")));
    }

    #[test]
    fn test_role_record_pairs() {
        let mut record = RoleElement::default();
        record.add_possible((ind("a"), ind("b")));
        record.add_known((ind("a"), ind("c")));
        assert!(record.is_possible(&(ind("a"), ind("b"))));
        assert!(record.remove_possible(&(ind("a"), ind("b"))));
        assert!(record.possible().is_empty());
        assert_eq!(record.known_facts(), vec![(ind("a"), ind("c"))]);
    }

    #[test]
    fn test_absorb_equivalent() {
        let mut left = ConceptElement::default();
        left.add_known(ind("a"));
        left.add_possible(ind("p"));
        left.add_possible(ind("q"));
        let mut right = ConceptElement::default();
        right.add_known(ind("b"));
        right.add_possible(ind("q"));

        left.absorb_equivalent(&mut right);
        assert_eq!(left.known(), &BTreeSet::from([ind("a"), ind("b")]));
        assert_eq!(left.possible(), &BTreeSet::from([ind("q")]));
        assert!(right.is_empty());
    }

    #[test]
    fn test_mark_known_strips_ancestors() {
        let mut layer = create_test_layer();
        let (a, b) = (node(&layer, "A"), node(&layer, "B"));

        layer.mark_known(a, ind("x"));
        layer.mark_possible(b, ind("y"));
        layer.mark_known(b, ind("x"));

        assert!(!layer.is_known(a, &ind("x")));
        assert!(layer.is_known(b, &ind("x")));
        // already known below
        assert!(!layer.mark_known(a, ind("x")));
    }

    #[test]
    fn test_mark_possible_respects_dominance() {
        let mut layer = create_test_layer();
        let (a, b) = (node(&layer, "A"), node(&layer, "B"));

        // certainly A, maybe B
        layer.mark_known(a, ind("x"));
        assert!(layer.mark_possible(b, ind("x")));
        assert!(layer.is_known(a, &ind("x")));

        // possible below blocks possible above
        assert!(!layer.mark_possible(a, ind("x")));

        layer.mark_possible(a, ind("y"));
        layer.mark_possible(b, ind("y"));
        assert!(!layer.is_possible(a, &ind("y")));
        assert!(layer.is_possible(b, &ind("y")));
    }

    #[test]
    fn test_push_to_parents_reaches_top_as_known() {
        let mut layer = create_test_layer();
        let (a, c) = (node(&layer, "A"), node(&layer, "C"));
        let top = layer.hierarchy().top_node();

        layer.mark_possible(c, ind("z"));
        let changed = layer.push_to_parents(c, &ind("z"));
        assert_eq!(changed, vec![top]);
        assert!(layer.is_known(top, &ind("z")));
        assert!(!layer.is_possible(c, &ind("z")));

        layer.mark_possible(node(&layer, "B"), ind("w"));
        layer.push_to_parents(node(&layer, "B"), &ind("w"));
        assert!(layer.is_possible(a, &ind("w")));
    }

    #[test]
    fn test_reinstall_merges_equivalent_records() {
        let mut layer = create_test_layer();
        let (a, b) = (node(&layer, "A"), node(&layer, "B"));
        layer.mark_known(b, ind("x"));
        layer.mark_known(a, ind("y"));

        // A and B become equivalent
        let mut builder = HierarchyBuilder::new("top", "bottom");
        builder.add_subsumption("B", "A");
        builder.add_subsumption("A", "B");
        builder.add_element("C");
        layer.reinstall(&builder.build(), |element: &&'static str| *element).unwrap();

        let merged = node(&layer, "A");
        assert_eq!(node(&layer, "B"), merged);
        assert!(layer.is_known(merged, &ind("x")));
        assert!(layer.is_known(merged, &ind("y")));
    }

    #[test]
    fn test_clean_up_dominance() {
        let mut layer = create_test_layer();
        let (a, c) = (node(&layer, "A"), node(&layer, "C"));
        layer.mark_known(a, ind("x"));
        layer.mark_known(c, ind("x"));

        // C moves under A
        let mut builder = HierarchyBuilder::new("top", "bottom");
        builder.add_subsumption("B", "A");
        builder.add_subsumption("C", "A");
        layer.reinstall(&builder.build(), |element: &&'static str| *element).unwrap();
        layer.clean_up_dominance();

        let (a, c) = (node(&layer, "A"), node(&layer, "C"));
        assert!(!layer.is_known(a, &ind("x")));
        assert!(layer.is_known(c, &ind("x")));
    }
}
