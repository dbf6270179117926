//! 拡張テーブルと列束縛カーソル

use crate::model::Term;
use crate::RetrievalError;
use fukurow_core::DependencySet;
use std::collections::HashMap;

/// Fixed-arity table of tuples, each carrying the dependency set it was derived under
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    arity: usize,
    tuples: Vec<Vec<Term>>,
    dependencies: Vec<DependencySet>,
    positions: HashMap<Vec<Term>, usize>,
    /// Per-column index: term -> tuple positions
    column_index: Vec<HashMap<Term, Vec<usize>>>,
}

impl ExtensionTable {
    pub fn new(arity: usize) -> Self {
        Self {
            arity,
            tuples: Vec::new(),
            dependencies: Vec::new(),
            positions: HashMap::new(),
            column_index: vec![HashMap::new(); arity],
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    /// Insert a tuple. Re-adding an existing tuple only matters when the new
    /// derivation is deterministic, in which case it replaces the old dependency set.
    pub fn add_tuple(&mut self, tuple: Vec<Term>, dependencies: DependencySet) -> Result<bool, RetrievalError> {
        if tuple.len() != self.arity {
            return Err(RetrievalError::ColumnOutOfRange {
                column: tuple.len(),
                arity: self.arity,
            });
        }

        if let Some(&position) = self.positions.get(&tuple) {
            if dependencies.is_empty() && !self.dependencies[position].is_empty() {
                self.dependencies[position] = dependencies;
                return Ok(true);
            }
            return Ok(false);
        }

        let position = self.tuples.len();
        for (column, term) in tuple.iter().enumerate() {
            self.column_index[column]
                .entry(term.clone())
                .or_default()
                .push(position);
        }
        self.positions.insert(tuple.clone(), position);
        self.tuples.push(tuple);
        self.dependencies.push(dependencies);
        Ok(true)
    }

    /// Dependency set of a stored tuple, if present
    pub fn dependency_set_of(&self, tuple: &[Term]) -> Option<&DependencySet> {
        self.positions.get(tuple).map(|&position| &self.dependencies[position])
    }

    /// Create a cursor whose `bound` columns are fixed by [`Retrieval::bind`]
    pub fn create_retrieval(&self, bound: &[bool]) -> Result<Retrieval<'_>, RetrievalError> {
        if bound.len() != self.arity {
            return Err(RetrievalError::ColumnOutOfRange {
                column: bound.len(),
                arity: self.arity,
            });
        }
        Ok(Retrieval {
            table: self,
            bound: bound.to_vec(),
            bindings: vec![None; self.arity],
            candidates: Vec::new(),
            cursor: None,
        })
    }

    fn matches(&self, position: usize, bindings: &[Option<Term>]) -> bool {
        let tuple = &self.tuples[position];
        bindings
            .iter()
            .zip(tuple.iter())
            .all(|(binding, term)| binding.as_ref().map_or(true, |bound| bound == term))
    }
}

/// Reusable cursor over an [`ExtensionTable`].
///
/// Protocol: `bind` the bound columns, `open`, then loop
/// `while !after_last() { tuple(); dependency_set(); next(); }`.
/// An open cursor must be drained (or closed) before it is rebound or reopened.
#[derive(Debug)]
pub struct Retrieval<'a> {
    table: &'a ExtensionTable,
    bound: Vec<bool>,
    bindings: Vec<Option<Term>>,
    candidates: Vec<usize>,
    cursor: Option<usize>,
}

impl<'a> Retrieval<'a> {
    /// Fix the value of a bound column for the next `open`
    pub fn bind(&mut self, column: usize, term: impl Into<Term>) -> Result<(), RetrievalError> {
        if column >= self.table.arity || !self.bound[column] {
            return Err(RetrievalError::ColumnOutOfRange {
                column,
                arity: self.table.arity,
            });
        }
        if self.is_open() {
            return Err(RetrievalError::CursorOpen);
        }
        self.bindings[column] = Some(term.into());
        Ok(())
    }

    /// Position the cursor on the first matching tuple
    pub fn open(&mut self) -> Result<(), RetrievalError> {
        if self.is_open() {
            return Err(RetrievalError::CursorOpen);
        }

        let indexed = self
            .bindings
            .iter()
            .enumerate()
            .find_map(|(column, binding)| binding.as_ref().map(|term| (column, term)));

        self.candidates = match indexed {
            Some((column, term)) => self.table.column_index[column]
                .get(term)
                .map(|positions| {
                    positions
                        .iter()
                        .copied()
                        .filter(|&position| self.table.matches(position, &self.bindings))
                        .collect()
                })
                .unwrap_or_default(),
            None => (0..self.table.len()).collect(),
        };
        self.cursor = Some(0);
        Ok(())
    }

    /// True while the cursor sits on a tuple that has not been consumed
    pub fn is_open(&self) -> bool {
        matches!(self.cursor, Some(index) if index < self.candidates.len())
    }

    pub fn after_last(&self) -> bool {
        !self.is_open()
    }

    pub fn next(&mut self) {
        if let Some(index) = self.cursor.as_mut() {
            if *index < self.candidates.len() {
                *index += 1;
            }
        }
    }

    /// Current tuple
    pub fn tuple(&self) -> Result<&'a [Term], RetrievalError> {
        let position = self.current()?;
        Ok(&self.table.tuples[position])
    }

    /// Dependency set of the current tuple. Empty means the fact is deterministic.
    pub fn dependency_set(&self) -> Result<&'a DependencySet, RetrievalError> {
        let position = self.current()?;
        Ok(&self.table.dependencies[position])
    }

    /// Abandon the current iteration
    pub fn close(&mut self) {
        self.cursor = None;
        self.candidates.clear();
    }

    fn current(&self) -> Result<usize, RetrievalError> {
        match self.cursor {
            Some(index) if index < self.candidates.len() => Ok(self.candidates[index]),
            _ => Err(RetrievalError::NotPositioned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeId;
    use fukurow_core::AtomicConcept;

    fn create_test_table() -> ExtensionTable {
        let mut table = ExtensionTable::new(2);
        let person = AtomicConcept::new("http://example.org/Person");
        let student = AtomicConcept::new("http://example.org/Student");
        table
            .add_tuple(vec![person.clone().into(), NodeId(0).into()], DependencySet::empty())
            .unwrap();
        table
            .add_tuple(vec![student.into(), NodeId(0).into()], DependencySet::from_branches([1]))
            .unwrap();
        table
            .add_tuple(vec![person.into(), NodeId(1).into()], DependencySet::empty())
            .unwrap();
        table
    }

    fn drain(retrieval: &mut Retrieval<'_>) -> Vec<(Vec<Term>, bool)> {
        let mut rows = Vec::new();
        while !retrieval.after_last() {
            let tuple = retrieval.tuple().unwrap().to_vec();
            let deterministic = retrieval.dependency_set().unwrap().is_empty();
            rows.push((tuple, deterministic));
            retrieval.next();
        }
        rows
    }

    #[test]
    fn test_bound_on_node_column() {
        let table = create_test_table();
        let mut retrieval = table.create_retrieval(&[false, true]).unwrap();
        retrieval.bind(1, NodeId(0)).unwrap();
        retrieval.open().unwrap();

        let rows = drain(&mut retrieval);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].1);
        assert!(!rows[1].1);
    }

    #[test]
    fn test_cursor_reuse_after_drain() {
        let table = create_test_table();
        let mut retrieval = table.create_retrieval(&[false, true]).unwrap();
        retrieval.bind(1, NodeId(0)).unwrap();
        retrieval.open().unwrap();
        drain(&mut retrieval);

        retrieval.bind(1, NodeId(1)).unwrap();
        retrieval.open().unwrap();
        assert_eq!(drain(&mut retrieval).len(), 1);
    }

    #[test]
    fn test_rebinding_open_cursor_fails() {
        let table = create_test_table();
        let mut retrieval = table.create_retrieval(&[false, true]).unwrap();
        retrieval.bind(1, NodeId(0)).unwrap();
        retrieval.open().unwrap();

        assert_eq!(retrieval.bind(1, NodeId(1)), Err(RetrievalError::CursorOpen));
        assert_eq!(retrieval.open(), Err(RetrievalError::CursorOpen));

        retrieval.close();
        assert!(retrieval.bind(1, NodeId(1)).is_ok());
    }

    #[test]
    fn test_unbound_column_rejected() {
        let table = create_test_table();
        let mut retrieval = table.create_retrieval(&[false, true]).unwrap();
        assert!(matches!(
            retrieval.bind(0, NodeId(0)),
            Err(RetrievalError::ColumnOutOfRange { column: 0, .. })
        ));
        assert!(matches!(
            retrieval.bind(5, NodeId(0)),
            Err(RetrievalError::ColumnOutOfRange { column: 5, .. })
        ));
    }

    #[test]
    fn test_reading_unopened_cursor() {
        let table = create_test_table();
        let retrieval = table.create_retrieval(&[false, true]).unwrap();
        assert!(retrieval.after_last());
        assert_eq!(retrieval.tuple(), Err(RetrievalError::NotPositioned));
    }

    #[test]
    fn test_deterministic_derivation_replaces_dependencies() {
        let mut table = create_test_table();
        let student = AtomicConcept::new("http://example.org/Student");
        let tuple: Vec<Term> = vec![student.into(), NodeId(0).into()];
        assert!(!table.dependency_set_of(&tuple).unwrap().is_empty());

        assert!(table.add_tuple(tuple.clone(), DependencySet::empty()).unwrap());
        assert!(table.dependency_set_of(&tuple).unwrap().is_empty());
        assert!(!table.add_tuple(tuple, DependencySet::from_branches([4])).unwrap());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_arity_mismatch() {
        let mut table = ExtensionTable::new(3);
        assert!(table.add_tuple(vec![NodeId(0).into()], DependencySet::empty()).is_err());
        assert!(table.create_retrieval(&[true]).is_err());
    }

    mod property {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// A bound retrieval yields exactly the stored tuples matching the binding
            #[test]
            fn bound_retrieval_matches_scan(
                edges in proptest::collection::vec((0u32..6, 0u32..4, 0u32..6), 0..40),
                probe in 0u32..6,
            ) {
                let mut table = ExtensionTable::new(3);
                let role = |index: u32| Term::from(fukurow_core::AtomicRole::new(format!("http://example.org/r{}", index)));
                for (from, label, to) in &edges {
                    table
                        .add_tuple(vec![role(*label), NodeId(*from).into(), NodeId(*to).into()], DependencySet::empty())
                        .unwrap();
                }

                let mut retrieval = table.create_retrieval(&[false, true, false]).unwrap();
                retrieval.bind(1, NodeId(probe)).unwrap();
                retrieval.open().unwrap();
                let found: std::collections::BTreeSet<(u32, u32)> = drain(&mut retrieval)
                    .into_iter()
                    .map(|(tuple, _)| (tuple[1].as_node().unwrap().0, tuple[2].as_node().unwrap().0))
                    .collect();

                let expected: std::collections::BTreeSet<(u32, u32)> = edges
                    .iter()
                    .filter(|(from, _, _)| *from == probe)
                    .map(|(from, _, to)| (*from, *to))
                    .collect();
                prop_assert_eq!(found, expected);
            }
        }
    }
}
