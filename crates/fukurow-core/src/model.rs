//! 実現化で扱う語彙モデル (concepts, roles, individuals)

use lazy_static::lazy_static;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// IRI prefix reserved for bookkeeping predicates and individuals.
pub const INTERNAL_PREFIX: &str = "internal:";

pub const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";
pub const OWL_NOTHING: &str = "http://www.w3.org/2002/07/owl#Nothing";
pub const OWL_TOP_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#topObjectProperty";
pub const OWL_BOTTOM_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#bottomObjectProperty";

lazy_static! {
    /// Global IRI interning pool
    static ref IRI_POOL: RwLock<HashMap<Arc<str>, ()>> = RwLock::new(HashMap::new());
}

/// Interned IRI. Clones share one allocation per distinct IRI string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwlIri(Arc<str>);

impl OwlIri {
    /// Create a new IRI, reusing the pooled allocation when one exists
    pub fn new<S: AsRef<str>>(s: S) -> Self {
        let s = s.as_ref();
        {
            let pool = IRI_POOL.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some((interned, _)) = pool.get_key_value(s) {
                return OwlIri(Arc::clone(interned));
            }
        }
        let mut pool = IRI_POOL.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some((interned, _)) = pool.get_key_value(s) {
            return OwlIri(Arc::clone(interned));
        }
        let interned: Arc<str> = Arc::from(s);
        pool.insert(Arc::clone(&interned), ());
        OwlIri(interned)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for IRIs in the reserved `internal:` namespace
    pub fn is_internal(&self) -> bool {
        self.0.starts_with(INTERNAL_PREFIX)
    }
}

impl std::fmt::Display for OwlIri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OwlIri {
    fn from(s: &str) -> Self {
        OwlIri::new(s)
    }
}

impl From<String> for OwlIri {
    fn from(s: String) -> Self {
        OwlIri::new(s)
    }
}

impl AsRef<str> for OwlIri {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Serialize for OwlIri {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OwlIri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(OwlIri::new(s))
    }
}

/// Named class (owl:Thing and owl:Nothing included)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomicConcept(pub OwlIri);

impl AtomicConcept {
    pub fn new<S: AsRef<str>>(iri: S) -> Self {
        Self(OwlIri::new(iri))
    }

    /// owl:Thing (⊤)
    pub fn thing() -> Self {
        Self::new(OWL_THING)
    }

    /// owl:Nothing (⊥)
    pub fn nothing() -> Self {
        Self::new(OWL_NOTHING)
    }

    pub fn iri(&self) -> &OwlIri {
        &self.0
    }

    pub fn is_thing(&self) -> bool {
        self.0.as_str() == OWL_THING
    }

    pub fn is_nothing(&self) -> bool {
        self.0.as_str() == OWL_NOTHING
    }

    pub fn is_internal(&self) -> bool {
        self.0.is_internal()
    }
}

impl std::fmt::Display for AtomicConcept {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named object property
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AtomicRole(pub OwlIri);

impl AtomicRole {
    pub fn new<S: AsRef<str>>(iri: S) -> Self {
        Self(OwlIri::new(iri))
    }

    /// owl:topObjectProperty
    pub fn top() -> Self {
        Self::new(OWL_TOP_OBJECT_PROPERTY)
    }

    /// owl:bottomObjectProperty
    pub fn bottom() -> Self {
        Self::new(OWL_BOTTOM_OBJECT_PROPERTY)
    }

    pub fn iri(&self) -> &OwlIri {
        &self.0
    }

    pub fn is_top(&self) -> bool {
        self.0.as_str() == OWL_TOP_OBJECT_PROPERTY
    }

    pub fn is_bottom(&self) -> bool {
        self.0.as_str() == OWL_BOTTOM_OBJECT_PROPERTY
    }

    pub fn is_internal(&self) -> bool {
        self.0.is_internal()
    }
}

impl std::fmt::Display for AtomicRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object property expression: R or R⁻
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Atomic(AtomicRole),
    Inverse(AtomicRole),
}

impl Role {
    pub fn atomic<S: AsRef<str>>(iri: S) -> Self {
        Role::Atomic(AtomicRole::new(iri))
    }

    pub fn inverse_of<S: AsRef<str>>(iri: S) -> Self {
        Role::Inverse(AtomicRole::new(iri))
    }

    /// R ↦ R⁻, R⁻ ↦ R
    pub fn inverse(&self) -> Role {
        match self {
            Role::Atomic(role) => Role::Inverse(role.clone()),
            Role::Inverse(role) => Role::Atomic(role.clone()),
        }
    }

    /// The atomic role underneath, regardless of direction
    pub fn underlying(&self) -> &AtomicRole {
        match self {
            Role::Atomic(role) | Role::Inverse(role) => role,
        }
    }

    pub fn as_atomic(&self) -> Option<&AtomicRole> {
        match self {
            Role::Atomic(role) => Some(role),
            Role::Inverse(_) => None,
        }
    }

    pub fn is_inverse(&self) -> bool {
        matches!(self, Role::Inverse(_))
    }
}

impl From<AtomicRole> for Role {
    fn from(role: AtomicRole) -> Self {
        Role::Atomic(role)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Atomic(role) => write!(f, "{}", role),
            Role::Inverse(role) => write!(f, "inverse({})", role),
        }
    }
}

/// OWL Individual
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Individual {
    /// Named individual
    Named(OwlIri),
    /// Anonymous individual (blank node id)
    Anonymous(String),
}

impl Individual {
    pub fn named<S: AsRef<str>>(iri: S) -> Self {
        Individual::Named(OwlIri::new(iri))
    }

    pub fn anonymous<S: Into<String>>(id: S) -> Self {
        Individual::Anonymous(id.into())
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Individual::Anonymous(_))
    }

    pub fn is_internal(&self) -> bool {
        match self {
            Individual::Named(iri) => iri.is_internal(),
            Individual::Anonymous(_) => false,
        }
    }

    /// Whether this individual may appear in results handed to callers
    pub fn is_result_relevant(&self) -> bool {
        !self.is_anonymous() && !self.is_internal()
    }
}

impl std::fmt::Display for Individual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Individual::Named(iri) => write!(f, "{}", iri),
            Individual::Anonymous(id) => write!(f, "_:{}", id),
        }
    }
}

/// Non-deterministic choice points a derived fact relies on.
/// Empty means the fact holds unconditionally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencySet(BTreeSet<u32>);

impl DependencySet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn from_branches<I: IntoIterator<Item = u32>>(branches: I) -> Self {
        Self(branches.into_iter().collect())
    }

    /// True when the fact does not depend on any branching decision
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_deterministic(&self) -> bool {
        self.is_empty()
    }

    pub fn branches(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn union(&self, other: &DependencySet) -> DependencySet {
        DependencySet(self.0.union(&other.0).copied().collect())
    }
}
