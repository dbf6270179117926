//! 複合ロール読み出し用マーカー概念
//!
//! Relations whose edges only show up after propagation through a chain get
//! one marker concept per (role, individual). The oracle loads the propagation
//! axioms below before it builds the completed model; the seeding pass then
//! reads successors off the marker's extension.

use fukurow_core::{Individual, Role, INTERNAL_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(pub u32);

/// What a marker concept stands for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// A_a: holds exactly at the individual's node
    Individual(Individual),
    /// A_a^r: holds at every node reachable from `individual` through `role`
    RoleSuccessor { role: Role, individual: Individual },
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerKind::Individual(individual) => {
                write!(f, "{}individual-concept#{}", INTERNAL_PREFIX, individual)
            }
            MarkerKind::RoleSuccessor { role: Role::Atomic(role), individual } => {
                write!(f, "{}individual-concept#{}#{}", INTERNAL_PREFIX, role, individual)
            }
            MarkerKind::RoleSuccessor { role: Role::Inverse(role), individual } => {
                write!(f, "{}individual-concept#inv#{}#{}", INTERNAL_PREFIX, role, individual)
            }
        }
    }
}

/// Axioms the oracle must load for marker propagation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropagationAxiom {
    /// marker(individual)
    IndividualMarker { marker: MarkerId, individual: Individual },
    /// from ⊑ ∀role.to
    Propagate { from: MarkerId, role: Role, to: MarkerId },
}

/// Typed side-table of marker concepts keyed by (role, individual)
#[derive(Debug, Default)]
pub struct MarkerConcepts {
    ids: HashMap<MarkerKind, MarkerId>,
    kinds: Vec<MarkerKind>,
}

impl MarkerConcepts {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, kind: MarkerKind) -> MarkerId {
        if let Some(id) = self.ids.get(&kind) {
            return *id;
        }
        let id = MarkerId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.ids.insert(kind, id);
        id
    }

    /// Register markers for every (complex role, individual) pair and return
    /// the propagation axioms they need:
    /// A_a(a), A_a ⊑ ∀r.A_a^r, A_a^r ⊑ ∀r.A_a^r
    pub fn register_complex_roles(&mut self, roles: &[Role], individuals: &[Individual]) -> Vec<PropagationAxiom> {
        let mut axioms = Vec::new();
        let mut seen = HashSet::new();
        let mut push = |axiom: PropagationAxiom| {
            if seen.insert(axiom.clone()) {
                axioms.push(axiom);
            }
        };
        for role in roles {
            for individual in individuals {
                let individual_marker = self.intern(MarkerKind::Individual(individual.clone()));
                let role_marker = self.intern(MarkerKind::RoleSuccessor {
                    role: role.clone(),
                    individual: individual.clone(),
                });

                push(PropagationAxiom::IndividualMarker {
                    marker: individual_marker,
                    individual: individual.clone(),
                });
                push(PropagationAxiom::Propagate {
                    from: individual_marker,
                    role: role.clone(),
                    to: role_marker,
                });
                push(PropagationAxiom::Propagate {
                    from: role_marker,
                    role: role.clone(),
                    to: role_marker,
                });
            }
        }
        axioms
    }

    /// Marker A_a^r, if registered
    pub fn role_marker(&self, role: &Role, individual: &Individual) -> Option<MarkerId> {
        self.ids
            .get(&MarkerKind::RoleSuccessor {
                role: role.clone(),
                individual: individual.clone(),
            })
            .copied()
    }

    /// Marker A_a, if registered
    pub fn individual_marker(&self, individual: &Individual) -> Option<MarkerId> {
        self.ids.get(&MarkerKind::Individual(individual.clone())).copied()
    }

    pub fn kind(&self, marker: MarkerId) -> Option<&MarkerKind> {
        self.kinds.get(marker.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_complex_roles() {
        let mut markers = MarkerConcepts::new();
        let ancestor = Role::atomic("http://example.org/hasAncestor");
        let alice = Individual::named("http://example.org/alice");
        let bob = Individual::named("http://example.org/bob");

        let axioms = markers.register_complex_roles(&[ancestor.clone()], &[alice.clone(), bob.clone()]);
        assert_eq!(axioms.len(), 6);
        // A_alice, A_bob, A_alice^r, A_bob^r
        assert_eq!(markers.len(), 4);

        let a_alice = markers.individual_marker(&alice).unwrap();
        let a_alice_r = markers.role_marker(&ancestor, &alice).unwrap();
        assert!(axioms.contains(&PropagationAxiom::Propagate {
            from: a_alice,
            role: ancestor.clone(),
            to: a_alice_r,
        }));
        assert!(axioms.contains(&PropagationAxiom::Propagate {
            from: a_alice_r,
            role: ancestor,
            to: a_alice_r,
        }));
    }

    #[test]
    fn test_registration_is_stable() {
        let mut markers = MarkerConcepts::new();
        let role = Role::inverse_of("http://example.org/partOf");
        let alice = Individual::named("http://example.org/alice");

        markers.register_complex_roles(&[role.clone()], &[alice.clone()]);
        let first = markers.role_marker(&role, &alice);
        markers.register_complex_roles(&[role.clone()], &[alice.clone()]);
        assert_eq!(markers.role_marker(&role, &alice), first);
        assert_eq!(markers.len(), 2);
    }

    #[test]
    fn test_marker_kind_rendering() {
        let mut markers = MarkerConcepts::new();
        let role = Role::inverse_of("http://example.org/partOf");
        let alice = Individual::named("http://example.org/alice");
        markers.register_complex_roles(&[role.clone()], &[alice.clone()]);

        let id = markers.role_marker(&role, &alice).unwrap();
        let rendered = markers.kind(id).unwrap().to_string();
        assert!(rendered.starts_with("internal:individual-concept#inv#"));
        assert!(markers.role_marker(&role.inverse(), &alice).is_none());
    }
}
