//! # Fukurow Core
//!
//! 実現化 (instance realization) で共有される語彙
//! concepts, roles, individuals と依存集合 (dependency sets)

pub mod model;

pub use model::*;

#[cfg(test)]
mod tests {
    use super::*;

    mod iri_tests {
        use super::*;

        #[test]
        fn test_iri_interning_shares_equal_values() {
            let a = OwlIri::new("http://example.org/Person");
            let b = OwlIri::new(String::from("http://example.org/Person"));
            assert_eq!(a, b);
            assert_eq!(a.as_str(), "http://example.org/Person");
            assert!(std::ptr::eq(a.as_str(), b.as_str()));
        }

        #[test]
        fn test_internal_iri_detection() {
            assert!(OwlIri::new("internal:individual-concept#a").is_internal());
            assert!(!OwlIri::new("http://example.org/a").is_internal());
        }

        #[test]
        fn test_iri_serializes_as_plain_string() {
            let iri = OwlIri::new("http://example.org/x");
            let json = serde_json::to_string(&iri).unwrap();
            assert_eq!(json, "\"http://example.org/x\"");
        }
    }

    mod concept_tests {
        use super::*;

        #[test]
        fn test_sentinels() {
            assert!(AtomicConcept::thing().is_thing());
            assert!(AtomicConcept::nothing().is_nothing());
            assert!(!AtomicConcept::new("http://example.org/A").is_thing());
        }

        #[test]
        fn test_role_sentinels() {
            assert!(AtomicRole::top().is_top());
            assert!(AtomicRole::bottom().is_bottom());
        }
    }

    mod role_tests {
        use super::*;

        #[test]
        fn test_inverse_is_involution() {
            let r = Role::atomic("http://example.org/hasParent");
            assert!(r.inverse().is_inverse());
            assert_eq!(r.inverse().inverse(), r);
            assert_eq!(r.inverse().underlying(), r.underlying());
        }

        #[test]
        fn test_as_atomic() {
            let r = Role::atomic("http://example.org/r");
            assert!(r.as_atomic().is_some());
            assert!(r.inverse().as_atomic().is_none());
        }
    }

    mod individual_tests {
        use super::*;

        #[test]
        fn test_result_relevance() {
            assert!(Individual::named("http://example.org/alice").is_result_relevant());
            assert!(!Individual::named("internal:nom#alice").is_result_relevant());
            assert!(!Individual::anonymous("b0").is_result_relevant());
        }

        #[test]
        fn test_display() {
            assert_eq!(Individual::anonymous("b1").to_string(), "_:b1");
        }
    }

    mod dependency_set_tests {
        use super::*;

        #[test]
        fn test_empty_is_deterministic() {
            assert!(DependencySet::empty().is_deterministic());
            assert!(!DependencySet::from_branches([3]).is_deterministic());
        }

        #[test]
        fn test_union() {
            let a = DependencySet::from_branches([1, 2]);
            let b = DependencySet::from_branches([2, 5]);
            let branches: Vec<u32> = a.union(&b).branches().collect();
            assert_eq!(branches, vec![1, 2, 5]);
        }
    }
}
