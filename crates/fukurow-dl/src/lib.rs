//! OWL インスタンス実現化 (instance realization)
//!
//! このクレートは完成モデルからの実現化を提供します:
//! - 包摂階層 (hierarchy) とその構築
//! - known / possible インスタンスの要素レコードと支配関係 (dominance) の維持
//! - 完成モデルからの読み出し (seeding)
//! - 一括および遅延実現化 (realize / lazy queries)
//! - sameAs 同値類の遅延解決

pub mod hierarchy;
pub mod builder;
pub mod element;
pub mod config;
pub mod progress;
pub mod instance_manager;
pub mod seeding;
pub mod realization;
pub mod queries;
pub mod same_as;

pub use hierarchy::{Hierarchy, HierarchyNode, NodeIndex, Transformer};
pub use builder::HierarchyBuilder;
pub use element::{ConceptElement, ElementLayer, ElementRecord, RoleElement};
pub use config::{ProgressConfig, RealizationConfig};
pub use progress::{NoopProgressMonitor, ProgressMonitor, TracingProgressMonitor};
pub use instance_manager::{
    build_told_concept_hierarchy, build_told_role_hierarchy, remove_inverses, InstanceManager, ToldAxioms,
};
pub use same_as::{ClassId, IdentityPartition};

pub use fukurow_core::{AtomicConcept, AtomicRole, Individual, Role};
pub use fukurow_tableau::{OracleError, RetrievalError};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealizationError {
    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("Element collision: {0}")]
    ElementCollision(String),

    #[error("Hierarchy is missing a top or bottom sentinel")]
    MissingSentinel,
}
