//! テーブルロー完成モデル (completed model) インターフェース
//!
//! このクレートは実現化が参照する外部協調者を提供します:
//! - 完成モデル (nodes, merges, extension tables)
//! - 列束縛カーソルによる索引付き検索 (column-bound retrieval)
//! - 複合ロール読み出し用のマーカー概念 (typed side-table)
//! - 充足可能性オラクル (`Oracle`) と参照実装 `EntailmentOracle`

pub mod model;
pub mod tableau;
pub mod retrieval;
pub mod markers;
pub mod oracle;

pub use model::{NodeId, NodeType, Predicate, Term};
pub use tableau::CompletionModel;
pub use retrieval::{ExtensionTable, Retrieval};
pub use markers::{MarkerConcepts, MarkerId, MarkerKind, PropagationAxiom};
pub use oracle::{EntailmentOracle, Fact, Oracle, OracleExt, SatisfiabilityQuery, TaskDescription};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableauError {
    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Unknown model node: {0}")]
    UnknownNode(NodeId),
}

/// Misuse of an extension table or one of its cursors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("Column {column} out of range for arity {arity}")]
    ColumnOutOfRange { column: usize, arity: usize },

    #[error("Cursor is open and has not been drained")]
    CursorOpen,

    #[error("Cursor is not positioned on a tuple")]
    NotPositioned,
}

/// Failure reported by the decision procedure itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Decision procedure failed: {0}")]
    DecisionFailed(String),
}

impl From<OracleError> for TableauError {
    fn from(err: OracleError) -> Self {
        TableauError::Oracle(err.to_string())
    }
}
