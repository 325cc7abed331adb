//! Error types for graph construction, resolution queries, and evaluation.

use crate::graph::{EdgeId, Known, NodeId, NodeKind};

/// Errors raised by the resolution engine and the evaluation runtime.
///
/// Every error is local to the call that raised it. The propagation engine
/// itself never fails: a node either resolves cleanly or stays unresolved.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An edge was attached to an equation whose topology is already frozen.
    #[error("lifecycle error: equation `{equation}` is finalized, cannot attach edge")]
    Lifecycle { equation: String },

    /// A report was requested from an equation that has not resolved.
    #[error("equation `{equation}` has not resolved")]
    Unresolved { equation: String },

    /// A level was requested for a node that is not on a used path.
    #[error("node `{name}` is not used")]
    UnusedNode { name: String },

    /// A known variable whose recorded source is missing or inconsistent.
    #[error("variable `{variable}` has an invalid source")]
    InvalidSource { variable: String },

    /// A node was reached again while its own dependencies were pending.
    #[error("node `{name}` depends on itself")]
    Cycle { name: String },

    /// Malformed input to bulk variable creation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("node {0} does not exist in this network")]
    UnknownNode(NodeId),

    #[error("edge {0} does not exist in this network")]
    UnknownEdge(EdgeId),

    #[error("node `{name}` is not a {expected}")]
    NodeKind { name: String, expected: NodeKind },

    /// A variable can become known exactly once.
    #[error("variable `{variable}` is already resolved as {known}")]
    AlreadyResolved { variable: String, known: Known },

    #[error("equation `{equation}` has no factory")]
    MissingFactory { equation: String },

    #[error("factory of `{equation}` has no calculation for `{key}`")]
    MissingScheme { equation: String, key: String },

    #[error("calculation of `{equation}` produced no output `{key}`")]
    MissingOutput { equation: String, key: String },

    #[error("calculation of `{equation}` has no input `{key}`")]
    MissingInput { equation: String, key: String },

    /// A source value was read before anything set it.
    #[error("variable `{variable}` has no value")]
    Unset { variable: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
