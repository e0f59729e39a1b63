//! Error types for host audio primitives

use thiserror::Error;

use crate::graph::{NodeId, NodeKind};

/// Host graph error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Node id was not created by this host
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Disconnect requested for an edge that does not exist
    #[error("Not connected: {from} -> {to}")]
    NotConnected { from: NodeId, to: NodeId },

    /// Handle points at a node of another kind
    #[error("Node {node} is not a {expected:?} node")]
    KindMismatch { node: NodeId, expected: NodeKind },

    /// Parameter value out of range
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),
}

/// Result type for host operations
pub type CoreResult<T> = Result<T, CoreError>;
