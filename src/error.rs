use thiserror::Error;

use crate::audio::graph::{NodeId, NodeRole};

/// Failures recorded by the signal tap. None of these cross into the host:
/// the tap stores the most recent one and degrades to "no data".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TapError {
    /// The audio graph could not be created or resumed.
    #[error("audio context could not be initialized: {0}")]
    InitializationFailure(String),

    /// A media element could not be bound to the analysis graph.
    #[error("media source could not be connected: {0}")]
    ConnectionFailure(String),

    /// A node or edge operation was rejected by the graph.
    #[error("audio graph error: {0}")]
    Graph(#[from] GraphError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("audio context is closed")]
    ContextClosed,

    #[error("cannot connect {from} ({from_role}) to {to} ({to_role})")]
    InvalidEdge {
        from: NodeId,
        from_role: NodeRole,
        to: NodeId,
        to_role: NodeRole,
    },

    #[error("connecting {from} to {to} would create a cycle")]
    Cycle { from: NodeId, to: NodeId },

    #[error("fft size {0} must be a power of two between 32 and 32768")]
    InvalidFftSize(usize),
}
