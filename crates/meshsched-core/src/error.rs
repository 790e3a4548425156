//! Error types for meshsched

use thiserror::Error;

/// Resource-level failure raised while checking or applying a placement.
///
/// These are ordinary negative search results: strategies catch them and move
/// on to the next candidate instead of aborting the scheduling call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Referenced application, component, node or route is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Node does not have enough free CPU
    #[error("Insufficient CPU on node {node}")]
    InsufficientCpu { node: String },

    /// Node does not have enough free memory
    #[error("Insufficient memory on node {node}")]
    InsufficientMemory { node: String },

    /// Aggregate outgoing link bandwidth of a node is too small
    #[error("Insufficient bandwidth on node {node}")]
    InsufficientBandwidth { node: String },

    /// A specific route cannot carry the requested demand
    #[error("Insufficient path bandwidth from {src} to {dst}")]
    InsufficientPathBandwidth { src: String, dst: String },
}

impl ResourceError {
    /// Shorthand for [`ResourceError::InsufficientPathBandwidth`]
    pub fn path(src: &str, dst: &str) -> Self {
        ResourceError::InsufficientPathBandwidth {
            src: src.to_string(),
            dst: dst.to_string(),
        }
    }
}

/// Main error type for meshsched
#[derive(Error, Debug)]
pub enum MeshError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed node/link/route input
    #[error("Topology error: {0}")]
    Topology(String),

    /// Application violates its own invariants
    #[error("Invalid application: {0}")]
    InvalidApplication(String),

    /// No strategy run found a complete placement
    #[error("Application {app} could not be scheduled: {reason}")]
    Unschedulable { app: String, reason: String },

    /// Resource error surfaced outside of a search
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV input error
    #[error("CSV error: {0}")]
    Csv(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for meshsched operations
pub type MeshResult<T> = Result<T, MeshError>;

impl From<csv::Error> for MeshError {
    fn from(err: csv::Error) -> Self {
        MeshError::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MeshError {
    fn from(err: toml::de::Error) -> Self {
        MeshError::Config(err.to_string())
    }
}
