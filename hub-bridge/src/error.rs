//! Typed failure domains for the bridge pipeline and its collaborators.

use thiserror::Error;

/// Failures reported by the source-protocol stack.
///
/// The stack owns connection and encoding details; these variants only
/// distinguish outcomes the reconciliation path reacts to differently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("node id '{0}' is unknown on the server")]
    NodeUnknown(String),

    #[error("access denied for node id '{0}'")]
    AccessDenied(String),

    #[error("endpoint '{0}' is unreachable")]
    EndpointUnreachable(String),

    #[error("source stack failure: {0}")]
    Internal(String),
}

/// Failures reported by the hub-transport collaborator for one batch.
///
/// Any retry for transient network errors happens inside the transport,
/// below the batch boundary. The pipeline treats every variant as one
/// terminal failure for the batch it was sending.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("hub transport is not connected")]
    NotConnected,

    #[error("hub rejected the message: {0}")]
    Rejected(String),

    #[error("hub transport failure: {0}")]
    Transport(String),
}

/// Per-node failures collected during reconciliation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("could not create subscription on '{endpoint}': {source}")]
    SubscriptionCreate {
        endpoint: String,
        source: SourceError,
    },

    #[error("could not create monitored item for '{node_id}': {source}")]
    ItemCreate {
        node_id: String,
        source: SourceError,
    },

    /// An earlier item for the node is still awaiting deletion on the
    /// stack; creating the new one now would leave two live items.
    #[error("previous monitored item for '{node_id}' is still pending removal")]
    RemovalPending { node_id: String },
}

/// Failures surfaced by the outward bridge API.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("endpoint '{0}' is not configured")]
    UnknownEndpoint(String),

    #[error("continuation token is stale or malformed")]
    InvalidContinuationToken,

    #[error("bridge is shut down")]
    ShutDown,

    #[error("invalid telemetry configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Failures detected while materializing configuration at load time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid regex pattern '{pattern}' for field '{field}': {source}")]
    InvalidPattern {
        field: String,
        pattern: String,
        source: regex::Error,
    },
}
