// Peer link abstraction - Outbound control path to the rig controller
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::session::ControlMessage;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("peer link is not connected")]
    NotConnected,
    #[error("failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("failed to encode control message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Inbound traffic from the peer, in arrival order. `generation` increases
/// with every connection, so a `Lost` older than the newest `Connected` is stale.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    Connected { generation: u64 },
    Frame(String),
    Lost { generation: u64 },
}

/// Best-effort, at-most-once message channel to the peer.
#[async_trait]
pub trait PeerLink: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Queue a message for the peer. Delivery is not acknowledged.
    async fn send(&self, message: ControlMessage) -> Result<(), LinkError>;

    /// Drop the live connection, if any.
    async fn close(&self);
}
