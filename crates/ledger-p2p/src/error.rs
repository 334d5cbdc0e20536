use ledger_core::ChainError;
use thiserror::Error;

/// Reasons an inbound frame is dropped without reply.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message type {0}")]
    UnknownType(u8),

    #[error("blockchain response without payload")]
    MissingPayload,

    #[error("blockchain response with no blocks")]
    EmptyChain,
}

#[derive(Debug, Error)]
pub enum P2pError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
