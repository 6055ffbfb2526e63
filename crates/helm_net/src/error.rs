//! Network-layer error types.

/// Transport and encoding failures.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("failed to encode message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("invalid JSON message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("NATS subscribe error: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),

    #[error("NATS publish error: {0}")]
    Publish(#[from] async_nats::PublishError),

    #[error("NATS connection error: {0}")]
    Connect(#[from] async_nats::ConnectError),

    /// A subject segment would break the hierarchy (empty, or containing
    /// `.`, `*`, `>` or whitespace).
    #[error("invalid subject segment: {0:?}")]
    InvalidSubject(String),
}
