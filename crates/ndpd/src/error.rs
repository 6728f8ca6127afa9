//! Error types for ndpd

use thiserror::Error;

/// Errors that can occur in ndpd
#[derive(Debug, Error)]
pub enum NdpError {
    /// Packet transport (raw socket) failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Received frame could not be decoded as neighbor discovery
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound solicitation could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Interface lookup failed
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Interface worker is gone (queue or reply channel closed)
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// Prometheus registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ndpd operations
pub type Result<T> = std::result::Result<T, NdpError>;
