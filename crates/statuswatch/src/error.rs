//! Error types for the statuswatch data layer

/// Errors that can occur in the statuswatch data layer.
///
/// The enum is `Clone` because a single fetch outcome is broadcast to every
/// caller coalesced onto the same in-flight request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StatusError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream API error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Probe error: {0}")]
    Probe(String),
}

/// Result type alias for statuswatch operations
pub type Result<T> = std::result::Result<T, StatusError>;
