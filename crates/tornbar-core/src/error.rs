use thiserror::Error;

/// Failures outside a single fetch cycle
///
/// Fetch failures themselves never surface here; they end up as the
/// user-visible error string on [`crate::AppState`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StoreError(#[from] tornbar_store::StoreError),

    #[error("API error: {0}")]
    ApiError(#[from] tornbar_api::TornError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Poller has shut down")]
    PollerClosed,
}
