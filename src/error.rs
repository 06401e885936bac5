//! Error types for Courier.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Messaging-channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send to {conversation} on channel {name}: {reason}")]
    SendFailed {
        name: String,
        conversation: String,
        reason: String,
    },

    #[error("Send to {conversation} timed out")]
    SendTimeout { conversation: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },
}

/// Command handling errors.
///
/// Every variant maps to exactly one user-visible reply; internal detail
/// stays in the logs.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Bad user input. The payload is the full usage reply.
    #[error("validation failed")]
    Validation(String),

    /// Privilege check failed. No handler side effects occurred.
    #[error("admin privileges required")]
    PermissionDenied,

    /// Referenced entity absent. The payload is the informational reply.
    #[error("not found")]
    NotFound(String),

    /// Store or channel call failed. Retried only via the next natural cycle.
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        CommandError::Upstream(e.to_string())
    }
}

impl From<ChannelError> for CommandError {
    fn from(e: ChannelError) -> Self {
        CommandError::Upstream(e.to_string())
    }
}

/// External content-lookup errors (weather/quote/joke/translate).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} service not configured")]
    NotConfigured(&'static str),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        ServiceError::Request(e.to_string())
    }
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
