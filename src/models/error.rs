use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewardBotError {
    #[error("API error on {endpoint} (code {code}): {message}")]
    ApiError { endpoint: String, code: i64, message: String },

    #[error("Could not establish session for account {account}: {reason}")]
    SessionEstablishmentFailed { account: String, reason: String },

    #[error("Invalid account seed: {0}")]
    InvalidSeed(#[from] SeedError),

    #[error("Token store error: {0}")]
    TokenStoreError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Reasons a raw account seed could not be turned into an [`Account`](super::Account).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` is not valid percent-encoding: {message}")]
    InvalidEncoding { field: &'static str, message: String },

    #[error("identity object is malformed: {0}")]
    MalformedIdentity(String),
}

pub type Result<T> = std::result::Result<T, RewardBotError>;
