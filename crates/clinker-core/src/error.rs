use thiserror::Error;

/// Top-level error type shared by the Clinker crates.
///
/// Subsystem crates define their own error types and implement
/// `From<ClinkerError>` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClinkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<toml::de::Error> for ClinkerError {
    fn from(err: toml::de::Error) -> Self {
        ClinkerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ClinkerError {
    fn from(err: toml::ser::Error) -> Self {
        ClinkerError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ClinkerError {
    fn from(err: serde_json::Error) -> Self {
        ClinkerError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Clinker operations.
pub type Result<T> = std::result::Result<T, ClinkerError>;
