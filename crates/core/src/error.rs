use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlmanacError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Invalid date '{value}': {reason}")]
    InvalidDate { value: String, reason: String },

    #[error("Invalid anniversary '{name}': {reason}")]
    InvalidAnniversary { name: String, reason: String },

    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    #[error("{0}")]
    Other(String),
}
