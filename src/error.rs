use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lookup table error: {0}")]
    Lookup(String),

    #[error("Batch {0} not found")]
    BatchNotFound(Uuid),

    #[error("Batch {id} already {status}")]
    BatchConflict { id: Uuid, status: &'static str },

    #[error("Remote store error: {message}")]
    Remote { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
