use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document not found: {0}")]
    NoSuchDocument(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid table name: {0}")]
    InvalidTable(String),

    #[error("Storage corrupted: {0}")]
    Corrupted(String),

    #[error("Config error: {0}")]
    Config(String),
}
