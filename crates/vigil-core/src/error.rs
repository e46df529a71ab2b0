//! Error types for the inspection core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VigilError {
    #[error("guard not found: {0}")]
    GuardNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
