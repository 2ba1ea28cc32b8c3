//! Error types for pptpd administration operations.

use thiserror::Error;

use crate::validate::ValidationError;

#[derive(Error, Debug)]
pub enum PptpctlError {
    #[error("Command failed: {command} - {message}")]
    CommandFailed { command: String, message: String },

    #[error("Permission denied. Run with sudo.")]
    PermissionDenied,

    #[error("Failed to parse {0}")]
    ParseError(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PptpctlError>;
