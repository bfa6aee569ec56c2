//! Error types for Cardfile
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized for the host (CLI output, HTTP bodies).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Tag not found: {0}")]
    TagNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Attachment not found: {0}")]
    AttachmentNotFound(String),

    #[error("Card is locked: {0}")]
    CardLocked(String),

    #[error("Incorrect lock password")]
    InvalidLockPassword,

    #[error("No user available to own the card")]
    NoOwner,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Unsupported database type: {0}")]
    UnsupportedDatabase(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
