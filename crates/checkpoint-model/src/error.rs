use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid checkpoint status code: {0}")]
    InvalidStatus(u8),

    #[error("invalid source type code: {0}")]
    InvalidSourceType(i32),

    #[error("invalid compression code: {0}")]
    InvalidCompression(i32),

    #[error("invalid checkpoint target: {0}")]
    InvalidTarget(String),
}
