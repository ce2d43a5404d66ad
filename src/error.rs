//! Error handling and custom error types
//!
//! Provides unified error handling across the application using thiserror.
//! Every variant falls into one of the categories the workflow reports on:
//! validation, local I/O, remote model, configuration or internal.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Remote(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Invariant violation: {0}")]
    Invariant(String),
}

/// Coarse classification used to decide where a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Io,
    Remote,
    Config,
    Internal,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Validation(_) => ErrorCategory::Validation,
            Error::Io(_) => ErrorCategory::Io,
            Error::Serialization(_) | Error::Http(_) | Error::Remote(_) => ErrorCategory::Remote,
            Error::Config(_) | Error::EnvVar(_) => ErrorCategory::Config,
            Error::Invariant(_) => ErrorCategory::Internal,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }
}

pub type Result<T> = std::result::Result<T, Error>;
