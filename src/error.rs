//! Error type for the boundary layer (file loading, configuration checks).
//!
//! The optimization core never fails: infeasible routes are reported through
//! [`crate::matrix::Cost::Unreachable`] instead.

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid matrix: {0}")]
    InvalidMatrix(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown problem {0} (expected 1..=12)")]
    UnknownProblem(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_matrix(message: impl Into<String>) -> Self {
        Self::InvalidMatrix(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
