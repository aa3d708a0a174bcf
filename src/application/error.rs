use thiserror::Error;

use crate::{application::transport::TransportError, config::LoadError, infra::error::InfraError};

/// Failure of a coordinated fetch.
///
/// `Clone` because one in-flight outcome is delivered to every loader that
/// joined it.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("failed to decode {entity} response: {message}")]
    Decode {
        entity: &'static str,
        message: String,
    },
    #[error("in-flight fetch ended without an outcome")]
    Abandoned,
}

impl FetchError {
    pub fn decode(entity: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            entity,
            message: message.into(),
        }
    }

    /// True when the failure came from an unreachable network rather than
    /// from the server answering with an error.
    pub fn is_offline(&self) -> bool {
        matches!(self, FetchError::Transport(TransportError::Offline { .. }))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
    #[error("failed to write output: {0}")]
    Output(#[from] serde_json::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Process exit code for the command-line binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 78,
            AppError::NotFound { .. } => 2,
            AppError::Fetch(FetchError::Transport(TransportError::Offline { .. })) => 69,
            AppError::Fetch(_) | AppError::Infra(_) | AppError::Output(_) => 1,
        }
    }
}
