//! Error handling for the application

use crate::pricing::PricingError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pricing(#[from] PricingError),
}

impl AppError {
    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Config(_) => 78,
            AppError::Io(_) | AppError::Json(_) => 66,
            AppError::Pricing(PricingError::NotFound { .. }) => 2,
            AppError::Pricing(PricingError::InvalidRange { .. }) => 64,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
