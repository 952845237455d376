use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        UserError::Database(err.to_string())
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(_) => AppError::NotFound(err.to_string()),
            UserError::Conflict(msg) => AppError::Conflict(msg),
            UserError::Validation(msg) => AppError::ValidationError(msg),
            UserError::Database(msg) => AppError::Database(msg),
        }
    }
}
