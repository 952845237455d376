use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Start time must be before end time")]
    InvalidRange,

    #[error("Day of week must be between 1 (Monday) and 7 (Sunday), got {0}")]
    InvalidDayOfWeek(u32),

    #[error("Schedule conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ScheduleError {
    fn from(err: anyhow::Error) -> Self {
        ScheduleError::Database(err.to_string())
    }
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::InvalidRange
            | ScheduleError::InvalidDayOfWeek(_)
            | ScheduleError::Validation(_) => AppError::ValidationError(err.to_string()),
            ScheduleError::NotFound(_) => AppError::NotFound(err.to_string()),
            ScheduleError::Conflict(msg) => AppError::Conflict(msg),
            ScheduleError::Database(msg) => AppError::Database(msg),
        }
    }
}
