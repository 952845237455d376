use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for DoctorError {
    fn from(err: anyhow::Error) -> Self {
        DoctorError::Database(err.to_string())
    }
}

impl From<schedule_cell::ScheduleError> for DoctorError {
    fn from(err: schedule_cell::ScheduleError) -> Self {
        use schedule_cell::ScheduleError;
        match err {
            ScheduleError::NotFound(what) => DoctorError::NotFound(what),
            ScheduleError::Conflict(msg) => DoctorError::Conflict(msg),
            other => DoctorError::Database(other.to_string()),
        }
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound(_) => AppError::NotFound(err.to_string()),
            DoctorError::Conflict(msg) => AppError::Conflict(msg),
            DoctorError::Validation(msg) => AppError::ValidationError(msg),
            DoctorError::Database(msg) => AppError::Database(msg),
        }
    }
}
