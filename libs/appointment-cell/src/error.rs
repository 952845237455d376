use thiserror::Error;

use shared_models::error::AppError;

use crate::models::AppointmentStatus;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Appointment datetime must be in the future")]
    PastDateTime,

    #[error("Invalid status transition from {from:?} to {to:?}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::Database(err.to_string())
    }
}

impl From<schedule_cell::ScheduleError> for AppointmentError {
    fn from(err: schedule_cell::ScheduleError) -> Self {
        use schedule_cell::ScheduleError;
        match err {
            ScheduleError::NotFound(what) => AppointmentError::NotFound(what),
            ScheduleError::Conflict(msg) => AppointmentError::Conflict(msg),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::PastDateTime => AppError::ValidationError(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Database(msg) => AppError::Database(msg),
        }
    }
}
