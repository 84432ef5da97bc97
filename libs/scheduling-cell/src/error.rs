use shared_models::AppError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    #[error("Bad input: {0}")]
    BadInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Scheduling not initialized: {0}")]
    NotInitialized(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SchedulingError {
    pub fn bad_input(message: impl Into<String>) -> Self {
        SchedulingError::BadInput(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        SchedulingError::Conflict(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SchedulingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;

impl From<SchedulingError> for AppError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::BadInput(msg) => AppError::BadRequest(msg),
            SchedulingError::Conflict(msg) => AppError::Conflict(msg),
            e @ SchedulingError::NotFound { .. } => AppError::NotFound(e.to_string()),
            e @ (SchedulingError::NotInitialized(_) | SchedulingError::Storage(_)) => {
                AppError::Internal(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_onto_shared_app_error() {
        let err: AppError = SchedulingError::conflict("slot is BOOKED").into();
        assert_eq!(err, AppError::Conflict("slot is BOOKED".to_string()));

        let err: AppError = SchedulingError::not_found("Slot", "abc").into();
        assert_eq!(err, AppError::NotFound("Slot not found: abc".to_string()));
        assert_eq!(err.status_code(), 404);

        let err: AppError = SchedulingError::Storage("lock poisoned".to_string()).into();
        assert_eq!(err.status_code(), 500);
    }
}
