use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("VALIDATION: {message} (fields: {})", .fields.join(", "))]
    Validation { message: String, fields: Vec<String> },
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("FORBIDDEN: {0}")]
    Forbidden(String),
    #[error("MALFORMED_DECIMAL: {0}")]
    MalformedDecimal(String),
    #[error("PERSISTENCE: {0}")]
    Persistence(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>, fields: &[&str]) -> Self {
        Self::Validation {
            message: message.into(),
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Row-parse helpers tunnel typed errors (malformed stored decimals)
            // through rusqlite's user-error slot.
            rusqlite::Error::UserFunctionError(inner) => match inner.downcast::<AppError>() {
                Ok(app) => *app,
                Err(other) => Self::Persistence(other.to_string()),
            },
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
