use thiserror::Error;

/// A rejected field in a provisioning entry or parameter block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Binary framing error: {0}")]
    Framing(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        AppError::Precondition(msg.into())
    }

    /// Wraps the error with a message naming the operation and identifier.
    pub fn context(self, context: impl Into<String>) -> Self {
        AppError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any context layers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), AppError::NotFound(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.root(), AppError::Unauthorized(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), AppError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = AppError::from(ValidationError::new("provisioning.interfaces[0].identifier", "must not be empty"));
        assert_eq!(
            err.to_string(),
            "Validation error: provisioning.interfaces[0].identifier: must not be empty"
        );
    }

    #[test]
    fn test_context_keeps_root() {
        let err = AppError::NotFound("peer p1".to_string()).context("failed to fetch peer p1");
        assert_eq!(err.to_string(), "failed to fetch peer p1: Not found: peer p1");
        assert!(err.is_not_found());
        assert!(!err.is_cancelled());
    }
}
