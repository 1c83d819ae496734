use thiserror::Error;

pub type SluiceResult<T> = std::result::Result<T, SluiceError>;
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SluiceError {
    #[error("{0:?}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("{0}")]
    FieldNotFound(String),
    #[error("{0}")]
    SchemaMismatch(String),
    #[error("{0}")]
    TypeError(String),
    #[error("{0}")]
    ValueError(String),
    #[error("{0:?}")]
    FmtError(#[from] std::fmt::Error),
    #[error("{0}")]
    InternalError(String),
    #[error("{0:?}")]
    External(GenericError),
}

impl SluiceError {
    /// Whether this error signals a defect in the planner rather than bad user input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::InternalError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_are_flagged() {
        assert!(SluiceError::InternalError("bad position".into()).is_internal());
        assert!(!SluiceError::ValueError("bad input".into()).is_internal());
    }

    #[test]
    fn messages_are_passed_through() {
        let err = SluiceError::FieldNotFound("position 7 out of range".into());
        assert_eq!(err.to_string(), "position 7 out of range");
    }
}
