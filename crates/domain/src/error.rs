use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
    #[error("forbidden")]
    Forbidden,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DomainError::Unavailable(_))
    }
}
