use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("Resource not found")]
    NotFound,
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

pub type DaoResult<T> = Result<T, DaoError>;
