use thiserror::Error;

/// The taxonomy from the ingestion and worker error model. Each variant maps
/// to one HTTP status at the gateway boundary and one handling rule at the
/// worker/scheduler boundary; see the gateway's error mapping and the
/// worker's classification handling.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bus unavailable: {0}")]
    BusUnavailable(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    pub fn http_status(&self) -> u16 {
        match self {
            DomainError::InvalidInput(_) => 400,
            DomainError::Unauthorized => 401,
            DomainError::NotFound(_) => 404,
            DomainError::Conflict(_) => 409,
            DomainError::BusUnavailable(_) => 503,
            DomainError::StoreUnavailable(_) => 503,
            DomainError::Internal(_) => 500,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DomainError::InvalidInput(_) => "INVALID_INPUT",
            DomainError::Unauthorized => "UNAUTHORIZED",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::BusUnavailable(_) => "BUS_UNAVAILABLE",
            DomainError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            DomainError::Internal(_) => "INTERNAL",
        }
    }
}
