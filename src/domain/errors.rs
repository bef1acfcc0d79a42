use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Order not found")]
    NotFound,
    #[error("Order belongs to another user")]
    Forbidden,
    #[error("Order cannot be cancelled in status {0}")]
    NotCancellable(String),
    #[error("Cancellation window closed")]
    CancellationWindowClosed,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Upstream failure: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure talking to the catalog service.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog http error: {0}")]
    Http(String),
    #[error("catalog response error: {0}")]
    Response(String),
    #[error("catalog payload error: {0}")]
    Payload(String),
}

/// Failure talking to the language model service.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model http error: {0}")]
    Http(String),
    #[error("model response error: {0}")]
    Response(String),
    #[error("model call timed out after {0}s")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

impl From<CatalogError> for DomainError {
    fn from(e: CatalogError) -> Self {
        DomainError::Upstream(e.to_string())
    }
}

impl From<ModelError> for DomainError {
    fn from(e: ModelError) -> Self {
        DomainError::Upstream(e.to_string())
    }
}

impl From<tokio::task::JoinError> for DomainError {
    fn from(e: tokio::task::JoinError) -> Self {
        DomainError::Internal(e.to_string())
    }
}
