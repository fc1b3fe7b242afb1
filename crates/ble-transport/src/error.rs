use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("adapter not found: {0}")]
    AdapterNotFound(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
