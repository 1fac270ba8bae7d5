use thiserror::Error;

use crate::transport::TransportError;
use crate::validator::Rejection;

/// Why a single destination did not receive its message.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("transport setup failed: {0}")]
    Connect(#[from] TransportError),

    #[error("image URL rejected: {0}")]
    Validation(#[from] Rejection),

    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}
