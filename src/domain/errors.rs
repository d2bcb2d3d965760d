use crate::domain::adapter_state::AdapterState;
use thiserror::Error;

/// A characteristic value that is not a valid color
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected 6 hex digits, got {0} characters")]
    InvalidLength(usize),
    #[error("invalid hex color: {0:?}")]
    InvalidHex(String),
}

/// Failures of advertising lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeripheralError {
    #[error("Bluetooth adapter is not ready ({0})")]
    AdapterNotReady(AdapterState),
    #[error("platform rejected the request: {0}")]
    Platform(String),
}

/// Failures of a notification send
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("peripheral is not ready to notify")]
    NotReady,
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
    #[error("transport busy, try again later")]
    TransportBusy,
    #[error("platform rejected the notification: {0}")]
    Platform(String),
}

/// Failures reported by the platform transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Outgoing queue is full; the platform signals readiness later
    #[error("transmit queue full")]
    Busy,
    #[error("{0}")]
    Failed(String),
}

impl From<TransportError> for SendError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Busy => SendError::TransportBusy,
            TransportError::Failed(reason) => SendError::Platform(reason),
        }
    }
}
