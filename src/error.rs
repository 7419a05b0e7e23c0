//! Error types for txnwire.

use thiserror::Error;

/// Main error type for all marshaling operations.
#[derive(Debug, Error)]
pub enum TxnWireError {
    /// I/O error on a stream transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack encode error for typed control payloads.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack decode error for typed control payloads.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Malformed wire buffer (short header, bad sizes, zero counts, ...).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The SG list did not reach its terminator within the fragment bound.
    #[error("SG list not terminated within {limit} fragments")]
    UnterminatedSgList { limit: usize },

    /// Serialized transaction exceeds the configured maximum.
    #[error("Transaction size {size} exceeds maximum {max}")]
    TransactionTooLarge { size: usize, max: usize },

    /// Returned control buffer length differs from the original.
    #[error("Control buffer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Returned SG fragment layout differs from the original request.
    #[error("SG fragment {index} mismatch: expected {expected} bytes, got {actual}")]
    FragmentMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Wire buffer or descriptor array could not be allocated.
    #[error("Allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },

    /// No handler registered for the opcode.
    #[error("Handler not found for opcode: {0:#x}")]
    HandlerNotFound(u32),

    /// Stream closed before a whole transaction arrived.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using TxnWireError.
pub type Result<T> = std::result::Result<T, TxnWireError>;
