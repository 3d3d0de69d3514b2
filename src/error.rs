use crate::tftp::{ErrorCode, OpCode};
use std::io;
use thiserror::Error;

/// Problems encoding or decoding a datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("encoded packet needs {needed} bytes but the limit is {limit}")]
    BufferTooSmall { needed: usize, limit: usize },

    #[error("request fields are not NUL-terminated")]
    MissingTerminator,

    #[error("request carries more than {0} fields")]
    TooManyFields(usize),

    #[error("request field reaches {0} bytes without a terminator")]
    FieldTooLong(usize),

    #[error("received {actual} bytes, expected {expected} bytes at least")]
    Truncated { expected: usize, actual: usize },

    #[error("unknown opcode {0}")]
    UnknownOpCode(u16),

    #[error("request field is not valid UTF-8")]
    InvalidText,

    #[error("request does not name a file")]
    MissingFilename,

    #[error("data block of {0} bytes exceeds the 512 byte block size")]
    OversizedBlock(usize),
}

/// Outcome of a failed transfer or request.
///
/// Transport failures are fatal to the session that raised them. Everything else only aborts
/// the current transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("socket I/O error: {0}")]
    Transport(#[source] io::Error),

    #[error("peer did not answer after {0} retransmissions")]
    RetriesExhausted(u32),

    #[error("file I/O error: {0}")]
    File(#[from] io::Error),

    #[error("malformed packet: {0}")]
    Codec(#[from] CodecError),

    #[error("expected {} packet, got opcode {got}", .expected.name())]
    UnexpectedOpCode { expected: OpCode, got: u16 },

    #[error("expected the write request to be acknowledged with block #0, got #{0}")]
    BadInitialAck(u16),

    #[error("peer sent error {}: {message}", .code.as_u16())]
    Remote { code: ErrorCode, message: String },

    #[error("gave up after discarding {0} stale packets in a row")]
    TooManyStalePackets(usize),

    #[error("invalid transfer mode '{0}'")]
    InvalidMode(String),

    #[error("unsupported transfer mode '{0}'")]
    UnsupportedMode(String),

    #[error("path not allowed: '{0}'")]
    AccessViolation(String),

    #[error("illegal operation: opcode {0} cannot start a transfer")]
    IllegalOperation(u16),
}

impl TransferError {
    /// Whether the session that produced this error must stop serving.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TransferError::Transport(_) | TransferError::RetriesExhausted(_))
    }

    /// The code reported to the peer in an ERROR packet.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            TransferError::Codec(
                CodecError::Truncated { .. }
                | CodecError::TooManyFields(_)
                | CodecError::FieldTooLong(_)
                | CodecError::MissingFilename
                | CodecError::BufferTooSmall { .. },
            ) => ErrorCode::NotDefined,
            TransferError::Codec(_)
            | TransferError::UnexpectedOpCode { .. }
            | TransferError::BadInitialAck(_)
            | TransferError::TooManyStalePackets(_)
            | TransferError::InvalidMode(_)
            | TransferError::UnsupportedMode(_)
            | TransferError::IllegalOperation(_) => ErrorCode::IllegalOperation,
            TransferError::AccessViolation(_) => ErrorCode::AccessViolation,
            TransferError::File(e) => match e.kind() {
                io::ErrorKind::PermissionDenied => ErrorCode::AccessViolation,
                io::ErrorKind::QuotaExceeded | io::ErrorKind::StorageFull => ErrorCode::DiskFull,
                _ => ErrorCode::NotDefined,
            },
            TransferError::Transport(_)
            | TransferError::RetriesExhausted(_)
            | TransferError::Remote { .. } => ErrorCode::NotDefined,
        }
    }
}
