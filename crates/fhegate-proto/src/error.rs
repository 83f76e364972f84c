use thiserror::Error;

use crate::records::ObjectKind;

#[derive(Error, Debug)]
pub enum ProtoError {
    #[error("Protobuf encode error: {0}")]
    ProtobufEncode(#[from] prost::EncodeError),

    #[error("Protobuf decode error: {0}")]
    ProtobufDecode(#[from] prost::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    #[error("Kind mismatch: expected {expected:?}, got {actual:?}")]
    KindMismatch {
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("Checksum mismatch: body does not match its blake3 digest")]
    ChecksumMismatch,

    #[error("Engine error: {0}")]
    Engine(#[from] fhegate_core::EngineError),
}

pub type ProtoResult<T> = Result<T, ProtoError>;
