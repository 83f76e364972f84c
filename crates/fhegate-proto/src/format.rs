//! Multi-format serialization support

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ProtoError, ProtoResult};
use crate::frame;
use crate::records::ObjectKind;

/// Framing of a serialized object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON, human-inspectable
    Text,
    /// Protobuf, compact
    #[default]
    Binary,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Text => write!(f, "text"),
            Format::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for Format {
    type Err = ProtoError;

    fn from_str(s: &str) -> ProtoResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "json" => Ok(Format::Text),
            "binary" | "protobuf" => Ok(Format::Binary),
            other => Err(ProtoError::InvalidFormat(format!("unknown framing {other:?}"))),
        }
    }
}

/// Detect framing from raw bytes
pub fn detect_format(data: &[u8]) -> Format {
    match data.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'{') => Format::Text,
        _ => Format::Binary,
    }
}

/// Trait for engine objects that serialize to both framings
pub trait MultiFormat: Sized {
    /// Kind written into the frame header
    const KIND: ObjectKind;

    /// Wire record backing both framings
    type Record: prost::Message + Default + Serialize + for<'de> Deserialize<'de>;

    fn to_record(&self) -> Self::Record;

    fn from_record(record: Self::Record) -> ProtoResult<Self>;

    /// Serialize to a binary frame
    fn to_protobuf(&self) -> ProtoResult<Vec<u8>> {
        frame::encode_binary(Self::KIND, &self.to_record())
    }

    /// Deserialize from a binary frame
    fn from_protobuf(bytes: &[u8]) -> ProtoResult<Self> {
        Self::from_record(frame::decode_binary(Self::KIND, bytes)?)
    }

    /// Serialize to a JSON text frame
    fn to_json(&self) -> ProtoResult<String> {
        frame::encode_text(Self::KIND, &self.to_record())
    }

    /// Deserialize from a JSON text frame
    fn from_json(s: &str) -> ProtoResult<Self> {
        Self::from_record(frame::decode_text(Self::KIND, s)?)
    }

    /// Serialize to the chosen framing
    fn to_format(&self, format: Format) -> ProtoResult<Vec<u8>> {
        match format {
            Format::Text => Ok(self.to_json()?.into_bytes()),
            Format::Binary => self.to_protobuf(),
        }
    }

    /// Deserialize from any framing (auto-detect)
    fn from_any(data: &[u8]) -> ProtoResult<Self> {
        match detect_format(data) {
            Format::Binary => Self::from_protobuf(data),
            Format::Text => {
                let s = std::str::from_utf8(data)
                    .map_err(|e| ProtoError::InvalidFormat(e.to_string()))?;
                Self::from_json(s)
            }
        }
    }
}
