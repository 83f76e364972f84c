//! Versioned, integrity-checked framing
//!
//! Every serialized object travels inside a frame carrying a magic string,
//! the format version, the object kind and a blake3 checksum of the body.
//! Decoding checks them in that order, so a buffer from another tool fails
//! on the magic before anything else is looked at.

use prost::Message;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{ProtoError, ProtoResult};
use crate::records::{FrameProto, ObjectKind};

pub const MAGIC: &str = "FHEGATE";
pub const VERSION: u32 = 1;

fn checksum(body: &[u8]) -> [u8; 32] {
    *blake3::hash(body).as_bytes()
}

fn check_header(
    magic: &str,
    version: u32,
    expected: ObjectKind,
    actual: ObjectKind,
) -> ProtoResult<()> {
    if magic != MAGIC {
        return Err(ProtoError::InvalidFormat(format!(
            "bad magic {magic:?}, expected {MAGIC:?}"
        )));
    }
    if version != VERSION {
        return Err(ProtoError::VersionMismatch {
            expected: VERSION,
            actual: version,
        });
    }
    if actual != expected {
        return Err(ProtoError::KindMismatch { expected, actual });
    }
    Ok(())
}

/// Wrap a protobuf body in a binary frame
pub fn encode_binary<M: Message>(kind: ObjectKind, record: &M) -> ProtoResult<Vec<u8>> {
    let mut body = Vec::with_capacity(record.encoded_len());
    record.encode(&mut body)?;
    let frame = FrameProto {
        magic: MAGIC.to_string(),
        version: VERSION,
        kind: kind as i32,
        checksum: checksum(&body).to_vec(),
        body,
    };
    let mut buf = Vec::with_capacity(frame.encoded_len());
    frame.encode(&mut buf)?;
    trace!(?kind, len = buf.len(), "encoded binary frame");
    Ok(buf)
}

/// Unwrap and verify a binary frame, then decode its body
pub fn decode_binary<M: Message + Default>(expected: ObjectKind, bytes: &[u8]) -> ProtoResult<M> {
    if bytes.is_empty() {
        return Err(ProtoError::InvalidFormat("empty buffer".into()));
    }
    let frame = FrameProto::decode(bytes)?;
    check_header(
        &frame.magic,
        frame.version,
        expected,
        ObjectKind::from_wire(frame.kind),
    )?;
    if frame.checksum != checksum(&frame.body) {
        return Err(ProtoError::ChecksumMismatch);
    }
    trace!(kind = ?expected, len = frame.body.len(), "decoded binary frame");
    Ok(M::decode(frame.body.as_slice())?)
}

#[derive(Serialize, Deserialize)]
struct TextFrame {
    magic: String,
    version: u32,
    kind: ObjectKind,
    #[serde(with = "hex::serde")]
    checksum: Vec<u8>,
    body: serde_json::Value,
}

/// Wrap a record in a JSON text frame
pub fn encode_text<R: Serialize>(kind: ObjectKind, record: &R) -> ProtoResult<String> {
    let body = serde_json::to_value(record)?;
    let digest = checksum(&serde_json::to_vec(&body)?);
    let frame = TextFrame {
        magic: MAGIC.to_string(),
        version: VERSION,
        kind,
        checksum: digest.to_vec(),
        body,
    };
    let text = serde_json::to_string_pretty(&frame)?;
    trace!(?kind, len = text.len(), "encoded text frame");
    Ok(text)
}

/// Unwrap and verify a JSON text frame, then decode its body
pub fn decode_text<R>(expected: ObjectKind, text: &str) -> ProtoResult<R>
where
    R: for<'de> Deserialize<'de>,
{
    if text.trim().is_empty() {
        return Err(ProtoError::InvalidFormat("empty buffer".into()));
    }
    let frame: TextFrame = serde_json::from_str(text)?;
    check_header(&frame.magic, frame.version, expected, frame.kind)?;
    if frame.checksum != checksum(&serde_json::to_vec(&frame.body)?) {
        return Err(ProtoError::ChecksumMismatch);
    }
    trace!(kind = ?expected, len = text.len(), "decoded text frame");
    Ok(serde_json::from_value(frame.body)?)
}

/// Peek at the kind stored in a frame of either framing
pub fn peek_kind(data: &[u8]) -> ProtoResult<ObjectKind> {
    #[derive(Deserialize)]
    struct Header {
        kind: ObjectKind,
    }

    match crate::format::detect_format(data) {
        crate::format::Format::Text => {
            let header: Header = serde_json::from_slice(data)?;
            Ok(header.kind)
        }
        crate::format::Format::Binary => {
            Ok(ObjectKind::from_wire(FrameProto::decode(data)?.kind))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::KeyRecord;

    fn record() -> KeyRecord {
        KeyRecord {
            context: vec![1; 16],
            tag: vec![2; 16],
            material: vec![3; 32],
        }
    }

    #[test]
    fn test_binary_frame_roundtrip() {
        let bytes = encode_binary(ObjectKind::PublicKey, &record()).unwrap();
        let back: KeyRecord = decode_binary(ObjectKind::PublicKey, &bytes).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn test_text_frame_roundtrip() {
        let text = encode_text(ObjectKind::PrivateKey, &record()).unwrap();
        assert!(text.contains("\"FHEGATE\""));
        let back: KeyRecord = decode_text(ObjectKind::PrivateKey, &text).unwrap();
        assert_eq!(back, record());
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let bytes = encode_binary(ObjectKind::PublicKey, &record()).unwrap();
        let err = decode_binary::<KeyRecord>(ObjectKind::Ciphertext, &bytes).unwrap_err();
        assert!(matches!(
            err,
            ProtoError::KindMismatch {
                expected: ObjectKind::Ciphertext,
                actual: ObjectKind::PublicKey
            }
        ));
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let text = encode_text(ObjectKind::PublicKey, &record()).unwrap();
        let tampered = text.replace("\"version\": 1", "\"version\": 2");
        assert!(matches!(
            decode_text::<KeyRecord>(ObjectKind::PublicKey, &tampered),
            Err(ProtoError::VersionMismatch { expected: 1, actual: 2 })
        ));
    }

    #[test]
    fn test_tampered_body_fails_checksum() {
        let text = encode_text(ObjectKind::PublicKey, &record()).unwrap();
        let tampered = text.replace(&"03".repeat(32), &"04".repeat(32));
        assert!(matches!(
            decode_text::<KeyRecord>(ObjectKind::PublicKey, &tampered),
            Err(ProtoError::ChecksumMismatch)
        ));

        let mut frame = FrameProto::decode(
            encode_binary(ObjectKind::PublicKey, &record()).unwrap().as_slice(),
        )
        .unwrap();
        frame.body[0] ^= 0xff;
        assert!(matches!(
            decode_binary::<KeyRecord>(ObjectKind::PublicKey, &frame.encode_to_vec()),
            Err(ProtoError::ChecksumMismatch)
        ));
    }

    #[test]
    fn test_bad_magic_and_garbage() {
        let mut frame = FrameProto::decode(
            encode_binary(ObjectKind::PublicKey, &record()).unwrap().as_slice(),
        )
        .unwrap();
        frame.magic = "OPENFHE".into();
        assert!(matches!(
            decode_binary::<KeyRecord>(ObjectKind::PublicKey, &frame.encode_to_vec()),
            Err(ProtoError::InvalidFormat(_))
        ));
        assert!(decode_binary::<KeyRecord>(ObjectKind::PublicKey, &[0xff, 0xff, 0xff]).is_err());
        assert!(decode_binary::<KeyRecord>(ObjectKind::PublicKey, &[]).is_err());
        assert!(decode_text::<KeyRecord>(ObjectKind::PublicKey, "{not json").is_err());
    }

    #[test]
    fn test_peek_kind() {
        let bytes = encode_binary(ObjectKind::Ciphertext, &record()).unwrap();
        assert_eq!(peek_kind(&bytes).unwrap(), ObjectKind::Ciphertext);
        let text = encode_text(ObjectKind::LweSecretKey, &record()).unwrap();
        assert_eq!(peek_kind(text.as_bytes()).unwrap(), ObjectKind::LweSecretKey);
    }
}
