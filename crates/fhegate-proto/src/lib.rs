//! fhegate-proto: Versioned codec for engine objects
//!
//! Provides:
//! - Protobuf binary framing (compact, the default)
//! - JSON text framing (human-inspectable)
//! - A shared frame header: magic, version, object kind and a blake3
//!   checksum of the body
//!
//! ## Format Selection
//!
//! | Format | Use Case                    | Detected by          |
//! |--------|-----------------------------|----------------------|
//! | Binary | Storage, transfer           | anything but `{`     |
//! | Text   | Debugging, inspection       | leading `{`          |
//!
//! Both framings carry the same records, so an object written in one
//! framing decodes to the same engine object as the other.

pub mod convert;
pub mod error;
pub mod format;
pub mod frame;
pub mod impls;
pub mod records;

pub use error::{ProtoError, ProtoResult};
pub use format::{Format, MultiFormat, detect_format};
pub use frame::{MAGIC, VERSION, peek_kind};
pub use impls::{EvalAutomorphismKeys, EvalMultKeys};
pub use records::ObjectKind;
