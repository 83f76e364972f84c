//! Serialization entry points
//!
//! Every serializable kind gets five calls:
//!
//! - `Serialize<Kind>ToString`: JSON text frame, released with `FreeString`
//! - `Serialize<Kind>ToBytes`: protobuf frame, released with `FreeBytes`
//! - `Serialize<Kind>ToBuffer`: the configured default framing, as bytes
//! - `Deserialize<Kind>FromString`: JSON text frame
//! - `Deserialize<Kind>FromBytes`: either framing, detected from the first
//!   non-blank byte
//!
//! Evaluation keys stored inside a context are exported by key tag and
//! installed back into a context in place.

use std::ffi::c_char;
use std::str::FromStr;

use fhegate_core::{
    Ciphertext, CryptoContext, EngineResult, EvalKey, KeyTag, LweCiphertext, LweSecretKey,
    Plaintext, PrivateKey, PublicKey,
};
use fhegate_proto::{EvalAutomorphismKeys, EvalMultKeys, MultiFormat};
use tracing::debug;

use crate::config;
use crate::error::{guard, FfiError, FfiResult, FheResult};
use crate::registry::{
    bytes_out, c_str, get, out, string_out, wrap, CiphertextHandle, CryptoContextHandle,
    EvalKeyHandle, LweCiphertextHandle, LweSecretKeyHandle, PlaintextHandle, PrivateKeyHandle,
    PublicKeyHandle,
};

fn check_len(len: usize) -> FfiResult<()> {
    if len == 0 {
        return Err(FfiError::InvalidArgument("empty buffer".into()));
    }
    let max = config::active().max_buffer_len;
    if len > max {
        return Err(FfiError::InvalidArgument(format!(
            "buffer of {len} bytes exceeds the {max}-byte limit"
        )));
    }
    Ok(())
}

unsafe fn input_bytes<'a>(ptr: *const u8, len: usize) -> FfiResult<&'a [u8]> {
    if ptr.is_null() {
        return Err(FfiError::null("buffer"));
    }
    check_len(len)?;
    Ok(std::slice::from_raw_parts(ptr, len))
}

unsafe fn input_text<'a>(ptr: *const c_char) -> FfiResult<&'a str> {
    let text = c_str(ptr, "buffer")?;
    check_len(text.len())?;
    Ok(text)
}

unsafe fn encode_text<'a, T: MultiFormat + 'a>(
    op: &'static str,
    value: impl FnOnce() -> FfiResult<&'a T>,
    out_str: *mut *mut c_char,
) -> FheResult {
    guard(op, || {
        let value = value()?;
        let slot = out(out_str, "string")?;
        let text = value.to_json()?;
        debug!(kind = ?T::KIND, len = text.len(), "serialized to text");
        *slot = string_out(text)?;
        Ok(())
    })
}

unsafe fn encode_bytes<'a, T: MultiFormat + 'a>(
    op: &'static str,
    value: impl FnOnce() -> FfiResult<&'a T>,
    default_framing: bool,
    out_ptr: *mut *mut u8,
    out_len: *mut usize,
) -> FheResult {
    guard(op, || {
        let value = value()?;
        let ptr_slot = out(out_ptr, "buffer")?;
        let len_slot = out(out_len, "buffer length")?;
        let bytes = if default_framing {
            value.to_format(config::active().default_framing)?
        } else {
            value.to_protobuf()?
        };
        debug!(kind = ?T::KIND, len = bytes.len(), "serialized to bytes");
        let (ptr, len) = bytes_out(bytes);
        *ptr_slot = ptr;
        *len_slot = len;
        Ok(())
    })
}

unsafe fn decode_text<T: MultiFormat, H>(
    op: &'static str,
    text: *const c_char,
    handle: fn(T) -> H,
    out_handle: *mut *mut H,
) -> FheResult {
    guard(op, || {
        let text = input_text(text)?;
        let slot = out(out_handle, "handle")?;
        let value = T::from_json(text)?;
        *slot = wrap(handle(value));
        Ok(())
    })
}

unsafe fn decode_bytes<T: MultiFormat, H>(
    op: &'static str,
    ptr: *const u8,
    len: usize,
    handle: fn(T) -> H,
    out_handle: *mut *mut H,
) -> FheResult {
    guard(op, || {
        let bytes = input_bytes(ptr, len)?;
        let slot = out(out_handle, "handle")?;
        let value = T::from_any(bytes)?;
        *slot = wrap(handle(value));
        Ok(())
    })
}

macro_rules! serial_kinds {
    ($(
        $handle:ident($inner:ty, $what:literal) =>
            $to_string:ident, $to_bytes:ident, $to_buffer:ident,
            $from_string:ident, $from_bytes:ident;
    )*) => {
        $(
            /// # Safety
            /// `handle` must be live and `out` a valid string slot.
            #[no_mangle]
            pub unsafe extern "C" fn $to_string(
                handle: *const $handle,
                out_str: *mut *mut c_char,
            ) -> FheResult {
                encode_text::<$inner>(
                    stringify!($to_string),
                    || get(handle, $what).map(|h| &h.0),
                    out_str,
                )
            }

            /// # Safety
            /// `handle` must be live; `out_ptr` and `out_len` must be valid.
            #[no_mangle]
            pub unsafe extern "C" fn $to_bytes(
                handle: *const $handle,
                out_ptr: *mut *mut u8,
                out_len: *mut usize,
            ) -> FheResult {
                encode_bytes::<$inner>(
                    stringify!($to_bytes),
                    || get(handle, $what).map(|h| &h.0),
                    false,
                    out_ptr,
                    out_len,
                )
            }

            /// # Safety
            /// `handle` must be live; `out_ptr` and `out_len` must be valid.
            #[no_mangle]
            pub unsafe extern "C" fn $to_buffer(
                handle: *const $handle,
                out_ptr: *mut *mut u8,
                out_len: *mut usize,
            ) -> FheResult {
                encode_bytes::<$inner>(
                    stringify!($to_buffer),
                    || get(handle, $what).map(|h| &h.0),
                    true,
                    out_ptr,
                    out_len,
                )
            }

            /// # Safety
            /// `text` must be a NUL-terminated string and `out` a valid slot.
            #[no_mangle]
            pub unsafe extern "C" fn $from_string(
                text: *const c_char,
                out_handle: *mut *mut $handle,
            ) -> FheResult {
                decode_text::<$inner, $handle>(stringify!($from_string), text, $handle, out_handle)
            }

            /// # Safety
            /// `ptr` must hold `len` bytes and `out` must be a valid slot.
            #[no_mangle]
            pub unsafe extern "C" fn $from_bytes(
                ptr: *const u8,
                len: usize,
                out_handle: *mut *mut $handle,
            ) -> FheResult {
                let op = stringify!($from_bytes);
                decode_bytes::<$inner, $handle>(op, ptr, len, $handle, out_handle)
            }
        )*
    };
}

serial_kinds! {
    CryptoContextHandle(CryptoContext, "crypto context") =>
        SerializeCryptoContextToString, SerializeCryptoContextToBytes,
        SerializeCryptoContextToBuffer,
        DeserializeCryptoContextFromString, DeserializeCryptoContextFromBytes;
    PublicKeyHandle(PublicKey, "public key") =>
        SerializePublicKeyToString, SerializePublicKeyToBytes, SerializePublicKeyToBuffer,
        DeserializePublicKeyFromString, DeserializePublicKeyFromBytes;
    PrivateKeyHandle(PrivateKey, "private key") =>
        SerializePrivateKeyToString, SerializePrivateKeyToBytes, SerializePrivateKeyToBuffer,
        DeserializePrivateKeyFromString, DeserializePrivateKeyFromBytes;
    CiphertextHandle(Ciphertext, "ciphertext") =>
        SerializeCiphertextToString, SerializeCiphertextToBytes, SerializeCiphertextToBuffer,
        DeserializeCiphertextFromString, DeserializeCiphertextFromBytes;
    EvalKeyHandle(EvalKey, "evaluation key") =>
        SerializeEvalKeyToString, SerializeEvalKeyToBytes, SerializeEvalKeyToBuffer,
        DeserializeEvalKeyFromString, DeserializeEvalKeyFromBytes;
    PlaintextHandle(Plaintext, "plaintext") =>
        SerializePlaintextToString, SerializePlaintextToBytes, SerializePlaintextToBuffer,
        DeserializePlaintextFromString, DeserializePlaintextFromBytes;
    LweCiphertextHandle(LweCiphertext, "LWE ciphertext") =>
        SerializeLWECiphertextToString, SerializeLWECiphertextToBytes,
        SerializeLWECiphertextToBuffer,
        DeserializeLWECiphertextFromString, DeserializeLWECiphertextFromBytes;
    LweSecretKeyHandle(LweSecretKey, "LWE secret key") =>
        SerializeLWEPrivateKeyToString, SerializeLWEPrivateKeyToBytes,
        SerializeLWEPrivateKeyToBuffer,
        DeserializeLWEPrivateKeyFromString, DeserializeLWEPrivateKeyFromBytes;
}

// Keys stored inside a context

trait KeyBundle: MultiFormat {
    fn export(cc: &CryptoContext, key_id: Option<KeyTag>) -> EngineResult<Self>;

    fn into_keys(self) -> Vec<EvalKey>;
}

impl KeyBundle for EvalMultKeys {
    fn export(cc: &CryptoContext, key_id: Option<KeyTag>) -> EngineResult<Self> {
        cc.export_mult_keys(key_id).map(EvalMultKeys)
    }

    fn into_keys(self) -> Vec<EvalKey> {
        self.0
    }
}

impl KeyBundle for EvalAutomorphismKeys {
    fn export(cc: &CryptoContext, key_id: Option<KeyTag>) -> EngineResult<Self> {
        cc.export_rotation_keys(key_id).map(EvalAutomorphismKeys)
    }

    fn into_keys(self) -> Vec<EvalKey> {
        self.0
    }
}

/// Null or empty selects every key in the context
unsafe fn key_id(ptr: *const c_char) -> FfiResult<Option<KeyTag>> {
    if ptr.is_null() {
        return Ok(None);
    }
    match c_str(ptr, "key id")? {
        "" => Ok(None),
        id => Ok(Some(KeyTag::from_str(id)?)),
    }
}

unsafe fn export_bundle<B: KeyBundle>(
    cc: *const CryptoContextHandle,
    id: *const c_char,
) -> FfiResult<B> {
    let cc = get(cc, "crypto context")?;
    let id = key_id(id)?;
    Ok(B::export(&cc.0, id)?)
}

unsafe fn install_bundle<B: KeyBundle>(
    cc: *const CryptoContextHandle,
    decode: impl FnOnce() -> FfiResult<B>,
) -> FfiResult<()> {
    let cc = get(cc, "crypto context")?;
    let keys = decode()?.into_keys();
    let count = cc.0.import_eval_keys(keys)?;
    debug!(kind = ?B::KIND, count, "evaluation keys installed");
    Ok(())
}

macro_rules! key_bundles {
    ($(
        $bundle:ty =>
            $to_string:ident, $to_bytes:ident, $from_string:ident, $from_bytes:ident;
    )*) => {
        $(
            /// # Safety
            /// `cc` must be live, `key_id` null or NUL-terminated, and `out`
            /// a valid string slot.
            #[no_mangle]
            pub unsafe extern "C" fn $to_string(
                cc: *const CryptoContextHandle,
                key_id: *const c_char,
                out_str: *mut *mut c_char,
            ) -> FheResult {
                guard(stringify!($to_string), || {
                    let slot = out(out_str, "string")?;
                    let bundle: $bundle = export_bundle(cc, key_id)?;
                    *slot = string_out(bundle.to_json()?)?;
                    Ok(())
                })
            }

            /// # Safety
            /// `cc` must be live, `key_id` null or NUL-terminated, and both
            /// output slots valid.
            #[no_mangle]
            pub unsafe extern "C" fn $to_bytes(
                cc: *const CryptoContextHandle,
                key_id: *const c_char,
                out_ptr: *mut *mut u8,
                out_len: *mut usize,
            ) -> FheResult {
                guard(stringify!($to_bytes), || {
                    let ptr_slot = out(out_ptr, "buffer")?;
                    let len_slot = out(out_len, "buffer length")?;
                    let bundle: $bundle = export_bundle(cc, key_id)?;
                    let (ptr, len) = bytes_out(bundle.to_protobuf()?);
                    *ptr_slot = ptr;
                    *len_slot = len;
                    Ok(())
                })
            }

            /// Install the keys into `cc`; nothing is installed on failure
            ///
            /// # Safety
            /// `cc` must be live and `text` NUL-terminated.
            #[no_mangle]
            pub unsafe extern "C" fn $from_string(
                cc: *const CryptoContextHandle,
                text: *const c_char,
            ) -> FheResult {
                guard(stringify!($from_string), || {
                    install_bundle(cc, || Ok(<$bundle>::from_json(input_text(text)?)?))
                })
            }

            /// Install the keys into `cc`; nothing is installed on failure
            ///
            /// # Safety
            /// `cc` must be live and `ptr` must hold `len` bytes.
            #[no_mangle]
            pub unsafe extern "C" fn $from_bytes(
                cc: *const CryptoContextHandle,
                ptr: *const u8,
                len: usize,
            ) -> FheResult {
                guard(stringify!($from_bytes), || {
                    install_bundle(cc, || Ok(<$bundle>::from_any(input_bytes(ptr, len)?)?))
                })
            }
        )*
    };
}

key_bundles! {
    EvalMultKeys =>
        SerializeEvalMultKeyToString, SerializeEvalMultKeyToBytes,
        DeserializeEvalMultKeyFromString, DeserializeEvalMultKeyFromBytes;
    EvalAutomorphismKeys =>
        SerializeEvalAutomorphismKeyToString, SerializeEvalAutomorphismKeyToBytes,
        DeserializeEvalAutomorphismKeyFromString, DeserializeEvalAutomorphismKeyFromBytes;
}
