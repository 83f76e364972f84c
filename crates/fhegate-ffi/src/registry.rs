//! Handle registry
//!
//! A handle is the address of one boxed wrapper holding one reference to an
//! engine object. Engine objects are themselves reference counted, so two
//! handles may share a payload while each wrapper has its own lifetime.
//! There is no table of live handles: the caller owns every address it is
//! given and releases it through the matching destroy entry point.

use std::ffi::{c_char, CStr};

use fhegate_core::{
    BinFheContext, Ciphertext, CryptoContext, EvalKey, FastRotationPrecomp, KeyPair,
    LweCiphertext, LweSecretKey, ParameterSet, Plaintext, PrivateKey, PublicKey, SchSwchParams,
};
use tracing::debug;

use crate::error::{FfiError, FfiResult};

macro_rules! handles {
    ($($(#[$doc:meta])* $name:ident($inner:ty) => $destroy:ident;)*) => {
        $(
            $(#[$doc])*
            pub struct $name(pub(crate) $inner);

            impl $name {
                pub fn inner(&self) -> &$inner {
                    &self.0
                }
            }

            /// Release the handle; null is a no-op
            ///
            /// # Safety
            /// `handle` must be null or a live handle of this kind.
            #[no_mangle]
            pub unsafe extern "C" fn $destroy(handle: *mut $name) {
                release(handle, stringify!($name));
            }
        )*
    };
}

handles! {
    /// Scheme-tagged parameter set under construction
    ParamsHandle(ParameterSet) => DestroyParams;
    CryptoContextHandle(CryptoContext) => DestroyCryptoContext;
    /// Public/private key aggregate; either half may be missing
    KeyPairHandle(KeyPair) => DestroyKeyPair;
    PublicKeyHandle(PublicKey) => DestroyPublicKey;
    PrivateKeyHandle(PrivateKey) => DestroyPrivateKey;
    EvalKeyHandle(EvalKey) => DestroyEvalKey;
    PlaintextHandle(Plaintext) => DestroyPlaintext;
    CiphertextHandle(Ciphertext) => DestroyCiphertext;
    FastRotationPrecompHandle(FastRotationPrecomp) => DestroyFastRotationPrecomp;
    /// Binary-FHE context, a family of its own
    BinFheContextHandle(BinFheContext) => BinFHEContext_Delete;
    LweSecretKeyHandle(LweSecretKey) => LWESecretKey_Delete;
    LweCiphertextHandle(LweCiphertext) => LWECiphertext_Delete;
    SchSwchParamsHandle(SchSwchParams) => DestroySchSwchParams;
}

/// Move a value onto the heap and hand out its address
pub(crate) fn wrap<T>(value: T) -> *mut T {
    let handle = Box::into_raw(Box::new(value));
    debug!(kind = short_name::<T>(), ?handle, "created handle");
    handle
}

fn short_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

pub(crate) unsafe fn release<T>(handle: *mut T, kind: &str) {
    if handle.is_null() {
        return;
    }
    debug!(kind, ?handle, "released handle");
    drop(Box::from_raw(handle));
}

/// Borrow the wrapper behind a handle for the duration of one call
pub(crate) unsafe fn get<'a, T>(handle: *const T, what: &str) -> FfiResult<&'a T> {
    handle.as_ref().ok_or_else(|| FfiError::null(what))
}

pub(crate) unsafe fn get_mut<'a, T>(handle: *mut T, what: &str) -> FfiResult<&'a mut T> {
    handle.as_mut().ok_or_else(|| FfiError::null(what))
}

/// Take ownership of the wrapper, freeing the handle
pub(crate) unsafe fn take<T>(handle: *mut T, what: &str) -> FfiResult<T> {
    if handle.is_null() {
        return Err(FfiError::null(what));
    }
    debug!(kind = what, ?handle, "consumed handle");
    Ok(*Box::from_raw(handle))
}

/// Check an output slot; it is written only once the call has succeeded
pub(crate) unsafe fn out<'a, T>(slot: *mut T, what: &str) -> FfiResult<&'a mut T> {
    slot.as_mut()
        .ok_or_else(|| FfiError::null(&format!("output {what}")))
}

/// Borrow a caller-owned array; a null pointer is accepted only with length 0
pub(crate) unsafe fn slice<'a, T>(ptr: *const T, len: usize, what: &str) -> FfiResult<&'a [T]> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(FfiError::null(what));
    }
    Ok(std::slice::from_raw_parts(ptr, len))
}

pub(crate) unsafe fn c_str<'a>(ptr: *const c_char, what: &str) -> FfiResult<&'a str> {
    if ptr.is_null() {
        return Err(FfiError::null(what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| FfiError::InvalidArgument(format!("{what} is not UTF-8: {e}")))
}

/// Hand a string to the caller; released with `FreeString`
pub(crate) fn string_out(value: String) -> FfiResult<*mut c_char> {
    std::ffi::CString::new(value)
        .map(|s| s.into_raw())
        .map_err(|e| FfiError::EngineFault(format!("string with interior NUL: {e}")))
}

/// Hand a byte buffer to the caller; released with `FreeBytes`
pub(crate) fn bytes_out(value: Vec<u8>) -> (*mut u8, usize) {
    let boxed = value.into_boxed_slice();
    let len = boxed.len();
    (Box::into_raw(boxed).cast::<u8>(), len)
}

/// Hand an array of handles to the caller; released with the matching
/// array free, which does not touch the handles themselves
pub(crate) fn array_out<T>(values: Vec<*mut T>) -> (*mut *mut T, usize) {
    let boxed = values.into_boxed_slice();
    let len = boxed.len();
    (Box::into_raw(boxed).cast::<*mut T>(), len)
}

pub(crate) unsafe fn free_array<T>(array: *mut *mut T, len: usize) {
    if array.is_null() {
        return;
    }
    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(array, len)));
}

/// Release a string returned by this library
///
/// # Safety
/// `s` must be null or a string returned by this library, released once.
#[no_mangle]
pub unsafe extern "C" fn FreeString(s: *mut c_char) {
    if !s.is_null() {
        drop(std::ffi::CString::from_raw(s));
    }
}

/// Release a byte buffer returned by this library
///
/// # Safety
/// `ptr` and `len` must be exactly the pair returned by a `*ToBytes` call.
#[no_mangle]
pub unsafe extern "C" fn FreeBytes(ptr: *mut u8, len: usize) {
    if !ptr.is_null() {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len)));
    }
}
