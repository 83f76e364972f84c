//! Error channel of the C boundary
//!
//! Every entry point returns an [`FheResult`]: a status code plus an owned
//! message that is null on success. Engine and codec errors are folded into
//! the boundary taxonomy here, and panics are caught before they can unwind
//! into the caller.

use std::any::Any;
use std::ffi::{c_char, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};

use fhegate_core::EngineError;
use fhegate_proto::ProtoError;
use thiserror::Error;
use tracing::{trace, warn};

/// Status code of a boundary call
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FheStatus {
    Ok = 0,
    NullArgument = 1,
    InvalidArgument = 2,
    IncompleteObject = 3,
    PreconditionNotMet = 4,
    EngineFault = 5,
    IntegrityFailure = 6,
    SerializationFailure = 7,
}

/// Per-call result; `message` is owned by the caller and released with
/// [`FheResult_FreeMessage`]
#[repr(C)]
#[derive(Debug)]
pub struct FheResult {
    pub code: FheStatus,
    pub message: *mut c_char,
}

impl FheResult {
    pub fn ok() -> Self {
        FheResult {
            code: FheStatus::Ok,
            message: std::ptr::null_mut(),
        }
    }

    pub fn error(code: FheStatus, message: String) -> Self {
        FheResult {
            code,
            message: into_c_string(message),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == FheStatus::Ok
    }

    /// Copy of the message, if any, without releasing it
    ///
    /// # Safety
    /// `message` must be null or a string produced by this crate.
    pub unsafe fn message_str(&self) -> Option<String> {
        if self.message.is_null() {
            return None;
        }
        Some(
            std::ffi::CStr::from_ptr(self.message)
                .to_string_lossy()
                .into_owned(),
        )
    }
}

#[derive(Error, Debug)]
pub enum FfiError {
    #[error("{0}")]
    NullArgument(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    IncompleteObject(String),

    #[error("{0}")]
    PreconditionNotMet(String),

    #[error("{0}")]
    EngineFault(String),

    #[error("{0}")]
    IntegrityFailure(String),

    #[error("{0}")]
    SerializationFailure(String),
}

pub type FfiResult<T> = Result<T, FfiError>;

impl FfiError {
    pub fn null(what: &str) -> Self {
        FfiError::NullArgument(format!("null {what}"))
    }

    pub fn status(&self) -> FheStatus {
        match self {
            FfiError::NullArgument(_) => FheStatus::NullArgument,
            FfiError::InvalidArgument(_) => FheStatus::InvalidArgument,
            FfiError::IncompleteObject(_) => FheStatus::IncompleteObject,
            FfiError::PreconditionNotMet(_) => FheStatus::PreconditionNotMet,
            FfiError::EngineFault(_) => FheStatus::EngineFault,
            FfiError::IntegrityFailure(_) => FheStatus::IntegrityFailure,
            FfiError::SerializationFailure(_) => FheStatus::SerializationFailure,
        }
    }
}

impl From<EngineError> for FfiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        match err {
            EngineError::Precondition(_) => FfiError::PreconditionNotMet(message),
            EngineError::MissingKey(_) => FfiError::IncompleteObject(message),
            EngineError::OutOfRange(_)
            | EngineError::InvalidParameter(_)
            | EngineError::SchemeMismatch(_)
            | EngineError::ContextMismatch(_) => FfiError::InvalidArgument(message),
            EngineError::Fault(_) | EngineError::KeyMismatch(_) => FfiError::EngineFault(message),
        }
    }
}

impl From<ProtoError> for FfiError {
    fn from(err: ProtoError) -> Self {
        FfiError::SerializationFailure(err.to_string())
    }
}

fn into_c_string(message: String) -> *mut c_char {
    let cleaned = message.replace('\0', " ");
    match CString::new(cleaned) {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one boundary call: convert its error, catch any panic and prefix
/// the message with the operation name
pub(crate) fn guard<F>(op: &'static str, body: F) -> FheResult
where
    F: FnOnce() -> FfiResult<()>,
{
    trace!(op, "boundary call");
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(())) => FheResult::ok(),
        Ok(Err(err)) => {
            let code = err.status();
            warn!(op, kind = ?code, error = %err, "boundary call failed");
            FheResult::error(code, format!("{op}: {err}"))
        }
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            warn!(op, kind = ?FheStatus::EngineFault, panic = %detail, "caught panic at boundary");
            FheResult::error(
                FheStatus::EngineFault,
                format!("{op}: internal fault: {detail}"),
            )
        }
    }
}

/// Release a message returned in an [`FheResult`]
///
/// # Safety
/// `message` must be null or come from an `FheResult` of this library, and
/// must not be released twice.
#[no_mangle]
pub unsafe extern "C" fn FheResult_FreeMessage(message: *mut c_char) {
    if !message.is_null() {
        drop(CString::from_raw(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_allocates_nothing() {
        let result = guard("Noop", || Ok(()));
        assert!(result.is_ok());
        assert!(result.message.is_null());
    }

    #[test]
    fn test_error_is_prefixed_with_operation() {
        let result = guard("CryptoContext_EvalAdd", || Err(FfiError::null("ciphertext")));
        assert_eq!(result.code, FheStatus::NullArgument);
        let message = unsafe { result.message_str() }.unwrap();
        assert_eq!(message, "CryptoContext_EvalAdd: null ciphertext");
        unsafe { FheResult_FreeMessage(result.message) };
    }

    #[test]
    fn test_panic_becomes_engine_fault() {
        let result = guard("Boom", || panic!("index out of bounds"));
        assert_eq!(result.code, FheStatus::EngineFault);
        let message = unsafe { result.message_str() }.unwrap();
        assert!(message.starts_with("Boom: internal fault: index out of bounds"));
        unsafe { FheResult_FreeMessage(result.message) };
    }

    #[test]
    fn test_engine_error_mapping() {
        let cases = [
            (EngineError::Precondition("x".into()), FheStatus::PreconditionNotMet),
            (EngineError::MissingKey("x".into()), FheStatus::IncompleteObject),
            (EngineError::OutOfRange("x".into()), FheStatus::InvalidArgument),
            (EngineError::InvalidParameter("x".into()), FheStatus::InvalidArgument),
            (EngineError::SchemeMismatch("x".into()), FheStatus::InvalidArgument),
            (EngineError::ContextMismatch("x".into()), FheStatus::InvalidArgument),
            (EngineError::Fault("x".into()), FheStatus::EngineFault),
            (EngineError::KeyMismatch("x".into()), FheStatus::EngineFault),
        ];
        for (err, status) in cases {
            assert_eq!(FfiError::from(err).status(), status);
        }
        let proto = ProtoError::ChecksumMismatch;
        assert_eq!(FfiError::from(proto).status(), FheStatus::SerializationFailure);
    }

    #[test]
    fn test_interior_nul_is_sanitized() {
        let result = FheResult::error(FheStatus::InvalidArgument, "a\0b".into());
        assert_eq!(unsafe { result.message_str() }.unwrap(), "a b");
        unsafe { FheResult_FreeMessage(result.message) };
        unsafe { FheResult_FreeMessage(std::ptr::null_mut()) };
    }
}
