//! Shared helpers: drive the C surface the way a C caller would

#![allow(dead_code)]

use std::ptr;

use fhegate_ffi::ciphertext::*;
use fhegate_ffi::context::*;
use fhegate_ffi::dispatch::*;
use fhegate_ffi::error::FheResult_FreeMessage;
use fhegate_ffi::keys::*;
use fhegate_ffi::params::*;
use fhegate_ffi::plaintext::*;
use fhegate_ffi::registry::*;
use fhegate_ffi::{FheResult, FheStatus};

pub const PKE: u32 = 0x01;
pub const KEYSWITCH: u32 = 0x02;
pub const PRE: u32 = 0x04;
pub const LEVELEDSHE: u32 = 0x08;
pub const ADVANCEDSHE: u32 = 0x10;
pub const SCHEMESWITCH: u32 = 0x80;

/// Assert success, showing the boundary message otherwise
#[track_caller]
pub fn ok(result: FheResult) {
    if !result.is_ok() {
        let message = unsafe { result.message_str() }.unwrap_or_default();
        unsafe { FheResult_FreeMessage(result.message) };
        panic!("expected Ok, got {:?}: {message}", result.code);
    }
}

/// Assert the status, release the message and return its text
#[track_caller]
pub fn fails(result: FheResult, status: FheStatus) -> String {
    let message = unsafe { result.message_str() }.unwrap_or_default();
    unsafe { FheResult_FreeMessage(result.message) };
    assert_eq!(result.code, status, "message: {message}");
    message
}

/// Context plus key pair built entirely through the boundary
pub struct Session {
    pub cc: *mut CryptoContextHandle,
    pub kp: *mut KeyPairHandle,
}

impl Session {
    pub fn bfv(modulus: u64, depth: u32, features: u32) -> Self {
        unsafe {
            let mut params = ptr::null_mut();
            ok(NewParamsBFV(&mut params));
            ok(Params_SetPlaintextModulus(params, modulus));
            ok(Params_SetMultiplicativeDepth(params, depth));
            ok(Params_SetSecurityLevel(params, 6));
            ok(Params_SetBatchSize(params, 16));
            Self::finish(params, features)
        }
    }

    pub fn ckks(depth: u32, features: u32) -> Self {
        unsafe {
            let mut params = ptr::null_mut();
            ok(NewParamsCKKS(&mut params));
            ok(Params_SetMultiplicativeDepth(params, depth));
            ok(Params_SetScalingModSize(params, 50));
            ok(Params_SetScalingTechnique(params, 0));
            ok(Params_SetSecurityLevel(params, 6));
            ok(Params_SetBatchSize(params, 8));
            Self::finish(params, features)
        }
    }

    /// CKKS context shaped for the scheme-switching bridge
    pub fn ckks_bridge() -> Self {
        unsafe {
            let mut params = ptr::null_mut();
            ok(NewParamsCKKS(&mut params));
            ok(Params_SetSecurityLevel(params, 6));
            ok(Params_SetRingDim(params, 64));
            ok(Params_SetBatchSize(params, 8));
            ok(Params_SetScalingModSize(params, 50));
            ok(Params_SetMultiplicativeDepth(params, 4));
            Self::finish(params, PKE | KEYSWITCH | LEVELEDSHE | SCHEMESWITCH)
        }
    }

    /// Build the context and consume `params`
    pub unsafe fn finish(params: *mut ParamsHandle, features: u32) -> Self {
        let mut cc = ptr::null_mut();
        ok(NewCryptoContext(params, &mut cc));
        DestroyParams(params);
        ok(CryptoContext_Enable(cc, features));
        let mut kp = ptr::null_mut();
        ok(CryptoContext_KeyGen(cc, &mut kp));
        Session { cc, kp }
    }

    pub fn encrypt_ints(&self, values: &[i64]) -> *mut CiphertextHandle {
        unsafe {
            let mut pt = ptr::null_mut();
            ok(CryptoContext_MakePackedPlaintext(self.cc, values.as_ptr(), values.len(), &mut pt));
            let mut ct = ptr::null_mut();
            ok(CryptoContext_Encrypt(self.cc, self.kp, pt, &mut ct));
            DestroyPlaintext(pt);
            ct
        }
    }

    pub fn encrypt_reals(&self, values: &[f64]) -> *mut CiphertextHandle {
        unsafe {
            let mut pt = ptr::null_mut();
            ok(CryptoContext_MakeCKKSPackedPlaintext(
                self.cc,
                values.as_ptr(),
                values.len(),
                &mut pt,
            ));
            let mut ct = ptr::null_mut();
            ok(CryptoContext_Encrypt(self.cc, self.kp, pt, &mut ct));
            DestroyPlaintext(pt);
            ct
        }
    }

    pub fn decrypt(&self, ct: *const CiphertextHandle) -> *mut PlaintextHandle {
        let mut pt = ptr::null_mut();
        ok(unsafe { CryptoContext_Decrypt(self.cc, self.kp, ct, &mut pt) });
        pt
    }

    /// First `n` integer slots; the ciphertext is left alive
    pub fn ints(&self, ct: *const CiphertextHandle, n: usize) -> Vec<i64> {
        let pt = self.decrypt(ct);
        let values = (0..n)
            .map(|i| {
                let mut v = 0;
                ok(unsafe { Plaintext_GetPackedValueAt(pt, i, &mut v) });
                v
            })
            .collect();
        unsafe { DestroyPlaintext(pt) };
        values
    }

    pub fn reals(&self, ct: *const CiphertextHandle, n: usize) -> Vec<f64> {
        let pt = self.decrypt(ct);
        let values = (0..n)
            .map(|i| {
                let mut v = 0.0;
                ok(unsafe { Plaintext_GetRealPackedValueAt(pt, i, &mut v) });
                v
            })
            .collect();
        unsafe { DestroyPlaintext(pt) };
        values
    }

    pub fn level(&self, ct: *const CiphertextHandle) -> u32 {
        let mut level = u32::MAX;
        ok(unsafe { Ciphertext_GetLevel(ct, &mut level) });
        level
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        unsafe {
            DestroyKeyPair(self.kp);
            DestroyCryptoContext(self.cc);
        }
    }
}

pub fn assert_close(actual: &[f64], expected: &[f64], tolerance: f64) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < tolerance, "{actual:?} vs {expected:?}");
    }
}
