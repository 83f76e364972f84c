//! Crypto-context construction and accessors

use std::ffi::c_char;

use fhegate_core::{
    Capabilities, CryptoContext, Feature, ParameterSet, Scheme, SecretKeyDist, NATIVE_INT_BITS,
};
use tracing::debug;

use crate::error::{guard, FfiError, FfiResult, FheResult};
use crate::registry::{get, out, string_out, wrap, CryptoContextHandle, ParamsHandle};

unsafe fn build(
    op: &'static str,
    params: *const ParamsHandle,
    expected: Option<Scheme>,
    slot: *mut *mut CryptoContextHandle,
) -> FheResult {
    guard(op, || {
        let params = get(params, "parameter set")?;
        let slot = out(slot, "crypto context")?;
        if let Some(expected) = expected {
            if params.0.scheme() != expected {
                return Err(FfiError::InvalidArgument(format!(
                    "expected {expected} parameters, got {}",
                    params.0.scheme()
                )));
            }
        }
        let cc = CryptoContext::new(params.0.clone())?;
        *slot = wrap(CryptoContextHandle(cc));
        Ok(())
    })
}

/// Build a context whose scheme follows the parameter set's tag. The
/// parameter handle is left untouched.
///
/// # Safety
/// `params` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewCryptoContext(
    params: *const ParamsHandle,
    out: *mut *mut CryptoContextHandle,
) -> FheResult {
    build("NewCryptoContext", params, None, out)
}

/// # Safety
/// `params` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewCryptoContextBFV(
    params: *const ParamsHandle,
    out: *mut *mut CryptoContextHandle,
) -> FheResult {
    build("NewCryptoContextBFV", params, Some(Scheme::Bfv), out)
}

/// # Safety
/// `params` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewCryptoContextBGV(
    params: *const ParamsHandle,
    out: *mut *mut CryptoContextHandle,
) -> FheResult {
    build("NewCryptoContextBGV", params, Some(Scheme::Bgv), out)
}

/// # Safety
/// `params` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewCryptoContextCKKS(
    params: *const ParamsHandle,
    out: *mut *mut CryptoContextHandle,
) -> FheResult {
    build("NewCryptoContextCKKS", params, Some(Scheme::Ckks), out)
}

/// Enable a bitmask of features (PKE = 0x01 .. SCHEMESWITCH = 0x80)
///
/// # Safety
/// `cc` must be a live context handle.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_Enable(
    cc: *const CryptoContextHandle,
    features: u32,
) -> FheResult {
    guard("CryptoContext_Enable", || {
        let cc = get(cc, "crypto context")?;
        cc.0.enable(features)?;
        Ok(())
    })
}

fn single_feature(bits: u32) -> FfiResult<Feature> {
    Feature::ALL
        .into_iter()
        .find(|f| *f as u32 == bits)
        .ok_or_else(|| FfiError::InvalidArgument(format!("{bits:#x} is not a single feature")))
}

/// # Safety
/// `cc` must be a live context handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_IsEnabled(
    cc: *const CryptoContextHandle,
    feature: u32,
    out_enabled: *mut bool,
) -> FheResult {
    guard("CryptoContext_IsEnabled", || {
        let cc = get(cc, "crypto context")?;
        let slot = out(out_enabled, "flag")?;
        *slot = cc.0.is_enabled(single_feature(feature)?);
        Ok(())
    })
}

macro_rules! getters {
    ($($name:ident -> $ty:ty = |$cc:ident| $body:expr;)*) => {
        $(
            /// # Safety
            /// `cc` must be a live context handle and `out` valid.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                cc: *const CryptoContextHandle,
                out_value: *mut $ty,
            ) -> FheResult {
                guard(stringify!($name), || {
                    let $cc = &get(cc, "crypto context")?.0;
                    let slot = out(out_value, "value")?;
                    *slot = $body;
                    Ok(())
                })
            }
        )*
    };
}

getters! {
    CryptoContext_GetRingDimension -> u64 = |cc| cc.ring_dimension();
    CryptoContext_GetCyclotomicOrder -> u64 = |cc| cc.cyclotomic_order();
    CryptoContext_GetScheme -> u32 = |cc| cc.scheme() as u32;
    CryptoContext_GetBatchSize -> u32 = |cc| cc.batch_size();
    CryptoContext_GetPlaintextModulus -> u64 = |cc| cc.plaintext_modulus();
    CryptoContext_GetMultiplicativeDepth -> u32 = |cc| cc.multiplicative_depth();
}

/// Human-readable parameter summary, released with `FreeString`
///
/// # Safety
/// `cc` must be a live context handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_GetParameterElementString(
    cc: *const CryptoContextHandle,
    out_text: *mut *mut c_char,
) -> FheResult {
    guard("CryptoContext_GetParameterElementString", || {
        let cc = get(cc, "crypto context")?;
        let slot = out(out_text, "string")?;
        *slot = string_out(cc.0.parameter_element_string())?;
        Ok(())
    })
}

/// A copy of the context's parameter set as a fresh handle
///
/// # Safety
/// `cc` must be a live context handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_GetParams(
    cc: *const CryptoContextHandle,
    out_params: *mut *mut ParamsHandle,
) -> FheResult {
    guard("CryptoContext_GetParams", || {
        let cc = get(cc, "crypto context")?;
        let slot = out(out_params, "parameter set")?;
        let params: ParameterSet = cc.0.params().clone();
        *slot = wrap(ParamsHandle(params));
        Ok(())
    })
}

/// Native word width of the engine
#[no_mangle]
pub extern "C" fn GetNativeInt() -> u32 {
    NATIVE_INT_BITS
}

/// Depth consumed by CKKS bootstrapping for a level budget
///
/// # Safety
/// `level_budget` must point at two values and `out` must be valid.
#[no_mangle]
pub unsafe extern "C" fn CKKS_GetBootstrapDepth(
    level_budget: *const u32,
    secret_key_dist: i32,
    out_depth: *mut u32,
) -> FheResult {
    guard("CKKS_GetBootstrapDepth", || {
        let budget = crate::registry::slice(level_budget, 2, "level budget")?;
        let slot = out(out_depth, "depth")?;
        let dist = SecretKeyDist::try_from(secret_key_dist)?;
        let depth = fhegate_core::bootstrap_depth([budget[0], budget[1]], dist)?;
        debug!(depth, ?dist, "bootstrap depth");
        *slot = depth;
        Ok(())
    })
}
