//! Parameter-set entry points
//!
//! One handle type covers BFV, BGV and CKKS. Setters that do not apply to
//! the handle's scheme fail with InvalidArgument naming the scheme.

use std::ffi::c_char;

use fhegate_core::{
    Capabilities, EngineResult, KeySwitchTechnique, ParameterSet, ScalingTechnique, Scheme,
    SecretKeyDist, SecurityLevel,
};

use crate::error::{guard, FfiError, FheResult};
use crate::registry::{c_str, get, get_mut, out, string_out, wrap, ParamsHandle};

unsafe fn new_params(
    op: &'static str,
    scheme: Scheme,
    slot: *mut *mut ParamsHandle,
) -> FheResult {
    guard(op, || {
        let slot = out(slot, "parameter set")?;
        *slot = wrap(ParamsHandle(ParameterSet::new(scheme)));
        Ok(())
    })
}

/// # Safety
/// `out` must be a valid pointer to a handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewParamsBFV(out: *mut *mut ParamsHandle) -> FheResult {
    new_params("NewParamsBFV", Scheme::Bfv, out)
}

/// # Safety
/// `out` must be a valid pointer to a handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewParamsBGV(out: *mut *mut ParamsHandle) -> FheResult {
    new_params("NewParamsBGV", Scheme::Bgv, out)
}

/// # Safety
/// `out` must be a valid pointer to a handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewParamsCKKS(out: *mut *mut ParamsHandle) -> FheResult {
    new_params("NewParamsCKKS", Scheme::Ckks, out)
}

/// Parse a TOML preset (`scheme = "bfv" | "bgv" | "ckks"` plus fields)
///
/// # Safety
/// `text` must be a NUL-terminated string and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn Params_FromToml(
    text: *const c_char,
    out_params: *mut *mut ParamsHandle,
) -> FheResult {
    guard("Params_FromToml", || {
        let text = c_str(text, "TOML text")?;
        let slot = out(out_params, "parameter set")?;
        let params = ParameterSet::from_toml(text)?;
        *slot = wrap(ParamsHandle(params));
        Ok(())
    })
}

/// # Safety
/// `params` must be a live handle and `out` a valid string slot.
#[no_mangle]
pub unsafe extern "C" fn Params_ToToml(
    params: *const ParamsHandle,
    out_text: *mut *mut c_char,
) -> FheResult {
    guard("Params_ToToml", || {
        let params = get(params, "parameter set")?;
        let slot = out(out_text, "string")?;
        *slot = string_out(params.0.to_toml()?)?;
        Ok(())
    })
}

/// Scheme code: BFV = 0, BGV = 1, CKKS = 2
///
/// # Safety
/// `params` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Params_GetScheme(
    params: *const ParamsHandle,
    out_scheme: *mut u32,
) -> FheResult {
    guard("Params_GetScheme", || {
        let params = get(params, "parameter set")?;
        *out(out_scheme, "scheme")? = params.0.scheme() as u32;
        Ok(())
    })
}

/// # Safety
/// `params` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Params_GetMultiplicativeDepth(
    params: *const ParamsHandle,
    out_depth: *mut u32,
) -> FheResult {
    guard("Params_GetMultiplicativeDepth", || {
        let params = get(params, "parameter set")?;
        *out(out_depth, "depth")? = params.0.common().multiplicative_depth;
        Ok(())
    })
}

macro_rules! setters {
    ($($name:ident($ty:ty) => |$p:ident, $v:ident| $body:expr;)*) => {
        $(
            /// # Safety
            /// `params` must be a live parameter-set handle.
            #[no_mangle]
            pub unsafe extern "C" fn $name(params: *mut ParamsHandle, value: $ty) -> FheResult {
                guard(stringify!($name), || {
                    let $p = &mut get_mut(params, "parameter set")?.0;
                    let $v = value;
                    let applied: EngineResult<()> = $body;
                    applied.map_err(FfiError::from)
                })
            }
        )*
    };
}

setters! {
    Params_SetMultiplicativeDepth(u32) => |p, v| p.set_multiplicative_depth(v);
    Params_SetRingDim(u64) => |p, v| p.set_ring_dim(v);
    Params_SetSecurityLevel(i32) => |p, v| {
        SecurityLevel::try_from(v).map(|level| p.set_security_level(level))
    };
    Params_SetBatchSize(u32) => |p, v| p.set_batch_size(v);
    Params_SetSecretKeyDist(i32) => |p, v| {
        SecretKeyDist::try_from(v).map(|dist| p.set_secret_key_dist(dist))
    };
    Params_SetKeySwitchTechnique(i32) => |p, v| {
        KeySwitchTechnique::try_from(v).map(|t| p.set_key_switch_technique(t))
    };
    Params_SetNumLargeDigits(u32) => |p, v| p.set_num_large_digits(v);
    Params_SetDigitSize(u32) => |p, v| p.set_digit_size(v);
    Params_SetMaxRelinSkDeg(u32) => |p, v| p.set_max_relin_sk_deg(v);
    Params_SetPlaintextModulus(u64) => |p, v| p.set_plaintext_modulus(v);
    Params_SetScalingModSize(u32) => |p, v| p.set_scaling_mod_size(v);
    Params_SetFirstModSize(u32) => |p, v| p.set_first_mod_size(v);
    Params_SetScalingTechnique(i32) => |p, v| {
        ScalingTechnique::try_from(v).and_then(|t| p.set_scaling_technique(t))
    };
}
