//! Cross-domain bridge: CKKS/FHEW scheme switching and the comparison
//! primitives built on it
//!
//! Arrays of LWE handles leave the boundary as a library-allocated array
//! released with [`FreeLWECiphertextArray`]; the handles inside it are owned
//! by the caller and destroyed one by one. Arrays coming in are borrowed
//! for the duration of the call.

use fhegate_core::{
    index_from_one_hot, BinFheParamSet, Ciphertext, CryptoContext, EngineResult, LweCiphertext,
    PublicKey, SchSwchParams, SecurityLevel,
};
use tracing::debug;

use crate::error::{guard, FfiError, FfiResult, FheResult};
use crate::registry::{
    array_out, free_array, get, get_mut, out, slice, wrap, BinFheContextHandle, CiphertextHandle,
    CryptoContextHandle, KeyPairHandle, LweCiphertextHandle, LweSecretKeyHandle, PublicKeyHandle,
    SchSwchParamsHandle,
};

// Scheme-switching parameters

/// # Safety
/// `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewSchSwchParams(out_params: *mut *mut SchSwchParamsHandle) -> FheResult {
    guard("NewSchSwchParams", || {
        let slot = out(out_params, "scheme-switching parameters")?;
        *slot = wrap(SchSwchParamsHandle(SchSwchParams::new()));
        Ok(())
    })
}

macro_rules! sch_setters {
    ($($name:ident($ty:ty) => |$p:ident, $v:ident| $body:expr;)*) => {
        $(
            /// # Safety
            /// `params` must be a live scheme-switching parameter handle.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                params: *mut SchSwchParamsHandle,
                value: $ty,
            ) -> FheResult {
                guard(stringify!($name), || {
                    let $p = &mut get_mut(params, "scheme-switching parameters")?.0;
                    let $v = value;
                    let applied: EngineResult<()> = $body;
                    applied.map_err(FfiError::from)
                })
            }
        )*
    };
}

sch_setters! {
    SchSwchParams_SetSecurityLevelCKKS(i32) => |p, v| {
        SecurityLevel::try_from(v).map(|level| p.set_security_level_ckks(level))
    };
    SchSwchParams_SetSecurityLevelFHEW(i32) => |p, v| {
        BinFheParamSet::try_from(v).and_then(|preset| p.set_security_level_fhew(preset))
    };
    SchSwchParams_SetNumSlotsCKKS(u32) => |p, v| p.set_num_slots_ckks(v);
    SchSwchParams_SetNumValues(u32) => |p, v| {
        p.set_num_values(v);
        Ok(())
    };
    SchSwchParams_SetCtxtModSizeFHEWLargePrec(u32) => |p, v| {
        p.set_ctxt_mod_size_fhew_large_prec(v)
    };
    SchSwchParams_SetComputeArgmin(bool) => |p, v| {
        p.set_compute_argmin(v);
        Ok(())
    };
    SchSwchParams_SetUseAltArgmin(bool) => |p, v| {
        p.set_use_alt_argmin(v);
        Ok(())
    };
    SchSwchParams_SetArbitraryFunctionEvaluation(bool) => |p, v| {
        p.set_arbitrary_function_evaluation(v);
        Ok(())
    };
    SchSwchParams_SetOneHotEncoding(bool) => |p, v| {
        p.set_one_hot_encoding(v);
        Ok(())
    };
}

macro_rules! sch_getters {
    ($($name:ident -> $ty:ty = |$p:ident| $body:expr;)*) => {
        $(
            /// # Safety
            /// `params` must be a live handle and `out` valid.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                params: *const SchSwchParamsHandle,
                out_value: *mut $ty,
            ) -> FheResult {
                guard(stringify!($name), || {
                    let $p = &get(params, "scheme-switching parameters")?.0;
                    *out(out_value, "value")? = $body;
                    Ok(())
                })
            }
        )*
    };
}

sch_getters! {
    SchSwchParams_GetSecurityLevelCKKS -> i32 = |p| p.security_level_ckks as i32;
    SchSwchParams_GetSecurityLevelFHEW -> i32 = |p| p.security_level_fhew as i32;
    SchSwchParams_GetNumSlotsCKKS -> u32 = |p| p.num_slots_ckks;
    SchSwchParams_GetNumValues -> u32 = |p| p.num_values;
}

// CKKS to FHEW

/// Configure the CKKS-to-FHEW direction and return the LWE secret key it
/// generated
///
/// # Safety
/// `cc` and `params` must be live handles and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalCKKStoFHEWSetup(
    cc: *const CryptoContextHandle,
    params: *const SchSwchParamsHandle,
    out_sk: *mut *mut LweSecretKeyHandle,
) -> FheResult {
    guard("CryptoContext_EvalCKKStoFHEWSetup", || {
        let cc = get(cc, "crypto context")?;
        let params = get(params, "scheme-switching parameters")?;
        let slot = out(out_sk, "LWE secret key")?;
        let sk = cc.0.eval_ckks_to_fhew_setup(&params.0)?;
        *slot = wrap(LweSecretKeyHandle(sk));
        Ok(())
    })
}

/// # Safety
/// All handles must be live.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalCKKStoFHEWKeyGen(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
    lwe_sk: *const LweSecretKeyHandle,
) -> FheResult {
    guard("CryptoContext_EvalCKKStoFHEWKeyGen", || {
        let cc = get(cc, "crypto context")?;
        let kp = get(kp, "key pair")?;
        let lwe_sk = get(lwe_sk, "LWE secret key")?;
        cc.0.eval_ckks_to_fhew_key_gen(&kp.0, &lwe_sk.0)?;
        Ok(())
    })
}

/// # Safety
/// `cc` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalCKKStoFHEWPrecompute(
    cc: *const CryptoContextHandle,
    scale: f64,
) -> FheResult {
    guard("CryptoContext_EvalCKKStoFHEWPrecompute", || {
        let cc = get(cc, "crypto context")?;
        cc.0.eval_ckks_to_fhew_precompute(scale)?;
        Ok(())
    })
}

/// Unpack the first `num_values` slots of `ct` into LWE ciphertexts
///
/// # Safety
/// `cc` and `ct` must be live handles; `out_array` and `out_len` must be
/// valid. The array is released with [`FreeLWECiphertextArray`].
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalCKKStoFHEW(
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    num_values: u32,
    out_array: *mut *mut *mut LweCiphertextHandle,
    out_len: *mut usize,
) -> FheResult {
    guard("CryptoContext_EvalCKKStoFHEW", || {
        let cc = get(cc, "crypto context")?;
        let ct = get(ct, "ciphertext")?;
        let array_slot = out(out_array, "LWE ciphertext array")?;
        let len_slot = out(out_len, "array length")?;
        let lwes = cc.0.eval_ckks_to_fhew(&ct.0, num_values)?;
        let handles: Vec<*mut LweCiphertextHandle> = lwes
            .into_iter()
            .map(|lwe| wrap(LweCiphertextHandle(lwe)))
            .collect();
        debug!(count = handles.len(), "CKKS ciphertext unpacked to LWE");
        let (array, len) = array_out(handles);
        *array_slot = array;
        *len_slot = len;
        Ok(())
    })
}

/// Release an array returned by [`CryptoContext_EvalCKKStoFHEW`]; the
/// handles it holds stay valid
///
/// # Safety
/// `array` and `len` must be exactly the pair that call returned.
#[no_mangle]
pub unsafe extern "C" fn FreeLWECiphertextArray(
    array: *mut *mut LweCiphertextHandle,
    len: usize,
) {
    free_array(array, len);
}

// FHEW to CKKS

/// # Safety
/// `cc` and `lwe_cc` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalFHEWtoCKKSSetup(
    cc: *const CryptoContextHandle,
    lwe_cc: *const BinFheContextHandle,
    num_slots: u32,
    log_q: u32,
) -> FheResult {
    guard("CryptoContext_EvalFHEWtoCKKSSetup", || {
        let cc = get(cc, "crypto context")?;
        let lwe_cc = get(lwe_cc, "binary FHE context")?;
        cc.0.eval_fhew_to_ckks_setup(&lwe_cc.0, num_slots, log_q)?;
        Ok(())
    })
}

/// # Safety
/// All handles must be live.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalFHEWtoCKKSKeyGen(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
    lwe_sk: *const LweSecretKeyHandle,
) -> FheResult {
    guard("CryptoContext_EvalFHEWtoCKKSKeyGen", || {
        let cc = get(cc, "crypto context")?;
        let kp = get(kp, "key pair")?;
        let lwe_sk = get(lwe_sk, "LWE secret key")?;
        cc.0.eval_fhew_to_ckks_key_gen(&kp.0, &lwe_sk.0)?;
        Ok(())
    })
}

unsafe fn borrow_lwes(
    array: *const *const LweCiphertextHandle,
    len: usize,
) -> FfiResult<Vec<LweCiphertext>> {
    slice(array, len, "LWE ciphertext array")?
        .iter()
        .enumerate()
        .map(|(i, &ct)| {
            get(ct, "LWE ciphertext")
                .map(|h| h.0.clone())
                .map_err(|_| FfiError::null(&format!("LWE ciphertext at index {i}")))
        })
        .collect()
}

unsafe fn repack(
    op: &'static str,
    cc: *const CryptoContextHandle,
    array: *const *const LweCiphertextHandle,
    len: usize,
    slot: *mut *mut CiphertextHandle,
    body: impl FnOnce(&CryptoContext, &[LweCiphertext]) -> EngineResult<Ciphertext>,
) -> FheResult {
    guard(op, || {
        let cc = get(cc, "crypto context")?;
        let lwes = borrow_lwes(array, len)?;
        let slot = out(slot, "ciphertext")?;
        let ct = body(&cc.0, &lwes)?;
        *slot = wrap(CiphertextHandle(ct));
        Ok(())
    })
}

/// Pack LWE ciphertexts modulo `p` into the slots of one CKKS ciphertext
///
/// # Safety
/// `cc` must be live, `array` must hold `len` live handles and `out` must
/// be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalFHEWtoCKKS(
    cc: *const CryptoContextHandle,
    array: *const *const LweCiphertextHandle,
    len: usize,
    num_slots: u32,
    p: u64,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    repack("CryptoContext_EvalFHEWtoCKKS", cc, array, len, out_ct, |cc, lwes| {
        cc.eval_fhew_to_ckks(lwes, num_slots, p)
    })
}

/// As [`CryptoContext_EvalFHEWtoCKKS`], decoding into `[pmin, pmax)`
///
/// # Safety
/// See [`CryptoContext_EvalFHEWtoCKKS`].
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalFHEWtoCKKSExt(
    cc: *const CryptoContextHandle,
    array: *const *const LweCiphertextHandle,
    len: usize,
    num_slots: u32,
    p: u64,
    pmin: f64,
    pmax: f64,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    repack("CryptoContext_EvalFHEWtoCKKSExt", cc, array, len, out_ct, |cc, lwes| {
        cc.eval_fhew_to_ckks_ext(lwes, num_slots, p, pmin, pmax)
    })
}

// Both directions

/// # Safety
/// `cc` and `params` must be live handles and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalSchemeSwitchingSetup(
    cc: *const CryptoContextHandle,
    params: *const SchSwchParamsHandle,
    out_sk: *mut *mut LweSecretKeyHandle,
) -> FheResult {
    guard("CryptoContext_EvalSchemeSwitchingSetup", || {
        let cc = get(cc, "crypto context")?;
        let params = get(params, "scheme-switching parameters")?;
        let slot = out(out_sk, "LWE secret key")?;
        let sk = cc.0.eval_scheme_switching_setup(&params.0)?;
        *slot = wrap(LweSecretKeyHandle(sk));
        Ok(())
    })
}

/// # Safety
/// All handles must be live.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalSchemeSwitchingKeyGen(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
    lwe_sk: *const LweSecretKeyHandle,
) -> FheResult {
    guard("CryptoContext_EvalSchemeSwitchingKeyGen", || {
        let cc = get(cc, "crypto context")?;
        let kp = get(kp, "key pair")?;
        let lwe_sk = get(lwe_sk, "LWE secret key")?;
        cc.0.eval_scheme_switching_key_gen(&kp.0, &lwe_sk.0)?;
        Ok(())
    })
}

/// New handle onto the binary-FHE context the bridge uses. Destroying the
/// handle leaves the bridge intact.
///
/// # Safety
/// `cc` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_GetBinCCForSchemeSwitch(
    cc: *const CryptoContextHandle,
    out_cc: *mut *mut BinFheContextHandle,
) -> FheResult {
    guard("CryptoContext_GetBinCCForSchemeSwitch", || {
        let cc = get(cc, "crypto context")?;
        let slot = out(out_cc, "binary FHE context")?;
        let binfhe = cc.0.bin_cc_for_scheme_switch()?;
        *slot = wrap(BinFheContextHandle(binfhe));
        Ok(())
    })
}

/// # Safety
/// `cc` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalCompareSwitchPrecompute(
    cc: *const CryptoContextHandle,
    p_lwe: u64,
    scale_sign: f64,
) -> FheResult {
    guard("CryptoContext_EvalCompareSwitchPrecompute", || {
        let cc = get(cc, "crypto context")?;
        cc.0.eval_compare_switch_precompute(p_lwe, scale_sign)?;
        Ok(())
    })
}

// Comparison primitives

type ExtremeFn = fn(
    &CryptoContext,
    &Ciphertext,
    &PublicKey,
    u32,
    u32,
    u64,
    f64,
) -> EngineResult<(Ciphertext, Ciphertext)>;

/// Both outputs are written together or not at all
#[allow(clippy::too_many_arguments)]
unsafe fn extreme(
    op: &'static str,
    eval: ExtremeFn,
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    pk: *const PublicKeyHandle,
    num_values: u32,
    num_slots: u32,
    p_lwe: u64,
    scale_sign: f64,
    out_value: *mut *mut CiphertextHandle,
    out_index: *mut *mut CiphertextHandle,
) -> FheResult {
    guard(op, || {
        let cc = get(cc, "crypto context")?;
        let ct = get(ct, "ciphertext")?;
        let pk = get(pk, "public key")?;
        let value_slot = out(out_value, "value ciphertext")?;
        let index_slot = out(out_index, "index ciphertext")?;
        let (value, index) = eval(&cc.0, &ct.0, &pk.0, num_values, num_slots, p_lwe, scale_sign)?;
        *value_slot = wrap(CiphertextHandle(value));
        *index_slot = wrap(CiphertextHandle(index));
        Ok(())
    })
}

macro_rules! extremes {
    ($($(#[$doc:meta])* $name:ident => $method:ident;)*) => {
        $(
            $(#[$doc])*
            ///
            /// # Safety
            /// All handles must be live; both output slots must be valid.
            #[no_mangle]
            #[allow(clippy::too_many_arguments)]
            pub unsafe extern "C" fn $name(
                cc: *const CryptoContextHandle,
                ct: *const CiphertextHandle,
                pk: *const PublicKeyHandle,
                num_values: u32,
                num_slots: u32,
                p_lwe: u64,
                scale_sign: f64,
                out_value: *mut *mut CiphertextHandle,
                out_index: *mut *mut CiphertextHandle,
            ) -> FheResult {
                extreme(
                    stringify!($name),
                    CryptoContext::$method,
                    cc,
                    ct,
                    pk,
                    num_values,
                    num_slots,
                    p_lwe,
                    scale_sign,
                    out_value,
                    out_index,
                )
            }
        )*
    };
}

extremes! {
    /// Minimum of the first `num_values` slots and its position
    CryptoContext_EvalMinSchemeSwitching => eval_min_scheme_switching;
    CryptoContext_EvalMinSchemeSwitchingAlt => eval_min_scheme_switching_alt;
    /// Maximum of the first `num_values` slots and its position
    CryptoContext_EvalMaxSchemeSwitching => eval_max_scheme_switching;
    CryptoContext_EvalMaxSchemeSwitchingAlt => eval_max_scheme_switching_alt;
}

/// Decrypt a one-hot index ciphertext and return the first set position
///
/// # Safety
/// All handles must be live and `out` must be valid.
#[no_mangle]
pub unsafe extern "C" fn MinMax_GetIndexFromOneHot(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
    index_ct: *const CiphertextHandle,
    num_values: u32,
    out_index: *mut u32,
) -> FheResult {
    guard("MinMax_GetIndexFromOneHot", || {
        let cc = get(cc, "crypto context")?;
        let kp = get(kp, "key pair")?;
        let ct = get(index_ct, "index ciphertext")?;
        let slot = out(out_index, "index")?;
        let decrypted = cc.0.decrypt(kp.0.private_key()?, &ct.0)?;
        if !decrypted.is_valid {
            return Err(FfiError::IntegrityFailure(
                "index ciphertext does not decrypt under this key pair".into(),
            ));
        }
        let values = decrypted.plaintext.real_packed_values()?;
        let index = index_from_one_hot(&values, num_values as usize)?;
        *slot = index as u32;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FheResult_FreeMessage, FheStatus};
    use crate::registry::{
        BinFHEContext_Delete, DestroyCiphertext, DestroyCryptoContext, DestroyKeyPair,
        DestroySchSwchParams, LWECiphertext_Delete, LWESecretKey_Delete,
    };
    use fhegate_core::{ParameterSet, Scheme};

    const P_LWE: u64 = 1 << 17;
    const SCALE_SIGN: f64 = 512.0;

    struct Fixture {
        cc: *mut CryptoContextHandle,
        kp: *mut KeyPairHandle,
        params: *mut SchSwchParamsHandle,
    }

    impl Fixture {
        fn new() -> Self {
            let mut params = ParameterSet::new(Scheme::Ckks);
            params.set_security_level(SecurityLevel::NotSet);
            params.set_ring_dim(1 << 6).unwrap();
            params.set_batch_size(8).unwrap();
            params.set_scaling_mod_size(50).unwrap();
            params.set_multiplicative_depth(4).unwrap();
            let cc = CryptoContext::new(params).unwrap();
            cc.enable(0x01 | 0x02 | 0x08 | 0x80).unwrap();
            let kp = cc.key_gen().unwrap();

            let mut sch = std::ptr::null_mut();
            unsafe {
                assert!(NewSchSwchParams(&mut sch).is_ok());
                assert!(SchSwchParams_SetSecurityLevelCKKS(sch, 6).is_ok());
                assert!(SchSwchParams_SetSecurityLevelFHEW(sch, 0).is_ok());
                assert!(SchSwchParams_SetNumSlotsCKKS(sch, 8).is_ok());
            }
            Fixture {
                cc: wrap(CryptoContextHandle(cc)),
                kp: wrap(KeyPairHandle(kp)),
                params: sch,
            }
        }

        unsafe fn encrypt(&self, values: &[f64]) -> *mut CiphertextHandle {
            let cc = &(*self.cc).0;
            let pt = cc.make_ckks_packed_plaintext(values).unwrap();
            wrap(CiphertextHandle(cc.encrypt(&(*self.kp).0, &pt).unwrap()))
        }

        unsafe fn first_slot(&self, ct: *const CiphertextHandle) -> f64 {
            let cc = &(*self.cc).0;
            let dec = cc.decrypt((*self.kp).0.private_key().unwrap(), &(*ct).0).unwrap();
            assert!(dec.is_valid);
            dec.plaintext.real_packed_values().unwrap()[0]
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            unsafe {
                DestroySchSwchParams(self.params);
                DestroyKeyPair(self.kp);
                DestroyCryptoContext(self.cc);
            }
        }
    }

    #[test]
    fn test_params_setters_and_getters() {
        unsafe {
            let f = Fixture::new();
            assert!(SchSwchParams_SetNumValues(f.params, 4).is_ok());
            let mut slots = 0;
            assert!(SchSwchParams_GetNumSlotsCKKS(f.params, &mut slots).is_ok());
            assert_eq!(slots, 8);
            let mut values = 0;
            assert!(SchSwchParams_GetNumValues(f.params, &mut values).is_ok());
            assert_eq!(values, 4);
            let mut level = -1;
            assert!(SchSwchParams_GetSecurityLevelFHEW(f.params, &mut level).is_ok());
            assert_eq!(level, 0);

            let result = SchSwchParams_SetNumSlotsCKKS(f.params, 6);
            assert_eq!(result.code, FheStatus::InvalidArgument);
            FheResult_FreeMessage(result.message);
            // LMKCDEY presets cannot back the bridge
            let result = SchSwchParams_SetSecurityLevelFHEW(f.params, 21);
            assert_eq!(result.code, FheStatus::InvalidArgument);
            FheResult_FreeMessage(result.message);
            assert!(SchSwchParams_GetSecurityLevelFHEW(f.params, &mut level).is_ok());
            assert_eq!(level, 0);
        }
    }

    #[test]
    fn test_ckks_to_fhew_array() {
        unsafe {
            let f = Fixture::new();
            let mut lwe_sk = std::ptr::null_mut();
            assert!(CryptoContext_EvalCKKStoFHEWSetup(f.cc, f.params, &mut lwe_sk).is_ok());
            assert!(CryptoContext_EvalCKKStoFHEWKeyGen(f.cc, f.kp, lwe_sk).is_ok());
            let p = 4u64;
            assert!(CryptoContext_EvalCKKStoFHEWPrecompute(f.cc, 1.0 / p as f64).is_ok());

            let ct = f.encrypt(&[0.0, 1.0, 2.0, 3.0]);
            let mut array = std::ptr::null_mut();
            let mut len = 0;
            assert!(CryptoContext_EvalCKKStoFHEW(f.cc, ct, 4, &mut array, &mut len).is_ok());
            assert_eq!(len, 4);

            let mut bin = std::ptr::null_mut();
            assert!(CryptoContext_GetBinCCForSchemeSwitch(f.cc, &mut bin).is_ok());
            let handles = std::slice::from_raw_parts(array, len).to_vec();
            for (i, &lwe) in handles.iter().enumerate() {
                let m = (*bin).0.decrypt_modulus(&(*lwe_sk).0, &(*lwe).0, p).unwrap();
                assert_eq!(m, i as u64);
            }
            FreeLWECiphertextArray(array, len);
            for lwe in handles {
                LWECiphertext_Delete(lwe);
            }
            BinFHEContext_Delete(bin);
            LWESecretKey_Delete(lwe_sk);
            DestroyCiphertext(ct);
        }
    }

    #[test]
    fn test_fhew_to_ckks_rejects_null_element() {
        unsafe {
            let f = Fixture::new();
            let array: [*const LweCiphertextHandle; 2] = [std::ptr::null(); 2];
            let sentinel = 0x40 as *mut CiphertextHandle;
            let mut ct = sentinel;
            let result = CryptoContext_EvalFHEWtoCKKS(f.cc, array.as_ptr(), 2, 8, 4, &mut ct);
            assert_eq!(result.code, FheStatus::NullArgument);
            assert!(result.message_str().unwrap().contains("index 0"));
            assert_eq!(ct, sentinel);
            FheResult_FreeMessage(result.message);
        }
    }

    #[test]
    fn test_min_with_index() {
        unsafe {
            let f = Fixture::new();
            let mut lwe_sk = std::ptr::null_mut();
            assert!(CryptoContext_EvalSchemeSwitchingSetup(f.cc, f.params, &mut lwe_sk).is_ok());
            assert!(CryptoContext_EvalSchemeSwitchingKeyGen(f.cc, f.kp, lwe_sk).is_ok());
            assert!(CryptoContext_EvalCompareSwitchPrecompute(f.cc, P_LWE, SCALE_SIGN).is_ok());

            let ct = f.encrypt(&[3.0, -1.25, 7.0, 0.5]);
            let pk: *const PublicKeyHandle =
                &PublicKeyHandle((*f.kp).0.public_key().unwrap().clone());
            let (mut value, mut index) = (std::ptr::null_mut(), std::ptr::null_mut());
            let result = CryptoContext_EvalMinSchemeSwitching(
                f.cc, ct, pk, 4, 8, 0, 1.0, &mut value, &mut index,
            );
            assert!(result.is_ok());
            assert!((f.first_slot(value) + 1.25).abs() < 1e-6);

            let mut position = 99;
            assert!(MinMax_GetIndexFromOneHot(f.cc, f.kp, index, 4, &mut position).is_ok());
            assert_eq!(position, 1);

            DestroyCiphertext(value);
            DestroyCiphertext(index);
            DestroyCiphertext(ct);
            LWESecretKey_Delete(lwe_sk);
        }
    }

    #[test]
    fn test_max_needs_precompute_and_writes_nothing() {
        unsafe {
            let f = Fixture::new();
            let mut lwe_sk = std::ptr::null_mut();
            assert!(CryptoContext_EvalSchemeSwitchingSetup(f.cc, f.params, &mut lwe_sk).is_ok());
            assert!(CryptoContext_EvalSchemeSwitchingKeyGen(f.cc, f.kp, lwe_sk).is_ok());

            let ct = f.encrypt(&[1.0, 2.0]);
            let pk: *const PublicKeyHandle =
                &PublicKeyHandle((*f.kp).0.public_key().unwrap().clone());
            let sentinel = 0x50 as *mut CiphertextHandle;
            let (mut value, mut index) = (sentinel, sentinel);
            let result = CryptoContext_EvalMaxSchemeSwitchingAlt(
                f.cc, ct, pk, 2, 8, 0, 1.0, &mut value, &mut index,
            );
            assert_eq!(result.code, FheStatus::PreconditionNotMet);
            assert_eq!((value, index), (sentinel, sentinel));
            FheResult_FreeMessage(result.message);

            let result = CryptoContext_EvalMaxSchemeSwitching(
                f.cc,
                ct,
                pk,
                2,
                8,
                0,
                1.0,
                &mut value,
                std::ptr::null_mut(),
            );
            assert_eq!(result.code, FheStatus::NullArgument);
            assert_eq!(value, sentinel);
            FheResult_FreeMessage(result.message);

            DestroyCiphertext(ct);
            LWESecretKey_Delete(lwe_sk);
        }
    }
}
