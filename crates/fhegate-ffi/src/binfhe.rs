//! Binary-FHE entry points
//!
//! A family of its own: `BinFHEContext_*` handles never mix with the
//! CKKS/BFV/BGV handles except through the scheme-switching bridge.

use fhegate_core::{BinFheContext, BinFheMethod, BinFheParamSet, BinGate, LweCiphertext};

use crate::error::{guard, FfiResult, FheResult};
use crate::registry::{get, out, wrap, BinFheContextHandle, LweCiphertextHandle, LweSecretKeyHandle};

unsafe fn lwe<'a>(ct: *const LweCiphertextHandle, what: &str) -> FfiResult<&'a LweCiphertext> {
    Ok(&get(ct, what)?.0)
}

/// Fresh context; call `BinFHEContext_Generate` before use
///
/// # Safety
/// `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_New(out_cc: *mut *mut BinFheContextHandle) -> FheResult {
    guard("BinFHEContext_New", || {
        let slot = out(out_cc, "binary FHE context")?;
        *slot = wrap(BinFheContextHandle(BinFheContext::new()));
        Ok(())
    })
}

/// Fix the parameter preset (0..=43) and the bootstrapping method
/// (AP = 1, GINX = 2, LMKCDEY = 3)
///
/// # Safety
/// `cc` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_Generate(
    cc: *const BinFheContextHandle,
    paramset: i32,
    method: i32,
) -> FheResult {
    guard("BinFHEContext_Generate", || {
        let cc = get(cc, "binary FHE context")?;
        let paramset = BinFheParamSet::try_from(paramset)?;
        let method = BinFheMethod::try_from(method)?;
        cc.0.generate(paramset, method)?;
        Ok(())
    })
}

/// # Safety
/// `cc` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_KeyGen(
    cc: *const BinFheContextHandle,
    out_sk: *mut *mut LweSecretKeyHandle,
) -> FheResult {
    guard("BinFHEContext_KeyGen", || {
        let cc = get(cc, "binary FHE context")?;
        let slot = out(out_sk, "LWE secret key")?;
        let sk = cc.0.key_gen()?;
        *slot = wrap(LweSecretKeyHandle(sk));
        Ok(())
    })
}

/// Bootstrapping key for `sk`; gates and bootstrapping need it
///
/// # Safety
/// `cc` and `sk` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_BTKeyGen(
    cc: *const BinFheContextHandle,
    sk: *const LweSecretKeyHandle,
) -> FheResult {
    guard("BinFHEContext_BTKeyGen", || {
        let cc = get(cc, "binary FHE context")?;
        let sk = get(sk, "LWE secret key")?;
        cc.0.bt_key_gen(&sk.0)?;
        Ok(())
    })
}

/// Encrypt a bit under the gate plaintext modulus
///
/// # Safety
/// `cc` and `sk` must be live handles and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_Encrypt(
    cc: *const BinFheContextHandle,
    sk: *const LweSecretKeyHandle,
    message: u64,
    out_ct: *mut *mut LweCiphertextHandle,
) -> FheResult {
    guard("BinFHEContext_Encrypt", || {
        let cc = get(cc, "binary FHE context")?;
        let sk = get(sk, "LWE secret key")?;
        let slot = out(out_ct, "LWE ciphertext")?;
        let ct = cc.0.encrypt(&sk.0, message)?;
        *slot = wrap(LweCiphertextHandle(ct));
        Ok(())
    })
}

/// # Safety
/// `cc` and `sk` must be live handles and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_EncryptModulus(
    cc: *const BinFheContextHandle,
    sk: *const LweSecretKeyHandle,
    message: u64,
    p: u64,
    out_ct: *mut *mut LweCiphertextHandle,
) -> FheResult {
    guard("BinFHEContext_EncryptModulus", || {
        let cc = get(cc, "binary FHE context")?;
        let sk = get(sk, "LWE secret key")?;
        let slot = out(out_ct, "LWE ciphertext")?;
        let ct = cc.0.encrypt_modulus(&sk.0, message, p)?;
        *slot = wrap(LweCiphertextHandle(ct));
        Ok(())
    })
}

/// # Safety
/// All handles must be live and `out` must be valid.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_Decrypt(
    cc: *const BinFheContextHandle,
    sk: *const LweSecretKeyHandle,
    ct: *const LweCiphertextHandle,
    out_message: *mut u64,
) -> FheResult {
    guard("BinFHEContext_Decrypt", || {
        let cc = get(cc, "binary FHE context")?;
        let sk = get(sk, "LWE secret key")?;
        let ct = lwe(ct, "LWE ciphertext")?;
        let slot = out(out_message, "message")?;
        *slot = cc.0.decrypt(&sk.0, ct)?;
        Ok(())
    })
}

/// # Safety
/// All handles must be live and `out` must be valid.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_DecryptModulus(
    cc: *const BinFheContextHandle,
    sk: *const LweSecretKeyHandle,
    ct: *const LweCiphertextHandle,
    p: u64,
    out_message: *mut u64,
) -> FheResult {
    guard("BinFHEContext_DecryptModulus", || {
        let cc = get(cc, "binary FHE context")?;
        let sk = get(sk, "LWE secret key")?;
        let ct = lwe(ct, "LWE ciphertext")?;
        let slot = out(out_message, "message")?;
        *slot = cc.0.decrypt_modulus(&sk.0, ct, p)?;
        Ok(())
    })
}

unsafe fn gate(
    op: &'static str,
    cc: *const BinFheContextHandle,
    gate: i32,
    inputs: &[*const LweCiphertextHandle],
    slot: *mut *mut LweCiphertextHandle,
) -> FheResult {
    guard(op, || {
        let cc = get(cc, "binary FHE context")?;
        let gate = BinGate::try_from(gate)?;
        let inputs = inputs
            .iter()
            .map(|&ct| lwe(ct, "LWE ciphertext"))
            .collect::<FfiResult<Vec<_>>>()?;
        let slot = out(slot, "LWE ciphertext")?;
        let ct = cc.0.eval_bin_gate(gate, &inputs)?;
        *slot = wrap(LweCiphertextHandle(ct));
        Ok(())
    })
}

/// Two-input gates: OR = 0, AND = 1, NOR = 2, NAND = 3, XOR = 4, XNOR = 5,
/// XOR_FAST = 11, XNOR_FAST = 12
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_EvalBinGate(
    cc: *const BinFheContextHandle,
    gate_code: i32,
    ct1: *const LweCiphertextHandle,
    ct2: *const LweCiphertextHandle,
    out_ct: *mut *mut LweCiphertextHandle,
) -> FheResult {
    gate("BinFHEContext_EvalBinGate", cc, gate_code, &[ct1, ct2], out_ct)
}

/// Three-input gates: MAJORITY = 6, AND3 = 7, OR3 = 8, CMUX = 13
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_EvalBinGate3(
    cc: *const BinFheContextHandle,
    gate_code: i32,
    ct1: *const LweCiphertextHandle,
    ct2: *const LweCiphertextHandle,
    ct3: *const LweCiphertextHandle,
    out_ct: *mut *mut LweCiphertextHandle,
) -> FheResult {
    gate("BinFHEContext_EvalBinGate3", cc, gate_code, &[ct1, ct2, ct3], out_ct)
}

/// Four-input gates: AND4 = 9, OR4 = 10
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_EvalBinGate4(
    cc: *const BinFheContextHandle,
    gate_code: i32,
    ct1: *const LweCiphertextHandle,
    ct2: *const LweCiphertextHandle,
    ct3: *const LweCiphertextHandle,
    ct4: *const LweCiphertextHandle,
    out_ct: *mut *mut LweCiphertextHandle,
) -> FheResult {
    gate(
        "BinFHEContext_EvalBinGate4",
        cc,
        gate_code,
        &[ct1, ct2, ct3, ct4],
        out_ct,
    )
}

macro_rules! lwe_unary {
    ($($name:ident => |$cc:ident, $ct:ident| $body:expr;)*) => {
        $(
            /// # Safety
            /// All handles must be live and `out` must be a valid handle slot.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                cc: *const BinFheContextHandle,
                ct: *const LweCiphertextHandle,
                out_ct: *mut *mut LweCiphertextHandle,
            ) -> FheResult {
                guard(stringify!($name), || {
                    let $cc = &get(cc, "binary FHE context")?.0;
                    let $ct = lwe(ct, "LWE ciphertext")?;
                    let slot = out(out_ct, "LWE ciphertext")?;
                    *slot = wrap(LweCiphertextHandle($body?));
                    Ok(())
                })
            }
        )*
    };
}

lwe_unary! {
    BinFHEContext_EvalNOT => |cc, ct| cc.eval_not(ct);
    BinFHEContext_Bootstrap => |cc, ct| cc.bootstrap(ct);
    BinFHEContext_EvalSign => |cc, ct| cc.eval_sign(ct);
}

/// Clear the `round_bits` least significant bits of the message
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn BinFHEContext_EvalFloor(
    cc: *const BinFheContextHandle,
    ct: *const LweCiphertextHandle,
    round_bits: u32,
    out_ct: *mut *mut LweCiphertextHandle,
) -> FheResult {
    guard("BinFHEContext_EvalFloor", || {
        let cc = get(cc, "binary FHE context")?;
        let ct = lwe(ct, "LWE ciphertext")?;
        let slot = out(out_ct, "LWE ciphertext")?;
        let floored = cc.0.eval_floor(ct, round_bits)?;
        *slot = wrap(LweCiphertextHandle(floored));
        Ok(())
    })
}

macro_rules! lwe_getters {
    ($($name:ident -> $ty:ty = |$cc:ident| $body:expr;)*) => {
        $(
            /// # Safety
            /// `cc` must be a live handle and `out` valid.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                cc: *const BinFheContextHandle,
                out_value: *mut $ty,
            ) -> FheResult {
                guard(stringify!($name), || {
                    let $cc = &get(cc, "binary FHE context")?.0;
                    let slot = out(out_value, "value")?;
                    *slot = $body;
                    Ok(())
                })
            }
        )*
    };
}

lwe_getters! {
    BinFHEContext_GetMaxPlaintextSpace -> u32 = |cc| cc.max_plaintext_space()?;
    BinFHEContext_Getn -> u32 = |cc| cc.params()?.n;
    BinFHEContext_Getq -> u64 = |cc| cc.params()?.q;
    BinFHEContext_GetBeta -> u32 = |cc| cc.params()?.beta;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FheResult_FreeMessage, FheStatus};
    use crate::registry::{BinFHEContext_Delete, LWECiphertext_Delete, LWESecretKey_Delete};

    struct Fixture {
        cc: *mut BinFheContextHandle,
        sk: *mut LweSecretKeyHandle,
    }

    impl Fixture {
        unsafe fn new(bootstrap: bool) -> Self {
            let mut cc = std::ptr::null_mut();
            assert!(BinFHEContext_New(&mut cc).is_ok());
            assert!(BinFHEContext_Generate(cc, 0, 2).is_ok());
            let mut sk = std::ptr::null_mut();
            assert!(BinFHEContext_KeyGen(cc, &mut sk).is_ok());
            if bootstrap {
                assert!(BinFHEContext_BTKeyGen(cc, sk).is_ok());
            }
            Fixture { cc, sk }
        }

        unsafe fn bit(&self, m: u64) -> *mut LweCiphertextHandle {
            let mut ct = std::ptr::null_mut();
            assert!(BinFHEContext_Encrypt(self.cc, self.sk, m, &mut ct).is_ok());
            ct
        }

        unsafe fn open(&self, ct: *const LweCiphertextHandle) -> u64 {
            let mut m = 99;
            assert!(BinFHEContext_Decrypt(self.cc, self.sk, ct, &mut m).is_ok());
            m
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            unsafe {
                LWESecretKey_Delete(self.sk);
                BinFHEContext_Delete(self.cc);
            }
        }
    }

    #[test]
    fn test_gate_truth_tables() {
        unsafe {
            let f = Fixture::new(true);
            let cases = [(1, [0u64, 0, 0, 1]), (0, [0, 1, 1, 1]), (4, [0, 1, 1, 0])];
            for (code, expected) in cases {
                for (i, (a, b)) in [(0, 0), (0, 1), (1, 0), (1, 1)].into_iter().enumerate() {
                    let (ca, cb) = (f.bit(a), f.bit(b));
                    let mut out_ct = std::ptr::null_mut();
                    assert!(BinFHEContext_EvalBinGate(f.cc, code, ca, cb, &mut out_ct).is_ok());
                    assert_eq!(f.open(out_ct), expected[i], "gate {code} on ({a}, {b})");
                    for ct in [ca, cb, out_ct] {
                        LWECiphertext_Delete(ct);
                    }
                }
            }
        }
    }

    #[test]
    fn test_gate_before_btkeygen_is_precondition() {
        unsafe {
            let f = Fixture::new(false);
            let (a, b) = (f.bit(1), f.bit(0));
            let mut out_ct = std::ptr::null_mut();
            let result = BinFHEContext_EvalBinGate(f.cc, 1, a, b, &mut out_ct);
            assert_eq!(result.code, FheStatus::PreconditionNotMet);
            assert!(out_ct.is_null());
            FheResult_FreeMessage(result.message);

            let mut not = std::ptr::null_mut();
            assert!(BinFHEContext_EvalNOT(f.cc, a, &mut not).is_ok());
            assert_eq!(f.open(not), 0);
            for ct in [a, b, not] {
                LWECiphertext_Delete(ct);
            }
        }
    }

    #[test]
    fn test_wrong_arity_and_codes() {
        unsafe {
            let f = Fixture::new(true);
            let (a, b) = (f.bit(1), f.bit(1));
            let mut out_ct = std::ptr::null_mut();
            let result = BinFHEContext_EvalBinGate(f.cc, 6, a, b, &mut out_ct);
            assert_eq!(result.code, FheStatus::InvalidArgument);
            FheResult_FreeMessage(result.message);
            let result = BinFHEContext_EvalBinGate(f.cc, 14, a, b, &mut out_ct);
            assert_eq!(result.code, FheStatus::InvalidArgument);
            FheResult_FreeMessage(result.message);
            assert!(out_ct.is_null());

            let result = BinFHEContext_Generate(f.cc, 0, 0);
            assert_eq!(result.code, FheStatus::InvalidArgument);
            FheResult_FreeMessage(result.message);
            LWECiphertext_Delete(a);
            LWECiphertext_Delete(b);
        }
    }

    #[test]
    fn test_majority_and_getters() {
        unsafe {
            let f = Fixture::new(true);
            let bits = [f.bit(1), f.bit(0), f.bit(1)];
            let mut out_ct = std::ptr::null_mut();
            let [a, b, c] = bits;
            let result = BinFHEContext_EvalBinGate3(f.cc, 6, a, b, c, &mut out_ct);
            assert!(result.is_ok());
            assert_eq!(f.open(out_ct), 1);

            let mut n = 0;
            assert!(BinFHEContext_Getn(f.cc, &mut n).is_ok());
            assert!(n > 0);
            let mut q = 0;
            assert!(BinFHEContext_Getq(f.cc, &mut q).is_ok());
            assert!(q > 4);
            let mut space = 0;
            assert!(BinFHEContext_GetMaxPlaintextSpace(f.cc, &mut space).is_ok());
            assert!(space >= 4);

            for ct in bits {
                LWECiphertext_Delete(ct);
            }
            LWECiphertext_Delete(out_ct);
        }
    }

    #[test]
    fn test_getters_before_generate() {
        unsafe {
            let mut cc = std::ptr::null_mut();
            assert!(BinFHEContext_New(&mut cc).is_ok());
            let mut n = 7;
            let result = BinFHEContext_Getn(cc, &mut n);
            assert_eq!(result.code, FheStatus::PreconditionNotMet);
            assert_eq!(n, 7);
            FheResult_FreeMessage(result.message);
            BinFHEContext_Delete(cc);
        }
    }
}
