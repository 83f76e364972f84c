//! Operation dispatcher
//!
//! Each entry point checks its handle arguments, makes exactly one engine
//! call and wraps exactly one new output handle. Inputs are never mutated.
//! Scheme and context compatibility is left to the engine.

use fhegate_core::{Ciphertext, CryptoContext, Decrypted, PrivateKey};

use crate::error::{guard, FfiError, FfiResult, FheResult};
use crate::registry::{
    get, out, slice, wrap, CiphertextHandle, CryptoContextHandle, EvalKeyHandle,
    FastRotationPrecompHandle, KeyPairHandle, PlaintextHandle, PrivateKeyHandle, PublicKeyHandle,
};

/// Run `body` against the context and store the ciphertext it yields
unsafe fn emit<F>(
    op: &'static str,
    cc: *const CryptoContextHandle,
    slot: *mut *mut CiphertextHandle,
    body: F,
) -> FheResult
where
    F: FnOnce(&CryptoContext) -> FfiResult<Ciphertext>,
{
    guard(op, || {
        let cc = get(cc, "crypto context")?;
        let slot = out(slot, "ciphertext")?;
        let ct = body(&cc.0)?;
        *slot = wrap(CiphertextHandle(ct));
        Ok(())
    })
}

unsafe fn ciphertext<'a>(ct: *const CiphertextHandle) -> FfiResult<&'a Ciphertext> {
    Ok(&get(ct, "ciphertext")?.0)
}

// Encryption

/// Encrypt under the public half of `kp`
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_Encrypt(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
    pt: *const PlaintextHandle,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_Encrypt", cc, out_ct, |cc| {
        let kp = get(kp, "key pair")?;
        let pt = get(pt, "plaintext")?;
        Ok(cc.encrypt(&kp.0, &pt.0)?)
    })
}

/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EncryptPublic(
    cc: *const CryptoContextHandle,
    pk: *const PublicKeyHandle,
    pt: *const PlaintextHandle,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_EncryptPublic", cc, out_ct, |cc| {
        let pk = get(pk, "public key")?;
        let pt = get(pt, "plaintext")?;
        Ok(cc.encrypt_public(&pk.0, &pt.0)?)
    })
}

/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EncryptPrivate(
    cc: *const CryptoContextHandle,
    sk: *const PrivateKeyHandle,
    pt: *const PlaintextHandle,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_EncryptPrivate", cc, out_ct, |cc| {
        let sk = get(sk, "private key")?;
        let pt = get(pt, "plaintext")?;
        Ok(cc.encrypt_private(&sk.0, &pt.0)?)
    })
}

// Decryption

fn accept(decrypted: Decrypted) -> FfiResult<fhegate_core::Plaintext> {
    if decrypted.is_valid {
        Ok(decrypted.plaintext)
    } else {
        Err(FfiError::IntegrityFailure(
            "decryption result is not valid (wrong key or noise budget exhausted)".into(),
        ))
    }
}

unsafe fn decrypt_with(
    op: &'static str,
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    slot: *mut *mut PlaintextHandle,
    secret: impl FnOnce() -> FfiResult<PrivateKey>,
) -> FheResult {
    guard(op, || {
        let cc = get(cc, "crypto context")?;
        let secret = secret()?;
        let ct = ciphertext(ct)?;
        let slot = out(slot, "plaintext")?;
        let pt = accept(cc.0.decrypt(&secret, ct)?)?;
        *slot = wrap(PlaintextHandle(pt));
        Ok(())
    })
}

/// Decrypt with the private half of `kp`. An invalid result is reported
/// as IntegrityFailure and no plaintext is produced.
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_Decrypt(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
    ct: *const CiphertextHandle,
    out_pt: *mut *mut PlaintextHandle,
) -> FheResult {
    decrypt_with("CryptoContext_Decrypt", cc, ct, out_pt, || {
        Ok(get(kp, "key pair")?.0.private_key()?.clone())
    })
}

/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_DecryptPrivate(
    cc: *const CryptoContextHandle,
    sk: *const PrivateKeyHandle,
    ct: *const CiphertextHandle,
    out_pt: *mut *mut PlaintextHandle,
) -> FheResult {
    decrypt_with("CryptoContext_DecryptPrivate", cc, ct, out_pt, || {
        Ok(get(sk, "private key")?.0.clone())
    })
}

// Arithmetic

macro_rules! binary_ops {
    ($($name:ident => $method:ident;)*) => {
        $(
            /// # Safety
            /// All handles must be live and `out` must be a valid handle slot.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                cc: *const CryptoContextHandle,
                ct1: *const CiphertextHandle,
                ct2: *const CiphertextHandle,
                out_ct: *mut *mut CiphertextHandle,
            ) -> FheResult {
                emit(stringify!($name), cc, out_ct, |cc| {
                    Ok(cc.$method(ciphertext(ct1)?, ciphertext(ct2)?)?)
                })
            }
        )*
    };
}

macro_rules! unary_ops {
    ($($name:ident => $method:ident;)*) => {
        $(
            /// # Safety
            /// All handles must be live and `out` must be a valid handle slot.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                cc: *const CryptoContextHandle,
                ct: *const CiphertextHandle,
                out_ct: *mut *mut CiphertextHandle,
            ) -> FheResult {
                emit(stringify!($name), cc, out_ct, |cc| Ok(cc.$method(ciphertext(ct)?)?))
            }
        )*
    };
}

macro_rules! plain_ops {
    ($($name:ident => $method:ident;)*) => {
        $(
            /// # Safety
            /// All handles must be live and `out` must be a valid handle slot.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                cc: *const CryptoContextHandle,
                ct: *const CiphertextHandle,
                pt: *const PlaintextHandle,
                out_ct: *mut *mut CiphertextHandle,
            ) -> FheResult {
                emit(stringify!($name), cc, out_ct, |cc| {
                    let pt = get(pt, "plaintext")?;
                    Ok(cc.$method(ciphertext(ct)?, &pt.0)?)
                })
            }
        )*
    };
}

macro_rules! const_ops {
    ($($name:ident => $method:ident;)*) => {
        $(
            /// # Safety
            /// All handles must be live and `out` must be a valid handle slot.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                cc: *const CryptoContextHandle,
                ct: *const CiphertextHandle,
                value: f64,
                out_ct: *mut *mut CiphertextHandle,
            ) -> FheResult {
                emit(stringify!($name), cc, out_ct, |cc| Ok(cc.$method(ciphertext(ct)?, value)?))
            }
        )*
    };
}

binary_ops! {
    CryptoContext_EvalAdd => eval_add;
    CryptoContext_EvalSub => eval_sub;
    CryptoContext_EvalMult => eval_mult;
}

unary_ops! {
    CryptoContext_EvalNegate => eval_negate;
    CryptoContext_EvalSquare => eval_square;
    CryptoContext_Rescale => rescale;
    CryptoContext_ModReduce => rescale;
}

plain_ops! {
    CryptoContext_EvalAddPlain => eval_add_plain;
    CryptoContext_EvalSubPlain => eval_sub_plain;
    CryptoContext_EvalMultPlain => eval_mult_plain;
}

const_ops! {
    CryptoContext_EvalAddConst => eval_add_const;
    CryptoContext_EvalMultConst => eval_mult_const;
}

// Rotation and slot reductions

/// Rotate slots left by `index`. Fails with PreconditionNotMet when no
/// rotation key for `index` was generated; index 0 needs none.
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalRotate(
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    index: i32,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_EvalRotate", cc, out_ct, |cc| {
        Ok(cc.eval_rotate(ciphertext(ct)?, index)?)
    })
}

/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalFastRotationPrecompute(
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    out_precomp: *mut *mut FastRotationPrecompHandle,
) -> FheResult {
    guard("CryptoContext_EvalFastRotationPrecompute", || {
        let cc = get(cc, "crypto context")?;
        let ct = ciphertext(ct)?;
        let slot = out(out_precomp, "precomputation")?;
        let precomp = cc.0.eval_fast_rotation_precompute(ct)?;
        *slot = wrap(FastRotationPrecompHandle(precomp));
        Ok(())
    })
}

/// `m` is the cyclotomic order of the context (twice the ring dimension)
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalFastRotation(
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    index: i32,
    m: u64,
    precomp: *const FastRotationPrecompHandle,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_EvalFastRotation", cc, out_ct, |cc| {
        let precomp = get(precomp, "precomputation")?;
        Ok(cc.eval_fast_rotation(ciphertext(ct)?, index, m, &precomp.0)?)
    })
}

/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalSum(
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    batch_size: u32,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_EvalSum", cc, out_ct, |cc| {
        Ok(cc.eval_sum(ciphertext(ct)?, batch_size)?)
    })
}

/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalInnerProduct(
    cc: *const CryptoContextHandle,
    ct1: *const CiphertextHandle,
    ct2: *const CiphertextHandle,
    batch_size: u32,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_EvalInnerProduct", cc, out_ct, |cc| {
        Ok(cc.eval_inner_product(ciphertext(ct1)?, ciphertext(ct2)?, batch_size)?)
    })
}

/// Evaluate `sum(coefficients[i] * x^i)` slot-wise
///
/// # Safety
/// All handles must be live, `coefficients` must hold `len` values and
/// `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalPoly(
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    coefficients: *const f64,
    len: usize,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_EvalPoly", cc, out_ct, |cc| {
        let coefficients = slice(coefficients, len, "coefficients")?;
        Ok(cc.eval_poly(ciphertext(ct)?, coefficients)?)
    })
}

// Bootstrapping

unsafe fn pair(ptr: *const u32, what: &str) -> FfiResult<[u32; 2]> {
    let values = slice(ptr, 2, what)?;
    Ok([values[0], values[1]])
}

/// # Safety
/// `cc` must be live; `level_budget` and `dim1` must each point at two values.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalBootstrapSetup(
    cc: *const CryptoContextHandle,
    level_budget: *const u32,
    dim1: *const u32,
    slots: u32,
    correction_factor: u32,
) -> FheResult {
    guard("CryptoContext_EvalBootstrapSetup", || {
        let cc = get(cc, "crypto context")?;
        let budget = pair(level_budget, "level budget")?;
        let dim1 = pair(dim1, "baby-step dimensions")?;
        cc.0.eval_bootstrap_setup(budget, dim1, slots, correction_factor)?;
        Ok(())
    })
}

/// Setup with default dimensions, full slots and default correction
///
/// # Safety
/// `cc` must be live; `level_budget` must point at two values.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalBootstrapSetup_Simple(
    cc: *const CryptoContextHandle,
    level_budget: *const u32,
) -> FheResult {
    guard("CryptoContext_EvalBootstrapSetup_Simple", || {
        let cc = get(cc, "crypto context")?;
        let budget = pair(level_budget, "level budget")?;
        cc.0.eval_bootstrap_setup_simple(budget)?;
        Ok(())
    })
}

/// # Safety
/// `cc` and `kp` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalBootstrapKeyGen(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
    slots: u32,
) -> FheResult {
    guard("CryptoContext_EvalBootstrapKeyGen", || {
        let cc = get(cc, "crypto context")?;
        let kp = get(kp, "key pair")?;
        cc.0.eval_bootstrap_key_gen(kp.0.private_key()?, slots)?;
        Ok(())
    })
}

/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalBootstrap(
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    num_iterations: u32,
    precision: u32,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_EvalBootstrap", cc, out_ct, |cc| {
        Ok(cc.eval_bootstrap(ciphertext(ct)?, num_iterations, precision)?)
    })
}

// Proxy re-encryption

/// Re-encryption key from `old_sk` to `new_pk`
///
/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_ReKeyGen(
    cc: *const CryptoContextHandle,
    old_sk: *const PrivateKeyHandle,
    new_pk: *const PublicKeyHandle,
    out_key: *mut *mut EvalKeyHandle,
) -> FheResult {
    guard("CryptoContext_ReKeyGen", || {
        let cc = get(cc, "crypto context")?;
        let old_sk = get(old_sk, "old private key")?;
        let new_pk = get(new_pk, "new public key")?;
        let slot = out(out_key, "evaluation key")?;
        let key = cc.0.re_key_gen(&old_sk.0, &new_pk.0)?;
        *slot = wrap(EvalKeyHandle(key));
        Ok(())
    })
}

/// # Safety
/// All handles must be live and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_ReEncrypt(
    cc: *const CryptoContextHandle,
    ct: *const CiphertextHandle,
    key: *const EvalKeyHandle,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    emit("CryptoContext_ReEncrypt", cc, out_ct, |cc| {
        let key = get(key, "re-encryption key")?;
        Ok(cc.re_encrypt(ciphertext(ct)?, &key.0)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FheResult_FreeMessage, FheStatus};
    use crate::registry::{DestroyCiphertext, DestroyCryptoContext, DestroyKeyPair};
    use fhegate_core::{KeyPair, ParameterSet, Scheme};

    struct Fixture {
        cc: *mut CryptoContextHandle,
        kp: *mut KeyPairHandle,
    }

    impl Fixture {
        fn bfv() -> Self {
            let mut params = ParameterSet::new(Scheme::Bfv);
            params.set_plaintext_modulus(65537).unwrap();
            params.set_multiplicative_depth(2).unwrap();
            let cc = CryptoContext::new(params).unwrap();
            cc.enable(0x01 | 0x02 | 0x04 | 0x08 | 0x10).unwrap();
            let kp: KeyPair = cc.key_gen().unwrap();
            Fixture {
                cc: wrap(CryptoContextHandle(cc)),
                kp: wrap(KeyPairHandle(kp)),
            }
        }

        unsafe fn encrypt(&self, values: &[i64]) -> *mut CiphertextHandle {
            let cc = &(*self.cc).0;
            let pt = wrap(PlaintextHandle(cc.make_packed_plaintext(values).unwrap()));
            let mut ct = std::ptr::null_mut();
            assert!(CryptoContext_Encrypt(self.cc, self.kp, pt, &mut ct).is_ok());
            crate::registry::DestroyPlaintext(pt);
            ct
        }

        unsafe fn decrypt(&self, ct: *const CiphertextHandle) -> Vec<i64> {
            let mut pt = std::ptr::null_mut();
            assert!(CryptoContext_Decrypt(self.cc, self.kp, ct, &mut pt).is_ok());
            let values = (*pt).0.packed_values().unwrap();
            crate::registry::DestroyPlaintext(pt);
            values
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            unsafe {
                DestroyKeyPair(self.kp);
                DestroyCryptoContext(self.cc);
            }
        }
    }

    #[test]
    fn test_add_and_negate() {
        let f = Fixture::bfv();
        unsafe {
            let a = f.encrypt(&[1, 2, 3, 4]);
            let b = f.encrypt(&[10, 20, 30, 40]);
            let mut sum = std::ptr::null_mut();
            assert!(CryptoContext_EvalAdd(f.cc, a, b, &mut sum).is_ok());
            assert_eq!(f.decrypt(sum), vec![11, 22, 33, 44]);

            let mut neg = std::ptr::null_mut();
            assert!(CryptoContext_EvalNegate(f.cc, a, &mut neg).is_ok());
            assert_eq!(f.decrypt(neg), vec![-1, -2, -3, -4]);

            for ct in [a, b, sum, neg] {
                DestroyCiphertext(ct);
            }
        }
    }

    #[test]
    fn test_mult_needs_relin_key() {
        let f = Fixture::bfv();
        unsafe {
            let a = f.encrypt(&[3, 4]);
            let sentinel = 0x40 as *mut CiphertextHandle;
            let mut product = sentinel;
            let result = CryptoContext_EvalMult(f.cc, a, a, &mut product);
            assert_eq!(result.code, FheStatus::PreconditionNotMet);
            assert_eq!(product, sentinel);
            FheResult_FreeMessage(result.message);

            assert!(crate::keys::CryptoContext_EvalMultKeyGen(f.cc, f.kp).is_ok());
            assert!(CryptoContext_EvalMult(f.cc, a, a, &mut product).is_ok());
            assert_eq!(f.decrypt(product), vec![9, 16]);
            DestroyCiphertext(product);
            DestroyCiphertext(a);
        }
    }

    #[test]
    fn test_rotate_without_keys_is_precondition() {
        let f = Fixture::bfv();
        unsafe {
            let a = f.encrypt(&[1, 2, 3]);
            let mut rotated = std::ptr::null_mut();
            let result = CryptoContext_EvalRotate(f.cc, a, 1, &mut rotated);
            assert_eq!(result.code, FheStatus::PreconditionNotMet);
            assert!(rotated.is_null());
            let message = result.message_str().unwrap();
            assert!(message.starts_with("CryptoContext_EvalRotate: "));
            FheResult_FreeMessage(result.message);

            assert!(CryptoContext_EvalRotate(f.cc, a, 0, &mut rotated).is_ok());
            DestroyCiphertext(rotated);
            DestroyCiphertext(a);
        }
    }

    #[test]
    fn test_decrypt_with_foreign_key_is_integrity_failure() {
        let f = Fixture::bfv();
        let g = unsafe { (*f.cc).0.key_gen().unwrap() };
        let other = wrap(KeyPairHandle(g));
        unsafe {
            let a = f.encrypt(&[5]);
            let mut pt = std::ptr::null_mut();
            let result = CryptoContext_Decrypt(f.cc, other, a, &mut pt);
            assert_eq!(result.code, FheStatus::IntegrityFailure);
            assert!(pt.is_null());
            FheResult_FreeMessage(result.message);
            DestroyCiphertext(a);
            DestroyKeyPair(other);
        }
    }

    #[test]
    fn test_null_operand_names_operation() {
        let f = Fixture::bfv();
        unsafe {
            let a = f.encrypt(&[1]);
            let mut sum = std::ptr::null_mut();
            let result = CryptoContext_EvalAdd(f.cc, a, std::ptr::null(), &mut sum);
            assert_eq!(result.code, FheStatus::NullArgument);
            assert_eq!(
                result.message_str().unwrap(),
                "CryptoContext_EvalAdd: null ciphertext"
            );
            FheResult_FreeMessage(result.message);
            DestroyCiphertext(a);
        }
    }

    #[test]
    fn test_pre_roundtrip() {
        let f = Fixture::bfv();
        unsafe {
            let bob = wrap(KeyPairHandle((*f.cc).0.key_gen().unwrap()));
            let a = f.encrypt(&[7, 8]);

            let mut key = std::ptr::null_mut();
            let alice_sk = wrap(PrivateKeyHandle((*f.kp).0.private_key().unwrap().clone()));
            let bob_pk = wrap(PublicKeyHandle((*bob).0.public_key().unwrap().clone()));
            assert!(CryptoContext_ReKeyGen(f.cc, alice_sk, bob_pk, &mut key).is_ok());

            let mut moved = std::ptr::null_mut();
            assert!(CryptoContext_ReEncrypt(f.cc, a, key, &mut moved).is_ok());
            let mut pt = std::ptr::null_mut();
            assert!(CryptoContext_Decrypt(f.cc, bob, moved, &mut pt).is_ok());
            assert_eq!((*pt).0.packed_values().unwrap(), vec![7, 8]);

            crate::registry::DestroyPlaintext(pt);
            DestroyCiphertext(moved);
            DestroyCiphertext(a);
            crate::registry::DestroyEvalKey(key);
            crate::registry::DestroyPrivateKey(alice_sk);
            crate::registry::DestroyPublicKey(bob_pk);
            DestroyKeyPair(bob);
        }
    }
}
