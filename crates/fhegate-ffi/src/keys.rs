//! Key pairs, key extraction and key generation
//!
//! Extraction copies the engine reference and leaves the pair intact.
//! `KeyPair_Take*` moves a key handle into the pair and always consumes
//! it, unless the pair itself is null.

use std::ffi::c_char;

use fhegate_core::{EngineError, KeyTag};

use crate::error::{guard, FfiResult, FheResult};
use crate::registry::{
    get, get_mut, out, slice, string_out, take, wrap, CryptoContextHandle, KeyPairHandle,
    PrivateKeyHandle, PublicKeyHandle,
};

/// # Safety
/// `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn NewKeyPair(out_kp: *mut *mut KeyPairHandle) -> FheResult {
    guard("NewKeyPair", || {
        let slot = out(out_kp, "key pair")?;
        *slot = wrap(KeyPairHandle(fhegate_core::KeyPair::empty()));
        Ok(())
    })
}

/// False for a null pair
///
/// # Safety
/// `kp` must be null or a live key-pair handle.
#[no_mangle]
pub unsafe extern "C" fn KeyPair_HasPublicKey(kp: *const KeyPairHandle) -> bool {
    kp.as_ref().is_some_and(|kp| kp.0.public.is_some())
}

/// False for a null pair
///
/// # Safety
/// `kp` must be null or a live key-pair handle.
#[no_mangle]
pub unsafe extern "C" fn KeyPair_HasPrivateKey(kp: *const KeyPairHandle) -> bool {
    kp.as_ref().is_some_and(|kp| kp.0.secret.is_some())
}

/// New handle sharing the pair's public key
///
/// # Safety
/// `kp` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn KeyPair_CopyPublicKey(
    kp: *const KeyPairHandle,
    out_pk: *mut *mut PublicKeyHandle,
) -> FheResult {
    copy_public("KeyPair_CopyPublicKey", kp, out_pk)
}

/// Alias of [`KeyPair_CopyPublicKey`]
///
/// # Safety
/// See [`KeyPair_CopyPublicKey`].
#[no_mangle]
pub unsafe extern "C" fn KeyPair_GetPublicKey(
    kp: *const KeyPairHandle,
    out_pk: *mut *mut PublicKeyHandle,
) -> FheResult {
    copy_public("KeyPair_GetPublicKey", kp, out_pk)
}

unsafe fn copy_public(
    op: &'static str,
    kp: *const KeyPairHandle,
    slot: *mut *mut PublicKeyHandle,
) -> FheResult {
    guard(op, || {
        let kp = get(kp, "key pair")?;
        let slot = out(slot, "public key")?;
        let pk = kp.0.public_key()?.clone();
        *slot = wrap(PublicKeyHandle(pk));
        Ok(())
    })
}

/// New handle sharing the pair's private key
///
/// # Safety
/// `kp` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn KeyPair_CopyPrivateKey(
    kp: *const KeyPairHandle,
    out_sk: *mut *mut PrivateKeyHandle,
) -> FheResult {
    copy_private("KeyPair_CopyPrivateKey", kp, out_sk)
}

/// Alias of [`KeyPair_CopyPrivateKey`]
///
/// # Safety
/// See [`KeyPair_CopyPrivateKey`].
#[no_mangle]
pub unsafe extern "C" fn KeyPair_GetPrivateKey(
    kp: *const KeyPairHandle,
    out_sk: *mut *mut PrivateKeyHandle,
) -> FheResult {
    copy_private("KeyPair_GetPrivateKey", kp, out_sk)
}

unsafe fn copy_private(
    op: &'static str,
    kp: *const KeyPairHandle,
    slot: *mut *mut PrivateKeyHandle,
) -> FheResult {
    guard(op, || {
        let kp = get(kp, "key pair")?;
        let slot = out(slot, "private key")?;
        let sk = kp.0.private_key()?.clone();
        *slot = wrap(PrivateKeyHandle(sk));
        Ok(())
    })
}

fn check_halves(public: KeyTag, secret: KeyTag) -> FfiResult<()> {
    if public == secret {
        Ok(())
    } else {
        Err(EngineError::KeyMismatch(format!(
            "public key {public} does not belong to private key {secret}"
        ))
        .into())
    }
}

unsafe fn take_public(
    op: &'static str,
    kp: *mut KeyPairHandle,
    pk: *mut PublicKeyHandle,
) -> FheResult {
    guard(op, || {
        let kp = get_mut(kp, "key pair")?;
        let pk = take(pk, "public key")?.0;
        if let Some(secret) = &kp.0.secret {
            check_halves(pk.tag(), secret.tag())?;
        }
        kp.0.public = Some(pk);
        Ok(())
    })
}

unsafe fn take_private(
    op: &'static str,
    kp: *mut KeyPairHandle,
    sk: *mut PrivateKeyHandle,
) -> FheResult {
    guard(op, || {
        let kp = get_mut(kp, "key pair")?;
        let sk = take(sk, "private key")?.0;
        if let Some(public) = &kp.0.public {
            check_halves(public.tag(), sk.tag())?;
        }
        kp.0.secret = Some(sk);
        Ok(())
    })
}

/// Move `pk` into the pair; `pk` is invalid after the call
///
/// # Safety
/// `kp` must be a live handle; `pk` null or a live handle not used again.
#[no_mangle]
pub unsafe extern "C" fn KeyPair_TakePublicKey(
    kp: *mut KeyPairHandle,
    pk: *mut PublicKeyHandle,
) -> FheResult {
    take_public("KeyPair_TakePublicKey", kp, pk)
}

/// Alias of [`KeyPair_TakePublicKey`]
///
/// # Safety
/// See [`KeyPair_TakePublicKey`].
#[no_mangle]
pub unsafe extern "C" fn KeyPair_SetPublicKey(
    kp: *mut KeyPairHandle,
    pk: *mut PublicKeyHandle,
) -> FheResult {
    take_public("KeyPair_SetPublicKey", kp, pk)
}

/// Move `sk` into the pair; `sk` is invalid after the call
///
/// # Safety
/// `kp` must be a live handle; `sk` null or a live handle not used again.
#[no_mangle]
pub unsafe extern "C" fn KeyPair_TakePrivateKey(
    kp: *mut KeyPairHandle,
    sk: *mut PrivateKeyHandle,
) -> FheResult {
    take_private("KeyPair_TakePrivateKey", kp, sk)
}

/// Alias of [`KeyPair_TakePrivateKey`]
///
/// # Safety
/// See [`KeyPair_TakePrivateKey`].
#[no_mangle]
pub unsafe extern "C" fn KeyPair_SetPrivateKey(
    kp: *mut KeyPairHandle,
    sk: *mut PrivateKeyHandle,
) -> FheResult {
    take_private("KeyPair_SetPrivateKey", kp, sk)
}

/// Hex key tag; this is the keyId accepted by EvalMultKey serialization
///
/// # Safety
/// `pk` must be a live handle and `out` a valid string slot.
#[no_mangle]
pub unsafe extern "C" fn PublicKey_GetKeyTag(
    pk: *const PublicKeyHandle,
    out_tag: *mut *mut c_char,
) -> FheResult {
    guard("PublicKey_GetKeyTag", || {
        let pk = get(pk, "public key")?;
        let slot = out(out_tag, "string")?;
        *slot = string_out(pk.0.tag().to_string())?;
        Ok(())
    })
}

/// # Safety
/// `sk` must be a live handle and `out` a valid string slot.
#[no_mangle]
pub unsafe extern "C" fn PrivateKey_GetKeyTag(
    sk: *const PrivateKeyHandle,
    out_tag: *mut *mut c_char,
) -> FheResult {
    guard("PrivateKey_GetKeyTag", || {
        let sk = get(sk, "private key")?;
        let slot = out(out_tag, "string")?;
        *slot = string_out(sk.0.tag().to_string())?;
        Ok(())
    })
}

/// # Safety
/// `cc` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_KeyGen(
    cc: *const CryptoContextHandle,
    out_kp: *mut *mut KeyPairHandle,
) -> FheResult {
    guard("CryptoContext_KeyGen", || {
        let cc = get(cc, "crypto context")?;
        let slot = out(out_kp, "key pair")?;
        let kp = cc.0.key_gen()?;
        *slot = wrap(KeyPairHandle(kp));
        Ok(())
    })
}

/// Relinearization key for the pair's private key, stored in the context
///
/// # Safety
/// `cc` and `kp` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalMultKeyGen(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
) -> FheResult {
    guard("CryptoContext_EvalMultKeyGen", || {
        let cc = get(cc, "crypto context")?;
        let kp = get(kp, "key pair")?;
        cc.0.eval_mult_key_gen(kp.0.private_key()?)?;
        Ok(())
    })
}

/// # Safety
/// `cc` and `kp` must be live handles; `indices` must hold `len` values.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalRotateKeyGen(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
    indices: *const i32,
    len: usize,
) -> FheResult {
    guard("CryptoContext_EvalRotateKeyGen", || {
        let cc = get(cc, "crypto context")?;
        let kp = get(kp, "key pair")?;
        let indices = slice(indices, len, "rotation indices")?;
        cc.0.eval_rotate_key_gen(kp.0.private_key()?, indices)?;
        Ok(())
    })
}

/// # Safety
/// `cc` and `kp` must be live handles.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_EvalSumKeyGen(
    cc: *const CryptoContextHandle,
    kp: *const KeyPairHandle,
) -> FheResult {
    guard("CryptoContext_EvalSumKeyGen", || {
        let cc = get(cc, "crypto context")?;
        let kp = get(kp, "key pair")?;
        cc.0.eval_sum_key_gen(kp.0.private_key()?)?;
        Ok(())
    })
}
