//! Plaintext encoders and typed accessors
//!
//! An accessor for the wrong encoding is an InvalidArgument error, never a
//! zero-filled answer.

use fhegate_core::Plaintext;
use num_complex::Complex64;

use crate::error::{guard, FheResult};
use crate::registry::{get, get_mut, out, slice, wrap, CryptoContextHandle, PlaintextHandle};

/// Pack integers (BFV/BGV, or integer-valued CKKS slots)
///
/// # Safety
/// `cc` must be a live handle, `values` must hold `len` values and `out`
/// must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_MakePackedPlaintext(
    cc: *const CryptoContextHandle,
    values: *const i64,
    len: usize,
    out_pt: *mut *mut PlaintextHandle,
) -> FheResult {
    guard("CryptoContext_MakePackedPlaintext", || {
        let cc = get(cc, "crypto context")?;
        let values = slice(values, len, "values")?;
        let slot = out(out_pt, "plaintext")?;
        let pt = cc.0.make_packed_plaintext(values)?;
        *slot = wrap(PlaintextHandle(pt));
        Ok(())
    })
}

/// # Safety
/// `cc` must be a live handle, `values` must hold `len` values and `out`
/// must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_MakeCKKSPackedPlaintext(
    cc: *const CryptoContextHandle,
    values: *const f64,
    len: usize,
    out_pt: *mut *mut PlaintextHandle,
) -> FheResult {
    guard("CryptoContext_MakeCKKSPackedPlaintext", || {
        let cc = get(cc, "crypto context")?;
        let values = slice(values, len, "values")?;
        let slot = out(out_pt, "plaintext")?;
        let pt = cc.0.make_ckks_packed_plaintext(values)?;
        *slot = wrap(PlaintextHandle(pt));
        Ok(())
    })
}

/// Complex slots given as two parallel arrays of real and imaginary parts
///
/// # Safety
/// `cc` must be a live handle, `re` and `im` must each hold `len` values
/// and `out` must be a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn CryptoContext_MakeCKKSComplexPackedPlaintext(
    cc: *const CryptoContextHandle,
    re: *const f64,
    im: *const f64,
    len: usize,
    out_pt: *mut *mut PlaintextHandle,
) -> FheResult {
    guard("CryptoContext_MakeCKKSComplexPackedPlaintext", || {
        let cc = get(cc, "crypto context")?;
        let re = slice(re, len, "real parts")?;
        let im = slice(im, len, "imaginary parts")?;
        let slot = out(out_pt, "plaintext")?;
        let values: Vec<Complex64> = re
            .iter()
            .zip(im)
            .map(|(&re, &im)| Complex64::new(re, im))
            .collect();
        let pt = cc.0.make_ckks_complex_packed_plaintext(&values)?;
        *slot = wrap(PlaintextHandle(pt));
        Ok(())
    })
}

unsafe fn read<T>(
    op: &'static str,
    pt: *const PlaintextHandle,
    slot: *mut T,
    f: impl FnOnce(&Plaintext) -> fhegate_core::EngineResult<T>,
) -> FheResult {
    guard(op, || {
        let pt = get(pt, "plaintext")?;
        let slot = out(slot, "value")?;
        *slot = f(&pt.0)?;
        Ok(())
    })
}

/// # Safety
/// `pt` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_GetPackedValueLength(
    pt: *const PlaintextHandle,
    out_len: *mut usize,
) -> FheResult {
    read("Plaintext_GetPackedValueLength", pt, out_len, |pt| {
        pt.packed_values().map(|v| v.len())
    })
}

/// # Safety
/// `pt` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_GetPackedValueAt(
    pt: *const PlaintextHandle,
    index: usize,
    out_value: *mut i64,
) -> FheResult {
    read("Plaintext_GetPackedValueAt", pt, out_value, |pt| {
        pt.packed_value_at(index)
    })
}

/// # Safety
/// `pt` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_GetRealPackedValueLength(
    pt: *const PlaintextHandle,
    out_len: *mut usize,
) -> FheResult {
    read("Plaintext_GetRealPackedValueLength", pt, out_len, |pt| {
        pt.real_packed_values().map(|v| v.len())
    })
}

/// # Safety
/// `pt` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_GetRealPackedValueAt(
    pt: *const PlaintextHandle,
    index: usize,
    out_value: *mut f64,
) -> FheResult {
    read("Plaintext_GetRealPackedValueAt", pt, out_value, |pt| {
        pt.real_packed_value_at(index)
    })
}

/// # Safety
/// `pt` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_GetComplexPackedValueLength(
    pt: *const PlaintextHandle,
    out_len: *mut usize,
) -> FheResult {
    read("Plaintext_GetComplexPackedValueLength", pt, out_len, |pt| {
        pt.complex_packed_values().map(|v| v.len())
    })
}

/// # Safety
/// `pt` must be a live handle; `out_re` and `out_im` must be valid.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_GetComplexPackedValueAt(
    pt: *const PlaintextHandle,
    index: usize,
    out_re: *mut f64,
    out_im: *mut f64,
) -> FheResult {
    guard("Plaintext_GetComplexPackedValueAt", || {
        let pt = get(pt, "plaintext")?;
        let re = out(out_re, "real part")?;
        let im = out(out_im, "imaginary part")?;
        let value = pt.0.complex_packed_value_at(index)?;
        *re = value.re;
        *im = value.im;
        Ok(())
    })
}

/// Change the visible length; other handles sharing the payload keep theirs
///
/// # Safety
/// `pt` must be a live handle.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_SetLength(pt: *mut PlaintextHandle, len: usize) -> FheResult {
    guard("Plaintext_SetLength", || {
        let pt = get_mut(pt, "plaintext")?;
        pt.0.set_length(len)?;
        Ok(())
    })
}

/// Encoding code: packed integer = 0, packed real = 1, packed complex = 2
///
/// # Safety
/// `pt` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_GetEncoding(
    pt: *const PlaintextHandle,
    out_encoding: *mut u32,
) -> FheResult {
    read("Plaintext_GetEncoding", pt, out_encoding, |pt| Ok(pt.encoding() as u32))
}

/// # Safety
/// `pt` must be a live handle and `out` valid.
#[no_mangle]
pub unsafe extern "C" fn Plaintext_GetScheme(
    pt: *const PlaintextHandle,
    out_scheme: *mut u32,
) -> FheResult {
    read("Plaintext_GetScheme", pt, out_scheme, |pt| Ok(pt.scheme() as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FheResult_FreeMessage, FheStatus};
    use crate::registry::{DestroyCryptoContext, DestroyPlaintext};
    use fhegate_core::{CryptoContext, ParameterSet, Scheme};

    fn context(scheme: Scheme) -> *mut CryptoContextHandle {
        let mut params = ParameterSet::new(scheme);
        params.set_batch_size(8).unwrap();
        wrap(CryptoContextHandle(CryptoContext::new(params).unwrap()))
    }

    #[test]
    fn test_packed_accessors() {
        unsafe {
            let cc = context(Scheme::Bfv);
            let values = [1i64, -2, 3];
            let mut pt = std::ptr::null_mut();
            assert!(CryptoContext_MakePackedPlaintext(cc, values.as_ptr(), 3, &mut pt).is_ok());

            let mut len = 0;
            assert!(Plaintext_GetPackedValueLength(pt, &mut len).is_ok());
            assert_eq!(len, 3);
            let mut v = 0;
            assert!(Plaintext_GetPackedValueAt(pt, 1, &mut v).is_ok());
            assert_eq!(v, -2);

            let result = Plaintext_GetPackedValueAt(pt, 3, &mut v);
            assert_eq!(result.code, FheStatus::InvalidArgument);
            assert_eq!(v, -2);
            FheResult_FreeMessage(result.message);

            let mut real = 0.0;
            let result = Plaintext_GetRealPackedValueAt(pt, 0, &mut real);
            assert_eq!(result.code, FheStatus::InvalidArgument);
            FheResult_FreeMessage(result.message);

            assert!(Plaintext_SetLength(pt, 2).is_ok());
            assert!(Plaintext_GetPackedValueLength(pt, &mut len).is_ok());
            assert_eq!(len, 2);

            DestroyPlaintext(pt);
            DestroyCryptoContext(cc);
        }
    }

    #[test]
    fn test_complex_plaintext() {
        unsafe {
            let cc = context(Scheme::Ckks);
            let re = [1.0, 2.0];
            let im = [0.5, -0.5];
            let mut pt = std::ptr::null_mut();
            let result = CryptoContext_MakeCKKSComplexPackedPlaintext(
                cc,
                re.as_ptr(),
                im.as_ptr(),
                2,
                &mut pt,
            );
            assert!(result.is_ok());

            let (mut a, mut b) = (0.0, 0.0);
            assert!(Plaintext_GetComplexPackedValueAt(pt, 1, &mut a, &mut b).is_ok());
            assert_eq!((a, b), (2.0, -0.5));
            let mut encoding = 9;
            assert!(Plaintext_GetEncoding(pt, &mut encoding).is_ok());
            assert_eq!(encoding, 2);
            let mut scheme = 9;
            assert!(Plaintext_GetScheme(pt, &mut scheme).is_ok());
            assert_eq!(scheme, 2);

            DestroyPlaintext(pt);
            DestroyCryptoContext(cc);
        }
    }

    #[test]
    fn test_ckks_encoder_on_bfv_rejected() {
        unsafe {
            let cc = context(Scheme::Bfv);
            let values = [1.5];
            let sentinel = 0x30 as *mut PlaintextHandle;
            let mut pt = sentinel;
            let result = CryptoContext_MakeCKKSPackedPlaintext(cc, values.as_ptr(), 1, &mut pt);
            assert_eq!(result.code, FheStatus::InvalidArgument);
            assert_eq!(pt, sentinel);
            FheResult_FreeMessage(result.message);
            DestroyCryptoContext(cc);
        }
    }

    #[test]
    fn test_null_values_with_length() {
        unsafe {
            let cc = context(Scheme::Bfv);
            let mut pt = std::ptr::null_mut();
            let result = CryptoContext_MakePackedPlaintext(cc, std::ptr::null(), 4, &mut pt);
            assert_eq!(result.code, FheStatus::NullArgument);
            FheResult_FreeMessage(result.message);
            DestroyCryptoContext(cc);
        }
    }
}
