// Ciphertext metadata accessors

use crate::error::{guard, FheResult};
use crate::registry::{get, out, wrap, CiphertextHandle};

macro_rules! metadata {
    ($($name:ident -> $ty:ty = |$ct:ident| $body:expr;)*) => {
        $(
            /// # Safety
            /// `ct` must be a live ciphertext handle and `out` valid.
            #[no_mangle]
            pub unsafe extern "C" fn $name(
                ct: *const CiphertextHandle,
                out_value: *mut $ty,
            ) -> FheResult {
                guard(stringify!($name), || {
                    let $ct = &get(ct, "ciphertext")?.0;
                    *out(out_value, "value")? = $body;
                    Ok(())
                })
            }
        )*
    };
}

metadata! {
    Ciphertext_GetLevel -> u32 = |ct| ct.level();
    Ciphertext_GetNoiseScaleDegree -> u32 = |ct| ct.noise_scale_degree();
    Ciphertext_GetSlots -> usize = |ct| ct.slot_count();
    Ciphertext_GetEncoding -> u32 = |ct| ct.encoding() as u32;
}

/// New handle sharing the same ciphertext
///
/// # Safety
/// `ct` must be a live handle and `out` a valid handle slot.
#[no_mangle]
pub unsafe extern "C" fn Ciphertext_Clone(
    ct: *const CiphertextHandle,
    out_ct: *mut *mut CiphertextHandle,
) -> FheResult {
    guard("Ciphertext_Clone", || {
        let ct = get(ct, "ciphertext")?;
        let slot = out(out_ct, "ciphertext")?;
        *slot = wrap(CiphertextHandle(ct.0.clone()));
        Ok(())
    })
}
