//! Slot rotation, fast rotation and slot summation

use tracing::trace;

use crate::ciphertext::Ciphertext;
use crate::context::{normalize_rotation, power_of_two_steps, CryptoContext};
use crate::error::{EngineError, EngineResult};
use crate::params::Feature;
use crate::plaintext::SlotValues;

/// Hoisted decomposition of a ciphertext, reusable across rotation indices
#[derive(Debug, Clone)]
pub struct FastRotationPrecomp {
    source: Ciphertext,
}

impl FastRotationPrecomp {
    pub fn source(&self) -> &Ciphertext {
        &self.source
    }
}

fn rotate_left(slots: &SlotValues, shift: usize) -> SlotValues {
    match slots {
        SlotValues::Integer(v) => {
            let mut out = v.clone();
            out.rotate_left(shift);
            SlotValues::Integer(out)
        }
        SlotValues::Complex(v) => {
            let mut out = v.clone();
            out.rotate_left(shift);
            SlotValues::Complex(out)
        }
    }
}

impl CryptoContext {
    fn require_rotation_key(&self, ct: &Ciphertext, index: i32, op: &str) -> EngineResult<()> {
        if normalize_rotation(index, self.slots()) == 0 {
            return Ok(());
        }
        if self.has_rotation_key(ct.key_tag(), index) {
            Ok(())
        } else {
            Err(EngineError::Precondition(format!(
                "{op}: no rotation key for index {index} under key {}; call EvalRotateKeyGen first",
                ct.key_tag()
            )))
        }
    }

    fn rotated(&self, ct: &Ciphertext, index: i32) -> Ciphertext {
        let shift = normalize_rotation(index, self.slots());
        if shift == 0 {
            return Ciphertext::new(ct.data().clone());
        }
        Ciphertext::new(ct.with_slots(rotate_left(&ct.data().slots, shift)))
    }

    /// Cyclic left rotation by `index` slots
    pub fn eval_rotate(&self, ct: &Ciphertext, index: i32) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalRotate")?;
        self.check_operand(ct)?;
        self.require_rotation_key(ct, index, "EvalRotate")?;
        trace!(index, "EvalRotate");
        Ok(self.rotated(ct, index))
    }

    pub fn eval_fast_rotation_precompute(
        &self,
        ct: &Ciphertext,
    ) -> EngineResult<FastRotationPrecomp> {
        self.require(Feature::LeveledShe, "EvalFastRotationPrecompute")?;
        self.check_operand(ct)?;
        Ok(FastRotationPrecomp { source: ct.clone() })
    }

    /// Rotation through a precomputation; `m` is the cyclotomic order
    pub fn eval_fast_rotation(
        &self,
        ct: &Ciphertext,
        index: i32,
        m: u64,
        precomp: &FastRotationPrecomp,
    ) -> EngineResult<Ciphertext> {
        self.require(Feature::LeveledShe, "EvalFastRotation")?;
        self.check_operand(ct)?;
        if m != self.cyclotomic_order() {
            return Err(EngineError::InvalidParameter(format!(
                "cyclotomic order {m} does not match the context ({})",
                self.cyclotomic_order()
            )));
        }
        if !precomp.source.ptr_eq(ct) && precomp.source.data() != ct.data() {
            return Err(EngineError::InvalidParameter(
                "fast rotation precomputation was made for a different ciphertext".into(),
            ));
        }
        self.require_rotation_key(ct, index, "EvalFastRotation")?;
        Ok(self.rotated(ct, index))
    }

    /// Sum of `batch_size` consecutive slots (cyclically) into every slot
    pub fn eval_sum(&self, ct: &Ciphertext, batch_size: u32) -> EngineResult<Ciphertext> {
        self.require(Feature::AdvancedShe, "EvalSum")?;
        self.check_operand(ct)?;
        self.sum_slots(ct, batch_size, "EvalSum")
    }

    fn sum_slots(&self, ct: &Ciphertext, batch_size: u32, op: &str) -> EngineResult<Ciphertext> {
        let batch = batch_size as usize;
        if batch == 0 || !batch.is_power_of_two() || batch > self.slots() {
            return Err(EngineError::InvalidParameter(format!(
                "{op}: batch size {batch_size} must be a power of two no larger than {}",
                self.slots()
            )));
        }
        for step in power_of_two_steps(batch) {
            if !self.has_rotation_key(ct.key_tag(), step) {
                return Err(EngineError::Precondition(format!(
                    "{op}: summation keys missing under key {}; call EvalSumKeyGen first",
                    ct.key_tag()
                )));
            }
        }
        let n = self.slots();
        let summed = match &ct.data().slots {
            SlotValues::Integer(v) => {
                let t = self.plaintext_modulus();
                SlotValues::Integer(
                    (0..n)
                        .map(|i| {
                            let s: i128 = (0..batch).map(|j| i128::from(v[(i + j) % n])).sum();
                            crate::context::centered_mod(s, t)
                        })
                        .collect(),
                )
            }
            SlotValues::Complex(v) => SlotValues::Complex(
                (0..n)
                    .map(|i| (0..batch).map(|j| v[(i + j) % n]).sum())
                    .collect(),
            ),
        };
        Ok(Ciphertext::new(ct.with_slots(summed)))
    }

    /// Slot-wise product summed over `batch_size` slots
    pub fn eval_inner_product(
        &self,
        a: &Ciphertext,
        b: &Ciphertext,
        batch_size: u32,
    ) -> EngineResult<Ciphertext> {
        self.require(Feature::AdvancedShe, "EvalInnerProduct")?;
        let product = self.eval_mult(a, b)?;
        self.sum_slots(&product, batch_size, "EvalInnerProduct")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::params::{ParameterSet, Scheme, SecurityLevel};

    fn bfv() -> (CryptoContext, KeyPair) {
        let mut params = ParameterSet::new(Scheme::Bfv);
        params.set_security_level(SecurityLevel::NotSet);
        params.set_batch_size(8).unwrap();
        params.set_ring_dim(16).unwrap();
        let cc = CryptoContext::new(params).unwrap();
        cc.enable(0x01 | 0x02 | 0x08 | 0x10).unwrap();
        let kp = cc.key_gen().unwrap();
        (cc, kp)
    }

    fn values(cc: &CryptoContext, kp: &KeyPair, ct: &Ciphertext) -> Vec<i64> {
        let out = cc.decrypt(kp.private_key().unwrap(), ct).unwrap();
        let mut pt = out.plaintext;
        pt.set_length(cc.slots()).unwrap();
        pt.packed_values().unwrap()
    }

    #[test]
    fn test_rotate_requires_key() {
        let (cc, kp) = bfv();
        let ct = cc
            .encrypt(&kp, &cc.make_packed_plaintext(&[1, 2, 3, 4]).unwrap())
            .unwrap();
        assert!(matches!(
            cc.eval_rotate(&ct, 1),
            Err(EngineError::Precondition(_))
        ));
        assert!(cc.eval_rotate(&ct, 0).is_ok());
    }

    #[test]
    fn test_rotation_matches_fast_rotation() {
        let (cc, kp) = bfv();
        let sk = kp.private_key().unwrap();
        cc.eval_rotate_key_gen(sk, &[2, -1]).unwrap();
        let ct = cc
            .encrypt(&kp, &cc.make_packed_plaintext(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap())
            .unwrap();
        let plain = cc.eval_rotate(&ct, 2).unwrap();
        let precomp = cc.eval_fast_rotation_precompute(&ct).unwrap();
        let fast = cc
            .eval_fast_rotation(&ct, 2, cc.cyclotomic_order(), &precomp)
            .unwrap();
        assert_eq!(values(&cc, &kp, &plain), values(&cc, &kp, &fast));
        assert_eq!(&values(&cc, &kp, &plain)[..3], &[3, 4, 5]);

        let right = cc.eval_rotate(&ct, -1).unwrap();
        assert_eq!(values(&cc, &kp, &right)[0], 8);
        assert!(cc.eval_fast_rotation(&ct, 2, 7, &precomp).is_err());
    }

    #[test]
    fn test_eval_sum() {
        let (cc, kp) = bfv();
        let sk = kp.private_key().unwrap();
        let ct = cc
            .encrypt(&kp, &cc.make_packed_plaintext(&[1, 2, 3, 4]).unwrap())
            .unwrap();
        assert!(matches!(cc.eval_sum(&ct, 4), Err(EngineError::Precondition(_))));
        cc.eval_sum_key_gen(sk).unwrap();
        let sum = cc.eval_sum(&ct, 4).unwrap();
        assert_eq!(values(&cc, &kp, &sum)[0], 10);
        assert!(cc.eval_sum(&ct, 3).is_err());
    }

    #[test]
    fn test_inner_product() {
        let (cc, kp) = bfv();
        let sk = kp.private_key().unwrap();
        cc.eval_mult_key_gen(sk).unwrap();
        cc.eval_sum_key_gen(sk).unwrap();
        let a = cc
            .encrypt(&kp, &cc.make_packed_plaintext(&[1, 2, 3, 4]).unwrap())
            .unwrap();
        let b = cc
            .encrypt(&kp, &cc.make_packed_plaintext(&[5, 6, 7, 8]).unwrap())
            .unwrap();
        let ip = cc.eval_inner_product(&a, &b, 4).unwrap();
        assert_eq!(values(&cc, &kp, &ip)[0], 70);
    }
}
