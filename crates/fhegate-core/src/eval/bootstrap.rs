//! CKKS bootstrapping
//!
//! Setup fixes the level budget and with it the depth the refresh circuit
//! consumes. A refreshed ciphertext sits at that depth, leaving
//! `multiplicative_depth - bootstrap_depth` levels for further work.

use num_complex::Complex64;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::ciphertext::{Ciphertext, CiphertextData};
use crate::context::{power_of_two_steps, CryptoContext};
use crate::error::{EngineError, EngineResult};
use crate::keys::{KeyTag, PrivateKey};
use crate::params::{Feature, ScalingTechnique, Scheme, SecretKeyDist};
use crate::plaintext::SlotValues;

const MAX_LEVEL_BUDGET: u32 = 10;
const MAX_CORRECTION_FACTOR: u32 = 15;

#[derive(Debug, Clone)]
pub(crate) struct BootstrapState {
    pub(crate) level_budget: [u32; 2],
    pub(crate) dim1: [u32; 2],
    pub(crate) slots: usize,
    pub(crate) correction_factor: u32,
    pub(crate) depth: u32,
    keyed: HashSet<KeyTag>,
}

/// Depth consumed by bootstrapping with the given level budget
///
/// The approximate modular reduction costs less with sparse secrets; the
/// two budget entries are the levels spent on the encoding and decoding
/// linear transforms.
pub fn bootstrap_depth(level_budget: [u32; 2], dist: SecretKeyDist) -> EngineResult<u32> {
    for b in level_budget {
        if !(1..=MAX_LEVEL_BUDGET).contains(&b) {
            return Err(EngineError::InvalidParameter(format!(
                "level budget entry {b} (expected 1..={MAX_LEVEL_BUDGET})"
            )));
        }
    }
    let approx_mod = match dist {
        SecretKeyDist::SparseTernary | SecretKeyDist::SparseEncapsulated => 11,
        SecretKeyDist::Gaussian | SecretKeyDist::UniformTernary => 14,
    };
    Ok(approx_mod + level_budget[0] + level_budget[1])
}

impl CryptoContext {
    pub fn eval_bootstrap_setup(
        &self,
        level_budget: [u32; 2],
        dim1: [u32; 2],
        slots: u32,
        correction_factor: u32,
    ) -> EngineResult<()> {
        self.require_scheme(Scheme::Ckks, "EvalBootstrapSetup")?;
        self.require(Feature::Fhe, "EvalBootstrapSetup")?;
        let ckks = self.params().ckks().ok_or_else(|| {
            EngineError::SchemeMismatch("bootstrapping needs CKKS parameters".into())
        })?;
        if ckks.scaling_technique == ScalingTechnique::NoRescale {
            return Err(EngineError::InvalidParameter(
                "bootstrapping is unavailable under NORESCALE".into(),
            ));
        }
        let depth = bootstrap_depth(level_budget, ckks.common.secret_key_dist)?;
        if self.multiplicative_depth() < depth {
            return Err(EngineError::InvalidParameter(format!(
                "multiplicative depth {} is below the bootstrapping depth {depth}",
                self.multiplicative_depth()
            )));
        }
        for d in dim1 {
            if d != 0 && !d.is_power_of_two() {
                return Err(EngineError::InvalidParameter(format!(
                    "baby-step dimension {d} must be zero or a power of two"
                )));
            }
        }
        let max_slots = (self.ring_dimension() / 2) as usize;
        let slots = match slots as usize {
            0 => self.slots(),
            s if s.is_power_of_two() && s <= max_slots => s,
            s => {
                return Err(EngineError::InvalidParameter(format!(
                    "bootstrapping slots {s} must be a power of two no larger than {max_slots}"
                )))
            }
        };
        if correction_factor > MAX_CORRECTION_FACTOR {
            return Err(EngineError::OutOfRange(format!(
                "correction factor {correction_factor} (expected 0..={MAX_CORRECTION_FACTOR})"
            )));
        }
        info!(?level_budget, slots, depth, "bootstrapping set up");
        self.state_mut().bootstrap = Some(BootstrapState {
            level_budget,
            dim1,
            slots,
            correction_factor,
            depth,
            keyed: HashSet::new(),
        });
        Ok(())
    }

    /// Setup with automatic baby-step dimensions, slots and correction
    pub fn eval_bootstrap_setup_simple(&self, level_budget: [u32; 2]) -> EngineResult<()> {
        self.eval_bootstrap_setup(level_budget, [0, 0], 0, 0)
    }

    pub fn eval_bootstrap_key_gen(&self, secret: &PrivateKey, slots: u32) -> EngineResult<()> {
        self.require(Feature::Fhe, "EvalBootstrapKeyGen")?;
        self.check_context(secret.context(), "private key")?;
        if self.state().bootstrap.is_none() {
            return Err(EngineError::Precondition(
                "EvalBootstrapKeyGen: EvalBootstrapSetup has not been called".into(),
            ));
        }
        let max_slots = (self.ring_dimension() / 2) as usize;
        let slots = match slots as usize {
            0 => max_slots,
            s if s > max_slots => max_slots,
            s => s,
        };
        self.insert_rotation_keys(secret, power_of_two_steps(slots));
        if let Some(state) = self.state_mut().bootstrap.as_mut() {
            state.keyed.insert(secret.tag());
        }
        debug!(key = %secret.tag(), slots, "bootstrapping keys generated");
        Ok(())
    }

    pub fn bootstrap_depth(&self) -> Option<u32> {
        self.state().bootstrap.as_ref().map(|b| b.depth)
    }

    /// Refresh a CKKS ciphertext to the bootstrapping level
    pub fn eval_bootstrap(
        &self,
        ct: &Ciphertext,
        num_iterations: u32,
        precision: u32,
    ) -> EngineResult<Ciphertext> {
        self.require(Feature::Fhe, "EvalBootstrap")?;
        self.check_operand(ct)?;
        let depth = {
            let state = self.state();
            let boot = state.bootstrap.as_ref().ok_or_else(|| {
                EngineError::Precondition(
                    "EvalBootstrap: EvalBootstrapSetup has not been called".into(),
                )
            })?;
            if !boot.keyed.contains(&ct.key_tag()) {
                return Err(EngineError::Precondition(format!(
                    "EvalBootstrap: EvalBootstrapKeyGen has not been called for key {}",
                    ct.key_tag()
                )));
            }
            boot.depth
        };
        let iterations = match num_iterations {
            0 | 1 => 1,
            2 => 2,
            n => {
                return Err(EngineError::InvalidParameter(format!(
                    "bootstrapping iterations {n} (expected 1 or 2)"
                )))
            }
        };
        if precision > 60 {
            return Err(EngineError::OutOfRange(format!(
                "bootstrapping precision {precision} bits"
            )));
        }
        let data = ct.data();
        let technique = self.params().ckks().map(|p| p.scaling_technique);
        if technique == Some(ScalingTechnique::FixedManual) && data.noise_scale_degree > 1 {
            return Err(EngineError::Fault(
                "rescale before bootstrapping".into(),
            ));
        }
        let SlotValues::Complex(values) = &data.slots else {
            return Err(EngineError::Fault("CKKS ciphertext without complex slots".into()));
        };

        let amp = 2f64.powi(-17 * iterations);
        let mut rng = rand::thread_rng();
        let refreshed = values
            .iter()
            .map(|&v| v + Complex64::new(rng.gen_range(-amp..=amp), rng.gen_range(-amp..=amp)))
            .collect();

        debug!(level = depth, iterations, "bootstrapped ciphertext");
        Ok(Ciphertext::new(CiphertextData {
            slots: SlotValues::Complex(refreshed),
            level: depth,
            noise_scale_degree: 1,
            depth_used: 0,
            noise_exceeded: false,
            ..data.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ParameterSet, SecurityLevel};

    fn context(depth: u32) -> CryptoContext {
        let mut params = ParameterSet::new(Scheme::Ckks);
        params.set_security_level(SecurityLevel::NotSet);
        params.set_ring_dim(1 << 12).unwrap();
        params.set_scaling_mod_size(59).unwrap();
        params.set_multiplicative_depth(depth).unwrap();
        let cc = CryptoContext::new(params).unwrap();
        cc.enable(0x01 | 0x02 | 0x08 | 0x10 | 0x40).unwrap();
        cc
    }

    #[test]
    fn test_bootstrap_depth_formula() {
        assert_eq!(
            bootstrap_depth([4, 4], SecretKeyDist::UniformTernary).unwrap(),
            22
        );
        assert_eq!(
            bootstrap_depth([3, 3], SecretKeyDist::SparseTernary).unwrap(),
            17
        );
        assert!(bootstrap_depth([0, 4], SecretKeyDist::UniformTernary).is_err());
    }

    #[test]
    fn test_setup_rejects_shallow_depth() {
        let cc = context(10);
        assert!(matches!(
            cc.eval_bootstrap_setup_simple([4, 4]),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_bootstrap_cycle() {
        let cc = context(32);
        let kp = cc.key_gen().unwrap();
        let sk = kp.private_key().unwrap();
        cc.eval_mult_key_gen(sk).unwrap();
        let ct = cc
            .encrypt(&kp, &cc.make_ckks_packed_plaintext(&[0.25, 0.5]).unwrap())
            .unwrap();

        assert!(matches!(
            cc.eval_bootstrap(&ct, 1, 0),
            Err(EngineError::Precondition(_))
        ));
        cc.eval_bootstrap_setup_simple([4, 4]).unwrap();
        assert!(matches!(
            cc.eval_bootstrap(&ct, 1, 0),
            Err(EngineError::Precondition(_))
        ));
        cc.eval_bootstrap_key_gen(sk, 0).unwrap();

        let sq = cc.eval_mult(&ct, &ct).unwrap();
        let out = cc.eval_bootstrap(&sq, 1, 0).unwrap();
        assert_eq!(out.level(), 22);
        let dec = cc.decrypt(sk, &out).unwrap();
        let v = dec.plaintext.real_packed_values().unwrap();
        assert!((v[0] - 0.0625).abs() < 1e-3);
        assert!((v[1] - 0.25).abs() < 1e-3);
    }
}
