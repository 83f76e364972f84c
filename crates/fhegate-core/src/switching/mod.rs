//! CKKS <-> FHEW scheme switching
//!
//! The bridge is set up per context and per direction. CKKS-to-FHEW
//! extraction turns each of the first `num_values` slots into an LWE
//! ciphertext modulo the large-precision modulus `Q = 2^logQ`; the reverse
//! direction packs LWE messages back into one CKKS ciphertext. Min/max
//! ([`minmax`]) compares slots through the LWE side.

mod minmax;
mod params;

pub use minmax::index_from_one_hot;
pub use params::{SchSwchParams, MAX_LARGE_PREC_MOD_BITS};

use num_complex::Complex64;
use tracing::{debug, info};

use crate::binfhe::{self, BinFheContext, BinFheMethod, LweCiphertext, LweSecretKey};
use crate::ciphertext::{Ciphertext, CiphertextData};
use crate::context::CryptoContext;
use crate::error::{EngineError, EngineResult};
use crate::keys::{KeyPair, KeyTag};
use crate::params::{Feature, Scheme};
use crate::plaintext::{Encoding, SlotValues};

#[derive(Debug, Clone)]
pub(crate) struct ToFhewSetup {
    pub(crate) config: SchSwchParams,
    pub(crate) binfhe: BinFheContext,
    pub(crate) num_slots: usize,
    pub(crate) log_q: u32,
}

#[derive(Debug, Clone)]
pub(crate) struct FromFhewSetup {
    pub(crate) binfhe: BinFheContext,
    pub(crate) num_slots: usize,
    pub(crate) log_q: u32,
}

/// CKKS key a direction was keyed for, with the LWE secret it is bound to
#[derive(Debug, Clone)]
pub(crate) struct SwitchKey {
    pub(crate) ckks: KeyTag,
    pub(crate) lwe: LweSecretKey,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ComparePrecomp {
    pub(crate) p_lwe: u64,
    pub(crate) scale_sign: f64,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SwitchingState {
    pub(crate) to_fhew: Option<ToFhewSetup>,
    pub(crate) to_fhew_key: Option<SwitchKey>,
    pub(crate) to_fhew_scale: Option<f64>,
    pub(crate) from_fhew: Option<FromFhewSetup>,
    pub(crate) from_fhew_key: Option<SwitchKey>,
    pub(crate) compare: Option<ComparePrecomp>,
}

fn missing(op: &str, stage: &str) -> EngineError {
    EngineError::Precondition(format!("{op}: {stage} has not been called"))
}

impl CryptoContext {
    fn check_switching(&self, op: &str) -> EngineResult<()> {
        self.require(Feature::SchemeSwitch, op)?;
        self.require_scheme(Scheme::Ckks, op)
    }

    fn switch_slots(&self, requested: u32, op: &str) -> EngineResult<usize> {
        match requested as usize {
            0 => Ok(self.slots()),
            n if n <= self.slots() => Ok(n),
            n => Err(EngineError::InvalidParameter(format!(
                "{op}: {n} slots requested, context has {}",
                self.slots()
            ))),
        }
    }

    pub(crate) fn to_fhew_setup(&self, op: &str) -> EngineResult<ToFhewSetup> {
        self.state()
            .switching
            .to_fhew
            .clone()
            .ok_or_else(|| missing(op, "EvalCKKStoFHEWSetup"))
    }

    pub(crate) fn to_fhew_key(&self, op: &str) -> EngineResult<SwitchKey> {
        self.state()
            .switching
            .to_fhew_key
            .clone()
            .ok_or_else(|| missing(op, "EvalCKKStoFHEWKeyGen"))
    }

    fn from_fhew_setup(&self, op: &str) -> EngineResult<FromFhewSetup> {
        self.state()
            .switching
            .from_fhew
            .clone()
            .ok_or_else(|| missing(op, "EvalFHEWtoCKKSSetup"))
    }

    pub(crate) fn from_fhew_key(&self, op: &str) -> EngineResult<SwitchKey> {
        self.state()
            .switching
            .from_fhew_key
            .clone()
            .ok_or_else(|| missing(op, "EvalFHEWtoCKKSKeyGen"))
    }

    /// Set up CKKS-to-FHEW extraction; returns the LWE secret the bridge
    /// will extract under
    pub fn eval_ckks_to_fhew_setup(&self, config: &SchSwchParams) -> EngineResult<LweSecretKey> {
        self.check_switching("EvalCKKStoFHEWSetup")?;
        let num_slots = self.switch_slots(config.num_slots_ckks, "EvalCKKStoFHEWSetup")?;
        let binfhe = BinFheContext::new();
        binfhe.generate(config.security_level_fhew, BinFheMethod::Ginx)?;
        let lwe_sk = binfhe.key_gen()?;
        let log_q = config.ctxt_mod_size_fhew_large_prec;
        let mut state = self.state_mut();
        state.switching.to_fhew = Some(ToFhewSetup {
            config: config.clone(),
            binfhe,
            num_slots,
            log_q,
        });
        state.switching.to_fhew_key = None;
        info!(num_slots, log_q, fhew = ?config.security_level_fhew, "CKKS to FHEW set up");
        Ok(lwe_sk)
    }

    pub fn eval_ckks_to_fhew_key_gen(
        &self,
        keys: &KeyPair,
        lwe_sk: &LweSecretKey,
    ) -> EngineResult<()> {
        self.check_switching("EvalCKKStoFHEWKeyGen")?;
        let secret = keys.private_key()?;
        self.check_context(secret.context(), "private key")?;
        let setup = self.to_fhew_setup("EvalCKKStoFHEWKeyGen")?;
        let n = setup.binfhe.params()?.n as usize;
        if lwe_sk.dimension() != n {
            return Err(EngineError::InvalidParameter(format!(
                "LWE secret of dimension {} for a bridge with n = {n}",
                lwe_sk.dimension()
            )));
        }
        self.state_mut().switching.to_fhew_key = Some(SwitchKey {
            ckks: secret.tag(),
            lwe: lwe_sk.clone(),
        });
        debug!(key = %secret.tag(), lwe = %lwe_sk.tag(), "CKKS to FHEW keys generated");
        Ok(())
    }

    /// Fix the factor slot values are multiplied by before extraction
    pub fn eval_ckks_to_fhew_precompute(&self, scale: f64) -> EngineResult<()> {
        self.check_switching("EvalCKKStoFHEWPrecompute")?;
        self.to_fhew_setup("EvalCKKStoFHEWPrecompute")?;
        if !scale.is_finite() || scale <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "extraction scale {scale} must be finite and positive"
            )));
        }
        self.state_mut().switching.to_fhew_scale = Some(scale);
        Ok(())
    }

    /// Extract the first `num_values` slots as LWE ciphertexts
    pub fn eval_ckks_to_fhew(
        &self,
        ct: &Ciphertext,
        num_values: u32,
    ) -> EngineResult<Vec<LweCiphertext>> {
        const OP: &str = "EvalCKKStoFHEW";
        self.check_switching(OP)?;
        self.check_operand(ct)?;
        let setup = self.to_fhew_setup(OP)?;
        let key = self.to_fhew_key(OP)?;
        let scale = self
            .state()
            .switching
            .to_fhew_scale
            .ok_or_else(|| missing(OP, "EvalCKKStoFHEWPrecompute"))?;
        if ct.key_tag() != key.ckks {
            return Err(EngineError::KeyMismatch(format!(
                "{OP}: ciphertext under key {}, bridge keyed for {}",
                ct.key_tag(),
                key.ckks
            )));
        }
        let count = match num_values as usize {
            0 => setup.num_slots,
            n if n <= setup.num_slots => n,
            n => {
                return Err(EngineError::InvalidParameter(format!(
                    "{OP}: {n} values requested, bridge set up for {} slots",
                    setup.num_slots
                )))
            }
        };
        let SlotValues::Complex(values) = &ct.data().slots else {
            return Err(EngineError::Fault("CKKS ciphertext without complex slots".into()));
        };

        let q = 1u64 << setup.log_q;
        let p = ((1.0 / scale).round() as u64).clamp(2, q);
        let out = values
            .iter()
            .take(count)
            .map(|v| {
                let phase = ((v.re * scale * q as f64).round() as i128).rem_euclid(i128::from(q));
                binfhe::encrypt_phase(&key.lwe, phase as u64, q, p)
            })
            .collect::<Vec<_>>();
        debug!(count, log_q = setup.log_q, "extracted LWE ciphertexts");
        Ok(out)
    }

    pub fn eval_fhew_to_ckks_setup(
        &self,
        binfhe: &BinFheContext,
        num_slots: u32,
        log_q: u32,
    ) -> EngineResult<()> {
        self.check_switching("EvalFHEWtoCKKSSetup")?;
        if !binfhe.is_generated() {
            return Err(missing("EvalFHEWtoCKKSSetup", "BinFHEContext_Generate"));
        }
        let num_slots = self.switch_slots(num_slots, "EvalFHEWtoCKKSSetup")?;
        let log_q = match log_q {
            0 => 25,
            b if b <= MAX_LARGE_PREC_MOD_BITS => b,
            b => {
                return Err(EngineError::OutOfRange(format!(
                    "LWE modulus size {b} (expected 1..={MAX_LARGE_PREC_MOD_BITS})"
                )))
            }
        };
        let mut state = self.state_mut();
        state.switching.from_fhew = Some(FromFhewSetup {
            binfhe: binfhe.clone(),
            num_slots,
            log_q,
        });
        state.switching.from_fhew_key = None;
        info!(num_slots, log_q, "FHEW to CKKS set up");
        Ok(())
    }

    pub fn eval_fhew_to_ckks_key_gen(
        &self,
        keys: &KeyPair,
        lwe_sk: &LweSecretKey,
    ) -> EngineResult<()> {
        self.check_switching("EvalFHEWtoCKKSKeyGen")?;
        let secret = keys.private_key()?;
        self.check_context(secret.context(), "private key")?;
        let setup = self.from_fhew_setup("EvalFHEWtoCKKSKeyGen")?;
        let n = setup.binfhe.params()?.n as usize;
        if lwe_sk.dimension() != n {
            return Err(EngineError::InvalidParameter(format!(
                "LWE secret of dimension {} for a bridge with n = {n}",
                lwe_sk.dimension()
            )));
        }
        self.state_mut().switching.from_fhew_key = Some(SwitchKey {
            ckks: secret.tag(),
            lwe: lwe_sk.clone(),
        });
        debug!(key = %secret.tag(), "FHEW to CKKS keys generated");
        Ok(())
    }

    pub fn eval_fhew_to_ckks(
        &self,
        cts: &[LweCiphertext],
        num_slots: u32,
        p: u64,
    ) -> EngineResult<Ciphertext> {
        self.eval_fhew_to_ckks_ext(cts, num_slots, p, 0.0, p as f64)
    }

    /// Pack LWE messages modulo `p` into CKKS slots, each decoded into the
    /// window `[pmin, pmin + p)`
    pub fn eval_fhew_to_ckks_ext(
        &self,
        cts: &[LweCiphertext],
        num_slots: u32,
        p: u64,
        pmin: f64,
        pmax: f64,
    ) -> EngineResult<Ciphertext> {
        const OP: &str = "EvalFHEWtoCKKS";
        self.check_switching(OP)?;
        let setup = self.from_fhew_setup(OP)?;
        let key = self.from_fhew_key(OP)?;
        if cts.is_empty() {
            return Err(EngineError::InvalidParameter(format!("{OP}: no LWE ciphertexts")));
        }
        let num_slots = match num_slots as usize {
            0 => setup.num_slots,
            n => self.switch_slots(n as u32, OP)?,
        };
        if cts.len() > num_slots {
            return Err(EngineError::InvalidParameter(format!(
                "{OP}: {} ciphertexts do not fit {num_slots} slots",
                cts.len()
            )));
        }
        if p < 2 {
            return Err(EngineError::InvalidParameter(format!(
                "{OP}: plaintext modulus {p} must be at least 2"
            )));
        }
        if !pmin.is_finite() || !pmax.is_finite() || pmax <= pmin {
            return Err(EngineError::InvalidParameter(format!(
                "{OP}: output range [{pmin}, {pmax}) is empty"
            )));
        }

        let mut slots = vec![Complex64::new(0.0, 0.0); self.slots()];
        for (slot, ct) in slots.iter_mut().zip(cts) {
            if ct.key_tag() != key.lwe.tag() {
                return Err(EngineError::KeyMismatch(format!(
                    "{OP}: LWE ciphertext under key {}, bridge keyed for {}",
                    ct.key_tag(),
                    key.lwe.tag()
                )));
            }
            if p > ct.modulus() {
                return Err(EngineError::InvalidParameter(format!(
                    "{OP}: plaintext modulus {p} exceeds the LWE modulus {}",
                    ct.modulus()
                )));
            }
            let m = binfhe::decode(binfhe::phase(&key.lwe, ct)?, ct.modulus(), p);
            let offset = (m as f64 - pmin).rem_euclid(p as f64);
            *slot = Complex64::new(pmin + offset, 0.0);
        }
        debug!(count = cts.len(), p, log_q = setup.log_q, "packed LWE ciphertexts into CKKS");
        Ok(Ciphertext::new(CiphertextData {
            context: self.tag(),
            scheme: Scheme::Ckks,
            key_tag: key.ckks,
            encoding: Encoding::PackedReal,
            slots: SlotValues::Complex(slots),
            logical_len: cts.len(),
            level: 0,
            noise_scale_degree: 1,
            depth_used: 0,
            noise_exceeded: false,
            hops: 0,
        }))
    }

    /// Both directions with one shared binary-FHE context
    pub fn eval_scheme_switching_setup(
        &self,
        config: &SchSwchParams,
    ) -> EngineResult<LweSecretKey> {
        let lwe_sk = self.eval_ckks_to_fhew_setup(config)?;
        let setup = self.to_fhew_setup("EvalSchemeSwitchingSetup")?;
        self.eval_fhew_to_ckks_setup(&setup.binfhe, config.num_slots_ckks, setup.log_q)?;
        Ok(lwe_sk)
    }

    pub fn eval_scheme_switching_key_gen(
        &self,
        keys: &KeyPair,
        lwe_sk: &LweSecretKey,
    ) -> EngineResult<()> {
        self.eval_ckks_to_fhew_key_gen(keys, lwe_sk)?;
        self.eval_fhew_to_ckks_key_gen(keys, lwe_sk)?;
        let setup = self.to_fhew_setup("EvalSchemeSwitchingKeyGen")?;
        setup.binfhe.bt_key_gen(lwe_sk)
    }

    /// The binary-FHE context the bridge was set up with
    pub fn bin_cc_for_scheme_switch(&self) -> EngineResult<BinFheContext> {
        if let Some(setup) = &self.state().switching.to_fhew {
            return Ok(setup.binfhe.clone());
        }
        self.from_fhew_setup("GetBinCCForSchemeSwitch")
            .map(|s| s.binfhe)
            .map_err(|_| missing("GetBinCCForSchemeSwitch", "EvalCKKStoFHEWSetup"))
    }

    /// Fix the comparison plaintext modulus and sign scale used by min/max
    pub fn eval_compare_switch_precompute(&self, p_lwe: u64, scale_sign: f64) -> EngineResult<()> {
        const OP: &str = "EvalCompareSwitchPrecompute";
        self.check_switching(OP)?;
        let setup = self.to_fhew_setup(OP)?;
        let q = 1u64 << setup.log_q;
        if p_lwe < 2 || p_lwe > q {
            return Err(EngineError::InvalidParameter(format!(
                "{OP}: comparison modulus {p_lwe} outside 2..={q}"
            )));
        }
        if !scale_sign.is_finite() || scale_sign <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "{OP}: sign scale {scale_sign} must be finite and positive"
            )));
        }
        let mut state = self.state_mut();
        state.switching.compare = Some(ComparePrecomp { p_lwe, scale_sign });
        if state.switching.to_fhew_scale.is_none() {
            state.switching.to_fhew_scale = Some(1.0 / p_lwe as f64);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binfhe::BinFheParamSet;
    use crate::params::{ParameterSet, SecurityLevel};

    pub(super) fn bridge_context(batch: u32) -> (CryptoContext, KeyPair) {
        let mut params = ParameterSet::new(Scheme::Ckks);
        params.set_security_level(SecurityLevel::NotSet);
        params.set_ring_dim(1 << 6).unwrap();
        params.set_batch_size(batch).unwrap();
        params.set_scaling_mod_size(50).unwrap();
        params.set_multiplicative_depth(4).unwrap();
        let cc = CryptoContext::new(params).unwrap();
        cc.enable(0x01 | 0x02 | 0x08 | 0x80).unwrap();
        let kp = cc.key_gen().unwrap();
        (cc, kp)
    }

    pub(super) fn toy_config(slots: u32) -> SchSwchParams {
        let mut config = SchSwchParams::new();
        config.set_security_level_ckks(SecurityLevel::NotSet);
        config.set_security_level_fhew(BinFheParamSet::Toy).unwrap();
        config.set_num_slots_ckks(slots).unwrap();
        config
    }

    #[test]
    fn test_key_gen_before_setup() {
        let (cc, kp) = bridge_context(8);
        let bin = BinFheContext::new();
        bin.generate(BinFheParamSet::Toy, BinFheMethod::Ginx).unwrap();
        let lwe = bin.key_gen().unwrap();
        assert!(matches!(
            cc.eval_ckks_to_fhew_key_gen(&kp, &lwe),
            Err(EngineError::Precondition(_))
        ));
    }

    #[test]
    fn test_ckks_to_fhew_round_values() {
        let (cc, kp) = bridge_context(8);
        let lwe = cc.eval_ckks_to_fhew_setup(&toy_config(8)).unwrap();
        cc.eval_ckks_to_fhew_key_gen(&kp, &lwe).unwrap();
        let p = 4u64;
        cc.eval_ckks_to_fhew_precompute(1.0 / p as f64).unwrap();

        let pt = cc.make_ckks_packed_plaintext(&[0.0, 1.0, 2.0, 3.0]).unwrap();
        let ct = cc.encrypt(&kp, &pt).unwrap();
        let lwes = cc.eval_ckks_to_fhew(&ct, 4).unwrap();
        assert_eq!(lwes.len(), 4);
        let bin = cc.bin_cc_for_scheme_switch().unwrap();
        for (i, c) in lwes.iter().enumerate() {
            assert_eq!(bin.decrypt_modulus(&lwe, c, p).unwrap(), i as u64);
        }
    }

    #[test]
    fn test_extraction_needs_precompute() {
        let (cc, kp) = bridge_context(8);
        let lwe = cc.eval_ckks_to_fhew_setup(&toy_config(8)).unwrap();
        cc.eval_ckks_to_fhew_key_gen(&kp, &lwe).unwrap();
        let ct = cc
            .encrypt(&kp, &cc.make_ckks_packed_plaintext(&[1.0]).unwrap())
            .unwrap();
        assert!(matches!(
            cc.eval_ckks_to_fhew(&ct, 1),
            Err(EngineError::Precondition(_))
        ));
    }

    #[test]
    fn test_fhew_to_ckks_window() {
        let (cc, kp) = bridge_context(8);
        let lwe = cc.eval_scheme_switching_setup(&toy_config(8)).unwrap();
        cc.eval_scheme_switching_key_gen(&kp, &lwe).unwrap();
        let bin = cc.bin_cc_for_scheme_switch().unwrap();
        let cts: Vec<_> = [0u64, 1, 2, 3]
            .iter()
            .map(|&m| bin.encrypt_modulus(&lwe, m, 4).unwrap())
            .collect();

        let out = cc.eval_fhew_to_ckks(&cts, 4, 4).unwrap();
        let dec = cc.decrypt(kp.private_key().unwrap(), &out).unwrap();
        assert!(dec.is_valid);
        let v = dec.plaintext.real_packed_values().unwrap();
        assert_eq!(v, vec![0.0, 1.0, 2.0, 3.0]);

        let out = cc.eval_fhew_to_ckks_ext(&cts, 4, 4, -2.0, 2.0).unwrap();
        let v = cc
            .decrypt(kp.private_key().unwrap(), &out)
            .unwrap()
            .plaintext
            .real_packed_values()
            .unwrap();
        assert_eq!(v, vec![0.0, 1.0, -2.0, -1.0]);

        assert!(matches!(
            cc.eval_fhew_to_ckks_ext(&cts, 4, 4, 2.0, 2.0),
            Err(EngineError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_switching_needs_feature() {
        let mut params = ParameterSet::new(Scheme::Ckks);
        params.set_security_level(SecurityLevel::NotSet);
        params.set_batch_size(8).unwrap();
        let cc = CryptoContext::new(params).unwrap();
        cc.enable(0x01).unwrap();
        assert!(matches!(
            cc.eval_ckks_to_fhew_setup(&toy_config(8)),
            Err(EngineError::Precondition(_))
        ));
    }
}
