//! Argmin/argmax through the LWE side of the bridge
//!
//! Each comparison extracts the difference of two slots, divided by the sign
//! scale, as an LWE ciphertext and reads its sign; a difference that rounds
//! to zero counts as a tie and keeps the lower position. The sign scale is
//! the one fixed by `EvalCompareSwitchPrecompute` times the factor given at
//! call time (0 and 1 both leave it unchanged).
//!
//! Two strategies:
//!
//! - tournament: `numValues - 1` comparisons read modulo `p_lwe`, one CKKS
//!   level per round (`log2(numValues)` levels). Slots closer than
//!   `scale / (2 * p_lwe)` compare as equal.
//! - all pairs (the `Alt` entry points, or `UseAltArgmin` at setup):
//!   `numValues * (numValues - 1) / 2` comparisons read at the
//!   large-precision modulus `Q / 16`, a single CKKS level.

use num_complex::Complex64;
use tracing::debug;

use crate::binfhe;
use crate::ciphertext::{Ciphertext, CiphertextData};
use crate::context::CryptoContext;
use crate::error::{EngineError, EngineResult};
use crate::keys::PublicKey;
use crate::params::Feature;
use crate::plaintext::{Encoding, SlotValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extreme {
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Tournament,
    AllPairs,
}

/// Bits of the large-precision modulus dropped when the all-pairs strategy
/// reads a sign; keeps the extraction noise below one unit
const ALL_PAIRS_DROPPED_BITS: u32 = 4;

/// Position of the first slot above one half in a decrypted one-hot vector
pub fn index_from_one_hot(values: &[f64], num_values: usize) -> EngineResult<usize> {
    values
        .iter()
        .take(num_values)
        .position(|&v| v > 0.5)
        .ok_or_else(|| {
            EngineError::InvalidParameter(format!(
                "no slot among the first {num_values} is set in the one-hot vector"
            ))
        })
}

impl CryptoContext {
    pub fn eval_min_scheme_switching(
        &self,
        ct: &Ciphertext,
        pk: &PublicKey,
        num_values: u32,
        num_slots: u32,
        p_lwe: u64,
        scale_sign: f64,
    ) -> EngineResult<(Ciphertext, Ciphertext)> {
        self.arg_extreme(
            ct,
            pk,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
            Extreme::Min,
            None,
            "EvalMinSchemeSwitching",
        )
    }

    /// Argmin over all pairs: more extractions at higher precision, one
    /// CKKS level
    pub fn eval_min_scheme_switching_alt(
        &self,
        ct: &Ciphertext,
        pk: &PublicKey,
        num_values: u32,
        num_slots: u32,
        p_lwe: u64,
        scale_sign: f64,
    ) -> EngineResult<(Ciphertext, Ciphertext)> {
        self.arg_extreme(
            ct,
            pk,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
            Extreme::Min,
            Some(Strategy::AllPairs),
            "EvalMinSchemeSwitchingAlt",
        )
    }

    pub fn eval_max_scheme_switching(
        &self,
        ct: &Ciphertext,
        pk: &PublicKey,
        num_values: u32,
        num_slots: u32,
        p_lwe: u64,
        scale_sign: f64,
    ) -> EngineResult<(Ciphertext, Ciphertext)> {
        self.arg_extreme(
            ct,
            pk,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
            Extreme::Max,
            None,
            "EvalMaxSchemeSwitching",
        )
    }

    pub fn eval_max_scheme_switching_alt(
        &self,
        ct: &Ciphertext,
        pk: &PublicKey,
        num_values: u32,
        num_slots: u32,
        p_lwe: u64,
        scale_sign: f64,
    ) -> EngineResult<(Ciphertext, Ciphertext)> {
        self.arg_extreme(
            ct,
            pk,
            num_values,
            num_slots,
            p_lwe,
            scale_sign,
            Extreme::Max,
            Some(Strategy::AllPairs),
            "EvalMaxSchemeSwitchingAlt",
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn arg_extreme(
        &self,
        ct: &Ciphertext,
        pk: &PublicKey,
        num_values: u32,
        num_slots: u32,
        p_lwe: u64,
        scale_sign: f64,
        extreme: Extreme,
        strategy: Option<Strategy>,
        op: &str,
    ) -> EngineResult<(Ciphertext, Ciphertext)> {
        self.require(Feature::SchemeSwitch, op)?;
        self.check_operand(ct)?;
        self.check_context(pk.context(), "public key")?;
        let setup = self.to_fhew_setup(op)?;
        let key = self.to_fhew_key(op)?;
        self.from_fhew_key(op)?;
        let precomp = self.state().switching.compare.ok_or_else(|| {
            EngineError::Precondition(format!(
                "{op}: EvalCompareSwitchPrecompute has not been called"
            ))
        })?;
        if ct.key_tag() != key.ckks {
            return Err(EngineError::KeyMismatch(format!(
                "{op}: ciphertext under key {}, bridge keyed for {}",
                ct.key_tag(),
                key.ckks
            )));
        }

        let num_slots = match num_slots as usize {
            0 => setup.num_slots,
            n if n <= self.slots() => n,
            n => {
                return Err(EngineError::InvalidParameter(format!(
                    "{op}: {n} slots requested, context has {}",
                    self.slots()
                )))
            }
        };
        let count = num_values as usize;
        if count == 0 || !count.is_power_of_two() || count > num_slots {
            return Err(EngineError::InvalidParameter(format!(
                "{op}: value count {num_values} must be a power of two no larger than {num_slots}"
            )));
        }
        let p_lwe = if p_lwe == 0 { precomp.p_lwe } else { p_lwe };
        let factor = if scale_sign == 0.0 { 1.0 } else { scale_sign };
        let q = 1u64 << setup.log_q;
        if p_lwe < 2 || p_lwe > q || !factor.is_finite() || factor <= 0.0 {
            return Err(EngineError::InvalidParameter(format!(
                "{op}: comparison modulus {p_lwe} or sign scale {scale_sign} out of range"
            )));
        }
        let scale = precomp.scale_sign * factor;
        let strategy = strategy.unwrap_or(if setup.config.use_alt_argmin {
            Strategy::AllPairs
        } else {
            Strategy::Tournament
        });

        let rounds = count.trailing_zeros();
        let levels = match strategy {
            Strategy::Tournament => rounds,
            Strategy::AllPairs => rounds.min(1),
        };
        let data = ct.data();
        let level = data.level + levels;
        if level > self.multiplicative_depth() {
            return Err(EngineError::Fault(format!(
                "{op}: comparing {count} values needs {levels} levels, {} remain",
                self.multiplicative_depth().saturating_sub(data.level)
            )));
        }

        let SlotValues::Complex(slots) = &data.slots else {
            return Err(EngineError::Fault("CKKS ciphertext without complex slots".into()));
        };
        let values: Vec<f64> = slots[..count]
            .iter()
            .map(|v| match extreme {
                Extreme::Min => v.re,
                Extreme::Max => -v.re,
            })
            .collect();

        // Sign of values[j] - values[i] read modulo `modulus`
        let sign = |i: usize, j: usize, modulus: u64| -> EngineResult<i64> {
            let diff = (values[j] - values[i]) / scale;
            let phase = ((diff * q as f64).round() as i128).rem_euclid(i128::from(q)) as u64;
            let lwe = binfhe::encrypt_phase(&key.lwe, phase, q, modulus);
            let m = setup.binfhe.decrypt_modulus(&key.lwe, &lwe, modulus)?;
            Ok(binfhe::centered(m, modulus).signum())
        };

        let (winner, comparisons) = match strategy {
            Strategy::Tournament => {
                let mut alive: Vec<usize> = (0..count).collect();
                while alive.len() > 1 {
                    alive = alive
                        .chunks(2)
                        .map(|pair| match *pair {
                            [a, b] => sign(a, b, p_lwe).map(|s| if s < 0 { b } else { a }),
                            _ => Ok(pair[0]),
                        })
                        .collect::<EngineResult<_>>()?;
                }
                (alive[0], count - 1)
            }
            Strategy::AllPairs => {
                let modulus = (q >> ALL_PAIRS_DROPPED_BITS).max(2);
                let mut losses = vec![0usize; count];
                for i in 0..count {
                    for j in i + 1..count {
                        if sign(i, j, modulus)? < 0 {
                            losses[i] += 1;
                        } else {
                            losses[j] += 1;
                        }
                    }
                }
                let winner = (0..count).min_by_key(|&i| losses[i]).unwrap_or(0);
                (winner, count * (count - 1) / 2)
            }
        };
        let value = slots[winner].re;
        debug!(op, ?strategy, count, comparisons, levels, winner, "scheme-switching argmin");

        let n = self.slots();
        let value_slots = vec![Complex64::new(value, 0.0); n];
        let (index_slots, index_len) = if setup.config.one_hot_encoding {
            let v = (0..n)
                .map(|i| Complex64::new(if i == winner { 1.0 } else { 0.0 }, 0.0))
                .collect();
            (v, count)
        } else {
            (vec![Complex64::new(winner as f64, 0.0); n], 1)
        };

        let out = |slots: Vec<Complex64>, logical_len: usize| {
            Ciphertext::new(CiphertextData {
                context: self.tag(),
                scheme: data.scheme,
                key_tag: pk.tag(),
                encoding: Encoding::PackedReal,
                slots: SlotValues::Complex(slots),
                logical_len,
                level,
                noise_scale_degree: 1,
                depth_used: data.depth_used,
                noise_exceeded: data.noise_exceeded,
                hops: data.hops,
            })
        };
        Ok((out(value_slots, 1), out(index_slots, index_len)))
    }
}
