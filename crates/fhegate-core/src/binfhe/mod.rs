//! Boolean/LWE sub-engine
//!
//! A [`BinFheContext`] goes through `generate` (parameter preset and
//! bootstrapping method), `key_gen` and `bt_key_gen`. Linear operations
//! (encryption, decryption, NOT) are available after `generate`; anything
//! that refreshes noise needs the bootstrapping key.
//!
//! NOT SECURE: the bootstrapping key is the LWE secret itself, so gate
//! evaluation decrypts internally instead of blind-rotating.

mod lwe;
pub mod params;

pub use lwe::{LweCiphertext, LweCiphertextData, LweSecretKey, LweSecretKeyData};
pub use params::{BinFheMethod, BinFheParamSet, BinGate, LweParams};

pub(crate) use lwe::{centered, decode, encrypt_phase, phase};

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::error::{EngineError, EngineResult};

/// Plaintext modulus of gate-level ciphertexts
pub const GATE_PLAINTEXT_MODULUS: u64 = 4;

#[derive(Debug, Clone, Copy)]
struct Generated {
    paramset: BinFheParamSet,
    method: BinFheMethod,
    params: LweParams,
}

#[derive(Debug, Default)]
struct BinFheState {
    generated: Option<Generated>,
    bootstrapping_key: Option<LweSecretKey>,
}

/// Shared handle to a binary-FHE context
#[derive(Debug, Clone, Default)]
pub struct BinFheContext(Arc<RwLock<BinFheState>>);

impl BinFheContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the parameter preset and method; drops any bootstrapping key
    pub fn generate(&self, paramset: BinFheParamSet, method: BinFheMethod) -> EngineResult<()> {
        let params = paramset.params();
        let mut state = self.0.write();
        state.generated = Some(Generated {
            paramset,
            method,
            params,
        });
        state.bootstrapping_key = None;
        info!(?paramset, ?method, n = params.n, q = params.q, "binary FHE context generated");
        Ok(())
    }

    fn generated(&self, op: &str) -> EngineResult<Generated> {
        self.0.read().generated.ok_or_else(|| {
            EngineError::Precondition(format!("{op}: binary FHE context has not been generated"))
        })
    }

    fn bootstrapping_key(&self, op: &str) -> EngineResult<LweSecretKey> {
        self.0.read().bootstrapping_key.clone().ok_or_else(|| {
            EngineError::Precondition(format!("{op}: BTKeyGen has not been called"))
        })
    }

    pub fn is_generated(&self) -> bool {
        self.0.read().generated.is_some()
    }

    pub fn has_bootstrapping_key(&self) -> bool {
        self.0.read().bootstrapping_key.is_some()
    }

    pub fn paramset(&self) -> Option<BinFheParamSet> {
        self.0.read().generated.map(|g| g.paramset)
    }

    pub fn method(&self) -> Option<BinFheMethod> {
        self.0.read().generated.map(|g| g.method)
    }

    pub fn params(&self) -> EngineResult<LweParams> {
        Ok(self.generated("GetParams")?.params)
    }

    pub fn max_plaintext_space(&self) -> EngineResult<u32> {
        Ok(self.params()?.max_plaintext_space())
    }

    pub fn ptr_eq(&self, other: &BinFheContext) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn key_gen(&self) -> EngineResult<LweSecretKey> {
        let g = self.generated("KeyGen")?;
        let sk = LweSecretKey::generate(g.params.n);
        debug!(key = %sk.tag(), n = g.params.n, "LWE secret key generated");
        Ok(sk)
    }

    pub fn bt_key_gen(&self, sk: &LweSecretKey) -> EngineResult<()> {
        let g = self.generated("BTKeyGen")?;
        if sk.dimension() != g.params.n as usize {
            return Err(EngineError::InvalidParameter(format!(
                "BTKeyGen: secret of dimension {} for a context with n = {}",
                sk.dimension(),
                g.params.n
            )));
        }
        self.0.write().bootstrapping_key = Some(sk.clone());
        debug!(key = %sk.tag(), method = ?g.method, "bootstrapping key generated");
        Ok(())
    }

    fn check_plaintext_modulus(&self, p: u64, q: u64) -> EngineResult<()> {
        // keep q / (2p) well above the fresh noise bound
        if p < 2 || p > q / 16 {
            return Err(EngineError::InvalidParameter(format!(
                "plaintext modulus {p} outside 2..={} for q = {q}",
                q / 16
            )));
        }
        Ok(())
    }

    pub fn encrypt(&self, sk: &LweSecretKey, m: u64) -> EngineResult<LweCiphertext> {
        self.encrypt_modulus(sk, m, GATE_PLAINTEXT_MODULUS)
    }

    pub fn encrypt_modulus(
        &self,
        sk: &LweSecretKey,
        m: u64,
        p: u64,
    ) -> EngineResult<LweCiphertext> {
        let g = self.generated("Encrypt")?;
        if sk.dimension() != g.params.n as usize {
            return Err(EngineError::InvalidParameter(format!(
                "LWE key of dimension {} for a context with n = {}",
                sk.dimension(),
                g.params.n
            )));
        }
        self.check_plaintext_modulus(p, g.params.q)?;
        if m >= p {
            return Err(EngineError::OutOfRange(format!(
                "message {m} does not fit plaintext modulus {p}"
            )));
        }
        Ok(lwe::encrypt(sk, m, p, g.params.q))
    }

    /// Decrypt with the plaintext modulus the ciphertext was encoded with
    pub fn decrypt(&self, sk: &LweSecretKey, ct: &LweCiphertext) -> EngineResult<u64> {
        self.generated("Decrypt")?;
        lwe::decrypt(sk, ct, ct.plaintext_modulus())
    }

    pub fn decrypt_modulus(
        &self,
        sk: &LweSecretKey,
        ct: &LweCiphertext,
        p: u64,
    ) -> EngineResult<u64> {
        self.generated("Decrypt")?;
        if p < 2 || p > ct.modulus() {
            return Err(EngineError::InvalidParameter(format!(
                "plaintext modulus {p} outside 2..={}",
                ct.modulus()
            )));
        }
        lwe::decrypt(sk, ct, p)
    }

    fn decrypt_bit(&self, key: &LweSecretKey, ct: &LweCiphertext) -> EngineResult<bool> {
        if ct.key_tag() != key.tag() {
            return Err(EngineError::KeyMismatch(format!(
                "ciphertext under key {} does not match the bootstrapping key {}",
                ct.key_tag(),
                key.tag()
            )));
        }
        match lwe::decrypt(key, ct, ct.plaintext_modulus())? {
            0 => Ok(false),
            1 => Ok(true),
            m => Err(EngineError::Fault(format!(
                "gate input decrypts to {m}, expected a bit"
            ))),
        }
    }

    pub fn eval_bin_gate(
        &self,
        gate: BinGate,
        inputs: &[&LweCiphertext],
    ) -> EngineResult<LweCiphertext> {
        let g = self.generated("EvalBinGate")?;
        let key = self.bootstrapping_key("EvalBinGate")?;
        if inputs.len() != gate.arity() {
            return Err(EngineError::InvalidParameter(format!(
                "{gate:?} takes {} inputs, got {}",
                gate.arity(),
                inputs.len()
            )));
        }
        let bits = inputs
            .iter()
            .map(|ct| self.decrypt_bit(&key, ct))
            .collect::<EngineResult<Vec<_>>>()?;
        let out = gate.apply(&bits);
        trace!(?gate, "EvalBinGate");
        Ok(lwe::encrypt(&key, u64::from(out), GATE_PLAINTEXT_MODULUS, g.params.q))
    }

    /// Linear NOT; needs no bootstrapping key
    pub fn eval_not(&self, ct: &LweCiphertext) -> EngineResult<LweCiphertext> {
        self.generated("EvalNOT")?;
        Ok(lwe::complement(ct))
    }

    /// Refresh the noise of a ciphertext, keeping its moduli
    pub fn bootstrap(&self, ct: &LweCiphertext) -> EngineResult<LweCiphertext> {
        self.generated("Bootstrap")?;
        let key = self.bootstrapping_key("Bootstrap")?;
        if ct.key_tag() != key.tag() {
            return Err(EngineError::KeyMismatch(
                "Bootstrap: ciphertext is not under the bootstrapping key".into(),
            ));
        }
        let m = lwe::decrypt(&key, ct, ct.plaintext_modulus())?;
        Ok(lwe::encrypt(&key, m, ct.plaintext_modulus(), ct.modulus()))
    }

    /// Encrypted sign bit: 1 when the message lies in the upper half of the
    /// plaintext space
    pub fn eval_sign(&self, ct: &LweCiphertext) -> EngineResult<LweCiphertext> {
        let g = self.generated("EvalSign")?;
        let key = self.bootstrapping_key("EvalSign")?;
        if ct.key_tag() != key.tag() {
            return Err(EngineError::KeyMismatch(
                "EvalSign: ciphertext is not under the bootstrapping key".into(),
            ));
        }
        let negative = lwe::phase(&key, ct)? >= ct.modulus() / 2;
        Ok(lwe::encrypt(
            &key,
            u64::from(negative),
            GATE_PLAINTEXT_MODULUS,
            g.params.q,
        ))
    }

    /// Clear the `bits` least significant bits of the message
    pub fn eval_floor(&self, ct: &LweCiphertext, bits: u32) -> EngineResult<LweCiphertext> {
        self.generated("EvalFloor")?;
        let key = self.bootstrapping_key("EvalFloor")?;
        let p = ct.plaintext_modulus();
        let width = u64::BITS - 1 - p.leading_zeros();
        if bits >= width {
            return Err(EngineError::InvalidParameter(format!(
                "EvalFloor: cannot clear {bits} bits of a {width}-bit message"
            )));
        }
        if ct.key_tag() != key.tag() {
            return Err(EngineError::KeyMismatch(
                "EvalFloor: ciphertext is not under the bootstrapping key".into(),
            ));
        }
        let m = lwe::decrypt(&key, ct, p)?;
        let floored = m & !((1u64 << bits) - 1);
        Ok(lwe::encrypt(&key, floored, p, ct.modulus()))
    }
}
