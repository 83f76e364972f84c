//! Crypto contexts
//!
//! A [`CryptoContext`] is the scheme-bound environment every other engine
//! object hangs off. Its identity is a digest of its parameters, so a
//! context restored from bytes interoperates with keys and ciphertexts made
//! by the original. Evaluation keys accumulate inside the context, keyed by
//! the tag of the secret key that produced them.

use num_complex::Complex64;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::eval::bootstrap::BootstrapState;
use crate::keys::{EvalKey, EvalKeyKind, KeyPair, KeyTag, PrivateKey};
use crate::params::{Capabilities, Feature, FeatureSet, ParameterSet, Scheme};
use crate::plaintext::{Encoding, Plaintext, PlaintextData, SlotValues};
use crate::switching::SwitchingState;

/// Identity of a context, derived from its parameter fingerprint
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextTag(pub [u8; 16]);

impl ContextTag {
    fn from_params(params: &ParameterSet) -> Self {
        let mut tag = [0u8; 16];
        tag.copy_from_slice(&params.fingerprint()[..16]);
        ContextTag(tag)
    }

    pub fn from_slice(bytes: &[u8]) -> EngineResult<Self> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| {
            EngineError::InvalidParameter(format!(
                "context tag must be 16 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(ContextTag(arr))
    }
}

impl fmt::Display for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for ContextTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextTag({self})")
    }
}

#[derive(Default)]
pub(crate) struct ContextState {
    pub(crate) features: FeatureSet,
    pub(crate) mult_keys: HashMap<KeyTag, EvalKey>,
    pub(crate) rotation_keys: HashMap<KeyTag, BTreeMap<i32, EvalKey>>,
    pub(crate) bootstrap: Option<BootstrapState>,
    pub(crate) switching: SwitchingState,
}

struct ContextInner {
    params: ParameterSet,
    tag: ContextTag,
    ring_dim: u64,
    slots: usize,
    state: RwLock<ContextState>,
}

/// Scheme-bound factory for keys, plaintexts and ciphertexts
#[derive(Clone)]
pub struct CryptoContext(Arc<ContextInner>);

impl fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoContext")
            .field("scheme", &self.scheme())
            .field("tag", &self.0.tag)
            .field("ring_dim", &self.0.ring_dim)
            .field("slots", &self.0.slots)
            .finish()
    }
}

impl CryptoContext {
    /// Build a context; the scheme comes from the parameter set's tag
    pub fn new(params: ParameterSet) -> EngineResult<Self> {
        params.validate()?;
        let ring_dim = params.derive_ring_dim()?;
        let batch = u64::from(params.common().batch_size);
        let full = if params.scheme() == Scheme::Ckks {
            ring_dim / 2
        } else {
            ring_dim
        };
        if batch > full {
            return Err(EngineError::InvalidParameter(format!(
                "batch size {batch} exceeds the {full} slots of ring dimension {ring_dim}"
            )));
        }
        let slots = params.slots_for(ring_dim);
        let tag = ContextTag::from_params(&params);

        info!(
            scheme = %params.scheme(),
            ring_dim,
            slots,
            depth = params.common().multiplicative_depth,
            "generated crypto context"
        );

        Ok(CryptoContext(Arc::new(ContextInner {
            params,
            tag,
            ring_dim,
            slots,
            state: RwLock::new(ContextState::default()),
        })))
    }

    /// Rebuild a context with a previously enabled feature mask
    pub fn restore(params: ParameterSet, features: FeatureSet) -> EngineResult<Self> {
        let cc = Self::new(params)?;
        cc.enable_set(features)?;
        Ok(cc)
    }

    pub fn params(&self) -> &ParameterSet {
        &self.0.params
    }

    pub fn tag(&self) -> ContextTag {
        self.0.tag
    }

    pub fn scheme(&self) -> Scheme {
        self.0.params.scheme()
    }

    pub fn ring_dimension(&self) -> u64 {
        self.0.ring_dim
    }

    pub fn cyclotomic_order(&self) -> u64 {
        self.0.ring_dim * 2
    }

    /// Number of packed slots per plaintext
    pub fn slots(&self) -> usize {
        self.0.slots
    }

    pub fn batch_size(&self) -> u32 {
        self.0.slots as u32
    }

    pub fn multiplicative_depth(&self) -> u32 {
        self.0.params.common().multiplicative_depth
    }

    /// Plaintext modulus t for BFV/BGV, scaling modulus bits for CKKS
    pub fn plaintext_modulus(&self) -> u64 {
        match &self.0.params {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => p.plaintext_modulus,
            ParameterSet::Ckks(p) => u64::from(p.scaling_mod_size),
        }
    }

    pub fn ptr_eq(&self, other: &CryptoContext) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn state(&self) -> RwLockReadGuard<'_, ContextState> {
        self.0.state.read()
    }

    pub(crate) fn state_mut(&self) -> RwLockWriteGuard<'_, ContextState> {
        self.0.state.write()
    }

    /// Enable features given as a raw bitmask
    pub fn enable(&self, bits: u32) -> EngineResult<()> {
        self.enable_set(FeatureSet::from_bits(bits)?)
    }

    fn enable_set(&self, features: FeatureSet) -> EngineResult<()> {
        if features.contains(Feature::Fhe) && !self.0.params.supports_bootstrap() {
            return Err(EngineError::Fault(format!(
                "FHE is not available for {}",
                self.scheme()
            )));
        }
        if features.contains(Feature::SchemeSwitch) && !self.0.params.supports_scheme_switch() {
            return Err(EngineError::Fault(format!(
                "SCHEMESWITCH is not available for {}",
                self.scheme()
            )));
        }
        let mut state = self.state_mut();
        state.features.insert(features);
        debug!(features = state.features.bits(), "enabled context features");
        Ok(())
    }

    pub fn features(&self) -> FeatureSet {
        self.state().features
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.state().features.contains(feature)
    }

    pub(crate) fn require(&self, feature: Feature, op: &str) -> EngineResult<()> {
        if self.is_enabled(feature) {
            Ok(())
        } else {
            Err(EngineError::Precondition(format!(
                "{op} requires the {} feature to be enabled",
                feature.name()
            )))
        }
    }

    pub(crate) fn require_scheme(&self, scheme: Scheme, op: &str) -> EngineResult<()> {
        if self.scheme() == scheme {
            Ok(())
        } else {
            Err(EngineError::SchemeMismatch(format!(
                "{op} is only available for {scheme}, context is {}",
                self.scheme()
            )))
        }
    }

    pub(crate) fn check_context(&self, other: ContextTag, what: &str) -> EngineResult<()> {
        if other == self.0.tag {
            Ok(())
        } else {
            Err(EngineError::ContextMismatch(format!(
                "{what} belongs to context {other}, not {}",
                self.0.tag
            )))
        }
    }

    /// Human-readable parameter summary
    pub fn parameter_element_string(&self) -> String {
        let common = self.0.params.common();
        let mut out = format!(
            "scheme={} ring_dim={} slots={} depth={} security={:?} secret_key_dist={:?} key_switch={:?}",
            self.scheme(),
            self.0.ring_dim,
            self.0.slots,
            common.multiplicative_depth,
            common.security_level,
            common.secret_key_dist,
            common.key_switch_technique,
        );
        match &self.0.params {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => {
                out.push_str(&format!(" plaintext_modulus={}", p.plaintext_modulus));
            }
            ParameterSet::Ckks(p) => {
                out.push_str(&format!(
                    " scaling_mod_size={} first_mod_size={} scaling_technique={:?}",
                    p.scaling_mod_size, p.first_mod_size, p.scaling_technique
                ));
            }
        }
        out.push_str(&format!(" modulus_bits={}", self.0.params.modulus_bits()));
        if let Some(boot) = &self.state().bootstrap {
            out.push_str(&format!(
                " bootstrap_level_budget={:?} bootstrap_dim1={:?} bootstrap_slots={} bootstrap_correction={} bootstrap_depth={}",
                boot.level_budget, boot.dim1, boot.slots, boot.correction_factor, boot.depth
            ));
        }
        out
    }

    fn check_encode_len(&self, len: usize) -> EngineResult<()> {
        if len == 0 {
            return Err(EngineError::InvalidParameter(
                "cannot encode an empty vector".into(),
            ));
        }
        if len > self.0.slots {
            return Err(EngineError::InvalidParameter(format!(
                "{len} values exceed the {} available slots",
                self.0.slots
            )));
        }
        Ok(())
    }

    fn plaintext(&self, encoding: Encoding, values: SlotValues) -> EngineResult<Plaintext> {
        let length = values.len();
        Plaintext::from_data(PlaintextData {
            context: self.0.tag,
            scheme: self.scheme(),
            encoding,
            values,
            length,
            plaintext_modulus: self.plaintext_modulus(),
        })
    }

    /// Pack integers; BFV/BGV reduce into the centered range of t
    pub fn make_packed_plaintext(&self, values: &[i64]) -> EngineResult<Plaintext> {
        self.check_encode_len(values.len())?;
        let slots = match &self.0.params {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => SlotValues::Integer(
                values
                    .iter()
                    .map(|&v| centered_mod(i128::from(v), p.plaintext_modulus))
                    .collect(),
            ),
            ParameterSet::Ckks(_) => SlotValues::Complex(
                values.iter().map(|&v| Complex64::new(v as f64, 0.0)).collect(),
            ),
        };
        self.plaintext(Encoding::PackedInteger, slots)
    }

    pub fn make_ckks_packed_plaintext(&self, values: &[f64]) -> EngineResult<Plaintext> {
        self.require_scheme(Scheme::Ckks, "MakeCKKSPackedPlaintext")?;
        self.check_encode_len(values.len())?;
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(EngineError::InvalidParameter(format!(
                "cannot encode non-finite value {bad}"
            )));
        }
        self.plaintext(
            Encoding::PackedReal,
            SlotValues::Complex(values.iter().map(|&v| Complex64::new(v, 0.0)).collect()),
        )
    }

    pub fn make_ckks_complex_packed_plaintext(
        &self,
        values: &[Complex64],
    ) -> EngineResult<Plaintext> {
        self.require_scheme(Scheme::Ckks, "MakeCKKSComplexPackedPlaintext")?;
        self.check_encode_len(values.len())?;
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(EngineError::InvalidParameter(format!(
                "cannot encode non-finite value {bad}"
            )));
        }
        self.plaintext(Encoding::PackedComplex, SlotValues::Complex(values.to_vec()))
    }

    pub fn key_gen(&self) -> EngineResult<KeyPair> {
        self.require(Feature::Pke, "KeyGen")?;
        let secret = PrivateKey::generate(self.0.tag);
        let public = secret.public_key();
        debug!(key = %secret.tag(), "generated key pair");
        Ok(KeyPair::new(public, secret))
    }

    fn check_secret(&self, secret: &PrivateKey) -> EngineResult<()> {
        self.check_context(secret.context(), "private key")
    }

    pub fn eval_mult_key_gen(&self, secret: &PrivateKey) -> EngineResult<()> {
        self.require(Feature::KeySwitch, "EvalMultKeyGen")?;
        self.check_secret(secret)?;
        let key = EvalKey::derive(secret, EvalKeyKind::Relinearization);
        self.state_mut().mult_keys.insert(secret.tag(), key);
        debug!(key = %secret.tag(), "generated relinearization key");
        Ok(())
    }

    pub fn eval_rotate_key_gen(&self, secret: &PrivateKey, indices: &[i32]) -> EngineResult<()> {
        self.require(Feature::KeySwitch, "EvalRotateKeyGen")?;
        self.check_secret(secret)?;
        if indices.is_empty() {
            return Err(EngineError::InvalidParameter(
                "no rotation indices given".into(),
            ));
        }
        self.insert_rotation_keys(secret, indices.iter().copied());
        Ok(())
    }

    /// Rotation keys for every power of two below the slot count
    pub fn eval_sum_key_gen(&self, secret: &PrivateKey) -> EngineResult<()> {
        self.require(Feature::KeySwitch, "EvalSumKeyGen")?;
        self.check_secret(secret)?;
        self.insert_rotation_keys(secret, power_of_two_steps(self.0.slots));
        Ok(())
    }

    pub(crate) fn insert_rotation_keys(
        &self,
        secret: &PrivateKey,
        indices: impl IntoIterator<Item = i32>,
    ) {
        let mut state = self.state_mut();
        let entry = state.rotation_keys.entry(secret.tag()).or_default();
        for index in indices {
            entry
                .entry(index)
                .or_insert_with(|| EvalKey::derive(secret, EvalKeyKind::Automorphism { index }));
        }
        debug!(key = %secret.tag(), count = entry.len(), "rotation keys available");
    }

    pub(crate) fn has_mult_key(&self, tag: KeyTag) -> bool {
        self.state().mult_keys.contains_key(&tag)
    }

    pub(crate) fn require_mult_key(&self, tag: KeyTag, op: &str) -> EngineResult<()> {
        if self.has_mult_key(tag) {
            Ok(())
        } else {
            Err(EngineError::Precondition(format!(
                "{op} needs a relinearization key for {tag}; call EvalMultKeyGen first"
            )))
        }
    }

    /// Whether a rotation key equivalent to `index` exists for `tag`
    pub(crate) fn has_rotation_key(&self, tag: KeyTag, index: i32) -> bool {
        let want = normalize_rotation(index, self.0.slots);
        self.state().rotation_keys.get(&tag).is_some_and(|keys| {
            keys.keys()
                .any(|&k| normalize_rotation(k, self.0.slots) == want)
        })
    }

    /// Relinearization keys for one key tag, or for all when `key_id` is None
    pub fn export_mult_keys(&self, key_id: Option<KeyTag>) -> EngineResult<Vec<EvalKey>> {
        let state = self.state();
        match key_id {
            Some(tag) => state
                .mult_keys
                .get(&tag)
                .map(|k| vec![k.clone()])
                .ok_or_else(|| {
                    EngineError::Precondition(format!("no relinearization key for {tag}"))
                }),
            None if state.mult_keys.is_empty() => Err(EngineError::Precondition(
                "context holds no relinearization keys".into(),
            )),
            None => {
                let mut keys: Vec<_> = state.mult_keys.values().cloned().collect();
                keys.sort_by_key(|k| k.source());
                Ok(keys)
            }
        }
    }

    /// Rotation keys for one key tag, or for all when `key_id` is None
    pub fn export_rotation_keys(&self, key_id: Option<KeyTag>) -> EngineResult<Vec<EvalKey>> {
        let state = self.state();
        let collect = |keys: &BTreeMap<i32, EvalKey>| keys.values().cloned().collect::<Vec<_>>();
        match key_id {
            Some(tag) => state.rotation_keys.get(&tag).map(collect).ok_or_else(|| {
                EngineError::Precondition(format!("no rotation keys for {tag}"))
            }),
            None if state.rotation_keys.is_empty() => Err(EngineError::Precondition(
                "context holds no rotation keys".into(),
            )),
            None => {
                let mut tags: Vec<_> = state.rotation_keys.keys().copied().collect();
                tags.sort();
                Ok(tags
                    .iter()
                    .filter_map(|t| state.rotation_keys.get(t))
                    .flat_map(collect)
                    .collect())
            }
        }
    }

    /// Install previously exported evaluation keys
    ///
    /// All keys are checked before any is stored, so a rejected batch leaves
    /// the context unchanged.
    pub fn import_eval_keys(&self, keys: Vec<EvalKey>) -> EngineResult<usize> {
        for key in &keys {
            self.check_context(key.context(), "evaluation key")?;
            if matches!(key.kind(), EvalKeyKind::ReEncryption { .. }) {
                return Err(EngineError::InvalidParameter(
                    "re-encryption keys are not stored in a context".into(),
                ));
            }
        }
        let count = keys.len();
        let mut state = self.state_mut();
        for key in keys {
            match key.kind() {
                EvalKeyKind::Relinearization => {
                    state.mult_keys.insert(key.source(), key);
                }
                EvalKeyKind::Automorphism { index } => {
                    state
                        .rotation_keys
                        .entry(key.source())
                        .or_default()
                        .insert(index, key);
                }
                EvalKeyKind::ReEncryption { .. } => {}
            }
        }
        debug!(count, "imported evaluation keys");
        Ok(count)
    }
}

/// Reduce into (-t/2, t/2]
pub(crate) fn centered_mod(value: i128, modulus: u64) -> i64 {
    let t = i128::from(modulus);
    let mut r = value.rem_euclid(t);
    if r > t / 2 {
        r -= t;
    }
    r as i64
}

/// Rotation index mapped into 0..slots
pub(crate) fn normalize_rotation(index: i32, slots: usize) -> usize {
    i64::from(index).rem_euclid(slots as i64) as usize
}

pub(crate) fn power_of_two_steps(slots: usize) -> impl Iterator<Item = i32> {
    std::iter::successors(Some(1usize), |s| s.checked_mul(2))
        .take_while(move |&s| s < slots)
        .map(|s| s as i32)
}
