//! Scheme-tagged parameter sets
//!
//! A [`ParameterSet`] is a builder-style value accumulating configuration for
//! one scheme. The scheme tag is fixed at construction; setters that do not
//! apply to the tagged scheme are rejected. Scheme-specific behavior is
//! queried through [`Capabilities`] rather than by matching on the tag.

mod enums;
mod ring;

pub use enums::{
    Feature, FeatureSet, KeySwitchTechnique, ScalingTechnique, Scheme, SecretKeyDist,
    SecurityLevel,
};
pub use ring::{min_secure_ring_dim, resolve_ring_dim};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

pub const MAX_MULTIPLICATIVE_DEPTH: u32 = 256;
pub const MAX_PLAINTEXT_MODULUS: u64 = 1 << 60;
pub const MAX_MOD_SIZE: u32 = 60;

/// Bits reserved for the key-switching auxiliary modulus
const AUX_MODULUS_BITS: u32 = 60;

/// What a scheme can do, independent of its concrete parameters
pub trait Capabilities {
    fn scheme(&self) -> Scheme;

    fn supports_batching(&self) -> bool {
        true
    }

    fn supports_integer_encoding(&self) -> bool {
        true
    }

    fn supports_real_encoding(&self) -> bool {
        self.scheme() == Scheme::Ckks
    }

    fn supports_complex_encoding(&self) -> bool {
        self.scheme() == Scheme::Ckks
    }

    fn supports_rescale(&self) -> bool {
        self.scheme() == Scheme::Ckks
    }

    fn supports_bootstrap(&self) -> bool {
        self.scheme() == Scheme::Ckks
    }

    fn supports_scheme_switch(&self) -> bool {
        self.scheme() == Scheme::Ckks
    }

    fn supports_pre(&self) -> bool {
        true
    }

    fn supports_poly_eval(&self) -> bool {
        self.scheme() == Scheme::Ckks
    }
}

impl Capabilities for Scheme {
    fn scheme(&self) -> Scheme {
        *self
    }
}

/// Settings shared by every RLWE scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonParams {
    pub multiplicative_depth: u32,
    pub ring_dim: u64,
    pub security_level: SecurityLevel,
    pub secret_key_dist: SecretKeyDist,
    pub batch_size: u32,
    pub key_switch_technique: KeySwitchTechnique,
    pub num_large_digits: u32,
    pub digit_size: u32,
    pub max_relin_sk_deg: u32,
}

impl Default for CommonParams {
    fn default() -> Self {
        Self {
            multiplicative_depth: 1,
            ring_dim: 0,
            security_level: SecurityLevel::default(),
            secret_key_dist: SecretKeyDist::default(),
            batch_size: 0,
            key_switch_technique: KeySwitchTechnique::default(),
            num_large_digits: 0,
            digit_size: 0,
            max_relin_sk_deg: 2,
        }
    }
}

/// BFV / BGV parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegerParams {
    #[serde(flatten)]
    pub common: CommonParams,
    pub plaintext_modulus: u64,
}

impl Default for IntegerParams {
    fn default() -> Self {
        Self {
            common: CommonParams::default(),
            plaintext_modulus: 65537,
        }
    }
}

/// CKKS parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CkksParams {
    #[serde(flatten)]
    pub common: CommonParams,
    pub scaling_mod_size: u32,
    pub first_mod_size: u32,
    pub scaling_technique: ScalingTechnique,
}

impl Default for CkksParams {
    fn default() -> Self {
        Self {
            common: CommonParams::default(),
            scaling_mod_size: 50,
            first_mod_size: 60,
            scaling_technique: ScalingTechnique::default(),
        }
    }
}

/// Parameter set tagged with its scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum ParameterSet {
    Bfv(IntegerParams),
    Bgv(IntegerParams),
    Ckks(CkksParams),
}

impl Capabilities for ParameterSet {
    fn scheme(&self) -> Scheme {
        match self {
            ParameterSet::Bfv(_) => Scheme::Bfv,
            ParameterSet::Bgv(_) => Scheme::Bgv,
            ParameterSet::Ckks(_) => Scheme::Ckks,
        }
    }
}

impl ParameterSet {
    /// Fresh parameter set with defaults for `scheme`
    pub fn new(scheme: Scheme) -> Self {
        match scheme {
            Scheme::Bfv => ParameterSet::Bfv(IntegerParams::default()),
            Scheme::Bgv => ParameterSet::Bgv(IntegerParams::default()),
            Scheme::Ckks => ParameterSet::Ckks(CkksParams::default()),
        }
    }

    pub fn common(&self) -> &CommonParams {
        match self {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => &p.common,
            ParameterSet::Ckks(p) => &p.common,
        }
    }

    fn common_mut(&mut self) -> &mut CommonParams {
        match self {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => &mut p.common,
            ParameterSet::Ckks(p) => &mut p.common,
        }
    }

    fn integer_mut(&mut self, setter: &str) -> EngineResult<&mut IntegerParams> {
        match self {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => Ok(p),
            ParameterSet::Ckks(_) => Err(EngineError::InvalidParameter(format!(
                "{setter} does not apply to {}",
                Scheme::Ckks
            ))),
        }
    }

    fn ckks_mut(&mut self, setter: &str) -> EngineResult<&mut CkksParams> {
        match self {
            ParameterSet::Ckks(p) => Ok(p),
            other => Err(EngineError::InvalidParameter(format!(
                "{setter} does not apply to {}",
                other.scheme()
            ))),
        }
    }

    pub fn integer(&self) -> Option<&IntegerParams> {
        match self {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => Some(p),
            ParameterSet::Ckks(_) => None,
        }
    }

    pub fn ckks(&self) -> Option<&CkksParams> {
        match self {
            ParameterSet::Ckks(p) => Some(p),
            _ => None,
        }
    }

    pub fn set_multiplicative_depth(&mut self, depth: u32) -> EngineResult<()> {
        if depth > MAX_MULTIPLICATIVE_DEPTH {
            return Err(EngineError::OutOfRange(format!(
                "multiplicative depth {depth} exceeds {MAX_MULTIPLICATIVE_DEPTH}"
            )));
        }
        self.common_mut().multiplicative_depth = depth;
        Ok(())
    }

    pub fn set_ring_dim(&mut self, ring_dim: u64) -> EngineResult<()> {
        if ring_dim != 0 && !ring_dim.is_power_of_two() {
            return Err(EngineError::InvalidParameter(format!(
                "ring dimension {ring_dim} is not a power of two"
            )));
        }
        self.common_mut().ring_dim = ring_dim;
        Ok(())
    }

    pub fn set_security_level(&mut self, level: SecurityLevel) {
        self.common_mut().security_level = level;
    }

    pub fn set_secret_key_dist(&mut self, dist: SecretKeyDist) {
        self.common_mut().secret_key_dist = dist;
    }

    pub fn set_batch_size(&mut self, batch: u32) -> EngineResult<()> {
        if batch != 0 && !batch.is_power_of_two() {
            return Err(EngineError::InvalidParameter(format!(
                "batch size {batch} is not a power of two"
            )));
        }
        self.common_mut().batch_size = batch;
        Ok(())
    }

    pub fn set_key_switch_technique(&mut self, technique: KeySwitchTechnique) {
        self.common_mut().key_switch_technique = technique;
    }

    pub fn set_num_large_digits(&mut self, digits: u32) -> EngineResult<()> {
        if digits > 64 {
            return Err(EngineError::OutOfRange(format!(
                "number of large digits {digits} exceeds 64"
            )));
        }
        self.common_mut().num_large_digits = digits;
        Ok(())
    }

    pub fn set_digit_size(&mut self, size: u32) -> EngineResult<()> {
        if size > MAX_MOD_SIZE {
            return Err(EngineError::OutOfRange(format!(
                "digit size {size} exceeds {MAX_MOD_SIZE}"
            )));
        }
        self.common_mut().digit_size = size;
        Ok(())
    }

    pub fn set_max_relin_sk_deg(&mut self, degree: u32) -> EngineResult<()> {
        if !(1..=8).contains(&degree) {
            return Err(EngineError::OutOfRange(format!(
                "max relinearization degree {degree} (expected 1..=8)"
            )));
        }
        self.common_mut().max_relin_sk_deg = degree;
        Ok(())
    }

    pub fn set_plaintext_modulus(&mut self, modulus: u64) -> EngineResult<()> {
        let p = self.integer_mut("SetPlaintextModulus")?;
        if !(2..=MAX_PLAINTEXT_MODULUS).contains(&modulus) {
            return Err(EngineError::OutOfRange(format!(
                "plaintext modulus {modulus} (expected 2..=2^60)"
            )));
        }
        p.plaintext_modulus = modulus;
        Ok(())
    }

    pub fn set_scaling_mod_size(&mut self, bits: u32) -> EngineResult<()> {
        let p = self.ckks_mut("SetScalingModSize")?;
        if !(1..=MAX_MOD_SIZE).contains(&bits) {
            return Err(EngineError::OutOfRange(format!(
                "scaling modulus size {bits} (expected 1..={MAX_MOD_SIZE})"
            )));
        }
        p.scaling_mod_size = bits;
        Ok(())
    }

    pub fn set_first_mod_size(&mut self, bits: u32) -> EngineResult<()> {
        let p = self.ckks_mut("SetFirstModSize")?;
        if !(1..=MAX_MOD_SIZE).contains(&bits) {
            return Err(EngineError::OutOfRange(format!(
                "first modulus size {bits} (expected 1..={MAX_MOD_SIZE})"
            )));
        }
        p.first_mod_size = bits;
        Ok(())
    }

    pub fn set_scaling_technique(&mut self, technique: ScalingTechnique) -> EngineResult<()> {
        self.ckks_mut("SetScalingTechnique")?.scaling_technique = technique;
        Ok(())
    }

    /// Approximate bit length of the full ciphertext modulus chain
    pub fn modulus_bits(&self) -> u32 {
        let depth = self.common().multiplicative_depth;
        match self {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => {
                let t_bits = 64 - p.plaintext_modulus.leading_zeros();
                t_bits + 60 * (depth + 1) + AUX_MODULUS_BITS
            }
            ParameterSet::Ckks(p) => {
                p.first_mod_size + depth * p.scaling_mod_size + AUX_MODULUS_BITS
            }
        }
    }

    /// Ring dimension a context built from these parameters would use
    pub fn derive_ring_dim(&self) -> EngineResult<u64> {
        let common = self.common();
        let batch = u64::from(common.batch_size);
        let min_for_slots = if self.scheme() == Scheme::Ckks {
            batch * 2
        } else {
            batch
        };
        resolve_ring_dim(
            common.security_level,
            common.ring_dim,
            self.modulus_bits(),
            min_for_slots,
        )
    }

    /// Number of packed slots for a given ring dimension
    pub fn slots_for(&self, ring_dim: u64) -> usize {
        let batch = self.common().batch_size as usize;
        let full = if self.scheme() == Scheme::Ckks {
            (ring_dim / 2) as usize
        } else {
            ring_dim as usize
        };
        if batch == 0 {
            full
        } else {
            batch.min(full)
        }
    }

    /// Stable digest identifying these parameters
    pub fn fingerprint(&self) -> [u8; 32] {
        let common = self.common();
        let mut hasher = blake3::Hasher::new_derive_key("fhegate 2024 parameter fingerprint");
        hasher.update(&[self.scheme() as u8]);
        hasher.update(&common.multiplicative_depth.to_le_bytes());
        hasher.update(&common.ring_dim.to_le_bytes());
        hasher.update(&[
            common.security_level as u8,
            common.secret_key_dist as u8,
            common.key_switch_technique as u8,
        ]);
        hasher.update(&common.batch_size.to_le_bytes());
        hasher.update(&common.num_large_digits.to_le_bytes());
        hasher.update(&common.digit_size.to_le_bytes());
        hasher.update(&common.max_relin_sk_deg.to_le_bytes());
        match self {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => {
                hasher.update(&p.plaintext_modulus.to_le_bytes());
            }
            ParameterSet::Ckks(p) => {
                hasher.update(&p.scaling_mod_size.to_le_bytes());
                hasher.update(&p.first_mod_size.to_le_bytes());
                hasher.update(&[p.scaling_technique as u8]);
            }
        }
        *hasher.finalize().as_bytes()
    }

    /// Parse a TOML preset carrying a `scheme` key
    pub fn from_toml(text: &str) -> EngineResult<Self> {
        let params: ParameterSet = toml::from_str(text)
            .map_err(|e| EngineError::InvalidParameter(format!("parameter preset: {e}")))?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_toml(&self) -> EngineResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Fault(format!("parameter preset encoding: {e}")))
    }

    /// Re-run every setter check over the current values
    pub fn validate(&self) -> EngineResult<()> {
        let mut scratch = ParameterSet::new(self.scheme());
        let common = self.common();
        scratch.set_multiplicative_depth(common.multiplicative_depth)?;
        scratch.set_ring_dim(common.ring_dim)?;
        scratch.set_batch_size(common.batch_size)?;
        scratch.set_num_large_digits(common.num_large_digits)?;
        scratch.set_digit_size(common.digit_size)?;
        scratch.set_max_relin_sk_deg(common.max_relin_sk_deg)?;
        match self {
            ParameterSet::Bfv(p) | ParameterSet::Bgv(p) => {
                scratch.set_plaintext_modulus(p.plaintext_modulus)?;
            }
            ParameterSet::Ckks(p) => {
                scratch.set_scaling_mod_size(p.scaling_mod_size)?;
                scratch.set_first_mod_size(p.first_mod_size)?;
            }
        }
        Ok(())
    }
}
