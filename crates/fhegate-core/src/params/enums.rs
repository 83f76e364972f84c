//! Small integer enumerations shared with foreign callers
//!
//! Every enum here maps 1:1 onto a fixed integer domain. Conversion from a
//! raw integer rejects unknown values instead of truncating them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

/// Encryption scheme a parameter set or context is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Scheme {
    Bfv = 0,
    Bgv = 1,
    Ckks = 2,
}

impl Scheme {
    pub fn name(&self) -> &'static str {
        match self {
            Scheme::Bfv => "BFVRNS",
            Scheme::Bgv => "BGVRNS",
            Scheme::Ckks => "CKKSRNS",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Scheme::Bfv | Scheme::Bgv)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Scheme {
    type Error = EngineError;

    fn try_from(v: u8) -> EngineResult<Self> {
        match v {
            0 => Ok(Scheme::Bfv),
            1 => Ok(Scheme::Bgv),
            2 => Ok(Scheme::Ckks),
            _ => Err(EngineError::OutOfRange(format!("unknown scheme id {v}"))),
        }
    }
}

impl FromStr for Scheme {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bfv" | "bfvrns" => Ok(Scheme::Bfv),
            "bgv" | "bgvrns" => Ok(Scheme::Bgv),
            "ckks" | "ckksrns" => Ok(Scheme::Ckks),
            _ => Err(EngineError::InvalidParameter(format!("unknown scheme: {s}"))),
        }
    }
}

/// Homomorphic-encryption-standard security level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SecurityLevel {
    #[serde(rename = "HEStd_128_classic")]
    Std128Classic = 0,
    #[serde(rename = "HEStd_192_classic")]
    Std192Classic = 1,
    #[serde(rename = "HEStd_256_classic")]
    Std256Classic = 2,
    #[serde(rename = "HEStd_128_quantum")]
    Std128Quantum = 3,
    #[serde(rename = "HEStd_192_quantum")]
    Std192Quantum = 4,
    #[serde(rename = "HEStd_256_quantum")]
    Std256Quantum = 5,
    #[serde(rename = "HEStd_NotSet")]
    NotSet = 6,
}

impl Default for SecurityLevel {
    fn default() -> Self {
        SecurityLevel::Std128Classic
    }
}

impl TryFrom<i32> for SecurityLevel {
    type Error = EngineError;

    fn try_from(v: i32) -> EngineResult<Self> {
        match v {
            0 => Ok(SecurityLevel::Std128Classic),
            1 => Ok(SecurityLevel::Std192Classic),
            2 => Ok(SecurityLevel::Std256Classic),
            3 => Ok(SecurityLevel::Std128Quantum),
            4 => Ok(SecurityLevel::Std192Quantum),
            5 => Ok(SecurityLevel::Std256Quantum),
            6 => Ok(SecurityLevel::NotSet),
            _ => Err(EngineError::OutOfRange(format!(
                "security level {v} (expected 0..=6)"
            ))),
        }
    }
}

/// Secret key coefficient distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum SecretKeyDist {
    Gaussian = 0,
    UniformTernary = 1,
    SparseTernary = 2,
    SparseEncapsulated = 3,
}

impl Default for SecretKeyDist {
    fn default() -> Self {
        SecretKeyDist::UniformTernary
    }
}

impl TryFrom<i32> for SecretKeyDist {
    type Error = EngineError;

    fn try_from(v: i32) -> EngineResult<Self> {
        match v {
            0 => Ok(SecretKeyDist::Gaussian),
            1 => Ok(SecretKeyDist::UniformTernary),
            2 => Ok(SecretKeyDist::SparseTernary),
            3 => Ok(SecretKeyDist::SparseEncapsulated),
            _ => Err(EngineError::OutOfRange(format!(
                "secret key distribution {v} (expected 0..=3)"
            ))),
        }
    }
}

/// CKKS rescaling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ScalingTechnique {
    FixedManual = 0,
    FixedAuto = 1,
    FlexibleAuto = 2,
    FlexibleAutoExt = 3,
    NoRescale = 6,
}

impl ScalingTechnique {
    /// Whether the engine rescales on its own before multiplying
    pub fn is_automatic(&self) -> bool {
        matches!(
            self,
            ScalingTechnique::FixedAuto
                | ScalingTechnique::FlexibleAuto
                | ScalingTechnique::FlexibleAutoExt
        )
    }
}

impl Default for ScalingTechnique {
    fn default() -> Self {
        ScalingTechnique::FlexibleAuto
    }
}

impl TryFrom<i32> for ScalingTechnique {
    type Error = EngineError;

    fn try_from(v: i32) -> EngineResult<Self> {
        match v {
            0 => Ok(ScalingTechnique::FixedManual),
            1 => Ok(ScalingTechnique::FixedAuto),
            2 => Ok(ScalingTechnique::FlexibleAuto),
            3 => Ok(ScalingTechnique::FlexibleAutoExt),
            6 => Ok(ScalingTechnique::NoRescale),
            4 | 5 => Err(EngineError::InvalidParameter(format!(
                "scaling technique {v} (composite scaling) is not supported"
            ))),
            _ => Err(EngineError::OutOfRange(format!("scaling technique {v}"))),
        }
    }
}

/// Key switching method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum KeySwitchTechnique {
    Bv = 0,
    Hybrid = 1,
}

impl Default for KeySwitchTechnique {
    fn default() -> Self {
        KeySwitchTechnique::Hybrid
    }
}

impl TryFrom<i32> for KeySwitchTechnique {
    type Error = EngineError;

    fn try_from(v: i32) -> EngineResult<Self> {
        match v {
            0 => Ok(KeySwitchTechnique::Bv),
            1 => Ok(KeySwitchTechnique::Hybrid),
            _ => Err(EngineError::OutOfRange(format!(
                "key switch technique {v} (expected 0 or 1)"
            ))),
        }
    }
}

/// Context feature that must be enabled before the matching operations run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Feature {
    Pke = 0x01,
    KeySwitch = 0x02,
    Pre = 0x04,
    LeveledShe = 0x08,
    AdvancedShe = 0x10,
    Multiparty = 0x20,
    Fhe = 0x40,
    SchemeSwitch = 0x80,
}

impl Feature {
    pub const ALL: [Feature; 8] = [
        Feature::Pke,
        Feature::KeySwitch,
        Feature::Pre,
        Feature::LeveledShe,
        Feature::AdvancedShe,
        Feature::Multiparty,
        Feature::Fhe,
        Feature::SchemeSwitch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Pke => "PKE",
            Feature::KeySwitch => "KEYSWITCH",
            Feature::Pre => "PRE",
            Feature::LeveledShe => "LEVELEDSHE",
            Feature::AdvancedShe => "ADVANCEDSHE",
            Feature::Multiparty => "MULTIPARTY",
            Feature::Fhe => "FHE",
            Feature::SchemeSwitch => "SCHEMESWITCH",
        }
    }
}

/// Bitmask of enabled [`Feature`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct FeatureSet(u32);

impl FeatureSet {
    const KNOWN_BITS: u32 = 0xFF;

    pub fn empty() -> Self {
        FeatureSet(0)
    }

    /// Parse a raw mask, rejecting bits no feature claims
    pub fn from_bits(bits: u32) -> EngineResult<Self> {
        if bits & !Self::KNOWN_BITS != 0 {
            return Err(EngineError::OutOfRange(format!(
                "unknown feature bits {:#x}",
                bits & !Self::KNOWN_BITS
            )));
        }
        Ok(FeatureSet(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn contains(&self, feature: Feature) -> bool {
        self.0 & feature as u32 != 0
    }

    pub fn insert(&mut self, other: FeatureSet) {
        self.0 |= other.0;
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        Feature::ALL.into_iter().filter(|f| self.contains(*f))
    }
}
