//! Ciphertexts
//!
//! Ciphertexts are immutable once built; every evaluation produces a new
//! one. The reference engine keeps the full slot vector next to the key tag
//! it is bound to and the bookkeeping the scheme would track (level, noise
//! scale degree, depth consumed).

use std::sync::Arc;

use crate::context::ContextTag;
use crate::error::{EngineError, EngineResult};
use crate::keys::KeyTag;
use crate::params::Scheme;
use crate::plaintext::{Encoding, SlotValues};

#[derive(Debug, Clone, PartialEq)]
pub struct CiphertextData {
    pub context: ContextTag,
    pub scheme: Scheme,
    pub key_tag: KeyTag,
    pub encoding: Encoding,
    pub slots: SlotValues,
    /// Length of the longest encoded input that flowed into this ciphertext
    pub logical_len: usize,
    /// Number of rescalings applied (CKKS) or moduli dropped (BGV)
    pub level: u32,
    pub noise_scale_degree: u32,
    /// Multiplications consumed since encryption or the last bootstrap
    pub depth_used: u32,
    /// Set once BFV noise outgrew the modulus chain
    pub noise_exceeded: bool,
    /// Number of proxy re-encryptions applied
    pub hops: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ciphertext(Arc<CiphertextData>);

impl Ciphertext {
    pub(crate) fn new(data: CiphertextData) -> Self {
        Ciphertext(Arc::new(data))
    }

    /// Rebuild from decoded parts, checking the slot storage fits the scheme
    pub fn from_data(data: CiphertextData) -> EngineResult<Self> {
        match (&data.slots, data.scheme.is_integer()) {
            (SlotValues::Integer(_), true) | (SlotValues::Complex(_), false) => {}
            _ => {
                return Err(EngineError::InvalidParameter(format!(
                    "ciphertext slot storage does not match scheme {}",
                    data.scheme
                )))
            }
        }
        if data.slots.is_empty() {
            return Err(EngineError::InvalidParameter("ciphertext has no slots".into()));
        }
        if data.logical_len > data.slots.len() {
            return Err(EngineError::InvalidParameter(format!(
                "ciphertext logical length {} exceeds {} slots",
                data.logical_len,
                data.slots.len()
            )));
        }
        if data.noise_scale_degree == 0 {
            return Err(EngineError::InvalidParameter(
                "ciphertext noise scale degree must be at least 1".into(),
            ));
        }
        Ok(Ciphertext(Arc::new(data)))
    }

    pub fn data(&self) -> &CiphertextData {
        &self.0
    }

    pub fn context(&self) -> ContextTag {
        self.0.context
    }

    pub fn scheme(&self) -> Scheme {
        self.0.scheme
    }

    pub fn key_tag(&self) -> KeyTag {
        self.0.key_tag
    }

    pub fn encoding(&self) -> Encoding {
        self.0.encoding
    }

    pub fn level(&self) -> u32 {
        self.0.level
    }

    pub fn noise_scale_degree(&self) -> u32 {
        self.0.noise_scale_degree
    }

    pub fn slot_count(&self) -> usize {
        self.0.slots.len()
    }

    pub fn logical_len(&self) -> usize {
        self.0.logical_len
    }

    pub fn hops(&self) -> u32 {
        self.0.hops
    }

    /// Whether two handles share the same underlying ciphertext
    pub fn ptr_eq(&self, other: &Ciphertext) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Copy of the data with the given slots; bookkeeping is carried over
    pub(crate) fn with_slots(&self, slots: SlotValues) -> CiphertextData {
        CiphertextData {
            slots,
            ..(*self.0).clone()
        }
    }
}
