//! Encoded plaintexts
//!
//! A plaintext remembers the scheme and the encoding it was produced with.
//! Accessors for a different encoding fail instead of returning zeros.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::context::ContextTag;
use crate::error::{EngineError, EngineResult};
use crate::params::Scheme;

/// Packing used by a plaintext or ciphertext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Encoding {
    PackedInteger = 0,
    PackedReal = 1,
    PackedComplex = 2,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::PackedInteger => "packed integer",
            Encoding::PackedReal => "packed real",
            Encoding::PackedComplex => "packed complex",
        }
    }

    /// Encoding of the result of combining two operands
    pub fn combine(self, other: Encoding) -> Encoding {
        self.max(other)
    }
}

impl TryFrom<u8> for Encoding {
    type Error = EngineError;

    fn try_from(v: u8) -> EngineResult<Self> {
        match v {
            0 => Ok(Encoding::PackedInteger),
            1 => Ok(Encoding::PackedReal),
            2 => Ok(Encoding::PackedComplex),
            _ => Err(EngineError::OutOfRange(format!("unknown encoding {v}"))),
        }
    }
}

/// Slot storage: exact integers for BFV/BGV, complex numbers for CKKS
#[derive(Debug, Clone, PartialEq)]
pub enum SlotValues {
    Integer(Vec<i64>),
    Complex(Vec<Complex64>),
}

impl SlotValues {
    pub fn len(&self) -> usize {
        match self {
            SlotValues::Integer(v) => v.len(),
            SlotValues::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy padded with zeros up to `slots`
    pub(crate) fn padded(&self, slots: usize) -> SlotValues {
        match self {
            SlotValues::Integer(v) => {
                let mut out = v.clone();
                out.resize(slots, 0);
                SlotValues::Integer(out)
            }
            SlotValues::Complex(v) => {
                let mut out = v.clone();
                out.resize(slots, Complex64::new(0.0, 0.0));
                SlotValues::Complex(out)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaintextData {
    pub context: ContextTag,
    pub scheme: Scheme,
    pub encoding: Encoding,
    pub values: SlotValues,
    pub length: usize,
    pub plaintext_modulus: u64,
}

/// Encoded payload ready for encryption or read back from decryption
#[derive(Debug, Clone, PartialEq)]
pub struct Plaintext(Arc<PlaintextData>);

impl Plaintext {
    pub fn from_data(data: PlaintextData) -> EngineResult<Self> {
        if data.length > data.values.len() {
            return Err(EngineError::InvalidParameter(format!(
                "plaintext length {} exceeds its {} stored values",
                data.length,
                data.values.len()
            )));
        }
        match (&data.values, data.scheme.is_integer()) {
            (SlotValues::Integer(_), true) | (SlotValues::Complex(_), false) => {}
            _ => {
                return Err(EngineError::InvalidParameter(format!(
                    "slot storage does not match scheme {}",
                    data.scheme
                )))
            }
        }
        if data.scheme.is_integer() && data.encoding != Encoding::PackedInteger {
            return Err(EngineError::InvalidParameter(format!(
                "{} plaintexts only use the packed integer encoding",
                data.scheme
            )));
        }
        Ok(Plaintext(Arc::new(data)))
    }

    pub fn data(&self) -> &PlaintextData {
        &self.0
    }

    pub fn scheme(&self) -> Scheme {
        self.0.scheme
    }

    pub fn encoding(&self) -> Encoding {
        self.0.encoding
    }

    pub fn context(&self) -> ContextTag {
        self.0.context
    }

    pub fn len(&self) -> usize {
        self.0.length
    }

    pub fn is_empty(&self) -> bool {
        self.0.length == 0
    }

    /// Capacity available to [`Plaintext::set_length`]
    pub fn capacity(&self) -> usize {
        self.0.values.len()
    }

    /// Change the visible length; copies on write if the payload is shared
    pub fn set_length(&mut self, length: usize) -> EngineResult<()> {
        if length > self.capacity() {
            return Err(EngineError::OutOfRange(format!(
                "length {length} exceeds plaintext capacity {}",
                self.capacity()
            )));
        }
        Arc::make_mut(&mut self.0).length = length;
        Ok(())
    }

    fn expect_encoding(&self, allowed: &[Encoding], accessor: &str) -> EngineResult<()> {
        if allowed.contains(&self.0.encoding) {
            Ok(())
        } else {
            Err(EngineError::InvalidParameter(format!(
                "{accessor} on a {} plaintext",
                self.0.encoding.name()
            )))
        }
    }

    fn check_index(&self, index: usize) -> EngineResult<()> {
        if index >= self.0.length {
            return Err(EngineError::OutOfRange(format!(
                "index {index} out of range for plaintext of length {}",
                self.0.length
            )));
        }
        Ok(())
    }

    /// Integer slots, rounded for CKKS payloads that were integer-encoded
    pub fn packed_values(&self) -> EngineResult<Vec<i64>> {
        self.expect_encoding(&[Encoding::PackedInteger], "packed integer access")?;
        let n = self.0.length;
        Ok(match &self.0.values {
            SlotValues::Integer(v) => v[..n].to_vec(),
            SlotValues::Complex(v) => v[..n].iter().map(|c| c.re.round() as i64).collect(),
        })
    }

    pub fn packed_value_at(&self, index: usize) -> EngineResult<i64> {
        self.expect_encoding(&[Encoding::PackedInteger], "packed integer access")?;
        self.check_index(index)?;
        Ok(match &self.0.values {
            SlotValues::Integer(v) => v[index],
            SlotValues::Complex(v) => v[index].re.round() as i64,
        })
    }

    fn complex_slice(&self) -> EngineResult<&[Complex64]> {
        match &self.0.values {
            SlotValues::Complex(v) => Ok(&v[..self.0.length]),
            SlotValues::Integer(_) => Err(EngineError::InvalidParameter(format!(
                "{} plaintexts carry no real slots",
                self.0.scheme
            ))),
        }
    }

    pub fn real_packed_values(&self) -> EngineResult<Vec<f64>> {
        self.expect_encoding(
            &[Encoding::PackedReal, Encoding::PackedComplex],
            "real packed access",
        )?;
        Ok(self.complex_slice()?.iter().map(|c| c.re).collect())
    }

    pub fn real_packed_value_at(&self, index: usize) -> EngineResult<f64> {
        self.expect_encoding(
            &[Encoding::PackedReal, Encoding::PackedComplex],
            "real packed access",
        )?;
        self.check_index(index)?;
        Ok(self.complex_slice()?[index].re)
    }

    pub fn complex_packed_values(&self) -> EngineResult<Vec<Complex64>> {
        self.expect_encoding(
            &[Encoding::PackedReal, Encoding::PackedComplex],
            "complex packed access",
        )?;
        Ok(self.complex_slice()?.to_vec())
    }

    pub fn complex_packed_value_at(&self, index: usize) -> EngineResult<Complex64> {
        self.expect_encoding(
            &[Encoding::PackedReal, Encoding::PackedComplex],
            "complex packed access",
        )?;
        self.check_index(index)?;
        Ok(self.complex_slice()?[index])
    }
}
