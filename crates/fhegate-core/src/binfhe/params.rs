//! Binary-FHE parameter presets, bootstrapping methods and gates

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Parameter preset for the LWE sub-engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(non_camel_case_types)]
#[repr(u8)]
pub enum BinFheParamSet {
    Toy = 0,
    Medium = 1,
    Std128Ap = 2,
    Std128 = 3,
    Std128_3 = 4,
    Std128_4 = 5,
    Std128Q = 6,
    Std128Q_3 = 7,
    Std128Q_4 = 8,
    Std192 = 9,
    Std192_3 = 10,
    Std192_4 = 11,
    Std192Q = 12,
    Std192Q_3 = 13,
    Std192Q_4 = 14,
    Std256 = 15,
    Std256_3 = 16,
    Std256_4 = 17,
    Std256Q = 18,
    Std256Q_3 = 19,
    Std256Q_4 = 20,
    Std128Lmkcdey = 21,
    Std128_3Lmkcdey = 22,
    Std128_4Lmkcdey = 23,
    Std128QLmkcdey = 24,
    Std128Q_3Lmkcdey = 25,
    Std128Q_4Lmkcdey = 26,
    Std192Lmkcdey = 27,
    Std192_3Lmkcdey = 28,
    Std192_4Lmkcdey = 29,
    Std192QLmkcdey = 30,
    Std192Q_3Lmkcdey = 31,
    Std192Q_4Lmkcdey = 32,
    Std256Lmkcdey = 33,
    Std256_3Lmkcdey = 34,
    Std256_4Lmkcdey = 35,
    Std256QLmkcdey = 36,
    Std256Q_3Lmkcdey = 37,
    Std256Q_4Lmkcdey = 38,
    LpfStd128 = 39,
    LpfStd128Q = 40,
    LpfStd128Lmkcdey = 41,
    LpfStd128QLmkcdey = 42,
    SignedModTest = 43,
}

/// Concrete LWE parameters behind a preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LweParams {
    /// Lattice dimension
    pub n: u32,
    /// Ciphertext modulus of gate-level ciphertexts
    pub q: u64,
    /// Ring dimension of the accumulator
    pub ring_dim: u32,
    /// Bound on the noise a refreshed ciphertext may carry
    pub beta: u32,
}

impl LweParams {
    /// Largest plaintext modulus that still decrypts reliably
    pub fn max_plaintext_space(&self) -> u32 {
        (self.q / (2 * u64::from(self.beta))) as u32
    }
}

const PRESETS: [BinFheParamSet; 44] = {
    use BinFheParamSet::*;
    [
        Toy, Medium, Std128Ap, Std128, Std128_3, Std128_4, Std128Q, Std128Q_3, Std128Q_4,
        Std192, Std192_3, Std192_4, Std192Q, Std192Q_3, Std192Q_4, Std256, Std256_3, Std256_4,
        Std256Q, Std256Q_3, Std256Q_4, Std128Lmkcdey, Std128_3Lmkcdey, Std128_4Lmkcdey,
        Std128QLmkcdey, Std128Q_3Lmkcdey, Std128Q_4Lmkcdey, Std192Lmkcdey, Std192_3Lmkcdey,
        Std192_4Lmkcdey, Std192QLmkcdey, Std192Q_3Lmkcdey, Std192Q_4Lmkcdey, Std256Lmkcdey,
        Std256_3Lmkcdey, Std256_4Lmkcdey, Std256QLmkcdey, Std256Q_3Lmkcdey, Std256Q_4Lmkcdey,
        LpfStd128, LpfStd128Q, LpfStd128Lmkcdey, LpfStd128QLmkcdey, SignedModTest,
    ]
};

impl BinFheParamSet {
    /// Presets accepted as the FHEW side of CKKS scheme switching
    pub fn is_classic(&self) -> bool {
        (*self as u8) <= BinFheParamSet::Std256Q_4 as u8
    }

    pub fn params(&self) -> LweParams {
        use BinFheParamSet::*;
        // (n, ring_dim); the _3/_4 variants double q for wider gates
        let (n, ring_dim) = match self {
            Toy => (32, 512),
            Medium => (256, 1024),
            Std128Ap => (512, 1024),
            Std128 | Std128_3 | Std128_4 => (503, 1024),
            Std128Q | Std128Q_3 | Std128Q_4 => (585, 2048),
            Std192 | Std192_3 | Std192_4 => (805, 2048),
            Std192Q | Std192Q_3 | Std192Q_4 => (875, 2048),
            Std256 | Std256_3 | Std256_4 => (990, 2048),
            Std256Q | Std256Q_3 | Std256Q_4 => (1225, 4096),
            Std128Lmkcdey | Std128_3Lmkcdey | Std128_4Lmkcdey => (446, 1024),
            Std128QLmkcdey | Std128Q_3Lmkcdey | Std128Q_4Lmkcdey => (500, 2048),
            Std192Lmkcdey | Std192_3Lmkcdey | Std192_4Lmkcdey => (610, 2048),
            Std192QLmkcdey | Std192Q_3Lmkcdey | Std192Q_4Lmkcdey => (700, 2048),
            Std256Lmkcdey | Std256_3Lmkcdey | Std256_4Lmkcdey => (820, 2048),
            Std256QLmkcdey | Std256Q_3Lmkcdey | Std256Q_4Lmkcdey => (900, 4096),
            LpfStd128 => (650, 2048),
            LpfStd128Q => (700, 2048),
            LpfStd128Lmkcdey => (600, 2048),
            LpfStd128QLmkcdey => (650, 2048),
            SignedModTest => (512, 1024),
        };
        let wide = matches!(
            self,
            Std128_3 | Std128_4 | Std128Q_3 | Std128Q_4 | Std192_3 | Std192_4 | Std192Q_3
                | Std192Q_4 | Std256_3 | Std256_4 | Std256Q_3 | Std256Q_4 | Std128_3Lmkcdey
                | Std128_4Lmkcdey | Std128Q_3Lmkcdey | Std128Q_4Lmkcdey | Std192_3Lmkcdey
                | Std192_4Lmkcdey | Std192Q_3Lmkcdey | Std192Q_4Lmkcdey | Std256_3Lmkcdey
                | Std256_4Lmkcdey | Std256Q_3Lmkcdey | Std256Q_4Lmkcdey | LpfStd128
                | LpfStd128Q | LpfStd128Lmkcdey | LpfStd128QLmkcdey
        );
        LweParams {
            n,
            q: if wide { 2048 } else { 1024 },
            ring_dim,
            beta: 128,
        }
    }
}

impl TryFrom<i32> for BinFheParamSet {
    type Error = EngineError;

    fn try_from(v: i32) -> EngineResult<Self> {
        usize::try_from(v)
            .ok()
            .and_then(|i| PRESETS.get(i).copied())
            .ok_or_else(|| {
                EngineError::OutOfRange(format!("binary FHE parameter set {v} (expected 0..=43)"))
            })
    }
}

/// Blind-rotation method used by the bootstrapping key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum BinFheMethod {
    Ap = 1,
    Ginx = 2,
    Lmkcdey = 3,
}

impl TryFrom<i32> for BinFheMethod {
    type Error = EngineError;

    fn try_from(v: i32) -> EngineResult<Self> {
        match v {
            1 => Ok(BinFheMethod::Ap),
            2 => Ok(BinFheMethod::Ginx),
            3 => Ok(BinFheMethod::Lmkcdey),
            0 => Err(EngineError::InvalidParameter(
                "bootstrapping method INVALID".into(),
            )),
            _ => Err(EngineError::OutOfRange(format!(
                "bootstrapping method {v} (expected 1..=3)"
            ))),
        }
    }
}

/// Boolean gate evaluated with bootstrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinGate {
    Or = 0,
    And = 1,
    Nor = 2,
    Nand = 3,
    Xor = 4,
    Xnor = 5,
    Majority = 6,
    And3 = 7,
    Or3 = 8,
    And4 = 9,
    Or4 = 10,
    XorFast = 11,
    XnorFast = 12,
    Cmux = 13,
}

impl BinGate {
    /// Number of inputs the gate takes
    pub fn arity(&self) -> usize {
        match self {
            BinGate::Or
            | BinGate::And
            | BinGate::Nor
            | BinGate::Nand
            | BinGate::Xor
            | BinGate::Xnor
            | BinGate::XorFast
            | BinGate::XnorFast => 2,
            BinGate::Majority | BinGate::And3 | BinGate::Or3 | BinGate::Cmux => 3,
            BinGate::And4 | BinGate::Or4 => 4,
        }
    }

    /// Truth table; CMUX selects `bits[1]` when `bits[2]` is set, else `bits[0]`
    pub fn apply(&self, bits: &[bool]) -> bool {
        let ones = bits.iter().filter(|b| **b).count();
        match self {
            BinGate::Or | BinGate::Or3 | BinGate::Or4 => ones > 0,
            BinGate::And | BinGate::And3 | BinGate::And4 => ones == bits.len(),
            BinGate::Nor => ones == 0,
            BinGate::Nand => ones != bits.len(),
            BinGate::Xor | BinGate::XorFast => ones % 2 == 1,
            BinGate::Xnor | BinGate::XnorFast => ones % 2 == 0,
            BinGate::Majority => ones * 2 > bits.len(),
            BinGate::Cmux => {
                if bits[2] {
                    bits[1]
                } else {
                    bits[0]
                }
            }
        }
    }
}

impl TryFrom<i32> for BinGate {
    type Error = EngineError;

    fn try_from(v: i32) -> EngineResult<Self> {
        use BinGate::*;
        const GATES: [BinGate; 14] = [
            Or, And, Nor, Nand, Xor, Xnor, Majority, And3, Or3, And4, Or4, XorFast, XnorFast,
            Cmux,
        ];
        usize::try_from(v)
            .ok()
            .and_then(|i| GATES.get(i).copied())
            .ok_or_else(|| EngineError::OutOfRange(format!("binary gate {v} (expected 0..=13)")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_ids_line_up() {
        for (i, preset) in PRESETS.iter().enumerate() {
            assert_eq!(*preset as usize, i);
            assert_eq!(BinFheParamSet::try_from(i as i32).unwrap(), *preset);
        }
        assert!(BinFheParamSet::try_from(44).is_err());
        assert!(BinFheParamSet::try_from(-1).is_err());
    }

    #[test]
    fn test_max_plaintext_space() {
        assert_eq!(BinFheParamSet::Toy.params().max_plaintext_space(), 4);
        assert_eq!(BinFheParamSet::Std128_3.params().max_plaintext_space(), 8);
    }

    #[test]
    fn test_classic_presets() {
        assert!(BinFheParamSet::Std256Q_4.is_classic());
        assert!(!BinFheParamSet::Std128Lmkcdey.is_classic());
    }

    #[test]
    fn test_method_rejects_invalid() {
        assert!(matches!(
            BinFheMethod::try_from(0),
            Err(EngineError::InvalidParameter(_))
        ));
        assert!(BinFheMethod::try_from(4).is_err());
        assert_eq!(BinFheMethod::try_from(2).unwrap(), BinFheMethod::Ginx);
    }

    #[test]
    fn test_gate_truth_tables() {
        assert!(BinGate::Nand.apply(&[true, false]));
        assert!(!BinGate::Nand.apply(&[true, true]));
        assert!(BinGate::Majority.apply(&[true, false, true]));
        assert!(!BinGate::Majority.apply(&[true, false, false]));
        assert!(BinGate::Cmux.apply(&[false, true, true]));
        assert!(!BinGate::Cmux.apply(&[false, true, false]));
        assert!(BinGate::And4.apply(&[true; 4]));
        assert!(BinGate::XnorFast.apply(&[false, false]));
        assert_eq!(BinGate::try_from(13).unwrap().arity(), 3);
    }
}
